use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use super::AppState;
use crate::access;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::mail;
use crate::metax::RecordQuery;
use crate::shaping;

fn unavailable() -> AppError { AppError::user("catalog_record_unavailable", "Unable to get catalog record from Metax") }

/// Dataset page payload: the shaped record, which roles can be contacted and, for
/// permit-gated datasets, whether the caller already holds a permit.
pub async fn get_dataset(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(cr_id): Path<String>,
) -> AppResult<Json<Value>> {
    let query = RecordQuery { include_removed: true, file_details: true };
    let record = match state.metax.get_catalog_record(&cr_id, query).await {
        Ok(Some(r)) => r,
        Ok(None) => return Err(unavailable()),
        Err(e) => {
            error!(target: "dataset", request_id = %ctx.request_id, "metax fetch for {} failed: {}", cr_id, e);
            return Err(unavailable());
        }
    };

    let decision = access::decide(state.permits.as_ref(), &record, &cr_id, &ctx.auth).await?;
    let shaped = shaping::shape_record(&record, &decision, &state.settings.restricted_fields);

    let mut body = json!({
        "catalog_record": shaped,
        "email_info": mail::email_info(&record),
    });
    if let Some(permit) = decision.has_permit {
        body["has_permit"] = json!(permit);
    }
    Ok(Json(body))
}
