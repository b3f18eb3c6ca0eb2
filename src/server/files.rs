use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::access;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::metax::RecordQuery;
use crate::shaping;

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    dir_id: Option<String>,
    file_fields: Option<String>,
    directory_fields: Option<String>,
}

/// Directory contents of a dataset: sorted, capped and stripped for the caller.
/// A missing record or directory answers 404 with an empty body.
pub async fn get_files(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(cr_id): Path<String>,
    Query(q): Query<FilesQuery>,
) -> AppResult<Response> {
    let Some(dir_id) = q.dir_id.filter(|d| !d.trim().is_empty()) else {
        return Err(AppError::user("invalid_request", "dir_id is required"));
    };

    let record = state.metax.get_catalog_record(&cr_id, RecordQuery::default()).await?;
    let listing = state
        .metax
        .get_directory_listing(&cr_id, &dir_id, q.file_fields.as_deref(), q.directory_fields.as_deref())
        .await?;
    let (Some(record), Some(listing)) = (record, listing) else {
        return Ok((StatusCode::NOT_FOUND, "").into_response());
    };

    let decision = access::decide(state.permits.as_ref(), &record, &cr_id, &ctx.auth).await?;
    let shaped = shaping::shape_directory_listing(&listing, &decision, &state.settings.restricted_fields);
    Ok(Json(shaped).into_response())
}
