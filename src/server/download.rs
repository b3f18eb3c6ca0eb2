use axum::extract::{Query, State};
use axum::response::Response;
use tracing::{error, info};

use super::AppState;
use crate::access;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::metax::RecordQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadParams {
    pub cr_id: String,
    pub file_ids: Vec<String>,
    pub dir_ids: Vec<String>,
}

impl DownloadParams {
    /// `file_id` and `dir_id` may repeat; `cr_id` is required.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> AppResult<Self> {
        let mut cr_id = None;
        let mut file_ids = Vec::new();
        let mut dir_ids = Vec::new();
        for (k, v) in pairs {
            match k.as_str() {
                "cr_id" => cr_id = Some(v),
                "file_id" => file_ids.push(v),
                "dir_id" => dir_ids.push(v),
                _ => {}
            }
        }
        let cr_id = cr_id
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::user("invalid_request", "cr_id is required"))?;
        Ok(Self { cr_id, file_ids, dir_ids })
    }
}

pub async fn get_download(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Response> {
    let params = DownloadParams::from_pairs(pairs)?;
    let record = match state.metax.get_catalog_record(&params.cr_id, RecordQuery::default()).await {
        Ok(Some(r)) => r,
        Ok(None) => return Err(AppError::user("catalog_record_unavailable", "Unable to get catalog record")),
        Err(e) => {
            error!(target: "download", request_id = %ctx.request_id, "metax fetch for {} failed: {}", params.cr_id, e);
            return Err(AppError::user("catalog_record_unavailable", "Unable to get catalog record"));
        }
    };

    let decision = access::decide(state.permits.as_ref(), &record, &params.cr_id, &ctx.auth).await?;
    if !decision.can_download {
        return Err(AppError::forbidden("not_authorized", "Not authorized"));
    }
    info!(
        target: "download",
        request_id = %ctx.request_id,
        files = params.file_ids.len(),
        dirs = params.dir_ids.len(),
        "download of {} authorized", params.cr_id
    );
    Ok(state.downloader.download(&params.cr_id, &params.file_ids, &params.dir_ids).await?)
}
