//! Access decisions for a catalog record and a caller.
//!
//! `can_download` and `can_view_restricted` are pure predicates over the record, the
//! caller's `AuthState` and a permit answer. Only `has_permit` talks to the outside
//! world (REMS), and its failures propagate instead of degrading to "no permit".

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::AppResult;
use crate::identity::AuthState;
use crate::record::{AccessType, CatalogRecord};
use crate::rems::PermitRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub can_view_restricted: bool,
    pub can_download: bool,
    /// `Some` only for permit-gated records.
    pub has_permit: Option<bool>,
}

/// Download rule evaluated against a fixed date.
pub fn can_download_on(record: &CatalogRecord, auth: &AuthState, has_permit: bool, today: NaiveDate) -> bool {
    match record.access_type() {
        Some(AccessType::Open) => true,
        Some(AccessType::Permit) => auth.is_authenticated && has_permit,
        Some(AccessType::Login) => auth.is_authenticated,
        Some(AccessType::Embargo) => record.embargo_available().map(|d| d <= today).unwrap_or(false),
        Some(AccessType::Restricted) => false,
        Some(AccessType::Unknown(_)) | None => !record.has_gated_data(),
    }
}

pub fn can_download(record: &CatalogRecord, auth: &AuthState, has_permit: bool) -> bool {
    can_download_on(record, auth, has_permit, Utc::now().date_naive())
}

/// Restricted record fields follow the same rule as downloads: whoever may fetch the
/// data may also see where it lives.
pub fn can_view_restricted(record: &CatalogRecord, auth: &AuthState, has_permit: bool) -> bool {
    can_download(record, auth, has_permit)
}

/// Ask the permit registry; short-circuits to `false` for records that are not
/// permit-gated and for anonymous callers. REMS resources are keyed by the record
/// identifier, or by `cr_id` (the id the caller asked for) when the record lacks one.
pub async fn has_permit(registry: &dyn PermitRegistry, record: &CatalogRecord, cr_id: &str, auth: &AuthState) -> AppResult<bool> {
    if !record.is_permit_gated() || !auth.is_authenticated { return Ok(false); }
    let Some(user_id) = auth.user_id.as_deref() else { return Ok(false); };
    let record_id = match record.identifier() {
        Some(id) => id,
        None => {
            debug!(target: "access", cr_id, "record has no identifier, asking REMS by requested id");
            cr_id
        }
    };
    Ok(registry.has_permit(record_id, user_id).await?)
}

/// Evaluate everything a handler needs for one request.
pub async fn decide(registry: &dyn PermitRegistry, record: &CatalogRecord, cr_id: &str, auth: &AuthState) -> AppResult<AccessDecision> {
    let permit = has_permit(registry, record, cr_id, auth).await?;
    let allowed = can_download(record, auth, permit);
    Ok(AccessDecision {
        can_view_restricted: allowed,
        can_download: allowed,
        has_permit: record.is_permit_gated().then_some(permit),
    })
}
