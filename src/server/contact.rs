use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::mail::{self, ContactRequest, OutgoingMail};
use crate::metax::RecordQuery;

/// Relay a contact-form message to an agent of the dataset. The sender's address goes
/// into Reply-To; the message itself is sent from the configured no-reply address.
pub async fn post_contact(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(cr_id): Path<String>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(req) = payload.map_err(|e| AppError::user("invalid_request".to_string(), e.body_text()))?;
    let contact = req.validate().map_err(|m| AppError::user("invalid_request".to_string(), m))?;

    let record = state
        .metax
        .get_catalog_record(&cr_id, RecordQuery::default())
        .await?
        .ok_or_else(|| AppError::not_found("catalog_record_not_found", "Catalog record not found"))?;

    if record.is_harvested() {
        return Err(AppError::user("harvested_dataset", "Contact form is not available for harvested datasets"));
    }

    let Some(recipient) = mail::recipient_address(&record, contact.role) else {
        return Err(AppError::internal("no_recipient", "No recipient could be inferred from the dataset"));
    };

    let body = mail::compose_body(
        record.preferred_identifier().unwrap_or(&cr_id),
        &contact.user_email,
        &contact.user_subject,
        &contact.user_body,
    );
    let outgoing = OutgoingMail {
        from: state.settings.mail_sender.clone(),
        reply_to: contact.user_email.clone(),
        to: recipient,
        subject: mail::SUBJECT.to_string(),
        body,
    };

    if let Err(e) = state.mailer.send(&outgoing).await {
        error!(target: "contact", request_id = %ctx.request_id, error = %e, "Unable to send email message");
        return Err(AppError::delivery("mail_delivery_failed", "Sending email failed"));
    }
    info!(target: "contact", request_id = %ctx.request_id, role = ?contact.role, "contact message sent for {}", cr_id);
    Ok(StatusCode::NO_CONTENT)
}
