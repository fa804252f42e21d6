mod contract;
mod http;

pub use http::HttpStudentApi;

#[cfg(test)]
pub(crate) use contract::{ApplicationPayload, NotificationPayload, OfferPayload, StatusPayload};

use std::future::Future;

use serde_json::Value;

use super::domain::{
    Application, ApplicationId, InternshipStatus, Notification, NotificationId, Offer, OfferFilter,
    OfferId,
};
use super::submission::ApplicationFiles;

/// Student-facing operations of the internship management backend.
///
/// The backend owns every rule; implementations only translate calls and classify failures.
pub trait StudentApi: Send + Sync {
    /// Pending and rejected applications of the signed-in student.
    fn pending_applications(
        &self,
    ) -> impl Future<Output = Result<Vec<Application>, ApiError>> + Send;

    fn approved_applications(
        &self,
    ) -> impl Future<Output = Result<Vec<Application>, ApiError>> + Send;

    fn internship_status(&self) -> impl Future<Output = Result<InternshipStatus, ApiError>> + Send;

    fn create_application(
        &self,
        offer: OfferId,
        files: &ApplicationFiles,
    ) -> impl Future<Output = Result<Application, ApiError>> + Send;

    /// Accept (`true`) or decline (`false`) an offer the enterprise approved.
    fn update_student_status(
        &self,
        application: ApplicationId,
        accepted: bool,
    ) -> impl Future<Output = Result<Application, ApiError>> + Send;

    fn delete_application(
        &self,
        application: ApplicationId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_offers(
        &self,
        filter: OfferFilter,
    ) -> impl Future<Output = Result<Vec<Offer>, ApiError>> + Send;

    /// Notifications the student has not marked as seen yet.
    fn unseen_notifications(
        &self,
    ) -> impl Future<Output = Result<Vec<Notification>, ApiError>> + Send;

    fn mark_notification_seen(
        &self,
        notification: NotificationId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Failure classes of the REST collaborator, keyed by HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("session expired, sign in again")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("malformed backend payload: {0}")]
    Malformed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Classify a non-success response. Spring error bodies carry a `message` field; plain
    /// text bodies are used verbatim.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            400..=499 => ApiError::Rejected { status, message },
            _ => ApiError::Unavailable(format!("status {status}: {message}")),
        }
    }

    /// Business-rule refusals the client tried to predict (duplicate application, already on
    /// internship). The backend reports these as 403, 409 or a plain 400.
    pub fn is_business_conflict(&self) -> bool {
        match self {
            ApiError::Forbidden(_) | ApiError::Conflict(_) => true,
            ApiError::Rejected { status, .. } => *status == 400,
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

fn extract_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details provided".to_string();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| trimmed.to_string()),
        Ok(Value::String(text)) => text,
        _ => trimmed.to_string(),
    }
}
