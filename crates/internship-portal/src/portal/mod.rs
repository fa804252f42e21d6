//! Student side of the internship portal: status aggregation, the eligibility rule for new
//! applications, and the submission workflow that keeps both in step with the backend.
//!
//! The REST backend remains the authority for every business rule; the verdicts computed here
//! only drive what the student is shown and stop requests that are known to fail.

pub mod api;
pub mod domain;
pub mod eligibility;
pub mod router;
pub mod service;
pub mod session;
pub mod status;
pub mod submission;

#[cfg(test)]
mod tests;

pub use api::{ApiError, HttpStudentApi, StudentApi};
pub use domain::{
    Application, ApplicationId, ApplicationState, InternshipStatus, Notification, NotificationId,
    Offer, OfferFilter, OfferId, StatusSnapshot,
};
pub use eligibility::{
    apply_button, button_text, evaluate, is_disabled, ApplyButton, Eligibility,
    IneligibilityReason,
};
pub use router::{portal_router, HttpPortalProvider, PortalProvider};
pub use service::{OfferCard, PortalError, StudentPortal};
pub use session::{Session, SessionState};
pub use status::{StatusAggregator, StatusView};
pub use submission::{
    ApplicationDraft, ApplicationFiles, ApplicationSubmitter, Attachment, SubmissionError,
    SubmissionState,
};
