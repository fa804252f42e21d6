use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::api::{ApiError, StudentApi};
use super::domain::{
    Application, ApplicationId, Notification, NotificationId, Offer, OfferFilter, OfferId,
    StatusSnapshot,
};
use super::eligibility::{evaluate, ApplyButton, Eligibility, IneligibilityReason};
use super::status::StatusAggregator;
use super::submission::{ApplicationDraft, ApplicationSubmitter, SubmissionError, SubmissionState};

/// Offer listing entry annotated with the button a student would see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferCard {
    pub offer: Offer,
    pub button: ApplyButton,
}

/// Per-session container composing the backend client, the status aggregator and the
/// submission state machine.
pub struct StudentPortal<A> {
    api: Arc<A>,
    status: Arc<StatusAggregator<A>>,
    submitter: ApplicationSubmitter<A>,
}

impl<A> StudentPortal<A>
where
    A: StudentApi + 'static,
{
    pub fn new(api: Arc<A>) -> Self {
        let status = Arc::new(StatusAggregator::new(Arc::clone(&api)));
        let submitter = ApplicationSubmitter::new(Arc::clone(&api), Arc::clone(&status));
        Self {
            api,
            status,
            submitter,
        }
    }

    pub fn status(&self) -> &Arc<StatusAggregator<A>> {
        &self.status
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub async fn refresh(&self) -> StatusSnapshot {
        self.status.refresh().await
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.submitter.state()
    }

    /// Verdict against the current snapshot. Non-positive ids are refused up front.
    pub fn eligibility(&self, offer: OfferId) -> Eligibility {
        if !offer.is_valid() {
            return Eligibility::blocked(IneligibilityReason::InvalidOffer);
        }
        evaluate(offer, &self.status.snapshot())
    }

    pub fn apply_button(&self, offer: OfferId) -> ApplyButton {
        ApplyButton::from(self.eligibility(offer))
    }

    pub async fn submit(
        &self,
        offer: OfferId,
        draft: ApplicationDraft,
    ) -> Result<Application, PortalError> {
        Ok(self.submitter.submit(offer, draft).await?)
    }

    pub async fn accept_offer(&self, application: ApplicationId) -> Result<Application, PortalError> {
        self.respond(application, true).await
    }

    pub async fn decline_offer(
        &self,
        application: ApplicationId,
    ) -> Result<Application, PortalError> {
        self.respond(application, false).await
    }

    pub async fn withdraw_application(&self, application: ApplicationId) -> Result<(), PortalError> {
        validate_application(application)?;
        let outcome = self.api.delete_application(application).await;
        self.settle(&outcome).await;
        outcome?;
        info!(%application, "application withdrawn");
        Ok(())
    }

    /// List offers and pair each with its apply button, evaluated against a fresh snapshot.
    pub async fn offer_board(&self, filter: OfferFilter) -> Result<Vec<OfferCard>, PortalError> {
        let (offers, snapshot) = tokio::join!(self.api.list_offers(filter), self.status.refresh());
        let cards = offers?
            .into_iter()
            .map(|offer| {
                let button = ApplyButton::from(evaluate(offer.id, &snapshot));
                OfferCard { offer, button }
            })
            .collect();
        Ok(cards)
    }

    /// Unseen notifications. The backend posts one for every enterprise decision, so the
    /// status is re-read whenever any are waiting.
    pub async fn notifications(&self) -> Result<Vec<Notification>, PortalError> {
        let notifications = self.api.unseen_notifications().await?;
        if !notifications.is_empty() {
            self.status.refresh().await;
        }
        Ok(notifications)
    }

    pub async fn mark_notification_seen(
        &self,
        notification: NotificationId,
    ) -> Result<(), PortalError> {
        if !notification.is_valid() {
            return Err(PortalError::Validation(format!(
                "ID de notification invalide: {notification}"
            )));
        }
        self.api.mark_notification_seen(notification).await?;
        info!(%notification, "notification marked as seen");
        Ok(())
    }

    async fn respond(
        &self,
        application: ApplicationId,
        accepted: bool,
    ) -> Result<Application, PortalError> {
        validate_application(application)?;
        let outcome = self.api.update_student_status(application, accepted).await;
        self.settle(&outcome).await;
        let updated = outcome?;
        info!(%application, accepted, state = %updated.state, "offer decision recorded");
        Ok(updated)
    }

    /// Local state is only a cache: once a mutation resolves it is re-read from the backend,
    /// unless the session just expired.
    async fn settle<T>(&self, outcome: &Result<T, ApiError>) {
        if matches!(outcome, Err(err) if err.is_unauthorized()) {
            return;
        }
        self.status.refresh().await;
    }
}

fn validate_application(application: ApplicationId) -> Result<(), PortalError> {
    if application.is_valid() {
        Ok(())
    } else {
        Err(PortalError::Validation(format!(
            "ID de candidature invalide: {application}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("invalid request: {0}")]
    Validation(String),
}

impl PortalError {
    pub fn user_message(&self) -> String {
        match self {
            PortalError::Api(ApiError::Unauthorized) => {
                "Session expirée. Veuillez vous reconnecter.".to_string()
            }
            PortalError::Api(
                ApiError::Forbidden(message)
                | ApiError::NotFound(message)
                | ApiError::Conflict(message)
                | ApiError::Rejected { message, .. },
            ) => message.clone(),
            PortalError::Api(_) => "Erreur de communication avec le serveur".to_string(),
            PortalError::Submission(err) => err.user_message(),
            PortalError::Validation(message) => message.clone(),
        }
    }
}
