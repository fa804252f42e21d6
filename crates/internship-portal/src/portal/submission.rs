use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use mime::Mime;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::api::{ApiError, StudentApi};
use super::domain::{Application, OfferId};
use super::eligibility::{evaluate, Eligibility, IneligibilityReason};
use super::status::StatusAggregator;

/// File uploaded alongside an application.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: Mime, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(file_name, mime::APPLICATION_PDF, bytes)
    }

    /// Read a document from disk, guessing its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            SubmissionError::Validation(format!("impossible de lire {}: {err}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let content_type = mime_guess::from_path(path).first_or_octet_stream();

        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Form state before validation; either document may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationDraft {
    pub cv: Option<Attachment>,
    pub cover_letter: Option<Attachment>,
}

impl ApplicationDraft {
    pub fn new(cv: Attachment, cover_letter: Attachment) -> Self {
        Self {
            cv: Some(cv),
            cover_letter: Some(cover_letter),
        }
    }

    pub fn validate(self) -> Result<ApplicationFiles, SubmissionError> {
        let cv = self
            .cv
            .filter(|cv| !cv.is_empty())
            .ok_or_else(|| SubmissionError::Validation("Le CV est requis".to_string()))?;
        let cover_letter = self
            .cover_letter
            .filter(|letter| !letter.is_empty())
            .ok_or_else(|| {
                SubmissionError::Validation("La lettre de motivation est requise".to_string())
            })?;

        Ok(ApplicationFiles { cv, cover_letter })
    }
}

/// Validated documents ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationFiles {
    pub cv: Attachment,
    pub cover_letter: Attachment,
}

/// `Idle → Submitting → {Succeeded, Failed}`; business conflicts fall back to `Idle` once the
/// status has been reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting {
        offer_id: OfferId,
    },
    Succeeded {
        application: Application,
    },
    Failed {
        offer_id: OfferId,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("invalid submission: {0}")]
    Validation(String),
    #[error("cannot apply to offer {offer}: {}", reason.code())]
    Ineligible {
        offer: OfferId,
        reason: IneligibilityReason,
    },
    #[error("a submission for offer {0} is already in progress")]
    InProgress(OfferId),
    #[error(transparent)]
    Backend(#[from] ApiError),
}

impl SubmissionError {
    /// Message shown to the student.
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Validation(message) => message.clone(),
            SubmissionError::Ineligible { reason, .. } => reason.explanation().to_string(),
            SubmissionError::InProgress(_) => {
                "Une candidature est déjà en cours d'envoi.".to_string()
            }
            SubmissionError::Backend(ApiError::Unauthorized) => {
                "Session expirée. Veuillez vous reconnecter.".to_string()
            }
            SubmissionError::Backend(ApiError::Conflict(_)) => {
                "Vous avez déjà postulé pour cette offre".to_string()
            }
            SubmissionError::Backend(ApiError::Forbidden(_)) => {
                IneligibilityReason::OnInternship.explanation().to_string()
            }
            SubmissionError::Backend(ApiError::Rejected { message, .. }) => message.clone(),
            SubmissionError::Backend(_) => {
                "Erreur lors de la création de la candidature".to_string()
            }
        }
    }
}

/// Drives one student's application submissions and keeps the status aggregator in step
/// with the backend after every outcome.
pub struct ApplicationSubmitter<A> {
    api: Arc<A>,
    status: Arc<StatusAggregator<A>>,
    state: Mutex<SubmissionState>,
}

impl<A> ApplicationSubmitter<A>
where
    A: StudentApi + 'static,
{
    pub fn new(api: Arc<A>, status: Arc<StatusAggregator<A>>) -> Self {
        Self {
            api,
            status,
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn submit(
        &self,
        offer: OfferId,
        draft: ApplicationDraft,
    ) -> Result<Application, SubmissionError> {
        if !offer.is_valid() {
            return Err(SubmissionError::Validation(format!(
                "ID d'offre invalide: {offer}"
            )));
        }
        let files = draft.validate()?;

        let _claim = self.begin(offer)?;

        match self.api.create_application(offer, &files).await {
            Ok(application) => {
                info!(%offer, application = %application.id, "application submitted");
                self.status.refresh().await;
                self.transition(SubmissionState::Succeeded {
                    application: application.clone(),
                });
                Ok(application)
            }
            Err(err) if err.is_unauthorized() => {
                self.transition(SubmissionState::Idle);
                Err(err.into())
            }
            Err(err) if err.is_business_conflict() => {
                warn!(%offer, error = %err, "backend refused application, reconciling status");
                self.transition(SubmissionState::Failed {
                    offer_id: offer,
                    error: err.to_string(),
                });
                self.status.refresh().await;
                self.transition(SubmissionState::Idle);
                Err(err.into())
            }
            Err(err) => {
                warn!(%offer, error = %err, "application submission failed");
                self.transition(SubmissionState::Failed {
                    offer_id: offer,
                    error: err.to_string(),
                });
                self.status.refresh().await;
                Err(err.into())
            }
        }
    }

    /// Re-check eligibility against the current snapshot and claim the machine.
    fn begin(&self, offer: OfferId) -> Result<SubmissionClaim<'_>, SubmissionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let SubmissionState::Submitting { offer_id } = *state {
            return Err(SubmissionError::InProgress(offer_id));
        }

        match evaluate(offer, &self.status.snapshot()) {
            Eligibility {
                can_apply: true, ..
            } => {}
            Eligibility { reason, .. } => {
                return Err(SubmissionError::Ineligible {
                    offer,
                    reason: reason.unwrap_or(IneligibilityReason::InvalidOffer),
                });
            }
        }

        *state = SubmissionState::Submitting { offer_id: offer };
        Ok(SubmissionClaim {
            state: &self.state,
            offer,
        })
    }

    fn transition(&self, next: SubmissionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// Held for the lifetime of one `submit` call. If the call is dropped while the machine still
/// reads `Submitting` for this offer, the machine returns to `Idle`.
struct SubmissionClaim<'a> {
    state: &'a Mutex<SubmissionState>,
    offer: OfferId,
}

impl Drop for SubmissionClaim<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, SubmissionState::Submitting { offer_id } if offer_id == self.offer) {
            debug!(offer = %self.offer, "submission abandoned before completion");
            *state = SubmissionState::Idle;
        }
    }
}
