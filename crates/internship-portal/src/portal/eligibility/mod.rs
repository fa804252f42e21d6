mod presentation;

pub use presentation::{apply_button, button_text, is_disabled, ApplyButton};

use serde::{Deserialize, Serialize};

use super::domain::{OfferId, StatusSnapshot};

/// Why a student may not submit a new application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    OnInternship,
    AlreadyApproved,
    AlreadyApplied,
    /// Client-side validation failure; never produced by [`evaluate`].
    InvalidOffer,
}

impl IneligibilityReason {
    pub const fn code(self) -> &'static str {
        match self {
            IneligibilityReason::OnInternship => "on_internship",
            IneligibilityReason::AlreadyApproved => "already_approved",
            IneligibilityReason::AlreadyApplied => "already_applied",
            IneligibilityReason::InvalidOffer => "invalid_offer",
        }
    }

    pub const fn explanation(self) -> &'static str {
        match self {
            IneligibilityReason::OnInternship => {
                "Vous êtes déjà en stage et ne pouvez plus candidater à de nouvelles offres."
            }
            IneligibilityReason::AlreadyApproved => {
                "Votre candidature pour cette offre a été approuvée par l'entreprise. Consultez \"Mes Candidatures\" pour accepter ou décliner."
            }
            IneligibilityReason::AlreadyApplied => {
                "Vous avez déjà candidaté pour cette offre. Votre candidature est en attente de réponse."
            }
            IneligibilityReason::InvalidOffer => "Cette offre n'est pas valide.",
        }
    }
}

/// Verdict for one (snapshot, offer) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub can_apply: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibilityReason>,
}

impl Eligibility {
    pub const fn eligible() -> Self {
        Self {
            can_apply: true,
            reason: None,
        }
    }

    pub const fn blocked(reason: IneligibilityReason) -> Self {
        Self {
            can_apply: false,
            reason: Some(reason),
        }
    }

    pub fn explanation(&self) -> Option<&'static str> {
        self.reason.map(IneligibilityReason::explanation)
    }
}

/// Decide whether a new application to `offer` is permitted. First matching rule wins:
/// internship, then an approved application for the offer, then any application for it.
///
/// Pure and total, so the same verdict gates submissions and renders read-only text.
pub fn evaluate(offer: OfferId, status: &StatusSnapshot) -> Eligibility {
    if status.is_on_internship {
        return Eligibility::blocked(IneligibilityReason::OnInternship);
    }

    if status.has_application_for_offer(offer) {
        // Approved and pending records for one offer should not coexist; approved still wins.
        if status.has_approved_application_for_offer(offer) {
            return Eligibility::blocked(IneligibilityReason::AlreadyApproved);
        }
        return Eligibility::blocked(IneligibilityReason::AlreadyApplied);
    }

    Eligibility::eligible()
}
