use serde::Serialize;

use super::{evaluate, Eligibility, IneligibilityReason};
use crate::portal::domain::{OfferId, StatusSnapshot};

const APPLY_LABEL: &str = "Candidater";

/// Button state for one offer, derived from a single evaluator verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyButton {
    pub label: &'static str,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<&'static str>,
}

impl From<Eligibility> for ApplyButton {
    fn from(verdict: Eligibility) -> Self {
        ApplyButton {
            label: label_for(&verdict),
            disabled: !verdict.can_apply,
            reason: verdict.reason.map(IneligibilityReason::code),
            explanation: verdict.explanation(),
        }
    }
}

pub fn button_text(offer: OfferId, status: &StatusSnapshot) -> &'static str {
    label_for(&evaluate(offer, status))
}

pub fn is_disabled(offer: OfferId, status: &StatusSnapshot) -> bool {
    !evaluate(offer, status).can_apply
}

pub fn apply_button(offer: OfferId, status: &StatusSnapshot) -> ApplyButton {
    ApplyButton::from(evaluate(offer, status))
}

fn label_for(verdict: &Eligibility) -> &'static str {
    if verdict.can_apply {
        return APPLY_LABEL;
    }

    match verdict.reason {
        Some(IneligibilityReason::OnInternship) => "En stage - Candidature impossible",
        Some(IneligibilityReason::AlreadyApproved) => "Candidature approuvée",
        Some(IneligibilityReason::AlreadyApplied) => "Déjà candidaté",
        Some(IneligibilityReason::InvalidOffer) | None => "Candidature impossible",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_negative_verdicts_fall_back_to_generic_label() {
        let invalid = ApplyButton::from(Eligibility::blocked(IneligibilityReason::InvalidOffer));
        assert_eq!(invalid.label, "Candidature impossible");
        assert!(invalid.disabled);
        assert_eq!(invalid.reason, Some("invalid_offer"));

        let unexplained = Eligibility {
            can_apply: false,
            reason: None,
        };
        assert_eq!(label_for(&unexplained), "Candidature impossible");
    }
}
