use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend identifier of an internship offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub i64);

impl OfferId {
    /// Backend identifiers are generated sequences starting at 1.
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend identifier of a student's application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i64);

impl ApplicationId {
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend identifier of a notification addressed to the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub i64);

impl NotificationId {
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow stage of an application. Driven by the enterprise (approve/reject) and the
/// student (accept an approved offer); never mutated locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    Pending,
    Approved,
    Rejected,
    Accepted,
    /// Approved applications the backend cancels once the student accepted another offer.
    Cancelled,
}

impl ApplicationState {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationState::Pending => "PENDING",
            ApplicationState::Approved => "APPROVED",
            ApplicationState::Rejected => "REJECTED",
            ApplicationState::Accepted => "ACCEPTED",
            ApplicationState::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "ACCEPTED" => Some(Self::Accepted),
            "CANCELLED" | "CANCELED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the enterprise has approved this candidacy (and the student may have accepted it).
    pub const fn is_approved(self) -> bool {
        matches!(self, ApplicationState::Approved | ApplicationState::Accepted)
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A student's candidacy to one offer, as validated at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    /// Absent when the backend omits the offer reference; such records never match an offer.
    pub offer_id: Option<OfferId>,
    pub state: ApplicationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise_name: Option<String>,
}

impl Application {
    pub fn targets(&self, offer: OfferId) -> bool {
        self.offer_id == Some(offer)
    }
}

/// Authoritative flag served by the backend's status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InternshipStatus {
    pub on_internship: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Point-in-time view of where the current student stands.
///
/// The default value is also the fail-closed state used when any fetch fails.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub pending_applications: Vec<Application>,
    pub approved_applications: Vec<Application>,
    pub accepted_applications: Vec<Application>,
    pub is_on_internship: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn new(
        pending_applications: Vec<Application>,
        approved_applications: Vec<Application>,
        status: InternshipStatus,
    ) -> Self {
        Self {
            pending_applications,
            approved_applications,
            accepted_applications: Vec::new(),
            is_on_internship: status.on_internship,
            fetched_at: Some(Utc::now()),
        }
    }

    /// Every tracked application, pending first.
    pub fn applications(&self) -> impl Iterator<Item = &Application> {
        self.pending_applications
            .iter()
            .chain(self.approved_applications.iter())
            .chain(self.accepted_applications.iter())
    }

    pub fn has_application_for_offer(&self, offer: OfferId) -> bool {
        self.applications().any(|application| application.targets(offer))
    }

    pub fn has_approved_application_for_offer(&self, offer: OfferId) -> bool {
        self.applications()
            .any(|application| application.targets(offer) && application.state.is_approved())
    }
}

/// Offer visible to students in their department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_of_internship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub paying: bool,
    pub remote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise_name: Option<String>,
}

impl Offer {
    /// Whole days between start and end, when both are known and ordered.
    pub fn duration_days(&self) -> Option<i64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end >= start => Some((end - start).num_days()),
            _ => None,
        }
    }
}

/// Optional narrowing of the offer listing. With no criteria the approved listing is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OfferFilter {
    #[serde(default)]
    pub paying: Option<bool>,
    #[serde(default)]
    pub remote: Option<bool>,
}

impl OfferFilter {
    pub fn is_empty(&self) -> bool {
        self.paying.is_none() && self.remote.is_none()
    }
}

/// Unseen message the backend posts when an enterprise approves or rejects a candidacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    /// Backend local time; the backend does not send an offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}
