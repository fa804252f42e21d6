//! Wire shapes of the backend responses. Everything is optional on the wire and validated
//! here so that only well-formed domain values travel inward.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::warn;

use super::ApiError;
use crate::portal::domain::{
    Application, ApplicationId, ApplicationState, InternshipStatus, Notification, NotificationId,
    Offer, OfferId,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApplicationPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub offer: Option<OfferRefPayload>,
    /// Flattened reference some endpoints emit instead of a nested offer.
    #[serde(default)]
    pub offer_id: Option<i64>,
    #[serde(default)]
    pub enterprise: Option<EnterpriseRefPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OfferRefPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnterpriseRefPayload {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusPayload {
    #[serde(default, alias = "inInternship")]
    pub on_internship: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OfferPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub type_of_internship: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub paying: Option<bool>,
    #[serde(default)]
    pub remote: Option<bool>,
    #[serde(default)]
    pub enterprise: Option<EnterpriseRefPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl TryFrom<ApplicationPayload> for Application {
    type Error = ApiError;

    fn try_from(payload: ApplicationPayload) -> Result<Self, Self::Error> {
        let id = payload
            .id
            .map(ApplicationId)
            .filter(|id| id.is_valid())
            .ok_or_else(|| ApiError::Malformed("application without a valid id".to_string()))?;

        // The backend persists new applications as PENDING.
        let state = match payload.state.as_deref() {
            None => ApplicationState::Pending,
            Some(raw) => ApplicationState::parse(raw).ok_or_else(|| {
                ApiError::Malformed(format!("application {id} has unknown state '{raw}'"))
            })?,
        };

        let offer_id = payload
            .offer
            .as_ref()
            .and_then(|offer| offer.id)
            .or(payload.offer_id)
            .map(OfferId)
            .filter(|offer| offer.is_valid());

        Ok(Application {
            id,
            offer_id,
            state,
            offer_title: payload.offer.and_then(|offer| offer.title),
            enterprise_name: payload.enterprise.and_then(|enterprise| enterprise.name),
        })
    }
}

impl From<StatusPayload> for InternshipStatus {
    fn from(payload: StatusPayload) -> Self {
        InternshipStatus {
            on_internship: payload.on_internship,
            message: payload.message,
        }
    }
}

impl TryFrom<OfferPayload> for Offer {
    type Error = ApiError;

    fn try_from(payload: OfferPayload) -> Result<Self, Self::Error> {
        let id = payload
            .id
            .map(OfferId)
            .filter(|id| id.is_valid())
            .ok_or_else(|| ApiError::Malformed("offer without a valid id".to_string()))?;

        Ok(Offer {
            id,
            title: payload.title.unwrap_or_else(|| format!("Offre {id}")),
            domain: payload.domain,
            type_of_internship: payload.type_of_internship,
            start_date: parse_optional_date(id, payload.start_date.as_deref()),
            end_date: parse_optional_date(id, payload.end_date.as_deref()),
            paying: payload.paying.unwrap_or(false),
            remote: payload.remote.unwrap_or(false),
            enterprise_name: payload.enterprise.and_then(|enterprise| enterprise.name),
        })
    }
}

impl TryFrom<NotificationPayload> for Notification {
    type Error = ApiError;

    fn try_from(payload: NotificationPayload) -> Result<Self, Self::Error> {
        let id = payload
            .id
            .map(NotificationId)
            .filter(|id| id.is_valid())
            .ok_or_else(|| ApiError::Malformed("notification without a valid id".to_string()))?;

        let created_at = payload.created_at.as_deref().and_then(|raw| {
            raw.trim()
                .parse::<NaiveDateTime>()
                .map_err(|err| warn!(notification = %id, raw, %err, "ignoring unparsable timestamp"))
                .ok()
        });

        Ok(Notification {
            id,
            message: payload.message.unwrap_or_default(),
            created_at,
        })
    }
}

fn parse_optional_date(offer: OfferId, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    // Timestamps are accepted by keeping their date part.
    let date_part = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(err) => {
            warn!(%offer, raw, %err, "ignoring unparsable offer date");
            None
        }
    }
}

pub(crate) fn decode_applications(
    payloads: Vec<ApplicationPayload>,
) -> Result<Vec<Application>, ApiError> {
    payloads.into_iter().map(Application::try_from).collect()
}

pub(crate) fn decode_offers(payloads: Vec<OfferPayload>) -> Result<Vec<Offer>, ApiError> {
    payloads.into_iter().map(Offer::try_from).collect()
}

pub(crate) fn decode_notifications(
    payloads: Vec<NotificationPayload>,
) -> Result<Vec<Notification>, ApiError> {
    payloads.into_iter().map(Notification::try_from).collect()
}
