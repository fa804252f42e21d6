use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::api::{ApiError, HttpStudentApi, StudentApi};
use super::domain::{ApplicationId, NotificationId, OfferFilter, OfferId};
use super::service::{PortalError, StudentPortal};
use super::session::Session;
use super::submission::{ApplicationDraft, Attachment, SubmissionError};
use crate::config::BackendConfig;

/// Builds one [`StudentPortal`] per incoming request, bound to the caller's session.
pub trait PortalProvider: Send + Sync + 'static {
    type Api: StudentApi + 'static;

    fn open(&self, session: Arc<Session>) -> StudentPortal<Self::Api>;
}

/// Provider talking to the REST backend; the reqwest pool is shared across sessions.
#[derive(Debug, Clone)]
pub struct HttpPortalProvider {
    client: Client,
    base_url: Url,
}

impl HttpPortalProvider {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = HttpStudentApi::build_client(config.request_timeout())?;
        Ok(Self::new(client, config.base_url.clone()))
    }

    pub fn api(&self, session: Arc<Session>) -> HttpStudentApi {
        HttpStudentApi::new(self.client.clone(), self.base_url.clone(), session)
    }
}

impl PortalProvider for HttpPortalProvider {
    type Api = HttpStudentApi;

    fn open(&self, session: Arc<Session>) -> StudentPortal<HttpStudentApi> {
        StudentPortal::new(Arc::new(self.api(session)))
    }
}

/// Student endpoints of the backend-for-frontend. Every route forwards the caller's bearer
/// token and starts from a fresh status snapshot.
pub fn portal_router<P>(provider: Arc<P>) -> Router
where
    P: PortalProvider,
{
    Router::new()
        .route("/api/v1/student/status", get(status_handler::<P>))
        .route("/api/v1/student/offers", get(offers_handler::<P>))
        .route(
            "/api/v1/student/offers/{offer_id}/eligibility",
            get(eligibility_handler::<P>),
        )
        .route(
            "/api/v1/student/offers/{offer_id}/applications",
            post(submit_handler::<P>),
        )
        .route(
            "/api/v1/student/applications/{application_id}/decision",
            put(decision_handler::<P>),
        )
        .route(
            "/api/v1/student/applications/{application_id}",
            delete(withdraw_handler::<P>),
        )
        .route(
            "/api/v1/student/notifications",
            get(notifications_handler::<P>),
        )
        .route(
            "/api/v1/student/notifications/{notification_id}/seen",
            put(notification_seen_handler::<P>),
        )
        .with_state(provider)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionQuery {
    accepted: bool,
}

pub(crate) async fn status_handler<P>(State(provider): State<Arc<P>>, headers: HeaderMap) -> Response
where
    P: PortalProvider,
{
    let (session, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    let snapshot = portal.refresh().await;
    if !session.is_active() {
        return session_expired();
    }
    (StatusCode::OK, axum::Json(snapshot)).into_response()
}

pub(crate) async fn offers_handler<P>(
    State(provider): State<Arc<P>>,
    headers: HeaderMap,
    Query(filter): Query<OfferFilter>,
) -> Response
where
    P: PortalProvider,
{
    let (_, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    match portal.offer_board(filter).await {
        Ok(cards) => (StatusCode::OK, axum::Json(cards)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn eligibility_handler<P>(
    State(provider): State<Arc<P>>,
    headers: HeaderMap,
    Path(offer_id): Path<i64>,
) -> Response
where
    P: PortalProvider,
{
    let (session, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    let offer = OfferId(offer_id);
    portal.refresh().await;
    if !session.is_active() {
        return session_expired();
    }

    let verdict = portal.eligibility(offer);
    let payload = json!({
        "offer_id": offer,
        "can_apply": verdict.can_apply,
        "reason": verdict.reason,
        "explanation": verdict.explanation(),
        "button": portal.apply_button(offer),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn submit_handler<P>(
    State(provider): State<Arc<P>>,
    Path(offer_id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response
where
    P: PortalProvider,
{
    let (session, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    let draft = match read_draft(multipart).await {
        Ok(draft) => draft,
        Err(err) => return error_response(err.into()),
    };

    portal.refresh().await;
    if !session.is_active() {
        return session_expired();
    }

    match portal.submit(OfferId(offer_id), draft).await {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decision_handler<P>(
    State(provider): State<Arc<P>>,
    headers: HeaderMap,
    Path(application_id): Path<i64>,
    Query(query): Query<DecisionQuery>,
) -> Response
where
    P: PortalProvider,
{
    let (_, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    let application = ApplicationId(application_id);
    let outcome = if query.accepted {
        portal.accept_offer(application).await
    } else {
        portal.decline_offer(application).await
    };

    match outcome {
        Ok(updated) => (StatusCode::OK, axum::Json(updated)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn withdraw_handler<P>(
    State(provider): State<Arc<P>>,
    headers: HeaderMap,
    Path(application_id): Path<i64>,
) -> Response
where
    P: PortalProvider,
{
    let (_, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    match portal
        .withdraw_application(ApplicationId(application_id))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn notifications_handler<P>(
    State(provider): State<Arc<P>>,
    headers: HeaderMap,
) -> Response
where
    P: PortalProvider,
{
    let (_, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    match portal.notifications().await {
        Ok(notifications) => {
            let payload = json!({
                "unread_count": notifications.len(),
                "notifications": notifications,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn notification_seen_handler<P>(
    State(provider): State<Arc<P>>,
    headers: HeaderMap,
    Path(notification_id): Path<i64>,
) -> Response
where
    P: PortalProvider,
{
    let (_, portal) = match open_portal(provider.as_ref(), &headers) {
        Ok(opened) => opened,
        Err(response) => return response,
    };

    match portal
        .mark_notification_seen(NotificationId(notification_id))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn open_portal<P>(
    provider: &P,
    headers: &HeaderMap,
) -> Result<(Arc<Session>, StudentPortal<P::Api>), Response>
where
    P: PortalProvider,
{
    let token = bearer_token(headers).ok_or_else(|| {
        let payload = json!({ "error": "missing bearer token" });
        (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
    })?;

    let session = Session::start(token);
    let portal = provider.open(Arc::clone(&session));
    Ok((session, portal))
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

async fn read_draft(mut multipart: Multipart) -> Result<ApplicationDraft, SubmissionError> {
    let mut draft = ApplicationDraft::default();

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| SubmissionError::Validation(format!("formulaire invalide: {err}")))?;
        let Some(field) = field else {
            break;
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
        let content_type = field
            .content_type()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| mime_guess::from_path(&file_name).first_or_octet_stream());
        let bytes = field
            .bytes()
            .await
            .map_err(|err| SubmissionError::Validation(format!("formulaire invalide: {err}")))?;
        let attachment = Attachment::new(file_name, content_type, bytes.to_vec());

        match name.as_str() {
            "cv" => draft.cv = Some(attachment),
            "coverLetter" => draft.cover_letter = Some(attachment),
            other => warn!(field = other, "ignoring unexpected multipart field"),
        }
    }

    Ok(draft)
}

fn session_expired() -> Response {
    error_response(PortalError::Api(ApiError::Unauthorized))
}

pub(crate) fn error_response(err: PortalError) -> Response {
    let status = status_for(&err);
    let mut payload = json!({
        "error": err.user_message(),
        "detail": err.to_string(),
    });
    if let PortalError::Submission(SubmissionError::Ineligible { reason, .. }) = &err {
        payload["reason"] = json!(reason.code());
    }
    (status, axum::Json(payload)).into_response()
}

fn status_for(err: &PortalError) -> StatusCode {
    match err {
        PortalError::Api(api) | PortalError::Submission(SubmissionError::Backend(api)) => {
            match api {
                ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
                ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
                ApiError::NotFound(_) => StatusCode::NOT_FOUND,
                ApiError::Conflict(_) => StatusCode::CONFLICT,
                ApiError::Rejected { .. } | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ApiError::Unavailable(_) | ApiError::Malformed(_) => StatusCode::BAD_GATEWAY,
            }
        }
        PortalError::Submission(SubmissionError::Ineligible { .. })
        | PortalError::Submission(SubmissionError::InProgress(_)) => StatusCode::CONFLICT,
        PortalError::Submission(SubmissionError::Validation(_)) | PortalError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}
