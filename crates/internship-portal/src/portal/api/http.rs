use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::contract::{
    decode_applications, decode_notifications, decode_offers, ApplicationPayload,
    NotificationPayload, OfferPayload, StatusPayload,
};
use super::{ApiError, StudentApi};
use crate::portal::domain::{
    Application, ApplicationId, InternshipStatus, Notification, NotificationId, Offer, OfferFilter,
    OfferId,
};
use crate::portal::session::Session;
use crate::portal::submission::{ApplicationFiles, Attachment};

/// reqwest-backed client for the student endpoints of the REST backend.
#[derive(Debug, Clone)]
pub struct HttpStudentApi {
    client: Client,
    base_url: Url,
    session: Arc<Session>,
}

impl HttpStudentApi {
    pub fn new(client: Client, mut base_url: Url, session: Arc<Session>) -> Self {
        // Relative joins only keep the last path segment when it ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client,
            base_url,
            session,
        }
    }

    pub fn build_client(timeout: Duration) -> Result<Client, ApiError> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Unavailable(format!("http client setup failed: {err}")))
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::InvalidRequest(format!("cannot build url for {path}: {err}")))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.session.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            self.session.expire();
        }

        warn!(%url, status = status.as_u16(), "backend rejected request");
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let url = self.url(path)?;
        debug!(%url, "fetching");
        let response = self.execute(self.client.get(url)).await?;
        read_json(response).await
    }

    async fn fetch_applications(&self, path: &str) -> Result<Vec<Application>, ApiError> {
        let payloads = self
            .get_json::<Vec<ApplicationPayload>>(path)
            .await?
            .unwrap_or_default();
        decode_applications(payloads)
    }
}

/// Empty and `null` bodies decode to `None`.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ApiError> {
    let body = response
        .text()
        .await
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;

    if body.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<Option<T>>(&body).map_err(|err| ApiError::Malformed(err.to_string()))
}

fn attachment_part(attachment: &Attachment) -> Result<Part, ApiError> {
    Part::bytes(attachment.bytes.clone())
        .file_name(attachment.file_name.clone())
        .mime_str(attachment.content_type.as_ref())
        .map_err(|err| {
            ApiError::InvalidRequest(format!(
                "unsupported content type for {}: {err}",
                attachment.file_name
            ))
        })
}

impl StudentApi for HttpStudentApi {
    async fn pending_applications(&self) -> Result<Vec<Application>, ApiError> {
        self.fetch_applications("api/student/pendingApplicationsOfStudent")
            .await
    }

    async fn approved_applications(&self) -> Result<Vec<Application>, ApiError> {
        self.fetch_applications("api/student/applicationsApprovedOfStudent")
            .await
    }

    async fn internship_status(&self) -> Result<InternshipStatus, ApiError> {
        self.get_json::<StatusPayload>("api/student/status")
            .await?
            .map(InternshipStatus::from)
            .ok_or_else(|| ApiError::Malformed("empty internship status".to_string()))
    }

    async fn create_application(
        &self,
        offer: OfferId,
        files: &ApplicationFiles,
    ) -> Result<Application, ApiError> {
        if !offer.is_valid() {
            return Err(ApiError::InvalidRequest(format!("invalid offer id {offer}")));
        }

        let url = self.url(&format!("api/student/{offer}/createApplication"))?;
        let form = Form::new()
            .part("cv", attachment_part(&files.cv)?)
            .part("coverLetter", attachment_part(&files.cover_letter)?);

        debug!(%url, %offer, "submitting application");
        let response = self.execute(self.client.post(url).multipart(form)).await?;
        let payload = read_json::<ApplicationPayload>(response)
            .await?
            .ok_or_else(|| ApiError::Malformed("empty application payload".to_string()))?;
        let mut application = Application::try_from(payload)?;
        application.offer_id.get_or_insert(offer);
        Ok(application)
    }

    async fn update_student_status(
        &self,
        application: ApplicationId,
        accepted: bool,
    ) -> Result<Application, ApiError> {
        if !application.is_valid() {
            return Err(ApiError::InvalidRequest(format!(
                "invalid application id {application}"
            )));
        }

        let url = self.url(&format!("api/student/{application}/updateStudentStatus"))?;
        let request = self
            .client
            .put(url)
            .query(&[("applicationAccepted", accepted)])
            .json(&json!({}));

        let response = self.execute(request).await?;
        let payload = read_json::<ApplicationPayload>(response)
            .await?
            .ok_or_else(|| ApiError::Malformed("empty application payload".to_string()))?;
        Application::try_from(payload)
    }

    async fn delete_application(&self, application: ApplicationId) -> Result<(), ApiError> {
        if !application.is_valid() {
            return Err(ApiError::InvalidRequest(format!(
                "invalid application id {application}"
            )));
        }

        let url = self.url(&format!("api/student/{application}"))?;
        self.execute(self.client.delete(url)).await?;
        Ok(())
    }

    async fn list_offers(&self, filter: OfferFilter) -> Result<Vec<Offer>, ApiError> {
        let payloads = if filter.is_empty() {
            self.get_json::<Vec<OfferPayload>>("api/student/offersByApprovedStatus")
                .await?
        } else {
            let mut params = Vec::new();
            if let Some(paying) = filter.paying {
                params.push(("paying", paying));
            }
            if let Some(remote) = filter.remote {
                params.push(("remote", remote));
            }
            let url = self.url("api/student/filter")?;
            let response = self.execute(self.client.get(url).query(&params)).await?;
            read_json::<Vec<OfferPayload>>(response).await?
        };

        decode_offers(payloads.unwrap_or_default())
    }

    async fn unseen_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let payloads = self
            .get_json::<Vec<NotificationPayload>>("getNotifications/getUnseenNotifications")
            .await?
            .unwrap_or_default();
        decode_notifications(payloads)
    }

    async fn mark_notification_seen(&self, notification: NotificationId) -> Result<(), ApiError> {
        if !notification.is_valid() {
            return Err(ApiError::InvalidRequest(format!(
                "invalid notification id {notification}"
            )));
        }

        // The backend answers with a plain-text acknowledgement.
        let url = self.url(&format!(
            "getNotifications/userNotifications/{notification}/seen"
        ))?;
        self.execute(self.client.put(url).json(&json!({}))).await?;
        Ok(())
    }
}
