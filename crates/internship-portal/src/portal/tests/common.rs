use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Notify;

use crate::portal::api::{ApiError, StudentApi};
use crate::portal::domain::{
    Application, ApplicationId, ApplicationState, InternshipStatus, Notification, NotificationId,
    Offer, OfferFilter, OfferId, StatusSnapshot,
};
use crate::portal::router::PortalProvider;
use crate::portal::service::StudentPortal;
use crate::portal::session::Session;
use crate::portal::submission::{ApplicationDraft, ApplicationFiles, Attachment};

pub(super) fn application(id: i64, offer: i64, state: ApplicationState) -> Application {
    Application {
        id: ApplicationId(id),
        offer_id: Some(OfferId(offer)),
        state,
        offer_title: Some(format!("Stage {offer}")),
        enterprise_name: Some("Acme".to_string()),
    }
}

pub(super) fn snapshot(
    pending: Vec<Application>,
    approved: Vec<Application>,
    on_internship: bool,
) -> StatusSnapshot {
    StatusSnapshot::new(
        pending,
        approved,
        InternshipStatus {
            on_internship,
            message: None,
        },
    )
}

pub(super) fn offer(id: i64, paying: bool, remote: bool) -> Offer {
    Offer {
        id: OfferId(id),
        title: format!("Stage {id}"),
        domain: Some("Informatique".to_string()),
        type_of_internship: Some("PFE".to_string()),
        start_date: NaiveDate::from_ymd_opt(2025, 2, 1),
        end_date: NaiveDate::from_ymd_opt(2025, 7, 31),
        paying,
        remote,
        enterprise_name: Some("Acme".to_string()),
    }
}

pub(super) fn notification(id: i64, message: &str) -> Notification {
    Notification {
        id: NotificationId(id),
        message: message.to_string(),
        created_at: NaiveDate::from_ymd_opt(2025, 3, 1).and_then(|day| day.and_hms_opt(9, 30, 0)),
    }
}

pub(super) fn draft() -> ApplicationDraft {
    ApplicationDraft::new(
        Attachment::pdf("cv.pdf", b"%PDF-1.4 cv".to_vec()),
        Attachment::pdf("lettre.pdf", b"%PDF-1.4 lettre".to_vec()),
    )
}

/// In-memory stand-in for the REST backend. It enforces the same business rules as the real
/// one so that client-side predictions can be checked against it.
#[derive(Default)]
pub(super) struct FakeStudentApi {
    backend: Mutex<FakeBackend>,
    session: Mutex<Option<Arc<Session>>>,
    status_fetches: AtomicUsize,
    submissions: AtomicUsize,
    mutations: AtomicUsize,
    hold_fetches: AtomicBool,
    hold_submissions: AtomicBool,
    gate: Notify,
}

#[derive(Default)]
struct FakeBackend {
    pending: Vec<Application>,
    approved: Vec<Application>,
    on_internship: bool,
    offers: Vec<Offer>,
    notifications: Vec<Notification>,
    next_id: i64,
    fetch_error: Option<ApiError>,
    submit_error: Option<ApiError>,
    mutation_error: Option<ApiError>,
    unauthorized: bool,
}

impl FakeStudentApi {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn with_pending(self, application: Application) -> Self {
        self.backend().pending.push(application);
        self
    }

    pub(super) fn with_approved(self, application: Application) -> Self {
        self.backend().approved.push(application);
        self
    }

    pub(super) fn on_internship(self) -> Self {
        self.backend().on_internship = true;
        self
    }

    pub(super) fn with_offers(self, offers: Vec<Offer>) -> Self {
        self.backend().offers = offers;
        self
    }

    pub(super) fn with_notification(self, notification: Notification) -> Self {
        self.backend().notifications.push(notification);
        self
    }

    pub(super) fn failing_fetches(self, error: ApiError) -> Self {
        self.backend().fetch_error = Some(error);
        self
    }

    pub(super) fn failing_submissions(self, error: ApiError) -> Self {
        self.backend().submit_error = Some(error);
        self
    }

    pub(super) fn failing_mutations(self, error: ApiError) -> Self {
        self.backend().mutation_error = Some(error);
        self
    }

    /// Every call answers 401 and expires the bound session.
    pub(super) fn unauthorized(self) -> Self {
        self.backend().unauthorized = true;
        self
    }

    pub(super) fn bind(&self, session: Arc<Session>) {
        *self.session.lock().expect("session mutex poisoned") = Some(session);
    }

    pub(super) fn set_pending(&self, pending: Vec<Application>) {
        self.backend().pending = pending;
    }

    pub(super) fn set_on_internship(&self, value: bool) {
        self.backend().on_internship = value;
    }

    pub(super) fn hold_fetches(&self, hold: bool) {
        self.hold_fetches.store(hold, Ordering::SeqCst);
    }

    pub(super) fn hold_submissions(&self, hold: bool) {
        self.hold_submissions.store(hold, Ordering::SeqCst);
    }

    pub(super) fn release(&self) {
        self.gate.notify_one();
    }

    pub(super) fn status_fetches(&self) -> usize {
        self.status_fetches.load(Ordering::SeqCst)
    }

    pub(super) fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub(super) fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub(super) fn server_notifications(&self) -> Vec<Notification> {
        self.backend().notifications.clone()
    }

    /// Enterprise decision on a pending application, announced through a notification the way
    /// the backend does it.
    pub(super) fn decide(&self, application: ApplicationId, approved: bool) {
        let mut backend = self.backend();
        let Some(position) = backend
            .pending
            .iter()
            .position(|candidate| candidate.id == application)
        else {
            return;
        };
        let mut decided = backend.pending.remove(position);
        let next = backend.notifications.len() as i64 + 1;
        if approved {
            decided.state = ApplicationState::Approved;
            backend.approved.push(decided);
            backend
                .notifications
                .push(notification(next, "Votre candidature a été approuvée"));
        } else {
            decided.state = ApplicationState::Rejected;
            backend.pending.push(decided);
            backend
                .notifications
                .push(notification(next, "Votre candidature a été refusée"));
        }
    }

    pub(super) fn server_pending(&self) -> Vec<Application> {
        self.backend().pending.clone()
    }

    fn backend(&self) -> std::sync::MutexGuard<'_, FakeBackend> {
        self.backend.lock().expect("backend mutex poisoned")
    }

    fn check_session(&self) -> Result<(), ApiError> {
        if !self.backend().unauthorized {
            return Ok(());
        }
        if let Some(session) = self.session.lock().expect("session mutex poisoned").as_ref() {
            session.expire();
        }
        Err(ApiError::Unauthorized)
    }

    fn fetch_guard(&self) -> Result<(), ApiError> {
        self.check_session()?;
        match self.backend().fetch_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn mutation_guard(&self) -> Result<(), ApiError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_session()?;
        match self.backend().mutation_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl StudentApi for FakeStudentApi {
    async fn pending_applications(&self) -> Result<Vec<Application>, ApiError> {
        self.status_fetches.fetch_add(1, Ordering::SeqCst);
        if self.hold_fetches.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.fetch_guard()?;
        Ok(self.backend().pending.clone())
    }

    async fn approved_applications(&self) -> Result<Vec<Application>, ApiError> {
        self.fetch_guard()?;
        Ok(self.backend().approved.clone())
    }

    async fn internship_status(&self) -> Result<InternshipStatus, ApiError> {
        self.fetch_guard()?;
        Ok(InternshipStatus {
            on_internship: self.backend().on_internship,
            message: None,
        })
    }

    async fn create_application(
        &self,
        offer: OfferId,
        _files: &ApplicationFiles,
    ) -> Result<Application, ApiError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if self.hold_submissions.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.check_session()?;

        let mut backend = self.backend();
        if let Some(error) = backend.submit_error.clone() {
            return Err(error);
        }
        if backend.on_internship {
            return Err(ApiError::Rejected {
                status: 400,
                message: "Vous êtes déjà en stage".to_string(),
            });
        }
        let exists = backend
            .pending
            .iter()
            .chain(backend.approved.iter())
            .any(|existing| existing.targets(offer));
        if exists {
            return Err(ApiError::Conflict(
                "Vous avez déjà postulé pour cette offre".to_string(),
            ));
        }

        backend.next_id += 1;
        let created = application(100 + backend.next_id, offer.0, ApplicationState::Pending);
        backend.pending.push(created.clone());
        Ok(created)
    }

    async fn update_student_status(
        &self,
        application: ApplicationId,
        accepted: bool,
    ) -> Result<Application, ApiError> {
        self.mutation_guard()?;

        let mut backend = self.backend();
        let position = backend
            .approved
            .iter()
            .position(|candidate| candidate.id == application)
            .ok_or_else(|| ApiError::NotFound(format!("application {application}")))?;

        let mut updated = backend.approved.remove(position);
        if accepted {
            updated.state = ApplicationState::Accepted;
            backend.approved.push(updated.clone());
            backend.on_internship = true;
        } else {
            updated.state = ApplicationState::Rejected;
            backend.pending.push(updated.clone());
        }
        Ok(updated)
    }

    async fn delete_application(&self, application: ApplicationId) -> Result<(), ApiError> {
        self.mutation_guard()?;

        let mut backend = self.backend();
        let before = backend.pending.len();
        backend.pending.retain(|candidate| candidate.id != application);
        if backend.pending.len() == before {
            return Err(ApiError::NotFound(format!("application {application}")));
        }
        Ok(())
    }

    async fn list_offers(&self, filter: OfferFilter) -> Result<Vec<Offer>, ApiError> {
        self.fetch_guard()?;
        let offers = self
            .backend()
            .offers
            .iter()
            .filter(|offer| filter.paying.map_or(true, |paying| offer.paying == paying))
            .filter(|offer| filter.remote.map_or(true, |remote| offer.remote == remote))
            .cloned()
            .collect();
        Ok(offers)
    }

    async fn unseen_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.fetch_guard()?;
        Ok(self.backend().notifications.clone())
    }

    async fn mark_notification_seen(&self, notification: NotificationId) -> Result<(), ApiError> {
        self.mutation_guard()?;

        let mut backend = self.backend();
        let before = backend.notifications.len();
        backend
            .notifications
            .retain(|candidate| candidate.id != notification);
        if backend.notifications.len() == before {
            return Err(ApiError::NotFound(format!("notification {notification}")));
        }
        Ok(())
    }
}

pub(super) fn portal(api: FakeStudentApi) -> (StudentPortal<FakeStudentApi>, Arc<FakeStudentApi>) {
    let api = Arc::new(api);
    (StudentPortal::new(Arc::clone(&api)), api)
}

/// Hands out portals over one shared fake backend, binding each request's session to it.
pub(super) struct FakeProvider {
    pub(super) api: Arc<FakeStudentApi>,
}

impl FakeProvider {
    pub(super) fn new(api: FakeStudentApi) -> Self {
        Self { api: Arc::new(api) }
    }
}

impl PortalProvider for FakeProvider {
    type Api = FakeStudentApi;

    fn open(&self, session: Arc<Session>) -> StudentPortal<FakeStudentApi> {
        self.api.bind(session);
        StudentPortal::new(Arc::clone(&self.api))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
