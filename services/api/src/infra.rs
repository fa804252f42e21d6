use internship_portal::config::BackendConfig;
use internship_portal::error::AppError;
use internship_portal::portal::{
    HttpPortalProvider, HttpStudentApi, Offer, PortalProvider, Session, StudentPortal,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn portal_provider(config: &BackendConfig) -> Result<HttpPortalProvider, AppError> {
    Ok(HttpPortalProvider::from_config(config)?)
}

/// One-shot session for CLI commands.
pub(crate) fn open_portal(
    config: &BackendConfig,
    token: String,
) -> Result<(Arc<Session>, StudentPortal<HttpStudentApi>), AppError> {
    let provider = portal_provider(config)?;
    let session = Session::start(token);
    let portal = provider.open(Arc::clone(&session));
    Ok((session, portal))
}

pub(crate) fn describe_period(offer: &Offer) -> String {
    match (offer.start_date, offer.end_date, offer.duration_days()) {
        (Some(start), Some(end), Some(days)) => format!(
            "du {} au {} ({days} jours)",
            start.format("%d/%m/%Y"),
            end.format("%d/%m/%Y"),
        ),
        (Some(start), _, _) => format!("à partir du {}", start.format("%d/%m/%Y")),
        (None, Some(end), _) => format!("jusqu'au {}", end.format("%d/%m/%Y")),
        (None, None, _) => "dates à définir".to_string(),
    }
}
