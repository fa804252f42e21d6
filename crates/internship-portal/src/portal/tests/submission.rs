use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::portal::api::ApiError;
use crate::portal::domain::{ApplicationState, OfferId};
use crate::portal::eligibility::{evaluate, IneligibilityReason};
use crate::portal::service::{PortalError, StudentPortal};
use crate::portal::session::{Session, SessionState};
use crate::portal::submission::{ApplicationDraft, Attachment, SubmissionError, SubmissionState};

#[tokio::test]
async fn missing_documents_are_rejected_before_any_request() {
    let (portal, api) = portal(FakeStudentApi::new());

    let mut without_letter = draft();
    without_letter.cover_letter = None;
    let err = portal
        .submit(OfferId(42), without_letter)
        .await
        .expect_err("cover letter is required");
    assert!(matches!(
        err,
        PortalError::Submission(SubmissionError::Validation(ref message))
            if message.contains("lettre de motivation")
    ));

    let empty_cv = ApplicationDraft {
        cv: Some(Attachment::pdf("cv.pdf", Vec::new())),
        ..draft()
    };
    let err = portal
        .submit(OfferId(42), empty_cv)
        .await
        .expect_err("empty cv is refused");
    assert_eq!(err.user_message(), "Le CV est requis");

    assert_eq!(api.submissions(), 0);
    assert_eq!(api.status_fetches(), 0);
    assert_eq!(portal.submission_state(), SubmissionState::Idle);
}

#[tokio::test]
async fn non_positive_offer_ids_never_reach_the_backend() {
    let (portal, api) = portal(FakeStudentApi::new());

    for offer in [0, -3] {
        let err = portal
            .submit(OfferId(offer), draft())
            .await
            .expect_err("invalid offer id");
        assert!(matches!(
            err,
            PortalError::Submission(SubmissionError::Validation(_))
        ));
    }
    assert_eq!(api.submissions(), 0);
}

#[tokio::test]
async fn known_ineligibility_blocks_submission_locally() {
    let (portal, api) = portal(
        FakeStudentApi::new().with_pending(application(1, 42, ApplicationState::Pending)),
    );
    portal.refresh().await;

    let err = portal
        .submit(OfferId(42), draft())
        .await
        .expect_err("already applied");

    assert_eq!(
        err,
        PortalError::Submission(SubmissionError::Ineligible {
            offer: OfferId(42),
            reason: IneligibilityReason::AlreadyApplied,
        })
    );
    assert_eq!(api.submissions(), 0);
    assert_eq!(portal.submission_state(), SubmissionState::Idle);
}

#[tokio::test]
async fn successful_submission_refreshes_before_reporting_success() {
    let (portal, api) = portal(FakeStudentApi::new());
    portal.refresh().await;
    let fetches = api.status_fetches();

    let created = portal
        .submit(OfferId(42), draft())
        .await
        .expect("submission accepted");

    assert_eq!(created.offer_id, Some(OfferId(42)));
    assert_eq!(created.state, ApplicationState::Pending);
    assert_eq!(api.status_fetches(), fetches + 1);
    assert_eq!(
        portal.submission_state(),
        SubmissionState::Succeeded {
            application: created.clone()
        }
    );
    assert_eq!(portal.apply_button(OfferId(42)).label, "Déjà candidaté");
}

#[tokio::test]
async fn conflict_from_backend_reconciles_local_state() {
    // Applied from another tab: the backend knows, the local snapshot does not.
    let (portal, api) = portal(FakeStudentApi::new());
    portal.refresh().await;
    api.set_pending(vec![application(9, 42, ApplicationState::Pending)]);
    assert!(portal.eligibility(OfferId(42)).can_apply);

    let err = portal
        .submit(OfferId(42), draft())
        .await
        .expect_err("backend refuses duplicate");

    assert!(matches!(
        err,
        PortalError::Submission(SubmissionError::Backend(ApiError::Conflict(_)))
    ));
    assert_eq!(err.user_message(), "Vous avez déjà postulé pour cette offre");
    assert!(!evaluate(OfferId(42), &portal.snapshot()).can_apply);
    assert_eq!(portal.submission_state(), SubmissionState::Idle);
    assert_eq!(api.server_pending().len(), 1);
}

#[tokio::test]
async fn internship_refusal_reported_as_bad_request_is_a_conflict() {
    let (portal, api) = portal(FakeStudentApi::new());
    portal.refresh().await;
    api.set_on_internship(true);

    let err = portal
        .submit(OfferId(42), draft())
        .await
        .expect_err("student already on internship");

    assert!(matches!(
        err,
        PortalError::Submission(SubmissionError::Backend(ApiError::Rejected { status: 400, .. }))
    ));
    assert_eq!(
        portal.eligibility(OfferId(42)).reason,
        Some(IneligibilityReason::OnInternship)
    );
    assert_eq!(portal.submission_state(), SubmissionState::Idle);
}

#[tokio::test]
async fn transport_failure_leaves_failed_state_and_still_refreshes() {
    let (portal, api) = portal(
        FakeStudentApi::new().failing_submissions(ApiError::Unavailable("timeout".to_string())),
    );
    let fetches = api.status_fetches();

    let err = portal
        .submit(OfferId(42), draft())
        .await
        .expect_err("transport failure");

    assert_eq!(
        err.user_message(),
        "Erreur lors de la création de la candidature"
    );
    assert_eq!(api.status_fetches(), fetches + 1);
    assert!(matches!(
        portal.submission_state(),
        SubmissionState::Failed { offer_id: OfferId(42), .. }
    ));
}

#[tokio::test]
async fn expired_session_returns_to_idle_without_refreshing() {
    let session = Session::start("token-abc");
    let api = FakeStudentApi::new().unauthorized();
    api.bind(Arc::clone(&session));
    let api = Arc::new(api);
    let portal = StudentPortal::new(Arc::clone(&api));

    let err = portal
        .submit(OfferId(42), draft())
        .await
        .expect_err("session expired");

    assert_eq!(
        err,
        PortalError::Submission(SubmissionError::Backend(ApiError::Unauthorized))
    );
    assert_eq!(err.user_message(), "Session expirée. Veuillez vous reconnecter.");
    assert_eq!(api.status_fetches(), 0);
    assert_eq!(portal.submission_state(), SubmissionState::Idle);
    assert_eq!(session.state(), SessionState::Expired);
    assert_eq!(session.bearer(), None);
}

#[tokio::test]
async fn concurrent_submission_is_rejected_while_one_is_in_flight() {
    let (portal, api) = portal(FakeStudentApi::new());
    let portal = Arc::new(portal);
    api.hold_submissions(true);

    let first = tokio::spawn({
        let portal = Arc::clone(&portal);
        async move { portal.submit(OfferId(42), draft()).await }
    });
    while api.submissions() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        portal.submission_state(),
        SubmissionState::Submitting {
            offer_id: OfferId(42)
        }
    );

    let err = portal
        .submit(OfferId(43), draft())
        .await
        .expect_err("machine is busy");
    assert_eq!(
        err,
        PortalError::Submission(SubmissionError::InProgress(OfferId(42)))
    );

    api.hold_submissions(false);
    api.release();
    first
        .await
        .expect("task joins")
        .expect("first submission succeeds");
    assert_eq!(api.submissions(), 1);
}

#[tokio::test]
async fn cancelled_submission_releases_the_machine() {
    let (portal, api) = portal(FakeStudentApi::new());
    api.hold_submissions(true);

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        portal.submit(OfferId(42), draft()),
    )
    .await;
    assert!(outcome.is_err(), "held submission times out");
    assert_eq!(portal.submission_state(), SubmissionState::Idle);

    api.hold_submissions(false);
    let created = portal
        .submit(OfferId(7), draft())
        .await
        .expect("next submission is accepted");
    assert_eq!(created.offer_id, Some(OfferId(7)));
    assert_eq!(
        portal.submission_state(),
        SubmissionState::Succeeded {
            application: created
        }
    );
}

#[tokio::test]
async fn attachments_are_read_from_disk_with_guessed_type() {
    let path = std::env::temp_dir().join(format!("portal-cv-{}.pdf", std::process::id()));
    tokio::fs::write(&path, b"%PDF-1.4").await.expect("write fixture");

    let attachment = Attachment::from_path(&path).await.expect("readable file");
    tokio::fs::remove_file(&path).await.ok();

    assert_eq!(attachment.content_type, mime::APPLICATION_PDF);
    assert_eq!(attachment.bytes, b"%PDF-1.4".to_vec());
    assert!(attachment.file_name.ends_with(".pdf"));

    let missing = Attachment::from_path(path.with_extension("missing")).await;
    assert!(matches!(missing, Err(SubmissionError::Validation(_))));
}
