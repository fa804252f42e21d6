use crate::infra::{describe_period, open_portal};
use chrono::Local;
use clap::{ArgGroup, Args};
use internship_portal::config::AppConfig;
use internship_portal::error::AppError;
use internship_portal::portal::{
    ApiError, Application, ApplicationDraft, ApplicationId, Attachment, NotificationId,
    OfferFilter, OfferId, PortalError, StatusSnapshot,
};
use internship_portal::telemetry;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct SessionArgs {
    /// Bearer token of the signed-in student (defaults to PORTAL_TOKEN)
    #[arg(long)]
    pub(crate) token: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct StatusArgs {
    #[command(flatten)]
    pub(crate) session: SessionArgs,
    /// Print the raw snapshot as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct OffersArgs {
    #[command(flatten)]
    pub(crate) session: SessionArgs,
    /// Print the offer board as JSON
    #[arg(long)]
    pub(crate) json: bool,
    /// Only paid internships (true) or only unpaid ones (false)
    #[arg(long)]
    pub(crate) paying: Option<bool>,
    /// Only remote internships (true) or only on-site ones (false)
    #[arg(long)]
    pub(crate) remote: Option<bool>,
}

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    #[command(flatten)]
    pub(crate) session: SessionArgs,
    /// Offer identifier
    #[arg(long)]
    pub(crate) offer: i64,
}

#[derive(Args, Debug)]
pub(crate) struct ApplyArgs {
    #[command(flatten)]
    pub(crate) session: SessionArgs,
    /// Offer identifier
    #[arg(long)]
    pub(crate) offer: i64,
    /// Path to the CV document
    #[arg(long)]
    pub(crate) cv: PathBuf,
    /// Path to the cover letter document
    #[arg(long)]
    pub(crate) cover_letter: PathBuf,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("decision").required(true).args(["accept", "decline"])))]
pub(crate) struct RespondArgs {
    #[command(flatten)]
    pub(crate) session: SessionArgs,
    /// Application the enterprise approved
    #[arg(long)]
    pub(crate) application: i64,
    /// Accept the offer
    #[arg(long)]
    pub(crate) accept: bool,
    /// Decline the offer
    #[arg(long)]
    pub(crate) decline: bool,
}

#[derive(Args, Debug)]
pub(crate) struct WithdrawArgs {
    #[command(flatten)]
    pub(crate) session: SessionArgs,
    /// Pending application to withdraw
    #[arg(long)]
    pub(crate) application: i64,
}

#[derive(Args, Debug)]
pub(crate) struct NotificationsArgs {
    #[command(flatten)]
    pub(crate) session: SessionArgs,
    /// Print the unseen notifications as JSON
    #[arg(long)]
    pub(crate) json: bool,
    /// Mark one notification as seen instead of listing
    #[arg(long, value_name = "ID")]
    pub(crate) seen: Option<i64>,
}

fn load(session: SessionArgs) -> Result<(AppConfig, String), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let token = config.backend.resolve_token(session.token)?;
    Ok((config, token))
}

pub(crate) async fn run_status(args: StatusArgs) -> Result<(), AppError> {
    let (config, token) = load(args.session)?;
    let (session, portal) = open_portal(&config.backend, token)?;

    let snapshot = portal.refresh().await;
    if !session.is_active() {
        return Err(ApiError::Unauthorized.into());
    }
    if args.json {
        print_json(&snapshot);
    } else {
        render_status(&snapshot);
    }
    Ok(())
}

pub(crate) async fn run_offers(args: OffersArgs) -> Result<(), AppError> {
    let OffersArgs {
        session,
        json,
        paying,
        remote,
    } = args;
    let (config, token) = load(session)?;
    let (_, portal) = open_portal(&config.backend, token)?;

    let board = portal.offer_board(OfferFilter { paying, remote }).await?;
    if json {
        print_json(&board);
        return Ok(());
    }
    if board.is_empty() {
        println!("Aucune offre disponible.");
        return Ok(());
    }

    println!("{} offre(s)", board.len());
    for card in &board {
        let offer = &card.offer;
        println!(
            "- [{}] {} ({})",
            offer.id,
            offer.title,
            offer.enterprise_name.as_deref().unwrap_or("entreprise inconnue")
        );
        println!(
            "    {} | {} | {}",
            describe_period(offer),
            if offer.paying { "rémunéré" } else { "non rémunéré" },
            if offer.remote { "télétravail" } else { "sur site" }
        );
        let state = if card.button.disabled { "désactivé" } else { "actif" };
        println!("    Bouton: {} ({state})", card.button.label);
    }
    Ok(())
}

pub(crate) async fn run_eligibility(args: EligibilityArgs) -> Result<(), AppError> {
    let (config, token) = load(args.session)?;
    let (_, portal) = open_portal(&config.backend, token)?;
    let offer = OfferId(args.offer);

    portal.refresh().await;
    let verdict = portal.eligibility(offer);
    let button = portal.apply_button(offer);

    println!("Offre {offer}: {}", button.label);
    match verdict.reason {
        Some(reason) => println!("  {} ({})", reason.explanation(), reason.code()),
        None => println!("  Vous pouvez candidater à cette offre."),
    }
    Ok(())
}

pub(crate) async fn run_apply(args: ApplyArgs) -> Result<(), AppError> {
    let ApplyArgs {
        session,
        offer,
        cv,
        cover_letter,
    } = args;
    let (config, token) = load(session)?;
    let (_, portal) = open_portal(&config.backend, token)?;

    let cv = Attachment::from_path(&cv).await.map_err(PortalError::from)?;
    let cover_letter = Attachment::from_path(&cover_letter)
        .await
        .map_err(PortalError::from)?;

    portal.refresh().await;
    match portal
        .submit(OfferId(offer), ApplicationDraft::new(cv, cover_letter))
        .await
    {
        Ok(application) => {
            println!("Candidature envoyée avec succès!");
            render_application(&application);
            Ok(())
        }
        Err(err) => {
            println!("{}", err.user_message());
            Err(err.into())
        }
    }
}

pub(crate) async fn run_respond(args: RespondArgs) -> Result<(), AppError> {
    let (config, token) = load(args.session)?;
    let (_, portal) = open_portal(&config.backend, token)?;
    let application = ApplicationId(args.application);

    let updated = if args.accept {
        portal.accept_offer(application).await?
    } else {
        portal.decline_offer(application).await?
    };

    println!(
        "{}",
        if args.accept {
            "Offre acceptée."
        } else {
            "Offre déclinée."
        }
    );
    render_application(&updated);
    render_status(&portal.snapshot());
    Ok(())
}

pub(crate) async fn run_withdraw(args: WithdrawArgs) -> Result<(), AppError> {
    let (config, token) = load(args.session)?;
    let (_, portal) = open_portal(&config.backend, token)?;

    portal
        .withdraw_application(ApplicationId(args.application))
        .await?;
    println!("Candidature {} retirée.", args.application);
    render_status(&portal.snapshot());
    Ok(())
}

pub(crate) async fn run_notifications(args: NotificationsArgs) -> Result<(), AppError> {
    let NotificationsArgs {
        session,
        json,
        seen,
    } = args;
    let (config, token) = load(session)?;
    let (_, portal) = open_portal(&config.backend, token)?;

    if let Some(id) = seen {
        portal.mark_notification_seen(NotificationId(id)).await?;
        println!("Notification {id} marquée comme lue.");
        return Ok(());
    }

    let notifications = portal.notifications().await?;
    if json {
        print_json(&notifications);
        return Ok(());
    }
    if notifications.is_empty() {
        println!("Aucune nouvelle notification.");
        return Ok(());
    }

    println!("{} notification(s) non lue(s)", notifications.len());
    for notification in &notifications {
        let when = notification
            .created_at
            .map(|at| at.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "date inconnue".to_string());
        println!("- [{}] {when}: {}", notification.id, notification.message);
    }
    render_status(&portal.snapshot());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("JSON indisponible: {err}"),
    }
}

fn render_status(snapshot: &StatusSnapshot) {
    if let Some(fetched_at) = snapshot.fetched_at {
        println!(
            "Statut au {}",
            fetched_at.with_timezone(&Local).format("%d/%m/%Y %H:%M")
        );
    } else {
        println!("Statut indisponible, affichage par défaut");
    }
    println!(
        "En stage: {}",
        if snapshot.is_on_internship { "oui" } else { "non" }
    );

    println!("Candidatures en attente: {}", snapshot.pending_applications.len());
    for application in &snapshot.pending_applications {
        render_application(application);
    }
    println!(
        "Candidatures approuvées: {}",
        snapshot.approved_applications.len()
    );
    for application in &snapshot.approved_applications {
        render_application(application);
    }
}

fn render_application(application: &Application) {
    let offer = application
        .offer_id
        .map(|offer| offer.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "  - #{} offre {} [{}] {}{}",
        application.id,
        offer,
        application.state,
        application.offer_title.as_deref().unwrap_or(""),
        application
            .enterprise_name
            .as_deref()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default()
    );
}
