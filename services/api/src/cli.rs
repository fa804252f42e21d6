use crate::commands::{
    run_apply, run_eligibility, run_notifications, run_offers, run_respond, run_status,
    run_withdraw, ApplyArgs, EligibilityArgs, NotificationsArgs, OffersArgs, RespondArgs,
    StatusArgs, WithdrawArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use internship_portal::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Internship Portal",
    about = "Serve the student portal API or act as a signed-in student from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Show pending and approved applications and the internship flag
    Status(StatusArgs),
    /// List offers with the apply button each one would show
    Offers(OffersArgs),
    /// Explain whether an application to one offer is possible
    Eligibility(EligibilityArgs),
    /// Submit an application with a CV and a cover letter
    Apply(ApplyArgs),
    /// Accept or decline an offer the enterprise approved
    Respond(RespondArgs),
    /// Withdraw a pending application
    Withdraw(WithdrawArgs),
    /// List unseen notifications or mark one as seen
    Notifications(NotificationsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Status(args) => run_status(args).await,
        Command::Offers(args) => run_offers(args).await,
        Command::Eligibility(args) => run_eligibility(args).await,
        Command::Apply(args) => run_apply(args).await,
        Command::Respond(args) => run_respond(args).await,
        Command::Withdraw(args) => run_withdraw(args).await,
        Command::Notifications(args) => run_notifications(args).await,
    }
}
