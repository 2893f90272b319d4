use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::{error, info};

use synergy_session::api::create_shared_api_client;
use synergy_session::commands::{
    create_terminal_presenter, run_notifications, run_status, run_verify, NotificationCommand,
};
use synergy_session::config::SessionConfig;
use synergy_session::logging;
use synergy_session::notifications::create_shared_notification_store;
use synergy_session::presenter::create_toast_buffer;
use synergy_session::verification::{create_shared_verification_manager, VerificationChannel};

/// Verify contact details and manage notifications for a task-management account
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON session config (environment variables override it)
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print toasts as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which channels are verified
    Status,
    /// Verify the email address or mobile number on the profile
    Verify { channel: VerificationChannel },
    /// Work with notifications
    #[command(subcommand)]
    Notifications(NotificationCommand),
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();

    logging::init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = SessionConfig::load(args.config.as_deref())?;
    info!("Using backend at {}", config.base_url);

    let toast_buffer = create_toast_buffer(100, config.toast_duration());
    let presenter = create_terminal_presenter(toast_buffer, args.json);
    let api = create_shared_api_client(&config)?;

    match args.command {
        Command::Status => {
            let manager = create_shared_verification_manager(api, presenter, &config);
            run_status(&manager).await
        }
        Command::Verify { channel } => {
            let manager = create_shared_verification_manager(api, presenter, &config);
            run_verify(&manager, channel).await
        }
        Command::Notifications(command) => {
            let store = create_shared_notification_store(api, presenter);
            run_notifications(&store, command, config.poll_interval()).await
        }
    }
}
