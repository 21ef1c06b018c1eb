use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use zbus::proxy;

use clockface_core::LogType;

#[proxy(
    interface = "org.clockface.Kiosk1",
    default_service = "org.clockface.Kiosk1",
    default_path = "/org/clockface/Kiosk1"
)]
trait Kiosk {
    fn start_session(&self, log_type: &str) -> zbus::Result<String>;
    fn cancel_session(&self) -> zbus::Result<()>;
    fn submit_sample(&self, found: bool, nose_x: f64) -> zbus::Result<()>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "clockface", about = "Clockface attendance kiosk CLI")]
struct Cli {
    /// Use the session bus instead of the system bus (development mode)
    #[arg(long)]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a capture attempt (in|out)
    Start {
        /// Attendance direction: "in" or "out"
        log_type: String,
    },
    /// Cancel the current capture attempt
    Cancel,
    /// Show kiosk status
    Status,
    /// Inject one landmark sample (diagnostics)
    Sample {
        /// Normalized horizontal nose-tip position [0, 1]
        #[arg(long)]
        nose_x: f64,
        /// Report "no face found" instead of a position
        #[arg(long)]
        no_face: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus (is clockfaced running?)")?;

    let kiosk = KioskProxy::new(&conn).await?;

    match cli.command {
        Commands::Start { log_type } => {
            if LogType::parse(&log_type).is_none() {
                bail!("unknown log type '{log_type}' (want in|out)");
            }
            let challenge = kiosk.start_session(&log_type).await?;
            println!("Attempt started. Turn your face: {challenge}");
        }
        Commands::Cancel => {
            kiosk.cancel_session().await?;
            println!("Attempt canceled.");
        }
        Commands::Status => {
            let raw = kiosk.status().await?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Sample { nose_x, no_face } => {
            kiosk.submit_sample(!no_face, nose_x).await?;
            println!("Sample delivered.");
        }
    }

    Ok(())
}
