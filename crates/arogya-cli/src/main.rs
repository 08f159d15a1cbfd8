//! Arogya Mitra CLI - command-line access to the Arogya Mitra health
//! services: scheme eligibility, the patient report vault and hospital
//! report uploads.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arogya_core::config::{Config, BASE_URL_ENV};

/// Log file name in the data directory
const LOG_FILE: &str = "arogya.log";

#[derive(Parser, Debug)]
#[command(name = "arogya", version, about = "Arogya Mitra health services client")]
struct Cli {
    /// Backend address, overriding the configuration file
    #[arg(long, global = true, env = BASE_URL_ENV)]
    base_url: Option<String>,

    /// Keep the session in memory only; nothing is written to disk
    #[arg(long, global = true, default_value_t = false)]
    ephemeral: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in as a patient or as hospital staff
    Login {
        /// Log in through the hospital staff endpoint
        #[arg(long, default_value_t = false)]
        hospital: bool,

        /// Username; defaults to the last one used
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Log out and forget the stored session
    Logout,

    /// Show who is signed in
    Whoami,

    /// Create a new account
    Register {
        #[command(subcommand)]
        cmd: RegisterCommand,
    },

    /// Government health scheme eligibility
    Schemes {
        #[command(subcommand)]
        cmd: SchemesCommand,
    },

    /// Patient report vault and hospital uploads
    Reports {
        #[command(subcommand)]
        cmd: ReportsCommand,
    },

    /// One-time password for viewing protected reports
    Otp {
        #[command(subcommand)]
        cmd: OtpCommand,
    },

    /// Who accessed the patient's reports
    AccessLogs,

    /// Reports uploaded by the signed-in hospital staff
    History,

    /// Premium subscription
    Subscription {
        #[command(subcommand)]
        cmd: SubscriptionCommand,
    },

    /// Show or set the preferred language (en or kn)
    Language { language: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum RegisterCommand {
    Patient(PatientArgs),
    Hospital(HospitalArgs),
}

#[derive(Args, Debug)]
pub struct PatientArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub full_name: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub age: u32,
    #[arg(long)]
    pub district: String,
    /// BPL or APL
    #[arg(long, default_value = "BPL")]
    pub economic_status: String,
    #[arg(long, default_value_t = false)]
    pub has_ration_card: bool,
    #[arg(long, default_value_t = false)]
    pub has_aadhaar: bool,
    #[arg(long)]
    pub aadhaar_last4: Option<String>,
    #[arg(long)]
    pub disease_type: String,
}

#[derive(Args, Debug)]
pub struct HospitalArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub staff_name: String,
    #[arg(long)]
    pub hospital_name: String,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub license_number: String,
}

#[derive(Subcommand, Debug)]
pub enum SchemesCommand {
    /// Check which schemes a patient is eligible for
    Check {
        #[arg(long)]
        age: u32,
        #[arg(long)]
        district: String,
        /// BPL or APL
        #[arg(long, default_value = "BPL")]
        economic_status: String,
        #[arg(long, default_value_t = false)]
        has_ration_card: bool,
        #[arg(long, default_value_t = false)]
        has_aadhaar: bool,
        #[arg(long)]
        disease_type: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportsCommand {
    /// List the patient's reports
    List,

    /// Upload a report for a patient (hospital staff)
    Upload {
        #[arg(long)]
        patient_phone: String,
        #[arg(long)]
        aadhaar_last4: Option<String>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        scan_type: String,
        /// Defaults to the signed-in staff member's hospital
        #[arg(long)]
        hospital_name: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        test_date: String,
        file: PathBuf,
    },

    /// Run AI analysis on a report
    Analyze {
        report_id: i64,
        /// Defaults to the preferred language
        #[arg(long)]
        language: Option<String>,
    },

    /// Download a report
    View {
        report_id: i64,
        /// Where to save the file; defaults to report-<id>.<ext>
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum OtpCommand {
    Request,
    Verify { code: String },
}

#[derive(Subcommand, Debug)]
pub enum SubscriptionCommand {
    Status,
    Upgrade {
        #[arg(long)]
        payment_id: String,
    },
}

/// Initialize the tracing subscriber, logging to a file in the data directory
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = config.data_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.base_url.filter(|u| !u.trim().is_empty()) {
        config.base_url = url.trim().to_string();
    }

    let _guard = init_tracing(&config);
    info!(base_url = %config.base_url, "Arogya Mitra CLI starting");

    let mut app = commands::App::open(config, cli.ephemeral).await?;
    let result = app.run(cli.cmd).await;

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}
