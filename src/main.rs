//! CRM provisioning CLI

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use crm_automation::config::Config;
use crm_automation::driver::RunMode;
use crm_automation::runner::{self, RunOptions, Step};
use crm_automation::{api, init_logging};

#[derive(Parser)]
#[command(name = "crm-automation")]
#[command(about = "CRM account provisioning through browser automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log file (console-only when it cannot be opened)
    #[arg(long, default_value = "crm_automation.log")]
    log_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the provisioning flow
    Run {
        /// Account to provision
        #[arg(long)]
        account_name: String,

        /// Login email (falls back to CRM_EMAIL)
        #[arg(long)]
        email: Option<String>,

        /// Log intended actions without performing them
        #[arg(long)]
        dry_run: bool,

        /// Show the browser window
        #[arg(long)]
        headful: bool,

        /// Directory for failure screenshots
        #[arg(long, default_value = "screenshots")]
        screenshot_dir: PathBuf,

        /// Session state file written after phase 1, read before phase 2
        #[arg(long, default_value = "auth_state.json")]
        auth_file: PathBuf,

        /// Which part of the flow to run
        #[arg(long, value_enum, default_value = "full")]
        step: StepArg,

        /// Verification code (required for complete-auth)
        #[arg(long)]
        code: Option<String>,
    },

    /// Serve the HTTP API
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8000")]
        listen: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StepArg {
    /// Phase 1: request the code, save the session, exit
    InitAuth,
    /// Phase 2: restore the session, submit the code, provision
    CompleteAuth,
    /// Interactive: prompt for the code mid-run
    Full,
}

impl From<StepArg> for Step {
    fn from(step: StepArg) -> Self {
        match step {
            StepArg::InitAuth => Step::InitAuth,
            StepArg::CompleteAuth => Step::CompleteAuth,
            StepArg::Full => Step::Full,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(Some(&cli.log_file));

    match cli.command {
        Commands::Run {
            account_name,
            email,
            dry_run,
            headful,
            screenshot_dir,
            auth_file,
            step,
            code,
        } => {
            let mut config = Config::from_env();
            config.screenshot_dir = screenshot_dir;

            let Some(email) = config.resolve_email(email) else {
                error!("Email not provided via --email or CRM_EMAIL");
                return ExitCode::from(1);
            };

            let mode = if dry_run {
                RunMode::DryRun
            } else {
                RunMode::Apply
            };

            info!(account = %account_name, ?step, dry_run, "Starting automation");

            let opts = RunOptions {
                account_name,
                email,
                mode,
                headless: !headful,
                step: step.into(),
                code,
                auth_file,
            };

            match runner::run(config, opts).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "Automation failed");
                    ExitCode::from(1)
                }
            }
        }

        Commands::Serve { listen } => {
            let config = Config::from_env();
            match api::serve(config, &listen).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "Server failed");
                    ExitCode::from(1)
                }
            }
        }
    }
}
