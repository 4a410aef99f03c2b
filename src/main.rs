// ABOUTME: Entry point for intent — records coding intent and checks commits against it.
// ABOUTME: Parses CLI args, loads config and .env files, and dispatches to the command handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use intent_tracker::commands::App;
use intent_tracker::config::{Config, Switches};

#[derive(Parser)]
#[command(name = "intent")]
#[command(about = "Record and verify your coding intentions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new intent session
    Start {
        /// What you intend to build
        intent: String,
    },
    /// Record a commit against the active intent, validating the staged diff
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
        /// Score the staged diff against the intent (default)
        #[arg(long, overrides_with = "no_validate")]
        validate: bool,
        /// Skip alignment scoring
        #[arg(long = "no-validate", overrides_with = "validate")]
        no_validate: bool,
        /// Scan the staged diff for vulnerabilities (default)
        #[arg(long, overrides_with = "no_security")]
        scan_security: bool,
        /// Skip the security scan
        #[arg(long = "no-security", overrides_with = "scan_security")]
        no_security: bool,
    },
    /// Close the current intent session and print a summary
    Close,
    /// Show the active intent and its commits
    Status,
    /// Install the commit-msg git hook
    InstallHooks,
    /// Check a commit message file (run by the commit-msg hook)
    CheckCommitMsg {
        /// Path to the commit message file git passes to the hook
        file: PathBuf,
    },
    /// Validate every story referenced in a PR's commits against its diff
    ValidatePr {
        /// Base branch (defaults to GITHUB_BASE_REF)
        #[arg(long)]
        base: Option<String>,
        /// Head commit (defaults to GITHUB_SHA)
        #[arg(long)]
        head: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("INTENT_LOG").unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve an on/off flag pair that defaults to on. The pair overrides each
/// other, so at most one is set and the last one given wins.
fn flag_pair(on: bool, off: bool) -> bool {
    on || !off
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load()?;
    let workdir = std::env::current_dir()?;
    let app = App::new(config, Switches::from_env(), workdir);

    match cli.command {
        Commands::Start { intent } => app.start(&intent),
        Commands::Commit {
            message,
            validate,
            no_validate,
            scan_security,
            no_security,
        } => {
            app.commit(
                &message,
                flag_pair(validate, no_validate),
                flag_pair(scan_security, no_security),
            )
            .await
        }
        Commands::Close => app.close(),
        Commands::Status => app.status(),
        Commands::InstallHooks => app.install_hooks(),
        Commands::CheckCommitMsg { file } => app.check_commit_msg(&file).await,
        Commands::ValidatePr { base, head } => app.validate_pr(base, head).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load local .env if present, then the user-wide secrets file.
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_path(Config::secrets_env_path());
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
