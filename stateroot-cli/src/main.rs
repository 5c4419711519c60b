use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use stateroot_core::{BackendSnapshot, RemoteState};
use stateroot_provider_azure::ArmConnector;
use stateroot_state::{
    AccountLocks, InitOptions, LockFileOptions, RemoteStateInitializer, initializer_for,
};

/// Working-directory state file holding the last initialized backend
const WORKING_DIR_STATE: &str = ".terraform/terraform.tfstate";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Parser)]
#[command(name = "stateroot")]
#[command(about = "Prepare remote state backends before infrastructure runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print whether the backend must be (re)initialized
    NeedsInit {
        #[command(flatten)]
        target: Target,

        /// JSON file with the previously initialized backend ({"type", "config"})
        #[arg(long, conflicts_with = "working_dir")]
        snapshot: Option<PathBuf>,

        /// Working directory whose .terraform/terraform.tfstate records the backend
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },
    /// Create the backend's missing resource group, storage account and container
    Init {
        #[command(flatten)]
        target: Target,

        /// Seconds between status checks while a storage account is created
        #[arg(
            long,
            default_value_t = DEFAULT_POLL_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        poll_interval: u64,

        /// Directory for lock files shared with other stateroot processes
        #[arg(long)]
        lock_dir: Option<PathBuf>,
    },
    /// Print the backend configuration to pass to the infrastructure tool
    InitArgs {
        /// Path to the remote state JSON file
        #[arg(default_value = "remote_state.json")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct Target {
    /// Path to the remote state JSON file ({"backend", "config"})
    #[arg(default_value = "remote_state.json")]
    file: PathBuf,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Management API endpoint
    #[arg(long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::NeedsInit {
            target,
            snapshot,
            working_dir,
        } => run_needs_init(&target, snapshot.as_deref(), working_dir.as_deref()).await,
        Commands::Init {
            target,
            poll_interval,
            lock_dir,
        } => run_init(&target, poll_interval, lock_dir).await,
        Commands::InitArgs { file } => run_init_args(&file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_remote_state(path: &Path) -> Result<RemoteState, String> {
    log::debug!("Reading remote state from {}", path.display());
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid remote state {}: {}", path.display(), e))
}

fn load_snapshot(
    snapshot: Option<&Path>,
    working_dir: Option<&Path>,
) -> Result<Option<BackendSnapshot>, String> {
    if let Some(path) = snapshot {
        return BackendSnapshot::from_json_file(path)
            .map(Some)
            .map_err(|e| e.to_string());
    }

    let dir = working_dir.unwrap_or(Path::new("."));
    BackendSnapshot::from_working_dir_state(&dir.join(WORKING_DIR_STATE)).map_err(|e| e.to_string())
}

fn initializer(
    remote_state: &RemoteState,
    target: &Target,
    locks: Arc<AccountLocks>,
) -> Result<Box<dyn RemoteStateInitializer>, String> {
    let mut connector = ArmConnector::from_env();
    if let Some(endpoint) = &target.endpoint {
        connector = connector.with_endpoint(endpoint.as_str());
    }
    initializer_for(&remote_state.backend, Arc::new(connector), locks).map_err(|e| e.to_string())
}

fn init_options(timeout: Option<u64>, poll_interval: u64) -> InitOptions {
    let mut options = InitOptions {
        deadline: timeout.map(Duration::from_secs),
        ..InitOptions::default()
    };
    options.poll.interval = Duration::from_secs(poll_interval);
    if let Some(limit) = options.deadline {
        options.poll.timeout = options.poll.timeout.min(limit);
    }
    options
}

async fn run_needs_init(
    target: &Target,
    snapshot: Option<&Path>,
    working_dir: Option<&Path>,
) -> Result<(), String> {
    let remote_state = load_remote_state(&target.file)?;
    let existing = load_snapshot(snapshot, working_dir)?;
    let initializer = initializer(&remote_state, target, AccountLocks::global())?;
    let options = init_options(target.timeout, DEFAULT_POLL_INTERVAL_SECS);

    let needed = initializer
        .needs_initialization(&remote_state, existing.as_ref(), &options)
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", needed);
    Ok(())
}

async fn run_init(
    target: &Target,
    poll_interval: u64,
    lock_dir: Option<PathBuf>,
) -> Result<(), String> {
    let remote_state = load_remote_state(&target.file)?;
    let locks = match lock_dir {
        Some(dir) => Arc::new(AccountLocks::with_lock_files(LockFileOptions::new(dir))),
        None => AccountLocks::global(),
    };
    let initializer = initializer(&remote_state, target, locks)?;
    let options = init_options(target.timeout, poll_interval);

    println!(
        "{}",
        format!("Initializing {} backend...", remote_state.backend).cyan()
    );
    initializer
        .initialize(&remote_state, &options)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", "Backend resources are ready.".green().bold());
    Ok(())
}

fn run_init_args(file: &Path) -> Result<(), String> {
    let remote_state = load_remote_state(file)?;
    let initializer = initializer_for(
        &remote_state.backend,
        Arc::new(ArmConnector::from_env()),
        AccountLocks::global(),
    )
    .map_err(|e| e.to_string())?;

    let args = initializer.backend_init_args(&remote_state.config);
    let rendered = serde_json::to_string_pretty(&args).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}
