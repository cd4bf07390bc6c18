use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use launchkit::core::downloader::run_worker_process;
use launchkit::core::version::ManifestIndex;
use launchkit::{HttpFetcher, LauncherContext, LauncherResult, LauncherSettings, VersionInstaller};

#[derive(Debug, Parser)]
#[command(name = "launchkit")]
#[command(about = "Resolve and download Minecraft versions")]
struct Cli {
    /// Settings file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Override the root directory from the settings file
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a version and download everything it needs
    Install { version: String },
    /// Re-download the manifest index files
    Refresh,
    /// Run one partition of a download batch (used by process workers)
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        tasks: PathBuf,
    },
}

fn load_context(cli: &Cli) -> LauncherResult<LauncherContext> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(LauncherSettings::default_path);
    let mut settings = LauncherSettings::load(&path)?;
    if let Some(root) = &cli.root {
        settings.root = root.clone();
    }
    Ok(LauncherContext::from_settings(settings))
}

async fn run(cli: Cli) -> LauncherResult<()> {
    match &cli.command {
        Command::Worker { tasks } => run_worker_process(tasks).await,
        Command::Refresh => {
            let ctx = load_context(&cli)?;
            let fetcher = HttpFetcher::new()?;
            ManifestIndex::new(ctx).refresh(&fetcher).await
        }
        Command::Install { version } => {
            let ctx = load_context(&cli)?;
            info!("Root: {:?}", ctx.root());
            let installer = VersionInstaller::new(ctx, Arc::new(HttpFetcher::new()?))?;
            let result = installer.install(version).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    launchkit::init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
