use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use armada::catalog::CatalogClient;
use armada::config::Config;
use armada::github::GithubClient;
use armada::interaction::TerminalInteraction;
use armada::interactive::{resolve_session, run_loop};
use armada::ops::{OpContext, OperationRegistry};
use armada::session::{FileSessionStore, SessionEngine, SessionStore, StepArgs};
use armada::subprocess::SubprocessManager;

/// Guided batch transformations across a fleet of GitHub repositories
#[derive(Parser)]
#[command(name = "armada")]
#[command(about = "Guided, resumable batch transformations across GitHub repositories", long_about = None)]
struct Cli {
    /// Session to resume or create, bypassing the picker
    #[arg(short, long)]
    session: Option<String>,

    /// Workspace directory for sessions and clones (default: ~/.armada)
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Pre-fill the script path for run-script
    #[arg(long)]
    script: Option<String>,

    /// Pre-fill the branch name for run-script
    #[arg(long)]
    branch: Option<String>,

    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List saved sessions, newest first
    List,
    /// Delete a saved session
    Delete {
        /// Name of the session to delete
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("✗ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.workspace.clone())?;
    debug!(workspace = %config.workspace_dir.display(), "configuration loaded");

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(config.sessions_dir()));

    match cli.command {
        Some(Commands::Sessions { command }) => run_sessions_command(command, &store).await,
        None => run_interactive(cli, config, store).await,
    }
}

async fn run_sessions_command(
    command: SessionCommands,
    store: &Arc<dyn SessionStore>,
) -> anyhow::Result<()> {
    match command {
        SessionCommands::List => {
            for entry in store.list().await? {
                println!(
                    "{}\t{}",
                    entry.name,
                    entry.modified.format("%Y-%m-%d %H:%M:%S")
                );
            }
            Ok(())
        }
        SessionCommands::Delete { name } => {
            store.delete(&name).await?;
            println!("deleted '{name}'");
            Ok(())
        }
    }
}

async fn run_interactive(
    cli: Cli,
    config: Config,
    store: Arc<dyn SessionStore>,
) -> anyhow::Result<()> {
    let registry = Arc::new(OperationRegistry::builtin()?);

    let processes = SubprocessManager::production();
    let ctx = OpContext {
        github: GithubClient::new(&config.github_api_url, config.github_token.clone())?,
        catalog: CatalogClient::new(config.catalog_host.clone(), config.catalog_token.clone())?,
        git: processes.git(),
        processes,
        config,
    };

    let interaction = TerminalInteraction::new();
    let session = resolve_session(&store, &interaction, cli.session.as_deref()).await?;

    // Touch the file so a resumed session's modification time moves to now.
    store.save(&session).await?;

    let mut engine = SessionEngine::new(session, Arc::clone(&registry), Arc::clone(&store))?;

    let mut prefill = StepArgs::new();
    if let Some(script) = &cli.script {
        prefill.set("script", script.as_str());
    }
    if let Some(branch) = &cli.branch {
        prefill.set("branch", branch.as_str());
    }

    run_loop(&mut engine, &registry, &ctx, &interaction, &prefill).await
}
