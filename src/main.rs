//! Subtree Editor - HTTP service for git-backed editing sessions
//!
//! Run with `subtree-editor` or `subtree-editor --help` for usage.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subtree_editor::{
    config::Config,
    git::naming::{edit_branch, normalize_subdirectory, repository_identity},
    server, APP_NAME, VERSION,
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "Git-backed editing sessions over repository subtrees")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Print the edit branch used for a repository subtree
    Branch {
        /// Remote repository URL
        repo: String,

        /// Subdirectory (empty for the repository root)
        #[arg(default_value = "")]
        path: String,
    },

    /// Show configuration
    Config {
        /// Initialize config file with defaults
        #[arg(long)]
        init: bool,
    },
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
            .add_directive("gix=warn".parse()?)
            .add_directive("hyper=info".parse()?)
    } else {
        // Use info level for our crate, warn for dependencies
        EnvFilter::new("info")
            .add_directive("gix=warn".parse()?)
            .add_directive("tokio=warn".parse()?)
            .add_directive("tower_http=info".parse()?)
    };

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(file).with_target(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre error hooks
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    match cli.command {
        None | Some(Commands::Serve { bind: None }) => {
            run_server(config, cli.debug).await?;
        }

        Some(Commands::Serve { bind: Some(bind) }) => {
            let config = Config { bind, ..config };
            run_server(config, cli.debug).await?;
        }

        Some(Commands::Branch { repo, path }) => {
            println!("Repository: {}", repository_identity(&repo));
            println!("Subdirectory: '{}'", normalize_subdirectory(&path));
            println!("Edit branch: {}", edit_branch(&repo, &path));
        }

        Some(Commands::Config { init }) => {
            let config_path = cli.config.clone().map_or_else(Config::config_file_path, Ok)?;

            if init {
                config.save_to(&config_path)?;
                println!("Configuration initialized at {:?}", config_path);
            } else {
                println!("Configuration:");
                println!("{}", toml::to_string_pretty(&config)?);
                println!("\nConfig file: {:?}", config_path);
                println!("Repositories: {:?}", config.repositories_path()?);
                println!("Sessions: {:?}", config.sessions_path()?);
            }
        }
    }

    Ok(())
}

async fn run_server(config: Config, debug: bool) -> Result<()> {
    setup_logging(debug || config.debug, config.log_file.as_deref())?;

    info!("Starting {} v{}", APP_NAME, VERSION);
    if config.git.allowed_repositories.is_empty() {
        info!("No repository allow-list configured, every repository is accepted");
    }

    server::serve(&config).await?;
    Ok(())
}
