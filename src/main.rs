use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use voxgate::cli::{Cli, Commands, ConfigAction, ModelsAction};
use voxgate::config::Config;
use voxgate::models::{
    ArtifactFetcher, ArtifactState, ArtifactStore, StorePolicy, default_fetcher, list_artifacts,
};
use voxgate::server::run_server;
use voxgate::service::SpeechService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_filter().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!(version = %voxgate::version_string(), "Starting voxgate");
            let service = SpeechService::builder(config).build()?;
            run_server(Arc::new(service)).await?;
        }
        Commands::Models { action } => {
            let config = load_config(cli.config.as_deref())?;
            handle_models_command(action, &config).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "voxgate", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/voxgate/config.toml), if present
/// 3. Built-in defaults
///
/// Environment variable overrides apply on top, then the result is validated.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Fetcher used by `models install`: always downloads, with a progress bar.
#[cfg(feature = "model-download")]
fn install_fetcher() -> Arc<dyn ArtifactFetcher> {
    Arc::new(voxgate::models::HttpFetcher::new().with_progress(true))
}

#[cfg(not(feature = "model-download"))]
fn install_fetcher() -> Arc<dyn ArtifactFetcher> {
    default_fetcher(false)
}

fn open_store(config: &Config, fetcher: Arc<dyn ArtifactFetcher>) -> ArtifactStore {
    ArtifactStore::new(config.models_dir(), fetcher, StorePolicy::from(&config.models))
}

fn print_state(state: &ArtifactState) {
    println!("Variant:  {}", state.variant);
    println!("Status:   {}", state.status.as_str());
    println!("On disk:  {} bytes", state.bytes_present);
    if !state.missing_files.is_empty() {
        let missing: Vec<&str> = state.missing_files.iter().map(String::as_str).collect();
        println!("Missing:  {}", missing.join(", "));
    }
}

/// Handle model management commands.
async fn handle_models_command(action: ModelsAction, config: &Config) -> Result<()> {
    match action {
        ModelsAction::List => {
            let store = open_store(config, default_fetcher(false));
            let states = store.list_states();
            println!("Artifacts in {}:", store.root().display());
            for (spec, state) in list_artifacts().iter().zip(states.iter()) {
                println!(
                    "  {:<22} {:<10} {:>6} MB  {}",
                    spec.variant,
                    state.status.as_str(),
                    spec.size_mb,
                    spec.description
                );
            }
        }
        ModelsAction::Status { variant } => {
            let store = open_store(config, default_fetcher(false));
            print_state(&store.verify(&variant)?);
            println!("Location: {}", store.variant_dir(&variant).display());
        }
        ModelsAction::Install { variant } => {
            let store = open_store(config, install_fetcher());
            let state = store
                .ensure_ready(&variant)
                .await
                .with_context(|| format!("installing '{variant}'"))?;
            println!("Artifact '{}' installed successfully", state.variant);
            println!("Location: {}", store.variant_dir(&variant).display());
        }
        ModelsAction::Repair { variant } => {
            let store = open_store(config, default_fetcher(false));
            print_state(&store.repair(&variant).await?);
        }
    }
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
