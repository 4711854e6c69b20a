use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use livegen_lib::config::merger::{PartialModelSettings, PartialServerSettings};
use livegen_lib::config::{load_merged_config, PartialConfig, SecretsConfig};
use livegen_lib::events::GenerationEvent;
use livegen_lib::sandbox::DirectorySandbox;
use livegen_lib::server::{self, ServerAppState};
use livegen_lib::session::{load_project_dir, Session};
use std::path::PathBuf;
use std::sync::Arc;

/// Livegen - stream model-generated apps into a live sandbox
#[derive(Parser, Debug)]
#[command(name = "livegen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of <project>/.livegen/config.yaml
    #[arg(long, global = true, env = "LIVEGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server for browser sandboxes
    Serve {
        /// Port to bind the server to
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind the server to
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate into a local directory
    Generate {
        /// What to build, or a question about the project
        prompt: String,

        /// Project directory; existing files are used as context
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Model id override
        #[arg(long)]
        model: Option<String>,

        /// Wait for the full response instead of streaming
        #[arg(long)]
        no_stream: bool,
    },

    /// Store an API token for a provider in ~/.livegen/secrets.toml
    SetKey {
        /// Provider id (openai, openrouter, groq, ollama)
        provider: String,

        /// API token
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { port, bind } => serve(cli.config, port, bind).await,
        Command::Generate {
            prompt,
            out,
            model,
            no_stream,
        } => generate(cli.config, prompt, out, model, no_stream).await,
        Command::SetKey { provider, token } => set_key(&provider, &token),
    }
}

async fn serve(config_file: Option<PathBuf>, port: Option<u16>, bind: Option<String>) -> Result<()> {
    let project = std::env::current_dir().context("Failed to read current directory")?;
    let overrides = PartialConfig {
        server: Some(PartialServerSettings {
            port,
            bind,
            cors_origins: None,
        }),
        ..Default::default()
    };
    let config = load_merged_config(Some(&project), config_file.as_deref(), Some(overrides))
        .map_err(|e| anyhow!(e))?;

    let orchestrator = livegen_lib::build_orchestrator(&config, Some(&project))?;
    let state = ServerAppState::new(orchestrator, config.sync.clone());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Shutdown signal received, stopping server...");
    };

    server::run_server(
        config.server.port,
        &config.server.bind,
        state,
        &config.server.cors_origins,
        shutdown,
    )
    .await
    .map_err(|e| anyhow!(e))
}

async fn generate(
    config_file: Option<PathBuf>,
    prompt: String,
    out: PathBuf,
    model: Option<String>,
    no_stream: bool,
) -> Result<()> {
    let overrides = PartialConfig {
        model: Some(PartialModelSettings {
            model,
            stream: no_stream.then_some(false),
            ..Default::default()
        }),
        ..Default::default()
    };
    let config = load_merged_config(Some(&out), config_file.as_deref(), Some(overrides))
        .map_err(|e| anyhow!(e))?;
    let orchestrator = livegen_lib::build_orchestrator(&config, Some(&out))?;

    let initial = load_project_dir(&out).map_err(|e| anyhow!(e))?;
    log::info!("Loaded {} existing file(s) from {}", initial.len(), out.display());

    let sandbox = Arc::new(DirectorySandbox::new(&out));
    let session = Arc::new(Session::new(sandbox, &config.sync, initial));
    let mut events = session.generate(&orchestrator, &prompt).await;

    let mut failure = None;
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                session.cancel_generation();
                failure = Some("cancelled".to_string());
                None
            }
        };
        let Some(event) = event else {
            break;
        };
        match &event {
            GenerationEvent::Planning(payload) => println!("{}", payload.message),
            GenerationEvent::Generating(payload) if payload.attempts > 1 => {
                println!("Answered by {} after {} attempts", payload.model, payload.attempts)
            }
            GenerationEvent::File(file) => println!("  wrote {}", file.path),
            GenerationEvent::Progress(payload) => match &payload.delta {
                Some(delta) => print!("{}", delta),
                None => log::debug!("{}", payload.message),
            },
            GenerationEvent::Actions(payload) => {
                for action in &payload.actions {
                    println!("  updated {}", action.path());
                }
            }
            GenerationEvent::Complete(payload) => {
                if !payload.stubs.is_empty() {
                    println!("Created {} placeholder file(s)", payload.stubs.len());
                }
                if let Some(message) = &payload.message {
                    println!("\n{}", message);
                }
            }
            GenerationEvent::Error(payload) => failure = Some(payload.message.clone()),
            _ => {}
        }
    }

    let flushed = session.flush().await;
    session.teardown().await;

    if let Err(e) = flushed {
        bail!("Failed to write files to {}: {}", out.display(), e);
    }
    match failure {
        Some(message) => bail!("Generation failed: {}", message),
        None => Ok(()),
    }
}

fn set_key(provider: &str, token: &str) -> Result<()> {
    if livegen_lib::config::get_provider(provider).is_none() {
        log::warn!("Unknown provider '{}', storing the key anyway", provider);
    }
    let mut secrets = SecretsConfig::load()?;
    secrets.set_token(provider, token);
    secrets.save()?;
    println!("Saved API key for {}", provider);
    Ok(())
}
