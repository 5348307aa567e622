//! Arraf CLI — entry point.
//!
//! # Commands
//!
//! - `arraf chat [-m MESSAGE] [--image PATH] [--model ID]` — single turn or REPL
//! - `arraf models` — list the model catalog and key status
//! - `arraf key ...` — store or remove API keys
//! - `arraf transcribe FILE` — speech to text
//! - `arraf onboard` — write default config and data directories
//! - `arraf status` — show configuration and key status

mod helpers;
mod onboard;
mod repl;
mod status;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use arraf_core::config::{load_config, Config};
use arraf_core::{ChatError, CredentialStore, FileStore, ImageRef};
use arraf_providers::{HttpChatClient, ModelRegistry, WhisperTranscriber};
use arraf_session::{Confirmer, ConversationController, FileCapture, TurnOutcome};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🔮 Arraf — multi-model chat in the terminal
#[derive(Parser)]
#[command(name = "arraf", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.arraf/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with a model (single turn or interactive REPL)
    Chat {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Image to attach to the single message
        #[arg(long)]
        image: Option<PathBuf>,

        /// Model id to use instead of the configured default
        #[arg(long)]
        model: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// List available models
    Models,

    /// Manage stored API keys
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },

    /// Transcribe an audio file
    Transcribe {
        file: PathBuf,

        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Initialize configuration and data directory
    Onboard,

    /// Show configuration and key status
    Status,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store a key for a model
    Set { model: String, key: String },
    /// Remove a model's stored key
    Remove { model: String },
    /// Store the speech-to-text key
    SetTranscription { key: String },
    /// Remove the stored speech-to-text key
    RemoveTranscription,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Chat {
            message,
            image,
            model,
            logs,
        } => {
            init_logging(logs);
            let config = load_config(config_path);
            run_chat(&config, message, image, model).await
        }
        Commands::Models => {
            init_logging(false);
            let config = load_config(config_path);
            let controller = build_controller(&config, Arc::new(helpers::PromptConfirmer))?;
            print_models(&controller);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Key { action } => {
            init_logging(false);
            let config = load_config(config_path);
            let controller = build_controller(&config, Arc::new(helpers::PromptConfirmer))?;
            Ok(run_key(&controller, action))
        }
        Commands::Transcribe { file, logs } => {
            init_logging(logs);
            let config = load_config(config_path);
            run_transcribe(&config, &file).await
        }
        Commands::Onboard => onboard::run(config_path).map(|()| ExitCode::SUCCESS),
        Commands::Status => {
            let config = load_config(config_path);
            status::run(&config, config_path).map(|()| ExitCode::SUCCESS)
        }
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(
    config: &Config,
    message: Option<String>,
    image: Option<PathBuf>,
    model: Option<String>,
) -> Result<ExitCode> {
    let controller = build_controller(config, Arc::new(helpers::PromptConfirmer))?;

    if let Some(id) = model.as_deref() {
        if controller.select_model(id).is_err() {
            return Ok(ExitCode::FAILURE);
        }
    }

    if message.is_none() && image.is_none() {
        repl::run(controller).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let image = image
        .as_deref()
        .map(ImageRef::from_path)
        .transpose()
        .context("failed to attach image")?;
    let text = message.unwrap_or_default();

    info!(model = %controller.selected_model().id, "single-shot chat");
    // Reply and errors are rendered by the terminal sink.
    match controller.submit_turn(&text, image).await {
        Ok(TurnOutcome::Replied(_)) => Ok(ExitCode::SUCCESS),
        Ok(TurnOutcome::Ignored) => {
            eprintln!("{}", "nothing to send".dimmed());
            Ok(ExitCode::FAILURE)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

/// Wire the controller from the loaded configuration.
pub fn build_controller(
    config: &Config,
    confirmer: Arc<dyn Confirmer>,
) -> Result<ConversationController> {
    let credentials = credential_store(config);
    let registry = ModelRegistry::from_config(config).context("invalid model catalog")?;
    let backend = HttpChatClient::new(&config.endpoints).context("failed to create HTTP client")?;
    let transcriber = WhisperTranscriber::new(
        &config.endpoints,
        credentials.clone(),
        &config.transcription.api_key,
    )
    .context("failed to create transcription client")?;

    let controller = ConversationController::new(
        Arc::new(registry),
        credentials,
        Arc::new(backend),
        Arc::new(helpers::TerminalSink),
        confirmer,
    )
    .with_transcriber(Arc::new(transcriber));

    Ok(controller)
}

/// File-backed credential store at the configured path.
pub fn credential_store(config: &Config) -> CredentialStore {
    let path = helpers::expand_tilde(&config.storage.credentials_path);
    CredentialStore::new(Arc::new(FileStore::new(path)))
}

// ─────────────────────────────────────────────
// Models / keys / transcription
// ─────────────────────────────────────────────

pub fn print_models(controller: &ConversationController) {
    let selected = controller.selected_model();
    println!();
    for model in controller.registry().list_models() {
        let marker = if model.id == selected.id { "●".magenta() } else { " ".normal() };
        let tags = model
            .capability_tags
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {} {:<16} {:<28} {}",
            marker,
            model.id,
            model.display_name,
            helpers::key_status(controller.key_source(model))
        );
        if !tags.is_empty() {
            println!("    {:<16} {}", "", tags.dimmed());
        }
    }
    println!();
}

fn run_key(controller: &ConversationController, action: KeyCommands) -> ExitCode {
    // Notices from the controller already describe the outcome.
    let result = match action {
        KeyCommands::Set { model, key } => controller.set_credential(&model, &key),
        KeyCommands::Remove { model } => controller.remove_credential(&model),
        KeyCommands::SetTranscription { key } => controller.set_transcription_key(&key),
        KeyCommands::RemoveTranscription => {
            controller.remove_transcription_key();
            Ok(())
        }
    };
    exit_code(result)
}

async fn run_transcribe(config: &Config, file: &Path) -> Result<ExitCode> {
    let controller = build_controller(config, Arc::new(helpers::PromptConfirmer))?;
    let capture = FileCapture::new(file);

    match controller.dictate(&capture, async {}).await {
        Ok(text) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn exit_code<T>(result: Result<T, ChatError>) -> ExitCode {
    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("arraf=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
