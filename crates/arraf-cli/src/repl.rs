//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! Lines starting with `/` are commands; everything else is a chat turn.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use arraf_core::ImageRef;
use arraf_session::{ConversationController, FileCapture};

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

const HELP: &str = "\
  /models            list models
  /model <id>        switch model
  /key <id> <key>    store a key for a model and switch to it
  /unkey <id>        remove a stored key
  /image <path>      attach an image to the next message
  /voice <file>      transcribe an audio file into the prompt
  /clear             clear the conversation
  exit               quit";

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    Help,
    Models,
    Model(&'a str),
    Key { model: &'a str, key: &'a str },
    Unkey(&'a str),
    Image(&'a str),
    Voice(&'a str),
    Clear,
    Usage(&'static str),
    Unknown(&'a str),
    Chat(&'a str),
}

fn parse_line(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if is_exit_command(trimmed) {
        return Command::Exit;
    }
    if !trimmed.starts_with('/') {
        return Command::Chat(trimmed);
    }

    let (name, rest) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
    let rest = rest.trim();
    match name {
        "/help" => Command::Help,
        "/models" => Command::Models,
        "/clear" => Command::Clear,
        "/model" if !rest.is_empty() => Command::Model(rest),
        "/model" => Command::Usage("/model <id>"),
        "/key" => match rest.split_once(char::is_whitespace) {
            Some((model, key)) => Command::Key {
                model,
                key: key.trim(),
            },
            None => Command::Usage("/key <id> <key>"),
        },
        "/unkey" if !rest.is_empty() => Command::Unkey(rest),
        "/unkey" => Command::Usage("/unkey <id>"),
        "/image" if !rest.is_empty() => Command::Image(rest),
        "/image" => Command::Usage("/image <path>"),
        "/voice" if !rest.is_empty() => Command::Voice(rest),
        "/voice" => Command::Usage("/voice <file>"),
        other => Command::Unknown(other),
    }
}

/// Run the interactive REPL loop.
pub async fn run(controller: ConversationController) -> Result<()> {
    helpers::print_banner(&controller.selected_model());

    let mut editor = create_editor()?;
    let mut pending_image: Option<ImageRef> = None;
    // Transcript from /voice, offered as the next line's initial text
    let mut prefill = String::new();

    loop {
        let prompt = if pending_image.is_some() { "You 🖼: " } else { "You: " };
        let read = if prefill.is_empty() {
            editor.readline(prompt)
        } else {
            editor.readline_with_initial(prompt, (prefill.as_str(), ""))
        };
        prefill.clear();

        let input = match read {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        if input.trim().is_empty() && pending_image.is_none() {
            continue;
        }
        record_history(&mut editor, &input);

        match parse_line(&input) {
            Command::Exit => {
                println!("\nGoodbye! 👋");
                break;
            }
            Command::Help => println!("{}", HELP.dimmed()),
            Command::Models => crate::print_models(&controller),
            Command::Model(id) => {
                let _ = controller.select_model(id);
            }
            Command::Key { model, key } => {
                let _ = controller.set_credential(model, key);
            }
            Command::Unkey(model) => {
                let _ = controller.remove_credential(model);
            }
            Command::Image(path) => match ImageRef::from_path(&helpers::expand_tilde(path)) {
                Ok(image) => {
                    pending_image = Some(image);
                    println!("  {} image attached to the next message", "✓".green());
                }
                Err(e) => eprintln!("  {} {}", "✗".red(), e.to_string().red()),
            },
            Command::Voice(file) => {
                let capture = FileCapture::new(helpers::expand_tilde(file));
                if let Ok(text) = controller.dictate(&capture, async {}).await {
                    prefill = text;
                }
            }
            Command::Clear => {
                controller.clear_conversation();
            }
            Command::Usage(usage) => println!("  {} {}", "usage:".dimmed(), usage),
            Command::Unknown(name) => {
                println!("  {} {name} (try /help)", "unknown command".dimmed())
            }
            Command::Chat(text) => {
                debug!(chars = text.chars().count(), "submitting from REPL");
                // Errors are already shown by the sink; the image is kept for a retry.
                if controller.submit_turn(text, pending_image.clone()).await.is_ok() {
                    pending_image = None;
                }
            }
        }
    }

    save_history(&mut editor, &history_path());

    Ok(())
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Add a line to the editor history. `/key` lines carry a secret and are
/// never recorded.
fn record_history(editor: &mut Editor<(), DefaultHistory>, input: &str) {
    if matches!(parse_line(input), Command::Key { .. }) {
        return;
    }
    let _ = editor.add_history_entry(input);
}

fn save_history(editor: &mut Editor<(), DefaultHistory>, path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(path) {
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    arraf_core::utils::get_history_path().join("cli_history")
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
