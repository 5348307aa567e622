//! Shared CLI helpers — path expansion, terminal rendering of controller
//! events, y/N confirmation, banner.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use colored::Colorize;

use arraf_core::{ModelEntry, Role};
use arraf_session::{
    Confirmer, ControllerEvent, EventSink, KeySource, Notice, NoticeLevel, SubmissionState,
};

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ─────────────────────────────────────────────
// Event rendering
// ─────────────────────────────────────────────

/// Renders controller events on stdout/stderr.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl EventSink for TerminalSink {
    fn emit(&self, event: ControllerEvent) {
        match event {
            ControllerEvent::StateChanged(SubmissionState::Submitting) => print_thinking(),
            ControllerEvent::StateChanged(SubmissionState::Idle) => clear_thinking(),
            ControllerEvent::MessageAppended(message) if message.role == Role::Assistant => {
                print_reply(&message.content)
            }
            // The user just typed it.
            ControllerEvent::MessageAppended(_) => {}
            ControllerEvent::ConversationCleared => {}
            ControllerEvent::ModelSelected { id, display_name } => {
                println!("  {} {} {}", "→".cyan(), display_name.bold(), format!("({id})").dimmed());
            }
            ControllerEvent::Notice(notice) => print_notice(&notice),
        }
    }
}

/// Print an assistant reply.
pub fn print_reply(reply: &str) {
    clear_thinking();
    println!();
    println!("{}", "🔮 Arraf".magenta().bold());
    if reply.is_empty() {
        println!("{}", "(empty reply)".dimmed());
    } else {
        println!("{reply}");
    }
    println!();
}

pub fn print_notice(notice: &Notice) {
    clear_thinking();
    match notice.level {
        NoticeLevel::Info => println!("  {}", notice.text.dimmed()),
        NoticeLevel::Success => println!("  {} {}", "✓".green(), notice.text),
        NoticeLevel::Error => eprintln!("  {} {}", "✗".red(), notice.text.red()),
    }
}

/// Print the banner shown at REPL start.
pub fn print_banner(model: &ModelEntry) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🔮 Arraf".magenta().bold(), version.dimmed());
    println!("{} {}", "Model:".dimmed(), model.display_name.bold());
    println!(
        "{}",
        "Type a message, /help for commands, or \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print a "thinking" placeholder while a turn is in flight.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

/// Short coloured label for where a model's key comes from.
pub fn key_status(source: KeySource) -> String {
    match source {
        KeySource::Override => format!("{} (your key)", "✓".green()),
        KeySource::Fallback => format!("{} (default key)", "✓".green()),
        KeySource::Missing => format!("{}", "· no key".dimmed()),
    }
}

// ─────────────────────────────────────────────
// Confirmation
// ─────────────────────────────────────────────

/// Asks on the terminal; anything but `y`/`yes` declines.
#[derive(Debug, Default)]
pub struct PromptConfirmer;

impl Confirmer for PromptConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
