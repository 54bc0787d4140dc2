//! Output helpers for consistent CLI output.
//!
//! User-facing progress goes through [`Output`]; diagnostics go through
//! `tracing` and only show up with `-v` or `RUST_LOG`.
//!
//! # Example
//!
//! ```rust,ignore
//! use appinstall::output::Output;
//!
//! Output::info("Saving library MYLIB...");
//! Output::message(Some("CPC3722"), "1 objects saved from library MYLIB.");
//! Output::success("Extraction phase complete");
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::borrow::Cow;
use std::time::Duration;

use crate::command_runner::StreamSource;

/// Standard output helper for consistent CLI formatting.
pub struct Output;

impl Output {
    /// Print a success message with a green checkmark.
    ///
    /// Example: `✓ Installation complete`
    pub fn success(msg: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), msg.as_ref());
    }

    /// Print an error message with a red X to stderr.
    pub fn error(msg: impl AsRef<str>) {
        eprintln!("{} {}", "✗".red().bold(), msg.as_ref().red());
    }

    /// Print a warning message with a yellow warning symbol.
    ///
    /// Example: `⚠ Continuing without confirmation`
    pub fn warning(msg: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow(), msg.as_ref());
    }

    /// Print an info/status message with a cyan arrow.
    ///
    /// Example: `→ Saving stream files...`
    pub fn info(msg: impl AsRef<str>) {
        println!("{} {}", "→".cyan(), msg.as_ref());
    }

    /// Print a step message (for multi-step operations).
    pub fn step(msg: impl AsRef<str>) {
        println!("  {} {}", "•".cyan(), msg.as_ref());
    }

    /// Print a message returned by a remote command.
    ///
    /// Example: `    CPF2110: Library MYLIB not found.`
    pub fn message(id: Option<&str>, text: impl AsRef<str>) {
        match id {
            Some(id) => println!("    {}: {}", id.yellow(), text.as_ref()),
            None => println!("    {}", text.as_ref()),
        }
    }

    /// Echo one line of a child process, labelled with its origin.
    ///
    /// Example: `  [INSTALL] x home/app/bin/run.sh`
    pub fn stream_line(label: &str, source: StreamSource, line: &str) {
        let tag = format!("[{label}]");
        match source {
            StreamSource::Stdout => println!("  {} {}", tag.dimmed(), line),
            StreamSource::Stderr => eprintln!("  {} {}", tag.dimmed(), line.red()),
        }
    }

    /// Print a blank line.
    pub fn blank() {
        println!();
    }

    /// Create a spinner for long-running operations.
    ///
    /// The spinner will animate until you call `finish_*` on it.
    pub fn spinner(msg: impl Into<Cow<'static, str>>) -> Spinner {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg);
        pb.enable_steady_tick(Duration::from_millis(80));
        Spinner(pb)
    }
}

/// A spinner for long-running operations.
///
/// Created via `Output::spinner()`.
pub struct Spinner(ProgressBar);

impl Spinner {
    /// Finish with a success message.
    pub fn finish_success(self, msg: impl AsRef<str>) {
        self.0
            .finish_with_message(format!("{} {}", "✓".green().bold(), msg.as_ref()));
    }

    /// Finish with an error message.
    pub fn finish_error(self, msg: impl AsRef<str>) {
        self.0
            .finish_with_message(format!("{} {}", "✗".red().bold(), msg.as_ref()));
    }
}
