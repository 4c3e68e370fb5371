//! Terminal output for `decaptcha`: a spinner while decoding and colored
//! result lines.
//!
//! Uses `indicatif` for the spinner and `console` for styling.
//! [`DecodeProgress`] follows one decode request in the terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{AttemptRecord, AttemptState};

/// Visual progress indicator for one decode request.
///
/// Shows an animated spinner while the chain runs, then one line per attempt:
/// green for solved, yellow for exhausted, red for failed.
#[derive(Clone)]
pub struct DecodeProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl DecodeProgress {
    /// Starts the spinner for the given image and chain size.
    pub fn start(image: &str, providers: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Decoding {image} ({providers} providers)"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Hides the spinner while `f` talks to the terminal.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.pb.suspend(f)
    }

    pub fn attempt(&self, record: &AttemptRecord) {
        let (mark, style) = match record.final_state {
            AttemptState::Solved => ("✓", &self.green),
            AttemptState::Exhausted => ("↻", &self.yellow),
            _ => ("✗", &self.red),
        };
        let detail = match (&record.error_kind, &record.error_message) {
            (Some(kind), Some(message)) => format!("{kind}: {message}"),
            (Some(kind), None) => kind.to_string(),
            _ => String::new(),
        };
        self.pb.println(format!(
            "  {} {:<15} {} polls={}/{} {}ms {}",
            style.apply_to(mark),
            record.provider,
            record.final_state,
            record.polls,
            record.max_polls,
            record.duration_ms,
            self.dim.apply_to(detail)
        ));
    }

    /// Stops the spinner and prints the accepted answer.
    pub fn solved(&self, provider: &str, text: &str) {
        self.pb.finish_and_clear();
        println!(
            "  {} {} (via {provider})",
            self.green.apply_to("✓"),
            self.green.apply_to(text)
        );
    }

    /// Stops the spinner and prints why the decode failed.
    pub fn failed(&self, reason: &str) {
        self.pb.finish_and_clear();
        println!("  {} Decode failed: {reason}", self.red.apply_to("✗"));
    }
}
