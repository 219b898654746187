//! Terminal output: spinners while long operations run, and one coloured
//! line per processed item.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::BatchReport;
use crate::state_machine::ItemReport;

/// Spinner shown while a download or test pass is running.
pub struct Progress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl Progress {
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(description.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.pb.set_message(message.into());
    }

    pub fn finish(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.green.apply_to("✓"));
    }

    pub fn fail(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.red.apply_to("✗"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Skip,
    Failure,
}

fn tone(report: &ItemReport) -> Tone {
    if !report.success() {
        Tone::Failure
    } else if report.decision.is_skip() {
        Tone::Skip
    } else {
        Tone::Success
    }
}

/// One line per item, in report order.
pub fn print_batch(batch: &BatchReport, repo: &impl std::fmt::Display) {
    let green = Style::new().green();
    let yellow = Style::new().yellow();
    let red = Style::new().red().bold();

    for item in &batch.items {
        let line = item.headline(repo);
        match tone(item) {
            Tone::Success => println!("  {} {line}", green.apply_to("✓")),
            Tone::Skip => println!("  {} {line}", yellow.apply_to("-")),
            Tone::Failure => println!("  {} {line}", red.apply_to("✗")),
        }
    }
}
