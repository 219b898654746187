//! Markdown run summary and step outputs for CI runners.
//!
//! A [`RunSummary`] collects blocks while a command runs and is rendered once
//! at the end. When `GITHUB_STEP_SUMMARY` names a file, the rendering is
//! written there; `GITHUB_OUTPUT` receives `name=value` step outputs.

use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::state_machine::ItemReport;

pub const STEP_SUMMARY_ENV: &str = "GITHUB_STEP_SUMMARY";
pub const OUTPUT_ENV: &str = "GITHUB_OUTPUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Note,
    Tip,
    Warning,
    Caution,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Note => write!(f, "NOTE"),
            AlertKind::Tip => write!(f, "TIP"),
            AlertKind::Warning => write!(f, "WARNING"),
            AlertKind::Caution => write!(f, "CAUTION"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Raw(String),
    Alert(AlertKind, String),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    List(Vec<String>),
    Details {
        summary: String,
        lines: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    status: Option<String>,
    blocks: Vec<Block>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the status line shown above the results.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn raw(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Raw(text.into()));
    }

    pub fn alert(&mut self, kind: AlertKind, text: impl Into<String>) {
        self.blocks.push(Block::Alert(kind, text.into()));
    }

    /// First column of each row is rendered bold.
    pub fn table(&mut self, header: Vec<String>, rows: Vec<Vec<String>>) {
        self.blocks.push(Block::Table { header, rows });
    }

    pub fn list(&mut self, items: Vec<String>) {
        self.blocks.push(Block::List(items));
    }

    /// Collapsible section with one item's detail lines and label changes.
    pub fn item(&mut self, report: &ItemReport, repo: &impl fmt::Display) {
        let lines = report
            .notes
            .iter()
            .cloned()
            .chain(report.mutations.iter().map(ToString::to_string))
            .collect();
        self.blocks.push(Block::Details {
            summary: report.headline(repo),
            lines,
        });
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(status) = &self.status {
            let _ = write!(out, "### Status\n\n{status}\n\n");
            if !self.blocks.is_empty() {
                out.push_str("### Results\n\n");
            }
        }
        for block in &self.blocks {
            render_block(&mut out, block);
            out.push('\n');
        }
        out
    }

    /// Appends the rendering to `path`, keeping what earlier steps wrote.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.render().as_bytes())
    }

    /// Writes to the file named by `GITHUB_STEP_SUMMARY`. Returns whether it was set.
    pub fn write_to_env(&self) -> io::Result<bool> {
        match std::env::var_os(STEP_SUMMARY_ENV) {
            Some(path) if !path.is_empty() => {
                self.write_to(Path::new(&path))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn render_block(out: &mut String, block: &Block) {
    match block {
        Block::Raw(text) => {
            let _ = writeln!(out, "{text}");
        }
        Block::Alert(kind, text) => {
            let _ = writeln!(out, "> [!{kind}]");
            for line in text.lines() {
                let _ = writeln!(out, "> {line}");
            }
        }
        Block::Table { header, rows } => {
            let _ = writeln!(out, "| {} |", header.join(" | "));
            let align: Vec<&str> = header
                .iter()
                .enumerate()
                .map(|(i, _)| if i == 0 { ":---" } else { "---:" })
                .collect();
            let _ = writeln!(out, "| {} |", align.join(" | "));
            for row in rows {
                let cells: Vec<String> = row
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| if i == 0 { format!("**{cell}**") } else { cell.clone() })
                    .collect();
                let _ = writeln!(out, "| {} |", cells.join(" | "));
            }
        }
        Block::List(items) => {
            for item in items {
                let _ = writeln!(out, "- {item}");
            }
        }
        Block::Details { summary, lines } => {
            let _ = writeln!(out, "<details>\n<summary>{summary}</summary>\n");
            for line in lines {
                let _ = writeln!(out, "    {line}");
            }
            let _ = writeln!(out, "\n</details>");
        }
    }
}

/// Appends `name=value` lines to the step output file at `path`.
pub fn append_outputs(path: &Path, outputs: &[(&str, String)]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for (name, value) in outputs {
        writeln!(file, "{name}={value}")?;
    }
    Ok(())
}

/// Appends to the file named by `GITHUB_OUTPUT`. Returns whether it was set.
pub fn write_outputs(outputs: &[(&str, String)]) -> io::Result<bool> {
    match std::env::var_os(OUTPUT_ENV) {
        Some(path) if !path.is_empty() => {
            append_outputs(Path::new(&path), outputs)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}
