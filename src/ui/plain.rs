//! Plain output: tables, JSON or YAML on a writer (stdout by default)

use super::{format_elapsed, truncate_string, OutputFormat, RenderSink};
use crate::resource::{ClassifiedError, Severity};
use crate::view::{Block, Table, View};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tabled::{builder::Builder, settings::Style};

/// Cells longer than this are cut
const MAX_CELL_WIDTH: usize = 80;

/// Determine whether color output should be enabled.
pub fn should_color() -> bool {
    io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err()
}

pub struct PlainSink<W: Write> {
    out: W,
    format: OutputFormat,
    color: bool,
}

impl PlainSink<io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(io::stdout(), format, should_color())
    }
}

impl<W: Write> PlainSink<W> {
    pub fn new(out: W, format: OutputFormat, color: bool) -> Self {
        Self { out, format, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSink for PlainSink<W> {
    fn render(&mut self, view: &View) -> Result<()> {
        let text = match self.format {
            OutputFormat::Table => render_text(view, self.color),
            OutputFormat::Json => {
                serde_json::to_string_pretty(view).context("Failed to serialize output")?
            }
            OutputFormat::Yaml => serde_yaml::to_string(view).context("Failed to serialize output")?,
        };
        writeln!(self.out, "{}", text.trim_end()).context("Failed to write output")?;
        Ok(())
    }

    fn finish(&mut self, elapsed: Duration) -> Result<()> {
        // Structured formats stay machine-readable
        if self.format == OutputFormat::Table {
            writeln!(self.out, "\n{}", format_elapsed(elapsed)).context("Failed to write output")?;
        }
        self.out.flush().context("Failed to flush output")
    }
}

/// Render a view as text tables and notices
pub fn render_text(view: &View, color: bool) -> String {
    match view {
        View::Table(table) => render_table(table, color),
        View::Error(err) => render_notice(None, err, color),
        View::Compound(blocks) => blocks
            .iter()
            .map(|block| match block {
                Block::Table(table) => render_table(table, color),
                Block::Notice { section, error } => render_notice(section.as_deref(), error, color),
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn render_table(table: &Table, color: bool) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.header.iter().cloned());
    for row in &table.rows {
        builder.push_record(row.iter().map(|cell| truncate_string(cell, MAX_CELL_WIDTH)));
    }
    let body = builder.build().with(Style::rounded()).to_string();

    match &table.title {
        Some(title) if color => format!("{}\n{}", title.as_str().bold(), body),
        Some(title) => format!("{}\n{}", title, body),
        None => body,
    }
}

fn render_notice(section: Option<&str>, err: &ClassifiedError, color: bool) -> String {
    let mut line = match section {
        Some(section) => format!("{} {}: {}", err.severity.label(), section, err.message),
        None => format!("{} {}", err.severity.label(), err.message),
    };
    if let Some(code) = err.metadata.get("code") {
        line.push_str(&format!(" (code: {})", code));
    }
    if let Some(hint) = err.metadata.get("hint") {
        line.push_str(&format!("\n  hint: {}", hint));
    }

    if !color {
        return line;
    }
    match err.severity {
        Severity::Info => line.cyan().to_string(),
        Severity::Warn => line.yellow().bold().to_string(),
        Severity::Error => line.red().bold().to_string(),
    }
}
