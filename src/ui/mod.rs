//! Render sinks
//!
//! A sink receives a projected [`View`] and puts it in front of the user.
//!
//! - [`plain`] - tables on stdout (`tabled`), or JSON / YAML
//! - [`pager`] - full-screen scrollable pager (`ratatui`)

pub mod pager;
pub mod plain;

use crate::view::View;
use anyhow::Result;
use clap::ValueEnum;
use std::time::Duration;

pub use pager::PagerSink;
pub use plain::PlainSink;

/// Output format selected by `--output`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Destination for projected views
pub trait RenderSink {
    fn render(&mut self, view: &View) -> Result<()>;

    /// Called after a non-error render with the time the command took
    fn finish(&mut self, elapsed: Duration) -> Result<()>;
}

/// Truncate a string to at most `max_len` characters, marking the cut with "..."
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_len {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("elapsed: {:.2}s", elapsed.as_secs_f64())
}
