//! Tabular Projector
//!
//! Turns command results into render-ready tables. Projection never fails:
//! a classified error in one section becomes a notice block for that
//! section only.

mod instances;
mod storage;

use crate::download::DownloadReport;
use crate::resource::detail::{BucketDefinition, InstanceDefinition, Section};
use crate::resource::model::{BucketSummary, InstanceSummary, ObjectSummary};
use crate::resource::record::PLACEHOLDER;
use crate::resource::{ClassifiedError, DescribeError, GroupedList, ListResult};
use crate::timezone::DisplayInstant;
use serde::Serialize;

/// Result of one command, ready to be projected
#[derive(Debug, Clone)]
pub enum Output {
    InstanceList(GroupedList<InstanceSummary>),
    InstanceDefinition(Result<InstanceDefinition, DescribeError>),
    BucketList(ListResult<BucketSummary>),
    ObjectList {
        bucket: String,
        result: ListResult<ObjectSummary>,
    },
    BucketDefinition(Result<BucketDefinition, DescribeError>),
    Download(DownloadReport),
}

/// A header and rows of equal width
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: Option<&str>, header: &[&str]) -> Self {
        Self {
            title: title.map(str::to_string),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; blank cells become the placeholder
    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(
            row.into_iter()
                .map(|cell| if cell.is_empty() { PLACEHOLDER.to_string() } else { cell })
                .collect(),
        );
    }

    /// Two-column field/value table
    pub fn key_value(title: &str, pairs: Vec<(&str, String)>) -> Self {
        let mut table = Self::new(Some(title), &["Field", "Value"]);
        for (key, value) in pairs {
            table.push_row(vec![key.to_string(), value]);
        }
        table
    }
}

/// One element of a compound view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Table(Table),
    Notice {
        #[serde(skip_serializing_if = "Option::is_none")]
        section: Option<String>,
        error: ClassifiedError,
    },
}

impl Block {
    pub fn notice(section: Option<&str>, error: &ClassifiedError) -> Self {
        Self::Notice {
            section: section.map(str::to_string),
            error: error.clone(),
        }
    }
}

/// What the render sink receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "data", rename_all = "snake_case")]
pub enum View {
    Table(Table),
    Compound(Vec<Block>),
    Error(ClassifiedError),
}

impl View {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// A list view: the tables followed by the status marker, if any
    fn listing(tables: Vec<Table>, status: Option<&ClassifiedError>) -> Self {
        match status {
            Some(err) if err.is_error() => Self::Error(err.clone()),
            None if tables.len() == 1 => tables
                .into_iter()
                .next()
                .map(Self::Table)
                .unwrap_or(Self::Compound(Vec::new())),
            status => {
                let mut blocks: Vec<Block> = tables
                    .into_iter()
                    .filter(|t| !t.rows.is_empty())
                    .map(Block::Table)
                    .collect();
                if let Some(err) = status {
                    blocks.push(Block::notice(None, err));
                }
                Self::Compound(blocks)
            }
        }
    }
}

/// Project a command result into a view
pub fn project(output: &Output) -> View {
    match output {
        Output::InstanceList(list) => instances::list(list),
        Output::InstanceDefinition(Ok(def)) => instances::definition(def),
        Output::BucketList(list) => storage::buckets(list),
        Output::ObjectList { bucket, result } => storage::objects(bucket, result),
        Output::BucketDefinition(Ok(def)) => storage::definition(def),
        Output::InstanceDefinition(Err(err)) | Output::BucketDefinition(Err(err)) => {
            View::Error(ClassifiedError::from(err))
        }
        Output::Download(report) => storage::download(report),
    }
}

/// Either the table built from a ready section or the section's notice
fn section_block<T>(name: &str, section: &Section<T>, build: impl FnOnce(&T) -> Block) -> Block {
    match section {
        Section::Ready(value) => build(value),
        Section::Unavailable(err) => Block::notice(Some(name), err),
    }
}

fn instant_cell(instant: &Option<DisplayInstant>) -> String {
    instant
        .as_ref()
        .map(|i| i.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn yes_no(flag: bool) -> String {
    (if flag { "Yes" } else { "No" }).to_string()
}
