//! Resource aggregation and filtering engine
//!
//! Everything here is provider-agnostic: it is written against the
//! [`CloudClient`] trait and works on raw JSON records.
//!
//! # Architecture
//!
//! - [`filter`] - Turns user criteria into server clauses and a client predicate
//! - [`fetcher`] - Walks paginated listings applying the predicate
//! - [`detail`] - Fans out secondary lookups and joins them into a composite
//! - [`error`] - Severity classification carried alongside results
//! - [`model`] - Typed summaries read out of raw records
//!
//! # Example
//!
//! ```ignore
//! use cloudctl::resource::{fetch_resources, FetchOptions, FilterCriteria, FilterField, ListTarget};
//!
//! async fn running(client: &dyn cloudctl::resource::CloudClient) {
//!     let criteria = FilterCriteria::new().with_values(FilterField::State, ["running"]);
//!     let result = fetch_resources(client, &ListTarget::Instances, &criteria, FetchOptions::default()).await;
//!     println!("{} running", result.items.len());
//! }
//! ```

pub mod client;
pub mod detail;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod model;
pub mod record;

pub use client::{CloudClient, ListTarget, Page, RawRecord, RecordGroup, ResourceKind, SubResourceKind};
pub use detail::{Aggregator, BucketDefinition, InstanceDefinition, Section};
pub use error::{ClassifiedError, DescribeError, ErrorKind, ProviderError, Severity};
pub use fetcher::{fetch_resources, FetchOptions, GroupedList, ListResult};
pub use filter::{FilterClause, FilterCriteria, FilterField, Predicate, RecordLayout};
