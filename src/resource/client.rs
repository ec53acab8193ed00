//! Cloud Client
//!
//! The read-only capability the fetcher and aggregator are written against.
//! The GCP implementation lives in [`crate::gcp::provider`]; tests supply
//! in-memory fakes.

use super::error::ProviderError;
use super::filter::{FilterClause, RecordLayout};
use async_trait::async_trait;
use serde_json::Value;

/// Raw provider record for one resource
pub type RawRecord = Value;

/// Records sharing one container (for instances, one zone scope)
pub type RecordGroup = Vec<RawRecord>;

/// What a listing walks over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListTarget {
    Instances,
    Buckets,
    Objects {
        bucket: String,
        prefix: Option<String>,
    },
}

impl ListTarget {
    /// Field names the client-side predicate reads for this target
    pub fn layout(&self) -> RecordLayout {
        match self {
            Self::Instances => RecordLayout::INSTANCE,
            Self::Buckets => RecordLayout::BUCKET,
            Self::Objects { .. } => RecordLayout::OBJECT,
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            Self::Instances => "instance",
            Self::Buckets => "bucket",
            Self::Objects { .. } => "object",
        }
    }
}

/// Resource types that can be looked up by identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Instance,
    Bucket,
}

/// Secondary lookups dispatched during detail aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResourceKind {
    Disks,
    FirewallRules,
    BucketPolicy,
    BucketVersioning,
    BucketLabels,
    BucketEncryption,
    BucketLifecycle,
}

impl SubResourceKind {
    pub fn section_name(&self) -> &'static str {
        match self {
            Self::Disks => "Volumes",
            Self::FirewallRules => "Firewall Rules",
            Self::BucketPolicy => "Policy",
            Self::BucketVersioning => "Versioning",
            Self::BucketLabels => "Tags",
            Self::BucketEncryption => "Encryption",
            Self::BucketLifecycle => "Lifecycle",
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<RawRecord>,
    pub next_token: Option<String>,
}

/// Read-only access to a cloud provider
///
/// Implementations are shared across concurrently running lookups and must
/// not keep per-call mutable state.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Fetch one page of `target`, narrowed by server-side `clauses`
    async fn list_resources(
        &self,
        target: &ListTarget,
        clauses: &[FilterClause],
        page_token: Option<&str>,
    ) -> Result<Page, ProviderError>;

    /// Look up a resource by its unique identifier, grouped by container
    async fn get_resource_by_identity(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Vec<RecordGroup>, ProviderError>;

    /// Fetch one secondary resource derived from `parents`
    async fn get_sub_resource(
        &self,
        kind: SubResourceKind,
        parents: &[String],
    ) -> Result<RawRecord, ProviderError>;
}
