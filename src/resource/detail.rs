//! Detail Aggregator
//!
//! Builds a composite record for one resource: the primary record is looked
//! up by identity, then every secondary lookup derived from it is spawned as
//! its own task. Each task is awaited into a fixed slot, so section order
//! never depends on completion order. A failing or slow section is reported
//! on that section only.

use super::client::{CloudClient, RawRecord, ResourceKind, SubResourceKind};
use super::error::{ClassifiedError, DescribeError, ProviderError, Severity};
use super::model::{
    BucketSummary, Encryption, FirewallRules, InstanceDetail, InstanceSummary, Label,
    LifecycleRule, NetworkInterface, PolicyBinding, Versioning, Volume,
};
use crate::timezone::DisplayZone;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default deadline for a single secondary lookup
pub const DEFAULT_SECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// A section that was either fetched or carries the reason it wasn't
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Unavailable(ClassifiedError),
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Unavailable(err) if err.is_error())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Section<U> {
        match self {
            Self::Ready(value) => Section::Ready(f(value)),
            Self::Unavailable(err) => Section::Unavailable(err),
        }
    }

    /// Ready values that are empty become an Info section
    fn non_empty(self, is_empty: impl FnOnce(&T) -> bool, message: &str) -> Self {
        match self {
            Self::Ready(value) if is_empty(&value) => {
                Self::Unavailable(ClassifiedError::empty(message))
            }
            other => other,
        }
    }
}

/// Warn status for a composite whose error-carrying sections are among `total`
fn composite_status(errors: usize, total: usize) -> Option<ClassifiedError> {
    (errors > 0).then(|| ClassifiedError::partial_failure(errors, total))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceDefinition {
    pub summary: InstanceSummary,
    pub detail: InstanceDetail,
    pub rules: Section<FirewallRules>,
    pub volumes: Section<Vec<Volume>>,
    pub network_interfaces: Section<Vec<NetworkInterface>>,
    pub status: Option<ClassifiedError>,
}

impl InstanceDefinition {
    /// Build the composite from every section at once
    pub fn assemble(
        summary: InstanceSummary,
        detail: InstanceDetail,
        rules: Section<FirewallRules>,
        volumes: Section<Vec<Volume>>,
        network_interfaces: Section<Vec<NetworkInterface>>,
    ) -> Self {
        let errors = [rules.is_error(), volumes.is_error(), network_interfaces.is_error()]
            .into_iter()
            .filter(|e| *e)
            .count();
        Self {
            summary,
            detail,
            rules,
            volumes,
            network_interfaces,
            status: composite_status(errors, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketDefinition {
    pub summary: BucketSummary,
    pub policy: Section<Vec<PolicyBinding>>,
    pub versioning: Section<Versioning>,
    pub tags: Section<Vec<Label>>,
    pub encryption: Section<Encryption>,
    pub lifecycle: Section<Vec<LifecycleRule>>,
    pub status: Option<ClassifiedError>,
}

impl BucketDefinition {
    pub fn assemble(
        summary: BucketSummary,
        policy: Section<Vec<PolicyBinding>>,
        versioning: Section<Versioning>,
        tags: Section<Vec<Label>>,
        encryption: Section<Encryption>,
        lifecycle: Section<Vec<LifecycleRule>>,
    ) -> Self {
        let errors = [
            policy.is_error(),
            versioning.is_error(),
            tags.is_error(),
            encryption.is_error(),
            lifecycle.is_error(),
        ]
        .into_iter()
        .filter(|e| *e)
        .count();
        Self {
            summary,
            policy,
            versioning,
            tags,
            encryption,
            lifecycle,
            status: composite_status(errors, 5),
        }
    }
}

/// Fans out secondary lookups for one resource
#[derive(Clone)]
pub struct Aggregator {
    client: Arc<dyn CloudClient>,
    zone: DisplayZone,
    section_timeout: Duration,
}

type Slot = JoinHandle<Section<RawRecord>>;

impl Aggregator {
    pub fn new(client: Arc<dyn CloudClient>, zone: DisplayZone) -> Self {
        Self {
            client,
            zone,
            section_timeout: DEFAULT_SECTION_TIMEOUT,
        }
    }

    pub fn with_section_timeout(mut self, timeout: Duration) -> Self {
        self.section_timeout = timeout;
        self
    }

    /// Look up exactly one record; anything else is fatal
    async fn primary(&self, kind: ResourceKind, id: &str) -> Result<RawRecord, DescribeError> {
        let groups = self
            .client
            .get_resource_by_identity(kind, id)
            .await
            .map_err(|source| DescribeError::RequestFailure {
                id: id.to_string(),
                source,
            })?;

        let records: usize = groups.iter().map(Vec::len).sum();
        match groups.as_slice() {
            [group] if group.len() == 1 => Ok(group[0].clone()),
            _ => Err(DescribeError::InvariantViolation {
                id: id.to_string(),
                groups: groups.len(),
                records,
            }),
        }
    }

    /// Spawn one secondary lookup under the section deadline
    fn dispatch(&self, kind: SubResourceKind, parents: Vec<String>) -> Slot {
        let client = Arc::clone(&self.client);
        let timeout = self.section_timeout;
        tokio::spawn(async move {
            tracing::debug!("fetching {} for {:?}", kind.section_name(), parents);
            match tokio::time::timeout(timeout, client.get_sub_resource(kind, &parents)).await {
                Ok(Ok(record)) => Section::Ready(record),
                Ok(Err(err)) => section_failure(kind, &err),
                Err(_) => {
                    tracing::warn!("{} lookup timed out after {:?}", kind.section_name(), timeout);
                    Section::Unavailable(ClassifiedError::timed_out(kind.section_name(), timeout))
                }
            }
        })
    }

    /// Dispatch only when there is something to look up
    fn dispatch_if_any(&self, kind: SubResourceKind, parents: Vec<String>) -> Option<Slot> {
        if parents.is_empty() {
            None
        } else {
            Some(self.dispatch(kind, parents))
        }
    }

    pub async fn describe_instance(&self, id: &str) -> Result<InstanceDefinition, DescribeError> {
        let primary = self.primary(ResourceKind::Instance, id).await?;

        let disks = self.dispatch_if_any(SubResourceKind::Disks, Volume::source_urls(&primary));
        let firewalls = self.dispatch_if_any(
            SubResourceKind::FirewallRules,
            NetworkInterface::network_urls(&primary),
        );

        // Join in fixed order
        let volumes = match disks {
            Some(slot) => settle(SubResourceKind::Disks, slot)
                .await
                .map(|disks| Volume::list_from(&primary, &disks, self.zone)),
            None => no_sub_resources("volumes"),
        };
        let rules = match firewalls {
            Some(slot) => settle(SubResourceKind::FirewallRules, slot)
                .await
                .map(|fw| FirewallRules::for_instance(&fw, &primary))
                .non_empty(FirewallRules::is_empty, "no firewall rules apply to this instance"),
            None => no_sub_resources("firewall rules"),
        };

        let network_interfaces = NetworkInterface::list_from(&primary);
        let network_interfaces = if network_interfaces.is_empty() {
            no_sub_resources("network interfaces")
        } else {
            Section::Ready(network_interfaces)
        };

        Ok(InstanceDefinition::assemble(
            InstanceSummary::from_record(&primary, self.zone),
            InstanceDetail::from_record(&primary, self.zone),
            rules,
            volumes,
            network_interfaces,
        ))
    }

    pub async fn describe_bucket(&self, name: &str) -> Result<BucketDefinition, DescribeError> {
        let primary = self.primary(ResourceKind::Bucket, name).await?;
        let parents = vec![name.to_string()];

        let policy = self.dispatch(SubResourceKind::BucketPolicy, parents.clone());
        let versioning = self.dispatch(SubResourceKind::BucketVersioning, parents.clone());
        let labels = self.dispatch(SubResourceKind::BucketLabels, parents.clone());
        let encryption = self.dispatch(SubResourceKind::BucketEncryption, parents.clone());
        let lifecycle = self.dispatch(SubResourceKind::BucketLifecycle, parents);

        let policy = settle(SubResourceKind::BucketPolicy, policy)
            .await
            .map(|p| PolicyBinding::list_from(&p))
            .non_empty(Vec::is_empty, "bucket has no IAM policy bindings");
        let versioning = settle(SubResourceKind::BucketVersioning, versioning)
            .await
            .map(|v| Versioning::from_response(&v));
        let tags = settle(SubResourceKind::BucketLabels, labels)
            .await
            .map(|l| Label::list_from(l.get("labels")))
            .non_empty(Vec::is_empty, "bucket has no tags");
        let encryption = match settle(SubResourceKind::BucketEncryption, encryption).await {
            Section::Ready(e) => match Encryption::from_response(&e) {
                Some(enc) => Section::Ready(enc),
                None => Section::Unavailable(ClassifiedError::empty(
                    "bucket uses Google-managed encryption keys",
                )),
            },
            Section::Unavailable(err) => Section::Unavailable(err),
        };
        let lifecycle = settle(SubResourceKind::BucketLifecycle, lifecycle)
            .await
            .map(|l| LifecycleRule::list_from(&l))
            .non_empty(Vec::is_empty, "bucket has no lifecycle rules");

        Ok(BucketDefinition::assemble(
            BucketSummary::from_record(&primary, self.zone),
            policy,
            versioning,
            tags,
            encryption,
            lifecycle,
        ))
    }
}

fn no_sub_resources<T>(what: &str) -> Section<T> {
    Section::Unavailable(ClassifiedError::empty(format!("no {} found", what)))
}

fn section_failure<T>(kind: SubResourceKind, err: &ProviderError) -> Section<T> {
    tracing::warn!("{} lookup failed: {}", kind.section_name(), err);
    Section::Unavailable(
        ClassifiedError::from(err).with_metadata("section", kind.section_name()),
    )
}

/// Await a slot; a task that panicked or was cancelled becomes an Error section
async fn settle(kind: SubResourceKind, slot: Slot) -> Section<RawRecord> {
    match slot.await {
        Ok(section) => section,
        Err(err) => {
            tracing::error!("{} task failed: {}", kind.section_name(), err);
            Section::Unavailable(
                ClassifiedError::new(
                    format!("{} task did not complete: {}", kind.section_name(), err),
                    Severity::Error,
                )
                .with_metadata("section", kind.section_name()),
            )
        }
    }
}
