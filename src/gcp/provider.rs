//! GCP binding of the [`CloudClient`] capability
//!
//! Instances come from Compute Engine (zonal, or aggregated when the zone is
//! `all`), buckets and objects from Cloud Storage.

use super::client::{add_query_params, GcpClient};
use crate::download::ObjectReader;
use crate::resource::filter::{FilterClause, FilterField};
use crate::resource::record::{short_name, str_field};
use crate::resource::{
    CloudClient, ListTarget, Page, ProviderError, RawRecord, RecordGroup, ResourceKind,
    SubResourceKind,
};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Render server-side clauses in Compute Engine filter syntax
///
/// One `eq` expression per field; values become a regex alternation and the
/// expressions are space-separated, which the API treats as AND.
pub fn render_filter(clauses: &[FilterClause]) -> String {
    clauses
        .iter()
        .filter(|clause| !clause.values.is_empty())
        .map(|clause| {
            let alternatives = clause
                .values
                .iter()
                .map(|v| regex::escape(v))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = match clause.field {
                FilterField::State => format!("(?i)({})", alternatives),
                // URL-valued fields match on their last path segment
                _ => format!(".*/({})", alternatives),
            };
            format!("({} eq \"{}\")", clause.field.provider_field(), pattern)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Group an aggregated list reply by scope (`zones/us-central1-a`), skipping empty scopes
fn aggregated_groups(response: &Value, field: &str) -> BTreeMap<String, Vec<Value>> {
    let mut groups = BTreeMap::new();
    let Some(items) = response.get("items").and_then(|v| v.as_object()) else {
        return groups;
    };
    for (scope, scoped) in items {
        let records = scoped
            .get(field)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        if !records.is_empty() {
            groups.insert(scope.clone(), records);
        }
    }
    groups
}

fn next_token(response: &Value) -> Option<String> {
    str_field(response, "nextPageToken")
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn items(response: &Value) -> Vec<Value> {
    response
        .get("items")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn first_parent(kind: SubResourceKind, parents: &[String]) -> Result<&str, ProviderError> {
    parents.first().map(String::as_str).ok_or_else(|| {
        ProviderError::invalid_request(format!("{} lookup needs a parent", kind.section_name()))
    })
}

impl GcpClient {
    async fn list_instances(
        &self,
        clauses: &[FilterClause],
        page_token: Option<&str>,
    ) -> Result<Page, ProviderError> {
        let filter = render_filter(clauses);
        let base = if self.is_aggregated() {
            self.compute_aggregated_url("instances")
        } else {
            self.compute_zonal_url("instances")
        };
        let url = add_query_params(
            &base,
            &[("filter", filter.as_str()), ("pageToken", page_token.unwrap_or_default())],
        );
        let response = self.get(&url).await?;

        let records = if self.is_aggregated() {
            aggregated_groups(&response, "instances")
                .into_values()
                .flatten()
                .collect()
        } else {
            items(&response)
        };
        Ok(Page {
            items: records,
            next_token: next_token(&response),
        })
    }

    /// Walk the aggregated listing for one name (or numeric id), keeping scope groups
    async fn find_instance(&self, id: &str) -> Result<Vec<RecordGroup>, ProviderError> {
        let field = if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            "id"
        } else {
            "name"
        };
        let filter = format!("({} eq \"{}\")", field, regex::escape(id));
        let mut groups: BTreeMap<String, RecordGroup> = BTreeMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = add_query_params(
                &self.compute_aggregated_url("instances"),
                &[("filter", filter.as_str()), ("pageToken", page_token.as_deref().unwrap_or_default())],
            );
            let response = self.get(&url).await?;
            for (scope, records) in aggregated_groups(&response, "instances") {
                groups.entry(scope).or_default().extend(records);
            }
            match next_token(&response) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(groups.into_values().collect())
    }

    async fn fetch_disks(&self, sources: &[String]) -> Result<Value, ProviderError> {
        let results = join_all(sources.iter().map(|src| self.get_rebased(src))).await;
        let disks = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(json!({ "items": disks }))
    }

    async fn get_rebased(&self, link: &str) -> Result<Value, ProviderError> {
        self.get(&self.rebase_link(link)).await
    }

    /// Firewall rules attached to any of `networks`
    async fn fetch_firewalls(&self, networks: &[String]) -> Result<Value, ProviderError> {
        let wanted: Vec<&str> = networks.iter().map(|n| short_name(n)).collect();
        let mut rules = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = add_query_params(
                &self.compute_global_url("firewalls"),
                &[("pageToken", page_token.as_deref().unwrap_or_default())],
            );
            let response = self.get(&url).await?;
            rules.extend(items(&response).into_iter().filter(|fw| {
                str_field(fw, "network")
                    .is_some_and(|net| wanted.iter().any(|w| *w == short_name(net)))
            }));
            match next_token(&response) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(json!({ "items": rules }))
    }

    async fn bucket_fields(&self, bucket: &str, fields: &str) -> Result<Value, ProviderError> {
        let url = add_query_params(&self.storage_bucket_url(bucket), &[("fields", fields)]);
        self.get(&url).await
    }
}

#[async_trait]
impl CloudClient for GcpClient {
    async fn list_resources(
        &self,
        target: &ListTarget,
        clauses: &[FilterClause],
        page_token: Option<&str>,
    ) -> Result<Page, ProviderError> {
        let token = page_token.unwrap_or_default();
        match target {
            ListTarget::Instances => self.list_instances(clauses, page_token).await,
            ListTarget::Buckets => {
                let url = add_query_params(
                    &self.storage_url("b"),
                    &[("project", self.project_id.as_str()), ("pageToken", token)],
                );
                let response = self.get(&url).await?;
                Ok(Page {
                    items: items(&response),
                    next_token: next_token(&response),
                })
            }
            ListTarget::Objects { bucket, prefix } => {
                let url = add_query_params(
                    &self.storage_objects_url(bucket),
                    &[
                        ("prefix", prefix.as_deref().unwrap_or_default()),
                        ("pageToken", token),
                    ],
                );
                let response = self.get(&url).await?;
                Ok(Page {
                    items: items(&response),
                    next_token: next_token(&response),
                })
            }
        }
    }

    async fn get_resource_by_identity(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Vec<RecordGroup>, ProviderError> {
        match kind {
            ResourceKind::Instance => self.find_instance(id).await,
            ResourceKind::Bucket => match self.get(&self.storage_bucket_url(id)).await {
                Ok(bucket) => Ok(vec![vec![bucket]]),
                Err(err) if err.status == Some(404) => Ok(Vec::new()),
                Err(err) => Err(err),
            },
        }
    }

    async fn get_sub_resource(
        &self,
        kind: SubResourceKind,
        parents: &[String],
    ) -> Result<RawRecord, ProviderError> {
        match kind {
            SubResourceKind::Disks => self.fetch_disks(parents).await,
            SubResourceKind::FirewallRules => self.fetch_firewalls(parents).await,
            SubResourceKind::BucketPolicy => {
                let bucket = first_parent(kind, parents)?;
                self.get(&format!("{}/iam", self.storage_bucket_url(bucket)))
                    .await
            }
            SubResourceKind::BucketVersioning => {
                self.bucket_fields(first_parent(kind, parents)?, "versioning")
                    .await
            }
            SubResourceKind::BucketLabels => {
                self.bucket_fields(first_parent(kind, parents)?, "labels").await
            }
            SubResourceKind::BucketEncryption => {
                self.bucket_fields(first_parent(kind, parents)?, "encryption")
                    .await
            }
            SubResourceKind::BucketLifecycle => {
                self.bucket_fields(first_parent(kind, parents)?, "lifecycle")
                    .await
            }
        }
    }
}

#[async_trait]
impl ObjectReader for GcpClient {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ProviderError> {
        self.get_bytes(&self.storage_media_url(bucket, key)).await
    }
}
