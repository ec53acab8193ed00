//! In-memory cloud client shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cloudctl::download::ObjectReader;
use cloudctl::resource::{
    CloudClient, FilterClause, ListTarget, Page, ProviderError, RawRecord, RecordGroup,
    ResourceKind, SubResourceKind,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Canned reply for one secondary lookup
#[derive(Clone)]
pub struct SubReply {
    pub delay: Duration,
    pub result: Result<Value, ProviderError>,
}

/// Client whose pages, identity groups and sub-resources are set up front
///
/// Page `n` is requested with token `n`; server clauses are applied the way
/// the provider would, so tests can see what reached the server.
#[derive(Default)]
pub struct FakeClient {
    pub pages: Vec<Result<Vec<Value>, ProviderError>>,
    pub groups: Option<Result<Vec<RecordGroup>, ProviderError>>,
    pub subs: HashMap<SubResourceKind, SubReply>,
    pub objects: HashMap<String, Result<Vec<u8>, ProviderError>>,
    pub list_calls: AtomicUsize,
    pub seen_clauses: Mutex<Vec<Vec<FilterClause>>>,
}

impl FakeClient {
    pub fn with_pages(pages: Vec<Result<Vec<Value>, ProviderError>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn with_groups(groups: Vec<RecordGroup>) -> Self {
        Self {
            groups: Some(Ok(groups)),
            ..Default::default()
        }
    }

    pub fn sub(mut self, kind: SubResourceKind, result: Result<Value, ProviderError>) -> Self {
        self.subs.insert(
            kind,
            SubReply {
                delay: Duration::ZERO,
                result,
            },
        );
        self
    }

    pub fn slow_sub(
        mut self,
        kind: SubResourceKind,
        delay: Duration,
        result: Result<Value, ProviderError>,
    ) -> Self {
        self.subs.insert(kind, SubReply { delay, result });
        self
    }

    pub fn object(mut self, key: &str, result: Result<Vec<u8>, ProviderError>) -> Self {
        self.objects.insert(key.to_string(), result);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudClient for FakeClient {
    async fn list_resources(
        &self,
        target: &ListTarget,
        clauses: &[FilterClause],
        page_token: Option<&str>,
    ) -> Result<Page, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_clauses.lock().unwrap().push(clauses.to_vec());

        let index: usize = page_token.map_or(0, |t| t.parse().unwrap());
        let Some(page) = self.pages.get(index) else {
            return Ok(Page::default());
        };
        let mut items = page.clone()?;
        items.retain(|item| clauses.iter().all(|c| c.matches(item)));
        if let ListTarget::Objects {
            prefix: Some(prefix),
            ..
        } = target
        {
            items.retain(|item| {
                item["name"]
                    .as_str()
                    .is_some_and(|name| name.starts_with(prefix.as_str()))
            });
        }
        let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        Ok(Page { items, next_token })
    }

    async fn get_resource_by_identity(
        &self,
        _kind: ResourceKind,
        _id: &str,
    ) -> Result<Vec<RecordGroup>, ProviderError> {
        self.groups.clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_sub_resource(
        &self,
        kind: SubResourceKind,
        _parents: &[String],
    ) -> Result<RawRecord, ProviderError> {
        let Some(reply) = self.subs.get(&kind).cloned() else {
            return Ok(json!({}));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

#[async_trait]
impl ObjectReader for FakeClient {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ProviderError> {
        self.objects.get(key).cloned().unwrap_or_else(|| {
            Err(ProviderError::api(
                404,
                "notFound",
                format!("No such object: {}/{}", bucket, key),
            ))
        })
    }
}

pub fn instance(name: &str, status: &str, zone: &str) -> Value {
    json!({
        "name": name,
        "id": format!("{}", name.len() * 1000),
        "status": status,
        "machineType": format!("https://www.googleapis.com/compute/v1/projects/p/zones/{}/machineTypes/e2-small", zone),
        "zone": format!("https://www.googleapis.com/compute/v1/projects/p/zones/{}", zone),
        "creationTimestamp": "2021-09-29T01:02:03.000-07:00",
        "networkInterfaces": [{
            "name": "nic0",
            "network": "https://www.googleapis.com/compute/v1/projects/p/global/networks/default",
            "subnetwork": format!("https://www.googleapis.com/compute/v1/projects/p/regions/{}/subnetworks/default", &zone[..zone.len() - 2]),
            "networkIP": "10.0.0.2"
        }],
        "attachedDisks": [{
            "source": format!("https://www.googleapis.com/compute/v1/projects/p/zones/{}/disks/{}", zone, name),
            "deviceName": "persistent-disk-0",
            "boot": true,
            "autoDelete": true,
            "mode": "READ_WRITE"
        }]
    })
}

pub fn bucket(name: &str, created: &str) -> Value {
    json!({
        "name": name,
        "location": "US",
        "storageClass": "STANDARD",
        "timeCreated": created,
        "updated": created
    })
}

pub fn object(name: &str, size: u64) -> Value {
    json!({
        "name": name,
        "size": size.to_string(),
        "storageClass": "STANDARD",
        "updated": "2021-10-01T00:00:00.000Z"
    })
}

pub fn denied(message: &str) -> ProviderError {
    ProviderError::api(403, "PERMISSION_DENIED", message)
}
