//! Object downloads
//!
//! Given a bucket, a key (or a prefix with `recursive`) and a destination
//! directory, every object is fetched concurrently and written under the
//! destination. Each object gets its own transfer summary.

use crate::resource::{
    fetch_resources, ClassifiedError, CloudClient, FetchOptions, FilterCriteria, ListTarget,
    ProviderError, Severity,
};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Reads object contents
#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub bucket: String,
    pub key: String,
    pub destination: PathBuf,
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub source: String,
    pub destination: PathBuf,
    pub bytes: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
}

impl TransferSummary {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub bucket: String,
    pub transfers: Vec<TransferSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClassifiedError>,
}

impl DownloadReport {
    fn failed(bucket: &str, error: ClassifiedError) -> Self {
        Self {
            bucket: bucket.to_string(),
            transfers: Vec::new(),
            status: Some(error),
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.transfers.iter().map(|t| t.bytes).sum()
    }
}

/// Relative path for a key, refusing anything that would leave the destination
fn safe_relative(key: &str) -> Option<PathBuf> {
    let path = Path::new(key);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

/// Download one object or every object under a prefix
pub async fn download<R>(reader: Arc<R>, request: &DownloadRequest) -> DownloadReport
where
    R: CloudClient + ObjectReader + 'static,
{
    let keys: Vec<String> = if request.recursive {
        let target = ListTarget::Objects {
            bucket: request.bucket.clone(),
            prefix: Some(request.key.clone()).filter(|k| !k.is_empty()),
        };
        let listed = fetch_resources(
            reader.as_ref(),
            &target,
            &FilterCriteria::default(),
            FetchOptions::default(),
        )
        .await;
        if listed.is_error() {
            let status = listed
                .status
                .unwrap_or_else(|| ClassifiedError::new("object listing failed", Severity::Error));
            return DownloadReport::failed(&request.bucket, status);
        }
        let keys: Vec<String> = listed
            .items
            .iter()
            .filter_map(|o| o.get("name").and_then(|n| n.as_str()))
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        if keys.is_empty() {
            return DownloadReport::failed(
                &request.bucket,
                ClassifiedError::new(
                    format!("no objects found under gs://{}/{}", request.bucket, request.key),
                    Severity::Warn,
                ),
            );
        }
        keys
    } else {
        vec![request.key.clone()]
    };

    tracing::info!("downloading {} object(s) from gs://{}", keys.len(), request.bucket);

    let handles: Vec<_> = keys
        .into_iter()
        .map(|key| {
            let reader = Arc::clone(&reader);
            let bucket = request.bucket.clone();
            let destination = request.destination.clone();
            let recursive = request.recursive;
            let source = format!("gs://{}/{}", bucket, key);
            let handle = tokio::spawn(async move {
                transfer(reader.as_ref(), &bucket, &key, &destination, recursive).await
            });
            (source, handle)
        })
        .collect();

    let mut transfers = Vec::with_capacity(handles.len());
    for (source, handle) in handles {
        let summary = match handle.await {
            Ok(summary) => summary,
            Err(err) => TransferSummary {
                source: source.clone(),
                destination: request.destination.clone(),
                bytes: 0,
                elapsed_ms: 0,
                error: Some(ClassifiedError::new(
                    format!("download task did not complete: {}", err),
                    Severity::Error,
                )),
            },
        };
        transfers.push(summary);
    }

    let failed = transfers.iter().filter(|t| !t.succeeded()).count();
    let status = match failed {
        0 => None,
        n if n == transfers.len() => Some(ClassifiedError::new(
            format!("all {} download(s) failed", n),
            Severity::Error,
        )),
        n => Some(ClassifiedError::new(
            format!("{} of {} downloads failed", n, transfers.len()),
            Severity::Warn,
        )),
    };

    DownloadReport {
        bucket: request.bucket.clone(),
        transfers,
        status,
    }
}

async fn transfer<R>(
    reader: &R,
    bucket: &str,
    key: &str,
    destination: &Path,
    keep_tree: bool,
) -> TransferSummary
where
    R: ObjectReader + ?Sized,
{
    let started = Instant::now();
    let source = format!("gs://{}/{}", bucket, key);

    let target = safe_relative(key).map(|relative| {
        if keep_tree {
            destination.join(relative)
        } else {
            // Single objects land directly in the destination
            destination.join(relative.file_name().unwrap_or(relative.as_os_str()))
        }
    });

    let fail = |target: PathBuf, error: ClassifiedError| TransferSummary {
        source: source.clone(),
        destination: target,
        bytes: 0,
        elapsed_ms: started.elapsed().as_millis() as u64,
        error: Some(error),
    };

    let Some(target) = target else {
        return fail(
            destination.to_path_buf(),
            ClassifiedError::new(format!("refusing unsafe object key '{}'", key), Severity::Error),
        );
    };

    let body = match reader.read_object(bucket, key).await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!("download of {} failed: {}", source, err);
            return fail(target, ClassifiedError::from(&err));
        }
    };

    if let Err(err) = write_file(&target, &body).await {
        tracing::warn!("writing {} failed: {:#}", target.display(), err);
        return fail(target, ClassifiedError::new(format!("{:#}", err), Severity::Error));
    }

    tracing::debug!("wrote {} bytes to {}", body.len(), target.display());
    TransferSummary {
        source,
        destination: target,
        bytes: body.len() as u64,
        elapsed_ms: started.elapsed().as_millis() as u64,
        error: None,
    }
}

async fn write_file(target: &Path, body: &[u8]) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(target, body)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))
}
