//! Cloud Storage commands

use crate::download::{download, DownloadRequest, ObjectReader};
use crate::resource::model::{BucketSummary, ObjectSummary};
use crate::resource::{
    fetch_resources, Aggregator, CloudClient, FetchOptions, FilterCriteria, ListTarget,
};
use crate::timezone::DisplayZone;
use crate::view::Output;
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use std::sync::Arc;

/// Default cap on listed objects
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Filters accepted by `storage ls`
#[derive(Debug, Clone, Default, Args)]
pub struct BucketFilters {
    /// Bucket name substring (case-sensitive)
    #[arg(long)]
    pub name: Option<String>,

    /// Creation time pattern, e.g. "2021-09-29T*" (UTC)
    #[arg(long)]
    pub created_at: Option<String>,

    /// Created at or after, "YYYY-MM-DD HH:MM:SS" in the display timezone
    #[arg(long)]
    pub from: Option<String>,

    /// Created at or before, "YYYY-MM-DD HH:MM:SS" in the display timezone
    #[arg(long)]
    pub to: Option<String>,
}

impl BucketFilters {
    /// Build criteria; an open end of the range is unbounded
    pub fn criteria(&self, zone: DisplayZone) -> Result<FilterCriteria> {
        let criteria = FilterCriteria::new()
            .with_name_containing(self.name.clone())
            .with_date_pattern(self.created_at.clone());

        if self.from.is_none() && self.to.is_none() {
            return Ok(criteria);
        }
        let from = match &self.from {
            Some(raw) => zone.parse_local(raw)?,
            None => DateTime::<Utc>::MIN_UTC,
        };
        let to = match &self.to {
            Some(raw) => zone.parse_local(raw)?,
            None => DateTime::<Utc>::MAX_UTC,
        };
        Ok(criteria.with_time_range(from, to)?)
    }
}

pub async fn list_buckets(
    client: &dyn CloudClient,
    zone: DisplayZone,
    criteria: &FilterCriteria,
) -> Output {
    let result = fetch_resources(client, &ListTarget::Buckets, criteria, FetchOptions::default())
        .await
        .map(|record| BucketSummary::from_record(&record, zone));
    tracing::info!("listed {} bucket(s)", result.items.len());
    Output::BucketList(result)
}

pub async fn list_objects(
    client: &dyn CloudClient,
    zone: DisplayZone,
    bucket: &str,
    prefix: Option<String>,
    max_keys: usize,
) -> Output {
    let target = ListTarget::Objects {
        bucket: bucket.to_string(),
        prefix,
    };
    let options = FetchOptions {
        max_items: Some(max_keys.max(1)),
    };
    let result = fetch_resources(client, &target, &FilterCriteria::default(), options)
        .await
        .map(|record| ObjectSummary::from_record(&record, zone));
    tracing::info!("listed {} object(s) in {}", result.items.len(), bucket);
    Output::ObjectList {
        bucket: bucket.to_string(),
        result,
    }
}

pub async fn describe_bucket(aggregator: &Aggregator, bucket: &str) -> Output {
    let result = aggregator.describe_bucket(bucket).await;
    if let Err(err) = &result {
        tracing::warn!("describe of bucket {} failed: {}", bucket, err);
    }
    Output::BucketDefinition(result)
}

pub async fn get_objects<R>(reader: Arc<R>, request: &DownloadRequest) -> Output
where
    R: CloudClient + ObjectReader + 'static,
{
    Output::Download(download(reader, request).await)
}
