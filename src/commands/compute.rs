//! Compute Engine commands

use crate::resource::model::InstanceSummary;
use crate::resource::{
    fetch_resources, Aggregator, CloudClient, FetchOptions, FilterCriteria, FilterField,
    ListTarget,
};
use crate::timezone::DisplayZone;
use crate::view::Output;
use clap::Args;

/// Filters accepted by `compute ls`
#[derive(Debug, Clone, Default, Args)]
pub struct InstanceFilters {
    /// Instance state (repeatable, e.g. running, stopped, terminated)
    #[arg(long = "state")]
    pub states: Vec<String>,

    /// Machine type (repeatable, e.g. e2-small)
    #[arg(long = "type")]
    pub types: Vec<String>,

    /// Zone the instance lives in (repeatable)
    #[arg(long = "zone-filter")]
    pub zones: Vec<String>,

    /// VPC network name (repeatable)
    #[arg(long = "vpc")]
    pub vpcs: Vec<String>,

    /// Subnetwork name (repeatable)
    #[arg(long = "subnet")]
    pub subnets: Vec<String>,

    /// Only instances with an external IP
    #[arg(long)]
    pub has_public_ip: bool,

    /// Launch time pattern, e.g. "2021-09-29T*" (UTC)
    #[arg(long)]
    pub launched_at: Option<String>,

    /// Name substring (case-sensitive)
    #[arg(long)]
    pub name: Option<String>,
}

impl InstanceFilters {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::new()
            .with_values(FilterField::State, self.states.iter().cloned())
            .with_values(FilterField::Type, self.types.iter().cloned())
            .with_values(FilterField::Zone, self.zones.iter().cloned())
            .with_values(FilterField::Vpc, self.vpcs.iter().cloned())
            .with_values(FilterField::Subnet, self.subnets.iter().cloned())
            .with_public_ip(self.has_public_ip)
            .with_date_pattern(self.launched_at.clone())
            .with_name_containing(self.name.clone())
    }
}

/// List instances grouped by state
pub async fn list_instances(
    client: &dyn CloudClient,
    zone: DisplayZone,
    criteria: &FilterCriteria,
) -> Output {
    let result = fetch_resources(client, &ListTarget::Instances, criteria, FetchOptions::default())
        .await
        .map(|record| InstanceSummary::from_record(&record, zone))
        .group_by(|instance| instance.state.to_lowercase());
    tracing::info!(
        "listed instances in {} state group(s)",
        result.groups.len()
    );
    Output::InstanceList(result)
}

/// Composite detail of one instance
pub async fn describe_instance(aggregator: &Aggregator, name: &str) -> Output {
    let result = aggregator.describe_instance(name).await;
    if let Err(err) = &result {
        tracing::warn!("describe of instance {} failed: {}", name, err);
    }
    Output::InstanceDefinition(result)
}
