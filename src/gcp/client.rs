//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use crate::resource::ProviderError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Zone value that selects the aggregated (all zones) listing
pub const ALL_ZONES: &str = "all";

/// Hosts that appear in `selfLink` values returned by Compute Engine
const COMPUTE_LINK_PREFIXES: &[&str] = &[
    "https://www.googleapis.com/compute/v1",
    "https://compute.googleapis.com/compute/v1",
];

/// Base URLs of the REST APIs, overridable for emulators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub compute: String,
    pub storage: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            storage: "https://storage.googleapis.com/storage/v1".to_string(),
        }
    }
}

impl Endpoints {
    /// Point both APIs at one server (wiremock, emulators)
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            compute: format!("{}/compute/v1", base),
            storage: format!("{}/storage/v1", base),
        }
    }

    /// Both bases must be absolute http(s) URLs
    pub fn validate(&self) -> Result<()> {
        for (api, base) in [("compute", &self.compute), ("storage", &self.storage)] {
            let parsed = url::Url::parse(base)
                .with_context(|| format!("Invalid {} endpoint '{}'", api, base))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{} endpoint '{}' must use http or https", api, base);
            }
        }
        Ok(())
    }

    /// Media downloads live beside the JSON API: `/download/storage/v1`
    fn storage_download(&self) -> String {
        match self.storage.rfind("/storage/v1") {
            Some(idx) => format!("{}/download{}", &self.storage[..idx], &self.storage[idx..]),
            None => self.storage.clone(),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub zone: String,
    pub endpoints: Endpoints,
}

impl GcpClient {
    /// Create a new GCP client, discovering credentials
    pub async fn new(project_id: &str, zone: &str, endpoints: Endpoints) -> Result<Self> {
        let credentials = GcpCredentials::discover()
            .await
            .context("Failed to initialize GCP credentials")?;
        Self::with_credentials(credentials, project_id, zone, endpoints)
    }

    pub fn with_credentials(
        credentials: GcpCredentials,
        project_id: &str,
        zone: &str,
        endpoints: Endpoints,
    ) -> Result<Self> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            zone: zone.to_string(),
            endpoints,
        })
    }

    async fn token(&self) -> Result<String, ProviderError> {
        self.credentials
            .get_token()
            .await
            .map_err(|e| ProviderError::unauthenticated(format!("{:#}", e)))
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value, ProviderError> {
        let token = self.token().await?;
        self.http.get(url, &token).await
    }

    /// Download raw bytes from a GCP API
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let token = self.token().await?;
        self.http.get_bytes(url, &token).await
    }

    /// Whether listings span every zone
    pub fn is_aggregated(&self) -> bool {
        self.zone == ALL_ZONES
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.compute, self.project_id, path)
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, resource: &str) -> String {
        self.compute_url(&format!("zones/{}/{}", self.zone, resource))
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, resource: &str) -> String {
        self.compute_url(&format!("global/{}", resource))
    }

    /// Build aggregated Compute Engine API URL (all zones)
    pub fn compute_aggregated_url(&self, resource: &str) -> String {
        self.compute_url(&format!("aggregated/{}", resource))
    }

    /// Rewrite a `selfLink` onto the configured compute endpoint
    pub fn rebase_link(&self, link: &str) -> String {
        COMPUTE_LINK_PREFIXES
            .iter()
            .find_map(|prefix| link.strip_prefix(prefix))
            .map(|rest| format!("{}{}", self.endpoints.compute, rest))
            .unwrap_or_else(|| link.to_string())
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.storage, path)
    }

    /// Build Cloud Storage bucket URL
    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage objects URL
    pub fn storage_objects_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}/o", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage object metadata URL
    pub fn storage_object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}",
            self.storage_objects_url(bucket),
            urlencoding::encode(key)
        )
    }

    /// Build Cloud Storage object media URL
    pub fn storage_media_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/b/{}/o/{}?alt=media",
            self.endpoints.storage_download(),
            urlencoding::encode(bucket),
            urlencoding::encode(key)
        )
    }
}

/// Append query parameters, skipping empty values
pub fn add_query_params(url: &str, params: &[(&str, &str)]) -> String {
    let query_parts: Vec<String> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();

    if query_parts.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query_parts.join("&"))
    } else {
        format!("{}?{}", url, query_parts.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GcpClient {
        GcpClient::with_credentials(
            GcpCredentials::from_token("t"),
            "my-project",
            "us-central1-a",
            Endpoints::single("http://localhost:9000"),
        )
        .unwrap()
    }

    #[test]
    fn test_compute_urls() {
        let c = client();
        assert_eq!(
            c.compute_zonal_url("instances"),
            "http://localhost:9000/compute/v1/projects/my-project/zones/us-central1-a/instances"
        );
        assert_eq!(
            c.compute_aggregated_url("instances"),
            "http://localhost:9000/compute/v1/projects/my-project/aggregated/instances"
        );
    }

    #[test]
    fn test_rebase_link() {
        let c = client();
        assert_eq!(
            c.rebase_link("https://www.googleapis.com/compute/v1/projects/p/zones/z/disks/d"),
            "http://localhost:9000/compute/v1/projects/p/zones/z/disks/d"
        );
        assert_eq!(c.rebase_link("other://x"), "other://x");
    }

    #[test]
    fn test_storage_media_url_encodes_key() {
        let c = client();
        assert_eq!(
            c.storage_media_url("bkt", "dir/file.txt"),
            "http://localhost:9000/download/storage/v1/b/bkt/o/dir%2Ffile.txt?alt=media"
        );
    }

    #[test]
    fn test_add_query_params() {
        assert_eq!(
            add_query_params("http://x/a", &[("filter", "name eq vm"), ("pageToken", "")]),
            "http://x/a?filter=name%20eq%20vm"
        );
        assert_eq!(add_query_params("http://x/a?b=1", &[("c", "2")]), "http://x/a?b=1&c=2");
    }
}
