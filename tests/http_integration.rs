//! Integration tests for the GCP client using wiremock
//!
//! The real [`GcpClient`] runs against a mock server with a static token, so
//! URL construction, pagination, error body parsing and the fan-out all go
//! through the same code paths as against the live APIs.

use cloudctl::commands::storage;
use cloudctl::download::{download, DownloadRequest};
use cloudctl::gcp::auth::GcpCredentials;
use cloudctl::gcp::client::{Endpoints, GcpClient};
use cloudctl::resource::{
    fetch_resources, Aggregator, CloudClient, FetchOptions, FilterCriteria, FilterField,
    ListTarget, Section, Severity,
};
use cloudctl::timezone::DisplayZone;
use cloudctl::view::Output;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";
const PROJECT: &str = "test-project";

fn client(server: &MockServer, zone: &str) -> GcpClient {
    GcpClient::with_credentials(
        GcpCredentials::from_token(TOKEN),
        PROJECT,
        zone,
        Endpoints::single(&server.uri()),
    )
    .unwrap()
}

fn error_body(code: u16, status: &str, message: &str) -> serde_json::Value {
    json!({"error": {"code": code, "status": status, "message": message}})
}

/// Listing and pagination
mod listing {
    use super::*;

    /// Test that a nextPageToken is followed until the last page
    #[tokio::test]
    async fn test_bucket_pagination_follows_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("pageToken", "page-2"))
            .and(bearer_token(TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "bucket-c", "timeCreated": "2021-03-01T00:00:00.000Z"}]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", PROJECT))
            .and(bearer_token(TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "bucket-a", "timeCreated": "2021-01-01T00:00:00.000Z"},
                    {"name": "bucket-b", "timeCreated": "2021-02-01T00:00:00.000Z"}
                ],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, "us-central1-a");
        let result = fetch_resources(
            &client,
            &ListTarget::Buckets,
            &FilterCriteria::new(),
            FetchOptions::default(),
        )
        .await;

        assert!(result.status.is_none());
        let names: Vec<_> = result.items.iter().map(|b| b["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["bucket-a", "bucket-b", "bucket-c"]);
    }

    /// Test that server-side clauses reach the Compute API as a filter expression
    #[tokio::test]
    async fn test_instance_filter_is_sent_to_server() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!(
                "/compute/v1/projects/{}/zones/us-central1-a/instances",
                PROJECT
            )))
            .and(query_param("filter", r#"(status eq "(?i)(running)")"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "web-1", "status": "RUNNING"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, "us-central1-a");
        let criteria = FilterCriteria::new().with_values(FilterField::State, ["running"]);
        let result =
            fetch_resources(&client, &ListTarget::Instances, &criteria, FetchOptions::default())
                .await;

        assert_eq!(result.items.len(), 1);
    }

    /// Test that aggregated listings flatten every zone scope
    #[tokio::test]
    async fn test_aggregated_listing_flattens_scopes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/compute/v1/projects/{}/aggregated/instances", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {
                    "zones/us-central1-a": {"instances": [{"name": "a", "status": "RUNNING"}]},
                    "zones/us-east1-b": {"warning": {"code": "NO_RESULTS_ON_PAGE"}},
                    "zones/europe-west1-b": {"instances": [{"name": "b", "status": "STOPPED"}]}
                }
            })))
            .mount(&server)
            .await;

        let client = client(&server, "all");
        let result = fetch_resources(
            &client,
            &ListTarget::Instances,
            &FilterCriteria::new(),
            FetchOptions::default(),
        )
        .await;

        assert_eq!(result.items.len(), 2);
    }

    /// Test that max-keys caps an object listing
    #[tokio::test]
    async fn test_object_listing_respects_max_keys() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/logs/o"))
            .and(query_param("prefix", "2021/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "2021/a", "size": "1", "updated": "2021-01-01T00:00:00.000Z"},
                    {"name": "2021/b", "size": "2", "updated": "2021-01-02T00:00:00.000Z"},
                    {"name": "2021/c", "size": "3", "updated": "2021-01-03T00:00:00.000Z"}
                ],
                "nextPageToken": "more"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, "us-central1-a");
        let output = storage::list_objects(
            &client,
            DisplayZone::Utc,
            "logs",
            Some("2021/".to_string()),
            2,
        )
        .await;

        let Output::ObjectList { result, .. } = output else {
            panic!("expected an object list");
        };
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.status.unwrap().severity, Severity::Info);
    }
}

/// Error body parsing
mod errors {
    use super::*;

    /// Test that a 403 is classified with the API status code
    #[tokio::test]
    async fn test_403_is_classified_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(403).set_body_json(error_body(
                403,
                "PERMISSION_DENIED",
                "caller does not have storage.buckets.list access",
            )))
            .mount(&server)
            .await;

        let client = client(&server, "us-central1-a");
        let result = fetch_resources(
            &client,
            &ListTarget::Buckets,
            &FilterCriteria::new(),
            FetchOptions::default(),
        )
        .await;

        assert!(result.items.is_empty());
        let status = result.status.unwrap();
        assert_eq!(status.severity, Severity::Error);
        assert_eq!(status.metadata["code"], "PERMISSION_DENIED");
        assert_eq!(status.metadata["status"], "403");
        assert!(status.message.contains("storage.buckets.list"));
    }

    /// Test that a body without JSON falls back to the HTTP status
    #[tokio::test]
    async fn test_plain_500_falls_back_to_status_code() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = client(&server, "us-central1-a");
        let err = client
            .list_resources(&ListTarget::Buckets, &[], None)
            .await
            .unwrap_err();

        assert_eq!(err.status, Some(500));
        assert_eq!(err.code, "HTTP_500");
    }

    /// Test that a missing bucket is "no match" rather than a request failure
    #[tokio::test]
    async fn test_missing_bucket_is_invariant_violation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "The specified bucket does not exist.",
                          "errors": [{"reason": "notFound"}]}
            })))
            .mount(&server)
            .await;

        let client = Arc::new(client(&server, "us-central1-a"));
        let err = Aggregator::new(client, DisplayZone::Utc)
            .describe_bucket("ghost")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("matched 0 group(s)"));
    }
}

/// Detail fan-out
mod describe {
    use super::*;

    /// Test that one denied section degrades the bucket to a partial result
    #[tokio::test]
    async fn test_bucket_with_denied_policy_is_partial() {
        let server = MockServer::start().await;
        let bucket_path = "/storage/v1/b/logs";

        Mock::given(method("GET"))
            .and(path(format!("{}/iam", bucket_path)))
            .respond_with(ResponseTemplate::new(403).set_body_json(error_body(
                403,
                "PERMISSION_DENIED",
                "storage.buckets.getIamPolicy denied",
            )))
            .mount(&server)
            .await;

        for (field, body) in [
            ("versioning", json!({"versioning": {"enabled": true}})),
            ("labels", json!({"labels": {"env": "prod"}})),
            ("encryption", json!({})),
            ("lifecycle", json!({"lifecycle": {"rule": [
                {"action": {"type": "SetStorageClass", "storageClass": "NEARLINE"},
                 "condition": {"age": 30}}
            ]}})),
        ] {
            Mock::given(method("GET"))
                .and(path(bucket_path))
                .and(query_param("fields", field))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .with_priority(1)
                .mount(&server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path(bucket_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "logs",
                "location": "US",
                "storageClass": "STANDARD",
                "timeCreated": "2021-09-29T10:00:00.000Z"
            })))
            .mount(&server)
            .await;

        let client = Arc::new(client(&server, "us-central1-a"));
        let definition = Aggregator::new(client, DisplayZone::Tokyo)
            .describe_bucket("logs")
            .await
            .unwrap();

        assert_eq!(definition.summary.name, "logs");
        assert_eq!(
            definition.summary.created.as_ref().unwrap().to_string(),
            "2021-09-29T19:00:00+09:00"
        );
        let Section::Unavailable(policy) = &definition.policy else {
            panic!("policy should be unavailable");
        };
        assert_eq!(policy.metadata["code"], "PERMISSION_DENIED");
        assert!(definition.versioning.ready().unwrap().enabled);
        assert_eq!(definition.lifecycle.ready().unwrap()[0].storage_class, "NEARLINE");
        assert!(matches!(definition.encryption, Section::Unavailable(ref e) if !e.is_error()));
        assert_eq!(definition.status.unwrap().severity, Severity::Warn);
    }

    /// Test that an instance is found through the aggregated list and its disks are fetched
    #[tokio::test]
    async fn test_instance_lookup_through_aggregated_list() {
        let server = MockServer::start().await;
        let compute = format!("/compute/v1/projects/{}", PROJECT);

        Mock::given(method("GET"))
            .and(path(format!("{}/aggregated/instances", compute)))
            .and(query_param("filter", r#"(name eq "web1")"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {"zones/us-central1-a": {"instances": [{
                    "name": "web1",
                    "id": "4242",
                    "status": "RUNNING",
                    "zone": "https://www.googleapis.com/compute/v1/projects/test-project/zones/us-central1-a",
                    "networkInterfaces": [{
                        "network": "https://www.googleapis.com/compute/v1/projects/test-project/global/networks/default",
                        "networkIP": "10.0.0.5",
                        "accessConfigs": [{"natIP": "34.1.2.3"}]
                    }],
                    "attachedDisks": [{
                        "source": "https://www.googleapis.com/compute/v1/projects/test-project/zones/us-central1-a/disks/web-1",
                        "deviceName": "boot",
                        "boot": true
                    }]
                }]}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/zones/us-central1-a/disks/web-1", compute)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "web-1",
                "selfLink": "https://www.googleapis.com/compute/v1/projects/test-project/zones/us-central1-a/disks/web-1",
                "sizeGb": "20",
                "status": "READY"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/global/firewalls", compute)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "allow-web", "network": "https://www.googleapis.com/compute/v1/projects/test-project/global/networks/default",
                     "direction": "INGRESS", "priority": 1000, "sourceRanges": ["0.0.0.0/0"],
                     "allowed": [{"IPProtocol": "tcp", "ports": ["80", "443"]}]},
                    {"name": "other-net", "network": "https://www.googleapis.com/compute/v1/projects/test-project/global/networks/private",
                     "direction": "INGRESS", "allowed": [{"IPProtocol": "all"}]}
                ]
            })))
            .mount(&server)
            .await;

        let client = Arc::new(client(&server, "us-central1-a"));
        let definition = Aggregator::new(client, DisplayZone::Utc)
            .describe_instance("web1")
            .await
            .unwrap();

        assert_eq!(definition.summary.external_ip, "34.1.2.3");
        assert_eq!(definition.volumes.ready().unwrap()[0].size_gb, "20");
        let rules = definition.rules.ready().unwrap();
        assert_eq!(rules.ingress.len(), 1);
        assert_eq!(rules.ingress[0].port_range, "80,443");
        assert!(definition.status.is_none());
    }

    /// Test that only firewall rules targeting the instance's tags or service account are shown
    #[tokio::test]
    async fn test_instance_firewall_rules_follow_targets() {
        let server = MockServer::start().await;
        let compute = format!("/compute/v1/projects/{}", PROJECT);
        let network = "https://www.googleapis.com/compute/v1/projects/test-project/global/networks/default";

        Mock::given(method("GET"))
            .and(path(format!("{}/aggregated/instances", compute)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {"zones/us-central1-a": {"instances": [{
                    "name": "web1",
                    "status": "RUNNING",
                    "zone": "https://www.googleapis.com/compute/v1/projects/test-project/zones/us-central1-a",
                    "tags": {"items": ["web"]},
                    "serviceAccounts": [{"email": "web@test-project.iam.gserviceaccount.com"}],
                    "networkInterfaces": [{"network": network, "networkIP": "10.0.0.5"}]
                }]}}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/global/firewalls", compute)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "allow-db-only", "network": network, "direction": "INGRESS",
                     "targetTags": ["db"], "sourceRanges": ["10.0.0.0/8"],
                     "allowed": [{"IPProtocol": "tcp", "ports": ["5432"]}]},
                    {"name": "allow-internal", "network": network, "direction": "INGRESS",
                     "sourceRanges": ["10.0.0.0/8"], "allowed": [{"IPProtocol": "all"}]},
                    {"name": "allow-https", "network": network, "direction": "INGRESS",
                     "targetTags": ["web"], "sourceRanges": ["0.0.0.0/0"],
                     "allowed": [{"IPProtocol": "tcp", "ports": ["443"]}]},
                    {"name": "deny-egress-sa", "network": network, "direction": "EGRESS",
                     "targetServiceAccounts": ["web@test-project.iam.gserviceaccount.com"],
                     "destinationRanges": ["0.0.0.0/0"], "denied": [{"IPProtocol": "udp"}]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(client(&server, "us-central1-a"));
        let definition = Aggregator::new(client, DisplayZone::Utc)
            .describe_instance("web1")
            .await
            .unwrap();

        let rules = definition.rules.ready().unwrap();
        let ingress: Vec<_> = rules.ingress.iter().map(|r| r.rule.as_str()).collect();
        assert_eq!(ingress, vec!["allow-internal", "allow-https"]);
        assert!(rules.ingress.iter().all(|r| r.port_range != "5432"));
        assert_eq!(rules.egress.len(), 1);
        assert_eq!(rules.egress[0].rule, "deny-egress-sa");
    }
}

/// Object media downloads
mod media {
    use super::*;

    /// Test that object bytes come from the download endpoint
    #[tokio::test]
    async fn test_object_download_writes_file() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/download/storage/v1/b/logs/o/app.log"))
            .and(query_param("alt", "media"))
            .and(bearer_token(TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"line 1\nline 2\n".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest {
            bucket: "logs".to_string(),
            key: "app.log".to_string(),
            destination: dir.path().to_path_buf(),
            recursive: false,
        };
        let report = download(Arc::new(client(&server, "us-central1-a")), &request).await;

        assert!(report.status.is_none());
        assert_eq!(report.total_bytes(), 14);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.log")).unwrap(),
            "line 1\nline 2\n"
        );
    }
}
