//! GCP API interaction module
//!
//! This module provides the core functionality for interacting with Google Cloud Platform
//! APIs: authentication, the HTTP client, and the binding of the read-only
//! [`CloudClient`](crate::resource::CloudClient) capability onto Compute Engine
//! and Cloud Storage.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities and error body parsing
//! - [`provider`] - `CloudClient` implementation and filter rendering
//!
//! # Example
//!
//! ```ignore
//! use cloudctl::gcp::client::{Endpoints, GcpClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new("my-project", "us-central1-a", Endpoints::default()).await?;
//!     let instances = client.get(&client.compute_zonal_url("instances")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod provider;
