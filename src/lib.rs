//! cloudctl - read-only inspection of cloud resources
//!
//! Lists and filters GCP resources, assembles multi-section composite
//! descriptions of single resources and renders everything as tables.

pub mod commands;
pub mod config;
pub mod download;
pub mod executor;
pub mod gcp;
pub mod resource;
pub mod timezone;
pub mod ui;
pub mod view;

/// Version injected at compile time via CLOUDCTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDCTL_VERSION") {
    Some(v) => v,
    None => "dev",
};
