//! Configuration Management
//!
//! Handles persistent configuration storage for cloudctl.

use crate::gcp::client::Endpoints;
use crate::timezone::DisplayZone;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Zone used when neither the CLI, the config nor gcloud name one
pub const DEFAULT_ZONE: &str = "us-central1-a";

/// Deadline for one fan-out section when not configured
pub const DEFAULT_SECTION_TIMEOUT_SECS: u64 = 30;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Default project ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// Default compute zone, or `all`
    #[serde(default)]
    pub zone: Option<String>,
    /// Display timezone short identifier (`utc`, `los_angeles`, `tokyo`)
    #[serde(default)]
    pub timezone: Option<String>,
    /// Deadline in seconds for each secondary lookup of a describe
    #[serde(default)]
    pub section_timeout_secs: Option<u64>,
    /// API base URLs, for emulators
    #[serde(default)]
    pub endpoints: Option<Endpoints>,
}

/// Values a command runs with after every source has been consulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project_id: String,
    pub zone: String,
    pub timezone: DisplayZone,
    pub section_timeout: Duration,
    pub endpoints: Endpoints,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project_id: Option<String>,
    pub zone: Option<String>,
    pub timezone: Option<String>,
}

impl Config {
    /// Directory holding the config and log files
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudctl"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from disk; a missing file is an empty config
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().context("Could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Get effective zone (CLI > config > gcloud default > built-in)
    pub fn effective_zone(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.zone.clone())
            .or_else(crate::gcp::auth::get_default_zone)
            .unwrap_or_else(|| DEFAULT_ZONE.to_string())
    }

    /// Get effective display zone (CLI > config > UTC); unknown names fail
    pub fn effective_timezone(&self, cli: Option<&str>) -> Result<DisplayZone> {
        match cli.or(self.timezone.as_deref()) {
            Some(name) => Ok(DisplayZone::resolve(name)?),
            None => Ok(DisplayZone::default()),
        }
    }

    /// Merge every source into the settings a command runs with
    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings> {
        let project_id = self
            .effective_project(overrides.project_id.as_deref())
            .filter(|p| !p.is_empty())
            .context("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag")?;

        let endpoints = self.endpoints.clone().unwrap_or_default();
        endpoints.validate()?;

        Ok(Settings {
            project_id,
            zone: self.effective_zone(overrides.zone.as_deref()),
            timezone: self.effective_timezone(overrides.timezone.as_deref())?,
            section_timeout: Duration::from_secs(
                self.section_timeout_secs
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_SECTION_TIMEOUT_SECS),
            ),
            endpoints,
        })
    }

    /// Update one key by name, validating the value
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "project" | "project_id" => self.project_id = Some(value.to_string()),
            "zone" => self.zone = Some(value.to_string()),
            "timezone" | "tz" => {
                let zone = DisplayZone::resolve(value)?;
                self.timezone = Some(zone.short_identifier().to_string());
            }
            "section_timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("'{}' is not a number of seconds", value))?;
                self.section_timeout_secs = Some(secs);
            }
            other => anyhow::bail!(
                "Unknown config key '{}'. Known keys: project, zone, timezone, section_timeout_secs",
                other
            ),
        }
        Ok(())
    }
}
