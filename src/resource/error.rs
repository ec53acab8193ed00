//! Error Classification
//!
//! Failures and notable conditions are tagged with a [`Severity`] and carried
//! alongside the result they belong to. Once classified, an error is data for
//! the renderer and is never raised further up as a raw fault.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How loudly a classified condition should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "INFO!",
            Self::Warn => "WARNING!",
            Self::Error => "ERROR!",
        }
    }
}

/// What kind of condition was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A valid query that matched nothing
    Empty,
    /// Some independent sections failed while others succeeded
    PartialFailure,
    /// The provider rejected or failed a request
    RequestFailure,
    /// An identity lookup returned other than exactly one record
    InvariantViolation,
}

/// A failure or notable condition tagged with a severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ClassifiedError {
    /// Classify a raw failure with the desired severity.
    ///
    /// The severity is a decision of the caller, not a property of the fault.
    /// The kind defaults from it and can be overridden with [`Self::with_kind`].
    pub fn new(err: impl fmt::Display, severity: Severity) -> Self {
        let kind = match severity {
            Severity::Info => ErrorKind::Empty,
            Severity::Warn => ErrorKind::PartialFailure,
            Severity::Error => ErrorKind::RequestFailure,
        };
        Self {
            severity,
            kind,
            message: err.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Valid query with nothing to show
    pub fn empty(message: impl fmt::Display) -> Self {
        Self::new(message, Severity::Info)
    }

    /// Composite record where `failed` of `total` dependent sections are missing
    pub fn partial_failure(failed: usize, total: usize) -> Self {
        Self::new(
            format!("{} of {} sections could not be fetched", failed, total),
            Severity::Warn,
        )
        .with_metadata("failed_sections", failed.to_string())
    }

    /// A section whose task did not finish within its deadline
    pub fn timed_out(section: &str, after: Duration) -> Self {
        Self::new(
            format!("{} lookup timed out after {}s", section, after.as_secs_f32()),
            Severity::Error,
        )
        .with_metadata("code", "TIMEOUT")
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<&ProviderError> for ClassifiedError {
    fn from(err: &ProviderError) -> Self {
        let mut classified = Self::new(err, Severity::Error).with_metadata("code", err.code.clone());
        if let Some(status) = err.status {
            classified = classified.with_metadata("status", status.to_string());
        }
        match err.hint() {
            Some(hint) => classified.with_metadata("hint", hint),
            None => classified,
        }
    }
}

impl From<ProviderError> for ClassifiedError {
    fn from(err: ProviderError) -> Self {
        Self::from(&err)
    }
}

impl From<&DescribeError> for ClassifiedError {
    fn from(err: &DescribeError) -> Self {
        match err {
            DescribeError::InvariantViolation { .. } => Self::new(err, Severity::Error)
                .with_kind(ErrorKind::InvariantViolation),
            DescribeError::RequestFailure { source, .. } => {
                let mut classified = Self::from(source);
                classified.message = err.to_string();
                classified
            }
        }
    }
}

/// Raw failure reported by the cloud provider or the transport to it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[code:{code}, message:{message}]")]
pub struct ProviderError {
    /// HTTP status, when the failure came back from the API
    pub status: Option<u16>,
    /// Machine-readable code (e.g. `PERMISSION_DENIED`, `notFound`)
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: "TRANSPORT".to_string(),
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: "UNAUTHENTICATED".to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: "MALFORMED_RESPONSE".to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: "INVALID_ARGUMENT".to_string(),
            message: message.into(),
        }
    }

    /// User-facing advice for common statuses
    pub fn hint(&self) -> Option<&'static str> {
        match self.status? {
            400 => Some("Invalid request. Check your parameters."),
            401 => Some("Authentication failed. Run 'gcloud auth application-default login'."),
            403 => Some("Permission denied. Check your GCP IAM permissions."),
            404 => Some("Resource not found."),
            409 => Some("Resource conflict. The resource may already exist or be in use."),
            429 => Some("Rate limit exceeded. Please try again later."),
            500 | 503 => Some("GCP service temporarily unavailable. Please try again."),
            _ => None,
        }
    }
}

/// Fatal failure of a detail lookup; no composite record is produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescribeError {
    #[error("lookup of '{id}' matched {groups} group(s) and {records} record(s), expected exactly one")]
    InvariantViolation {
        id: String,
        groups: usize,
        records: usize,
    },
    #[error("failed to fetch '{id}': {source}")]
    RequestFailure {
        id: String,
        #[source]
        source: ProviderError,
    },
}
