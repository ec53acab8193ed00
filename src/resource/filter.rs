//! Predicate Builder
//!
//! User criteria are split into server-side clauses (one per field, values
//! OR-ed by the provider, fields AND-ed) and a client-side predicate that is
//! applied to each page after it arrives. The same criteria can also be
//! compiled into one in-process [`Predicate`] covering every field.

use super::record::{short_name, str_field};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fields the provider can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    State,
    Type,
    Zone,
    Vpc,
    Subnet,
}

impl FilterField {
    pub const ALL: [FilterField; 5] = [
        Self::State,
        Self::Type,
        Self::Zone,
        Self::Vpc,
        Self::Subnet,
    ];

    /// Field path in the provider's filter syntax
    pub fn provider_field(&self) -> &'static str {
        match self {
            Self::State => "status",
            Self::Type => "machineType",
            Self::Zone => "zone",
            Self::Vpc => "networkInterfaces.network",
            Self::Subnet => "networkInterfaces.subnetwork",
        }
    }

    /// Values of this field on a record, URL-valued fields reduced to their last segment
    pub fn record_values(&self, record: &Value) -> Vec<String> {
        match self {
            Self::State => str_field(record, "status").map(str::to_string).into_iter().collect(),
            Self::Type => str_field(record, "machineType")
                .map(|v| short_name(v).to_string())
                .into_iter()
                .collect(),
            Self::Zone => str_field(record, "zone")
                .map(|v| short_name(v).to_string())
                .into_iter()
                .collect(),
            Self::Vpc => interface_values(record, "network"),
            Self::Subnet => interface_values(record, "subnetwork"),
        }
    }

    /// States are compared case-insensitively, everything else exactly
    pub fn value_matches(&self, actual: &str, wanted: &str) -> bool {
        match self {
            Self::State => actual.eq_ignore_ascii_case(wanted),
            _ => actual == wanted,
        }
    }
}

fn interface_values(record: &Value, key: &str) -> Vec<String> {
    record
        .get("networkInterfaces")
        .and_then(|v| v.as_array())
        .map(|nics| {
            nics.iter()
                .filter_map(|nic| str_field(nic, key))
                .map(|v| short_name(v).to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// One server-side clause: the record's field must equal any of `values`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: FilterField,
    pub values: Vec<String>,
}

impl FilterClause {
    pub fn matches(&self, record: &Value) -> bool {
        self.field.record_values(record).iter().any(|actual| {
            self.values
                .iter()
                .any(|wanted| self.field.value_matches(actual, wanted))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("--from ({from}) must not be later than --to ({to})")]
    InvertedRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Inclusive range of instants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, FilterError> {
        if from > to {
            return Err(FilterError::InvertedRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }
}

/// Which record fields the client-side criteria read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: &'static str,
    /// First present field wins
    pub timestamps: &'static [&'static str],
}

impl RecordLayout {
    pub const INSTANCE: Self = Self {
        name: "name",
        timestamps: &["lastStartTimestamp", "creationTimestamp"],
    };
    pub const BUCKET: Self = Self {
        name: "name",
        timestamps: &["timeCreated"],
    };
    pub const OBJECT: Self = Self {
        name: "name",
        timestamps: &["updated"],
    };

    pub fn timestamp<'a>(&self, record: &'a Value) -> Option<&'a str> {
        self.timestamps.iter().find_map(|key| str_field(record, key))
    }
}

/// User-supplied filter criteria, immutable once built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    fields: BTreeMap<FilterField, Vec<String>>,
    require_public_ip: bool,
    name: Option<String>,
    date_pattern: Option<String>,
    range: Option<TimeRange>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept any of `values` for `field`; blank values are ignored
    pub fn with_values<I, S>(mut self, field: FilterField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if !values.is_empty() {
            self.fields.entry(field).or_default().extend(values);
        }
        self
    }

    pub fn with_public_ip(mut self, required: bool) -> Self {
        self.require_public_ip = required;
        self
    }

    pub fn with_name_containing(mut self, needle: Option<String>) -> Self {
        self.name = needle.filter(|n| !n.is_empty());
        self
    }

    pub fn with_date_pattern(mut self, pattern: Option<String>) -> Self {
        self.date_pattern = pattern.filter(|p| !p.is_empty());
        self
    }

    pub fn with_time_range(
        mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Self, FilterError> {
        self.range = Some(TimeRange::new(from, to)?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Clauses the provider evaluates, one per field
    pub fn server_clauses(&self) -> Vec<FilterClause> {
        self.fields
            .iter()
            .map(|(field, values)| FilterClause {
                field: *field,
                values: values.clone(),
            })
            .collect()
    }

    /// Criteria the provider cannot evaluate, applied after each page
    pub fn client_predicate(&self, layout: RecordLayout) -> Predicate {
        Predicate {
            clauses: Vec::new(),
            require_public_ip: self.require_public_ip,
            name: self.name.clone(),
            date_pattern: self.date_pattern.clone(),
            range: self.range,
            layout,
        }
    }

    /// Every criterion evaluated in-process
    pub fn predicate(&self, layout: RecordLayout) -> Predicate {
        Predicate {
            clauses: self.server_clauses(),
            ..self.client_predicate(layout)
        }
    }
}

/// Boolean function over a raw record
#[derive(Debug, Clone)]
pub struct Predicate {
    clauses: Vec<FilterClause>,
    require_public_ip: bool,
    name: Option<String>,
    date_pattern: Option<String>,
    range: Option<TimeRange>,
    layout: RecordLayout,
}

impl Predicate {
    /// Matches every record
    pub fn identity(layout: RecordLayout) -> Self {
        FilterCriteria::default().predicate(layout)
    }

    pub fn is_identity(&self) -> bool {
        self.clauses.is_empty()
            && !self.require_public_ip
            && self.name.is_none()
            && self.date_pattern.is_none()
            && self.range.is_none()
    }

    pub fn matches(&self, record: &Value) -> bool {
        if !self.clauses.iter().all(|clause| clause.matches(record)) {
            return false;
        }

        if self.require_public_ip && !has_public_ip(record) {
            return false;
        }

        if let Some(needle) = &self.name {
            let name = str_field(record, self.layout.name).unwrap_or_default();
            if !name.contains(needle.as_str()) {
                return false;
            }
        }

        if self.date_pattern.is_some() || self.range.is_some() {
            let Some(raw) = self.layout.timestamp(record) else {
                return false;
            };
            if let Some(pattern) = &self.date_pattern {
                if !matches_date_pattern(pattern, &canonical_timestamp(raw)) {
                    return false;
                }
            }
            if let Some(range) = &self.range {
                match parse_utc(raw) {
                    Some(instant) if range.contains(instant) => {}
                    _ => return false,
                }
            }
        }

        true
    }
}

/// Any interface carries an external NAT address
pub fn has_public_ip(record: &Value) -> bool {
    record
        .get("networkInterfaces")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|nic| nic.get("accessConfigs").and_then(|v| v.as_array()))
        .flatten()
        .any(|ac| str_field(ac, "natIP").is_some_and(|ip| !ip.is_empty()))
}

/// `2021-09-29T*` is a prefix match; a pattern without a trailing `*` is a substring match
pub fn matches_date_pattern(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => candidate.starts_with(prefix),
        None => candidate.contains(pattern),
    }
}

/// ISO-8601 UTC with milliseconds, e.g. `2021-09-29T11:04:43.305Z`
pub fn canonical_timestamp(raw: &str) -> String {
    parse_utc(raw)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| raw.to_string())
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(status: &str, machine_type: &str) -> Value {
        json!({
            "name": "vm",
            "status": status,
            "machineType": format!("https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/machineTypes/{}", machine_type),
        })
    }

    #[test]
    fn test_fields_and_values_compose() {
        let predicate = FilterCriteria::new()
            .with_values(FilterField::Type, ["t2.micro", "t3.micro"])
            .with_values(FilterField::State, ["running"])
            .predicate(RecordLayout::INSTANCE);

        assert!(predicate.matches(&instance("RUNNING", "t2.micro")));
        assert!(predicate.matches(&instance("RUNNING", "t3.micro")));
        assert!(!predicate.matches(&instance("STOPPED", "t2.micro")));
        assert!(!predicate.matches(&instance("RUNNING", "e2-small")));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let criteria = FilterCriteria::new().with_values(FilterField::Zone, ["", "  "]);
        assert!(criteria.is_empty());
        assert!(criteria.server_clauses().is_empty());
    }

    #[test]
    fn test_client_predicate_excludes_server_fields() {
        let criteria = FilterCriteria::new()
            .with_values(FilterField::State, ["running"])
            .with_name_containing(Some("web".to_string()));
        let client = criteria.client_predicate(RecordLayout::INSTANCE);

        let record = json!({"name": "web-1", "status": "TERMINATED"});
        assert!(client.matches(&record));
        assert!(!criteria.predicate(RecordLayout::INSTANCE).matches(&record));
    }

    #[test]
    fn test_vpc_matches_any_interface() {
        let record = json!({
            "networkInterfaces": [
                {"network": "projects/p/global/networks/default"},
                {"network": "projects/p/global/networks/prod"}
            ]
        });
        let clause = FilterClause {
            field: FilterField::Vpc,
            values: vec!["prod".to_string()],
        };
        assert!(clause.matches(&record));
    }

    #[test]
    fn test_public_ip() {
        let public = json!({"networkInterfaces": [{"accessConfigs": [{"natIP": "34.1.2.3"}]}]});
        let private = json!({"networkInterfaces": [{"accessConfigs": [{"name": "External NAT"}]}]});
        let predicate = FilterCriteria::new()
            .with_public_ip(true)
            .predicate(RecordLayout::INSTANCE);

        assert!(predicate.matches(&public));
        assert!(!predicate.matches(&private));
        assert!(!predicate.matches(&json!({})));
    }

    #[test]
    fn test_date_wildcard() {
        assert!(matches_date_pattern("2021-09-29T*", "2021-09-29T11:04:43.305Z"));
        assert!(!matches_date_pattern("2021-09-29T*", "2021-09-30T00:00:00.000Z"));
        assert!(matches_date_pattern("09-29", "2021-09-29T11:04:43.305Z"));
    }

    #[test]
    fn test_date_pattern_uses_canonical_form() {
        // 04:04 in -07:00 is 11:04 UTC
        let record = json!({"timeCreated": "2021-09-29T04:04:43.305-07:00"});
        let predicate = FilterCriteria::new()
            .with_date_pattern(Some("2021-09-29T11*".to_string()))
            .predicate(RecordLayout::BUCKET);
        assert!(predicate.matches(&record));
        assert_eq!(
            canonical_timestamp("2021-09-29T04:04:43.305-07:00"),
            "2021-09-29T11:04:43.305Z"
        );
    }

    #[test]
    fn test_instance_falls_back_to_creation_time() {
        let record = json!({"creationTimestamp": "2021-09-29T11:04:43.305Z"});
        let predicate = FilterCriteria::new()
            .with_date_pattern(Some("2021-09-29*".to_string()))
            .predicate(RecordLayout::INSTANCE);
        assert!(predicate.matches(&record));
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let from = parse_utc("2021-09-01T00:00:00Z").unwrap();
        let to = parse_utc("2021-09-30T00:00:00Z").unwrap();
        let predicate = FilterCriteria::new()
            .with_time_range(from, to)
            .unwrap()
            .predicate(RecordLayout::BUCKET);

        assert!(predicate.matches(&json!({"timeCreated": "2021-09-30T00:00:00Z"})));
        assert!(!predicate.matches(&json!({"timeCreated": "2021-10-01T00:00:00Z"})));
        assert!(!predicate.matches(&json!({"timeCreated": "garbage"})));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let from = parse_utc("2021-10-01T00:00:00Z").unwrap();
        let to = parse_utc("2021-09-01T00:00:00Z").unwrap();
        assert!(FilterCriteria::new().with_time_range(from, to).is_err());
    }
}
