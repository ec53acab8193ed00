//! Display Timezones
//!
//! Provider timestamps are UTC instants. They are converted to one of a small
//! set of supported display zones for presentation only; filtering always
//! works on the provider's own values.

use chrono::{DateTime, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Format accepted for user-supplied wall-clock times (`--from`, `--to`)
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneError {
    #[error("unsupported timezone '{identifier}', supported: {supported}")]
    NotFound {
        identifier: String,
        supported: String,
    },
    #[error("invalid time '{input}', expected YYYY-MM-DD HH:MM:SS")]
    InvalidTime { input: String },
    #[error("time '{input}' does not exist or is ambiguous in {zone}")]
    NonexistentLocalTime { input: String, zone: &'static str },
}

/// Supported display zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayZone {
    #[default]
    Utc,
    LosAngeles,
    Tokyo,
}

impl DisplayZone {
    pub const ALL: [DisplayZone; 3] = [Self::Utc, Self::LosAngeles, Self::Tokyo];

    /// Identifier used on the command line and in the config file
    pub fn short_identifier(&self) -> &'static str {
        match self {
            Self::Utc => "utc",
            Self::LosAngeles => "los_angeles",
            Self::Tokyo => "tokyo",
        }
    }

    /// IANA database name
    pub fn iana_name(&self) -> &'static str {
        match self {
            Self::Utc => "UTC",
            Self::LosAngeles => "America/Los_Angeles",
            Self::Tokyo => "Asia/Tokyo",
        }
    }

    fn tz(&self) -> Tz {
        match self {
            Self::Utc => chrono_tz::UTC,
            Self::LosAngeles => chrono_tz::America::Los_Angeles,
            Self::Tokyo => chrono_tz::Asia::Tokyo,
        }
    }

    /// Resolve a short identifier (or IANA name) to a supported zone.
    ///
    /// Unknown identifiers are an error; there is no fallback zone.
    pub fn resolve(identifier: &str) -> Result<Self, ZoneError> {
        let wanted = identifier.trim();
        Self::ALL
            .into_iter()
            .find(|zone| {
                zone.short_identifier().eq_ignore_ascii_case(wanted)
                    || zone.iana_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ZoneError::NotFound {
                identifier: identifier.to_string(),
                supported: Self::ALL
                    .iter()
                    .map(|z| z.short_identifier())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Convert a UTC instant to this zone, applying the offset in effect at that instant
    pub fn normalize(&self, instant: DateTime<Utc>) -> DisplayInstant {
        DisplayInstant {
            zone: *self,
            local: instant.with_timezone(&self.tz()),
        }
    }

    /// Parse a provider RFC 3339 timestamp and normalize it
    pub fn parse_instant(&self, raw: &str) -> Option<DisplayInstant> {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| self.normalize(dt.with_timezone(&Utc)))
    }

    /// Interpret a wall-clock time in this zone and return the UTC instant
    pub fn parse_local(&self, raw: &str) -> Result<DateTime<Utc>, ZoneError> {
        let naive = NaiveDateTime::parse_from_str(raw.trim(), LOCAL_TIME_FORMAT).map_err(|_| {
            ZoneError::InvalidTime {
                input: raw.to_string(),
            }
        })?;
        self.tz()
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or(ZoneError::NonexistentLocalTime {
                input: raw.to_string(),
                zone: self.iana_name(),
            })
    }
}

impl FromStr for DisplayZone {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_identifier())
    }
}

/// An instant bound to a display zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInstant {
    zone: DisplayZone,
    local: DateTime<Tz>,
}

impl DisplayInstant {
    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    pub fn local(&self) -> &DateTime<Tz> {
        &self.local
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.local.with_timezone(&Utc)
    }

    /// Offset from UTC in seconds at this instant
    pub fn offset_seconds(&self) -> i32 {
        self.local.offset().fix().local_minus_utc()
    }

    /// Zone abbreviation at this instant (e.g. PDT, JST)
    pub fn abbreviation(&self) -> String {
        self.local.format("%Z").to_string()
    }
}

impl fmt::Display for DisplayInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local.format("%Y-%m-%dT%H:%M:%S%:z"))
    }
}

impl Serialize for DisplayInstant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
