use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{DomainError, DomainResult};

/// Urgency of a todo, ordered from `Low` (1) to `Critical` (4).
///
/// Accepts either the name (`"high"`) or the numeric level (`3`) on input
/// and always serializes as the lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn parse(raw: &str) -> DomainResult<Self> {
        let value = raw.trim().to_ascii_lowercase();
        match value.as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => match value.parse::<i64>() {
                Ok(level) => Self::from_level(level),
                Err(_) => Err(DomainError::validation(
                    "priority",
                    format!("unknown priority '{}'", raw.trim()),
                )),
            },
        }
    }

    pub fn from_level(level: i64) -> DomainResult<Self> {
        match level {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            4 => Ok(Priority::Critical),
            _ => Err(DomainError::validation(
                "priority",
                format!("priority level must be between 1 and 4, got {}", level),
            )),
        }
    }

    pub fn level(&self) -> i16 {
        *self as i16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Level(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Level(level) => Priority::from_level(level),
            Raw::Name(name) => Priority::parse(&name),
        }
        .map_err(serde::de::Error::custom)
    }
}
