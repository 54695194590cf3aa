use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Free-form todo description: trimmed, at most 1000 characters, may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TodoDescription(String);

impl TodoDescription {
    pub fn new(raw: &str) -> DomainResult<Self> {
        let description = raw.trim();
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(DomainError::validation(
                "description",
                format!(
                    "description must be at most {} characters",
                    MAX_DESCRIPTION_LENGTH
                ),
            ));
        }
        Ok(Self(description.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TodoDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TodoDescription {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TodoDescription> for String {
    fn from(description: TodoDescription) -> Self {
        description.0
    }
}
