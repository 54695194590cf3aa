use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

pub const MIN_TITLE_LENGTH: usize = 3;
pub const MAX_TITLE_LENGTH: usize = 200;

/// Title of a todo: trimmed, 3 to 200 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TodoTitle(String);

impl TodoTitle {
    pub fn new(raw: &str) -> DomainResult<Self> {
        let title = raw.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title", "title is required"));
        }
        let length = title.chars().count();
        if length < MIN_TITLE_LENGTH {
            return Err(DomainError::validation(
                "title",
                format!("title must be at least {} characters", MIN_TITLE_LENGTH),
            ));
        }
        if length > MAX_TITLE_LENGTH {
            return Err(DomainError::validation(
                "title",
                format!("title must be at most {} characters", MAX_TITLE_LENGTH),
            ));
        }
        Ok(Self(title.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TodoTitle {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TodoTitle> for String {
    fn from(title: TodoTitle) -> Self {
        title.0
    }
}
