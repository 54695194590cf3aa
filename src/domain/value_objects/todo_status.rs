use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{DomainError, DomainResult};

/// Lifecycle status of a todo.
///
/// Allowed transitions:
/// - `Pending` -> `InProgress`, `Completed`, `Cancelled`
/// - `InProgress` -> `Completed`, `Cancelled`, `Pending`
/// - `Completed` -> `Pending` (reopen)
/// - `Cancelled` -> `Pending` (reactivate)
///
/// Self-transitions are rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "todo_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub const ALL: [TodoStatus; 4] = [
        TodoStatus::Pending,
        TodoStatus::InProgress,
        TodoStatus::Completed,
        TodoStatus::Cancelled,
    ];

    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TodoStatus::Pending),
            "in_progress" => Ok(TodoStatus::InProgress),
            "completed" => Ok(TodoStatus::Completed),
            "cancelled" => Ok(TodoStatus::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
            TodoStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal for reporting purposes; both can still be reopened.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TodoStatus::Completed | TodoStatus::Cancelled)
    }

    /// Statuses that count towards overdue and workload.
    pub fn is_open(&self) -> bool {
        matches!(self, TodoStatus::Pending | TodoStatus::InProgress)
    }

    pub fn can_transition_to(&self, next: TodoStatus) -> bool {
        match self {
            TodoStatus::Pending => matches!(
                next,
                TodoStatus::InProgress | TodoStatus::Completed | TodoStatus::Cancelled
            ),
            TodoStatus::InProgress => matches!(
                next,
                TodoStatus::Completed | TodoStatus::Cancelled | TodoStatus::Pending
            ),
            TodoStatus::Completed | TodoStatus::Cancelled => next == TodoStatus::Pending,
        }
    }

    pub fn validate_transition(&self, next: TodoStatus) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
