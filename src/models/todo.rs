use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::Todo;
use crate::domain::value_objects::{Priority, TodoStatus};

/// Input structure for creating a todo.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateTodoRequest {
    /// Must be between 3 and 200 characters after trimming.
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    /// Accepts a name (`"high"`) or a level (`3`). Defaults to medium.
    pub priority: Option<Priority>,

    /// RFC 3339 instant or a plain date. When absent and the priority is
    /// above low, a due date is suggested from the current workload.
    pub due_date: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update. Absent fields are left unchanged; `"due_date": null`
/// clears the due date.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTodoRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub priority: Option<Priority>,

    #[serde(default, deserialize_with = "super::double_option")]
    pub due_date: Option<Option<String>>,

    pub status: Option<TodoStatus>,

    /// Replaces the whole tag set when present.
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TodoStatus,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TagRequest {
    #[validate(length(min = 1, max = 50))]
    pub tag: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductivityQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelStaleQuery {
    pub older_than_days: Option<i64>,
}

/// Represents a todo as returned by the API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TodoResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub status: TodoStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Todo> for TodoResponse {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id(),
            user_id: todo.user_id(),
            title: todo.title().to_string(),
            description: todo.description().as_str().to_string(),
            status: todo.status(),
            priority: todo.priority(),
            due_date: todo.due_date(),
            completed_at: todo.completed_at(),
            tags: todo.tags(),
            is_overdue: todo.is_overdue(),
            created_at: todo.created_at(),
            updated_at: todo.updated_at(),
        }
    }
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        TodoResponse::from(&todo)
    }
}
