use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{normalize_tag, Priority, TodoDescription, TodoStatus, TodoTitle};

/// A todo item owned by a single user.
///
/// Invariants held by every method:
/// - `completed_at` is set if and only if `status` is `Completed`;
/// - the owner never changes after creation;
/// - tags form a set (duplicates are ignored, removal is idempotent).
///
/// A freshly built todo has id `0` until a repository assigns one.
#[derive(Debug, Clone, PartialEq)]
pub struct Todo {
    id: i64,
    user_id: i64,
    title: TodoTitle,
    description: TodoDescription,
    status: TodoStatus,
    priority: Priority,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    tags: BTreeSet<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw field values used to rebuild a stored todo.
#[derive(Debug, Clone)]
pub struct TodoParts {
    pub id: i64,
    pub user_id: i64,
    pub title: TodoTitle,
    pub description: TodoDescription,
    pub status: TodoStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Creates a pending todo. A due date, when given, must lie strictly
    /// after the creation instant.
    pub fn new(
        user_id: i64,
        title: TodoTitle,
        description: TodoDescription,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        if user_id <= 0 {
            return Err(DomainError::validation("user_id", "owner is required"));
        }
        let now = Utc::now();
        if let Some(due) = due_date {
            if due <= now {
                return Err(DomainError::validation(
                    "due_date",
                    "due date must be in the future",
                ));
            }
        }
        Ok(Self {
            id: 0,
            user_id,
            title,
            description,
            status: TodoStatus::Pending,
            priority,
            due_date,
            completed_at: None,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a todo from storage. `completed_at` is reconciled with the
    /// stored status so the completion invariant holds on every loaded value.
    pub fn restore(parts: TodoParts) -> Self {
        let completed_at = match parts.status {
            TodoStatus::Completed => Some(parts.completed_at.unwrap_or(parts.updated_at)),
            _ => None,
        };
        Self {
            id: parts.id,
            user_id: parts.user_id,
            title: parts.title,
            description: parts.description,
            status: parts.status,
            priority: parts.priority,
            due_date: parts.due_date,
            completed_at,
            tags: parts.tags.into_iter().collect(),
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    /// Used by repositories when the todo is first stored.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn title(&self) -> &TodoTitle {
        &self.title
    }

    pub fn description(&self) -> &TodoDescription {
        &self.description
    }

    pub fn status(&self) -> TodoStatus {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Copy of the tag set in lexical order.
    pub fn tags(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag.trim())
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_at(Utc::now())
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.due_date, Some(due) if due < now) && self.status.is_open()
    }

    pub fn change_status(&mut self, next: TodoStatus) -> DomainResult<()> {
        self.status.validate_transition(next)?;
        let now = Utc::now();
        self.completed_at = match next {
            TodoStatus::Completed => Some(now),
            _ => None,
        };
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self) -> DomainResult<()> {
        if self.status == TodoStatus::Completed {
            return Err(DomainError::AlreadyCompleted);
        }
        self.change_status(TodoStatus::Completed)
    }

    pub fn start(&mut self) -> DomainResult<()> {
        self.change_status(TodoStatus::InProgress)
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.change_status(TodoStatus::Cancelled)
    }

    /// Moves a completed or cancelled todo back to pending.
    pub fn reopen(&mut self) -> DomainResult<()> {
        self.change_status(TodoStatus::Pending)
    }

    pub fn update_title(&mut self, title: TodoTitle) {
        self.title = title;
        self.touch();
    }

    pub fn update_description(&mut self, description: TodoDescription) {
        self.description = description;
        self.touch();
    }

    pub fn update_priority(&mut self, priority: Priority) {
        self.priority = priority;
        self.touch();
    }

    /// Sets or clears the due date. A new date may not lie in the past.
    pub fn update_due_date(&mut self, due_date: Option<DateTime<Utc>>) -> DomainResult<()> {
        if let Some(due) = due_date {
            if due < Utc::now() {
                return Err(DomainError::validation(
                    "due_date",
                    "due date cannot be in the past",
                ));
            }
        }
        self.due_date = due_date;
        self.touch();
        Ok(())
    }

    /// Sets the due date without the past-date check. Reserved for
    /// administrative corrections and fixtures.
    pub fn force_due_date(&mut self, due_date: Option<DateTime<Utc>>) {
        self.due_date = due_date;
        self.touch();
    }

    pub fn add_tag(&mut self, tag: &str) -> DomainResult<()> {
        let tag = normalize_tag(tag)?;
        self.tags.insert(tag);
        self.touch();
        Ok(())
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.remove(tag.trim());
        self.touch();
    }

    /// Replaces the whole tag set, validating every entry first.
    pub fn replace_tags<I, S>(&mut self, tags: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|t| normalize_tag(t.as_ref()))
            .collect::<DomainResult<BTreeSet<_>>>()?;
        self.tags = tags;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn todo() -> Todo {
        Todo::new(
            1,
            TodoTitle::new("Write report").unwrap(),
            TodoDescription::new("quarterly numbers").unwrap(),
            Priority::High,
            None,
        )
        .unwrap()
    }

    fn assert_completion_invariant(todo: &Todo) {
        assert_eq!(
            todo.completed_at().is_some(),
            todo.status() == TodoStatus::Completed,
            "completed_at must be set exactly when status is completed"
        );
    }

    #[test]
    fn test_new_todo_starts_pending() {
        let todo = todo();
        assert_eq!(todo.id(), 0);
        assert_eq!(todo.user_id(), 1);
        assert_eq!(todo.status(), TodoStatus::Pending);
        assert!(todo.tags().is_empty());
        assert_completion_invariant(&todo);
    }

    #[test]
    fn test_due_date_must_be_strictly_in_the_future_on_creation() {
        let title = TodoTitle::new("Pay rent").unwrap();
        let past = Utc::now() - Duration::minutes(1);
        assert!(Todo::new(1, title.clone(), Default::default(), Priority::Low, Some(past)).is_err());

        let future = Utc::now() + Duration::hours(1);
        let todo = Todo::new(1, title, Default::default(), Priority::Low, Some(future)).unwrap();
        assert_eq!(todo.due_date(), Some(future));
    }

    #[test]
    fn test_owner_is_required() {
        let title = TodoTitle::new("Pay rent").unwrap();
        assert!(Todo::new(0, title, Default::default(), Priority::Low, None).is_err());
    }

    #[test]
    fn test_completion_stamps_and_reopen_clears() {
        let mut todo = todo();
        todo.complete().unwrap();
        assert_eq!(todo.status(), TodoStatus::Completed);
        assert!(todo.completed_at().is_some());
        assert_completion_invariant(&todo);

        todo.reopen().unwrap();
        assert_eq!(todo.status(), TodoStatus::Pending);
        assert_completion_invariant(&todo);
    }

    #[test]
    fn test_complete_twice_fails_fast() {
        let mut todo = todo();
        todo.complete().unwrap();
        assert!(matches!(todo.complete(), Err(DomainError::AlreadyCompleted)));
    }

    #[test]
    fn test_cancel_completed_is_invalid_transition() {
        let mut todo = todo();
        todo.complete().unwrap();
        let err = todo.change_status(TodoStatus::Cancelled).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(todo.status(), TodoStatus::Completed);
        assert_completion_invariant(&todo);
    }

    #[test]
    fn test_every_transition_path_keeps_invariant() {
        for from in TodoStatus::ALL {
            for to in TodoStatus::ALL {
                let mut todo = todo();
                if from != TodoStatus::Pending {
                    todo.change_status(from).unwrap();
                }
                let _ = todo.change_status(to);
                assert_completion_invariant(&todo);
            }
        }
    }

    #[test]
    fn test_overdue_predicate() {
        let now = Utc::now();
        let mut todo = todo();
        assert!(!todo.is_overdue_at(now));

        todo.force_due_date(Some(now - Duration::days(1)));
        assert!(todo.is_overdue_at(now));

        todo.start().unwrap();
        assert!(todo.is_overdue_at(now));

        todo.complete().unwrap();
        assert!(!todo.is_overdue_at(now));

        todo.reopen().unwrap();
        todo.cancel().unwrap();
        assert!(!todo.is_overdue_at(now));
    }

    #[test]
    fn test_update_due_date_rejects_past() {
        let mut todo = todo();
        assert!(todo
            .update_due_date(Some(Utc::now() - Duration::days(1)))
            .is_err());
        let future = Utc::now() + Duration::days(2);
        todo.update_due_date(Some(future)).unwrap();
        assert_eq!(todo.due_date(), Some(future));
        todo.update_due_date(None).unwrap();
        assert_eq!(todo.due_date(), None);
    }

    #[test]
    fn test_tags_behave_as_a_set() {
        let mut todo = todo();
        todo.add_tag("work").unwrap();
        let once = todo.tags();
        todo.add_tag("work").unwrap();
        todo.add_tag("  work ").unwrap();
        assert_eq!(todo.tags(), once);

        todo.add_tag("urgent").unwrap();
        todo.remove_tag("work");
        let removed_once = todo.tags();
        todo.remove_tag("work");
        assert_eq!(todo.tags(), removed_once);
        assert_eq!(todo.tags(), vec!["urgent".to_string()]);

        assert!(todo.add_tag("   ").is_err());
    }

    #[test]
    fn test_tags_accessor_is_a_copy() {
        let mut todo = todo();
        todo.add_tag("home").unwrap();
        let mut copy = todo.tags();
        copy.push("injected".into());
        assert_eq!(todo.tags(), vec!["home".to_string()]);
    }

    #[test]
    fn test_restore_reconciles_completed_at() {
        let now = Utc::now();
        let parts = TodoParts {
            id: 9,
            user_id: 3,
            title: TodoTitle::new("Stored").unwrap(),
            description: TodoDescription::default(),
            status: TodoStatus::Pending,
            priority: Priority::Low,
            due_date: None,
            completed_at: Some(now),
            tags: vec!["b".into(), "a".into(), "a".into()],
            created_at: now,
            updated_at: now,
        };
        let todo = Todo::restore(parts.clone());
        assert_eq!(todo.completed_at(), None);
        assert_eq!(todo.tags(), vec!["a".to_string(), "b".to_string()]);

        let todo = Todo::restore(TodoParts {
            status: TodoStatus::Completed,
            completed_at: None,
            ..parts
        });
        assert_eq!(todo.completed_at(), Some(now));
    }
}
