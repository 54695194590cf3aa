//! Evaluates [`TodoCriteria`] and orderings against in-memory todos.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use crate::domain::entities::Todo;
use crate::domain::errors::{RepoResult, RepositoryError};
use crate::domain::query::{Filter, FilterValue, SortDirection, SortField, TodoCriteria, TodoField};

/// A criteria with its patterns compiled once per query.
pub(crate) struct TodoMatcher<'a> {
    criteria: &'a TodoCriteria,
    patterns: Vec<Option<Regex>>,
    search: Option<String>,
    now: DateTime<Utc>,
}

impl<'a> TodoMatcher<'a> {
    pub(crate) fn new(criteria: &'a TodoCriteria, now: DateTime<Utc>) -> RepoResult<Self> {
        let patterns = criteria
            .conditions
            .iter()
            .map(|condition| match condition {
                Filter::Like(_, pattern) => compile(&like_to_regex(pattern)).map(Some),
                Filter::Regex(_, pattern) => compile(pattern).map(Some),
                _ => Ok(None),
            })
            .collect::<RepoResult<Vec<_>>>()?;
        Ok(Self {
            criteria,
            patterns,
            search: criteria.search.as_ref().map(|s| s.to_lowercase()),
            now,
        })
    }

    pub(crate) fn matches(&self, todo: &Todo) -> bool {
        let c = self.criteria;
        if let Some(user_id) = c.user_id {
            if todo.user_id() != user_id {
                return false;
            }
        }
        if !c.statuses.is_empty() && !c.statuses.contains(&todo.status()) {
            return false;
        }
        if !c.priorities.is_empty() && !c.priorities.contains(&todo.priority()) {
            return false;
        }
        if !c.tags.iter().all(|tag| todo.has_tag(tag)) {
            return false;
        }
        if let Some(overdue) = c.overdue {
            if todo.is_overdue_at(self.now) != overdue {
                return false;
            }
        }
        if !in_window(todo.due_date(), c.due_from, c.due_until) {
            return false;
        }
        if !in_window(Some(todo.created_at()), c.created_from, c.created_until) {
            return false;
        }
        if let Some(term) = &self.search {
            let hit = todo.title().as_str().to_lowercase().contains(term)
                || todo.description().as_str().to_lowercase().contains(term);
            if !hit {
                return false;
            }
        }
        c.conditions
            .iter()
            .zip(&self.patterns)
            .all(|(condition, pattern)| matches_filter(todo, condition, pattern.as_ref()))
    }
}

fn compile(pattern: &str) -> RepoResult<Regex> {
    RegexBuilder::new(pattern)
        .build()
        .map_err(|e| RepositoryError::Other(format!("invalid pattern: {}", e)))
}

/// Translates a SQL `LIKE` pattern into an anchored, case-insensitive regex.
pub(crate) fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?is)^");
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

fn in_window(
    value: Option<DateTime<Utc>>,
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> bool {
    if from.is_none() && until.is_none() {
        return true;
    }
    match value {
        None => false,
        Some(v) => from.map_or(true, |f| v >= f) && until.map_or(true, |u| v < u),
    }
}

/// The value of `field` on `todo`; `None` is SQL `NULL`.
pub(crate) fn field_value(todo: &Todo, field: TodoField) -> Option<FilterValue> {
    match field {
        TodoField::Id => Some(FilterValue::Int(todo.id())),
        TodoField::Title => Some(FilterValue::Text(todo.title().as_str().to_string())),
        TodoField::Description => Some(FilterValue::Text(
            todo.description().as_str().to_string(),
        )),
        TodoField::Status => Some(FilterValue::Text(todo.status().as_str().to_string())),
        TodoField::Priority => Some(FilterValue::Int(todo.priority().level() as i64)),
        TodoField::DueDate => todo.due_date().map(FilterValue::Timestamp),
        TodoField::CompletedAt => todo.completed_at().map(FilterValue::Timestamp),
        TodoField::CreatedAt => Some(FilterValue::Timestamp(todo.created_at())),
        TodoField::UpdatedAt => Some(FilterValue::Timestamp(todo.updated_at())),
    }
}

/// Orders values of the same type; anything else is incomparable.
fn compare(left: &FilterValue, right: &FilterValue) -> Option<Ordering> {
    match (left, right) {
        (FilterValue::Int(a), FilterValue::Int(b)) => Some(a.cmp(b)),
        (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
        (FilterValue::Timestamp(a), FilterValue::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_field(
    todo: &Todo,
    field: TodoField,
    operand: &FilterValue,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    field_value(todo, field)
        .and_then(|value| compare(&value, operand))
        .map_or(false, accept)
}

fn matches_filter(todo: &Todo, filter: &Filter, pattern: Option<&Regex>) -> bool {
    match filter {
        Filter::Eq(field, v) => compare_field(todo, *field, v, |o| o == Ordering::Equal),
        Filter::Ne(field, v) => compare_field(todo, *field, v, |o| o != Ordering::Equal),
        Filter::Lt(field, v) => compare_field(todo, *field, v, |o| o == Ordering::Less),
        Filter::Lte(field, v) => compare_field(todo, *field, v, |o| o != Ordering::Greater),
        Filter::Gt(field, v) => compare_field(todo, *field, v, |o| o == Ordering::Greater),
        Filter::Gte(field, v) => compare_field(todo, *field, v, |o| o != Ordering::Less),
        Filter::Like(field, _) | Filter::Regex(field, _) => {
            match (field_value(todo, *field), pattern) {
                (Some(value), Some(re)) => re.is_match(&value.to_string()),
                _ => false,
            }
        }
        Filter::In(field, values) => values
            .iter()
            .any(|v| compare_field(todo, *field, v, |o| o == Ordering::Equal)),
        Filter::NotIn(field, values) => {
            field_value(todo, *field).is_some()
                && !values
                    .iter()
                    .any(|v| compare_field(todo, *field, v, |o| o == Ordering::Equal))
        }
        Filter::Between(field, low, high) => {
            compare_field(todo, *field, low, |o| o != Ordering::Less)
                && compare_field(todo, *field, high, |o| o != Ordering::Greater)
        }
        Filter::IsNull(field) => field_value(todo, *field).is_none(),
        Filter::IsNotNull(field) => field_value(todo, *field).is_some(),
    }
}

/// Sorts by `sort`, nulls last, then by id in the direction of the last key.
pub(crate) fn sort_todos(todos: &mut [Todo], sort: &[SortField<TodoField>]) {
    let tie_break = sort
        .last()
        .map(|s| s.direction)
        .unwrap_or(SortDirection::Desc);
    todos.sort_by(|a, b| {
        for key in sort {
            let ordering = match key.field {
                // Declaration order, matching the database enum.
                TodoField::Status => directed(a.status().cmp(&b.status()), key.direction),
                _ => compare_sort_key(a, b, key),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        match tie_break {
            SortDirection::Asc => a.id().cmp(&b.id()),
            SortDirection::Desc => b.id().cmp(&a.id()),
        }
    });
}

fn compare_sort_key(a: &Todo, b: &Todo, key: &SortField<TodoField>) -> Ordering {
    match (field_value(a, key.field), field_value(b, key.field)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => directed(
            compare(&x, &y).unwrap_or(Ordering::Equal),
            key.direction,
        ),
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}
