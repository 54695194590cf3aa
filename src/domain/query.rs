//! Query model shared by the repository ports and their adapters.
//!
//! Filtering uses a closed set of operators. [`Filter`] has one variant per
//! operator and adapters interpret it with an exhaustive `match`, so adding
//! an operator is a compile error everywhere it is not yet handled.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Date, Priority, TodoStatus};

/// Todo columns that can be filtered and sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TodoField {
    Id,
    Title,
    Description,
    Status,
    Priority,
    DueDate,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

/// User columns that can be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Id,
    Username,
    Status,
    Role,
    LastLoginAt,
    CreatedAt,
    UpdatedAt,
}

/// A field that list queries can order by.
pub trait SortableField: Copy + fmt::Debug + PartialEq {
    /// Ordering applied when a query specifies none.
    const DEFAULT_SORT: SortField<Self>;

    fn parse(name: &str) -> Option<Self>;

    fn column(&self) -> &'static str;
}

impl TodoField {
    /// Fields covered by free-text search. Identifiers and timestamps are
    /// never searched.
    pub const SEARCHABLE: [TodoField; 2] = [TodoField::Title, TodoField::Description];

    /// Columns stored as text, the only ones `like` and `regex` accept.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            TodoField::Title | TodoField::Description | TodoField::Status
        )
    }
}

impl SortableField for TodoField {
    const DEFAULT_SORT: SortField<Self> = SortField {
        field: TodoField::CreatedAt,
        direction: SortDirection::Desc,
    };

    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "id" => Some(TodoField::Id),
            "title" => Some(TodoField::Title),
            "description" => Some(TodoField::Description),
            "status" => Some(TodoField::Status),
            "priority" => Some(TodoField::Priority),
            "due_date" | "duedate" => Some(TodoField::DueDate),
            "completed_at" | "completedat" => Some(TodoField::CompletedAt),
            "created_at" | "createdat" => Some(TodoField::CreatedAt),
            "updated_at" | "updatedat" => Some(TodoField::UpdatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            TodoField::Id => "id",
            TodoField::Title => "title",
            TodoField::Description => "description",
            TodoField::Status => "status",
            TodoField::Priority => "priority",
            TodoField::DueDate => "due_date",
            TodoField::CompletedAt => "completed_at",
            TodoField::CreatedAt => "created_at",
            TodoField::UpdatedAt => "updated_at",
        }
    }
}

impl SortableField for UserField {
    const DEFAULT_SORT: SortField<Self> = SortField {
        field: UserField::CreatedAt,
        direction: SortDirection::Desc,
    };

    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "id" => Some(UserField::Id),
            "username" => Some(UserField::Username),
            "status" => Some(UserField::Status),
            "role" => Some(UserField::Role),
            "last_login_at" => Some(UserField::LastLoginAt),
            "created_at" => Some(UserField::CreatedAt),
            "updated_at" => Some(UserField::UpdatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Username => "username",
            UserField::Status => "status",
            UserField::Role => "role",
            UserField::LastLoginAt => "last_login_at",
            UserField::CreatedAt => "created_at",
            UserField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(DomainError::validation(
                "sort",
                format!("unknown sort direction '{}'", other),
            )),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortField<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: SortableField> SortField<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Paging and ordering for list queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions<F = TodoField> {
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort: Vec<SortField<F>>,
}

impl<F> Default for QueryOptions<F> {
    fn default() -> Self {
        Self {
            limit: None,
            offset: 0,
            sort: Vec::new(),
        }
    }
}

impl<F: SortableField> QueryOptions<F> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Single-column ordering.
    pub fn order_by(mut self, field: F, desc: bool) -> Self {
        self.sort = vec![if desc {
            SortField::desc(field)
        } else {
            SortField::asc(field)
        }];
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The requested ordering, or the field's default when none was given.
    pub fn effective_sort(&self) -> Vec<SortField<F>> {
        if self.sort.is_empty() {
            vec![F::DEFAULT_SORT]
        } else {
            self.sort.clone()
        }
    }
}

/// A typed operand of a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Int(v) => write!(f, "{}", v),
            FilterValue::Text(v) => f.write_str(v),
            FilterValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// Operator names accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
    Regex,
}

impl FilterOp {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" | "==" => Ok(FilterOp::Eq),
            "ne" | "neq" | "!=" | "<>" => Ok(FilterOp::Ne),
            "lt" | "<" => Ok(FilterOp::Lt),
            "lte" | "le" | "<=" => Ok(FilterOp::Lte),
            "gt" | ">" => Ok(FilterOp::Gt),
            "gte" | "ge" | ">=" => Ok(FilterOp::Gte),
            "like" => Ok(FilterOp::Like),
            "in" => Ok(FilterOp::In),
            "not_in" | "nin" => Ok(FilterOp::NotIn),
            "between" => Ok(FilterOp::Between),
            "is_null" | "null" => Ok(FilterOp::IsNull),
            "is_not_null" | "not_null" => Ok(FilterOp::IsNotNull),
            "regex" | "~" => Ok(FilterOp::Regex),
            other => Err(DomainError::validation(
                "filter",
                format!("unknown filter operator '{}'", other),
            )),
        }
    }
}

/// One condition on a todo field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(TodoField, FilterValue),
    Ne(TodoField, FilterValue),
    Lt(TodoField, FilterValue),
    Lte(TodoField, FilterValue),
    Gt(TodoField, FilterValue),
    Gte(TodoField, FilterValue),
    /// SQL `LIKE` pattern (`%`, `_`), matched case-insensitively.
    Like(TodoField, String),
    In(TodoField, Vec<FilterValue>),
    NotIn(TodoField, Vec<FilterValue>),
    /// Inclusive on both ends.
    Between(TodoField, FilterValue, FilterValue),
    IsNull(TodoField),
    IsNotNull(TodoField),
    Regex(TodoField, String),
}

impl Filter {
    pub fn field(&self) -> TodoField {
        match self {
            Filter::Eq(f, _)
            | Filter::Ne(f, _)
            | Filter::Lt(f, _)
            | Filter::Lte(f, _)
            | Filter::Gt(f, _)
            | Filter::Gte(f, _)
            | Filter::Like(f, _)
            | Filter::In(f, _)
            | Filter::NotIn(f, _)
            | Filter::Between(f, _, _)
            | Filter::IsNull(f)
            | Filter::IsNotNull(f)
            | Filter::Regex(f, _) => *f,
        }
    }

    /// Builds a filter from wire strings, typing `raw` after `field`.
    /// List operands (`in`, `not_in`, `between`) are comma separated.
    pub fn parse(field: &str, op: &str, raw: &str) -> DomainResult<Self> {
        let field = TodoField::parse(field).ok_or_else(|| {
            DomainError::validation("filter", format!("cannot filter on '{}'", field))
        })?;
        let op = FilterOp::parse(op)?;
        if matches!(op, FilterOp::Like | FilterOp::Regex) && !field.is_text() {
            return Err(DomainError::validation(
                "filter",
                format!("pattern operators do not apply to '{}'", field.column()),
            ));
        }
        let list = || -> DomainResult<Vec<FilterValue>> {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| typed_value(field, s))
                .collect()
        };

        let filter = match op {
            FilterOp::Eq => Filter::Eq(field, typed_value(field, raw)?),
            FilterOp::Ne => Filter::Ne(field, typed_value(field, raw)?),
            FilterOp::Lt => Filter::Lt(field, typed_value(field, raw)?),
            FilterOp::Lte => Filter::Lte(field, typed_value(field, raw)?),
            FilterOp::Gt => Filter::Gt(field, typed_value(field, raw)?),
            FilterOp::Gte => Filter::Gte(field, typed_value(field, raw)?),
            FilterOp::Like => Filter::Like(field, raw.to_string()),
            FilterOp::In => Filter::In(field, list()?),
            FilterOp::NotIn => Filter::NotIn(field, list()?),
            FilterOp::Between => {
                let mut values = list()?;
                if values.len() != 2 {
                    return Err(DomainError::validation(
                        "filter",
                        "between expects exactly two comma separated values",
                    ));
                }
                let high = values.remove(1);
                let low = values.remove(0);
                Filter::Between(field, low, high)
            }
            FilterOp::IsNull => Filter::IsNull(field),
            FilterOp::IsNotNull => Filter::IsNotNull(field),
            FilterOp::Regex => {
                regex::Regex::new(raw).map_err(|e| {
                    DomainError::validation("filter", format!("invalid regex: {}", e))
                })?;
                Filter::Regex(field, raw.to_string())
            }
        };
        Ok(filter)
    }
}

/// Converts a raw string into the operand type of `field`.
fn typed_value(field: TodoField, raw: &str) -> DomainResult<FilterValue> {
    let raw = raw.trim();
    match field {
        TodoField::Id => raw
            .parse::<i64>()
            .map(FilterValue::Int)
            .map_err(|_| DomainError::validation("filter", format!("'{}' is not an id", raw))),
        TodoField::Title | TodoField::Description => Ok(FilterValue::Text(raw.to_string())),
        TodoField::Status => {
            TodoStatus::parse(raw).map(|s| FilterValue::Text(s.as_str().to_string()))
        }
        TodoField::Priority => Priority::parse(raw).map(|p| FilterValue::Int(p.level() as i64)),
        TodoField::DueDate
        | TodoField::CompletedAt
        | TodoField::CreatedAt
        | TodoField::UpdatedAt => parse_timestamp(raw).map(FilterValue::Timestamp),
    }
}

/// Accepts RFC 3339 instants or anything [`Date`] understands (midnight UTC).
pub fn parse_timestamp(raw: &str) -> DomainResult<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Ok(instant.with_timezone(&Utc));
    }
    Date::parse(raw).map(|d| d.midnight_utc())
}

/// Longest look-back window, in days, accepted by reports and sweeps.
pub const MAX_WINDOW_DAYS: i64 = 36500;

/// `days` as a duration. Windows longer than [`MAX_WINDOW_DAYS`] are
/// rejected; callers check their own lower bound.
pub fn window_days(field: &'static str, days: i64) -> DomainResult<Duration> {
    if days > MAX_WINDOW_DAYS {
        return Err(DomainError::validation(
            field,
            format!("must not exceed {} days", MAX_WINDOW_DAYS),
        ));
    }
    Ok(Duration::days(days))
}

/// The instant `days` ago. A window reaching past the representable range
/// starts at the earliest instant, so nothing falls before it.
pub fn inactivity_cutoff(days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Criteria for todo queries. Every populated field narrows the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoCriteria {
    pub user_id: Option<i64>,
    pub statuses: Vec<TodoStatus>,
    pub priorities: Vec<Priority>,
    /// A todo must carry every listed tag.
    pub tags: Vec<String>,
    pub overdue: Option<bool>,
    /// Inclusive lower bound on the due date.
    pub due_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the due date.
    pub due_until: Option<DateTime<Utc>>,
    /// Inclusive lower bound on the creation instant.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the creation instant.
    pub created_until: Option<DateTime<Utc>>,
    /// Case-insensitive substring over title and description.
    pub search: Option<String>,
    pub conditions: Vec<Filter>,
}

impl TodoCriteria {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TodoStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priorities.push(priority);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn overdue(mut self, overdue: bool) -> Self {
        self.overdue = Some(overdue);
        self
    }

    pub fn due_between(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.due_from = from;
        self.due_until = until;
        self
    }

    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_from = from;
        self.created_until = until;
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_string())
        };
        self
    }

    pub fn with_condition(mut self, filter: Filter) -> Self {
        self.conditions.push(filter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_typed_filters() {
        assert_eq!(
            Filter::parse("priority", "gte", "high").unwrap(),
            Filter::Gte(TodoField::Priority, FilterValue::Int(3))
        );
        assert_eq!(
            Filter::parse("status", "in", "pending, in_progress").unwrap(),
            Filter::In(
                TodoField::Status,
                vec![
                    FilterValue::Text("pending".into()),
                    FilterValue::Text("in_progress".into())
                ]
            )
        );
        assert_eq!(
            Filter::parse("due_date", "between", "2024-01-01,2024-01-31").unwrap(),
            Filter::Between(
                TodoField::DueDate,
                FilterValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                FilterValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()),
            )
        );
        assert_eq!(
            Filter::parse("completed_at", "is_null", "").unwrap(),
            Filter::IsNull(TodoField::CompletedAt)
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Filter::parse("password", "eq", "x").is_err());
        assert!(Filter::parse("title", "contains", "x").is_err());
        assert!(Filter::parse("id", "eq", "abc").is_err());
        assert!(Filter::parse("status", "eq", "done").is_err());
        assert!(Filter::parse("title", "regex", "([").is_err());
        assert!(Filter::parse("priority", "between", "low").is_err());
        assert!(Filter::parse("created_at", "like", "2024%").is_err());
        assert!(Filter::parse("due_date", "regex", "^2024").is_err());
        assert!(Filter::parse("priority", "like", "3").is_err());
        assert!(Filter::parse("status", "like", "pend%").is_ok());
    }

    #[test]
    fn test_default_sort_is_created_at_desc() {
        let options: QueryOptions = QueryOptions::default();
        assert_eq!(
            options.effective_sort(),
            vec![SortField::desc(TodoField::CreatedAt)]
        );

        let options = QueryOptions::with_limit(5).order_by(TodoField::Priority, false);
        assert_eq!(options.limit, Some(5));
        assert_eq!(
            options.effective_sort(),
            vec![SortField::asc(TodoField::Priority)]
        );
    }

    #[test]
    fn test_blank_search_is_ignored() {
        assert_eq!(TodoCriteria::for_user(1).search("   ").search, None);
        assert_eq!(
            TodoCriteria::for_user(1).search(" report ").search.as_deref(),
            Some("report")
        );
    }

    #[test]
    fn test_window_bounds() {
        assert_eq!(window_days("days", 30).unwrap(), Duration::days(30));
        assert_eq!(
            window_days("days", MAX_WINDOW_DAYS).unwrap(),
            Duration::days(MAX_WINDOW_DAYS)
        );
        assert_eq!(
            window_days("days", 1_000_000_000_000_000).unwrap_err().kind(),
            crate::domain::ErrorKind::Validation
        );

        assert_eq!(inactivity_cutoff(i64::MAX), DateTime::<Utc>::MIN_UTC);
        let cutoff = inactivity_cutoff(2);
        assert!((Utc::now() - Duration::days(2) - cutoff).num_seconds().abs() < 5);
    }
}
