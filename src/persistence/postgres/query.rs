//! SQL rendering of the todo query model.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use crate::domain::query::{
    Filter, FilterValue, QueryOptions, SortableField, SortDirection, TodoCriteria, TodoField,
};
use crate::domain::value_objects::TodoStatus;

pub(super) const TODO_COLUMNS: &str = "id, user_id, title, description, status, priority, \
     due_date, completed_at, tags, created_at, updated_at";

/// Column expression for comparisons. Enum columns compare as text so
/// they line up with the text operands produced by the filter parser.
fn column(field: TodoField) -> &'static str {
    match field {
        TodoField::Status => "status::text",
        other => other.column(),
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Int(v) => qb.push_bind(*v),
        FilterValue::Text(v) => qb.push_bind(v.clone()),
        FilterValue::Timestamp(v) => qb.push_bind(*v),
    };
}

fn push_list(qb: &mut QueryBuilder<'_, Postgres>, values: &[FilterValue]) {
    qb.push("(");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(qb, value);
    }
    qb.push(")");
}

fn push_compare(qb: &mut QueryBuilder<'_, Postgres>, field: TodoField, op: &str, value: &FilterValue) {
    qb.push(column(field)).push(op);
    push_value(qb, value);
}

pub(super) fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::Eq(field, v) => push_compare(qb, *field, " = ", v),
        Filter::Ne(field, v) => push_compare(qb, *field, " <> ", v),
        Filter::Lt(field, v) => push_compare(qb, *field, " < ", v),
        Filter::Lte(field, v) => push_compare(qb, *field, " <= ", v),
        Filter::Gt(field, v) => push_compare(qb, *field, " > ", v),
        Filter::Gte(field, v) => push_compare(qb, *field, " >= ", v),
        Filter::Like(field, pattern) => {
            qb.push("CAST(")
                .push(field.column())
                .push(" AS TEXT) ILIKE ")
                .push_bind(pattern.clone());
        }
        Filter::Regex(field, pattern) => {
            qb.push("CAST(")
                .push(field.column())
                .push(" AS TEXT) ~ ")
                .push_bind(pattern.clone());
        }
        Filter::In(_, values) if values.is_empty() => {
            qb.push("FALSE");
        }
        Filter::In(field, values) => {
            qb.push(column(*field)).push(" IN ");
            push_list(qb, values);
        }
        Filter::NotIn(field, values) if values.is_empty() => {
            qb.push(column(*field)).push(" IS NOT NULL");
        }
        Filter::NotIn(field, values) => {
            qb.push(column(*field)).push(" NOT IN ");
            push_list(qb, values);
        }
        Filter::Between(field, low, high) => {
            qb.push(column(*field)).push(" BETWEEN ");
            push_value(qb, low);
            qb.push(" AND ");
            push_value(qb, high);
        }
        Filter::IsNull(field) => {
            qb.push(field.column()).push(" IS NULL");
        }
        Filter::IsNotNull(field) => {
            qb.push(field.column()).push(" IS NOT NULL");
        }
    }
}

/// Escapes `LIKE` metacharacters in a user supplied search term.
pub(super) fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

fn push_overdue(qb: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
    qb.push("(due_date IS NOT NULL AND due_date < ")
        .push_bind(now)
        .push(" AND status IN (")
        .push_bind(TodoStatus::Pending)
        .push(", ")
        .push_bind(TodoStatus::InProgress)
        .push("))");
}

/// Appends `WHERE ...` for `criteria`. Always emits a `WHERE` so callers
/// can keep appending with `AND`.
pub(super) fn push_where(
    qb: &mut QueryBuilder<'_, Postgres>,
    criteria: &TodoCriteria,
    now: DateTime<Utc>,
) {
    qb.push(" WHERE TRUE");

    if let Some(user_id) = criteria.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if !criteria.statuses.is_empty() {
        qb.push(" AND status IN (");
        let mut list = qb.separated(", ");
        for status in &criteria.statuses {
            list.push_bind(*status);
        }
        qb.push(")");
    }
    if !criteria.priorities.is_empty() {
        qb.push(" AND priority IN (");
        let mut list = qb.separated(", ");
        for priority in &criteria.priorities {
            list.push_bind(priority.level());
        }
        qb.push(")");
    }
    if !criteria.tags.is_empty() {
        qb.push(" AND tags @> ").push_bind(criteria.tags.clone());
    }
    match criteria.overdue {
        Some(true) => {
            qb.push(" AND ");
            push_overdue(qb, now);
        }
        Some(false) => {
            qb.push(" AND NOT ");
            push_overdue(qb, now);
        }
        None => {}
    }
    if let Some(from) = criteria.due_from {
        qb.push(" AND due_date >= ").push_bind(from);
    }
    if let Some(until) = criteria.due_until {
        qb.push(" AND due_date < ").push_bind(until);
    }
    if let Some(from) = criteria.created_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(until) = criteria.created_until {
        qb.push(" AND created_at < ").push_bind(until);
    }
    if let Some(term) = &criteria.search {
        let pattern = escape_like(term);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    for condition in &criteria.conditions {
        qb.push(" AND ");
        push_filter(qb, condition);
    }
}

/// Appends `ORDER BY`, nulls last, with id as the final tie-break.
pub(super) fn push_order<F: SortableField>(
    qb: &mut QueryBuilder<'_, Postgres>,
    options: &QueryOptions<F>,
) {
    let sort = options.effective_sort();
    let tie_break = sort
        .last()
        .map(|s| s.direction)
        .unwrap_or(SortDirection::Desc);
    qb.push(" ORDER BY ");
    for key in &sort {
        qb.push(key.field.column())
            .push(" ")
            .push(key.direction.as_sql())
            .push(" NULLS LAST, ");
    }
    qb.push("id ").push(tie_break.as_sql());
}

pub(super) fn push_page<F>(qb: &mut QueryBuilder<'_, Postgres>, options: &QueryOptions<F>) {
    if let Some(limit) = options.limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }
    if options.offset > 0 {
        qb.push(" OFFSET ").push_bind(options.offset as i64);
    }
}
