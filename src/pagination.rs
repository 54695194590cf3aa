//! Parsing of list query strings and pagination headers.
//!
//! Recognised parameters:
//!
//! - `page` (1-based, default 1) and `size` (default 25, capped at 100)
//! - `sort=field:dir,...` or `sort_by=field&order=dir`
//! - `search` over title and description
//! - `status`, `priority`, `tag` (comma separated or repeated) and `overdue`
//! - `filter[field][op]=value`, `filter[field]=value` (equality), or a JSON
//!   object `filter={"field": {"op": value}}`

use actix_web::{web, HttpResponseBuilder};
use serde_json::Value;

use crate::domain::query::{
    Filter, QueryOptions, SortDirection, SortField, SortableField, TodoCriteria, TodoField,
};
use crate::domain::value_objects::{Priority, TodoStatus};
use crate::domain::{DomainError, DomainResult};

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: usize,
    pub size: usize,
    pub criteria: TodoCriteria,
    pub options: QueryOptions,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            criteria: TodoCriteria::default(),
            options: QueryOptions::with_limit(DEFAULT_PAGE_SIZE),
        }
    }
}

fn parse_number(field: &'static str, raw: &str) -> DomainResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| DomainError::validation(field, format!("'{}' is not a number", raw)))
}

fn sort_key<F: SortableField>(raw: &str, direction: Option<&str>) -> DomainResult<SortField<F>> {
    let field = F::parse(raw.trim())
        .ok_or_else(|| DomainError::validation("sort", format!("cannot sort by '{}'", raw)))?;
    let direction = match direction.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => SortDirection::parse(d)?,
        None => SortDirection::Asc,
    };
    Ok(SortField { field, direction })
}

/// Parses `field:dir,...`. A missing direction means ascending.
pub fn parse_sort<F: SortableField>(raw: &str) -> DomainResult<Vec<SortField<F>>> {
    split_list(raw)
        .map(|part| match part.split_once(':') {
            Some((field, direction)) => sort_key(field, Some(direction)),
            None => sort_key(part, None),
        })
        .collect()
}

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Takes a `page` or `size` parameter. Returns `false` for other keys.
    pub fn accept(&mut self, key: &str, value: &str) -> DomainResult<bool> {
        match key {
            "page" => {
                self.page = parse_number("page", value)?;
                if self.page == 0 {
                    return Err(DomainError::validation("page", "page starts at 1"));
                }
            }
            "size" | "page_size" | "limit" => {
                let size = parse_number("size", value)?;
                if size == 0 {
                    return Err(DomainError::validation("size", "size must be positive"));
                }
                self.size = size.min(MAX_PAGE_SIZE);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Rows skipped before this page. Pages past what storage can address
    /// are rejected.
    pub fn offset(&self) -> DomainResult<usize> {
        (self.page - 1)
            .checked_mul(self.size)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| DomainError::validation("page", "page is out of range"))
    }

    pub fn options<F: SortableField>(
        &self,
        sort: Vec<SortField<F>>,
    ) -> DomainResult<QueryOptions<F>> {
        let mut options = QueryOptions::with_limit(self.size).offset(self.offset()?);
        options.sort = sort;
        Ok(options)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// `filter[due_date][gte]` → `("due_date", Some("gte"))`.
fn bracket_filter(key: &str) -> Option<(&str, Option<&str>)> {
    let rest = key.strip_prefix("filter[")?;
    let (field, rest) = rest.split_once(']')?;
    if rest.is_empty() {
        return Some((field, None));
    }
    let op = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some((field, Some(op)))
}

fn json_operand(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(json_operand).collect::<Vec<_>>().join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_filters(raw: &str) -> DomainResult<Vec<Filter>> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| DomainError::validation("filter", format!("invalid filter JSON: {}", e)))?;
    let fields = parsed
        .as_object()
        .ok_or_else(|| DomainError::validation("filter", "filter must be a JSON object"))?;

    let mut filters = Vec::new();
    for (field, spec) in fields {
        match spec {
            Value::Object(ops) => {
                for (op, operand) in ops {
                    filters.push(Filter::parse(field, op, &json_operand(operand))?);
                }
            }
            Value::Null => filters.push(Filter::parse(field, "is_null", "")?),
            operand => filters.push(Filter::parse(field, "eq", &json_operand(operand))?),
        }
    }
    Ok(filters)
}

impl ListParams {
    /// Parses a raw query string. Unknown parameters are ignored.
    pub fn from_query(query: &str) -> DomainResult<Self> {
        let pairs = web::Query::<Vec<(String, String)>>::from_query(query)
            .map_err(|e| DomainError::validation("query", e.to_string()))?
            .into_inner();
        Self::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> DomainResult<Self> {
        let mut page = Page::default();
        let mut sort = Vec::new();
        let mut sort_by: Option<&str> = None;
        let mut order: Option<&str> = None;
        let mut criteria = TodoCriteria::default();

        for (key, value) in pairs {
            if page.accept(key, value)? {
                continue;
            }
            match key {
                "sort" => sort.extend(parse_sort::<TodoField>(value)?),
                "sort_by" => sort_by = Some(value),
                "order" => order = Some(value),
                "search" | "q" => criteria = criteria.search(value),
                "status" => {
                    for status in split_list(value) {
                        criteria = criteria.with_status(TodoStatus::parse(status)?);
                    }
                }
                "priority" => {
                    for priority in split_list(value) {
                        criteria = criteria.with_priority(Priority::parse(priority)?);
                    }
                }
                "tag" | "tags" => {
                    for tag in split_list(value) {
                        criteria = criteria.with_tag(tag);
                    }
                }
                "overdue" => {
                    let overdue = value.trim().parse::<bool>().map_err(|_| {
                        DomainError::validation("overdue", "overdue must be true or false")
                    })?;
                    criteria = criteria.overdue(overdue);
                }
                "filter" => {
                    for filter in json_filters(value)? {
                        criteria = criteria.with_condition(filter);
                    }
                }
                other => {
                    if let Some((field, op)) = bracket_filter(other) {
                        let filter = Filter::parse(field, op.unwrap_or("eq"), value)?;
                        criteria = criteria.with_condition(filter);
                    }
                }
            }
        }

        if let Some(field) = sort_by {
            sort.push(sort_key(field, order)?);
        }

        Ok(Self {
            page: page.page,
            size: page.size,
            criteria,
            options: page.options(sort)?,
        })
    }
}

/// Paging summary sent back as `X-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub total: u64,
    pub total_pages: u64,
    pub page: usize,
    pub size: usize,
}

impl PageMeta {
    pub fn new(total: u64, page: usize, size: usize) -> Self {
        let per_page = size.max(1) as u64;
        Self {
            total,
            total_pages: (total + per_page - 1) / per_page,
            page,
            size,
        }
    }

    pub fn apply(&self, response: &mut HttpResponseBuilder) {
        response
            .insert_header(("X-Total-Count", self.total.to_string()))
            .insert_header(("X-Total-Pages", self.total_pages.to_string()))
            .insert_header(("X-Current-Page", self.page.to_string()))
            .insert_header(("X-Page-Size", self.size.to_string()));
    }
}
