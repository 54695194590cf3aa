use chrono::{Duration, NaiveDate, Utc};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::Todo;
use crate::domain::errors::{DomainError, DomainResult, RepoResultExt};
use crate::domain::query::{parse_timestamp, window_days, QueryOptions, TodoCriteria};
use crate::domain::repositories::{TodoQueryRepository, TodoRepository};
use crate::domain::services::TodoService;
use crate::domain::statistics::{TagCount, TodoStatistics, UserProductivity};
use crate::domain::value_objects::{Priority, TodoDescription, TodoStatus, TodoTitle};
use crate::models::{CreateTodoRequest, UpdateTodoRequest};

/// How far ahead existing due dates are counted when suggesting one.
const WORKLOAD_HORIZON_DAYS: i64 = 21;

pub const DEFAULT_PRODUCTIVITY_DAYS: i64 = 30;
pub const DEFAULT_STALE_DAYS: i64 = 30;

/// Todo operations on behalf of an authenticated user. Every operation on an
/// existing todo checks ownership first.
#[derive(Clone)]
pub struct TodoUseCases {
    todos: Arc<dyn TodoRepository>,
    queries: Arc<dyn TodoQueryRepository>,
    service: TodoService,
}

impl TodoUseCases {
    pub fn new(todos: Arc<dyn TodoRepository>, queries: Arc<dyn TodoQueryRepository>) -> Self {
        let service = TodoService::new(todos.clone(), queries.clone());
        Self {
            todos,
            queries,
            service,
        }
    }

    pub fn service(&self) -> &TodoService {
        &self.service
    }

    /// Creates a todo. Without a due date, anything above low priority gets
    /// one suggested from the user's upcoming workload.
    pub async fn create(&self, user_id: i64, request: CreateTodoRequest) -> DomainResult<Todo> {
        let title = TodoTitle::new(&request.title)?;
        let description = TodoDescription::new(request.description.as_deref().unwrap_or(""))?;
        let priority = request.priority.unwrap_or_default();
        let due_date = match request.due_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_timestamp(raw)?),
            _ if priority != Priority::Low => {
                let workload = self.workload(user_id).await?;
                Some(self.service.suggest_due_date(priority, &workload))
            }
            _ => None,
        };

        let mut todo = Todo::new(user_id, title, description, priority, due_date)?;
        todo.replace_tags(&request.tags)?;
        let todo = self.todos.save(todo).await?;
        info!("user {} created todo {}", user_id, todo.id());
        Ok(todo)
    }

    async fn workload(&self, user_id: i64) -> DomainResult<HashMap<NaiveDate, u32>> {
        let now = Utc::now();
        let upcoming = self
            .queries
            .find_due_between(
                user_id,
                now,
                now + Duration::days(WORKLOAD_HORIZON_DAYS),
                &QueryOptions::default(),
            )
            .await?;
        let mut workload = HashMap::new();
        for todo in upcoming {
            if let Some(due) = todo.due_date() {
                *workload.entry(due.date_naive()).or_insert(0) += 1;
            }
        }
        Ok(workload)
    }

    pub async fn get(&self, user_id: i64, todo_id: i64) -> DomainResult<Todo> {
        self.service.validate_user_ownership(todo_id, user_id).await
    }

    /// Applies the present fields in order: content, due date, tags, then the
    /// status change.
    pub async fn update(
        &self,
        user_id: i64,
        todo_id: i64,
        request: UpdateTodoRequest,
    ) -> DomainResult<Todo> {
        let mut todo = self.service.validate_user_ownership(todo_id, user_id).await?;

        if let Some(title) = request.title.as_deref() {
            todo.update_title(TodoTitle::new(title)?);
        }
        if let Some(description) = request.description.as_deref() {
            todo.update_description(TodoDescription::new(description)?);
        }
        if let Some(priority) = request.priority {
            todo.update_priority(priority);
        }
        match request.due_date {
            Some(Some(raw)) => todo.update_due_date(Some(parse_timestamp(&raw)?))?,
            Some(None) => todo.update_due_date(None)?,
            None => {}
        }
        if let Some(tags) = request.tags {
            todo.replace_tags(&tags)?;
        }
        if let Some(status) = request.status {
            if status != todo.status() {
                todo.change_status(status)?;
            }
        }

        self.persist(todo).await
    }

    pub async fn complete(&self, user_id: i64, todo_id: i64) -> DomainResult<Todo> {
        let mut todo = self.service.validate_user_ownership(todo_id, user_id).await?;
        todo.complete()?;
        self.persist(todo).await
    }

    pub async fn change_status(
        &self,
        user_id: i64,
        todo_id: i64,
        status: TodoStatus,
    ) -> DomainResult<Todo> {
        let mut todo = self.service.validate_user_ownership(todo_id, user_id).await?;
        todo.change_status(status)?;
        self.persist(todo).await
    }

    pub async fn delete(&self, user_id: i64, todo_id: i64) -> DomainResult<()> {
        self.service.validate_user_ownership(todo_id, user_id).await?;
        self.todos
            .delete(todo_id)
            .await
            .or_not_found("todo", todo_id)?;
        info!("user {} deleted todo {}", user_id, todo_id);
        Ok(())
    }

    pub async fn add_tag(&self, user_id: i64, todo_id: i64, tag: &str) -> DomainResult<Todo> {
        let mut todo = self.service.validate_user_ownership(todo_id, user_id).await?;
        todo.add_tag(tag)?;
        self.persist(todo).await
    }

    pub async fn remove_tag(&self, user_id: i64, todo_id: i64, tag: &str) -> DomainResult<Todo> {
        let mut todo = self.service.validate_user_ownership(todo_id, user_id).await?;
        todo.remove_tag(tag);
        self.persist(todo).await
    }

    /// One page of the user's todos plus the unpaged total. The owner filter
    /// is always forced to `user_id`.
    pub async fn list(
        &self,
        user_id: i64,
        mut criteria: TodoCriteria,
        options: &QueryOptions,
    ) -> DomainResult<(Vec<Todo>, u64)> {
        criteria.user_id = Some(user_id);
        let todos = self.queries.find_by_filters(&criteria, options).await?;
        let total = self.queries.count(&criteria).await?;
        Ok((todos, total))
    }

    pub async fn statistics(&self, user_id: i64) -> DomainResult<TodoStatistics> {
        Ok(self.queries.get_statistics(user_id).await?)
    }

    pub async fn popular_tags(&self, user_id: i64, limit: usize) -> DomainResult<Vec<TagCount>> {
        Ok(self.queries.get_popular_tags(user_id, limit).await?)
    }

    pub async fn productivity(
        &self,
        user_id: i64,
        period_days: Option<i64>,
    ) -> DomainResult<UserProductivity> {
        self.service
            .get_user_productivity(user_id, period_days.unwrap_or(DEFAULT_PRODUCTIVITY_DAYS))
            .await
    }

    pub async fn start_overdue(&self, cancel: &CancellationToken, user_id: i64) -> DomainResult<u64> {
        self.service.mark_overdue_as_in_progress(cancel, user_id).await
    }

    pub async fn cancel_stale(
        &self,
        cancel: &CancellationToken,
        user_id: i64,
        older_than_days: Option<i64>,
    ) -> DomainResult<u64> {
        let days = older_than_days.unwrap_or(DEFAULT_STALE_DAYS);
        if days < 0 {
            return Err(DomainError::validation(
                "older_than_days",
                "must not be negative",
            ));
        }
        let older_than = window_days("older_than_days", days)?;
        self.service
            .auto_cancel_old_pending_todos(cancel, user_id, older_than)
            .await
    }

    async fn persist(&self, todo: Todo) -> DomainResult<Todo> {
        let id = todo.id();
        self.todos.save(todo).await.or_not_found("todo", id)
    }
}
