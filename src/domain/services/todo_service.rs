use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::Todo;
use crate::domain::errors::{DomainError, DomainResult, RepoResultExt};
use crate::domain::query::{window_days, QueryOptions, TodoCriteria};
use crate::domain::repositories::{TodoQueryRepository, TodoRepository};
use crate::domain::statistics::UserProductivity;
use crate::domain::value_objects::{Priority, TodoStatus};

/// Upper bound on todos touched by one sweep.
pub const SWEEP_LIMIT: usize = 1000;

/// A day already holding this many due todos is considered full.
pub const MAX_TODOS_PER_DAY: u32 = 3;

/// Days scanned after the base date when looking for a lighter day.
const SUGGESTION_WINDOW_DAYS: i64 = 7;

/// Todo rules that span more than one entity.
#[derive(Clone)]
pub struct TodoService {
    todos: Arc<dyn TodoRepository>,
    queries: Arc<dyn TodoQueryRepository>,
}

impl TodoService {
    pub fn new(todos: Arc<dyn TodoRepository>, queries: Arc<dyn TodoQueryRepository>) -> Self {
        Self { todos, queries }
    }

    /// Loads the todo and checks it belongs to `user_id`.
    pub async fn validate_user_ownership(&self, todo_id: i64, user_id: i64) -> DomainResult<Todo> {
        let todo = self
            .todos
            .find_by_id(todo_id)
            .await
            .or_not_found("todo", todo_id)?;
        if !todo.is_owned_by(user_id) {
            return Err(DomainError::Forbidden(format!(
                "todo {} does not belong to user {}",
                todo_id, user_id
            )));
        }
        Ok(todo)
    }

    pub async fn get_user_productivity(
        &self,
        user_id: i64,
        period_days: i64,
    ) -> DomainResult<UserProductivity> {
        if period_days <= 0 {
            return Err(DomainError::validation(
                "days",
                "period must be at least one day",
            ));
        }
        let period = window_days("days", period_days)?;
        let now = Utc::now();
        let criteria = TodoCriteria::for_user(user_id).created_between(Some(now - period), None);
        let todos = self
            .queries
            .find_by_filters(&criteria, &QueryOptions::default())
            .await?;
        Ok(UserProductivity::compute(&todos, period_days, now))
    }

    pub fn suggest_due_date(
        &self,
        priority: Priority,
        workload: &HashMap<NaiveDate, u32>,
    ) -> DateTime<Utc> {
        suggest_due_date_at(priority, workload, Utc::now())
    }

    /// Moves the user's overdue pending todos to `in_progress`. Returns how
    /// many were moved.
    pub async fn mark_overdue_as_in_progress(
        &self,
        cancel: &CancellationToken,
        user_id: i64,
    ) -> DomainResult<u64> {
        let criteria = TodoCriteria::for_user(user_id)
            .with_status(TodoStatus::Pending)
            .overdue(true);
        let candidates = self.load_batch(cancel, &criteria).await?;
        self.apply_to_each(cancel, candidates, "start overdue", Todo::start)
            .await
    }

    /// Cancels the user's pending todos whose due date passed more than
    /// `older_than` ago.
    pub async fn auto_cancel_old_pending_todos(
        &self,
        cancel: &CancellationToken,
        user_id: i64,
        older_than: Duration,
    ) -> DomainResult<u64> {
        let cutoff = Utc::now() - older_than;
        let criteria = TodoCriteria::for_user(user_id)
            .with_status(TodoStatus::Pending)
            .due_between(None, Some(cutoff));
        let candidates = self.load_batch(cancel, &criteria).await?;
        self.apply_to_each(cancel, candidates, "cancel stale", Todo::cancel)
            .await
    }

    async fn load_batch(
        &self,
        cancel: &CancellationToken,
        criteria: &TodoCriteria,
    ) -> DomainResult<Vec<Todo>> {
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        Ok(self
            .queries
            .find_by_filters(criteria, &QueryOptions::with_limit(SWEEP_LIMIT))
            .await?)
    }

    async fn apply_to_each(
        &self,
        cancel: &CancellationToken,
        todos: Vec<Todo>,
        action: &str,
        transition: fn(&mut Todo) -> DomainResult<()>,
    ) -> DomainResult<u64> {
        let total = todos.len();
        let mut done = 0u64;
        for mut todo in todos {
            if cancel.is_cancelled() {
                warn!(
                    "{} sweep cancelled after {} of {} todos",
                    action, done, total
                );
                return Err(DomainError::Cancelled);
            }
            let id = todo.id();
            if let Err(e) = transition(&mut todo) {
                warn!("{}: skipping todo {}: {}", action, id, e);
                continue;
            }
            match self.todos.save(todo).await {
                Ok(_) => done += 1,
                Err(e) => warn!("{}: failed to save todo {}: {}", action, id, e),
            }
        }
        info!("{} sweep updated {} of {} todos", action, done, total);
        Ok(done)
    }
}

/// Picks a due date from the priority offset, moving forward to the first
/// day in the window with fewer than [`MAX_TODOS_PER_DAY`] todos.
pub fn suggest_due_date_at(
    priority: Priority,
    workload: &HashMap<NaiveDate, u32>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let offset_days = match priority {
        Priority::Critical => 1,
        Priority::High => 3,
        Priority::Medium => 7,
        Priority::Low => 14,
    };
    let base = now + Duration::days(offset_days);
    (0..SUGGESTION_WINDOW_DAYS)
        .map(|i| base + Duration::days(i))
        .find(|candidate| {
            workload
                .get(&candidate.date_naive())
                .map_or(true, |count| *count < MAX_TODOS_PER_DAY)
        })
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{TodoDescription, TodoTitle};
    use crate::persistence::memory::InMemoryTodoRepository;

    fn service() -> (TodoService, Arc<InMemoryTodoRepository>) {
        let repo = Arc::new(InMemoryTodoRepository::new());
        (TodoService::new(repo.clone(), repo.clone()), repo)
    }

    async fn seed(repo: &InMemoryTodoRepository, user_id: i64, due: Option<DateTime<Utc>>) -> Todo {
        let mut todo = Todo::new(
            user_id,
            TodoTitle::new("Seeded todo").unwrap(),
            TodoDescription::default(),
            Priority::Medium,
            None,
        )
        .unwrap();
        todo.force_due_date(due);
        repo.save(todo).await.unwrap()
    }

    #[test]
    fn test_suggest_due_date_offsets() {
        let now = Utc::now();
        let empty = HashMap::new();
        assert_eq!(
            suggest_due_date_at(Priority::Critical, &empty, now),
            now + Duration::days(1)
        );
        assert_eq!(
            suggest_due_date_at(Priority::High, &empty, now),
            now + Duration::days(3)
        );
        assert_eq!(
            suggest_due_date_at(Priority::Medium, &empty, now),
            now + Duration::days(7)
        );
        assert_eq!(
            suggest_due_date_at(Priority::Low, &empty, now),
            now + Duration::days(14)
        );
    }

    #[test]
    fn test_suggest_due_date_skips_full_days() {
        let now = Utc::now();
        let base = now + Duration::days(3);
        let mut workload = HashMap::new();
        workload.insert(base.date_naive(), 3);
        workload.insert((base + Duration::days(1)).date_naive(), 5);
        workload.insert((base + Duration::days(2)).date_naive(), 2);
        assert_eq!(
            suggest_due_date_at(Priority::High, &workload, now),
            base + Duration::days(2)
        );
    }

    #[test]
    fn test_suggest_due_date_falls_back_to_base() {
        let now = Utc::now();
        let base = now + Duration::days(1);
        let workload = (0..7)
            .map(|i| ((base + Duration::days(i)).date_naive(), 3))
            .collect();
        assert_eq!(suggest_due_date_at(Priority::Critical, &workload, now), base);
    }

    #[actix_rt::test]
    async fn test_ownership() {
        let (service, repo) = service();
        let todo = seed(&repo, 1, None).await;

        assert_eq!(service.validate_user_ownership(todo.id(), 1).await.unwrap().id(), todo.id());
        assert!(matches!(
            service.validate_user_ownership(todo.id(), 2).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            service.validate_user_ownership(999, 1).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test_log::test(actix_rt::test)]
    async fn test_mark_overdue_as_in_progress() {
        let (service, repo) = service();
        let yesterday = Utc::now() - Duration::days(1);
        for _ in 0..3 {
            seed(&repo, 7, Some(yesterday)).await;
        }
        seed(&repo, 7, Some(Utc::now() + Duration::days(2))).await;
        seed(&repo, 8, Some(yesterday)).await;

        let moved = service
            .mark_overdue_as_in_progress(&CancellationToken::new(), 7)
            .await
            .unwrap();
        assert_eq!(moved, 3);

        let options = QueryOptions::default();
        let pending = repo
            .find_by_user_and_status(7, TodoStatus::Pending, &options)
            .await
            .unwrap();
        let started = repo
            .find_by_user_and_status(7, TodoStatus::InProgress, &options)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(started.len(), 3);
    }

    #[actix_rt::test]
    async fn test_auto_cancel_old_pending() {
        let (service, repo) = service();
        seed(&repo, 7, Some(Utc::now() - Duration::days(40))).await;
        seed(&repo, 7, Some(Utc::now() - Duration::days(2))).await;

        let cancelled = service
            .auto_cancel_old_pending_todos(&CancellationToken::new(), 7, Duration::days(30))
            .await
            .unwrap();
        assert_eq!(cancelled, 1);
    }

    #[test_log::test(actix_rt::test)]
    async fn test_cancelled_sweep_stops() {
        let (service, repo) = service();
        seed(&repo, 7, Some(Utc::now() - Duration::days(1))).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            service.mark_overdue_as_in_progress(&cancel, 7).await,
            Err(DomainError::Cancelled)
        ));
    }

    #[actix_rt::test]
    async fn test_productivity_rejects_out_of_range_periods() {
        let (service, _) = service();
        assert!(service.get_user_productivity(1, 0).await.is_err());
        assert!(service
            .get_user_productivity(1, 1_000_000_000_000_000)
            .await
            .is_err());
        assert!(service.get_user_productivity(1, 36500).await.is_ok());
    }
}
