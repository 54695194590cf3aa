use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use std::convert::TryFrom;

use super::query::{push_order, push_page, push_where, TODO_COLUMNS};
use crate::domain::entities::{Todo, TodoParts};
use crate::domain::errors::{RepoResult, RepositoryError};
use crate::domain::query::{QueryOptions, TodoCriteria};
use crate::domain::repositories::{TodoQueryRepository, TodoRepository};
use crate::domain::statistics::{
    completion_rate, day_bounds, empty_priority_counts, empty_status_counts, week_bounds,
    TagCount, TodoStatistics,
};
use crate::domain::value_objects::{Priority, TodoDescription, TodoStatus, TodoTitle};

#[derive(Debug, FromRow)]
struct TodoRow {
    id: i64,
    user_id: i64,
    title: String,
    description: String,
    status: TodoStatus,
    priority: i16,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TodoRow> for Todo {
    type Error = RepositoryError;

    fn try_from(row: TodoRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::domain::DomainError| {
            RepositoryError::Other(format!("todo {} is corrupt: {}", row.id, e))
        };
        Ok(Todo::restore(TodoParts {
            id: row.id,
            user_id: row.user_id,
            title: TodoTitle::new(&row.title).map_err(corrupt)?,
            description: TodoDescription::new(&row.description).map_err(corrupt)?,
            status: row.status,
            priority: Priority::from_level(i64::from(row.priority)).map_err(corrupt)?,
            due_date: row.due_date,
            completed_at: row.completed_at,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

fn into_todos(rows: Vec<TodoRow>) -> RepoResult<Vec<Todo>> {
    rows.into_iter().map(Todo::try_from).collect()
}

#[derive(Debug, FromRow)]
struct StatisticsRow {
    total: i64,
    completed: i64,
    overdue: i64,
    due_today: i64,
    due_this_week: i64,
    completed_today: i64,
}

#[derive(Debug, Clone)]
pub struct PgTodoRepository {
    pool: PgPool,
}

impl PgTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn grouped_counts(&self, column: &str, user_id: i64) -> RepoResult<Vec<(String, i64)>> {
        let sql = format!(
            "SELECT {col}::text, COUNT(*) FROM todos WHERE user_id = $1 GROUP BY {col}",
            col = column
        );
        Ok(sqlx::query_as::<_, (String, i64)>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl TodoRepository for PgTodoRepository {
    async fn save(&self, todo: Todo) -> RepoResult<Todo> {
        let row = if todo.id() == 0 {
            sqlx::query_as::<_, TodoRow>(&format!(
                "INSERT INTO todos (user_id, title, description, status, priority, due_date, \
                 completed_at, tags, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
                TODO_COLUMNS
            ))
            .bind(todo.user_id())
            .bind(todo.title().as_str())
            .bind(todo.description().as_str())
            .bind(todo.status())
            .bind(todo.priority().level())
            .bind(todo.due_date())
            .bind(todo.completed_at())
            .bind(todo.tags())
            .bind(todo.created_at())
            .bind(todo.updated_at())
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, TodoRow>(&format!(
                "UPDATE todos SET title = $1, description = $2, status = $3, priority = $4, \
                 due_date = $5, completed_at = $6, tags = $7, updated_at = $8 \
                 WHERE id = $9 RETURNING {}",
                TODO_COLUMNS
            ))
            .bind(todo.title().as_str())
            .bind(todo.description().as_str())
            .bind(todo.status())
            .bind(todo.priority().level())
            .bind(todo.due_date())
            .bind(todo.completed_at())
            .bind(todo.tags())
            .bind(todo.updated_at())
            .bind(todo.id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("todo {}", todo.id())))?
        };
        Todo::try_from(row)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("todo {}", id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Todo> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            "SELECT {} FROM todos WHERE id = $1",
            TODO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("todo {}", id)))?;
        Todo::try_from(row)
    }

    async fn find_by_user_id(&self, user_id: i64) -> RepoResult<Vec<Todo>> {
        let rows = sqlx::query_as::<_, TodoRow>(&format!(
            "SELECT {} FROM todos WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            TODO_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_todos(rows)
    }

    async fn delete_by_user_id(&self, user_id: i64) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM todos WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TodoQueryRepository for PgTodoRepository {
    async fn find_by_filters(
        &self,
        criteria: &TodoCriteria,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM todos", TODO_COLUMNS));
        push_where(&mut qb, criteria, Utc::now());
        push_order(&mut qb, options);
        push_page(&mut qb, options);
        let rows = qb
            .build_query_as::<TodoRow>()
            .fetch_all(&self.pool)
            .await?;
        into_todos(rows)
    }

    async fn count(&self, criteria: &TodoCriteria) -> RepoResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM todos");
        push_where(&mut qb, criteria, Utc::now());
        let (count,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn count_by_status(&self, user_id: i64) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts = empty_status_counts();
        for (status, count) in self.grouped_counts("status", user_id).await? {
            counts.insert(status, count as u64);
        }
        Ok(counts)
    }

    async fn count_by_priority(&self, user_id: i64) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts = empty_priority_counts();
        for (level, count) in self.grouped_counts("priority", user_id).await? {
            let priority = level
                .parse::<i64>()
                .ok()
                .and_then(|l| Priority::from_level(l).ok())
                .ok_or_else(|| RepositoryError::Other(format!("unknown priority {}", level)))?;
            counts.insert(priority.as_str().to_string(), count as u64);
        }
        Ok(counts)
    }

    async fn get_popular_tags(&self, user_id: i64, limit: usize) -> RepoResult<Vec<TagCount>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT tag, COUNT(*) AS uses FROM todos, unnest(tags) AS tag \
             WHERE user_id = $1 GROUP BY tag ORDER BY uses DESC, tag ASC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag,
                count: count as u64,
            })
            .collect())
    }

    async fn get_statistics(&self, user_id: i64) -> RepoResult<TodoStatistics> {
        let now = Utc::now();
        let (today_start, today_end) = day_bounds(now);
        let (week_start, week_end) = week_bounds(now);
        let row = sqlx::query_as::<_, StatisticsRow>(
            "SELECT COUNT(*) AS total, \
             COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
             COUNT(*) FILTER (WHERE due_date < $2 \
                 AND status IN ('pending', 'in_progress')) AS overdue, \
             COUNT(*) FILTER (WHERE due_date >= $3 AND due_date < $4) AS due_today, \
             COUNT(*) FILTER (WHERE due_date >= $5 AND due_date < $6) AS due_this_week, \
             COUNT(*) FILTER (WHERE completed_at >= $3 AND completed_at < $4) AS completed_today \
             FROM todos WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(now)
        .bind(today_start)
        .bind(today_end)
        .bind(week_start)
        .bind(week_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(TodoStatistics {
            total: row.total as u64,
            by_status: self.count_by_status(user_id).await?,
            by_priority: self.count_by_priority(user_id).await?,
            overdue: row.overdue as u64,
            due_today: row.due_today as u64,
            due_this_week: row.due_this_week as u64,
            completed_today: row.completed_today as u64,
            completion_rate: completion_rate(row.completed as u64, row.total as u64),
        })
    }
}
