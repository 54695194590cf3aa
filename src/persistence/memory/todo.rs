use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use super::filter::{sort_todos, TodoMatcher};
use crate::domain::entities::Todo;
use crate::domain::errors::{RepoResult, RepositoryError};
use crate::domain::query::{QueryOptions, TodoCriteria};
use crate::domain::repositories::{TodoQueryRepository, TodoRepository};
use crate::domain::statistics::{
    empty_priority_counts, empty_status_counts, popular_tags, TagCount, TodoStatistics,
};

/// Todos held in process memory. Implements both the write and the query
/// port over the same map.
#[derive(Debug)]
pub struct InMemoryTodoRepository {
    todos: RwLock<BTreeMap<i64, Todo>>,
    next_id: AtomicI64,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self {
            todos: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.todos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.read().is_empty()
    }

    fn owned_by(&self, user_id: i64) -> Vec<Todo> {
        self.todos
            .read()
            .values()
            .filter(|t| t.user_id() == user_id)
            .cloned()
            .collect()
    }

    fn select(&self, criteria: &TodoCriteria) -> RepoResult<Vec<Todo>> {
        let matcher = TodoMatcher::new(criteria, Utc::now())?;
        Ok(self
            .todos
            .read()
            .values()
            .filter(|t| matcher.matches(t))
            .cloned()
            .collect())
    }
}

impl Default for InMemoryTodoRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn save(&self, todo: Todo) -> RepoResult<Todo> {
        let mut todos = self.todos.write();
        let todo = if todo.id() == 0 {
            todo.with_id(self.next_id.fetch_add(1, Ordering::SeqCst))
        } else if todos.contains_key(&todo.id()) {
            todo
        } else {
            return Err(RepositoryError::NotFound(format!("todo {}", todo.id())));
        };
        todos.insert(todo.id(), todo.clone());
        Ok(todo)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        self.todos
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("todo {}", id)))
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Todo> {
        self.todos
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("todo {}", id)))
    }

    async fn find_by_user_id(&self, user_id: i64) -> RepoResult<Vec<Todo>> {
        let mut todos = self.owned_by(user_id);
        sort_todos(&mut todos, &QueryOptions::default().effective_sort());
        Ok(todos)
    }

    async fn delete_by_user_id(&self, user_id: i64) -> RepoResult<u64> {
        let mut todos = self.todos.write();
        let before = todos.len();
        todos.retain(|_, t| t.user_id() != user_id);
        Ok((before - todos.len()) as u64)
    }
}

#[async_trait]
impl TodoQueryRepository for InMemoryTodoRepository {
    async fn find_by_filters(
        &self,
        criteria: &TodoCriteria,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>> {
        let mut todos = self.select(criteria)?;
        sort_todos(&mut todos, &options.effective_sort());
        let page = todos
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(page)
    }

    async fn count(&self, criteria: &TodoCriteria) -> RepoResult<u64> {
        Ok(self.select(criteria)?.len() as u64)
    }

    async fn count_by_status(&self, user_id: i64) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts = empty_status_counts();
        for todo in self.owned_by(user_id) {
            *counts.entry(todo.status().as_str().to_string()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn count_by_priority(&self, user_id: i64) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts = empty_priority_counts();
        for todo in self.owned_by(user_id) {
            *counts
                .entry(todo.priority().as_str().to_string())
                .or_default() += 1;
        }
        Ok(counts)
    }

    async fn get_popular_tags(&self, user_id: i64, limit: usize) -> RepoResult<Vec<TagCount>> {
        Ok(popular_tags(&self.owned_by(user_id), limit))
    }

    async fn get_statistics(&self, user_id: i64) -> RepoResult<TodoStatistics> {
        Ok(TodoStatistics::compute(&self.owned_by(user_id), Utc::now()))
    }
}
