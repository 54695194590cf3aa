//! Persistence ports.
//!
//! The core depends only on these traits. Adapters live in
//! [`crate::persistence`]. `save` inserts when the entity id is `0` and
//! returns the stored entity with its assigned id; otherwise it updates.
//! Lookups by id report a miss as [`RepositoryError::NotFound`].
//!
//! [`RepositoryError::NotFound`]: crate::domain::errors::RepositoryError::NotFound

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::entities::{Person, Role, Todo, User, UserStatus};
use crate::domain::errors::RepoResult;
use crate::domain::query::{Filter, FilterValue, QueryOptions, TodoCriteria, TodoField, UserField};
use crate::domain::statistics::{day_bounds, TagCount, TodoStatistics};
use crate::domain::value_objects::{Email, TaxId, TodoStatus};

/// Writes and key lookups for users. Usernames are unique and a person
/// owns at most one user; violations surface as `DuplicateEntry`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save(&self, user: User) -> RepoResult<User>;

    async fn delete(&self, id: i64) -> RepoResult<()>;

    async fn find_by_id(&self, id: i64) -> RepoResult<User>;

    async fn find_by_username(&self, username: &str) -> RepoResult<User>;

    async fn find_by_person_id(&self, person_id: i64) -> RepoResult<User>;

    async fn exists_by_username(&self, username: &str) -> RepoResult<bool>;

    async fn exists_by_person_id(&self, person_id: i64) -> RepoResult<bool>;
}

/// Read-side queries over users.
#[async_trait]
pub trait UserQueryRepository: Send + Sync {
    async fn find_all(&self, options: &QueryOptions<UserField>) -> RepoResult<Vec<User>>;

    async fn find_by_status(&self, status: UserStatus, limit: usize) -> RepoResult<Vec<User>>;

    async fn find_by_role(&self, role: Role, limit: usize) -> RepoResult<Vec<User>>;

    /// Active users whose last login, or creation when they never logged
    /// in, lies more than `days` days in the past.
    async fn find_inactive_users(&self, days: i64, limit: usize) -> RepoResult<Vec<User>>;

    async fn count(&self) -> RepoResult<u64>;

    async fn count_by_status(&self) -> RepoResult<BTreeMap<String, u64>>;

    async fn count_by_role(&self) -> RepoResult<BTreeMap<String, u64>>;
}

/// Email and tax id are unique across people.
#[async_trait]
pub trait PersonRepository: Send + Sync {
    async fn save(&self, person: Person) -> RepoResult<Person>;

    async fn delete(&self, id: i64) -> RepoResult<()>;

    async fn find_by_id(&self, id: i64) -> RepoResult<Person>;

    async fn find_by_email(&self, email: &Email) -> RepoResult<Person>;

    async fn exists_by_tax_id(&self, tax_id: &TaxId) -> RepoResult<bool>;
}

#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn save(&self, todo: Todo) -> RepoResult<Todo>;

    async fn delete(&self, id: i64) -> RepoResult<()>;

    async fn find_by_id(&self, id: i64) -> RepoResult<Todo>;

    /// Every todo owned by `user_id`, newest first.
    async fn find_by_user_id(&self, user_id: i64) -> RepoResult<Vec<Todo>>;

    /// Returns the number of removed todos.
    async fn delete_by_user_id(&self, user_id: i64) -> RepoResult<u64>;
}

/// Filtering, search and aggregation over todos. All list operations honour
/// the ordering in their options and default to newest first.
///
/// Adapters implement the criteria query and the aggregates; the
/// convenience lookups are expressed as criteria.
#[async_trait]
pub trait TodoQueryRepository: Send + Sync {
    async fn find_by_filters(
        &self,
        criteria: &TodoCriteria,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>>;

    async fn count(&self, criteria: &TodoCriteria) -> RepoResult<u64>;

    /// Counts keyed by every status, zeros included.
    async fn count_by_status(&self, user_id: i64) -> RepoResult<BTreeMap<String, u64>>;

    /// Counts keyed by every priority, zeros included.
    async fn count_by_priority(&self, user_id: i64) -> RepoResult<BTreeMap<String, u64>>;

    /// Most used tags, by count then name.
    async fn get_popular_tags(&self, user_id: i64, limit: usize) -> RepoResult<Vec<TagCount>>;

    async fn get_statistics(&self, user_id: i64) -> RepoResult<TodoStatistics>;

    async fn find_overdue(&self, user_id: i64, options: &QueryOptions) -> RepoResult<Vec<Todo>> {
        let criteria = TodoCriteria::for_user(user_id).overdue(true);
        self.find_by_filters(&criteria, options).await
    }

    /// Todos of any status due during the current UTC day.
    async fn find_due_today(&self, user_id: i64, options: &QueryOptions) -> RepoResult<Vec<Todo>> {
        let (start, end) = day_bounds(Utc::now());
        let criteria = TodoCriteria::for_user(user_id).due_between(Some(start), Some(end));
        self.find_by_filters(&criteria, options).await
    }

    /// Due dates in `[start, end]`.
    async fn find_due_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>> {
        let criteria = TodoCriteria::for_user(user_id).with_condition(Filter::Between(
            TodoField::DueDate,
            FilterValue::Timestamp(start),
            FilterValue::Timestamp(end),
        ));
        self.find_by_filters(&criteria, options).await
    }

    async fn find_by_tag(
        &self,
        user_id: i64,
        tag: &str,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>> {
        let criteria = TodoCriteria::for_user(user_id).with_tag(tag.trim());
        self.find_by_filters(&criteria, options).await
    }

    /// Todos carrying every one of `tags`.
    async fn find_by_tags(
        &self,
        user_id: i64,
        tags: &[String],
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>> {
        let mut criteria = TodoCriteria::for_user(user_id);
        criteria.tags = tags.iter().map(|t| t.trim().to_string()).collect();
        self.find_by_filters(&criteria, options).await
    }

    async fn find_by_user_and_status(
        &self,
        user_id: i64,
        status: TodoStatus,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>> {
        let criteria = TodoCriteria::for_user(user_id).with_status(status);
        self.find_by_filters(&criteria, options).await
    }

    /// Case-insensitive substring match over title and description.
    async fn search(
        &self,
        user_id: i64,
        term: &str,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Todo>> {
        let criteria = TodoCriteria::for_user(user_id).search(term);
        self.find_by_filters(&criteria, options).await
    }
}
