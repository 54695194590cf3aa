use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::BTreeMap;

use super::query::{push_order, push_page};
use crate::domain::entities::{Role, User, UserParts, UserStatus};
use crate::domain::errors::{RepoResult, RepositoryError};
use crate::domain::query::{inactivity_cutoff, QueryOptions, UserField};
use crate::domain::repositories::{UserQueryRepository, UserRepository};
use crate::domain::value_objects::Password;

const USER_COLUMNS: &str = "id, person_id, username, password_hash, status, role, \
     failed_login_attempts, last_login_attempt_at, last_login_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    person_id: i64,
    username: String,
    password_hash: String,
    status: UserStatus,
    role: Role,
    failed_login_attempts: i32,
    last_login_attempt_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::restore(UserParts {
            id: row.id,
            person_id: row.person_id,
            username: row.username,
            password: Password::from_hash(row.password_hash),
            status: row.status,
            role: row.role,
            failed_login_attempts: row.failed_login_attempts.max(0) as u32,
            last_login_attempt_at: row.last_login_attempt_at,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, clause: &str, value: i64) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, clause
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn grouped_counts(&self, column: &str) -> RepoResult<Vec<(String, i64)>> {
        let sql = format!(
            "SELECT {col}::text, COUNT(*) FROM users GROUP BY {col}",
            col = column
        );
        Ok(sqlx::query_as::<_, (String, i64)>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn save(&self, user: User) -> RepoResult<User> {
        let row = if user.id() == 0 {
            sqlx::query_as::<_, UserRow>(&format!(
                "INSERT INTO users (person_id, username, password_hash, status, role, \
                 failed_login_attempts, last_login_attempt_at, last_login_at, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
                USER_COLUMNS
            ))
            .bind(user.person_id())
            .bind(user.username())
            .bind(user.password().hash())
            .bind(user.status())
            .bind(user.role())
            .bind(user.failed_login_attempts() as i32)
            .bind(user.last_login_attempt_at())
            .bind(user.last_login_at())
            .bind(user.created_at())
            .bind(user.updated_at())
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, UserRow>(&format!(
                "UPDATE users SET username = $1, password_hash = $2, status = $3, role = $4, \
                 failed_login_attempts = $5, last_login_attempt_at = $6, last_login_at = $7, \
                 updated_at = $8 WHERE id = $9 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(user.username())
            .bind(user.password().hash())
            .bind(user.status())
            .bind(user.role())
            .bind(user.failed_login_attempts() as i32)
            .bind(user.last_login_attempt_at())
            .bind(user.last_login_at())
            .bind(user.updated_at())
            .bind(user.id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user.id())))?
        };
        Ok(User::from(row))
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<User> {
        self.find_one("id", id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("user '{}'", username)))?;
        Ok(User::from(row))
    }

    async fn find_by_person_id(&self, person_id: i64) -> RepoResult<User> {
        self.find_one("person_id", person_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("user for person {}", person_id)))
    }

    async fn exists_by_username(&self, username: &str) -> RepoResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn exists_by_person_id(&self, person_id: i64) -> RepoResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE person_id = $1)")
                .bind(person_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl UserQueryRepository for PgUserRepository {
    async fn find_all(&self, options: &QueryOptions<UserField>) -> RepoResult<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_order(&mut qb, options);
        push_page(&mut qb, options);
        let rows = qb.build_query_as::<UserRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_by_status(&self, status: UserStatus, limit: usize) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE status = $1 ORDER BY id LIMIT $2",
            USER_COLUMNS
        ))
        .bind(status)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_by_role(&self, role: Role, limit: usize) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY id LIMIT $2",
            USER_COLUMNS
        ))
        .bind(role)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_inactive_users(&self, days: i64, limit: usize) -> RepoResult<Vec<User>> {
        let cutoff = inactivity_cutoff(days);
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE status = $1 \
             AND COALESCE(last_login_at, created_at) < $2 ORDER BY id LIMIT $3",
            USER_COLUMNS
        ))
        .bind(UserStatus::Active)
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn count(&self) -> RepoResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_by_status(&self) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts: BTreeMap<String, u64> = UserStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in self.grouped_counts("status").await? {
            counts.insert(status, count as u64);
        }
        Ok(counts)
    }

    async fn count_by_role(&self) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts: BTreeMap<String, u64> = Role::ALL
            .iter()
            .map(|r| (r.as_str().to_string(), 0))
            .collect();
        for (role, count) in self.grouped_counts("role").await? {
            counts.insert(role, count as u64);
        }
        Ok(counts)
    }
}
