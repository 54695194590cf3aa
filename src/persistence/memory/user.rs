use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use crate::domain::entities::{Role, User, UserStatus};
use crate::domain::errors::{RepoResult, RepositoryError};
use crate::domain::query::{inactivity_cutoff, QueryOptions, SortDirection, UserField};
use crate::domain::repositories::{UserQueryRepository, UserRepository};

#[derive(Debug)]
pub struct InMemoryUserRepository {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn find_where(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users.read().values().find(|u| predicate(u)).cloned()
    }

    fn select(&self, predicate: impl Fn(&User) -> bool, limit: usize) -> Vec<User> {
        self.users
            .read()
            .values()
            .filter(|u| predicate(u))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn compare_users(a: &User, b: &User, field: UserField) -> Ordering {
    match field {
        UserField::Id => a.id().cmp(&b.id()),
        UserField::Username => a.username().cmp(b.username()),
        UserField::Status => a.status().cmp(&b.status()),
        UserField::Role => a.role().cmp(&b.role()),
        UserField::LastLoginAt => match (a.last_login_at(), b.last_login_at()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => x.cmp(&y),
        },
        UserField::CreatedAt => a.created_at().cmp(&b.created_at()),
        UserField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save(&self, user: User) -> RepoResult<User> {
        let mut users = self.users.write();
        let clash = users.values().find(|existing| {
            existing.id() != user.id()
                && (existing.username() == user.username()
                    || existing.person_id() == user.person_id())
        });
        if let Some(existing) = clash {
            let constraint = if existing.username() == user.username() {
                "users_username_key"
            } else {
                "users_person_id_key"
            };
            return Err(RepositoryError::DuplicateEntry(constraint.to_string()));
        }

        let user = if user.id() == 0 {
            user.with_id(self.next_id.fetch_add(1, AtomicOrdering::SeqCst))
        } else if users.contains_key(&user.id()) {
            user
        } else {
            return Err(RepositoryError::NotFound(format!("user {}", user.id())));
        };
        users.insert(user.id(), user.clone());
        Ok(user)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        self.users
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<User> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<User> {
        self.find_where(|u| u.username() == username)
            .ok_or_else(|| RepositoryError::NotFound(format!("user '{}'", username)))
    }

    async fn find_by_person_id(&self, person_id: i64) -> RepoResult<User> {
        self.find_where(|u| u.person_id() == person_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user for person {}", person_id)))
    }

    async fn exists_by_username(&self, username: &str) -> RepoResult<bool> {
        Ok(self.find_where(|u| u.username() == username).is_some())
    }

    async fn exists_by_person_id(&self, person_id: i64) -> RepoResult<bool> {
        Ok(self.find_where(|u| u.person_id() == person_id).is_some())
    }
}

#[async_trait]
impl UserQueryRepository for InMemoryUserRepository {
    async fn find_all(&self, options: &QueryOptions<UserField>) -> RepoResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        let sort = options.effective_sort();
        users.sort_by(|a, b| {
            sort.iter()
                .map(|key| {
                    let ordering = compare_users(a, b, key.field);
                    match key.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| a.id().cmp(&b.id()))
        });
        Ok(users
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn find_by_status(&self, status: UserStatus, limit: usize) -> RepoResult<Vec<User>> {
        Ok(self.select(|u| u.status() == status, limit))
    }

    async fn find_by_role(&self, role: Role, limit: usize) -> RepoResult<Vec<User>> {
        Ok(self.select(|u| u.role() == role, limit))
    }

    async fn find_inactive_users(&self, days: i64, limit: usize) -> RepoResult<Vec<User>> {
        let cutoff = inactivity_cutoff(days);
        Ok(self.select(
            |u| {
                u.status() == UserStatus::Active
                    && u.last_login_at().unwrap_or_else(|| u.created_at()) < cutoff
            },
            limit,
        ))
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.users.read().len() as u64)
    }

    async fn count_by_status(&self) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts: BTreeMap<String, u64> = UserStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for user in self.users.read().values() {
            *counts.entry(user.status().as_str().to_string()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn count_by_role(&self) -> RepoResult<BTreeMap<String, u64>> {
        let mut counts: BTreeMap<String, u64> = Role::ALL
            .iter()
            .map(|r| (r.as_str().to_string(), 0))
            .collect();
        for user in self.users.read().values() {
            *counts.entry(user.role().as_str().to_string()).or_default() += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Password;

    fn user(person_id: i64, username: &str) -> User {
        User::new(person_id, username, Password::from_hash("$2b$04$hash")).unwrap()
    }

    #[actix_rt::test]
    async fn test_username_and_person_are_unique() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.save(user(1, "alice")).await.unwrap();
        assert_eq!(alice.id(), 1);

        assert!(matches!(
            repo.save(user(2, "alice")).await,
            Err(RepositoryError::DuplicateEntry(c)) if c == "users_username_key"
        ));
        assert!(matches!(
            repo.save(user(1, "bob")).await,
            Err(RepositoryError::DuplicateEntry(c)) if c == "users_person_id_key"
        ));

        // Updating the same user does not clash with itself.
        let mut alice = alice;
        alice.block();
        assert!(repo.save(alice).await.is_ok());
    }

    #[actix_rt::test]
    async fn test_lookups() {
        let repo = InMemoryUserRepository::new();
        repo.save(user(10, "alice")).await.unwrap();
        assert!(repo.exists_by_username("alice").await.unwrap());
        assert!(!repo.exists_by_username("bob").await.unwrap());
        assert!(repo.exists_by_person_id(10).await.unwrap());
        assert_eq!(repo.find_by_person_id(10).await.unwrap().username(), "alice");
        assert!(matches!(
            repo.find_by_username("bob").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[actix_rt::test]
    async fn test_query_side() {
        let repo = InMemoryUserRepository::new();
        let mut admin = user(1, "root");
        admin.change_role(Role::Admin);
        repo.save(admin).await.unwrap();
        let mut blocked = user(2, "mallory");
        blocked.block();
        repo.save(blocked).await.unwrap();
        repo.save(user(3, "alice")).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.count_by_status().await.unwrap()["blocked"], 1);
        assert_eq!(repo.count_by_role().await.unwrap()["admin"], 1);
        assert_eq!(repo.find_by_role(Role::Admin, 10).await.unwrap().len(), 1);
        assert_eq!(
            repo.find_by_status(UserStatus::Active, 1).await.unwrap().len(),
            1
        );

        let by_name = QueryOptions::default().order_by(UserField::Username, false);
        let names: Vec<String> = repo
            .find_all(&by_name)
            .await
            .unwrap()
            .iter()
            .map(|u| u.username().to_string())
            .collect();
        assert_eq!(names, vec!["alice", "mallory", "root"]);

        // Fresh accounts are not idle, and no account predates the earliest instant
        assert!(repo.find_inactive_users(1, 10).await.unwrap().is_empty());
        assert!(repo.find_inactive_users(i64::MAX, 10).await.unwrap().is_empty());
    }
}
