use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::{Role, User, UserStatus};
use crate::domain::errors::{DomainError, DomainResult, RepoResultExt};
use crate::domain::query::window_days;
use crate::domain::repositories::{UserQueryRepository, UserRepository};
use crate::domain::value_objects::MIN_PASSWORD_LENGTH;

/// Characters that satisfy the "special character" rule of the password
/// policy.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()-_=+[]{}|;:'\",.<>/?`~\\";

/// Passwords older than this must be rotated.
pub const PASSWORD_MAX_AGE_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadTodos,
    WriteTodos,
    DeleteTodos,
    ReadProfile,
    WriteProfile,
    ViewStatistics,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ReadTodos,
        Permission::WriteTodos,
        Permission::DeleteTodos,
        Permission::ReadProfile,
        Permission::WriteProfile,
        Permission::ViewStatistics,
        Permission::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadTodos => "read_todos",
            Permission::WriteTodos => "write_todos",
            Permission::DeleteTodos => "delete_todos",
            Permission::ReadProfile => "read_profile",
            Permission::WriteProfile => "write_profile",
            Permission::ViewStatistics => "view_statistics",
            Permission::ManageUsers => "manage_users",
        }
    }
}

/// Permissions granted to a role. Admins hold every permission.
pub fn role_grants(role: Role, permission: Permission) -> bool {
    match role {
        Role::Admin => true,
        Role::User => matches!(permission, Permission::ReadTodos | Permission::ReadProfile),
    }
}

/// Thresholds for [`UserSecurityService::block_suspicious_users`].
#[derive(Debug, Clone, Copy)]
pub struct SuspiciousActivityCriteria {
    pub failed_login_attempts: u32,
    pub time_window: Duration,
}

impl Default for SuspiciousActivityCriteria {
    fn default() -> Self {
        Self {
            failed_login_attempts: 5,
            time_window: Duration::hours(1),
        }
    }
}

#[derive(Clone)]
pub struct UserSecurityService {
    users: Arc<dyn UserRepository>,
    queries: Arc<dyn UserQueryRepository>,
}

impl UserSecurityService {
    pub fn new(users: Arc<dyn UserRepository>, queries: Arc<dyn UserQueryRepository>) -> Self {
        Self { users, queries }
    }

    pub async fn validate_user_permission(
        &self,
        user_id: i64,
        permission: Permission,
    ) -> DomainResult<User> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .or_not_found("user", user_id)?;
        if !user.can_act() {
            return Err(DomainError::UserNotActive);
        }
        if !role_grants(user.role(), permission) {
            return Err(DomainError::Forbidden(format!(
                "role {} lacks permission {}",
                user.role(),
                permission.as_str()
            )));
        }
        Ok(user)
    }

    /// Deactivates active users idle for more than `inactive_days`.
    pub async fn deactivate_inactive_users(
        &self,
        cancel: &CancellationToken,
        inactive_days: i64,
        limit: usize,
    ) -> DomainResult<u64> {
        if inactive_days <= 0 {
            return Err(DomainError::validation(
                "inactive_days",
                "inactive_days must be positive",
            ));
        }
        window_days("inactive_days", inactive_days)?;
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        let candidates = self.queries.find_inactive_users(inactive_days, limit).await?;
        let total = candidates.len();
        let mut done = 0u64;
        for mut user in candidates {
            if cancel.is_cancelled() {
                warn!("deactivation sweep cancelled after {} of {} users", done, total);
                return Err(DomainError::Cancelled);
            }
            let id = user.id();
            user.deactivate();
            match self.users.save(user).await {
                Ok(_) => done += 1,
                Err(e) => warn!("failed to deactivate user {}: {}", id, e),
            }
        }
        info!("deactivated {} of {} inactive users", done, total);
        Ok(done)
    }

    /// Blocks active users with too many recent failed logins. Returns the
    /// ids that were blocked.
    pub async fn block_suspicious_users(
        &self,
        cancel: &CancellationToken,
        criteria: SuspiciousActivityCriteria,
        limit: usize,
    ) -> DomainResult<Vec<i64>> {
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        let now = Utc::now();
        let window_start = now - criteria.time_window;
        let candidates = self.queries.find_by_status(UserStatus::Active, limit).await?;
        let mut blocked = Vec::new();
        for mut user in candidates {
            if cancel.is_cancelled() {
                warn!("block sweep cancelled after {} users", blocked.len());
                return Err(DomainError::Cancelled);
            }
            if !is_suspicious(&user, &criteria, window_start) {
                continue;
            }
            let id = user.id();
            user.block();
            match self.users.save(user).await {
                Ok(_) => blocked.push(id),
                Err(e) => warn!("failed to block user {}: {}", id, e),
            }
        }
        info!("blocked {} suspicious users", blocked.len());
        Ok(blocked)
    }

    pub fn enforce_password_policy(&self, password: &str) -> DomainResult<()> {
        enforce_password_policy(password)
    }

    pub fn should_force_password_change(&self, user: &User) -> bool {
        should_force_password_change_at(user, Utc::now())
    }
}

fn is_suspicious(
    user: &User,
    criteria: &SuspiciousActivityCriteria,
    window_start: DateTime<Utc>,
) -> bool {
    user.failed_login_attempts() >= criteria.failed_login_attempts
        && matches!(user.last_login_attempt_at(), Some(at) if at >= window_start)
}

/// Length first, then character classes.
pub fn enforce_password_policy(password: &str) -> DomainResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DomainError::PolicyViolation {
            code: "PASSWORD_TOO_SHORT",
            message: format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ),
        });
    }
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARACTERS.contains(c));
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(DomainError::PolicyViolation {
            code: "PASSWORD_TOO_WEAK",
            message: "password must contain upper and lower case letters, a digit and a special character"
                .to_string(),
        });
    }
    Ok(())
}

pub fn should_force_password_change_at(user: &User, now: DateTime<Utc>) -> bool {
    now - user.updated_at() > Duration::days(PASSWORD_MAX_AGE_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UserParts;
    use crate::domain::value_objects::Password;
    use crate::persistence::memory::InMemoryUserRepository;

    fn service() -> (UserSecurityService, Arc<InMemoryUserRepository>) {
        let repo = Arc::new(InMemoryUserRepository::new());
        (UserSecurityService::new(repo.clone(), repo.clone()), repo)
    }

    fn parts(person_id: i64, username: &str) -> UserParts {
        let now = Utc::now();
        UserParts {
            id: 0,
            person_id,
            username: username.to_string(),
            password: Password::from_hash("$2b$04$placeholder"),
            status: UserStatus::Active,
            role: Role::User,
            failed_login_attempts: 0,
            last_login_attempt_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_policy() {
        let err = enforce_password_policy("short").unwrap_err();
        assert_eq!(err.code(), "PASSWORD_TOO_SHORT");
        let err = enforce_password_policy("alllowercase1!").unwrap_err();
        assert_eq!(err.code(), "PASSWORD_TOO_WEAK");
        assert_eq!(
            enforce_password_policy("NoDigits!!").unwrap_err().code(),
            "PASSWORD_TOO_WEAK"
        );
        assert!(enforce_password_policy("S3cure!Pw").is_ok());
        assert!(enforce_password_policy("N3w!Passw").is_ok());
    }

    #[test]
    fn test_role_permissions() {
        for permission in Permission::ALL {
            assert!(role_grants(Role::Admin, permission));
        }
        assert!(role_grants(Role::User, Permission::ReadTodos));
        assert!(!role_grants(Role::User, Permission::ManageUsers));
        assert!(!role_grants(Role::User, Permission::DeleteTodos));
    }

    #[test]
    fn test_force_password_change_after_ninety_days() {
        let mut parts = parts(1, "alice");
        parts.updated_at = Utc::now() - Duration::days(91);
        let user = User::restore(parts.clone());
        assert!(should_force_password_change_at(&user, Utc::now()));

        parts.updated_at = Utc::now() - Duration::days(10);
        let user = User::restore(parts);
        assert!(!should_force_password_change_at(&user, Utc::now()));
    }

    #[actix_rt::test]
    async fn test_validate_permission() {
        let (service, repo) = service();
        let user = repo.save(User::restore(parts(1, "alice"))).await.unwrap();
        let mut admin_parts = parts(2, "root");
        admin_parts.role = Role::Admin;
        let admin = repo.save(User::restore(admin_parts)).await.unwrap();

        assert!(service
            .validate_user_permission(admin.id(), Permission::ManageUsers)
            .await
            .is_ok());
        assert!(matches!(
            service
                .validate_user_permission(user.id(), Permission::ManageUsers)
                .await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[actix_rt::test]
    async fn test_deactivate_inactive_users() {
        let (service, repo) = service();
        let mut stale = parts(1, "stale");
        stale.last_login_at = Some(Utc::now() - Duration::days(120));
        repo.save(User::restore(stale)).await.unwrap();
        let mut fresh = parts(2, "fresh");
        fresh.last_login_at = Some(Utc::now() - Duration::days(1));
        repo.save(User::restore(fresh)).await.unwrap();
        let mut never = parts(3, "never");
        never.created_at = Utc::now() - Duration::days(60);
        repo.save(User::restore(never)).await.unwrap();
        repo.save(User::restore(parts(4, "newcomer"))).await.unwrap();

        let count = service
            .deactivate_inactive_users(&CancellationToken::new(), 30, 100)
            .await
            .unwrap();
        assert_eq!(count, 2);
        let fresh = repo.find_by_username("fresh").await.unwrap();
        assert_eq!(fresh.status(), UserStatus::Active);
        let stale = repo.find_by_username("stale").await.unwrap();
        assert_eq!(stale.status(), UserStatus::Inactive);
        let newcomer = repo.find_by_username("newcomer").await.unwrap();
        assert_eq!(newcomer.status(), UserStatus::Active);

        let err = service
            .deactivate_inactive_users(&CancellationToken::new(), 1_000_000_000_000_000, 100)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Validation);
    }

    #[test_log::test(actix_rt::test)]
    async fn test_block_suspicious_users() {
        let (service, repo) = service();
        let mut attacker = parts(1, "attacker");
        attacker.failed_login_attempts = 6;
        attacker.last_login_attempt_at = Some(Utc::now() - Duration::minutes(5));
        let attacker = repo.save(User::restore(attacker)).await.unwrap();

        let mut old = parts(2, "forgetful");
        old.failed_login_attempts = 9;
        old.last_login_attempt_at = Some(Utc::now() - Duration::days(3));
        repo.save(User::restore(old)).await.unwrap();

        let blocked = service
            .block_suspicious_users(
                &CancellationToken::new(),
                SuspiciousActivityCriteria::default(),
                100,
            )
            .await
            .unwrap();
        assert_eq!(blocked, vec![attacker.id()]);
        let attacker = repo.find_by_id(attacker.id()).await.unwrap();
        assert_eq!(attacker.status(), UserStatus::Blocked);
    }
}
