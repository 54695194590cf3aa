use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::Password;

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    pub(crate) static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Blocked,
    Pending,
}

impl UserStatus {
    pub const ALL: [UserStatus; 4] = [
        UserStatus::Active,
        UserStatus::Inactive,
        UserStatus::Blocked,
        UserStatus::Pending,
    ];

    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "blocked" => Ok(UserStatus::Blocked),
            "pending" => Ok(UserStatus::Pending),
            other => Err(DomainError::validation(
                "status",
                format!("unknown user status '{}'", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Blocked => "blocked",
            UserStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account bound one-to-one to a [`Person`](super::Person).
///
/// Only the person id is held; the person never points back.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: i64,
    person_id: i64,
    username: String,
    password: Password,
    status: UserStatus,
    role: Role,
    failed_login_attempts: u32,
    last_login_attempt_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw field values used to rebuild a stored user.
#[derive(Debug, Clone)]
pub struct UserParts {
    pub id: i64,
    pub person_id: i64,
    pub username: String,
    pub password: Password,
    pub status: UserStatus,
    pub role: Role,
    pub failed_login_attempts: u32,
    pub last_login_attempt_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trims and checks a username: 3 to 50 of `[A-Za-z0-9_-]`.
pub fn validate_username(raw: &str) -> DomainResult<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username", "username is required"));
    }
    let length = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
        return Err(DomainError::validation(
            "username",
            format!(
                "username must be between {} and {} characters",
                MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
            ),
        ));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(DomainError::validation(
            "username",
            "username must be alphanumeric, underscores, or hyphens",
        ));
    }
    Ok(username.to_string())
}

impl User {
    /// Creates an active user with the `user` role.
    pub fn new(person_id: i64, username: &str, password: Password) -> DomainResult<Self> {
        if person_id <= 0 {
            return Err(DomainError::validation("person_id", "person is required"));
        }
        let username = validate_username(username)?;
        let now = Utc::now();
        Ok(Self {
            id: 0,
            person_id,
            username,
            password,
            status: UserStatus::Active,
            role: Role::User,
            failed_login_attempts: 0,
            last_login_attempt_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn restore(parts: UserParts) -> Self {
        Self {
            id: parts.id,
            person_id: parts.person_id,
            username: parts.username,
            password: parts.password,
            status: parts.status,
            role: parts.role,
            failed_login_attempts: parts.failed_login_attempts,
            last_login_attempt_at: parts.last_login_attempt_at,
            last_login_at: parts.last_login_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn person_id(&self) -> i64 {
        self.person_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Password {
        &self.password
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn failed_login_attempts(&self) -> u32 {
        self.failed_login_attempts
    }

    pub fn last_login_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_attempt_at
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Only active users may perform authenticated actions.
    pub fn can_act(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn verify_password(&self, plain: &str) -> bool {
        self.password.matches(plain)
    }

    pub fn change_password(&mut self, password: Password) {
        self.password = password;
        self.touch();
    }

    pub fn activate(&mut self) {
        self.status = UserStatus::Active;
        self.failed_login_attempts = 0;
        self.touch();
    }

    pub fn deactivate(&mut self) {
        self.status = UserStatus::Inactive;
        self.touch();
    }

    pub fn block(&mut self) {
        self.status = UserStatus::Blocked;
        self.touch();
    }

    pub fn change_role(&mut self, role: Role) {
        self.role = role;
        self.touch();
    }

    pub fn record_failed_login(&mut self, at: DateTime<Utc>) {
        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
        self.last_login_attempt_at = Some(at);
        self.touch();
    }

    pub fn record_successful_login(&mut self, at: DateTime<Utc>) {
        self.failed_login_attempts = 0;
        self.last_login_attempt_at = Some(at);
        self.last_login_at = Some(at);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
