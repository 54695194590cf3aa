use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::{Person, Role, User, UserStatus};

/// Public projection of a user, joined with its person when available.
/// Never carries the password hash.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserResponse {
    pub id: i64,
    pub person_id: i64,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: UserStatus,
    pub role: Role,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(user: &User, person: Option<&Person>) -> Self {
        Self {
            id: user.id(),
            person_id: user.person_id(),
            username: user.username().to_string(),
            name: person.map(|p| p.name().to_string()),
            email: person.map(|p| p.email().to_string()),
            status: user.status(),
            role: user.role(),
            last_login_at: user.last_login_at(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PersonResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Punctuated CPF/CNPJ.
    pub tax_id: String,
    pub birth_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Person> for PersonResponse {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id(),
            name: person.name().to_string(),
            email: person.email().to_string(),
            phone: person.phone().to_string(),
            tax_id: person.tax_id().formatted(),
            birth_date: person.birth_date().map(|d| d.to_string()),
            created_at: person.created_at(),
            updated_at: person.updated_at(),
        }
    }
}

/// Partial update of the caller's person record. `"birth_date": null`
/// clears the birth date.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePersonRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub birth_date: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DeactivateInactiveRequest {
    #[validate(range(min = 1, max = 36500))]
    pub inactive_days: i64,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BlockSuspiciousRequest {
    #[validate(range(min = 1))]
    pub failed_login_attempts: u32,
    #[validate(range(min = 1, max = 52560000))]
    pub time_window_minutes: i64,
    pub limit: Option<usize>,
}
