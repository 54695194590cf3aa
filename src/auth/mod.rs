pub mod extractors;
pub mod middleware;
pub mod password;
pub mod revocation;
pub mod token;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::USERNAME_REGEX;
use crate::models::UserResponse;

// Re-export necessary items
pub use extractors::{AuthenticatedUserId, BearerToken, RequestCancellation};
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use revocation::RevocationStore;
pub use token::{Claims, TokenConfig, TokenPair, TokenService, TokenType};

/// Represents the payload for a user login request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Represents the payload for a new account. Registration creates the
/// person and the user bound to it.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Must be between 3 and 50 characters, alphanumeric, and can include
    /// underscores or hyphens.
    #[validate(
        length(min = 3, max = 50),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 30))]
    pub phone: String,
    /// CPF or CNPJ, with or without punctuation.
    #[validate(length(min = 11, max = 18))]
    pub tax_id: String,
    pub birth_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "old password is required"))]
    pub old_password: String,
    #[validate(length(min = 1, message = "new password is required"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Response structure after a successful login or token refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The access token for the `Authorization: Bearer` header.
    pub token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

impl AuthResponse {
    pub fn new(pair: TokenPair, user: UserResponse) -> Self {
        Self {
            token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn register(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "S3cure!Pw".to_string(),
            name: "Alice Example".to_string(),
            email: "alice@example.com".to_string(),
            phone: "+55 11 99999-0000".to_string(),
            tax_id: "529.982.247-25".to_string(),
            birth_date: None,
        }
    }

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            username: "alice".to_string(),
            password: "S3cure!Pw".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        let missing_password = LoginRequest {
            username: "alice".to_string(),
            password: String::new(),
        };
        assert!(missing_password.validate().is_err());
    }

    #[test]
    fn test_register_request_validation() {
        assert!(register("test_user-123").validate().is_ok());
        assert!(register("test user!").validate().is_err());
        assert!(register("tu").validate().is_err());

        let mut bad_email = register("alice");
        bad_email.email = "aliceexample.com".to_string();
        assert!(bad_email.validate().is_err());

        let mut short_password = register("alice");
        short_password.password = "short".to_string();
        assert!(short_password.validate().is_err());
    }
}
