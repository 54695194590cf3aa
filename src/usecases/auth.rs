use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, TokenService,
};
use crate::domain::entities::{validate_username, Person, User};
use crate::domain::errors::{DomainError, DomainResult, RepoResultExt, RepositoryError};
use crate::domain::repositories::{PersonRepository, UserRepository};
use crate::domain::services::enforce_password_policy;
use crate::domain::value_objects::{Date, Email, Password, TaxId};
use crate::models::UserResponse;
use crate::usecases::conflict_from;

/// Registration, login and credential lifecycle.
#[derive(Clone)]
pub struct AuthUseCases {
    users: Arc<dyn UserRepository>,
    people: Arc<dyn PersonRepository>,
    tokens: Arc<TokenService>,
    issuer: String,
    bcrypt_cost: u32,
}

impl AuthUseCases {
    pub fn new(
        users: Arc<dyn UserRepository>,
        people: Arc<dyn PersonRepository>,
        tokens: Arc<TokenService>,
        issuer: impl Into<String>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            people,
            tokens,
            issuer: issuer.into(),
            bcrypt_cost,
        }
    }

    /// Creates the person and its user. When the user cannot be stored the
    /// person is removed again so the registration can be retried.
    pub async fn register(&self, request: RegisterRequest) -> DomainResult<UserResponse> {
        let username = validate_username(&request.username)?;
        let email = Email::new(&request.email)?;
        let tax_id = TaxId::new(&request.tax_id)?;
        let birth_date = request
            .birth_date
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(Date::parse)
            .transpose()?;
        enforce_password_policy(&request.password)?;

        if self.users.exists_by_username(&username).await? {
            return Err(DomainError::conflict("username", "username is already taken"));
        }
        if self.people.exists_by_tax_id(&tax_id).await? {
            return Err(DomainError::conflict("tax_id", "tax id is already registered"));
        }
        match self.people.find_by_email(&email).await {
            Ok(_) => {
                return Err(DomainError::conflict("email", "email is already registered"));
            }
            Err(RepositoryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let password = Password::with_cost(&request.password, self.bcrypt_cost)?;
        let person = Person::new(&request.name, email, &request.phone, tax_id, birth_date)?;
        let person = self.people.save(person).await.map_err(conflict_from)?;

        match self.create_user(&person, &username, password).await {
            Ok(user) => {
                info!("registered user {} ({})", user.id(), user.username());
                Ok(UserResponse::new(&user, Some(&person)))
            }
            Err(e) => {
                if let Err(cleanup) = self.people.delete(person.id()).await {
                    warn!(
                        "failed to remove person {} after aborted registration: {}",
                        person.id(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    async fn create_user(
        &self,
        person: &Person,
        username: &str,
        password: Password,
    ) -> DomainResult<User> {
        self.people
            .find_by_id(person.id())
            .await
            .or_not_found("person", person.id())?;
        if self.users.exists_by_person_id(person.id()).await? {
            return Err(DomainError::conflict("person_id", "person already has a user"));
        }
        let user = User::new(person.id(), username, password)?;
        self.users.save(user).await.map_err(conflict_from)
    }

    /// Checks credentials and issues a token pair. Failed password checks
    /// are counted on the user.
    pub async fn login(
        &self,
        cancel: &CancellationToken,
        request: LoginRequest,
    ) -> DomainResult<AuthResponse> {
        let mut user = match self.users.find_by_username(request.username.trim()).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound(_)) => return Err(DomainError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };
        if !user.can_act() {
            return Err(DomainError::UserNotActive);
        }

        let now = Utc::now();
        if !user.verify_password(&request.password) {
            user.record_failed_login(now);
            let attempts = user.failed_login_attempts();
            if let Err(e) = self.users.save(user).await {
                warn!("failed to record failed login: {}", e);
            }
            info!(
                "rejected login for '{}' ({} failed attempts)",
                request.username.trim(),
                attempts
            );
            return Err(DomainError::InvalidCredentials);
        }

        user.record_successful_login(now);
        let user = self.users.save(user).await?;
        let person = self.people.find_by_id(user.person_id()).await.ok();
        let pair = self.tokens.generate_tokens(cancel, &self.issuer, user.id())?;
        Ok(AuthResponse::new(pair, UserResponse::new(&user, person.as_ref())))
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> DomainResult<()> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await
            .or_not_found("user", user_id)?;
        if !user.verify_password(&request.old_password) {
            return Err(DomainError::IncorrectPassword);
        }
        enforce_password_policy(&request.new_password)?;
        let password = Password::with_cost(&request.new_password, self.bcrypt_cost)?;
        user.change_password(password);
        self.users.save(user).await?;
        info!("user {} changed password", user_id);
        Ok(())
    }

    /// Exchanges a refresh token for a new pair. The owner must still be
    /// allowed to act.
    pub async fn refresh(
        &self,
        cancel: &CancellationToken,
        refresh_token: &str,
    ) -> DomainResult<AuthResponse> {
        let claims = self.tokens.validate_refresh_token(cancel, refresh_token)?;
        let user = match self.users.find_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound(_)) => {
                return Err(DomainError::Unauthorized("user no longer exists".into()))
            }
            Err(e) => return Err(e.into()),
        };
        if !user.can_act() {
            return Err(DomainError::UserNotActive);
        }
        let pair = self.tokens.refresh_tokens(cancel, refresh_token)?;
        let person = self.people.find_by_id(user.person_id()).await.ok();
        Ok(AuthResponse::new(pair, UserResponse::new(&user, person.as_ref())))
    }

    /// Revokes the access token and, when given, the refresh token.
    pub fn logout(
        &self,
        cancel: &CancellationToken,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> DomainResult<()> {
        self.tokens.revoke_token(cancel, access_token)?;
        if let Some(refresh) = refresh_token {
            self.tokens.revoke_token(cancel, refresh)?;
        }
        Ok(())
    }

    pub async fn me(&self, user_id: i64) -> DomainResult<UserResponse> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .or_not_found("user", user_id)?;
        let person = self.people.find_by_id(user.person_id()).await.ok();
        Ok(UserResponse::new(&user, person.as_ref()))
    }
}
