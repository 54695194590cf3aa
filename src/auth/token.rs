//! Signed access/refresh token pairs.
//!
//! Tokens are HS256 JWTs. Every token carries a random 128-bit id (`jti`)
//! that keys the [`RevocationStore`]. Only HMAC algorithms are accepted on
//! inbound tokens.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::revocation::RevocationStore;
use crate::domain::errors::TokenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the claims encoded within a token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    /// Unique token id, 32 lowercase hex digits.
    pub jti: String,
    pub token_type: TokenType,
    pub iss: String,
    /// Subject, the user id as a string.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp(self.iat)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Tolerance applied to `exp` and `nbf`.
    pub leeway_seconds: u64,
    /// Revoke the presented refresh token when it is exchanged.
    pub revoke_on_refresh: bool,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::hours(168),
            leeway_seconds: 0,
            revoke_on_refresh: false,
        }
    }
}

/// Issues, validates, refreshes and revokes tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    revoke_on_refresh: bool,
    revocations: Arc<RevocationStore>,
}

impl TokenService {
    pub fn new(config: TokenConfig, revocations: Arc<RevocationStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = config.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            revoke_on_refresh: config.revoke_on_refresh,
            revocations,
        }
    }

    pub fn revocations(&self) -> &Arc<RevocationStore> {
        &self.revocations
    }

    /// Longest time any issued token is accepted, clock skew tolerance
    /// included. Revocation entries older than this refer to tokens that
    /// validation rejects anyway.
    pub fn max_token_lifetime(&self) -> Duration {
        let ttl = std::cmp::max(self.access_ttl, self.refresh_ttl);
        i64::try_from(self.validation.leeway)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|leeway| ttl.checked_add(&leeway))
            .unwrap_or_else(Duration::max_value)
    }

    pub fn generate_tokens(
        &self,
        cancel: &CancellationToken,
        issuer: &str,
        user_id: i64,
    ) -> Result<TokenPair, TokenError> {
        self.generate_tokens_with_claims(cancel, issuer, user_id, None)
    }

    pub fn generate_tokens_with_claims(
        &self,
        cancel: &CancellationToken,
        issuer: &str,
        user_id: i64,
        custom: Option<Map<String, Value>>,
    ) -> Result<TokenPair, TokenError> {
        ensure_active(cancel)?;
        let now = Utc::now();
        let access = self.claims(TokenType::Access, issuer, user_id, now, custom.clone());
        let refresh = self.claims(TokenType::Refresh, issuer, user_id, now, custom);
        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            access_expires_at: access.expires_at(),
            refresh_expires_at: refresh.expires_at(),
        })
    }

    /// Exchanges a valid refresh token for a new pair bound to the same user
    /// and issuer.
    pub fn refresh_tokens(
        &self,
        cancel: &CancellationToken,
        refresh_token: &str,
    ) -> Result<TokenPair, TokenError> {
        let claims = self.validate_refresh_token(cancel, refresh_token)?;
        let pair =
            self.generate_tokens_with_claims(cancel, &claims.iss, claims.user_id, claims.custom)?;
        if self.revoke_on_refresh {
            self.revocations.revoke(&claims.jti, Utc::now());
        }
        Ok(pair)
    }

    pub fn validate_access_token(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<Claims, TokenError> {
        self.validate(cancel, token, TokenType::Access)
    }

    pub fn validate_refresh_token(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<Claims, TokenError> {
        self.validate(cancel, token, TokenType::Refresh)
    }

    /// Marks the token as unusable. Expired tokens are already unusable and
    /// revoke successfully without being recorded.
    pub fn revoke_token(&self, cancel: &CancellationToken, token: &str) -> Result<(), TokenError> {
        ensure_active(cancel)?;
        match self.decode(token) {
            Ok(claims) => {
                self.revocations.revoke(&claims.jti, Utc::now());
                debug!("revoked {} token {}", claims.token_type, claims.jti);
                Ok(())
            }
            Err(TokenError::Expired) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Forgets revocations recorded before `before`.
    pub fn cleanup_revoked_tokens(&self, before: DateTime<Utc>) -> usize {
        self.revocations.cleanup(before)
    }

    fn validate(
        &self,
        cancel: &CancellationToken,
        token: &str,
        expected: TokenType,
    ) -> Result<Claims, TokenError> {
        ensure_active(cancel)?;
        let claims = self.decode(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected: expected.as_str(),
                actual: claims.token_type.to_string(),
            });
        }
        if self.revocations.is_revoked(&claims.jti) {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                JwtErrorKind::ImmatureSignature => TokenError::NotYetValid,
                _ => TokenError::Invalid(e.to_string()),
            })
    }

    fn claims(
        &self,
        token_type: TokenType,
        issuer: &str,
        user_id: i64,
        now: DateTime<Utc>,
        custom: Option<Map<String, Value>>,
    ) -> Claims {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        Claims {
            user_id,
            jti: new_token_id(),
            token_type,
            iss: issuer.to_string(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            nbf: now.timestamp(),
            custom,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), TokenError> {
    if cancel.is_cancelled() {
        Err(TokenError::Cancelled)
    } else {
        Ok(())
    }
}

fn new_token_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}
