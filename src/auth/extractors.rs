use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};
use tokio_util::sync::CancellationToken;

use crate::auth::token::Claims;
use crate::error::AppError;
use crate::state::AppState;

/// Reads the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Id of the user whose access token `AuthMiddleware` accepted.
///
/// Fails with `401` when the middleware did not run for the route.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUserId(pub i64);

impl FromRequest for AuthenticatedUserId {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Claims>() {
            Some(claims) => ready(Ok(AuthenticatedUserId(claims.user_id))),
            None => {
                let err = AppError::Unauthorized(
                    "User ID not found in request. Ensure AuthMiddleware is active.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

/// The raw bearer token, for handlers that act on the token itself.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl FromRequest for BearerToken {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match bearer_token(req) {
            Some(token) => ready(Ok(BearerToken(token))),
            None => ready(Err(AppError::Unauthorized("Missing token".into()).into())),
        }
    }
}

/// Cancellation handle for the current request. It fires when the server
/// shuts down.
#[derive(Debug, Clone)]
pub struct RequestCancellation(pub CancellationToken);

impl FromRequest for RequestCancellation {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.shutdown.child_token())
            .unwrap_or_default();
        ready(Ok(RequestCancellation(token)))
    }
}
