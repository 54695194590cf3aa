use actix_web::{get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

use crate::auth::{
    AuthenticatedUserId, BearerToken, ChangePasswordRequest, LoginRequest, LogoutRequest,
    RefreshRequest, RegisterRequest, RequestCancellation,
};
use crate::error::AppError;
use crate::state::AppState;

/// Register a new user
///
/// Creates the person and the user bound to it. Returns `201` with the user
/// projection, or `409` when the username, email or tax id is taken.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;
    let user = state.auth.register(register_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// Login user
///
/// Returns an access and refresh token pair. Unknown users, wrong passwords
/// and inactive accounts are all rejected with `401`.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    cancel: RequestCancellation,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;
    let response = state.auth.login(&cancel.0, login_data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Exchange a refresh token for a new pair.
#[post("/refresh")]
pub async fn refresh(
    state: web::Data<AppState>,
    cancel: RequestCancellation,
    body: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let response = state.auth.refresh(&cancel.0, &body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Revoke the presented access token and, when supplied, the refresh token.
#[post("/logout")]
pub async fn logout(
    state: web::Data<AppState>,
    cancel: RequestCancellation,
    token: BearerToken,
    body: Option<web::Json<LogoutRequest>>,
) -> Result<impl Responder, AppError> {
    let refresh_token = body.and_then(|body| body.into_inner().refresh_token);
    state
        .auth
        .logout(&cancel.0, &token.0, refresh_token.as_deref())?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/me")]
pub async fn me(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let user = state.auth.me(user_id.0).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Change the caller's password. A wrong old password is a `400`.
#[put("/change-password")]
pub async fn change_password(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    body: web::Json<ChangePasswordRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    state
        .auth
        .change_password(user_id.0, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "password changed" })))
}
