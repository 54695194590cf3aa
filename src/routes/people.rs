use actix_web::{get, put, web, HttpResponse, Responder};
use validator::Validate;

use crate::auth::AuthenticatedUserId;
use crate::error::AppError;
use crate::models::{PersonResponse, UpdatePersonRequest};
use crate::state::AppState;

/// The person record behind the caller's account.
#[get("/me")]
pub async fn get_me(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let person = state.people.get_me(user_id.0).await?;
    Ok(HttpResponse::Ok().json(PersonResponse::from(&person)))
}

/// Partial update of name, email, phone and birth date.
#[put("/me")]
pub async fn update_me(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    body: web::Json<UpdatePersonRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let person = state.people.update_me(user_id.0, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PersonResponse::from(&person)))
}
