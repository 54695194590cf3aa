//! User administration. Every route requires the `manage_users` permission.

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use chrono::Duration;
use log::info;
use serde_json::json;
use validator::Validate;

use crate::auth::{AuthenticatedUserId, RequestCancellation};
use crate::domain::query::{QueryOptions, UserField};
use crate::domain::services::{Permission, SuspiciousActivityCriteria};
use crate::domain::DomainError;
use crate::error::AppError;
use crate::models::{BlockSuspiciousRequest, DeactivateInactiveRequest, UserResponse};
use crate::pagination::{parse_sort, Page, PageMeta};
use crate::state::AppState;

const DEFAULT_SWEEP_LIMIT: usize = 1000;
const MAX_SWEEP_LIMIT: usize = 10_000;

fn sweep_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_SWEEP_LIMIT).min(MAX_SWEEP_LIMIT)
}

async fn require_admin(state: &AppState, caller: i64) -> Result<(), AppError> {
    state
        .security
        .validate_user_permission(caller, Permission::ManageUsers)
        .await?;
    Ok(())
}

/// `page`, `size` and `sort=field:dir` over the user fields.
fn user_list_options(req: &HttpRequest) -> Result<(Page, QueryOptions<UserField>), AppError> {
    let pairs = web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .into_inner();

    let mut page = Page::default();
    let mut sort = Vec::new();
    for (key, value) in &pairs {
        if !page.accept(key, value)? && key == "sort" {
            sort.extend(parse_sort::<UserField>(value)?);
        }
    }
    let options = page.options(sort)?;
    Ok((page, options))
}

/// Lists users. Paged like the todo list.
#[get("/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    caller: AuthenticatedUserId,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    require_admin(&state, caller.0).await?;
    let (page, options) = user_list_options(&req)?;

    let users = state
        .user_queries
        .find_all(&options)
        .await
        .map_err(DomainError::from)?;
    let total = state.user_queries.count().await.map_err(DomainError::from)?;

    let body: Vec<UserResponse> = users.iter().map(|u| UserResponse::new(u, None)).collect();
    let mut response = HttpResponse::Ok();
    PageMeta::new(total, page.page, page.size).apply(&mut response);
    Ok(response.json(body))
}

/// User counts in total, per status and per role.
#[get("/users/stats")]
pub async fn user_stats(
    state: web::Data<AppState>,
    caller: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    require_admin(&state, caller.0).await?;
    let queries = &state.user_queries;
    let total = queries.count().await.map_err(DomainError::from)?;
    let by_status = queries.count_by_status().await.map_err(DomainError::from)?;
    let by_role = queries.count_by_role().await.map_err(DomainError::from)?;
    Ok(HttpResponse::Ok().json(json!({
        "total": total,
        "by_status": by_status,
        "by_role": by_role,
    })))
}

#[post("/users/deactivate-inactive")]
pub async fn deactivate_inactive(
    state: web::Data<AppState>,
    caller: AuthenticatedUserId,
    cancel: RequestCancellation,
    body: web::Json<DeactivateInactiveRequest>,
) -> Result<impl Responder, AppError> {
    require_admin(&state, caller.0).await?;
    body.validate()?;
    let deactivated = state
        .security
        .deactivate_inactive_users(
            &cancel.0,
            body.inactive_days,
            sweep_limit(body.limit),
        )
        .await?;
    info!("admin {} deactivated {} users", caller.0, deactivated);
    Ok(HttpResponse::Ok().json(json!({ "deactivated": deactivated })))
}

#[post("/users/block-suspicious")]
pub async fn block_suspicious(
    state: web::Data<AppState>,
    caller: AuthenticatedUserId,
    cancel: RequestCancellation,
    body: web::Json<BlockSuspiciousRequest>,
) -> Result<impl Responder, AppError> {
    require_admin(&state, caller.0).await?;
    body.validate()?;
    let criteria = SuspiciousActivityCriteria {
        failed_login_attempts: body.failed_login_attempts,
        time_window: Duration::minutes(body.time_window_minutes),
    };
    let blocked = state
        .security
        .block_suspicious_users(&cancel.0, criteria, sweep_limit(body.limit))
        .await?;
    info!("admin {} blocked {} users", caller.0, blocked.len());
    Ok(HttpResponse::Ok().json(json!({ "blocked": blocked })))
}
