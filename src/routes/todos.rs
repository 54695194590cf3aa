//! Todo endpoints. Every route acts on the caller's own todos; a todo owned
//! by someone else is reported as missing.

use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::auth::{AuthenticatedUserId, RequestCancellation};
use crate::domain::{DomainError, ErrorKind};
use crate::error::AppError;
use crate::models::{
    CancelStaleQuery, ChangeStatusRequest, CreateTodoRequest, ProductivityQuery, TagRequest,
    TodoResponse, UpdateTodoRequest,
};
use crate::pagination::{ListParams, PageMeta};
use crate::state::AppState;

const DEFAULT_POPULAR_TAGS: usize = 10;

fn hide_foreign(todo_id: i64) -> impl FnOnce(DomainError) -> AppError {
    move |error| match error.kind() {
        ErrorKind::Forbidden => DomainError::not_found("todo", todo_id).into(),
        _ => error.into(),
    }
}

/// Lists the caller's todos.
///
/// Supports `page`, `size`, `sort`, `search`, `status`, `priority`, `tag`,
/// `overdue` and `filter` parameters; see [`ListParams`]. The page totals are
/// returned in the `X-Total-Count`, `X-Total-Pages`, `X-Current-Page` and
/// `X-Page-Size` headers.
#[get("")]
pub async fn list_todos(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let params = ListParams::from_query(req.query_string())?;
    let (todos, total) = state
        .todos
        .list(user_id.0, params.criteria, &params.options)
        .await?;

    let body: Vec<TodoResponse> = todos.iter().map(TodoResponse::from).collect();
    let mut response = HttpResponse::Ok();
    PageMeta::new(total, params.page, params.size).apply(&mut response);
    Ok(response.json(body))
}

#[post("")]
pub async fn create_todo(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    todo_data: web::Json<CreateTodoRequest>,
) -> Result<impl Responder, AppError> {
    todo_data.validate()?;
    let todo = state.todos.create(user_id.0, todo_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(TodoResponse::from(todo)))
}

#[get("/statistics")]
pub async fn statistics(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let stats = state.todos.statistics(user_id.0).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct PopularTagsQuery {
    pub limit: Option<usize>,
}

#[get("/tags/popular")]
pub async fn popular_tags(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    query: web::Query<PopularTagsQuery>,
) -> Result<impl Responder, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_POPULAR_TAGS).min(100);
    let tags = state.todos.popular_tags(user_id.0, limit).await?;
    Ok(HttpResponse::Ok().json(tags))
}

#[get("/productivity")]
pub async fn productivity(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    query: web::Query<ProductivityQuery>,
) -> Result<impl Responder, AppError> {
    let report = state.todos.productivity(user_id.0, query.days).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Moves the caller's overdue pending todos to in-progress.
#[post("/overdue/start")]
pub async fn start_overdue(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    cancel: RequestCancellation,
) -> Result<impl Responder, AppError> {
    let updated = state.todos.start_overdue(&cancel.0, user_id.0).await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

/// Cancels the caller's pending todos older than `older_than_days`.
#[post("/pending/cancel-stale")]
pub async fn cancel_stale(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    cancel: RequestCancellation,
    query: web::Query<CancelStaleQuery>,
) -> Result<impl Responder, AppError> {
    let cancelled = state
        .todos
        .cancel_stale(&cancel.0, user_id.0, query.older_than_days)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "cancelled": cancelled })))
}

#[get("/{id:\\d+}")]
pub async fn get_todo(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let todo_id = path.into_inner();
    let todo = state
        .todos
        .get(user_id.0, todo_id)
        .await
        .map_err(hide_foreign(todo_id))?;
    Ok(HttpResponse::Ok().json(TodoResponse::from(todo)))
}

#[put("/{id:\\d+}")]
pub async fn update_todo(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    path: web::Path<i64>,
    todo_data: web::Json<UpdateTodoRequest>,
) -> Result<impl Responder, AppError> {
    todo_data.validate()?;
    let todo_id = path.into_inner();
    let todo = state
        .todos
        .update(user_id.0, todo_id, todo_data.into_inner())
        .await
        .map_err(hide_foreign(todo_id))?;
    Ok(HttpResponse::Ok().json(TodoResponse::from(todo)))
}

#[delete("/{id:\\d+}")]
pub async fn delete_todo(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let todo_id = path.into_inner();
    state
        .todos
        .delete(user_id.0, todo_id)
        .await
        .map_err(hide_foreign(todo_id))?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/{id:\\d+}/complete")]
pub async fn complete_todo(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let todo_id = path.into_inner();
    let todo = state
        .todos
        .complete(user_id.0, todo_id)
        .await
        .map_err(hide_foreign(todo_id))?;
    Ok(HttpResponse::Ok().json(TodoResponse::from(todo)))
}

#[patch("/{id:\\d+}/status")]
pub async fn change_status(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    path: web::Path<i64>,
    body: web::Json<ChangeStatusRequest>,
) -> Result<impl Responder, AppError> {
    let todo_id = path.into_inner();
    let todo = state
        .todos
        .change_status(user_id.0, todo_id, body.status)
        .await
        .map_err(hide_foreign(todo_id))?;
    Ok(HttpResponse::Ok().json(TodoResponse::from(todo)))
}

#[post("/{id:\\d+}/tags")]
pub async fn add_tag(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    path: web::Path<i64>,
    body: web::Json<TagRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let todo_id = path.into_inner();
    let todo = state
        .todos
        .add_tag(user_id.0, todo_id, &body.tag)
        .await
        .map_err(hide_foreign(todo_id))?;
    Ok(HttpResponse::Ok().json(TodoResponse::from(todo)))
}

#[delete("/{id:\\d+}/tags/{tag}")]
pub async fn remove_tag(
    state: web::Data<AppState>,
    user_id: AuthenticatedUserId,
    path: web::Path<(i64, String)>,
) -> Result<impl Responder, AppError> {
    let (todo_id, tag) = path.into_inner();
    let todo = state
        .todos
        .remove_tag(user_id.0, todo_id, &tag)
        .await
        .map_err(hide_foreign(todo_id))?;
    Ok(HttpResponse::Ok().json(TodoResponse::from(todo)))
}
