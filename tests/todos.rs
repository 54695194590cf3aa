mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

use common::{bearer, send, sign_up, test_config};
use todoforge::domain::entities::Todo;
use todoforge::domain::repositories::TodoRepository;
use todoforge::domain::value_objects::{Priority, TodoDescription, TodoTitle};
use todoforge::persistence::memory::{
    InMemoryPersonRepository, InMemoryTodoRepository, InMemoryUserRepository,
};
use todoforge::{routes, AppState};

fn state_with(todos: Arc<InMemoryTodoRepository>) -> AppState {
    let users = Arc::new(InMemoryUserRepository::new());
    AppState::from_repositories(
        &test_config(),
        users.clone(),
        users,
        Arc::new(InMemoryPersonRepository::new()),
        todos.clone(),
        todos,
    )
}

async fn seed_past_due(todos: &InMemoryTodoRepository, user_id: i64, title: &str, days_ago: i64) {
    let mut todo = Todo::new(
        user_id,
        TodoTitle::new(title).unwrap(),
        TodoDescription::new("").unwrap(),
        Priority::Medium,
        None,
    )
    .unwrap();
    todo.force_due_date(Some(Utc::now() - Duration::days(days_ago)));
    todos.save(todo).await.unwrap();
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| panic!("not a timestamp: {}", value))
}

#[actix_rt::test]
async fn test_create_complete_and_statistics() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState::in_memory(&test_config())))
            .configure(routes::config),
    )
    .await;
    let (token, _) = sign_up(&app, "alice", "alice@example.com", "52998224725").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/todos")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "Write report", "priority": "high" }))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Create failed. Body: {}", todo);
    assert_eq!(todo["status"], "pending");
    assert_eq!(todo["priority"], "high");
    let expected_due = Utc::now() + Duration::days(3);
    let due = timestamp(&todo["due_date"]);
    assert!((due - expected_due).num_seconds().abs() < 60, "due date {}", due);
    let id = todo["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/todos/{}/complete", id))
        .insert_header(bearer(&token))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(todo["status"], "completed");
    assert!(todo["completed_at"].is_string());

    // Completing twice is rejected
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/todos/{}/complete", id))
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "ALREADY_COMPLETED");

    let req = test::TestRequest::get()
        .uri("/api/v1/todos/statistics")
        .insert_header(bearer(&token))
        .to_request();
    let (status, stats) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_status"]["completed"], 1);
    assert_eq!(stats["by_status"]["pending"], 0);
    assert_eq!(stats["completion_rate"], 100.0);
    assert_eq!(stats["completed_today"], 1);
}

#[actix_rt::test]
async fn test_ownership_is_hidden() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState::in_memory(&test_config())))
            .configure(routes::config),
    )
    .await;
    let (alice, _) = sign_up(&app, "alice", "alice@example.com", "52998224725").await;
    let (bob, _) = sign_up(&app, "bob", "bob@example.com", "11144477735").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/todos")
        .insert_header(bearer(&alice))
        .set_json(json!({ "title": "Private plans", "priority": "low" }))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(todo["due_date"].is_null());
    let id = todo["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/todos/{}", id))
        .insert_header(bearer(&bob))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/todos/{}", id))
        .insert_header(bearer(&bob))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/api/v1/todos")
        .insert_header(bearer(&bob))
        .to_request();
    let (status, list) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/todos/{}", id))
        .insert_header(bearer(&alice))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Private plans");
}

#[actix_rt::test]
async fn test_status_transitions() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState::in_memory(&test_config())))
            .configure(routes::config),
    )
    .await;
    let (token, _) = sign_up(&app, "alice", "alice@example.com", "52998224725").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/todos")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "Ship release", "priority": 1 }))
        .to_request();
    let (_, todo) = send(&app, req).await;
    let id = todo["id"].as_i64().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/todos/{}/status", id))
        .insert_header(bearer(&token))
        .set_json(json!({ "status": "in_progress" }))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(todo["status"], "in_progress");

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/todos/{}/status", id))
        .insert_header(bearer(&token))
        .set_json(json!({ "status": "completed" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/todos/{}/status", id))
        .insert_header(bearer(&token))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
    assert_eq!(body["error"]["details"]["from"], "completed");
    assert_eq!(body["error"]["details"]["to"], "cancelled");

    // Reopening clears the completion timestamp
    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/todos/{}/status", id))
        .insert_header(bearer(&token))
        .set_json(json!({ "status": "pending" }))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(todo["completed_at"].is_null());

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/todos/{}/status", id))
        .insert_header(bearer(&token))
        .set_json(json!({ "status": "archived" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[actix_rt::test]
async fn test_update_tags_and_delete() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState::in_memory(&test_config())))
            .configure(routes::config),
    )
    .await;
    let (token, _) = sign_up(&app, "alice", "alice@example.com", "52998224725").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/todos")
        .insert_header(bearer(&token))
        .set_json(json!({
            "title": "Plan trip",
            "priority": "low",
            "due_date": "2099-06-01",
            "tags": ["travel", " family "],
        }))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Create failed. Body: {}", todo);
    assert_eq!(todo["tags"], json!(["family", "travel"]));
    let id = todo["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/todos/{}", id))
        .insert_header(bearer(&token))
        .set_json(json!({
            "title": "Plan summer trip",
            "description": "book flights",
            "priority": "medium",
            "due_date": null,
        }))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "Update failed. Body: {}", todo);
    assert_eq!(todo["title"], "Plan summer trip");
    assert_eq!(todo["description"], "book flights");
    assert_eq!(todo["priority"], "medium");
    assert!(todo["due_date"].is_null());

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/todos/{}", id))
        .insert_header(bearer(&token))
        .set_json(json!({ "due_date": "2001-01-01" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "due_date");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/todos/{}/tags", id))
        .insert_header(bearer(&token))
        .set_json(json!({ "tag": "urgent" }))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(todo["tags"], json!(["family", "travel", "urgent"]));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/todos/{}/tags/family", id))
        .insert_header(bearer(&token))
        .to_request();
    let (status, todo) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(todo["tags"], json!(["travel", "urgent"]));

    let req = test::TestRequest::get()
        .uri("/api/v1/todos/tags/popular?limit=1")
        .insert_header(bearer(&token))
        .to_request();
    let (status, tags) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags.as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/todos/{}", id))
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/todos/{}", id))
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_list_pagination_and_filters() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState::in_memory(&test_config())))
            .configure(routes::config),
    )
    .await;
    let (token, _) = sign_up(&app, "alice", "alice@example.com", "52998224725").await;

    let fixtures = [
        ("Write report", "high", vec!["work"]),
        ("Buy groceries", "low", vec!["home"]),
        ("Review pull request", "critical", vec!["work", "code"]),
        ("Call plumber", "medium", vec!["home"]),
        ("Prepare slides", "high", vec!["work"]),
    ];
    for (title, priority, tags) in fixtures {
        let req = test::TestRequest::post()
            .uri("/api/v1/todos")
            .insert_header(bearer(&token))
            .set_json(json!({ "title": title, "priority": priority, "tags": tags }))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::CREATED, "Create failed. Body: {}", body);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?page=2&size=2&sort=title:asc")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("X-Total-Count").unwrap(), "5");
    assert_eq!(resp.headers().get("X-Total-Pages").unwrap(), "3");
    assert_eq!(resp.headers().get("X-Current-Page").unwrap(), "2");
    assert_eq!(resp.headers().get("X-Page-Size").unwrap(), "2");
    let page: Value = test::read_body_json(resp).await;
    let titles: Vec<&str> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Prepare slides", "Review pull request"]);

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?tag=work&sort=priority:desc")
        .insert_header(bearer(&token))
        .to_request();
    let (_, list) = send(&app, req).await;
    let titles: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles[0], "Review pull request");
    assert_eq!(titles.len(), 3);

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?search=PLUMB")
        .insert_header(bearer(&token))
        .to_request();
    let (_, list) = send(&app, req).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["title"], "Call plumber");

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?filter%5Bpriority%5D%5Bgte%5D=3")
        .insert_header(bearer(&token))
        .to_request();
    let (_, list) = send(&app, req).await;
    assert_eq!(list.as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?sort=password:asc")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let req = test::TestRequest::get()
        .uri("/api/v1/todos/productivity?days=7")
        .insert_header(bearer(&token))
        .to_request();
    let (status, report) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["period_days"], 7);
    assert_eq!(report["total_created"], 5);
    assert_eq!(report["total_completed"], 0);
    assert_eq!(report["most_used_tags"][0]["tag"], "work");
}

#[actix_rt::test]
async fn test_overdue_sweep_and_stale_cancellation() {
    let todos = Arc::new(InMemoryTodoRepository::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with(todos.clone())))
            .configure(routes::config),
    )
    .await;
    let (token, login) = sign_up(&app, "alice", "alice@example.com", "52998224725").await;
    let user_id = login["user"]["id"].as_i64().unwrap();

    for title in ["Pay rent", "Renew passport", "File taxes"] {
        seed_past_due(&todos, user_id, title, 1).await;
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?overdue=true")
        .insert_header(bearer(&token))
        .to_request();
    let (_, list) = send(&app, req).await;
    assert_eq!(list.as_array().unwrap().len(), 3);
    assert_eq!(list[0]["is_overdue"], true);

    let req = test::TestRequest::post()
        .uri("/api/v1/todos/overdue/start")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 3);

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?status=pending")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("X-Total-Count").unwrap(), "0");

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?status=in_progress")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("X-Total-Count").unwrap(), "3");

    // Second run finds nothing left to start
    let req = test::TestRequest::post()
        .uri("/api/v1/todos/overdue/start")
        .insert_header(bearer(&token))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["updated"], 0);

    seed_past_due(&todos, user_id, "Old errand", 10).await;
    seed_past_due(&todos, user_id, "Recent errand", 1).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/todos/pending/cancel-stale?older_than_days=5")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], 1);

    let req = test::TestRequest::post()
        .uri("/api/v1/todos/pending/cancel-stale?older_than_days=-1")
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/todos/statistics")
        .insert_header(bearer(&token))
        .to_request();
    let (_, stats) = send(&app, req).await;
    assert_eq!(stats["total"], 5);
    assert_eq!(stats["by_status"]["in_progress"], 3);
    assert_eq!(stats["by_status"]["cancelled"], 1);
    assert_eq!(stats["by_status"]["pending"], 1);
    assert_eq!(stats["overdue"], 4);
}

#[actix_rt::test]
async fn test_out_of_range_windows_are_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState::in_memory(&test_config())))
            .configure(routes::config),
    )
    .await;
    let (token, _) = sign_up(&app, "dora", "dora@example.com", "52998224725").await;

    for uri in [
        "/api/v1/todos/pending/cancel-stale?older_than_days=1000000000000000",
        "/api/v1/todos/pending/cancel-stale?older_than_days=36501",
    ] {
        let req = test::TestRequest::post()
            .uri(uri)
            .insert_header(bearer(&token))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}: {}", uri, body);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/todos/productivity?days=1000000000000000")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let req = test::TestRequest::get()
        .uri("/api/v1/todos?page=18446744073709551615&size=10")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let req = test::TestRequest::post()
        .uri("/api/v1/todos/pending/cancel-stale?older_than_days=36500")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], 0);
}
