use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

/// Health check endpoint
///
/// Reports the application name and the crate version.
#[get("/health")]
pub async fn health(state: Option<web::Data<AppState>>) -> impl Responder {
    let app = state
        .map(|state| state.app_name.clone())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "app": app,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app = test::init_service(actix_web::App::new().service(health)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());

        let body = test::read_body(resp).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], "ok");
        assert_eq!(json["app"], "todoforge");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
