#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};
use std::collections::HashMap;

use todoforge::Config;

pub const PASSWORD: &str = "S3cure!Pw";

/// In-memory configuration with a cheap bcrypt cost.
pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("JWT_SECRET", "integration-test-secret-0123456789abcdef"),
        ("JWT_ISSUER", "todoforge-tests"),
        ("BCRYPT_COST", "4"),
        ("APP_NAME", "todoforge"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("test configuration is valid")
}

pub fn register_payload(username: &str, email: &str, tax_id: &str) -> Value {
    json!({
        "username": username,
        "password": PASSWORD,
        "name": format!("{} Example", username),
        "email": email,
        "phone": "+55 11 99999-0000",
        "tax_id": tax_id,
    })
}

/// Sends `req` and returns the status with the JSON body, `Null` when the
/// body is empty.
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!("non-JSON body: {:?}", String::from_utf8_lossy(&bytes))
        })
    };
    (status, body)
}

/// Registers a user and logs in. Returns `(access_token, login_body)`.
pub async fn sign_up<S, B>(app: &S, username: &str, email: &str, tax_id: &str) -> (String, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(register_payload(username, email, tax_id))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": username, "password": PASSWORD }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    let token = body["token"].as_str().expect("access token").to_string();
    (token, body)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
