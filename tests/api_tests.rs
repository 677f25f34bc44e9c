//! API integration tests
//!
//! Each test builds the full router on a fresh in-memory database and drives
//! it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use biblioteca_server::{
    api,
    config::AppConfig,
    repository::{self, Repository},
    services::Services,
    AppState,
};

const ADMIN_CPF: &str = "529.982.247-25";
const ADMIN_PASSWORD: &str = "admin123";

async fn app() -> Router {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.auth.jwt_secret = "integration-secret".to_string();
    config.auth.bootstrap_admin_cpf = ADMIN_CPF.to_string();
    config.auth.bootstrap_admin_password = ADMIN_PASSWORD.to_string();

    let pool = repository::connect(&config.database).await.unwrap();
    repository::migrate(&pool).await.unwrap();
    let services = Services::new(Repository::new(pool.clone()), config.auth.clone());
    services.users.ensure_admin().await.unwrap();

    api::create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = body
        .map(|b| Body::from(serde_json::to_vec(&b).unwrap()))
        .unwrap_or_else(Body::empty);

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router, cpf: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "cpf": cpf, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    assert_eq!(body["token_type"], "Bearer");
    body["token"].as_str().unwrap().to_string()
}

/// Author, category and a book with `total` copies; returns the book id
async fn create_book(app: &Router, token: &str, total: i64) -> i64 {
    let (status, author) = send(
        app,
        Method::POST,
        "/authors",
        Some(token),
        Some(json!({ "name": "Machado de Assis" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, category) = send(
        app,
        Method::POST,
        "/categories",
        Some(token),
        Some(json!({ "name": "Romance" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, book) = send(
        app,
        Method::POST,
        "/books",
        Some(token),
        Some(json!({
            "title": "Dom Casmurro",
            "author_id": author["id"],
            "category_id": category["id"],
            "acquisition_type": "DONATION",
            "total_quantity": total,
            "isbn": "9788535910663"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", book);
    assert_eq!(book["available_quantity"], total);
    assert_eq!(book["author_name"], "Machado de Assis");
    book["id"].as_i64().unwrap()
}

async fn create_client(app: &Router, token: &str, name: &str, cpf: &str, phone: &str) -> i64 {
    let (status, client) = send(
        app,
        Method::POST,
        "/clients",
        Some(token),
        Some(json!({ "name": name, "cpf": cpf, "phone": phone })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", client);
    client["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_login_and_auth_errors() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "cpf": ADMIN_CPF, "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, _) = send(&app, Method::GET, "/loans", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/loans", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app, "52998224725", ADMIN_PASSWORD).await;
    let (status, me) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "ADMIN");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn test_loan_lifecycle() {
    let app = app().await;
    let token = login(&app, ADMIN_CPF, ADMIN_PASSWORD).await;
    let book_id = create_book(&app, &token, 1).await;
    let ana = create_client(&app, &token, "Ana", "111.444.777-35", "81999990000").await;
    let bruno = create_client(&app, &token, "Bruno", "39053344705", "81988880000").await;

    let (status, loan) = send(
        &app,
        Method::POST,
        "/loans",
        Some(&token),
        Some(json!({ "client_id": ana, "book_id": book_id, "condition_on_loan": "GOOD" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", loan);
    assert!(loan["return_date"].is_null());
    let loan_id = loan["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans",
        Some(&token),
        Some(json!({ "client_id": bruno, "book_id": book_id, "condition_on_loan": "GOOD" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 5);
    assert_eq!(body["message"], "Book is not available");

    let (status, page) = send(&app, Method::GET, "/loans?status=active", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["book_title"], "Dom Casmurro");

    let (status, returned) = send(
        &app,
        Method::POST,
        &format!("/loans/{}/return", loan_id),
        Some(&token),
        Some(json!({ "condition_on_return": "FAIR", "notes": "spine worn" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["condition_on_return"], "FAIR");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/loans/{}/return", loan_id),
        Some(&token),
        Some(json!({ "condition_on_return": "GOOD" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 7);

    let (_, book) = send(&app, Method::GET, &format!("/books/{}", book_id), Some(&token), None).await;
    assert_eq!(book["available_quantity"], 1);

    let (_, history) = send(
        &app,
        Method::GET,
        &format!("/books/{}/history", book_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["client_name"], "Ana");

    let (status, logs) = send(&app, Method::GET, "/logs", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = logs
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&format!("CREATE_LOAN:{}", loan_id).as_str()));
    assert!(actions.contains(&format!("RETURN_LOAN:{}", loan_id).as_str()));
}

#[tokio::test]
async fn test_max_loans_from_settings() {
    let app = app().await;
    let token = login(&app, ADMIN_CPF, ADMIN_PASSWORD).await;

    let (status, settings) = send(
        &app,
        Method::PUT,
        "/settings",
        Some(&token),
        Some(json!({ "max_loans_per_client": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["max_loans_per_client"], 1);
    assert_eq!(settings["loan_duration_days"], 14);

    let book_id = create_book(&app, &token, 3).await;
    let client_id = create_client(&app, &token, "Ana", "11144477735", "81999990000").await;
    let request = json!({ "client_id": client_id, "book_id": book_id, "condition_on_loan": "NEW" });

    let (status, _) = send(&app, Method::POST, "/loans", Some(&token), Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, "/loans", Some(&token), Some(request)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 6);
    assert_eq!(body["message"], "Client has reached the maximum loan limit (1)");

    let (_, book) = send(&app, Method::GET, &format!("/books/{}", book_id), Some(&token), None).await;
    assert_eq!(book["available_quantity"], 2);
}

#[tokio::test]
async fn test_validation_and_not_found() {
    let app = app().await;
    let token = login(&app, ADMIN_CPF, ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/clients",
        Some(&token),
        Some(json!({ "name": "Ana", "cpf": "12345678900", "phone": "81999990000" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/settings",
        Some(&token),
        Some(json!({ "loan_duration_days": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/settings",
        Some(&token),
        Some(json!({ "loan_duration_days": 100_000_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, _) = send(&app, Method::GET, "/loans/upcoming?days=100000000", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans/999/return",
        Some(&token),
        Some(json!({ "condition_on_return": "GOOD" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Loan not found");

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans",
        Some(&token),
        Some(json!({ "client_id": 999, "book_id": 1, "condition_on_loan": "GOOD" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Client not found");
}

#[tokio::test]
async fn test_admin_only_routes() {
    let app = app().await;
    let admin = login(&app, ADMIN_CPF, ADMIN_PASSWORD).await;
    let book_id = create_book(&app, &admin, 1).await;

    let (status, user) = send(
        &app,
        Method::POST,
        "/users",
        Some(&admin),
        Some(json!({
            "name": "Beatriz",
            "cpf": "123.456.789-09",
            "phone": "81977770000",
            "address": "Rua da Aurora, 10",
            "role": "USER",
            "password": "clerk-pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", user);

    let clerk = login(&app, "12345678909", "clerk-pass").await;

    let (status, _) = send(&app, Method::GET, "/users", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &format!("/books/{}", book_id), Some(&clerk), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/loans/top/books", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::DELETE, &format!("/books/{}", book_id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/books/{}", book_id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
