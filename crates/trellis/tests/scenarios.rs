//! End-to-end scenarios over the reference pipelines.

use http::StatusCode;
use serde_json::{json, Value};
use trellis::config::{TrellisConfig, DEV_GUEST_KEY, DEV_LOGIN_KEY};
use trellis::core::PipelineError;
use trellis::services::{ChatService, LoginService};
use trellis::Services;
use trellis_test::{TestClient, TestRequest};

fn services() -> Services {
    let mut config = TrellisConfig::development();
    config
        .apply_secret_fallbacks()
        .expect("development config accepts fallbacks");
    Services::new(config)
}

fn login_body(email: &str) -> Value {
    json!({ "email": email, "password": "x", "channel": "web" })
}

async fn login_token(services: &Services, email: &str) -> String {
    let response = TestClient::new(services.login_pipeline())
        .send(
            TestRequest::post("/login")
                .basic("login", DEV_LOGIN_KEY)
                .json(&login_body(email)),
        )
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_success_envelope()["token"]
        .as_str()
        .expect("token is a string")
        .to_string()
}

#[tokio::test]
async fn test_login_returns_token_envelope() {
    let services = services();
    let response = TestClient::new(services.login_pipeline())
        .send(
            TestRequest::post("/login")
                .basic("login", DEV_LOGIN_KEY)
                .json(&login_body("a@b.com")),
        )
        .await;

    response.assert_status(StatusCode::OK).assert_json();
    let body = response.json_value().unwrap();
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].is_string());

    let data = &body["data"];
    assert_eq!(data["user"], "a@b.com");
    assert!(data["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(data["expiresAt"].is_string());
    assert_eq!(services.tokens.len(), 1);
}

#[tokio::test]
async fn test_login_missing_password_is_validation_error() {
    let services = services();
    let response = TestClient::new(services.login_pipeline())
        .send(
            TestRequest::post("/login")
                .basic("login", DEV_LOGIN_KEY)
                .json(&json!({ "email": "a@b.com", "channel": "web" })),
        )
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let details = response
        .assert_error_envelope("Validation error")
        .expect("validation details");
    assert_eq!(details[0]["code"], "invalid_type");
    assert_eq!(details[0]["path"], json!(["password"]));
    assert!(services.tokens.is_empty());
}

#[tokio::test]
async fn test_login_requires_login_key() {
    let services = services();
    let client = TestClient::new(services.login_pipeline());

    let missing = client
        .send(TestRequest::post("/login").json(&login_body("a@b.com")))
        .await;
    missing.assert_status(StatusCode::UNAUTHORIZED);
    missing.assert_error_envelope("Missing or invalid basic auth");

    let guest = client
        .send(
            TestRequest::post("/login")
                .basic("guest", DEV_GUEST_KEY)
                .json(&login_body("a@b.com")),
        )
        .await;
    guest.assert_status(StatusCode::UNAUTHORIZED);
    guest.assert_error_envelope("Invalid client credentials");
}

#[tokio::test]
async fn test_invalid_bearer_token_is_rejected() {
    let services = services();
    let response = TestClient::new(services.member_message_pipeline())
        .send(
            TestRequest::post("/messages")
                .bearer("bad-token")
                .json(&json!({ "contextId": "c-1", "message": "hi" })),
        )
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(response
        .assert_error_envelope("Invalid or expired token")
        .is_none());
}

#[tokio::test]
async fn test_unclassified_error_is_not_leaked() {
    let services = services();
    let pipeline = services
        .base()
        .handle(|_| Box::pin(async { Err(PipelineError::internal("connection pool exhausted")) }));

    let response = TestClient::new(pipeline).send(TestRequest::get("/boom")).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_error_envelope("Internal Server Error");
    assert!(!response.text().unwrap().contains("connection pool"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_members_stay_isolated() {
    let services = services();
    let pipeline = services.member_message_pipeline();

    let mut tokens = Vec::new();
    for i in 0..8 {
        let email = format!("user{i}@example.com");
        tokens.push((email.clone(), login_token(&services, &email).await));
    }

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|(email, token)| {
            let client = TestClient::new(pipeline.clone());
            tokio::spawn(async move {
                let response = client
                    .send(
                        TestRequest::post("/messages")
                            .bearer(&token)
                            .json(&json!({ "contextId": email, "message": format!("from {email}") })),
                    )
                    .await;
                (email, response)
            })
        })
        .collect();

    for handle in handles {
        let (email, response) = handle.await.unwrap();
        response.assert_status(StatusCode::OK);
        let data = response.assert_success_envelope();
        assert_eq!(data["contextId"], email.as_str());
        assert_eq!(data["question"], format!("from {email}"));
    }

    let chat = services
        .container
        .resolve::<ChatService>()
        .unwrap();
    for i in 0..8 {
        let email = format!("user{i}@example.com");
        let history = chat.history(&email);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, format!("from {email}"));
    }
}

#[tokio::test]
async fn test_otp_flow() {
    let services = services();
    let request_otp = TestClient::new(services.request_otp_pipeline());
    let verify_otp = TestClient::new(services.verify_otp_pipeline());

    let sent = request_otp
        .send(
            TestRequest::post("/guest/request-otp")
                .basic("login", DEV_LOGIN_KEY)
                .json(&json!({ "email": "a@b.com" })),
        )
        .await;
    sent.assert_status(StatusCode::OK);
    assert_eq!(
        sent.assert_success_envelope()["message"],
        "OTP sent successfully"
    );

    let wrong = verify_otp
        .send(
            TestRequest::post("/guest/verify-otp")
                .basic("login", DEV_LOGIN_KEY)
                .json(&json!({ "email": "a@b.com", "verification": "not-a-code" })),
        )
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    wrong.assert_error_envelope("Invalid verification code");

    let code = services
        .container
        .resolve::<LoginService>()
        .unwrap()
        .pending_code("a@b.com")
        .expect("code pending");
    let verified = verify_otp
        .send(
            TestRequest::post("/guest/verify-otp")
                .basic("login", DEV_LOGIN_KEY)
                .json(&json!({ "email": "a@b.com", "verification": code })),
        )
        .await;
    verified.assert_status(StatusCode::OK);
    assert_eq!(verified.assert_success_envelope()["user"], "a@b.com");
}

#[tokio::test]
async fn test_member_history() {
    let services = services();
    let token = login_token(&services, "a@b.com").await;

    TestClient::new(services.member_message_pipeline())
        .send(
            TestRequest::post("/messages")
                .bearer(&token)
                .json(&json!({ "contextId": "c-1", "message": "hello" })),
        )
        .await
        .assert_status(StatusCode::OK);

    let history = TestClient::new(services.member_history_pipeline());

    let own = history
        .send(
            TestRequest::get("/messages/a@b.com")
                .bearer(&token)
                .path_param("userId", "a@b.com"),
        )
        .await;
    own.assert_status(StatusCode::OK);
    let data = own.assert_success_envelope();
    assert_eq!(data.as_array().map(Vec::len), Some(1));
    assert_eq!(data[0]["replyMessage"].as_str().map(str::is_empty), Some(false));

    let other = history
        .send(
            TestRequest::get("/messages/c@d.com")
                .bearer(&token)
                .path_param("userId", "c@d.com"),
        )
        .await;
    other.assert_status(StatusCode::FORBIDDEN);
    other.assert_error_envelope("Cannot read another user's messages");

    let missing = history
        .send(TestRequest::get("/messages").bearer(&token))
        .await;
    missing.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guest_message_needs_guest_key() {
    let services = services();
    let client = TestClient::new(services.guest_message_pipeline());
    let body = json!({ "contextId": "g-1", "message": "hi" });

    let ok = client
        .send(
            TestRequest::post("/guest/messages")
                .header("x-api-key", DEV_GUEST_KEY)
                .json(&body),
        )
        .await;
    ok.assert_status(StatusCode::OK);
    assert_eq!(ok.assert_success_envelope()["question"], "hi");

    for _ in 0..20 {
        client
            .send(
                TestRequest::post("/guest/messages")
                    .header("x-api-key", DEV_GUEST_KEY)
                    .json(&body),
            )
            .await
            .assert_status(StatusCode::OK);
    }
    let chat = services.container.resolve::<ChatService>().unwrap();
    assert_eq!(chat.users(), 0);

    let wrong = client
        .send(
            TestRequest::post("/guest/messages")
                .header("x-api-key", DEV_LOGIN_KEY)
                .json(&body),
        )
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    wrong.assert_error_envelope("Invalid API key");

    let empty = client
        .send(
            TestRequest::post("/guest/messages")
                .header("x-api-key", DEV_GUEST_KEY)
                .json(&json!({ "contextId": "g-1", "message": "" })),
        )
        .await;
    empty.assert_status(StatusCode::BAD_REQUEST);
    let details = empty.assert_error_envelope("Validation error").unwrap();
    assert_eq!(details[0]["code"], "too_small");
}
