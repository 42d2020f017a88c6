//! Integration tests for admin endpoints.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (certprep-cli migrate)
//! - The API server running (cargo run -p certprep-api)
//! - `CERTPREP_GATEWAY_TOKEN` matching the server
//!
//! Run with: cargo test -p certprep-integration-tests -- --ignored

use certprep_integration_tests::{TestClient, TestIdentity};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

fn question_body(certification: &str, quiz_number: i32) -> Value {
    json!({
        "certification": certification,
        "quiz_number": quiz_number,
        "text": "Which service provides a managed relational database?",
        "options": ["DynamoDB", "RDS", "ElastiCache", "S3"],
        "correct_answers": [1],
        "domain": "Design High-Performing Architectures"
    })
}

fn unique_certification() -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("adm-{suffix}")
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_admin_routes_reject_learners() {
    let client = TestClient::new();
    let learner = TestIdentity::learner();

    for path in ["/api/admin/stats", "/api/admin/users", "/api/admin/questions"] {
        let resp = client
            .as_user(&learner, Method::GET, path)
            .send()
            .await
            .expect("Failed to reach server");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_question_lifecycle() {
    let client = TestClient::new();
    let admin = TestIdentity::admin();
    let certification = unique_certification();

    let resp = client
        .as_user(&admin, Method::POST, "/api/admin/questions")
        .json(&question_body(&certification, 3))
        .send()
        .await
        .expect("Failed to create question");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.expect("Invalid JSON");
    let id = created["id"].as_str().expect("question id").to_string();
    assert_eq!(created["status"], "draft");

    let mut update = question_body(&certification, 3);
    update["correct_answers"] = json!([1, 3]);
    let resp = client
        .as_user(&admin, Method::PUT, &format!("/api/admin/questions/{id}"))
        .json(&update)
        .send()
        .await
        .expect("Failed to update question");
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(updated["correct_answers"], json!([1, 3]));

    let resp = client
        .as_user(&admin, Method::DELETE, &format!("/api/admin/questions/{id}"))
        .send()
        .await
        .expect("Failed to archive question");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .as_user(
            &admin,
            Method::GET,
            &format!("/api/admin/questions?certification={certification}&status=archived"),
        )
        .send()
        .await
        .expect("Failed to list questions");
    let list: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(list["questions"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_invalid_question_is_400() {
    let client = TestClient::new();
    let admin = TestIdentity::admin();

    let mut body = question_body(&unique_certification(), 1);
    body["correct_answers"] = json!([7]);

    let resp = client
        .as_user(&admin, Method::POST, "/api/admin/questions")
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .as_user(&admin, Method::GET, "/api/admin/questions/not-a-uuid")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_user_detail_and_stats() {
    let client = TestClient::new();
    let admin = TestIdentity::admin();
    let learner = TestIdentity::learner();

    client
        .as_user(&learner, Method::GET, "/api/me")
        .send()
        .await
        .expect("Failed to create learner");

    let resp = client
        .as_user(
            &admin,
            Method::GET,
            &format!("/api/admin/users/{}", learner.sub),
        )
        .send()
        .await
        .expect("Failed to get user detail");
    assert_eq!(resp.status(), StatusCode::OK);
    let detail: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(detail["user"]["email"], learner.email.as_str());
    assert!(detail["customer"].is_null());

    let resp = client
        .as_user(&admin, Method::GET, "/api/admin/users/test%7Cnobody")
        .send()
        .await
        .expect("Failed to get user detail");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .as_user(&admin, Method::GET, "/api/admin/stats")
        .send()
        .await
        .expect("Failed to get stats");
    assert_eq!(resp.status(), StatusCode::OK);
    let stats: Value = resp.json().await.expect("Invalid JSON");
    assert!(stats["users"].as_i64().unwrap_or_default() >= 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_payments_limit_validation() {
    let client = TestClient::new();
    let admin = TestIdentity::admin();

    let resp = client
        .as_user(&admin, Method::GET, "/api/admin/payments?limit=101")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_user_email_filter_is_literal() {
    let client = TestClient::new();
    let admin = TestIdentity::admin();
    let learner = TestIdentity::learner();

    client
        .as_user(&learner, Method::GET, "/api/me")
        .send()
        .await
        .expect("Failed to create learner");

    let resp = client
        .as_user(
            &admin,
            Method::GET,
            &format!("/api/admin/users?email={}", learner.email.to_uppercase()),
        )
        .send()
        .await
        .expect("Failed to list users");
    assert_eq!(resp.status(), StatusCode::OK);
    let list: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(list["users"].as_array().map(Vec::len), Some(1));

    for wildcard in ["%25", "_"] {
        let resp = client
            .as_user(
                &admin,
                Method::GET,
                &format!("/api/admin/users?email={wildcard}"),
            )
            .send()
            .await
            .expect("Failed to list users");
        assert_eq!(resp.status(), StatusCode::OK);
        let list: Value = resp.json().await.expect("Invalid JSON");
        assert_eq!(list["users"], json!([]), "{wildcard}");
    }
}
