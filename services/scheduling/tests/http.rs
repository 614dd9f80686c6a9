//! HTTP surface: status codes and reason codes

mod support;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use scheduling::{
    AppState,
    guard::Actor,
    middleware::{Claims, JwtConfig, JwtKey, JwtVerifier},
    routes::create_router,
};
use support::Harness;

const SECRET: &str = "test-secret-key-for-tests";

fn app(h: &Harness) -> Router {
    let verifier = JwtVerifier::new(&JwtConfig {
        key: JwtKey::Secret(SECRET.to_string()),
    })
    .unwrap();

    create_router(AppState {
        sessions: Arc::new(h.service.clone()),
        verifier,
        db_pool: None,
    })
}

fn token(id: Uuid, role: &str) -> String {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: id,
        roles: vec![role.to_string()],
        iat: now,
        exp: now + 900,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn actor_token(actor: &Actor) -> String {
    token(actor.id, actor.role.as_str())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
    }
    let body = match body {
        Some(body) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&body).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

fn career_assistance() -> Value {
    json!({"title": "Career Assistance", "date": "2026-03-10", "time": "6:00pm"})
}

#[tokio::test]
async fn test_health_is_public() {
    let h = Harness::new();
    let (status, body) = send(&app(&h), "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "in_memory");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let h = Harness::new();
    let app = app(&h);

    let (status, body) = send(&app, "POST", "/sessions", None, Some(career_assistance())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "Unauthorized");

    let (status, _) = send(
        &app,
        "GET",
        "/sessions/user",
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_booking_flow_over_http() {
    let h = Harness::new();
    let app = app(&h);
    let student = token(Uuid::new_v4(), "user");
    let rival = token(Uuid::new_v4(), "user");
    let admin = token(Uuid::new_v4(), "admin");
    let mentor = h.add_mentor("Ada").await;

    let (status, created) = send(&app, "POST", "/sessions", Some(&student), Some(career_assistance())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/sessions", Some(&rival), Some(career_assistance())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "SlotTaken");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/sessions/{}/assign-mentor", id),
        Some(&admin),
        Some(json!({"mentorId": mentor.id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "mentor_assigned");
    assert_eq!(body["assignee"]["name"], "Ada");

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/sessions/{}/add-meet-link", id),
        Some(&actor_token(&mentor)),
        Some(json!({"meetLink": "https://meet.example.com/abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "scheduled");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/sessions/{}/reschedule", id),
        Some(&actor_token(&mentor)),
        Some(json!({"date": "2026-03-15", "time": "7:00pm"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rescheduled");
    assert_eq!(body["originalDate"], "2026-03-10");
    assert_eq!(body["originalTime"], "6:00pm");

    let (status, slots) = send(&app, "GET", "/sessions/booked-slots", Some(&rival), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slots, json!([{"date": "2026-03-15", "time": "7:00pm"}]));
}

#[tokio::test]
async fn test_policy_rejections_carry_reason_codes() {
    let h = Harness::new();
    let app = app(&h);
    let student = token(Uuid::new_v4(), "user");

    let (status, body) = send(
        &app,
        "POST",
        "/sessions",
        Some(&student),
        Some(json!({"title": "Soon", "date": "2026-03-05", "time": "6:00pm"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TooSoon");

    for day in ["2026-03-10", "2026-03-11", "2026-03-12"] {
        let (status, _) = send(
            &app,
            "POST",
            "/sessions",
            Some(&student),
            Some(json!({"title": "Weekly", "date": day, "time": "6:00pm"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        "POST",
        "/sessions",
        Some(&student),
        Some(json!({"title": "One too many", "date": "2026-03-13", "time": "6:00pm"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "QuotaExceeded");

    let (status, body) = send(
        &app,
        "POST",
        "/sessions",
        Some(&student),
        Some(json!({"title": "No time"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[tokio::test]
async fn test_forbidden_not_found_and_conflict() {
    let h = Harness::new();
    let app = app(&h);
    let owner_id = Uuid::new_v4();
    let owner = token(owner_id, "user");
    let stranger = token(Uuid::new_v4(), "user");
    let admin = token(Uuid::new_v4(), "admin");

    let (_, created) = send(&app, "POST", "/sessions", Some(&owner), Some(career_assistance())).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/sessions/{}/assign-mentor", id),
        Some(&stranger),
        Some(json!({"mentorId": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/sessions/{}/assign-mentor", Uuid::new_v4()),
        Some(&admin),
        Some(json!({"mentorId": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");

    let (status, _) = send(&app, "PUT", &format!("/sessions/{}/cancel", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "PUT", &format!("/sessions/{}/cancel", id), Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = send(&app, "PATCH", &format!("/sessions/{}/cancel", id), Some(&owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "Conflict");

    let (status, listed) = send(&app, "GET", "/sessions/user", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["userId"], owner_id.to_string());
}

#[tokio::test]
async fn test_malformed_session_id_is_a_validation_error() {
    let h = Harness::new();
    let app = app(&h);
    let owner = token(Uuid::new_v4(), "user");
    let admin = token(Uuid::new_v4(), "admin");

    let (status, body) = send(&app, "PUT", "/sessions/not-a-uuid/cancel", Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    let (status, body) = send(&app, "GET", "/sessions/mentor/42", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}
