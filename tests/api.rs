use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;

use studyplan::config::EngineConfig;
use studyplan::model::{Difficulty, Topic};
use studyplan::store::{MemoryStore, StudyStore};
use studyplan::web::{SCHEDULE_ISSUES_HEADER, USER_HEADER, router};

fn app() -> Router {
    router(MemoryStore::new(), EngineConfig::default())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        req = req.header(USER_HEADER, user);
    }
    let req = match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_check() {
    let app = app();
    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Study planner API is running");
}

#[tokio::test]
async fn requires_user_header() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/study/schedule", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Not authorized");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/nope", Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn schedule_review_and_summary() {
    let app = app();
    let user = Some("u1");

    let (status, subject) = send(
        &app,
        "POST",
        "/api/subjects",
        user,
        Some(json!({ "name": "Physics", "examDate": "2099-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let subject_id = subject["id"].as_str().unwrap().to_string();
    assert_eq!(subject["examDate"], "2099-01-01T00:00:00Z");

    let (status, topic) = send(
        &app,
        "POST",
        "/api/topics",
        user,
        Some(json!({ "subject": subject_id, "name": "Kinematics", "difficulty": "hard" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let topic_id = topic["id"].as_str().unwrap().to_string();
    assert_eq!(topic["status"], "new");
    assert_eq!(topic["reviewCount"], 0);

    let (status, schedule) = send(&app, "GET", "/api/study/schedule", user, None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = schedule.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["topicId"], topic_id.as_str());
    assert_eq!(entries[0]["subjectId"], subject_id.as_str());
    assert_eq!(entries[0]["allocatedMinutes"], 60);
    assert_eq!(entries[0]["dueReason"], "new-topic");

    let (status, reviewed) = send(
        &app,
        "PUT",
        &format!("/api/topics/{topic_id}/review"),
        user,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["reviewCount"], 1);
    assert_eq!(reviewed["status"], "learning");

    // Reviewed and its exam is far away: nothing left for today.
    let (_, schedule) = send(&app, "GET", "/api/study/schedule", user, None).await;
    assert_eq!(schedule, json!([]));

    let (status, summary) = send(&app, "GET", "/api/study/summary", user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary[0]["name"], "Physics");
    assert_eq!(summary[0]["total"], 1);
    assert_eq!(summary[0]["due"], 0);
}

#[tokio::test]
async fn users_are_isolated() {
    let app = app();
    let (_, subject) = send(
        &app,
        "POST",
        "/api/subjects",
        Some("u1"),
        Some(json!({ "name": "Math" })),
    )
    .await;
    let subject_id = subject["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/api/topics",
        Some("u2"),
        Some(json!({ "subjectId": subject_id, "name": "Algebra" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, subjects) = send(&app, "GET", "/api/subjects", Some("u2"), None).await;
    assert_eq!(subjects, json!([]));
}

#[tokio::test]
async fn preferences_round_trip_and_shape_schedule() {
    let app = app();
    let user = Some("u1");

    let (status, prefs) = send(&app, "GET", "/api/preferences", user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs["dailyStudyGoalMinutes"], 60);
    assert_eq!(prefs["topicPriorityWeight"], "balanced");

    let (status, prefs) = send(
        &app,
        "PUT",
        "/api/preferences",
        user,
        Some(json!({
            "dailyStudyGoal": "1.5 hours",
            "topicPriorityWeight": "hard-focus",
            "reviewFrequency": "nonsense"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs["dailyStudyGoalMinutes"], 90);
    assert_eq!(prefs["topicPriorityWeight"], "hard-focus");
    assert_eq!(prefs["reviewFrequency"], "standard");

    let (_, subject) = send(
        &app,
        "POST",
        "/api/subjects",
        user,
        Some(json!({ "name": "Chemistry" })),
    )
    .await;
    let subject_id = subject["id"].as_str().unwrap();
    for name in ["Acids", "Bonds", "Gases"] {
        send(
            &app,
            "POST",
            "/api/topics",
            user,
            Some(json!({ "subjectId": subject_id, "name": name })),
        )
        .await;
    }
    let (_, schedule) = send(&app, "GET", "/api/study/schedule", user, None).await;
    let entries = schedule.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e["allocatedMinutes"] == 30));
}

#[tokio::test]
async fn subject_delete_cascades_to_topics() {
    let app = app();
    let user = Some("u1");
    let (_, subject) = send(
        &app,
        "POST",
        "/api/subjects",
        user,
        Some(json!({ "name": "Biology" })),
    )
    .await;
    let subject_id = subject["id"].as_str().unwrap().to_string();
    let (_, topic) = send(
        &app,
        "POST",
        "/api/topics",
        user,
        Some(json!({ "subjectId": subject_id, "name": "Cells" })),
    )
    .await;
    let topic_id = topic["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/subjects/{subject_id}"),
        user,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/api/topics/{topic_id}"), user, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/subjects",
        Some("u1"),
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "invalid input: subject name is required");
}

#[tokio::test]
async fn bad_bodies_get_json_errors() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/subjects", Some("u1"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("name"));

    let req = Request::builder()
        .method("POST")
        .uri("/api/topics")
        .header(USER_HEADER, "u1")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/preferences",
        Some("u1"),
        Some(json!(42)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn schedule_reports_orphaned_topics_in_header() {
    let mut store = MemoryStore::new();
    store
        .save_topic(&Topic::new("u1", "gone", "Optics", Difficulty::Hard, Utc::now()))
        .unwrap();
    let app = router(store, EngineConfig::default());

    let req = Request::builder()
        .uri("/api/study/schedule")
        .header(USER_HEADER, "u1")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[SCHEDULE_ISSUES_HEADER], "1");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), json!([]));

    // A clean schedule carries no such header.
    let req = Request::builder()
        .uri("/api/study/schedule")
        .header(USER_HEADER, "u2")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.headers().contains_key(SCHEDULE_ISSUES_HEADER));
}
