use api_lib::web::{self, state::AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use lms_core::{
    memory::InMemoryStore, Course, LateSubmissionPolicy, Principal, QuestionType, Quiz,
    QuizQuestion, QuizQuestionOption, Role,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const STUDENT: &str = "student-token";
const OTHER_STUDENT: &str = "other-student-token";
const INSTRUCTOR: &str = "instructor-token";

fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.add_token(STUDENT, Principal::new(1, Role::Student));
    store.add_token(OTHER_STUDENT, Principal::new(2, Role::Student));
    store.add_token(INSTRUCTOR, Principal::new(10, Role::Instructor));

    store.add_course(Course {
        id: 1,
        title: "Rust 101".to_string(),
        is_published: true,
        enrollment_limit: Some(1),
        instructor_id: Some(10),
    });
    store.add_course(Course {
        id: 2,
        title: "Drafts".to_string(),
        is_published: false,
        enrollment_limit: None,
        instructor_id: Some(10),
    });

    store.add_quiz(Quiz {
        id: 7,
        lesson_id: 1,
        title: "Ownership".to_string(),
        passing_score: 70,
        time_limit_minutes: None,
        max_attempts: Some(2),
    });
    for (question_id, order_index) in [(101, 0), (102, 1), (103, 2)] {
        store.add_question(QuizQuestion {
            id: question_id,
            quiz_id: 7,
            question_text: format!("Question {}", question_id),
            question_type: QuestionType::MultipleChoice,
            points: 1,
            order_index,
        });
        // Option `question_id * 10 + 1` is the correct one.
        for (offset, is_correct) in [(1, true), (2, false)] {
            store.add_option(QuizQuestionOption {
                id: question_id * 10 + offset,
                question_id,
                option_text: format!("Option {}", offset),
                is_correct,
                order_index: offset as i32,
            });
        }
    }
    store
}

fn app(store: Arc<InMemoryStore>) -> Router {
    let state = AppState::new(store.clone(), store, LateSubmissionPolicy::Accept);
    web::router(Arc::new(state))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    call(app, "GET", uri, Some(token), None).await
}

async fn post(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    call(app, "POST", uri, Some(token), Some(body)).await
}

async fn enroll(app: &Router, token: &str, course_id: i64) -> (StatusCode, Value) {
    post(app, "/api/enrollments", token, json!({ "course_id": course_id })).await
}

async fn start_attempt(app: &Router, quiz_id: i64, token: &str) -> (StatusCode, Value) {
    let uri = format!("/api/quizzes/{}/attempts", quiz_id);
    call(app, "POST", &uri, Some(token), None).await
}

#[tokio::test]
async fn health_is_public() {
    let app = app(seeded_store());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn missing_or_unknown_credentials_are_rejected() {
    let app = app(seeded_store());
    let (status, _) = call(&app, "GET", "/api/enrollments/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, "GET", "/api/enrollments/me", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = app(seeded_store());
    let request = Request::builder()
        .uri("/api/enrollments/me")
        .header(header::COOKIE, format!("session={}", STUDENT))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn enrollment_flow_maps_each_failure_to_its_status() {
    let app = app(seeded_store());

    let (status, body) = enroll(&app, STUDENT, 1).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["course_id"], 1);
    assert_eq!(body["status"], "active");
    assert_eq!(body["progress"], 0.0);

    let (status, body) = enroll(&app, STUDENT, 1).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_exists");

    let (status, body) = enroll(&app, OTHER_STUDENT, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "capacity_exceeded");

    let (status, body) = enroll(&app, STUDENT, 2).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_eligible");

    let (status, body) = enroll(&app, STUDENT, 99).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = enroll(&app, INSTRUCTOR, 1).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "role_not_permitted");
}

#[tokio::test]
async fn malformed_bodies_are_invalid_input() {
    let app = app(seeded_store());
    let (status, body) = post(&app, "/api/enrollments", STUDENT, json!({ "course": "one" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let wrapped = json!({ "answers": [] });
    let (status, body) = post(&app, "/api/attempts/1/submit", STUDENT, wrapped).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn enrollment_listings_respect_ownership() {
    let app = app(seeded_store());
    let (_, enrolled) = enroll(&app, STUDENT, 1).await;
    let id = enrolled["id"].as_i64().unwrap();

    let (status, body) = get(&app, "/api/enrollments/me?status=active", STUDENT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = get(&app, "/api/enrollments/me?status=paused", STUDENT).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, _) = get(&app, &format!("/api/enrollments/{}", id), OTHER_STUDENT).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(&app, "/api/courses/1/enrollments", INSTRUCTOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["user_id"], 1);

    let (status, _) = get(&app, "/api/courses/1/enrollments", STUDENT).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn attempt_lifecycle_over_http() {
    let app = app(seeded_store());

    let (status, started) = start_attempt(&app, 7, STUDENT).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(started["attempt"]["attempt_number"], 1);
    let questions = started["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    for question in questions {
        for option in question["options"].as_array().unwrap() {
            assert!(option.get("is_correct").is_none());
        }
    }
    let attempt_id = started["attempt"]["id"].as_i64().unwrap();

    let answers = json!([
        { "question_id": 101, "selected_option_id": 1011 },
        { "question_id": 102, "selected_option_id": 1022 },
        { "question_id": 103, "selected_option_id": 1032 }
    ]);
    let uri = format!("/api/attempts/{}/submit", attempt_id);

    let (status, _) = post(&app, &uri, OTHER_STUDENT, answers.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, graded) = post(&app, &uri, STUDENT, answers.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graded["score"], 33.33);
    assert_eq!(graded["passed"], false);
    assert!(graded["completed_at"].is_string());

    let (status, body) = post(&app, &uri, STUDENT, answers).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already_completed");

    let (status, body) = get(&app, "/api/quizzes/7/attempts/me", STUDENT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn attempt_cap_and_missing_resources() {
    let app = app(seeded_store());
    for _ in 0..2 {
        let (status, _) = start_attempt(&app, 7, STUDENT).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = start_attempt(&app, 7, STUDENT).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "attempt_limit_exceeded");

    let (status, _) = start_attempt(&app, 404, STUDENT).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/api/attempts/404/submit", STUDENT, json!([])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
