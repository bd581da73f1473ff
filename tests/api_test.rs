mod common;

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use campus_assessment::{
    config::Config,
    models::{catalog::TestType, user::Actor},
    routes,
};
use chrono::Duration;
use common::*;
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

fn app(h: &Harness) -> Router {
    routes::api_router(&config()).with_state(h.state.clone())
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    actor: Option<&Actor>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(actor)));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

fn test_body(test_type: &str, correct: &[&str]) -> JsonValue {
    let questions: Vec<JsonValue> = correct
        .iter()
        .enumerate()
        .map(|(i, c)| {
            json!({
                "text": format!("Question {}", i + 1),
                "options": {"A": "alpha", "B": "beta", "C": "gamma", "D": "delta"},
                "correctAnswer": c
            })
        })
        .collect();
    json!({
        "name": "Aptitude Round 1",
        "description": "Quantitative screening",
        "subject": "Arithmetic",
        "testType": test_type,
        "topics": ["percentages"],
        "difficulty": "Easy",
        "numberOfQuestions": correct.len(),
        "marksPerQuestion": 4,
        "durationMinutes": 30,
        "startAt": window_start(),
        "endAt": window_end(),
        "questions": questions
    })
}

#[tokio::test]
async fn health_is_public() {
    let h = Harness::new();
    let (status, body) = call(&app(&h), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn role_gates_reject_missing_and_wrong_tokens() {
    let h = Harness::new();
    let app = app(&h);
    let college = h.college("North Campus").await;
    let student = h.student(&college, "Asha", "CSE", "2025", "A").await;

    let (status, body) = call(&app, "GET", "/api/master/tests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = call(&app, "GET", "/api/master/tests", Some(&as_actor(&student)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = call(&app, "GET", "/api/student/tests", Some(&h.master), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "GET",
        "/api/college/reports/performance?groupBy=section",
        Some(&faculty(&college)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "GET", "/api/college/assignments", Some(&faculty(&college)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = Request::builder()
        .uri("/api/master/tests")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_test_reports_field_errors() {
    let h = Harness::new();
    let mut body = test_body("CompanyTest", &["A", "B"]);
    body["numberOfQuestions"] = json!(3);
    body["endAt"] = json!(window_start());

    let (status, resp) = call(&app(&h), "POST", "/api/master/tests", Some(&h.master), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "validation_error");
    let fields = resp["fields"].as_object().unwrap();
    assert!(fields.contains_key("endAt"));
    assert!(fields.contains_key("companyName"));
    assert!(fields.contains_key("questions"));
}

#[tokio::test]
async fn assessment_flow_over_http() {
    let h = Harness::new();
    let app = app(&h);
    let master = h.master.clone();

    let (status, college) = call(
        &app,
        "POST",
        "/api/master/colleges",
        Some(&master),
        Some(json!({"name": "North Campus", "email": "tpo@north.example.edu"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let college_id: Uuid = college["id"].as_str().unwrap().parse().unwrap();
    let admin = Actor {
        id: Uuid::new_v4(),
        role: campus_assessment::models::user::Role::CollegeAdmin,
        college_id: Some(college_id),
    };

    let mut students = Vec::new();
    for (name, section) in [("Asha", "A"), ("Ben", "B")] {
        let (status, student) = call(
            &app,
            "POST",
            "/api/college/students",
            Some(&admin),
            Some(json!({"name": name, "branch": "CSE", "batch": "2025", "section": section})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        students.push(Actor {
            id: student["id"].as_str().unwrap().parse().unwrap(),
            role: campus_assessment::models::user::Role::Student,
            college_id: Some(college_id),
        });
    }
    let (asha, ben) = (&students[0], &students[1]);

    let (status, created) = call(
        &app,
        "POST",
        "/api/master/tests",
        Some(&master),
        Some(test_body("Assessment", &["A", "B", "C"])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["totalMarks"], 12);
    let test_id = created["id"].as_str().unwrap().to_string();

    let (status, assigned) = call(
        &app,
        "POST",
        &format!("/api/master/tests/{}/colleges", test_id),
        Some(&master),
        Some(json!({"collegeIds": [college_id]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned, json!({"created": 1, "skipped": 0}));

    let (status, listed) = call(&app, "GET", "/api/college/assignments", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["status"], "pending");
    assert_eq!(listed[0]["test"]["name"], "Aptitude Round 1");
    let assignment_id = listed[0]["id"].as_str().unwrap().to_string();

    let decision_uri = format!("/api/college/assignments/{}/decision", assignment_id);
    let (status, decided) = call(
        &app,
        "POST",
        &decision_uri,
        Some(&admin),
        Some(json!({"decision": "accepted"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["status"], "accepted");
    let (status, body) = call(
        &app,
        "POST",
        &decision_uri,
        Some(&admin),
        Some(json!({"decision": "rejected"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    let (status, resolved) = call(
        &app,
        "POST",
        &format!("/api/college/assignments/{}/students", assignment_id),
        Some(&admin),
        Some(json!({"branches": ["CSE"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["resolvedCount"], 2);

    let (status, mine) = call(&app, "GET", "/api/student/tests", Some(asha), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["participation"], "assigned");

    let (status, paper) = call(&app, "GET", &format!("/api/student/tests/{}", test_id), Some(asha), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!paper.to_string().contains("correctAnswer"));

    let begin_uri = format!("/api/student/tests/{}/begin", test_id);
    let (status, body) = call(&app, "POST", &begin_uri, Some(asha), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "window_error");
    assert_eq!(body["reason"], "not_started");

    h.clock.set(window_start() + Duration::minutes(1));
    let (status, begun) = call(&app, "POST", &begin_uri, Some(asha), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!begun.to_string().contains("correctAnswer"));

    let submit_uri = format!("/api/student/tests/{}/submit", test_id);
    let answers = json!({
        "answers": [
            {"questionId": 1, "selectedAnswer": "A", "timeSpent": 30},
            {"questionId": 2, "selectedAnswer": "B"},
            {"questionId": 3, "selectedAnswer": null}
        ],
        "startTime": begun["startedAt"],
        "timeSpent": 9
    });
    let (status, scored) = call(&app, "POST", &submit_uri, Some(asha), Some(answers.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scored["marksObtained"], 8);
    assert_eq!(scored["percentage"], 66.67);
    assert!(scored.get("instantFeedback").is_none());

    let (status, body) = call(&app, "POST", &submit_uri, Some(asha), Some(answers)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_attempted");

    let (status, results) = call(
        &app,
        "GET",
        &format!("/api/student/tests/{}/results", test_id),
        Some(asha),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["questions"][2]["correctAnswer"], "C");

    let (status, history) = call(&app, "GET", "/api/student/attempts", Some(asha), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    h.clock.set(window_end());
    let (status, body) = call(&app, "POST", &begin_uri, Some(ben), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "ended");

    let (status, stats) = call(
        &app,
        "GET",
        &format!("/api/master/tests/{}/statistics?collegeId={}", test_id, college_id),
        Some(&master),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["assignedCount"], 2);
    assert_eq!(stats["completedCount"], 1);
    assert_eq!(stats["completionRate"], 50.0);

    let (status, own) = call(
        &app,
        "GET",
        &format!("/api/college/tests/{}/statistics", test_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["collegeId"], college_id.to_string());

    let req = Request::builder()
        .uri(format!("/api/master/tests/{}/export", test_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token(&master)))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn practice_submission_over_http_includes_feedback() {
    let h = Harness::new();
    let app = app(&h);
    let college = h.college("North Campus").await;
    let asha = h.student(&college, "Asha", "IT", "2025", "A").await;
    let test = h.create_test(TestType::Practice, &["B"]).await;
    h.deliver(&test, &college, &[&asha]).await;
    h.clock.set(test.start_at);

    let (status, scored) = call(
        &app,
        "POST",
        &format!("/api/student/tests/{}/submit", test.id),
        Some(&as_actor(&asha)),
        Some(json!({
            "answers": [{"questionId": 1, "selectedAnswer": "D"}],
            "startTime": test.start_at,
            "timeSpent": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scored["instantFeedback"][0]["correctAnswer"], "B");
    assert_eq!(scored["instantFeedback"][0]["isCorrect"], false);
}

#[tokio::test]
async fn other_college_cannot_decide() {
    let h = Harness::new();
    let app = app(&h);
    let north = h.college("North Campus").await;
    let south = h.college("South Campus").await;
    let test = h.create_test(TestType::Assessment, &["A"]).await;
    h.state
        .assignment_service
        .assign_to_colleges(&h.master, test.id, &[north.id])
        .await
        .unwrap();
    let assignment_id = h.state.assignment_service.list_for_test(test.id).await.unwrap()[0]
        .assignment
        .id;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/college/assignments/{}/decision", assignment_id),
        Some(&admin(&south)),
        Some(json!({"decision": "accepted"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn question_paper_upload_is_parsed() {
    let h = Harness::new();
    let boundary = "XBOUNDARYX";
    let paper = "1. What is 15% of 200?\nA) 20\nB) 25\nC) 30\nD) 35\nAnswer: C\n";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"paper.txt\"\r\nContent-Type: text/plain\r\n\r\n{p}\r\n--{b}--\r\n",
        b = boundary,
        p = paper
    );
    let req = Request::builder()
        .method("POST")
        .uri("/api/master/questions/extract")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(&h.master)))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let res = app(&h).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let drafts: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(drafts["count"], 1);
    assert_eq!(drafts["questions"][0]["correctAnswer"], "C");
    assert_eq!(drafts["questions"][0]["options"]["C"], "30");
}

#[tokio::test]
async fn generation_without_credentials_is_unprocessable() {
    let h = Harness::new();
    let (status, body) = call(
        &app(&h),
        "POST",
        "/api/master/questions/generate",
        Some(&h.master),
        Some(json!({"subject": "Verbal", "count": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "extraction_error");
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_escape_the_limit() {
    let h = Harness::new();
    let app = routes::api_router(&Config {
        api_rps: 1,
        ..config()
    })
    .with_state(h.state.clone());
    let peer: SocketAddr = "203.0.113.7:5000".parse().unwrap();

    let mut statuses = Vec::new();
    for forwarded in ["198.51.100.1", "198.51.100.2"] {
        let mut req = Request::builder()
            .uri("/api/student/tests")
            .header("x-forwarded-for", forwarded)
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        statuses.push(app.clone().oneshot(req).await.unwrap().status());
    }
    assert_ne!(statuses[0], StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(statuses[1], StatusCode::TOO_MANY_REQUESTS);
}
