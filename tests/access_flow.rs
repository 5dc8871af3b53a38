mod common;

use axum::http::{Method, StatusCode};
use common::{empty_request, json_request, multipart_request, spawn_app};
use serde_json::json;

#[tokio::test]
async fn role_and_enrollment_gate_course_content() {
    let t = spawn_app();

    let (_, user_a) = t.signup("alice", "user").await;
    let (status, body) = t
        .send(multipart_request(
            Method::POST,
            "/course",
            Some(&user_a),
            &[("name", "Rust 101"), ("description", "intro")],
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (admin_id, admin) = t.signup("bob", "admin").await;
    let course = t.create_course(&admin, "Rust 101").await;
    assert_eq!(course["owner_id"], admin_id.as_str());
    assert_eq!(course["price"], 10.0);
    let course_id = course["id"].as_str().unwrap();

    let (status, stored) = t
        .send(empty_request(Method::GET, &format!("/course/{course_id}"), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["name"], "Rust 101");

    let lessons_uri = format!("/course/{course_id}/lessons");
    let (status, body) = t
        .send(empty_request(Method::GET, &lessons_uri, Some(&user_a)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_enrolled");

    let (status, enrollment) = t
        .send(empty_request(
            Method::POST,
            &format!("/course/{course_id}/enroll"),
            Some(&user_a),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{enrollment}");
    assert_eq!(enrollment["course_id"], course_id);

    let (status, lessons) = t
        .send(empty_request(Method::GET, &lessons_uri, Some(&user_a)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lessons, json!([]));

    let (status, body) = t.send(empty_request(Method::GET, &lessons_uri, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_credential");
}

#[tokio::test]
async fn admin_reads_content_without_enrolling() {
    let t = spawn_app();
    let (_, admin) = t.signup("root", "admin").await;
    let course = t.create_course(&admin, "Ops").await;
    let course_id = course["id"].as_str().unwrap();

    let (status, _) = t
        .send(empty_request(
            Method::GET,
            &format!("/course/{course_id}/quizzes"),
            Some(&admin),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_course_reference_is_rejected_before_lookup() {
    let t = spawn_app();
    let (_, user) = t.signup("carol", "user").await;

    for raw in ["42", "not-a-uuid"] {
        let (status, body) = t
            .send(empty_request(
                Method::GET,
                &format!("/course/{raw}/lessons"),
                Some(&user),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
        assert_eq!(body["error"], "malformed_resource_reference");
    }
}

#[tokio::test]
async fn duplicate_and_missing_enrollments() {
    let t = spawn_app();
    let (_, admin) = t.signup("root", "admin").await;
    let (_, user) = t.signup("dave", "user").await;
    let course = t.create_course(&admin, "Go").await;
    let enroll_uri = format!("/course/{}/enroll", course["id"].as_str().unwrap());

    let (status, body) = t
        .send(empty_request(Method::DELETE, &enroll_uri, Some(&user)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = t
        .send(empty_request(Method::POST, &enroll_uri, Some(&user)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = t
        .send(empty_request(Method::POST, &enroll_uri, Some(&user)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, mine) = t
        .send(empty_request(Method::GET, "/enrollments", Some(&user)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["course"]["name"], "Go");

    let (status, roster) = t
        .send(empty_request(
            Method::GET,
            &format!("/course/{}/students", course["id"].as_str().unwrap()),
            Some(&admin),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster["students"][0]["username"], "dave");

    let (status, _) = t
        .send(empty_request(Method::DELETE, &enroll_uri, Some(&user)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn enrolling_in_unknown_course_is_not_found() {
    let t = spawn_app();
    let (_, user) = t.signup("erin", "user").await;
    let (status, body) = t
        .send(empty_request(
            Method::POST,
            &format!("/course/{}/enroll", uuid::Uuid::new_v4()),
            Some(&user),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn concurrent_enrolls_create_one_row() {
    let t = spawn_app();
    let (_, admin) = t.signup("root", "admin").await;
    let (user_id, user) = t.signup("frank", "user").await;
    let course = t.create_course(&admin, "Concurrency").await;
    let course_id = course["id"].as_str().unwrap().to_string();

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let app = t.app.clone();
            let req = empty_request(
                Method::POST,
                &format!("/course/{course_id}/enroll"),
                Some(&user),
            );
            tokio::spawn(async move {
                use tower::ServiceExt;
                app.oneshot(req).await.unwrap().status()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for attempt in attempts {
        statuses.push(attempt.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 7);
    assert_eq!(
        t.store.enrollment_count(user_id.parse().unwrap(), course_id.parse().unwrap()),
        1
    );
}

#[tokio::test]
async fn nested_content_must_belong_to_the_addressed_course() {
    let t = spawn_app();
    let (_, admin) = t.signup("root", "admin").await;
    let (_, user) = t.signup("gina", "user").await;
    let first = t.create_course(&admin, "First").await;
    let second = t.create_course(&admin, "Second").await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    let (status, quiz) = t
        .send(json_request(
            Method::POST,
            "/quiz",
            Some(&admin),
            json!({ "name": "Q1", "description": "basics", "course_id": first_id }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{quiz}");
    let quiz_id = quiz["id"].as_str().unwrap();

    let (status, answer) = t
        .send(json_request(
            Method::POST,
            "/answer",
            Some(&admin),
            json!({ "content": "ownership", "quiz_id": quiz_id }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{answer}");

    for course_id in [first_id, second_id] {
        let (status, _) = t
            .send(empty_request(
                Method::POST,
                &format!("/course/{course_id}/enroll"),
                Some(&user),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, answers) = t
        .send(empty_request(
            Method::GET,
            &format!("/course/{first_id}/quizzes/{quiz_id}/answers"),
            Some(&user),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answers[0]["content"], "ownership");

    let (status, body) = t
        .send(empty_request(
            Method::GET,
            &format!("/course/{second_id}/quizzes/{quiz_id}"),
            Some(&user),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn storage_outage_surfaces_as_storage_unavailable() {
    let t = spawn_app();
    let (_, admin) = t.signup("root", "admin").await;
    let (_, user) = t.signup("hank", "user").await;
    let course = t.create_course(&admin, "Outage").await;
    let course_id = course["id"].as_str().unwrap();

    t.store.set_offline(true);
    let (status, body) = t
        .send(empty_request(
            Method::GET,
            &format!("/course/{course_id}/lessons"),
            Some(&user),
        ))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "storage_unavailable");

    let (status, body) = t
        .send(empty_request(
            Method::DELETE,
            &format!("/course/{course_id}/enroll"),
            Some(&user),
        ))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "storage_unavailable");
}
