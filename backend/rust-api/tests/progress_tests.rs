use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serial_test::serial;
use tower::ServiceExt;
use uuid::Uuid;

mod common;

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!("non-JSON body: {}", String::from_utf8_lossy(&bytes));
        })
    };
    (status, json)
}

async fn mark_viewed(
    app: &Router,
    user_id: &str,
    kind: &str,
    item_id: &str,
) -> (StatusCode, serde_json::Value) {
    send(
        app,
        "POST",
        &format!("/api/v1/content/{}/{}/view", kind, item_id),
        Some(json!({ "user_id": user_id })),
    )
    .await
}

#[tokio::test]
#[serial]
async fn test_progress_walks_to_completion() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let (status, body) = mark_viewed(&app, &user_id, "document", common::DOC_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["module_id"], common::TEST_MODULE);
    assert_eq!(body["contents_completed"], 1);
    assert_eq!(body["total_contents"], 3);
    assert_eq!(body["progress_percentage"], 33.33);
    assert_eq!(body["completed"], false);

    let (status, body) = mark_viewed(&app, &user_id, "embedded-video", common::VIDEO_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["contents_completed"], 2);
    assert_eq!(body["progress_percentage"], 66.67);
    assert_eq!(body["completed"], false);

    let (status, body) = mark_viewed(&app, &user_id, "quiz-task", common::QUIZ_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["contents_completed"], 3);
    assert_eq!(body["progress_percentage"], 100.0);
    assert_eq!(body["completed"], true);
}

#[tokio::test]
#[serial]
async fn test_mark_viewed_is_idempotent() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let (status, first) = mark_viewed(&app, &user_id, "document", common::DOC_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", first);

    let (status, second) = mark_viewed(&app, &user_id, "document", common::DOC_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", second);
    assert_eq!(second["contents_completed"], 1);
    assert_eq!(second["progress_percentage"], 33.33);
    assert_eq!(second["viewed_at"], first["viewed_at"]);
}

#[tokio::test]
#[serial]
async fn test_mark_viewed_unknown_kind_returns_400() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let (status, body) = mark_viewed(&app, &user_id, "banana", common::DOC_ITEM).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");
}

#[tokio::test]
#[serial]
async fn test_mark_viewed_unknown_item_returns_404() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());
    let missing = Uuid::new_v4().to_string();

    let (status, body) = mark_viewed(&app, &user_id, "document", &missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
#[serial]
async fn test_completed_content_lists_only_viewed_items() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    mark_viewed(&app, &user_id, "document", common::DOC_ITEM).await;
    mark_viewed(&app, &user_id, "quiz-task", common::QUIZ_ITEM).await;

    let (status, body) = send(
        &app,
        "GET",
        &format!(
            "/api/v1/modules/{}/completed-content?user_id={}",
            common::TEST_MODULE,
            user_id
        ),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["module_id"], common::TEST_MODULE);
    let ids: Vec<&str> = body["content_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&common::DOC_ITEM));
    assert!(ids.contains(&common::QUIZ_ITEM));
    assert!(!ids.contains(&common::VIDEO_ITEM));
}

#[tokio::test]
#[serial]
async fn test_views_are_isolated_per_user() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let viewer = format!("user-{}", Uuid::new_v4());
    let other = format!("user-{}", Uuid::new_v4());

    mark_viewed(&app, &viewer, "document", common::DOC_ITEM).await;

    let (status, body) = send(
        &app,
        "GET",
        &format!(
            "/api/v1/modules/{}/completed-content?user_id={}",
            common::TEST_MODULE,
            other
        ),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["content_ids"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn test_views_never_leak_across_modules() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let (status, body) = mark_viewed(&app, &user_id, "document", common::DOC_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["module_id"], common::TEST_MODULE);

    // The other module's aggregate is untouched by the view above.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/modules/{}/progress/recompute", common::OTHER_MODULE),
        Some(json!({ "user_id": user_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["module_id"], common::OTHER_MODULE);
    assert_eq!(body["contents_completed"], 0);
    assert_eq!(body["total_contents"], 1);
    assert_eq!(body["progress_percentage"], 0.0);
    assert_eq!(body["completed"], false);
}

#[tokio::test]
#[serial]
async fn test_completion_is_stable_under_repeat_views() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let (status, body) = mark_viewed(&app, &user_id, "document", common::OTHER_DOC_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["module_id"], common::OTHER_MODULE);
    assert_eq!(body["completed"], true);
    assert_eq!(body["progress_percentage"], 100.0);

    // Re-viewing content in a completed module never un-completes it.
    let (status, body) = mark_viewed(&app, &user_id, "document", common::OTHER_DOC_ITEM).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["completed"], true);
    assert_eq!(body["contents_completed"], 1);
    assert_eq!(body["total_contents"], 1);
    assert_eq!(body["progress_percentage"], 100.0);
}

#[tokio::test]
#[serial]
async fn test_view_counter_counts_first_views_once() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let before = learnhub_api::metrics::CONTENT_VIEWS_TOTAL
        .with_label_values(&["document"])
        .get();

    mark_viewed(&app, &user_id, "document", common::DOC_ITEM).await;
    mark_viewed(&app, &user_id, "document", common::DOC_ITEM).await;

    let after = learnhub_api::metrics::CONTENT_VIEWS_TOTAL
        .with_label_values(&["document"])
        .get();
    assert_eq!(after - before, 1);
}

#[tokio::test]
#[serial]
async fn test_recompute_repairs_aggregate() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    mark_viewed(&app, &user_id, "embedded-video", common::VIDEO_ITEM).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/modules/{}/progress/recompute", common::TEST_MODULE),
        Some(json!({ "user_id": user_id })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["contents_completed"], 1);
    assert_eq!(body["total_contents"], 3);
    assert_eq!(body["progress_percentage"], 33.33);
    assert_eq!(body["completed"], false);
}

#[tokio::test]
#[serial]
async fn test_recompute_unknown_module_returns_404() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/modules/no-such-module/progress/recompute",
        Some(json!({ "user_id": user_id })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
#[serial]
async fn test_admin_create_then_duplicate_conflicts() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let request = json!({
        "user_id": user_id,
        "module_id": common::TEST_MODULE,
    });

    let (status, body) = send(&app, "POST", "/admin/progress", Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["user_id"], user_id);
    assert_eq!(body["contents_completed"], 0);

    let (status, body) = send(&app, "POST", "/admin/progress", Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
#[serial]
async fn test_admin_patch_validates_percentage() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    send(
        &app,
        "POST",
        "/admin/progress",
        Some(json!({ "user_id": user_id, "module_id": common::TEST_MODULE })),
    )
    .await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/admin/progress/{}/{}", user_id, common::TEST_MODULE),
        Some(json!({ "progress_percentage": 150.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
    assert_eq!(body["error"], "invalid_argument");

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/admin/progress/{}/{}", user_id, common::TEST_MODULE),
        Some(json!({ "pinned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["pinned"], true);
}

#[tokio::test]
#[serial]
async fn test_admin_patch_missing_row_returns_404() {
    let Some(app) = common::create_test_app().await else {
        return;
    };
    let user_id = format!("user-{}", Uuid::new_v4());

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/admin/progress/{}/{}", user_id, common::TEST_MODULE),
        Some(json!({ "liked": true })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
