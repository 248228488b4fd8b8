//! Comment Tests
//!
//! Covers comments nested under posts: scoping, authorship and validation.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn list_comments_for_missing_post() {
    let app = app().await;

    let resp = app.get("/api/v1/posts/999/comments/", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

#[tokio::test]
async fn create_and_list_comments() {
    let app = app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let post_id = app.create_post(&alice, "hello").await;

    let resp = app
        .post_json(
            &format!("/api/v1/posts/{}/comments/", post_id),
            json!({ "text": "nice post" }),
            Some(&bob.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["author"], "bob");
    assert_eq!(body["post"], post_id);
    assert_eq!(body["text"], "nice post");
    assert!(body["created"].is_string());

    let resp = app
        .get(&format!("/api/v1/posts/{}/comments/", post_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_comment_anonymous_rejected() {
    let app = app().await;
    let alice = app.create_user("alice").await;
    let post_id = app.create_post(&alice, "hello").await;

    let resp = app
        .post_json(
            &format!("/api/v1/posts/{}/comments/", post_id),
            json!({ "text": "hi" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_comment_on_missing_post() {
    let app = app().await;
    let alice = app.create_user("alice").await;

    let resp = app
        .post_json(
            "/api/v1/posts/999/comments/",
            json!({ "text": "hi" }),
            Some(&alice.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_comment_blank_text() {
    let app = app().await;
    let alice = app.create_user("alice").await;
    let post_id = app.create_post(&alice, "hello").await;

    let resp = app
        .post_json(
            &format!("/api/v1/posts/{}/comments/", post_id),
            json!({ "text": "" }),
            Some(&alice.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comment_lookup_is_scoped_to_post() {
    let app = app().await;
    let alice = app.create_user("alice").await;
    let first = app.create_post(&alice, "first").await;
    let second = app.create_post(&alice, "second").await;
    let comment_id = app.create_comment(&alice, first, "on first").await;

    let resp = app
        .get(&format!("/api/v1/posts/{}/comments/{}/", first, comment_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(&format!("/api/v1/posts/{}/comments/{}/", second, comment_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_author_can_edit_or_delete_comment() {
    let app = app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let post_id = app.create_post(&alice, "hello").await;
    let comment_id = app.create_comment(&bob, post_id, "bob was here").await;
    let path = format!("/api/v1/posts/{}/comments/{}/", post_id, comment_id);

    // The post author does not own other people's comments.
    let resp = app
        .patch_json(&path, json!({ "text": "edited" }), Some(&alice.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.delete(&path, Some(&alice.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .put_json(&path, json!({ "text": "edited" }), Some(&bob.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["text"], "edited");

    let resp = app.delete(&path, Some(&bob.access_token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&path, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
