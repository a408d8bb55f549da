//! Resource Tests
//!
//! Covers upload, the filtered feed, reactions, downloads and author-only
//! edit/delete through the HTTP API.

mod common;

use axum::http::StatusCode;
use common::{app, BLOB_BASE, UPLOAD_MAX_BYTES};
use serde_json::{json, Value};
use uuid::Uuid;

fn titles(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap().to_string())
        .collect()
}

// ===========================================================================
// Upload
// ===========================================================================

#[tokio::test]
async fn upload_stores_file_and_metadata() {
    let app = app().await;
    let viewer = app.sign_in("Ana").await;

    let body = app
        .upload(
            &[
                ("title", "  Forest Camp Kit  "),
                ("description", "Everything for a weekend camp"),
                ("category", "Camps"),
                ("tags", "outdoors, forest,"),
                ("tags", "summer"),
                ("cost", "Low Cost (Self-funded)"),
                ("time_commitment", "High (Multi-day project)"),
                ("audience", "High School"),
                ("location", "Ohrid"),
            ],
            Some(&viewer.token),
        )
        .await;

    assert_eq!(body["title"], "Forest Camp Kit");
    assert_eq!(body["category"], "Camps");
    assert_eq!(body["cost"], "Low Cost (Self-funded)");
    assert_eq!(body["time_commitment"], "High (Multi-day project)");
    assert_eq!(body["audience"], "High School");
    assert_eq!(body["location"], "Ohrid");
    assert_eq!(body["author_name"], "Ana");
    assert_eq!(body["author_id"], viewer.id.to_string());
    assert_eq!(body["likes"], 0);
    assert_eq!(body["upvotes"], 0);
    assert_eq!(body["is_author"], true);

    let tags: Vec<&str> = body["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag.as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["Camps", "forest", "outdoors", "summer"]);

    let url = body["file"]["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{}resources/", BLOB_BASE)), "{}", url);
    assert!(url.ends_with("_notes.txt"));
    assert_eq!(body["file"]["name"], "notes.txt");
    assert_eq!(body["file"]["content_type"], "text/plain");
    assert_eq!(body["file"]["size_mb"], 0.0);
    assert_eq!(body["file"]["sha256"].as_str().unwrap().len(), 64);

    let key = url.trim_start_matches(BLOB_BASE);
    let (content_type, stored) = app.blobs.get(key).await.expect("blob stored");
    assert_eq!(content_type, "text/plain");
    assert_eq!(&stored[..], b"lesson notes");
}

#[tokio::test]
async fn upload_applies_defaults() {
    let app = app().await;

    let body = app
        .upload(
            &[
                ("title", "Bare"),
                ("description", "Only the required fields"),
                ("category", "CD Resources"),
            ],
            None,
        )
        .await;

    assert_eq!(body["cost"], "Free (0 MKD)");
    assert_eq!(body["time_commitment"], "Quick (< 1 hour)");
    assert_eq!(body["audience"], "Mixed Group");
    assert_eq!(body["author_name"], "Anonymous");
    assert!(body["author_id"].is_null());
    assert!(body["location"].is_null());
}

#[tokio::test]
async fn upload_requires_a_file() {
    let app = app().await;

    let resp = app
        .post_multipart(
            "/v1/resources",
            &[("title", "No file"), ("description", "d"), ("category", "Clubs")],
            None,
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "file is required");
    assert_eq!(app.blobs.len().await, 0);
}

#[tokio::test]
async fn upload_rejects_invalid_metadata_before_storing_anything() {
    let app = app().await;
    let file = Some(("a.pdf", "application/pdf", &b"%PDF"[..]));

    let resp = app
        .post_multipart(
            "/v1/resources",
            &[("description", "d"), ("category", "Clubs")],
            file,
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "title is required");

    let resp = app
        .post_multipart(
            "/v1/resources",
            &[("title", "t"), ("description", "d"), ("category", "Gardening")],
            file,
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "unknown Category: Gardening");

    let long_title = "a".repeat(201);
    let resp = app
        .post_multipart(
            "/v1/resources",
            &[("title", long_title.as_str()), ("description", "d"), ("category", "Clubs")],
            file,
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "title must be at most 200 characters");

    assert_eq!(app.blobs.len().await, 0);
    let feed = app.get("/v1/resources", None).await;
    assert!(feed.json()["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn upload_over_the_size_limit_is_rejected() {
    let app = app().await;
    let big = vec![b'x'; UPLOAD_MAX_BYTES + 1024];

    let resp = app
        .post_multipart(
            "/v1/resources",
            &[("title", "Big"), ("description", "d"), ("category", "Clubs")],
            Some(("big.bin", "application/octet-stream", &big[..])),
            None,
        )
        .await;

    assert!(resp.status.is_client_error(), "{}", resp.status);
    assert_eq!(app.blobs.len().await, 0);
}

// ===========================================================================
// Feed
// ===========================================================================

#[tokio::test]
async fn feed_lists_newest_first() {
    let app = app().await;
    app.create_resource("First", "Camps", None).await;
    app.create_resource("Second", "Clubs", None).await;
    app.create_resource("Third", "Camps", None).await;

    let resp = app.get("/v1/resources", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(titles(&resp.json()), vec!["Third", "Second", "First"]);

    let resp = app.get("/v1/resources?category=Camps", None).await;
    assert_eq!(titles(&resp.json()), vec!["Third", "First"]);
}

#[tokio::test]
async fn search_free_finds_budget_camp_guide_and_expensive_does_not() {
    let app = app().await;
    app.upload(
        &[
            ("title", "Budget Camp Guide"),
            ("description", "Plan a camp on a shoestring"),
            ("category", "Camps"),
            ("cost", "Free (0 MKD)"),
        ],
        None,
    )
    .await;

    let resp = app.get("/v1/resources?q=free", None).await;
    assert_eq!(titles(&resp.json()), vec!["Budget Camp Guide"]);

    let resp = app.get("/v1/resources?q=expensive", None).await;
    assert!(titles(&resp.json()).is_empty());
}

#[tokio::test]
async fn structured_filters_from_query_string() {
    let app = app().await;
    app.upload(
        &[
            ("title", "Free for kids"),
            ("description", "d"),
            ("category", "Clubs"),
            ("cost", "free"),
            ("audience", "primary"),
        ],
        None,
    )
    .await;
    app.upload(
        &[
            ("title", "Grant for kids"),
            ("description", "d"),
            ("category", "Clubs"),
            ("cost", "grant"),
            ("audience", "primary"),
        ],
        None,
    )
    .await;
    app.upload(
        &[
            ("title", "Low cost adults"),
            ("description", "d"),
            ("category", "Clubs"),
            ("cost", "low"),
            ("audience", "adults"),
        ],
        None,
    )
    .await;

    let resp = app.get("/v1/resources?cost=free,low", None).await;
    assert_eq!(titles(&resp.json()), vec!["Low cost adults", "Free for kids"]);

    let resp = app
        .get("/v1/resources?cost=free,low&audience=primary", None)
        .await;
    assert_eq!(titles(&resp.json()), vec!["Free for kids"]);

    let resp = app.get("/v1/resources?cost=pricey", None).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn top_sort_uses_upvotes() {
    let app = app().await;
    let a = app.create_resource("Few", "Camps", None).await;
    let b = app.create_resource("Many", "Camps", None).await;
    let _c = app.create_resource("None", "Camps", None).await;

    for name in ["v1", "v2", "v3"] {
        let viewer = app.sign_in(name).await;
        app.post_empty(&format!("/v1/resources/{}/upvote", b), Some(&viewer.token))
            .await;
    }
    let viewer = app.sign_in("v4").await;
    app.post_empty(&format!("/v1/resources/{}/upvote", a), Some(&viewer.token))
        .await;

    let resp = app.get("/v1/resources?sort=top", None).await;
    assert_eq!(titles(&resp.json()), vec!["Many", "Few", "None"]);
}

// ===========================================================================
// Reactions
// ===========================================================================

#[tokio::test]
async fn like_twice_restores_prior_state() {
    let app = app().await;
    let id = app.create_resource("Likeable", "Clubs", None).await;
    let viewer = app.sign_in("Liker").await;
    let path = format!("/v1/resources/{}/like", id);

    let resp = app.post_empty(&path, Some(&viewer.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json(), json!({ "active": true, "count": 1 }));

    let resource = app.get(&format!("/v1/resources/{}", id), Some(&viewer.token)).await;
    assert_eq!(resource.json()["liked"], true);
    assert_eq!(resource.json()["likes"], 1);

    let resp = app.post_empty(&path, Some(&viewer.token)).await;
    assert_eq!(resp.json(), json!({ "active": false, "count": 0 }));

    let resource = app.get(&format!("/v1/resources/{}", id), Some(&viewer.token)).await;
    assert_eq!(resource.json()["liked"], false);
    assert_eq!(resource.json()["likes"], 0);
}

#[tokio::test]
async fn like_and_upvote_are_independent() {
    let app = app().await;
    let id = app.create_resource("Both", "Clubs", None).await;
    let first = app.sign_in("First").await;
    let second = app.sign_in("Second").await;

    app.post_empty(&format!("/v1/resources/{}/like", id), Some(&first.token))
        .await;
    app.post_empty(&format!("/v1/resources/{}/like", id), Some(&second.token))
        .await;
    let resp = app
        .post_empty(&format!("/v1/resources/{}/upvote", id), Some(&first.token))
        .await;
    assert_eq!(resp.json(), json!({ "active": true, "count": 1 }));

    let body = app.get(&format!("/v1/resources/{}", id), Some(&second.token)).await.json();
    assert_eq!(body["likes"], 2);
    assert_eq!(body["upvotes"], 1);
    assert_eq!(body["liked"], true);
    assert_eq!(body["upvoted"], false);
}

#[tokio::test]
async fn reactions_require_a_session() {
    let app = app().await;
    let id = app.create_resource("Guarded", "Clubs", None).await;

    let resp = app.post_empty(&format!("/v1/resources/{}/like", id), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post_empty(&format!("/v1/resources/{}/like", id), Some("not-a-token"))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid token");
}

#[tokio::test]
async fn reacting_to_unknown_resource_is_not_found() {
    let app = app().await;
    let viewer = app.sign_in("Lost").await;

    let resp = app
        .post_empty(
            &format!("/v1/resources/{}/upvote", Uuid::new_v4()),
            Some(&viewer.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "resource not found");
}

#[tokio::test]
async fn liked_page_lists_the_viewers_likes() {
    let app = app().await;
    let kept = app.create_resource("Kept", "Clubs", None).await;
    let _skipped = app.create_resource("Skipped", "Clubs", None).await;
    let viewer = app.sign_in("Saver").await;

    app.post_empty(&format!("/v1/resources/{}/like", kept), Some(&viewer.token))
        .await;

    let resp = app.get("/v1/me/liked", Some(&viewer.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(titles(&resp.json()), vec!["Kept"]);

    let resp = app.get("/v1/me/liked", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Downloads
// ===========================================================================

#[tokio::test]
async fn download_counts_and_returns_url() {
    let app = app().await;
    let id = app.create_resource("Handout", "EE Lesson Plans", None).await;
    let path = format!("/v1/resources/{}/download", id);

    let first = app.post_empty(&path, None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["downloads"], 1);
    assert!(first.json()["url"].as_str().unwrap().starts_with(BLOB_BASE));

    let second = app.post_empty(&path, None).await;
    assert_eq!(second.json()["downloads"], 2);

    let missing = app
        .post_empty(&format!("/v1/resources/{}/download", Uuid::new_v4()), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Edit & delete
// ===========================================================================

#[tokio::test]
async fn author_can_edit_metadata() {
    let app = app().await;
    let author = app.sign_in("Author").await;
    let id = app
        .create_resource("Draft title", "Camps", Some(&author.token))
        .await;

    let resp = app
        .patch_json(
            &format!("/v1/resources/{}", id),
            json!({ "title": "Final title", "category": "Clubs", "tags": ["winter"] }),
            Some(&author.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["title"], "Final title");
    assert_eq!(body["category"], "Clubs");
    assert_eq!(body["tags"], json!(["Clubs", "winter"]));

    let resp = app.get("/v1/resources?category=Clubs", None).await;
    assert_eq!(titles(&resp.json()), vec!["Final title"]);
}

#[tokio::test]
async fn category_only_edit_moves_the_resource_between_filters() {
    let app = app().await;
    let author = app.sign_in("Author").await;
    let id = app.create_resource("Mover", "Camps", Some(&author.token)).await;

    let resp = app
        .patch_json(
            &format!("/v1/resources/{}", id),
            json!({ "category": "Clubs" }),
            Some(&author.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["tags"], json!(["Clubs"]));

    let resp = app.get("/v1/resources?category=Camps", None).await;
    assert!(titles(&resp.json()).is_empty());
    let resp = app.get("/v1/resources?category=Clubs", None).await;
    assert_eq!(titles(&resp.json()), vec!["Mover"]);
}

#[tokio::test]
async fn category_edit_keeps_a_full_tag_set_within_the_limit() {
    let app = app().await;
    let author = app.sign_in("Author").await;
    let tags = (0..19).map(|n| format!("tag{:02}", n)).collect::<Vec<_>>().join(",");
    let body = app
        .upload(
            &[
                ("title", "Packed"),
                ("description", "A shared resource"),
                ("category", "Camps"),
                ("tags", tags.as_str()),
            ],
            Some(&author.token),
        )
        .await;
    assert_eq!(body["tags"].as_array().unwrap().len(), 20);
    let id = body["id"].as_str().unwrap();

    let resp = app
        .patch_json(
            &format!("/v1/resources/{}", id),
            json!({ "category": "Clubs" }),
            Some(&author.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let tags = resp.json()["tags"].as_array().unwrap().clone();
    assert_eq!(tags.len(), 20);
    assert!(tags.contains(&json!("Clubs")));
    assert!(!tags.contains(&json!("Camps")));
}

#[tokio::test]
async fn non_author_cannot_edit_or_delete() {
    let app = app().await;
    let author = app.sign_in("Author").await;
    let other = app.sign_in("Other").await;
    let id = app.create_resource("Mine", "Camps", Some(&author.token)).await;

    let resp = app
        .patch_json(
            &format!("/v1/resources/{}", id),
            json!({ "title": "Hijacked" }),
            Some(&other.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "only the author can change this resource");

    let resp = app.delete(&format!("/v1/resources/{}", id), Some(&other.token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let body = app.get(&format!("/v1/resources/{}", id), None).await.json();
    assert_eq!(body["title"], "Mine");
}

#[tokio::test]
async fn anonymous_resources_cannot_be_edited() {
    let app = app().await;
    let viewer = app.sign_in("Someone").await;
    let id = app.create_resource("Nobody's", "Camps", None).await;

    let resp = app
        .patch_json(
            &format!("/v1/resources/{}", id),
            json!({ "title": "Claimed" }),
            Some(&viewer.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn author_can_delete() {
    let app = app().await;
    let author = app.sign_in("Author").await;
    let id = app.create_resource("Short lived", "Camps", Some(&author.token)).await;

    let resp = app.delete(&format!("/v1/resources/{}", id), Some(&author.token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&format!("/v1/resources/{}", id), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let feed = app.get("/v1/resources", None).await;
    assert!(titles(&feed.json()).is_empty());
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;
    let resp = app.get("/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}
