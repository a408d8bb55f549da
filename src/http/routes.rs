use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn session() -> Router<AppState> {
    Router::new().route(
        "/session",
        post(handlers::create_session).get(handlers::current_session),
    )
}

pub fn resources(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/resources",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route("/resources/live", get(handlers::live_resources))
        .route(
            "/resources/:id",
            get(handlers::get_resource)
                .patch(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        .route("/resources/:id/like", post(handlers::like_resource))
        .route("/resources/:id/upvote", post(handlers::upvote_resource))
        .route("/resources/:id/download", post(handlers::download_resource))
        .route("/me/liked", get(handlers::liked_resources))
        .layer(DefaultBodyLimit::max(upload_max_bytes))
}

pub fn comments() -> Router<AppState> {
    Router::new().route(
        "/resources/:id/comments",
        get(handlers::list_comments).post(handlers::create_comment),
    )
}

pub fn atlas() -> Router<AppState> {
    Router::new()
        .route("/atlas/markers", get(handlers::atlas_markers))
        .route("/atlas/locations", get(handlers::atlas_locations))
}
