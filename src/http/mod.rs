use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::MaybeViewer;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::session())
        .merge(routes::resources(state.upload_max_bytes))
        .merge(routes::comments())
        .merge(routes::atlas());

    Router::new()
        .merge(routes::health())
        .nest("/v1", api)
        .with_state(state)
}
