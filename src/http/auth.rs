use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::SessionService;
use crate::domain::viewer::Viewer;
use crate::http::AppError;
use crate::AppState;

/// Session holder for routes that accept anonymous callers. A missing
/// Authorization header yields `None`; a bad token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<Viewer>);

#[axum::async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        authenticate(auth_header, state)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match parts.headers.get(header::AUTHORIZATION) {
            None => Ok(MaybeViewer(None)),
            Some(value) => {
                let auth_header = value
                    .to_str()
                    .map_err(|_| AppError::unauthorized("invalid Authorization header"))?;
                authenticate(auth_header, state).map(|viewer| MaybeViewer(Some(viewer)))
            }
        }
    }
}

fn authenticate(auth_header: &str, state: &AppState) -> Result<Viewer, AppError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

    let service = SessionService::new(state.session_key, state.session_ttl_hours);
    let viewer = service.authenticate(token).map_err(|err| {
        tracing::warn!(error = ?err, "failed to authenticate session token");
        AppError::unauthorized("invalid token")
    })?;

    viewer.ok_or_else(|| AppError::unauthorized("invalid token"))
}
