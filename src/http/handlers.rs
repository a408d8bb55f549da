use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use time::OffsetDateTime;
use ulid::Ulid;
use uuid::Uuid;

use crate::app::atlas::{self, City, MapView};
use crate::app::auth::{SessionError, SessionService};
use crate::app::comments::{CommentError, CommentService};
use crate::app::feed::FeedSnapshot;
use crate::app::resources::{FileUpload, ResourceDraft, ResourceEdit, ResourceError, ResourceService};
use crate::app::search::{self, CategoryFilter, FeedQuery, SortMode, StructuredFilters};
use crate::domain::resource::{
    Audience, Category, Cost, FileRef, Reaction, ReactionState, Resource, TimeCommitment,
};
use crate::domain::viewer::Viewer;
use crate::http::{AppError, MaybeViewer};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

/// A resource as one viewer sees it: reaction sets collapse to the viewer's
/// own membership.
#[derive(Serialize)]
pub struct ResourceView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: BTreeSet<String>,
    pub author_name: String,
    pub author_id: Option<Uuid>,
    pub file: Option<FileRef>,
    pub time_commitment: TimeCommitment,
    pub cost: Cost,
    pub audience: Audience,
    pub location: Option<String>,
    pub likes: i64,
    pub upvotes: i64,
    pub downloads: i64,
    pub liked: bool,
    pub upvoted: bool,
    pub is_author: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ResourceView {
    fn new(resource: Resource, viewer_id: Option<Uuid>) -> Self {
        let reacted = |reaction| {
            viewer_id.is_some_and(|id| resource.reactors(reaction).contains(&id))
        };
        let liked = reacted(Reaction::Like);
        let upvoted = reacted(Reaction::Upvote);
        let is_author = viewer_id.is_some_and(|id| resource.is_authored_by(id));

        Self {
            id: resource.id,
            title: resource.title,
            description: resource.description,
            category: resource.category,
            tags: resource.tags,
            author_name: resource.author_name,
            author_id: resource.author_id,
            file: resource.file,
            time_commitment: resource.time_commitment,
            cost: resource.cost,
            audience: resource.audience,
            location: resource.location,
            likes: resource.likes,
            upvotes: resource.upvotes,
            downloads: resource.downloads,
            liked,
            upvoted,
            is_author,
            created_at: resource.created_at,
        }
    }
}

fn views(resources: Vec<Resource>, viewer_id: Option<Uuid>) -> Vec<ResourceView> {
    resources
        .into_iter()
        .map(|resource| ResourceView::new(resource, viewer_id))
        .collect()
}

fn map_resource_error(err: ResourceError, action: &str, id: Option<Uuid>) -> AppError {
    match err {
        ResourceError::Invalid(message) => AppError::bad_request(message),
        ResourceError::NotFound => AppError::not_found("resource not found"),
        ResourceError::NotAuthor => {
            AppError::forbidden("only the author can change this resource")
        }
        ResourceError::Upload(err) => {
            tracing::error!(error = ?err, "failed to upload file");
            AppError::internal("failed to upload file")
        }
        ResourceError::Store(err) => {
            tracing::error!(error = ?err, resource_id = ?id, "failed to {}", action);
            AppError::internal(format!("failed to {}", action))
        }
    }
}

fn map_comment_error(err: CommentError, resource_id: Uuid) -> AppError {
    match err {
        CommentError::Empty | CommentError::TooLong => AppError::bad_request(err.to_string()),
        CommentError::ResourceNotFound => AppError::not_found("resource not found"),
        CommentError::ParentNotFound => AppError::not_found("parent comment not found"),
        CommentError::Store(err) => {
            tracing::error!(error = ?err, resource_id = %resource_id, "failed to load comments");
            AppError::internal("failed to load comments")
        }
    }
}

fn resource_service(state: &AppState) -> ResourceService {
    ResourceService::new(state.store.clone(), state.blobs.clone(), state.feed_service())
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.ping().await.is_ok();
    let status = if store { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// Sessions

#[derive(Deserialize)]
pub struct SessionRequest {
    pub display_name: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub viewer: Viewer,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let service = SessionService::new(state.session_key, state.session_ttl_hours);
    let session = service
        .sign_in(payload.display_name.as_deref())
        .map_err(|err| match err {
            SessionError::NameTooLong => AppError::bad_request(err.to_string()),
            SessionError::Token(err) => {
                tracing::error!(error = ?err, "failed to issue session");
                AppError::internal("failed to issue session")
            }
        })?;

    tracing::info!(viewer_id = %session.viewer.id, "session issued");
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token: session.token,
            expires_at: session.expires_at,
            viewer: session.viewer,
        }),
    ))
}

pub async fn current_session(viewer: Viewer) -> Json<Viewer> {
    Json(viewer)
}

// Feed

#[derive(Deserialize, Default, Clone)]
pub struct FeedParams {
    pub category: Option<String>,
    pub q: Option<String>,
    pub cost: Option<String>,
    pub time: Option<String>,
    pub audience: Option<String>,
    pub location: Option<String>,
    pub sort: Option<String>,
}

impl FeedParams {
    fn into_query(self) -> Result<FeedQuery, AppError> {
        let category = match self.category.as_deref() {
            Some(value) => CategoryFilter::from_str(value)
                .map_err(|err| AppError::bad_request(err.to_string()))?,
            None => CategoryFilter::All,
        };
        let sort = match self.sort.as_deref() {
            Some(value) => {
                SortMode::from_str(value).map_err(|err| AppError::bad_request(err.to_string()))?
            }
            None => SortMode::Newest,
        };

        Ok(FeedQuery {
            category,
            filters: StructuredFilters {
                cost: parse_set(self.cost.as_deref())?,
                time: parse_set(self.time.as_deref())?,
                audience: parse_set(self.audience.as_deref())?,
                location: self
                    .location
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty()),
            },
            text: self.q,
            sort,
        })
    }
}

/// Comma-separated labels; blanks are skipped.
fn parse_set<T>(value: Option<&str>) -> Result<BTreeSet<T>, AppError>
where
    T: FromStr + Ord,
    <T as FromStr>::Err: std::fmt::Display,
{
    let Some(value) = value else {
        return Ok(BTreeSet::new());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<T>().map_err(|err| AppError::bad_request(err.to_string())))
        .collect()
}

pub async fn list_resources(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    Query(params): Query<FeedParams>,
) -> Result<Json<ListResponse<ResourceView>>, AppError> {
    let query = params.into_query()?;
    let resources = state.feed_service().view(&query);
    let viewer_id = viewer.map(|viewer| viewer.id);

    Ok(Json(ListResponse {
        items: views(resources, viewer_id),
    }))
}

#[derive(Serialize)]
struct SnapshotPayload {
    version: u64,
    items: Vec<ResourceView>,
}

fn snapshot_event(
    snapshot: &FeedSnapshot,
    query: &FeedQuery,
    viewer_id: Option<Uuid>,
) -> Result<Event, axum::Error> {
    let payload = SnapshotPayload {
        version: snapshot.version,
        items: views(search::apply(&snapshot.resources, query), viewer_id),
    };
    Event::default()
        .event("snapshot")
        .id(snapshot.version.to_string())
        .json_data(payload)
}

/// Streams the filtered feed: the current snapshot first, then one event
/// per published snapshot.
pub async fn live_resources(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    Query(params): Query<FeedParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let query = params.into_query()?;
    let viewer_id = viewer.map(|viewer| viewer.id);
    let receiver = state.feed.subscribe();

    let events = stream::unfold((receiver, true), move |(mut receiver, first)| {
        let query = query.clone();
        async move {
            if !first && receiver.changed().await.is_err() {
                return None;
            }
            let snapshot = receiver.borrow_and_update().clone();
            let event = snapshot_event(&snapshot, &query, viewer_id);
            Some((event, (receiver, false)))
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// Resources

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

pub async fn create_resource(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResourceView>), AppError> {
    let mut draft = ResourceDraft::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "upload".to_string());
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let body = field.bytes().await.map_err(multipart_error)?;
            file = Some(FileUpload {
                file_name,
                content_type,
                body,
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "title" => draft.title = value,
            "description" => draft.description = value,
            "category" => draft.category = Some(value),
            "tags" => draft
                .tags
                .extend(value.split(',').map(|tag| tag.trim().to_string())),
            "time_commitment" => draft.time_commitment = Some(value),
            "cost" => draft.cost = Some(value),
            "audience" => draft.audience = Some(value),
            "location" => draft.location = Some(value),
            "author_name" => draft.author_name = Some(value),
            _ => {}
        }
    }

    let resource = resource_service(&state)
        .create(viewer.as_ref(), draft, file)
        .await
        .map_err(|err| map_resource_error(err, "create resource", None))?;

    let viewer_id = viewer.map(|viewer| viewer.id);
    Ok((StatusCode::CREATED, Json(ResourceView::new(resource, viewer_id))))
}

pub async fn get_resource(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceView>, AppError> {
    let resource = resource_service(&state)
        .get(id)
        .await
        .map_err(|err| map_resource_error(err, "load resource", Some(id)))?;

    Ok(Json(ResourceView::new(resource, viewer.map(|viewer| viewer.id))))
}

#[derive(Deserialize)]
pub struct UpdateResourceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub time_commitment: Option<String>,
    pub cost: Option<String>,
    pub audience: Option<String>,
    pub location: Option<String>,
}

pub async fn update_resource(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResourceRequest>,
) -> Result<Json<ResourceView>, AppError> {
    let edit = ResourceEdit {
        title: payload.title,
        description: payload.description,
        category: payload.category,
        tags: payload.tags,
        time_commitment: payload.time_commitment,
        cost: payload.cost,
        audience: payload.audience,
        location: payload.location,
    };
    let resource = resource_service(&state)
        .update(&viewer, id, edit)
        .await
        .map_err(|err| map_resource_error(err, "update resource", Some(id)))?;

    Ok(Json(ResourceView::new(resource, Some(viewer.id))))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    resource_service(&state)
        .delete(&viewer, id)
        .await
        .map_err(|err| map_resource_error(err, "delete resource", Some(id)))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn toggle(
    state: &AppState,
    viewer: &Viewer,
    id: Uuid,
    reaction: Reaction,
) -> Result<Json<ReactionState>, AppError> {
    let reaction_state = resource_service(state)
        .toggle(viewer, id, reaction)
        .await
        .map_err(|err| map_resource_error(err, "toggle reaction", Some(id)))?;

    Ok(Json(reaction_state))
}

pub async fn like_resource(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionState>, AppError> {
    toggle(&state, &viewer, id, Reaction::Like).await
}

pub async fn upvote_resource(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionState>, AppError> {
    toggle(&state, &viewer, id, Reaction::Upvote).await
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub url: String,
    pub downloads: i64,
}

pub async fn download_resource(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, AppError> {
    let (url, downloads) = resource_service(&state)
        .record_download(id)
        .await
        .map_err(|err| map_resource_error(err, "record download", Some(id)))?;

    Ok(Json(DownloadResponse { url, downloads }))
}

pub async fn liked_resources(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Json<ListResponse<ResourceView>> {
    let snapshot = state.feed_service().snapshot();
    let resources = search::liked_by(&snapshot.resources, viewer.id);

    Json(ListResponse {
        items: views(resources, Some(viewer.id)),
    })
}

// Comments

#[derive(Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommentLayout {
    #[default]
    Thread,
    Flat,
}

#[derive(Deserialize)]
pub struct CommentListQuery {
    #[serde(default)]
    pub layout: CommentLayout,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CommentListQuery>,
) -> Result<Response, AppError> {
    let service = CommentService::new(state.store.clone());
    let response = match query.layout {
        CommentLayout::Thread => {
            let items = service
                .thread(id)
                .await
                .map_err(|err| map_comment_error(err, id))?;
            Json(ListResponse { items }).into_response()
        }
        CommentLayout::Flat => {
            let items = service
                .recent(id)
                .await
                .map_err(|err| map_comment_error(err, id))?;
            Json(ListResponse { items }).into_response()
        }
    };

    Ok(response)
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
    pub parent_id: Option<Ulid>,
}

pub async fn create_comment(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = CommentService::new(state.store.clone())
        .add(viewer.as_ref(), id, payload.parent_id, &payload.text)
        .await
        .map_err(|err| map_comment_error(err, id))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

// Atlas

pub async fn atlas_markers(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<MapView>, AppError> {
    let query = params.into_query()?;
    let resources = state.feed_service().view(&query);

    Ok(Json(atlas::map_view(&resources)))
}

pub async fn atlas_locations() -> Json<ListResponse<City>> {
    Json(ListResponse {
        items: atlas::CITIES.to_vec(),
    })
}
