use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::feed::FeedService;
use crate::domain::resource::{
    normalize_author_name, normalize_location, normalize_tags, Audience, Category, Cost, FileRef,
    NewResource, Reaction, ReactionState, Resource, ResourceUpdate, TimeCommitment,
};
use crate::domain::viewer::Viewer;
use crate::infra::storage::BlobStore;
use crate::infra::store::ResourceStore;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("{0}")]
    Invalid(String),
    #[error("resource not found")]
    NotFound,
    #[error("only the author can change this resource")]
    NotAuthor,
    #[error("failed to store file")]
    Upload(anyhow::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Upload form fields as submitted, before validation.
#[derive(Debug, Clone, Default)]
pub struct ResourceDraft {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub time_commitment: Option<String>,
    pub cost: Option<String>,
    pub audience: Option<String>,
    pub location: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub time_commitment: Option<String>,
    pub cost: Option<String>,
    pub audience: Option<String>,
    pub location: Option<String>,
}

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
    blobs: Arc<dyn BlobStore>,
    feed: FeedService,
}

impl ResourceService {
    pub fn new(store: Arc<dyn ResourceStore>, blobs: Arc<dyn BlobStore>, feed: FeedService) -> Self {
        Self { store, blobs, feed }
    }

    /// Stores the file, then the metadata. Nothing is written when
    /// validation fails; a failed blob write leaves the store untouched.
    pub async fn create(
        &self,
        viewer: Option<&Viewer>,
        draft: ResourceDraft,
        file: Option<FileUpload>,
    ) -> Result<Resource, ResourceError> {
        let title = required_text("title", &draft.title, MAX_TITLE_LEN)?;
        let description = required_text("description", &draft.description, MAX_DESCRIPTION_LEN)?;
        let category: Category = match draft.category.as_deref() {
            Some(value) if !value.trim().is_empty() => parse_label(value)?,
            _ => return Err(ResourceError::Invalid("category is required".into())),
        };
        let tags = validate_tags(draft.tags, category)?;
        let time_commitment: TimeCommitment = optional_label(draft.time_commitment.as_deref())?
            .unwrap_or_default();
        let cost: Cost = optional_label(draft.cost.as_deref())?.unwrap_or_default();
        let audience: Audience = optional_label(draft.audience.as_deref())?.unwrap_or_default();
        let file = file.ok_or_else(|| ResourceError::Invalid("file is required".into()))?;
        if file.body.is_empty() {
            return Err(ResourceError::Invalid("file cannot be empty".into()));
        }

        let author_name = match draft.author_name.as_deref() {
            Some(name) if !name.trim().is_empty() => normalize_author_name(Some(name)),
            _ => normalize_author_name(viewer.map(|viewer| viewer.display_name.as_str())),
        };

        let file = self.store_file(file).await?;

        let resource = self
            .store
            .insert_resource(NewResource {
                title,
                description,
                category,
                tags,
                author_name,
                author_id: viewer.map(|viewer| viewer.id),
                file,
                time_commitment,
                cost,
                audience,
                location: normalize_location(draft.location),
            })
            .await?;

        tracing::info!(resource_id = %resource.id, category = %resource.category, "resource created");
        self.feed.publish().await;
        Ok(resource)
    }

    pub async fn get(&self, id: Uuid) -> Result<Resource, ResourceError> {
        self.store
            .get_resource(id)
            .await?
            .ok_or(ResourceError::NotFound)
    }

    pub async fn update(
        &self,
        viewer: &Viewer,
        id: Uuid,
        edit: ResourceEdit,
    ) -> Result<Resource, ResourceError> {
        let existing = self.get(id).await?;
        if !existing.is_authored_by(viewer.id) {
            return Err(ResourceError::NotAuthor);
        }

        let update = ResourceUpdate {
            title: edit
                .title
                .map(|title| required_text("title", &title, MAX_TITLE_LEN))
                .transpose()?,
            description: edit
                .description
                .map(|text| required_text("description", &text, MAX_DESCRIPTION_LEN))
                .transpose()?,
            category: optional_label(edit.category.as_deref())?,
            tags: edit.tags,
            time_commitment: optional_label(edit.time_commitment.as_deref())?,
            cost: optional_label(edit.cost.as_deref())?,
            audience: optional_label(edit.audience.as_deref())?,
            location: edit.location,
        };
        if let Some(tags) = &update.tags {
            validate_tags(tags.clone(), update.category.unwrap_or(existing.category))?;
        }
        let mut edited = existing.clone();
        update.clone().apply_to(&mut edited);
        if edited.tags.len() > MAX_TAGS {
            return Err(ResourceError::Invalid(format!("at most {} tags are allowed", MAX_TAGS)));
        }

        let resource = self
            .store
            .update_resource(id, update)
            .await?
            .ok_or(ResourceError::NotFound)?;

        tracing::info!(resource_id = %id, viewer_id = %viewer.id, "resource updated");
        self.feed.publish().await;
        Ok(resource)
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<(), ResourceError> {
        let existing = self.get(id).await?;
        if !existing.is_authored_by(viewer.id) {
            return Err(ResourceError::NotAuthor);
        }

        if !self.store.delete_resource(id).await? {
            return Err(ResourceError::NotFound);
        }

        tracing::info!(resource_id = %id, viewer_id = %viewer.id, "resource deleted");
        self.feed.publish().await;
        Ok(())
    }

    pub async fn toggle(
        &self,
        viewer: &Viewer,
        id: Uuid,
        reaction: Reaction,
    ) -> Result<ReactionState, ResourceError> {
        let state = self
            .store
            .toggle_reaction(id, reaction, viewer.id)
            .await?
            .ok_or(ResourceError::NotFound)?;

        self.feed.publish().await;
        Ok(state)
    }

    /// Counts one download and hands back where to fetch the file.
    pub async fn record_download(&self, id: Uuid) -> Result<(String, i64), ResourceError> {
        let resource = self.get(id).await?;
        let url = resource
            .file
            .map(|file| file.url)
            .ok_or(ResourceError::NotFound)?;
        let downloads = self
            .store
            .increment_downloads(id)
            .await?
            .ok_or(ResourceError::NotFound)?;

        self.feed.publish().await;
        Ok((url, downloads))
    }

    async fn store_file(&self, file: FileUpload) -> Result<FileRef, ResourceError> {
        let key = blob_key(OffsetDateTime::now_utc(), &file.file_name);
        let size_mb = size_in_mb(file.body.len());
        let sha256 = hex::encode(Sha256::digest(&file.body));

        let url = self
            .blobs
            .put(&key, &file.content_type, file.body)
            .await
            .map_err(ResourceError::Upload)?;

        Ok(FileRef {
            url,
            name: file.file_name,
            size_mb,
            content_type: file.content_type,
            sha256,
        })
    }
}

/// `resources/{unix millis}_{file name}` with the name reduced to a safe
/// character set.
pub fn blob_key(at: OffsetDateTime, file_name: &str) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    let mut safe: String = file_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if safe.trim_matches(|ch| ch == '.' || ch == '_').is_empty() {
        safe = "file".to_string();
    }
    format!("resources/{}_{}", millis, safe)
}

/// Size in megabytes, two decimals.
pub fn size_in_mb(bytes: usize) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

fn required_text(field: &str, value: &str, max_len: usize) -> Result<String, ResourceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ResourceError::Invalid(format!("{} is required", field)));
    }
    if value.chars().count() > max_len {
        return Err(ResourceError::Invalid(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(value.to_string())
}

fn parse_label<T>(value: &str) -> Result<T, ResourceError>
where
    T: std::str::FromStr<Err = crate::domain::resource::UnknownLabel>,
{
    value
        .parse()
        .map_err(|err: crate::domain::resource::UnknownLabel| ResourceError::Invalid(err.to_string()))
}

fn optional_label<T>(value: Option<&str>) -> Result<Option<T>, ResourceError>
where
    T: std::str::FromStr<Err = crate::domain::resource::UnknownLabel>,
{
    match value {
        Some(value) if !value.trim().is_empty() => parse_label(value).map(Some),
        _ => Ok(None),
    }
}

fn validate_tags(
    tags: Vec<String>,
    category: Category,
) -> Result<std::collections::BTreeSet<String>, ResourceError> {
    if tags.iter().any(|tag| tag.trim().chars().count() > MAX_TAG_LEN) {
        return Err(ResourceError::Invalid(format!(
            "tags must be at most {} characters",
            MAX_TAG_LEN
        )));
    }
    let tags = normalize_tags(tags, category);
    if tags.len() > MAX_TAGS {
        return Err(ResourceError::Invalid(format!("at most {} tags are allowed", MAX_TAGS)));
    }
    Ok(tags)
}
