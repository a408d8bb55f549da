use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::resource::{NewResource, Reaction, ReactionState, Resource, ResourceUpdate};

/// Contract of the managed document store holding resources and their
/// comments.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Full collection, newest first.
    async fn list_resources(&self) -> Result<Vec<Resource>>;
    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>>;
    async fn insert_resource(&self, resource: NewResource) -> Result<Resource>;
    async fn update_resource(&self, id: Uuid, update: ResourceUpdate) -> Result<Option<Resource>>;
    async fn delete_resource(&self, id: Uuid) -> Result<bool>;

    /// Flips the viewer's membership in the reaction set and moves the
    /// counter with it, atomically. `None` when the resource does not exist.
    async fn toggle_reaction(
        &self,
        id: Uuid,
        reaction: Reaction,
        viewer_id: Uuid,
    ) -> Result<Option<ReactionState>>;

    async fn increment_downloads(&self, id: Uuid) -> Result<Option<i64>>;

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment>;
    async fn list_comments(&self, resource_id: Uuid) -> Result<Vec<Comment>>;
}
