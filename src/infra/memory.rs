use anyhow::Result;
use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::resource::{NewResource, Reaction, ReactionState, Resource, ResourceUpdate};
use crate::infra::store::ResourceStore;

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    resources: Vec<Resource>,
    comments: Vec<Comment>,
    last_created_at: Option<OffsetDateTime>,
}

impl Inner {
    /// Creation timestamps strictly increase within one store.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let stamp = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(stamp);
        stamp
    }

    fn resource_mut(&mut self, id: Uuid) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|resource| resource.id == id)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let inner = self.inner.read().await;
        let mut resources = inner.resources.clone();
        resources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(resources)
    }

    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>> {
        let inner = self.inner.read().await;
        Ok(inner.resources.iter().find(|resource| resource.id == id).cloned())
    }

    async fn insert_resource(&self, resource: NewResource) -> Result<Resource> {
        let mut inner = self.inner.write().await;
        let created_at = inner.next_timestamp();
        let resource = Resource {
            id: Uuid::new_v4(),
            title: resource.title,
            description: resource.description,
            category: resource.category,
            tags: resource.tags,
            author_name: resource.author_name,
            author_id: resource.author_id,
            file: Some(resource.file),
            time_commitment: resource.time_commitment,
            cost: resource.cost,
            audience: resource.audience,
            location: resource.location,
            likes: 0,
            liked_by: Default::default(),
            upvotes: 0,
            upvoted_by: Default::default(),
            downloads: 0,
            created_at,
        };
        inner.resources.push(resource.clone());
        Ok(resource)
    }

    async fn update_resource(&self, id: Uuid, update: ResourceUpdate) -> Result<Option<Resource>> {
        let mut inner = self.inner.write().await;
        let Some(resource) = inner.resource_mut(id) else {
            return Ok(None);
        };
        update.apply_to(resource);
        Ok(Some(resource.clone()))
    }

    async fn delete_resource(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.resources.len();
        inner.resources.retain(|resource| resource.id != id);
        Ok(inner.resources.len() < before)
    }

    async fn toggle_reaction(
        &self,
        id: Uuid,
        reaction: Reaction,
        viewer_id: Uuid,
    ) -> Result<Option<ReactionState>> {
        let mut inner = self.inner.write().await;
        let Some(resource) = inner.resource_mut(id) else {
            return Ok(None);
        };
        let (set, count) = match reaction {
            Reaction::Like => (&mut resource.liked_by, &mut resource.likes),
            Reaction::Upvote => (&mut resource.upvoted_by, &mut resource.upvotes),
        };
        let active = if set.remove(&viewer_id) {
            *count -= 1;
            false
        } else {
            set.insert(viewer_id);
            *count += 1;
            true
        };
        Ok(Some(ReactionState {
            active,
            count: *count,
        }))
    }

    async fn increment_downloads(&self, id: Uuid) -> Result<Option<i64>> {
        let mut inner = self.inner.write().await;
        Ok(inner.resource_mut(id).map(|resource| {
            resource.downloads += 1;
            resource.downloads
        }))
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut inner = self.inner.write().await;
        let created_at = inner.next_timestamp();
        let comment = comment.stamped(created_at);
        inner.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, resource_id: Uuid) -> Result<Vec<Comment>> {
        let inner = self.inner.read().await;
        let mut comments: Vec<Comment> = inner
            .comments
            .iter()
            .filter(|comment| comment.resource_id == resource_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }
}
