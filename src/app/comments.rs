use std::sync::Arc;
use ulid::Ulid;
use uuid::Uuid;

use crate::domain::comment::{Comment, CommentTree, NewComment, ThreadedComment};
use crate::domain::resource::normalize_author_name;
use crate::domain::viewer::Viewer;
use crate::infra::store::ResourceStore;

pub const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("comment text is required")]
    Empty,
    #[error("comment must be at most {} characters", MAX_COMMENT_LEN)]
    TooLong,
    #[error("resource not found")]
    ResourceNotFound,
    #[error("parent comment not found")]
    ParentNotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn ResourceStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Adds a top-level comment, or a reply when `parent_id` is set. A reply
    /// whose parent is not in the resource's thread stores nothing.
    pub async fn add(
        &self,
        viewer: Option<&Viewer>,
        resource_id: Uuid,
        parent_id: Option<Ulid>,
        text: &str,
    ) -> Result<Comment, CommentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommentError::Empty);
        }
        if text.chars().count() > MAX_COMMENT_LEN {
            return Err(CommentError::TooLong);
        }

        let tree = self.load_tree(resource_id).await?;
        if let Some(parent_id) = parent_id {
            if !tree.contains(parent_id) {
                return Err(CommentError::ParentNotFound);
            }
        }

        let comment = self
            .store
            .insert_comment(NewComment {
                id: Ulid::new(),
                resource_id,
                parent_id,
                author_name: normalize_author_name(viewer.map(|viewer| viewer.display_name.as_str())),
                author_id: viewer.map(|viewer| viewer.id),
                text: text.to_string(),
            })
            .await?;

        tracing::info!(
            resource_id = %resource_id,
            comment_id = %comment.id,
            reply = parent_id.is_some(),
            "comment added"
        );
        Ok(comment)
    }

    pub async fn thread(&self, resource_id: Uuid) -> Result<Vec<ThreadedComment>, CommentError> {
        Ok(self.load_tree(resource_id).await?.render())
    }

    pub async fn recent(&self, resource_id: Uuid) -> Result<Vec<Comment>, CommentError> {
        Ok(self.load_tree(resource_id).await?.flatten_recent())
    }

    async fn load_tree(&self, resource_id: Uuid) -> Result<CommentTree, CommentError> {
        if self.store.get_resource(resource_id).await?.is_none() {
            return Err(CommentError::ResourceNotFound);
        }
        let comments = self.store.list_comments(resource_id).await?;
        Ok(CommentTree::from_comments(comments))
    }
}
