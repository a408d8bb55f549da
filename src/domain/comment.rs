use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;
use ulid::Ulid;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Ulid,
    pub resource_id: Uuid,
    pub parent_id: Option<Ulid>,
    pub author_name: String,
    pub author_id: Option<Uuid>,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A comment about to be stored; the store stamps the creation time.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: Ulid,
    pub resource_id: Uuid,
    pub parent_id: Option<Ulid>,
    pub author_name: String,
    pub author_id: Option<Uuid>,
    pub text: String,
}

impl NewComment {
    pub fn stamped(self, created_at: OffsetDateTime) -> Comment {
        Comment {
            id: self.id,
            resource_id: self.resource_id,
            parent_id: self.parent_id,
            author_name: self.author_name,
            author_id: self.author_id,
            text: self.text,
            created_at,
        }
    }
}

/// A comment with its replies, in render order.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadedComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<ThreadedComment>,
}

#[derive(Debug, Clone)]
struct Node {
    comment: Comment,
    replies: Vec<usize>,
}

/// Conversation attached to one resource.
///
/// Nodes live in an arena and are addressed by comment id through `index`.
/// Reply lists are append-only: nothing here reorders or removes a node.
#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    index: HashMap<Ulid, usize>,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a tree from flat rows. Rows are inserted oldest first so a
    /// parent always precedes its replies; a row whose parent is unknown is
    /// skipped, the same outcome as replying to a missing parent.
    pub fn from_comments<I>(comments: I) -> Self
    where
        I: IntoIterator<Item = Comment>,
    {
        let mut rows: Vec<Comment> = comments.into_iter().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut tree = Self::new();
        for comment in rows {
            match comment.parent_id {
                Some(parent_id) => {
                    if !tree.insert_reply(parent_id, comment) {
                        tracing::debug!(parent_id = %parent_id, "dropping reply to unknown comment");
                    }
                }
                None => tree.push(comment),
            }
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Ulid) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: Ulid) -> Option<&Comment> {
        self.index.get(&id).map(|&slot| &self.nodes[slot].comment)
    }

    /// Appends a top-level comment.
    pub fn push(&mut self, mut comment: Comment) {
        comment.parent_id = None;
        let slot = self.alloc(comment);
        self.roots.push(slot);
    }

    /// Appends `comment` to the reply list of `parent_id`. Returns `false` and
    /// leaves the tree untouched when no such parent exists.
    pub fn insert_reply(&mut self, parent_id: Ulid, mut comment: Comment) -> bool {
        let Some(&parent_slot) = self.index.get(&parent_id) else {
            return false;
        };
        comment.parent_id = Some(parent_id);
        let slot = self.alloc(comment);
        self.nodes[parent_slot].replies.push(slot);
        true
    }

    /// Replies of `id` in insertion order.
    pub fn replies(&self, id: Ulid) -> Vec<&Comment> {
        self.index
            .get(&id)
            .map(|&slot| {
                self.nodes[slot]
                    .replies
                    .iter()
                    .map(|&child| &self.nodes[child].comment)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Top-level comments newest first, each with its replies oldest first.
    pub fn render(&self) -> Vec<ThreadedComment> {
        let mut roots = self.roots.clone();
        roots.sort_by(|&a, &b| {
            let (a, b) = (&self.nodes[a].comment, &self.nodes[b].comment);
            b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
        });
        roots.into_iter().map(|slot| self.render_node(slot)).collect()
    }

    /// Every comment newest first, regardless of depth.
    pub fn flatten_recent(&self) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self.nodes.iter().map(|node| node.comment.clone()).collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        comments
    }

    fn render_node(&self, slot: usize) -> ThreadedComment {
        let node = &self.nodes[slot];
        ThreadedComment {
            comment: node.comment.clone(),
            replies: node
                .replies
                .iter()
                .map(|&child| self.render_node(child))
                .collect(),
        }
    }

    fn alloc(&mut self, comment: Comment) -> usize {
        let slot = self.nodes.len();
        self.index.insert(comment.id, slot);
        self.nodes.push(Node {
            comment,
            replies: Vec::new(),
        });
        slot
    }
}
