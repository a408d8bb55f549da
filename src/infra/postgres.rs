use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use ulid::Ulid;
use uuid::Uuid;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::resource::{
    FileRef, NewResource, Reaction, ReactionState, Resource, ResourceDocument, ResourceUpdate,
};
use crate::infra::db::Db;
use crate::infra::store::ResourceStore;

const RESOURCE_COLUMNS: &str = "id, title, description, category, tags, author_name, author_id, \
     file_url, file_name, file_size_mb, file_content_type, file_sha256, \
     time_commitment, cost, audience, location, \
     likes, liked_by, upvotes, upvoted_by, downloads, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.db.pool())
        .await?;

        let mut resources = Vec::with_capacity(rows.len());
        for row in rows {
            let document = resource_document(&row)?;
            let id = document.id;
            match document.into_resource() {
                Some(resource) => resources.push(resource),
                None => tracing::warn!(resource_id = %id, "skipping resource without a known category"),
            }
        }

        Ok(resources)
    }

    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>> {
        let row = sqlx::query(&format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => Ok(resource_document(&row)?.into_resource()),
            None => Ok(None),
        }
    }

    async fn insert_resource(&self, resource: NewResource) -> Result<Resource> {
        let tags: Vec<String> = resource.tags.into_iter().collect();
        let row = sqlx::query(&format!(
            "INSERT INTO resources \
                (title, description, category, tags, author_name, author_id, \
                 file_url, file_name, file_size_mb, file_content_type, file_sha256, \
                 time_commitment, cost, audience, location) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {RESOURCE_COLUMNS}"
        ))
        .bind(resource.title)
        .bind(resource.description)
        .bind(resource.category.label())
        .bind(tags)
        .bind(resource.author_name)
        .bind(resource.author_id)
        .bind(resource.file.url)
        .bind(resource.file.name)
        .bind(resource.file.size_mb)
        .bind(resource.file.content_type)
        .bind(resource.file.sha256)
        .bind(resource.time_commitment.label())
        .bind(resource.cost.label())
        .bind(resource.audience.label())
        .bind(resource.location)
        .fetch_one(self.db.pool())
        .await?;

        resource_document(&row)?
            .into_resource()
            .ok_or_else(|| anyhow!("inserted resource has no category"))
    }

    async fn update_resource(&self, id: Uuid, update: ResourceUpdate) -> Result<Option<Resource>> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut resource) = row
            .map(|row| resource_document(&row))
            .transpose()?
            .and_then(ResourceDocument::into_resource)
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        update.apply_to(&mut resource);
        let tags: Vec<String> = resource.tags.iter().cloned().collect();

        sqlx::query(
            "UPDATE resources \
             SET title = $2, description = $3, category = $4, tags = $5, \
                 time_commitment = $6, cost = $7, audience = $8, location = $9 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&resource.title)
        .bind(&resource.description)
        .bind(resource.category.label())
        .bind(tags)
        .bind(resource.time_commitment.label())
        .bind(resource.cost.label())
        .bind(resource.audience.label())
        .bind(&resource.location)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(resource))
    }

    async fn delete_resource(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_reaction(
        &self,
        id: Uuid,
        reaction: Reaction,
        viewer_id: Uuid,
    ) -> Result<Option<ReactionState>> {
        // SET expressions see the old row, RETURNING sees the new one.
        let query = match reaction {
            Reaction::Like => {
                "UPDATE resources \
                 SET likes = CASE WHEN $2 = ANY(liked_by) THEN likes - 1 ELSE likes + 1 END, \
                     liked_by = CASE WHEN $2 = ANY(liked_by) \
                                     THEN array_remove(liked_by, $2) \
                                     ELSE array_append(liked_by, $2) END \
                 WHERE id = $1 \
                 RETURNING likes AS count, $2 = ANY(liked_by) AS active"
            }
            Reaction::Upvote => {
                "UPDATE resources \
                 SET upvotes = CASE WHEN $2 = ANY(upvoted_by) THEN upvotes - 1 ELSE upvotes + 1 END, \
                     upvoted_by = CASE WHEN $2 = ANY(upvoted_by) \
                                       THEN array_remove(upvoted_by, $2) \
                                       ELSE array_append(upvoted_by, $2) END \
                 WHERE id = $1 \
                 RETURNING upvotes AS count, $2 = ANY(upvoted_by) AS active"
            }
        };

        let row = sqlx::query(query)
            .bind(id)
            .bind(viewer_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| ReactionState {
            active: row.get("active"),
            count: row.get("count"),
        }))
    }

    async fn increment_downloads(&self, id: Uuid) -> Result<Option<i64>> {
        let downloads: Option<i64> = sqlx::query_scalar(
            "UPDATE resources SET downloads = downloads + 1 WHERE id = $1 RETURNING downloads",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(downloads)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let row = sqlx::query(
            "INSERT INTO comments (id, resource_id, parent_id, author_name, author_id, body) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, resource_id, parent_id, author_name, author_id, body, created_at",
        )
        .bind(comment.id.to_string())
        .bind(comment.resource_id)
        .bind(comment.parent_id.map(|id| id.to_string()))
        .bind(comment.author_name)
        .bind(comment.author_id)
        .bind(comment.text)
        .fetch_one(self.db.pool())
        .await?;

        comment_from_row(&row)
    }

    async fn list_comments(&self, resource_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, resource_id, parent_id, author_name, author_id, body, created_at \
             FROM comments \
             WHERE resource_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(resource_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            comments.push(comment_from_row(&row)?);
        }

        Ok(comments)
    }
}

fn resource_document(row: &PgRow) -> Result<ResourceDocument> {
    let file_url: Option<String> = row.try_get("file_url")?;
    let file = match file_url {
        Some(url) => Some(FileRef {
            url,
            name: row.try_get::<Option<String>, _>("file_name")?.unwrap_or_default(),
            size_mb: row.try_get::<Option<f64>, _>("file_size_mb")?.unwrap_or_default(),
            content_type: row
                .try_get::<Option<String>, _>("file_content_type")?
                .unwrap_or_default(),
            sha256: row.try_get::<Option<String>, _>("file_sha256")?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(ResourceDocument {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        author_name: row.try_get("author_name")?,
        author_id: row.try_get("author_id")?,
        file,
        time_commitment: row.try_get("time_commitment")?,
        cost: row.try_get("cost")?,
        audience: row.try_get("audience")?,
        location: row.try_get("location")?,
        likes: row.try_get("likes")?,
        liked_by: row.try_get("liked_by")?,
        upvotes: row.try_get("upvotes")?,
        upvoted_by: row.try_get("upvoted_by")?,
        downloads: row.try_get("downloads")?,
        created_at: row.try_get("created_at")?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment> {
    let id: String = row.try_get("id")?;
    let parent_id: Option<String> = row.try_get("parent_id")?;

    Ok(Comment {
        id: Ulid::from_string(&id).map_err(|err| anyhow!("invalid comment id {}: {}", id, err))?,
        resource_id: row.try_get("resource_id")?,
        parent_id: parent_id
            .map(|value| Ulid::from_string(&value))
            .transpose()
            .map_err(|err| anyhow!("invalid parent comment id: {}", err))?,
        author_name: row.try_get("author_name")?,
        author_id: row.try_get("author_id")?,
        text: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
    })
}
