//! # Video Resource Repository
//!
//! Persistence for [`VideoResource`] records.
//!
//! The store refuses records that reference neither a remote video nor a
//! local file, and a remote id can never be changed once written; both rules
//! are also enforced by the schema.

use crate::error::{OrchestrationError, Result};
use crate::resource::{ResourceId, ResourceState, VideoCategory, VideoMetadata, VideoResource};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{FromRow, SqlitePool};
use std::path::PathBuf;
use tracing::debug;

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for video resource persistence
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Insert a new record
    ///
    /// # Errors
    ///
    /// Returns an error if the record is an orphan or the database operation fails
    async fn insert(&self, resource: &VideoResource) -> Result<()>;

    /// Update an existing record
    ///
    /// # Errors
    ///
    /// Returns `ResourceDestroyed` if the record no longer exists
    async fn update(&self, resource: &VideoResource) -> Result<()>;

    /// Delete a record; deleting a missing record succeeds
    async fn delete(&self, id: &ResourceId) -> Result<()>;

    async fn find_by_id(&self, id: &ResourceId) -> Result<Option<VideoResource>>;

    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<VideoResource>>;

    /// Records in `state`, oldest first
    async fn find_by_state(&self, state: ResourceState) -> Result<Vec<VideoResource>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

pub struct SqliteVideoRepository {
    pool: SqlitePool,
}

impl SqliteVideoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct VideoRow {
    id: String,
    video_id: Option<String>,
    title: String,
    description: String,
    tags: String,
    category_id: i64,
    privacy_status: String,
    publish_at: Option<i64>,
    embeddable: bool,
    made_for_kids: bool,
    notify_subscribers: bool,
    state: String,
    local_file: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<VideoRow> for VideoResource {
    type Error = OrchestrationError;

    fn try_from(row: VideoRow) -> Result<Self> {
        let tags: Vec<String> = serde_json::from_str(&row.tags)
            .map_err(|e| OrchestrationError::InvalidValue(format!("tags: {}", e)))?;

        let category = u32::try_from(row.category_id)
            .ok()
            .and_then(VideoCategory::from_id)
            .ok_or_else(|| {
                OrchestrationError::InvalidValue(format!("category id {}", row.category_id))
            })?;

        let publish_at = match row.publish_at {
            Some(ts) => Some(Utc.timestamp_opt(ts, 0).single().ok_or_else(|| {
                OrchestrationError::InvalidValue(format!("publish_at {}", ts))
            })?),
            None => None,
        };

        Ok(VideoResource {
            id: ResourceId::from_string(&row.id)?,
            metadata: VideoMetadata {
                title: row.title,
                description: row.description,
                tags,
                category,
                privacy_status: row.privacy_status.parse()?,
                publish_at,
                embeddable: row.embeddable,
                made_for_kids: row.made_for_kids,
                notify_subscribers: row.notify_subscribers,
            },
            video_id: row.video_id,
            state: row.state.parse()?,
            local_file: row.local_file.map(PathBuf::from),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, video_id, title, description, tags, category_id, privacy_status,
           publish_at, embeddable, made_for_kids, notify_subscribers,
           state, local_file, created_at, updated_at
    FROM videos
"#;

fn ensure_persistable(resource: &VideoResource) -> Result<()> {
    if resource.is_persistable() {
        Ok(())
    } else {
        Err(OrchestrationError::MissingFile {
            resource_id: resource.id.to_string(),
            path: None,
        })
    }
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).map_err(|e| OrchestrationError::InvalidValue(e.to_string()))
}

fn local_file_text(resource: &VideoResource) -> Option<String> {
    resource
        .local_file
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
}

#[async_trait]
impl VideoRepository for SqliteVideoRepository {
    async fn insert(&self, resource: &VideoResource) -> Result<()> {
        ensure_persistable(resource)?;
        let metadata = &resource.metadata;

        sqlx::query(
            r#"
            INSERT INTO videos (
                id, video_id, title, description, tags, category_id, privacy_status,
                publish_at, embeddable, made_for_kids, notify_subscribers,
                state, local_file, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(resource.id.as_str())
        .bind(&resource.video_id)
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(encode_tags(&metadata.tags)?)
        .bind(metadata.category.id() as i64)
        .bind(metadata.privacy_status.as_str())
        .bind(metadata.publish_at.map(|at| at.timestamp()))
        .bind(metadata.embeddable)
        .bind(metadata.made_for_kids)
        .bind(metadata.notify_subscribers)
        .bind(resource.state.as_str())
        .bind(local_file_text(resource))
        .bind(resource.created_at)
        .bind(resource.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(resource_id = %resource.id, "Video resource inserted");
        Ok(())
    }

    async fn update(&self, resource: &VideoResource) -> Result<()> {
        ensure_persistable(resource)?;
        let metadata = &resource.metadata;

        let result = sqlx::query(
            r#"
            UPDATE videos SET
                video_id = ?,
                title = ?,
                description = ?,
                tags = ?,
                category_id = ?,
                privacy_status = ?,
                publish_at = ?,
                embeddable = ?,
                made_for_kids = ?,
                notify_subscribers = ?,
                state = ?,
                local_file = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&resource.video_id)
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(encode_tags(&metadata.tags)?)
        .bind(metadata.category.id() as i64)
        .bind(metadata.privacy_status.as_str())
        .bind(metadata.publish_at.map(|at| at.timestamp()))
        .bind(metadata.embeddable)
        .bind(metadata.made_for_kids)
        .bind(metadata.notify_subscribers)
        .bind(resource.state.as_str())
        .bind(local_file_text(resource))
        .bind(resource.updated_at)
        .bind(resource.id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestrationError::ResourceDestroyed {
                resource_id: resource.id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        debug!(resource_id = %id, "Video resource deleted");
        Ok(())
    }

    async fn find_by_id(&self, id: &ResourceId) -> Result<Option<VideoResource>> {
        let row = sqlx::query_as::<_, VideoRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(VideoResource::try_from).transpose()
    }

    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<VideoResource>> {
        let row =
            sqlx::query_as::<_, VideoRow>(&format!("{} WHERE video_id = ?", SELECT_COLUMNS))
                .bind(video_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(VideoResource::try_from).transpose()
    }

    async fn find_by_state(&self, state: ResourceState) -> Result<Vec<VideoResource>> {
        let rows = sqlx::query_as::<_, VideoRow>(&format!(
            "{} WHERE state = ? ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(VideoResource::try_from)
            .collect::<Result<Vec<_>>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::resource::PrivacyStatus;

    async fn repository() -> SqliteVideoRepository {
        SqliteVideoRepository::new(create_test_pool().await.unwrap())
    }

    fn resource() -> VideoResource {
        let metadata = VideoMetadata::new("Demo")
            .with_description("A demo video")
            .with_tags(["a", "b"])
            .with_privacy_status(PrivacyStatus::Unlisted);
        VideoResource::new(metadata, "/staging/demo.mp4")
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repository().await;
        let resource = resource();

        repo.insert(&resource).await.unwrap();
        let found = repo.find_by_id(&resource.id).await.unwrap().unwrap();

        assert_eq!(found.id, resource.id);
        assert_eq!(found.metadata.title, "Demo");
        assert_eq!(found.metadata.tags, vec!["a", "b"]);
        assert_eq!(found.metadata.privacy_status, PrivacyStatus::Unlisted);
        assert_eq!(found.metadata.category, VideoCategory::PeopleAndBlogs);
        assert_eq!(
            found.metadata.publish_at.map(|t| t.timestamp()),
            resource.metadata.publish_at.map(|t| t.timestamp())
        );
        assert_eq!(found.state, ResourceState::Pending);
        assert_eq!(found.local_file, resource.local_file);
    }

    #[tokio::test]
    async fn test_update_after_upload() {
        let repo = repository().await;
        let mut resource = resource();
        repo.insert(&resource).await.unwrap();

        resource.start_upload().unwrap();
        repo.update(&resource).await.unwrap();
        resource.complete("xyz123").unwrap();
        repo.update(&resource).await.unwrap();

        let found = repo.find_by_video_id("xyz123").await.unwrap().unwrap();
        assert_eq!(found.id, resource.id);
        assert_eq!(found.state, ResourceState::Uploaded);
        assert_eq!(found.local_file, None);

        let uploaded = repo.find_by_state(ResourceState::Uploaded).await.unwrap();
        assert_eq!(uploaded.len(), 1);
    }

    #[tokio::test]
    async fn test_orphan_is_rejected() {
        let repo = repository().await;
        let mut resource = resource();
        repo.insert(&resource).await.unwrap();

        resource.local_file = None;
        assert!(matches!(
            repo.update(&resource).await,
            Err(OrchestrationError::MissingFile { .. })
        ));
    }

    #[tokio::test]
    async fn test_remote_id_cannot_change() {
        let repo = repository().await;
        let mut resource = resource();
        resource.start_upload().unwrap();
        resource.complete("xyz123").unwrap();
        repo.insert(&resource).await.unwrap();

        resource.video_id = Some("other".to_string());
        assert!(matches!(
            repo.update(&resource).await,
            Err(OrchestrationError::Repository(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_id_is_unique() {
        let repo = repository().await;

        let mut first = resource();
        first.start_upload().unwrap();
        first.complete("dup").unwrap();
        repo.insert(&first).await.unwrap();

        let mut second = resource();
        second.start_upload().unwrap();
        second.complete("dup").unwrap();
        assert!(repo.insert(&second).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let repo = repository().await;
        let resource = resource();
        assert!(matches!(
            repo.update(&resource).await,
            Err(OrchestrationError::ResourceDestroyed { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = repository().await;
        let resource = resource();
        repo.insert(&resource).await.unwrap();

        repo.delete(&resource.id).await.unwrap();
        repo.delete(&resource.id).await.unwrap();

        assert!(repo.find_by_id(&resource.id).await.unwrap().is_none());
    }
}
