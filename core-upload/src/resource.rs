//! # Video Resource Lifecycle
//!
//! A [`VideoResource`] is the local record of one video: its metadata, the
//! staged source file and, once the upload succeeded, the remote video id.
//!
//! ## State Machine
//!
//! ```text
//! Pending ──> Uploading ──> Uploaded
//!    │            │
//!    └────────────┴──────> Aborted (record destroyed)
//! ```
//!
//! `Uploaded` and `Aborted` are terminal. The remote id is set exactly once,
//! together with the move to `Uploaded`, and the local file reference is
//! dropped at the same moment.

use crate::error::{OrchestrationError, Result};
use bridge_traits::upload::{VideoInsertBody, VideoSnippet, VideoStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_BYTES: usize = 5000;
pub const MAX_TAG_CHARS: usize = 100;
pub const MAX_TAGS_TOTAL_CHARS: usize = 500;

/// Default distance between creation and the scheduled publish time.
pub const DEFAULT_PUBLISH_DELAY_DAYS: i64 = 15;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

// ============================================================================
// ID Types
// ============================================================================

/// Local identifier of a video resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| OrchestrationError::InvalidValue(format!("resource id '{}': {}", s, e)))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Who can see the video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Public => "public",
        }
    }
}

impl FromStr for PrivacyStatus {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "private" => Ok(PrivacyStatus::Private),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "public" => Ok(PrivacyStatus::Public),
            _ => Err(OrchestrationError::InvalidValue(format!(
                "privacy status '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// YouTube video category
///
/// See: https://developers.google.com/youtube/v3/docs/videoCategories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCategory {
    FilmAndAnimation,
    AutosAndVehicles,
    Music,
    PetsAndAnimals,
    Sports,
    TravelAndEvents,
    Gaming,
    #[default]
    PeopleAndBlogs,
    Comedy,
    Entertainment,
    NewsAndPolitics,
    HowtoAndStyle,
    Education,
    ScienceAndTechnology,
    NonprofitsAndActivism,
}

impl VideoCategory {
    pub const ALL: [VideoCategory; 15] = [
        VideoCategory::FilmAndAnimation,
        VideoCategory::AutosAndVehicles,
        VideoCategory::Music,
        VideoCategory::PetsAndAnimals,
        VideoCategory::Sports,
        VideoCategory::TravelAndEvents,
        VideoCategory::Gaming,
        VideoCategory::PeopleAndBlogs,
        VideoCategory::Comedy,
        VideoCategory::Entertainment,
        VideoCategory::NewsAndPolitics,
        VideoCategory::HowtoAndStyle,
        VideoCategory::Education,
        VideoCategory::ScienceAndTechnology,
        VideoCategory::NonprofitsAndActivism,
    ];

    /// Numeric id sent as `snippet.categoryId`
    pub fn id(&self) -> u32 {
        match self {
            VideoCategory::FilmAndAnimation => 1,
            VideoCategory::AutosAndVehicles => 2,
            VideoCategory::Music => 10,
            VideoCategory::PetsAndAnimals => 15,
            VideoCategory::Sports => 17,
            VideoCategory::TravelAndEvents => 19,
            VideoCategory::Gaming => 20,
            VideoCategory::PeopleAndBlogs => 22,
            VideoCategory::Comedy => 23,
            VideoCategory::Entertainment => 24,
            VideoCategory::NewsAndPolitics => 25,
            VideoCategory::HowtoAndStyle => 26,
            VideoCategory::Education => 27,
            VideoCategory::ScienceAndTechnology => 28,
            VideoCategory::NonprofitsAndActivism => 29,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }
}

/// Lifecycle state of a video resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// Registered with a staged file, not yet sent
    Pending,
    /// An upload session is running
    Uploading,
    /// The remote holds the video
    Uploaded,
    /// The upload failed; the record is destroyed
    Aborted,
}

impl ResourceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Uploaded | ResourceState::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Pending => "pending",
            ResourceState::Uploading => "uploading",
            ResourceState::Uploaded => "uploaded",
            ResourceState::Aborted => "aborted",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `to`
    pub fn can_transition_to(&self, to: ResourceState) -> bool {
        matches!(
            (self, to),
            (ResourceState::Pending, ResourceState::Uploading)
                | (ResourceState::Pending, ResourceState::Aborted)
                | (ResourceState::Uploading, ResourceState::Uploaded)
                | (ResourceState::Uploading, ResourceState::Aborted)
        )
    }
}

impl FromStr for ResourceState {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ResourceState::Pending),
            "uploading" => Ok(ResourceState::Uploading),
            "uploaded" => Ok(ResourceState::Uploaded),
            "aborted" => Ok(ResourceState::Aborted),
            _ => Err(OrchestrationError::InvalidValue(format!(
                "resource state '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// User-supplied description of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: VideoCategory,
    pub privacy_status: PrivacyStatus,
    /// Scheduled publish time; only sent for private videos
    pub publish_at: Option<DateTime<Utc>>,
    pub embeddable: bool,
    pub made_for_kids: bool,
    pub notify_subscribers: bool,
}

impl VideoMetadata {
    /// Metadata with the default settings: private, scheduled 15 days out,
    /// embeddable, not made for kids, no subscriber notification.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            category: VideoCategory::default(),
            privacy_status: PrivacyStatus::default(),
            publish_at: Some(Utc::now() + Duration::days(DEFAULT_PUBLISH_DELAY_DAYS)),
            embeddable: true,
            made_for_kids: false,
            notify_subscribers: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set tags, trimming each and dropping empty ones.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn with_category(mut self, category: VideoCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_privacy_status(mut self, privacy_status: PrivacyStatus) -> Self {
        self.privacy_status = privacy_status;
        self
    }

    pub fn with_publish_at(mut self, publish_at: Option<DateTime<Utc>>) -> Self {
        self.publish_at = publish_at;
        self
    }

    pub fn with_embeddable(mut self, embeddable: bool) -> Self {
        self.embeddable = embeddable;
        self
    }

    pub fn with_made_for_kids(mut self, made_for_kids: bool) -> Self {
        self.made_for_kids = made_for_kids;
        self
    }

    pub fn with_notify_subscribers(mut self, notify_subscribers: bool) -> Self {
        self.notify_subscribers = notify_subscribers;
        self
    }

    /// Check the limits the remote enforces on each field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(OrchestrationError::InvalidMetadata(msg));

        if self.title.trim().is_empty() {
            return invalid("title cannot be empty".to_string());
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            return invalid(format!("title exceeds {} characters", MAX_TITLE_CHARS));
        }
        if has_angle_brackets(&self.title) {
            return invalid("title cannot contain '<' or '>'".to_string());
        }

        if self.description.len() > MAX_DESCRIPTION_BYTES {
            return invalid(format!("description exceeds {} bytes", MAX_DESCRIPTION_BYTES));
        }
        if has_angle_brackets(&self.description) {
            return invalid("description cannot contain '<' or '>'".to_string());
        }

        let mut total = 0;
        for tag in &self.tags {
            let len = tag.chars().count();
            if tag.trim().is_empty() {
                return invalid("tags cannot be empty".to_string());
            }
            if len > MAX_TAG_CHARS {
                return invalid(format!("tag '{}' exceeds {} characters", tag, MAX_TAG_CHARS));
            }
            if has_angle_brackets(tag) {
                return invalid(format!("tag '{}' cannot contain '<' or '>'", tag));
            }
            total += len;
        }
        if total > MAX_TAGS_TOTAL_CHARS {
            return invalid(format!("tags exceed {} characters in total", MAX_TAGS_TOTAL_CHARS));
        }

        Ok(())
    }

    /// Body of the video insert request.
    pub fn to_insert_body(&self) -> VideoInsertBody {
        let publish_at = match self.privacy_status {
            PrivacyStatus::Private => self.publish_at.map(format_publish_at),
            PrivacyStatus::Unlisted | PrivacyStatus::Public => None,
        };

        VideoInsertBody {
            snippet: VideoSnippet {
                title: self.title.clone(),
                description: self.description.clone(),
                tags: self.tags.clone(),
                category_id: self.category.id(),
            },
            status: VideoStatus {
                privacy_status: self.privacy_status.as_str().to_string(),
                embeddable: self.embeddable,
                publish_at,
                self_declared_made_for_kids: self.made_for_kids,
            },
        }
    }
}

/// Split a comma-separated tag list, dropping empty entries.
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// `YYYY-MM-DDTHH:MM:SS.000Z`
pub fn format_publish_at(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

fn has_angle_brackets(s: &str) -> bool {
    s.contains('<') || s.contains('>')
}

// ============================================================================
// Resource Entity
// ============================================================================

/// Local record of one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoResource {
    pub id: ResourceId,
    pub metadata: VideoMetadata,
    /// Remote id; set once, never cleared
    pub video_id: Option<String>,
    pub state: ResourceState,
    /// Staged source media; present until the upload succeeds
    pub local_file: Option<PathBuf>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl VideoResource {
    /// Create a pending resource for a staged file
    pub fn new(metadata: VideoMetadata, local_file: impl Into<PathBuf>) -> Self {
        Self::with_id(ResourceId::new(), metadata, local_file)
    }

    pub fn with_id(
        id: ResourceId,
        metadata: VideoMetadata,
        local_file: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id,
            metadata,
            video_id: None,
            state: ResourceState::Pending,
            local_file: Some(local_file.into()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Watch URL, once the remote id is known
    pub fn remote_url(&self) -> Option<String> {
        self.video_id
            .as_ref()
            .map(|id| format!("{}{}", WATCH_URL_PREFIX, id))
    }

    /// A record with neither a remote id nor a local file is an orphan.
    pub fn is_persistable(&self) -> bool {
        self.video_id.is_some() || self.local_file.is_some()
    }

    /// # Errors
    ///
    /// Returns an error unless the resource is `Pending`
    pub fn start_upload(&mut self) -> Result<()> {
        self.transition(ResourceState::Uploading)
    }

    /// Record the remote id and drop the local file reference.
    ///
    /// Returns the local file path that should now be removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote id is already set or the resource is not
    /// `Uploading`
    pub fn complete(&mut self, video_id: impl Into<String>) -> Result<Option<PathBuf>> {
        if let Some(existing) = &self.video_id {
            return Err(OrchestrationError::AlreadyUploaded {
                resource_id: self.id.to_string(),
                video_id: existing.clone(),
            });
        }
        self.transition(ResourceState::Uploaded)?;
        self.video_id = Some(video_id.into());
        Ok(self.local_file.take())
    }

    /// Move to `Aborted`, returning the local file path to remove.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is already terminal
    pub fn abort(&mut self) -> Result<Option<PathBuf>> {
        self.transition(ResourceState::Aborted)?;
        Ok(self.local_file.take())
    }

    fn transition(&mut self, to: ResourceState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(OrchestrationError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.updated_at = Utc::now().timestamp();
        Ok(())
    }
}
