//! Remote Video Upload Abstraction
//!
//! Wire-level contract for a resumable video host. The core drives the upload
//! loop and retry policy; implementations only translate each call into the
//! provider's HTTP protocol.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `snippet` part of a video insert request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: u32,
}

/// `status` part of a video insert request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    /// `private`, `unlisted` or `public`
    pub privacy_status: String,
    pub embeddable: bool,
    /// ISO 8601; only accepted by the remote for private videos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
    pub self_declared_made_for_kids: bool,
}

/// Body of the video insert call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInsertBody {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

impl VideoInsertBody {
    /// Comma-separated resource parts, as sent in the `part` query parameter
    pub fn parts(&self) -> &'static str {
        "snippet,status"
    }
}

/// Everything needed to open a resumable upload session
#[derive(Debug, Clone)]
pub struct InitiateUpload {
    pub body: VideoInsertBody,
    pub notify_subscribers: bool,
    /// Total media size in bytes
    pub content_length: u64,
    /// Media MIME type, e.g. `video/*`
    pub content_type: String,
}

/// Handle on an open resumable session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub session_uri: String,
}

/// One slice of media to transfer
#[derive(Debug, Clone)]
pub struct UploadChunk {
    pub offset: u64,
    pub data: Bytes,
    pub total_size: u64,
}

impl UploadChunk {
    /// Inclusive end offset of this chunk
    pub fn last_byte(&self) -> u64 {
        (self.offset + self.data.len() as u64).saturating_sub(1)
    }
}

/// Final resource returned once the remote has the whole file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedVideo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<UploadedVideoStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedVideoStatus {
    #[serde(default)]
    pub upload_status: Option<String>,
    #[serde(default)]
    pub privacy_status: Option<String>,
}

/// Outcome of a chunk transfer or status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResponse {
    /// The remote holds the first `acknowledged` bytes and wants more
    Incomplete { acknowledged: u64 },
    /// The upload is finished
    Complete(UploadedVideo),
}

/// Resumable video upload API
///
/// Implementations must not retry internally and must report failures through
/// `BridgeError::Transport` (no response) or `BridgeError::Http` (non-2xx status)
/// so the caller can classify them.
#[async_trait]
pub trait VideoUploadApi: Send + Sync {
    /// Send the metadata and obtain a session URI
    async fn initiate_upload(
        &self,
        access_token: &str,
        request: &InitiateUpload,
    ) -> Result<UploadTarget>;

    /// Transfer one chunk
    async fn upload_chunk(
        &self,
        access_token: &str,
        target: &UploadTarget,
        chunk: UploadChunk,
    ) -> Result<ChunkResponse>;

    /// Ask how many bytes the remote already holds
    async fn query_upload_status(
        &self,
        access_token: &str,
        target: &UploadTarget,
        total_size: u64,
    ) -> Result<ChunkResponse>;

    /// Attach a custom thumbnail to an uploaded video
    async fn set_thumbnail(
        &self,
        access_token: &str,
        video_id: &str,
        image: Bytes,
        content_type: &str,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_body_wire_format() {
        let body = VideoInsertBody {
            snippet: VideoSnippet {
                title: "Demo".to_string(),
                description: String::new(),
                tags: vec!["a".to_string(), "b".to_string()],
                category_id: 22,
            },
            status: VideoStatus {
                privacy_status: "private".to_string(),
                embeddable: true,
                publish_at: Some("2021-07-12T22:30:00.000Z".to_string()),
                self_declared_made_for_kids: false,
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["snippet"]["categoryId"], 22);
        assert_eq!(json["snippet"]["tags"][1], "b");
        assert_eq!(json["status"]["privacyStatus"], "private");
        assert_eq!(json["status"]["publishAt"], "2021-07-12T22:30:00.000Z");
        assert_eq!(json["status"]["selfDeclaredMadeForKids"], false);
        assert_eq!(body.parts(), "snippet,status");
    }

    #[test]
    fn test_publish_at_omitted_when_absent() {
        let status = VideoStatus {
            privacy_status: "public".to_string(),
            embeddable: false,
            publish_at: None,
            self_declared_made_for_kids: true,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("publishAt").is_none());
    }

    #[test]
    fn test_chunk_last_byte() {
        let chunk = UploadChunk {
            offset: 256,
            data: Bytes::from(vec![0u8; 256]),
            total_size: 1024,
        };
        assert_eq!(chunk.last_byte(), 511);
    }

    #[test]
    fn test_uploaded_video_without_id() {
        let video: UploadedVideo = serde_json::from_str(r#"{"kind": "youtube#video"}"#).unwrap();
        assert_eq!(video.id, None);
    }
}
