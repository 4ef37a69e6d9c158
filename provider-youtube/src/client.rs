//! YouTube Data API upload client
//!
//! Implements `VideoUploadApi` on top of the resumable upload protocol.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::upload::{
    ChunkResponse, InitiateUpload, UploadChunk, UploadTarget, UploadedVideo, VideoUploadApi,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::YouTubeError;
use crate::types::{acknowledged_bytes, GoogleErrorResponse};

/// Media upload root of the YouTube Data API
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

/// Status the resumable protocol uses for "more bytes expected"
const RESUME_INCOMPLETE: u16 = 308;

/// Longest error body echoed into error messages
const MAX_ERROR_BODY: usize = 512;

/// YouTube upload client
///
/// # Example
///
/// ```ignore
/// use provider_youtube::YouTubeClient;
/// use bridge_traits::upload::VideoUploadApi;
///
/// let client = YouTubeClient::new(http_client);
/// let target = client.initiate_upload(token, &request).await?;
/// ```
pub struct YouTubeClient {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Upload root, overridable for tests
    upload_base_url: String,

    /// Per-request timeout; `None` defers to the HTTP client
    request_timeout: Option<Duration>,
}

impl YouTubeClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            upload_base_url: UPLOAD_API_BASE.to_string(),
            request_timeout: None,
        }
    }

    pub fn with_upload_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.upload_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build a request carrying the bearer token and the configured timeout
    fn request(&self, method: HttpMethod, url: String, access_token: &str) -> HttpRequest {
        let request = HttpRequest::new(method, url).bearer_token(access_token);
        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Turn a non-success response into an `ApiError`
    fn api_error(response: &HttpResponse) -> YouTubeError {
        let message = match serde_json::from_slice::<GoogleErrorResponse>(&response.body) {
            Ok(parsed) => parsed.summary(),
            Err(_) => {
                let text = String::from_utf8_lossy(&response.body);
                text.chars().take(MAX_ERROR_BODY).collect()
            }
        };

        YouTubeError::ApiError {
            status_code: response.status,
            message,
        }
    }

    /// Interpret the answer to a chunk PUT or a status query
    fn chunk_response(response: HttpResponse) -> std::result::Result<ChunkResponse, YouTubeError> {
        match response.status {
            RESUME_INCOMPLETE => {
                let acknowledged = match response.header("Range") {
                    Some(range) => acknowledged_bytes(range)
                        .ok_or_else(|| YouTubeError::InvalidRange(range.to_string()))?,
                    // No Range header: the remote holds nothing yet
                    None => 0,
                };
                debug!(acknowledged, "Upload incomplete");
                Ok(ChunkResponse::Incomplete { acknowledged })
            }
            200 | 201 => {
                let video: UploadedVideo = serde_json::from_slice(&response.body).map_err(|e| {
                    YouTubeError::ParseError(format!("Failed to parse video resource: {}", e))
                })?;
                info!(video_id = ?video.id, "Upload finished");
                Ok(ChunkResponse::Complete(video))
            }
            _ => Err(Self::api_error(&response)),
        }
    }
}

#[async_trait]
impl VideoUploadApi for YouTubeClient {
    #[instrument(skip(self, access_token, request), fields(content_length = request.content_length))]
    async fn initiate_upload(
        &self,
        access_token: &str,
        request: &InitiateUpload,
    ) -> Result<UploadTarget> {
        let url = format!(
            "{}/videos?uploadType=resumable&part={}&notifySubscribers={}",
            self.upload_base_url,
            urlencoding::encode(request.body.parts()),
            request.notify_subscribers
        );

        let http_request = self
            .request(HttpMethod::Post, url, access_token)
            .header("X-Upload-Content-Length", request.content_length.to_string())
            .header("X-Upload-Content-Type", request.content_type.clone())
            .json(&request.body)?;

        let response = self.http_client.execute(http_request).await?;

        if !response.is_success() {
            warn!(status = response.status, "Resumable session initiation failed");
            return Err(Self::api_error(&response).into());
        }

        let session_uri = response
            .header("Location")
            .ok_or(YouTubeError::MissingSessionUri)?
            .to_string();

        debug!("Resumable session opened");

        Ok(UploadTarget { session_uri })
    }

    #[instrument(
        skip(self, access_token, target, chunk),
        fields(offset = chunk.offset, size = chunk.data.len(), total = chunk.total_size)
    )]
    async fn upload_chunk(
        &self,
        access_token: &str,
        target: &UploadTarget,
        chunk: UploadChunk,
    ) -> Result<ChunkResponse> {
        let content_range = if chunk.data.is_empty() {
            format!("bytes */{}", chunk.total_size)
        } else {
            format!(
                "bytes {}-{}/{}",
                chunk.offset,
                chunk.last_byte(),
                chunk.total_size
            )
        };

        let http_request = self
            .request(HttpMethod::Put, target.session_uri.clone(), access_token)
            .header("Content-Range", content_range)
            .body(chunk.data);

        let response = self.http_client.execute(http_request).await?;

        Ok(Self::chunk_response(response)?)
    }

    #[instrument(skip(self, access_token, target))]
    async fn query_upload_status(
        &self,
        access_token: &str,
        target: &UploadTarget,
        total_size: u64,
    ) -> Result<ChunkResponse> {
        let http_request = self
            .request(HttpMethod::Put, target.session_uri.clone(), access_token)
            .header("Content-Range", format!("bytes */{}", total_size))
            .body(Bytes::new());

        let response = self.http_client.execute(http_request).await?;

        Ok(Self::chunk_response(response)?)
    }

    #[instrument(skip(self, access_token, image), fields(video_id = %video_id, size = image.len()))]
    async fn set_thumbnail(
        &self,
        access_token: &str,
        video_id: &str,
        image: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/thumbnails/set?videoId={}&uploadType=media",
            self.upload_base_url,
            urlencoding::encode(video_id)
        );

        let http_request = self
            .request(HttpMethod::Post, url, access_token)
            .header("Content-Type", content_type.to_string())
            .body(image);

        let response = self.http_client.execute(http_request).await?;

        if !response.is_success() {
            warn!(status = response.status, "Thumbnail upload failed");
            return Err(Self::api_error(&response).into());
        }

        info!("Thumbnail set");
        Ok(())
    }
}
