//! # Chunked Upload Session
//!
//! Drives one resumable upload from the session-initiation request to the
//! final response.
//!
//! ## Flow
//!
//! 1. Open a resumable session (metadata request, returns the session URI)
//! 2. Send the file chunk by chunk, advancing the acknowledged offset
//! 3. On a transient failure, consult the [`BackoffPolicy`], sleep, then ask the
//!    remote how many bytes it holds before resuming from there
//! 4. Stop at the final response carrying the new video id
//!
//! A fresh credential is requested before every attempt so long uploads pick
//! up refreshed tokens. The backoff sleep is the only suspension point besides
//! network I/O and can be interrupted through the cancellation token.

use crate::backoff::{BackoffPolicy, RetryDecision};
use crate::error::{ErrorKind, UploadError};
use crate::resource::{ResourceId, VideoResource};
use bridge_traits::error::BridgeError;
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::upload::{
    ChunkResponse, InitiateUpload, UploadChunk, UploadTarget, UploadedVideo, VideoUploadApi,
};
use bytes::Bytes;
use core_auth::CredentialProvider;
use core_runtime::config::{UploadSettings, CHUNK_ALIGNMENT};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Progress of one upload attempt.
///
/// Owned by [`ChunkedUploader::run`] and dropped when it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub resource_id: ResourceId,
    /// Bytes the remote confirmed holding
    pub bytes_acknowledged: u64,
    pub total_size: u64,
    /// Failed attempts so far
    pub attempt: u32,
    /// Retries performed after transient failures
    pub retries: u32,
    /// Resumable session, once opened
    pub target: Option<UploadTarget>,
}

impl UploadSession {
    pub fn new(resource_id: ResourceId, total_size: u64) -> Self {
        Self {
            resource_id,
            bytes_acknowledged: 0,
            total_size,
            attempt: 0,
            retries: 0,
            target: None,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.bytes_acknowledged)
    }

    pub fn percent(&self) -> u8 {
        if self.total_size == 0 {
            return 0;
        }
        ((self.bytes_acknowledged as u128 * 100) / self.total_size as u128).min(100) as u8
    }
}

/// Successful end of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub video_id: String,
    pub retries: u32,
    pub bytes_sent: u64,
    pub video: UploadedVideo,
}

/// Failure of a single request, classified for the backoff policy
#[derive(Debug)]
struct Failure {
    kind: ErrorKind,
    message: String,
}

impl Failure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Terminal error once the policy has given up
    fn into_upload_error(self, retries: u32) -> UploadError {
        if self.kind.is_retriable() {
            return UploadError::MaxRetriesExceeded {
                retries,
                kind: self.kind,
                last_error: self.message,
            };
        }
        match self.kind {
            ErrorKind::Status(status) => UploadError::RemoteRejected {
                status,
                message: self.message,
            },
            ErrorKind::Local => UploadError::LocalFile(self.message),
            ErrorKind::MalformedResponse | ErrorKind::Auth | ErrorKind::Transport => {
                UploadError::UnexpectedResponse(self.message)
            }
        }
    }
}

impl From<BridgeError> for Failure {
    fn from(err: BridgeError) -> Self {
        let kind = ErrorKind::from(&err);
        Self::new(kind, err.to_string())
    }
}

/// Round a configured chunk size up to a positive multiple of [`CHUNK_ALIGNMENT`].
fn aligned_chunk_size(size: u64) -> u64 {
    let aligned = size
        .max(1)
        .div_ceil(CHUNK_ALIGNMENT)
        .saturating_mul(CHUNK_ALIGNMENT);
    if aligned != size {
        warn!(
            configured = size,
            effective = aligned,
            "Chunk size is not a multiple of the upload granularity, rounding up"
        );
    }
    aligned
}

/// Result of one pass through the request sequence
enum Step {
    Progress,
    Finished(UploadedVideo),
}

/// Runs chunked upload sessions against a [`VideoUploadApi`]
pub struct ChunkedUploader {
    api: Arc<dyn VideoUploadApi>,
    file_system: Arc<dyn FileSystemAccess>,
    policy: BackoffPolicy,
    chunk_size: Option<u64>,
    content_type: String,
    event_bus: Option<EventBus>,
}

impl ChunkedUploader {
    pub fn new(
        api: Arc<dyn VideoUploadApi>,
        file_system: Arc<dyn FileSystemAccess>,
        settings: &UploadSettings,
    ) -> Self {
        Self {
            api,
            file_system,
            policy: BackoffPolicy::from_settings(settings),
            chunk_size: settings.chunk_size.map(aligned_chunk_size),
            content_type: settings.media_content_type.clone(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Upload(event)).ok();
        }
    }

    /// Upload `file` as the video described by `resource`.
    ///
    /// # Errors
    ///
    /// - `Auth` if no credential could be obtained
    /// - `RemoteRejected` on the first non-retriable status
    /// - `UnexpectedResponse` when the remote breaks the protocol
    /// - `MaxRetriesExceeded` once the backoff policy gives up
    /// - `Cancelled` when `cancel` fires between requests or during a backoff sleep
    /// - `LocalFile` if the source cannot be read
    #[instrument(skip(self, resource, file, credentials, cancel), fields(resource_id = %resource.id))]
    pub async fn run(
        &self,
        resource: &VideoResource,
        file: &Path,
        credentials: &dyn CredentialProvider,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, UploadError> {
        let total_size = self
            .file_system
            .metadata(file)
            .await
            .map_err(|e| UploadError::LocalFile(format!("{}: {}", file.display(), e)))?
            .size;

        if total_size == 0 {
            return Err(UploadError::LocalFile(format!(
                "{} is empty",
                file.display()
            )));
        }

        let request = InitiateUpload {
            body: resource.metadata.to_insert_body(),
            notify_subscribers: resource.metadata.notify_subscribers,
            content_length: total_size,
            content_type: self.content_type.clone(),
        };

        let mut session = UploadSession::new(resource.id, total_size);
        let resource_id = resource.id.to_string();

        info!(total_size, chunk_size = ?self.chunk_size, "Starting upload");
        self.emit(UploadEvent::Started {
            resource_id: resource_id.clone(),
            title: resource.metadata.title.clone(),
            total_bytes: total_size,
        });

        let mut resync = false;

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(&session));
            }

            let client = credentials.get_client().await?;

            let failure = match self
                .step(&mut session, &request, file, client.access_token(), resync)
                .await
            {
                Ok(Step::Finished(video)) => return self.finish(session, video),
                Ok(Step::Progress) => {
                    resync = false;
                    continue;
                }
                Err(failure) => failure,
            };

            session.attempt += 1;

            let delay = match self.policy.decide(session.attempt, failure.kind) {
                RetryDecision::RetryAfter(delay) => delay,
                RetryDecision::GiveUp => {
                    warn!(
                        attempt = session.attempt,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Giving up on upload"
                    );
                    return Err(failure.into_upload_error(session.retries));
                }
            };

            warn!(
                attempt = session.attempt,
                delay_ms = delay.as_millis() as u64,
                kind = %failure.kind,
                error = %failure.message,
                "Transient upload failure, backing off"
            );
            self.emit(UploadEvent::Retrying {
                resource_id: resource_id.clone(),
                attempt: session.attempt,
                delay_ms: delay.as_millis() as u64,
                reason: failure.message,
            });

            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(&session)),
                _ = tokio::time::sleep(delay) => {}
            }

            session.retries += 1;
            // Only an opened session has remote progress worth asking about
            resync = session.target.is_some();
        }
    }

    /// Issue the next request of the protocol.
    async fn step(
        &self,
        session: &mut UploadSession,
        request: &InitiateUpload,
        file: &Path,
        access_token: &str,
        resync: bool,
    ) -> Result<Step, Failure> {
        let target = match &session.target {
            Some(target) => target.clone(),
            None => {
                let target = self.api.initiate_upload(access_token, request).await?;
                debug!("Resumable session opened");
                session.target = Some(target.clone());
                target
            }
        };

        if resync {
            match self
                .api
                .query_upload_status(access_token, &target, session.total_size)
                .await?
            {
                ChunkResponse::Complete(video) => return Ok(Step::Finished(video)),
                ChunkResponse::Incomplete { acknowledged } => {
                    self.acknowledge(session, acknowledged)?;
                    debug!(offset = session.bytes_acknowledged, "Resuming upload");
                }
            }
        }

        let offset = session.bytes_acknowledged;
        let len = match self.chunk_size {
            Some(size) => size.min(session.remaining()),
            None => session.remaining(),
        };

        let data = if len == 0 {
            Bytes::new()
        } else {
            let data = self.file_system.read_range(file, offset, len).await?;
            if data.len() as u64 != len {
                return Err(Failure::new(
                    ErrorKind::Local,
                    format!(
                        "short read at offset {}: expected {} bytes, got {}",
                        offset,
                        len,
                        data.len()
                    ),
                ));
            }
            data
        };

        let chunk = UploadChunk {
            offset,
            data,
            total_size: session.total_size,
        };

        match self.api.upload_chunk(access_token, &target, chunk).await? {
            ChunkResponse::Complete(video) => Ok(Step::Finished(video)),
            ChunkResponse::Incomplete { acknowledged } => {
                // Every round trip must move the offset forward
                if acknowledged <= offset {
                    return Err(Failure::new(
                        ErrorKind::Transport,
                        format!(
                            "remote acknowledged {} bytes after a {}-byte request at offset {}",
                            acknowledged, len, offset
                        ),
                    ));
                }
                self.acknowledge(session, acknowledged)?;
                Ok(Step::Progress)
            }
        }
    }

    fn acknowledge(&self, session: &mut UploadSession, acknowledged: u64) -> Result<(), Failure> {
        if acknowledged > session.total_size {
            return Err(Failure::new(
                ErrorKind::MalformedResponse,
                format!(
                    "remote acknowledged {} of {} bytes",
                    acknowledged, session.total_size
                ),
            ));
        }

        session.bytes_acknowledged = acknowledged;
        debug!(
            bytes_acknowledged = acknowledged,
            total = session.total_size,
            "Chunk acknowledged"
        );
        self.emit(UploadEvent::Progress {
            resource_id: session.resource_id.to_string(),
            bytes_sent: acknowledged,
            total_bytes: session.total_size,
            percent: session.percent(),
        });
        Ok(())
    }

    fn finish(
        &self,
        session: UploadSession,
        video: UploadedVideo,
    ) -> Result<SessionOutcome, UploadError> {
        let video_id = match video.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                warn!("Final response carried no video id");
                return Err(UploadError::UnexpectedResponse(
                    "final response did not contain a video id".to_string(),
                ));
            }
        };

        info!(video_id = %video_id, retries = session.retries, "Upload finished");

        Ok(SessionOutcome {
            video_id,
            retries: session.retries,
            bytes_sent: session.total_size,
            video,
        })
    }

    fn cancelled(&self, session: &UploadSession) -> UploadError {
        info!(bytes_sent = session.bytes_acknowledged, "Upload cancelled");
        self.emit(UploadEvent::Cancelled {
            resource_id: session.resource_id.to_string(),
            bytes_sent: session.bytes_acknowledged,
        });
        UploadError::Cancelled {
            bytes_sent: session.bytes_acknowledged,
        }
    }
}
