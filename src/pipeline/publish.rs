//! Publishing: media upload and thread posting on the posting platform.
//!
//! [`XClient`] talks to two endpoints:
//!
//! * v1.1 `media/upload`: multipart upload of the image, returns a media id;
//! * v2 `tweets`: creates a post, either carrying the media (thread root)
//!   or replying to the previous post.
//!
//! Every request carries an OAuth 1.0a user-context header from
//! [`OAuthSigner`]. Multipart and JSON bodies are not signed.
//!
//! [`publish_thread`] is written against the [`Publisher`] trait so the
//! thread chaining can be exercised without a network.

use crate::error::PotdError;
use crate::observer::RunObserver;
use crate::pipeline::auth::{OAuthCredentials, OAuthSigner};
use crate::pipeline::http_client;
use crate::text::Chunk;
use crate::transcode::media_type;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info};

/// Default media upload endpoint.
pub const DEFAULT_MEDIA_UPLOAD_URL: &str =
    "https://upload.twitter.com/1.1/media/upload.json?media_category=tweet_image";

/// Default post creation endpoint.
pub const DEFAULT_POSTS_URL: &str = "https://api.twitter.com/2/tweets";

/// Endpoint URLs, overridable for staging or mock servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoints {
    pub media_upload: String,
    pub posts: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            media_upload: DEFAULT_MEDIA_UPLOAD_URL.to_string(),
            posts: DEFAULT_POSTS_URL.to_string(),
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

/// Body of a v2 create-post request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplySettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAttachment {
    pub media_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplySettings {
    pub in_reply_to_tweet_id: String,
}

/// Response of the v1.1 media upload.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUploadResponse {
    pub media_id: u64,
    #[serde(default)]
    pub media_id_string: Option<String>,
}

impl MediaUploadResponse {
    /// The id as a string; the v2 API takes string ids.
    pub fn id(&self) -> String {
        self.media_id_string
            .clone()
            .unwrap_or_else(|| self.media_id.to_string())
    }
}

/// Response of the v2 create-post call.
#[derive(Debug, Clone, Deserialize)]
pub struct PostResponse {
    pub data: PostData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

// ── Publisher ────────────────────────────────────────────────────────────────

/// The three calls a thread needs.
pub trait Publisher: Send + Sync {
    /// Upload image bytes; returns the media id.
    fn upload_media(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> impl Future<Output = Result<String, PotdError>> + Send;

    /// Create the thread root carrying `media_id`; returns the post id.
    fn post_with_media(
        &self,
        text: &str,
        media_id: &str,
    ) -> impl Future<Output = Result<String, PotdError>> + Send;

    /// Reply to `in_reply_to`; returns the new post id.
    fn post_reply(
        &self,
        text: &str,
        in_reply_to: &str,
    ) -> impl Future<Output = Result<String, PotdError>> + Send;
}

/// HTTP client for the posting platform.
#[derive(Debug, Clone)]
pub struct XClient {
    http: reqwest::Client,
    signer: OAuthSigner,
    endpoints: ApiEndpoints,
}

impl XClient {
    pub fn new(
        credentials: OAuthCredentials,
        endpoints: ApiEndpoints,
        timeout_secs: u64,
    ) -> Result<Self, PotdError> {
        if !credentials.is_complete() {
            return Err(PotdError::MissingCredentials);
        }
        let http = http_client(timeout_secs)
            .map_err(|e| PotdError::Internal(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            signer: OAuthSigner::new(credentials),
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    async fn create_post(&self, body: &PostRequest<'_>) -> Result<String, PotdError> {
        let endpoint = self.endpoints.posts.as_str();
        let auth = self.signer.authorization_header("POST", endpoint, &[])?;
        let response = self
            .http
            .post(endpoint)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(endpoint, e))?;
        let parsed: PostResponse = read_json(endpoint, response).await?;
        Ok(parsed.data.id)
    }
}

impl Publisher for XClient {
    async fn upload_media(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, PotdError> {
        let endpoint = self.endpoints.media_upload.as_str();
        let size = bytes.len();
        let (mime, _) = media_type(&bytes);
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| request_failed(endpoint, e))?;
        let form = Form::new().part("media", part);

        let auth = self.signer.authorization_header("POST", endpoint, &[])?;
        info!(size, file_name, mime, "uploading media");
        let response = self
            .http
            .post(endpoint)
            .header(reqwest::header::AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_failed(endpoint, e))?;

        let parsed: MediaUploadResponse = read_json(endpoint, response).await?;
        let id = parsed.id();
        info!(media_id = %id, "media uploaded");
        Ok(id)
    }

    async fn post_with_media(&self, text: &str, media_id: &str) -> Result<String, PotdError> {
        self.create_post(&PostRequest {
            text,
            media: Some(MediaAttachment {
                media_ids: vec![media_id.to_string()],
            }),
            reply: None,
        })
        .await
    }

    async fn post_reply(&self, text: &str, in_reply_to: &str) -> Result<String, PotdError> {
        self.create_post(&PostRequest {
            text,
            media: None,
            reply: Some(ReplySettings {
                in_reply_to_tweet_id: in_reply_to.to_string(),
            }),
        })
        .await
    }
}

/// Post `chunks` as a thread: the first carries `media_id`, each following
/// chunk replies to the one before. Returns the post ids in order.
pub async fn publish_thread<P: Publisher>(
    publisher: &P,
    chunks: &[Chunk],
    media_id: &str,
    observer: &dyn RunObserver,
) -> Result<Vec<String>, PotdError> {
    let total = chunks.len();
    let mut ids: Vec<String> = Vec::with_capacity(total);
    for chunk in chunks {
        let id = match ids.last() {
            None => publisher.post_with_media(&chunk.text, media_id).await?,
            Some(previous) => publisher.post_reply(&chunk.text, previous).await?,
        };
        debug!(index = chunk.index, id = %id, "published post");
        observer.on_post_published(chunk.index, total, &id);
        ids.push(id);
    }
    Ok(ids)
}

fn request_failed(endpoint: &str, e: reqwest::Error) -> PotdError {
    PotdError::ApiRequestFailed {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, PotdError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| request_failed(endpoint, e))?;
    parse_response(endpoint, status.as_u16(), &body)
}

/// Accept 200/201 and decode the body; anything else is an API error.
pub(crate) fn parse_response<T: DeserializeOwned>(
    endpoint: &str,
    status: u16,
    body: &str,
) -> Result<T, PotdError> {
    if status != 200 && status != 201 {
        return Err(PotdError::ApiError {
            endpoint: endpoint.to_string(),
            status,
            body: body.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| PotdError::ApiResponseMalformed {
        endpoint: endpoint.to_string(),
        detail: e.to_string(),
    })
}
