//! Forum API seam
//!
//! [`ForumApi`] is the contract every controller is written against;
//! [`discourse::DiscourseClient`] is the HTTP implementation.

pub mod discourse;

#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;

use anyhow::Result;
use serde::Serialize;

use crate::auth;
use crate::config::Config;
use crate::error::ApiResult;
use crate::models::{
    Byte, Category, CurrentUser, DraftData, RemoteDraft, UploadedImage, ValidationThresholds,
};

pub use discourse::DiscourseClient;

/// A new topic (Byte) to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTopic {
    /// Title
    pub title: String,
    /// Markdown body
    pub raw: String,
    /// Teret id
    #[serde(rename = "category")]
    pub category_id: u64,
}

/// A new comment on an existing topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReply {
    /// Topic being replied in
    pub topic_id: u64,
    /// Markdown body
    pub raw: String,
    /// Post number being replied to, `None` for a top-level comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_post_number: Option<u64>,
}

/// What the server returns after creating a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPost {
    /// Post id
    pub id: u64,
    /// Topic id
    pub topic_id: u64,
    /// Post number within the topic
    pub post_number: u64,
    /// Topic slug
    pub topic_slug: String,
}

/// Operations the client needs from the forum
///
/// Every method resolves to `Result<T, ApiError>`; the error carries a typed
/// [`crate::error::ErrorKind`].
pub trait ForumApi: Send + Sync {
    /// The user the credentials belong to
    fn current_user(&self) -> impl Future<Output = ApiResult<CurrentUser>> + Send;

    /// All categories, parents and subcategories, flattened
    fn categories(&self) -> impl Future<Output = ApiResult<Vec<Category>>> + Send;

    /// Minimum title/body lengths for new topics
    fn validation_thresholds(&self) -> impl Future<Output = ApiResult<ValidationThresholds>> + Send;

    /// A topic with its post stream
    fn get_topic(&self, topic_id: u64) -> impl Future<Output = ApiResult<Byte>> + Send;

    /// Load the draft stored under a key
    fn get_draft(&self, draft_key: &str)
    -> impl Future<Output = ApiResult<Option<RemoteDraft>>> + Send;

    /// Save a draft, returning the new server sequence
    fn save_draft(
        &self,
        draft_key: &str,
        data: &DraftData,
        sequence: u64,
    ) -> impl Future<Output = ApiResult<u64>> + Send;

    /// Delete the draft stored under a key
    fn delete_draft(&self, draft_key: &str, sequence: u64)
    -> impl Future<Output = ApiResult<()>> + Send;

    /// Upload an image for the composer
    fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = ApiResult<UploadedImage>> + Send;

    /// Create a topic
    fn create_topic(&self, topic: &NewTopic) -> impl Future<Output = ApiResult<CreatedPost>> + Send;

    /// Create a comment
    fn create_post(&self, reply: &NewReply) -> impl Future<Output = ApiResult<CreatedPost>> + Send;

    /// Like a post
    fn like_post(&self, post_id: u64) -> impl Future<Output = ApiResult<()>> + Send;

    /// Remove a like
    fn unlike_post(&self, post_id: u64) -> impl Future<Output = ApiResult<()>> + Send;

    /// Bookmark a post, returning the bookmark id
    fn bookmark_post(&self, post_id: u64) -> impl Future<Output = ApiResult<u64>> + Send;

    /// Remove a bookmark
    fn remove_bookmark(&self, bookmark_id: u64) -> impl Future<Output = ApiResult<()>> + Send;
}

/// Build a client for the configured site using stored credentials
///
/// Without stored credentials the client is anonymous: reads work, writes
/// fail with [`crate::error::ErrorKind::AuthRequired`].
pub fn connect(config: &Config) -> Result<DiscourseClient> {
    let credentials = auth::get_credentials(config.site())?;
    if credentials.is_none() {
        tracing::debug!("No credentials for {}, connecting anonymously", config.site());
    }
    Ok(DiscourseClient::new(config.site(), credentials))
}
