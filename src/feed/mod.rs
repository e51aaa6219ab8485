//! Comment thread for a Byte with optimistic submission
//!
//! A submitted comment shows up at once as a `temp-` placeholder. The
//! placeholder is always removed when the create call settles: on success
//! the list is replaced by a fresh fetch of the topic, on failure the error
//! is turned into a [`RecoveryAction`]. Nothing is retried automatically.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::{CreatedPost, ForumApi, NewReply};
use crate::auth::{AuthEvent, AuthEvents};
use crate::error::{ApiError, ErrorKind};
use crate::models::{Byte, Comment, link_replies};
use crate::store::DeviceStore;

/// Shown when replying to a comment that is itself a reply
pub const NESTED_REPLY_NOTICE: &str =
    "Replies can only be added to top-level comments. Reply to the original comment instead.";

/// What the user should do after a failed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Credentials are missing or expired
    SignIn,
    /// The forum's consecutive-reply restriction kicked in
    ReplyTooSoon {
        /// Server explanation
        detail: String,
    },
    /// Anything else; the user may try again
    Retry,
}

impl RecoveryAction {
    /// Route an API failure to a recovery action
    pub fn for_error(err: &ApiError) -> Self {
        match err.kind {
            ErrorKind::AuthRequired => Self::SignIn,
            ErrorKind::ReplyTooSoon => Self::ReplyTooSoon {
                detail: err.message.clone(),
            },
            _ => Self::Retry,
        }
    }

    /// Message for the user
    pub fn message(&self) -> String {
        match self {
            Self::SignIn => "Sign in to join the conversation.".to_string(),
            Self::ReplyTooSoon { detail } => format!(
                "You've replied several times in a row. Give others a chance to respond first. ({detail})"
            ),
            Self::Retry => "Couldn't post your comment. Please try again.".to_string(),
        }
    }
}

/// Errors from [`CommentThread::submit_comment`]
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Nothing to post
    #[error("Write something first")]
    Empty,
    /// A comment is already being created
    #[error("Already posting a comment")]
    AlreadyCreating,
    /// The server rejected the comment
    #[error("{}", .recovery.message())]
    Failed {
        /// What to offer the user
        recovery: RecoveryAction,
        /// Underlying API error
        #[source]
        source: ApiError,
    },
}

/// Result of asking to reply to a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// The reply input is open, aimed at this comment
    Opened {
        /// Target comment id
        comment_id: String,
    },
    /// Replying is not possible; show this notice instead
    Notice(String),
}

/// Where loaded comments came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Fresh from the server
    Network,
    /// From the device cache, saved at this time
    Cache(DateTime<Utc>),
}

#[derive(Debug, Default)]
struct ThreadState {
    topic: Option<Byte>,
    comments: Vec<Comment>,
    scroll_offset: f64,
    reply_target: Option<Comment>,
    is_creating: bool,
    notice: Option<String>,
}

/// Comment list of one Byte
pub struct CommentThread<A> {
    api: Arc<A>,
    topic_id: u64,
    author: String,
    events: AuthEvents,
    cache: Option<Arc<DeviceStore>>,
    settle: Duration,
    state: Mutex<ThreadState>,
}

impl<A: ForumApi> CommentThread<A> {
    /// Create an empty thread for a topic
    pub fn new(api: Arc<A>, topic_id: u64) -> Self {
        Self {
            api,
            topic_id,
            author: "you".to_string(),
            events: AuthEvents::global().clone(),
            cache: None,
            settle: Duration::from_millis(200),
            state: Mutex::new(ThreadState::default()),
        }
    }

    /// Username shown on optimistic placeholders
    pub fn with_author(mut self, username: &str) -> Self {
        self.author = username.to_string();
        self
    }

    /// Delay before the scroll position is restored after a refetch
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Publish auth transitions to this hub instead of the global one
    pub fn with_auth_events(mut self, events: AuthEvents) -> Self {
        self.events = events;
        self
    }

    /// Cache fetched topics and fall back to the cache when offline
    pub fn with_cache(mut self, store: Arc<DeviceStore>) -> Self {
        self.cache = Some(store);
        self
    }

    fn update<R>(&self, f: impl FnOnce(&mut ThreadState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Topic id
    pub const fn topic_id(&self) -> u64 {
        self.topic_id
    }

    /// Last fetched topic
    pub fn topic(&self) -> Option<Byte> {
        self.update(|s| s.topic.clone())
    }

    /// Comments as currently rendered, placeholders included
    pub fn comments(&self) -> Vec<Comment> {
        self.update(|s| s.comments.clone())
    }

    /// Whether a comment is being created
    pub fn is_creating(&self) -> bool {
        self.update(|s| s.is_creating)
    }

    /// Informational notice to show, if any
    pub fn notice(&self) -> Option<String> {
        self.update(|s| s.notice.clone())
    }

    /// Dismiss the notice
    pub fn clear_notice(&self) {
        self.update(|s| s.notice = None);
    }

    /// Current scroll position of the list
    pub fn scroll_offset(&self) -> f64 {
        self.update(|s| s.scroll_offset)
    }

    /// Record the list's scroll position
    pub fn set_scroll_offset(&self, offset: f64) {
        self.update(|s| s.scroll_offset = offset);
    }

    /// Comment the reply input is aimed at
    pub fn reply_target(&self) -> Option<Comment> {
        self.update(|s| s.reply_target.clone())
    }

    /// Fetch the topic and replace the comment list
    ///
    /// With a cache attached, a fetch failure falls back to the cached copy.
    pub async fn load(&self) -> Result<LoadSource, ApiError> {
        match self.api.get_topic(self.topic_id).await {
            Ok(topic) => {
                if let Some(cache) = &self.cache
                    && let Err(e) = cache.cache_topic(&topic)
                {
                    tracing::warn!("Failed to cache topic {}: {}", self.topic_id, e);
                }
                self.replace(topic);
                Ok(LoadSource::Network)
            }
            Err(e) => {
                if e.kind == ErrorKind::AuthRequired {
                    self.events.emit(&AuthEvent::SessionExpired);
                }
                match self.cached() {
                    Some((topic, cached_at)) => {
                        tracing::debug!("Showing cached topic {}: {}", self.topic_id, e);
                        self.replace(topic);
                        Ok(LoadSource::Cache(cached_at))
                    }
                    None => Err(e),
                }
            }
        }
    }

    fn cached(&self) -> Option<(Byte, DateTime<Utc>)> {
        let cache = self.cache.as_ref()?;
        match cache.get_cached_topic(self.topic_id) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("Failed to read cached topic {}: {}", self.topic_id, e);
                None
            }
        }
    }

    fn replace(&self, mut topic: Byte) {
        link_replies(&mut topic.comments);
        self.update(|s| {
            s.comments.clone_from(&topic.comments);
            s.topic = Some(topic);
        });
    }

    /// Aim the reply input at a comment
    ///
    /// Only top-level comments can be replied to. Anything else produces a
    /// notice and leaves the input closed.
    pub fn reply_to(&self, comment_id: &str) -> ReplyTarget {
        self.update(|s| {
            let Some(target) = s.comments.iter().find(|c| c.id == comment_id) else {
                return ReplyTarget::Notice("That comment is no longer available.".to_string());
            };
            if !target.is_top_level() {
                s.notice = Some(NESTED_REPLY_NOTICE.to_string());
                return ReplyTarget::Notice(NESTED_REPLY_NOTICE.to_string());
            }
            s.reply_target = Some(target.clone());
            ReplyTarget::Opened {
                comment_id: target.id.clone(),
            }
        })
    }

    /// Close the reply input
    pub fn cancel_reply(&self) {
        self.update(|s| s.reply_target = None);
    }

    /// Post a comment (or a reply to the current reply target)
    pub async fn submit_comment(&self, text: &str) -> Result<CreatedPost, SubmitError> {
        let raw = text.trim();
        if raw.is_empty() {
            return Err(SubmitError::Empty);
        }

        let (placeholder_id, scroll, reply_to) = self.update(|s| {
            if s.is_creating {
                return Err(SubmitError::AlreadyCreating);
            }
            s.is_creating = true;
            let placeholder =
                Comment::placeholder(raw, &self.author, s.reply_target.as_ref(), Utc::now());
            let id = placeholder.id.clone();
            let reply_to = placeholder.reply_to_post_number;
            s.comments.push(placeholder);
            Ok((id, s.scroll_offset, reply_to))
        })?;

        let reply = NewReply {
            topic_id: self.topic_id,
            raw: raw.to_string(),
            reply_to_post_number: reply_to,
        };
        tracing::debug!("Creating comment in topic {}", self.topic_id);
        let result = self.api.create_post(&reply).await;

        self.update(|s| {
            s.comments.retain(|c| c.id != placeholder_id);
        });

        let created = match result {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!("Comment failed ({}): {}", e.kind, e);
                if e.kind == ErrorKind::AuthRequired {
                    self.events.emit(&AuthEvent::SessionExpired);
                }
                self.update(|s| s.is_creating = false);
                return Err(SubmitError::Failed {
                    recovery: RecoveryAction::for_error(&e),
                    source: e,
                });
            }
        };

        self.update(|s| s.reply_target = None);
        if let Err(e) = self.load().await {
            tracing::warn!("Refetch after comment failed: {}", e);
        }

        tokio::time::sleep(self.settle).await;
        self.update(|s| {
            s.scroll_offset = scroll;
            s.is_creating = false;
        });

        Ok(created)
    }
}
