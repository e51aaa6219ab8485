//! Composer draft lifecycle
//!
//! [`DraftController`] keeps a remote Discourse draft in step with local
//! edits without blocking typing:
//!
//! ```text
//!  Idle ──edit──▶ Editing ──debounce / blur──▶ Saving ──▶ Idle
//!                    ▲                            │
//!                    └──────── next window ◀── Error
//! ```
//!
//! The server's `draft_sequence` is the only source of the local sequence.
//! The `{draft_key, sequence}` pair is mirrored to device storage so a
//! restarted client resumes the same remote slot. Saves are single-flight:
//! a trigger arriving while a save is in flight waits for it and then only
//! saves if the content changed meanwhile.

mod validation;

pub use validation::{ValidationIssue, can_submit, validate};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::{CreatedPost, ForumApi, NewTopic};
use crate::auth::{AuthEvent, AuthEvents};
use crate::error::{ApiError, ErrorKind};
use crate::models::{DraftContent, DraftMeta, Teret, UploadedImage, ValidationThresholds};
use crate::store::DraftMetaStore;

/// Draft slot used for a new topic when nothing else names one
pub const DEFAULT_DRAFT_KEY: &str = "new_topic";

/// Where the controller is in its save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftPhase {
    /// Nothing unsaved
    #[default]
    Idle,
    /// Unsaved edits waiting for the debounce window
    Editing,
    /// A save or delete is in flight
    Saving,
    /// The last save failed; it is retried on the next window
    Error,
}

/// Result of a save attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed since the last save
    Unchanged,
    /// Content was empty and nothing existed remotely; no request made
    SkippedEmpty,
    /// Content was empty; the remote draft was deleted
    Deleted,
    /// The draft was saved under this server sequence
    Saved {
        /// Sequence returned by the server
        sequence: u64,
    },
}

/// Errors from composer actions
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Content does not pass submit gating
    #[error("{}", join_issues(.0))]
    Invalid(Vec<ValidationIssue>),
    /// A submit is already running
    #[error("Already posting")]
    AlreadySubmitting,
    /// An upload batch is already running
    #[error("An image upload is already in progress")]
    UploadInProgress,
    /// The server rejected the request
    #[error(transparent)]
    Api(#[from] ApiError),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read-only view of the composer for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSnapshot {
    /// Remote draft slot
    pub draft_key: String,
    /// Last server-confirmed sequence
    pub sequence: u64,
    /// Current local content
    pub content: DraftContent,
    /// Save cycle phase
    pub phase: DraftPhase,
    /// Whether `hydrate` has completed since the last reset
    pub hydrated: bool,
    /// Inline error message
    pub error: Option<String>,
    /// Whether local content differs from the last save
    pub is_dirty: bool,
    /// Whether a submit is running
    pub is_submitting: bool,
    /// Whether images are uploading
    pub is_uploading_images: bool,
}

#[derive(Debug)]
struct DraftState {
    draft_key: String,
    sequence: u64,
    content: DraftContent,
    phase: DraftPhase,
    hydrated: bool,
    revision: u64,
    saved_revision: u64,
    last_edit: Option<Instant>,
    error: Option<String>,
    is_submitting: bool,
    is_uploading_images: bool,
}

impl DraftState {
    fn new(draft_key: &str) -> Self {
        Self {
            draft_key: draft_key.to_string(),
            sequence: 0,
            content: DraftContent::default(),
            phase: DraftPhase::Idle,
            hydrated: false,
            revision: 0,
            saved_revision: 0,
            last_edit: None,
            error: None,
            is_submitting: false,
            is_uploading_images: false,
        }
    }

    const fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.last_edit = Some(Instant::now());
        if self.phase != DraftPhase::Saving {
            self.phase = DraftPhase::Editing;
        }
    }
}

/// Keeps one remote draft consistent with in-progress composer edits
pub struct DraftController<A> {
    api: Arc<A>,
    store: Arc<dyn DraftMetaStore>,
    events: AuthEvents,
    state: Arc<Mutex<DraftState>>,
    save_gate: Arc<tokio::sync::Mutex<()>>,
    debounce: Duration,
    default_key: String,
}

impl<A> Clone for DraftController<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            save_gate: Arc::clone(&self.save_gate),
            debounce: self.debounce,
            default_key: self.default_key.clone(),
        }
    }
}

impl<A: ForumApi + 'static> DraftController<A> {
    /// Create a controller with the stock 1.2 s debounce and `new_topic` slot
    pub fn new(api: Arc<A>, store: Arc<dyn DraftMetaStore>) -> Self {
        Self {
            api,
            store,
            events: AuthEvents::global().clone(),
            state: Arc::new(Mutex::new(DraftState::new(DEFAULT_DRAFT_KEY))),
            save_gate: Arc::new(tokio::sync::Mutex::new(())),
            debounce: Duration::from_millis(1200),
            default_key: DEFAULT_DRAFT_KEY.to_string(),
        }
    }

    /// Use a different debounce window
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Use a different default draft slot
    pub fn with_default_key(mut self, key: &str) -> Self {
        self.default_key = key.to_string();
        self.update(|s| *s = DraftState::new(key));
        self
    }

    /// Publish auth transitions to this hub instead of the global one
    pub fn with_auth_events(mut self, events: AuthEvents) -> Self {
        self.events = events;
        self
    }

    fn update<R>(&self, f: impl FnOnce(&mut DraftState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Current state for rendering
    pub fn snapshot(&self) -> DraftSnapshot {
        self.update(|s| DraftSnapshot {
            draft_key: s.draft_key.clone(),
            sequence: s.sequence,
            content: s.content.clone(),
            phase: s.phase,
            hydrated: s.hydrated,
            error: s.error.clone(),
            is_dirty: s.is_dirty(),
            is_submitting: s.is_submitting,
            is_uploading_images: s.is_uploading_images,
        })
    }

    fn cached_meta(&self) -> Option<DraftMeta> {
        match self.store.load_draft_meta() {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Failed to read cached draft metadata: {}", e);
                None
            }
        }
    }

    fn persist_meta(&self, meta: &DraftMeta) {
        if let Err(e) = self.store.save_draft_meta(meta) {
            tracing::warn!("Failed to cache draft metadata: {}", e);
        }
    }

    fn forget_meta(&self) {
        if let Err(e) = self.store.clear_draft_meta() {
            tracing::warn!("Failed to clear cached draft metadata: {}", e);
        }
    }

    fn report(&self, err: &ApiError) {
        if err.kind == ErrorKind::AuthRequired {
            self.events.emit(&AuthEvent::SessionExpired);
        }
    }

    // ==================== Hydration ====================

    /// Load the draft to resume
    ///
    /// The key comes from the route if given, else from cached metadata,
    /// else the default slot. A missing draft (404/500) is not an error.
    /// Edits made while hydration is in flight are kept.
    pub async fn hydrate(&self, route_key: Option<&str>) {
        let cached = self.cached_meta();
        let draft_key = route_key
            .map(str::to_string)
            .or_else(|| cached.as_ref().map(|m| m.draft_key.clone()))
            .unwrap_or_else(|| self.default_key.clone());
        let cached_sequence = cached
            .filter(|m| m.draft_key == draft_key)
            .map_or(0, |m| m.sequence);
        let start_revision = self.update(|s| s.revision);

        tracing::debug!("Hydrating draft {}", draft_key);
        let result = self.api.get_draft(&draft_key).await;

        self.update(|s| {
            s.draft_key.clone_from(&draft_key);
            s.hydrated = true;
            s.error = None;
            let untouched = s.revision == start_revision;

            match result {
                Ok(Some(remote)) => {
                    s.sequence = remote.sequence;
                    if untouched {
                        s.content = remote.content.unwrap_or_default();
                        s.saved_revision = s.revision;
                        s.phase = DraftPhase::Idle;
                    }
                }
                Ok(None) => s.sequence = cached_sequence,
                Err(e) if e.is_missing_draft() => {
                    tracing::debug!("No remote draft for {}: {}", draft_key, e);
                    s.sequence = cached_sequence;
                }
                Err(e) => {
                    tracing::warn!("Failed to load draft {}: {}", draft_key, e);
                    s.sequence = cached_sequence;
                    s.error = Some(e.user_message());
                }
            }
        });
    }

    // ==================== Editing ====================

    /// Replace the title
    pub fn edit_title(&self, title: &str) {
        self.update(|s| {
            s.content.title = title.to_string();
            s.touch();
        });
    }

    /// Replace the body
    pub fn edit_body(&self, body: &str) {
        self.update(|s| {
            s.content.body = body.to_string();
            s.touch();
        });
    }

    /// Select the Teret to post into
    pub fn select_teret(&self, teret: &Teret) {
        self.select_category(Some(teret.category.id));
    }

    /// Select a category by id, or clear the selection
    pub fn select_category(&self, category_id: Option<u64>) {
        self.update(|s| {
            s.content.category_id = category_id;
            s.touch();
        });
    }

    /// Upload images one at a time, appending each to the body
    ///
    /// Stops at the first failure; images uploaded before it are kept.
    pub async fn attach_images(
        &self,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<UploadedImage>, ComposeError> {
        let busy = self.update(|s| std::mem::replace(&mut s.is_uploading_images, true));
        if busy {
            return Err(ComposeError::UploadInProgress);
        }

        let mut uploaded = Vec::new();
        for (file_name, bytes) in files {
            tracing::debug!("Uploading {} ({} bytes)", file_name, bytes.len());
            match self.api.upload_image(&file_name, bytes).await {
                Ok(image) => {
                    self.update(|s| {
                        if !s.content.body.is_empty() && !s.content.body.ends_with('\n') {
                            s.content.body.push('\n');
                        }
                        s.content.body.push_str(&image.markdown());
                        s.content.body.push('\n');
                        s.content.images.push(image.clone());
                        s.touch();
                    });
                    uploaded.push(image);
                }
                Err(e) => {
                    self.report(&e);
                    self.update(|s| {
                        s.is_uploading_images = false;
                        s.error = Some(e.user_message());
                    });
                    return Err(e.into());
                }
            }
        }

        self.update(|s| s.is_uploading_images = false);
        Ok(uploaded)
    }

    /// Remove an attached image and its Markdown reference
    pub fn remove_image(&self, image_id: u64) {
        self.update(|s| {
            let Some(pos) = s.content.images.iter().position(|i| i.id == image_id) else {
                return;
            };
            let image = s.content.images.remove(pos);
            let markdown = image.markdown();
            s.content.body = s
                .content
                .body
                .lines()
                .filter(|line| line.trim() != markdown)
                .collect::<Vec<_>>()
                .join("\n");
            s.touch();
        });
    }

    // ==================== Saving ====================

    /// Whether the debounce window has passed since the last unsaved edit
    pub fn is_save_due(&self) -> bool {
        let debounce = self.debounce;
        self.update(|s| {
            s.is_dirty()
                && !s.is_submitting
                && s.last_edit.is_some_and(|t| t.elapsed() >= debounce)
        })
    }

    /// Save if the debounce window has passed
    pub async fn save_if_due(&self) -> Option<Result<SaveOutcome, ApiError>> {
        if self.is_save_due() {
            Some(self.save_now().await)
        } else {
            None
        }
    }

    /// Spawn a task that saves whenever the debounce window elapses
    ///
    /// Abort the returned handle when the composer closes.
    pub fn spawn_autosave(&self) -> JoinHandle<()> {
        let controller = self.clone();
        let period = (self.debounce / 4).max(Duration::from_millis(50));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Some(Err(e)) = controller.save_if_due().await {
                    tracing::warn!("Draft auto-save failed: {}", e);
                }
            }
        })
    }

    /// Navigation away: save unsaved content without waiting for it
    ///
    /// Returns the spawned save, or `None` when there is nothing to save.
    pub fn blur(&self) -> Option<JoinHandle<Result<SaveOutcome, ApiError>>> {
        if !self.update(|s| s.is_dirty() && !s.is_submitting) {
            return None;
        }

        let controller = self.clone();
        Some(tokio::spawn(async move { controller.save_now().await }))
    }

    /// Save the current content now
    ///
    /// Empty content is never saved: an existing remote draft is deleted
    /// instead and the sequence returns to zero. On failure the previous
    /// sequence stays authoritative and the save is retried one debounce
    /// window later.
    pub async fn save_now(&self) -> Result<SaveOutcome, ApiError> {
        let _gate = self.save_gate.lock().await;

        let Some((draft_key, sequence, content, revision)) = self.update(|s| {
            if !s.is_dirty() {
                return None;
            }
            s.phase = DraftPhase::Saving;
            Some((s.draft_key.clone(), s.sequence, s.content.clone(), s.revision))
        }) else {
            return Ok(SaveOutcome::Unchanged);
        };

        if content.is_empty() {
            if sequence == 0 {
                self.update(|s| {
                    s.saved_revision = revision;
                    s.phase = if s.is_dirty() { DraftPhase::Editing } else { DraftPhase::Idle };
                });
                return Ok(SaveOutcome::SkippedEmpty);
            }

            tracing::debug!("Deleting emptied draft {} (sequence {})", draft_key, sequence);
            return match self.api.delete_draft(&draft_key, sequence).await {
                Ok(()) => {
                    self.update(|s| {
                        s.sequence = 0;
                        s.saved_revision = revision;
                        s.error = None;
                        s.phase = if s.is_dirty() { DraftPhase::Editing } else { DraftPhase::Idle };
                    });
                    self.forget_meta();
                    Ok(SaveOutcome::Deleted)
                }
                Err(e) => Err(self.save_failed(e)),
            };
        }

        tracing::debug!("Saving draft {} (sequence {})", draft_key, sequence);
        match self
            .api
            .save_draft(&draft_key, &content.to_data(), sequence)
            .await
        {
            Ok(new_sequence) => {
                self.update(|s| {
                    s.sequence = new_sequence;
                    s.saved_revision = revision;
                    s.error = None;
                    s.phase = if s.is_dirty() { DraftPhase::Editing } else { DraftPhase::Idle };
                });
                self.persist_meta(&DraftMeta {
                    draft_key,
                    sequence: new_sequence,
                });
                Ok(SaveOutcome::Saved {
                    sequence: new_sequence,
                })
            }
            Err(e) => Err(self.save_failed(e)),
        }
    }

    fn save_failed(&self, err: ApiError) -> ApiError {
        tracing::warn!("Draft save failed ({}): {}", err.kind, err);
        self.report(&err);
        self.update(|s| {
            s.phase = DraftPhase::Error;
            s.error = Some(err.user_message());
            s.last_edit = Some(Instant::now());
        });
        err
    }

    // ==================== Submitting ====================

    /// Problems that currently block submitting
    pub fn validation_issues(&self, thresholds: ValidationThresholds) -> Vec<ValidationIssue> {
        self.update(|s| validate(&s.content, thresholds))
    }

    /// Whether the submit action is enabled
    pub fn can_submit(&self, thresholds: ValidationThresholds) -> bool {
        self.update(|s| can_submit(&s.content, thresholds, s.is_submitting))
    }

    /// Create the topic, then delete the draft and reset the composer
    pub async fn submit(&self, thresholds: ValidationThresholds) -> Result<CreatedPost, ComposeError> {
        if self.update(|s| s.is_submitting) {
            return Err(ComposeError::AlreadySubmitting);
        }
        let _gate = self.save_gate.lock().await;

        let (draft_key, sequence, topic) = self.update(|s| {
            if s.is_submitting {
                return Err(ComposeError::AlreadySubmitting);
            }
            let issues = validate(&s.content, thresholds);
            let Some(category_id) = s.content.category_id.filter(|_| issues.is_empty()) else {
                return Err(ComposeError::Invalid(issues));
            };
            s.is_submitting = true;
            Ok((
                s.draft_key.clone(),
                s.sequence,
                NewTopic {
                    title: s.content.title.trim().to_string(),
                    raw: s.content.body.clone(),
                    category_id,
                },
            ))
        })?;

        let created = match self.api.create_topic(&topic).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!("Posting failed ({}): {}", e.kind, e);
                self.report(&e);
                self.update(|s| {
                    s.is_submitting = false;
                    s.error = Some(e.user_message());
                });
                return Err(e.into());
            }
        };

        if let Err(e) = self.api.delete_draft(&draft_key, sequence).await {
            tracing::warn!("Failed to delete draft {} after posting: {}", draft_key, e);
        }
        self.forget_meta();
        let default_key = self.default_key.clone();
        self.update(|s| *s = DraftState::new(&default_key));

        tracing::debug!("Posted topic {} ({})", created.topic_id, created.topic_slug);
        Ok(created)
    }
}
