//! Optimistic like and bookmark toggles
//!
//! A toggle flips its displayed value at once and remembers which direction
//! is in flight. When the server call fails the opposite flip is applied
//! from that remembered direction, so the rollback never depends on what
//! the UI happens to show at the time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::api::ForumApi;
use crate::auth::{AuthEvent, AuthEvents};
use crate::error::{ApiError, ErrorKind};
use crate::models::Comment;

/// Confirmation state of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToggleState {
    /// Displayed value matches the server
    #[default]
    Confirmed,
    /// Turned on locally, waiting for the server
    PendingApply,
    /// Turned off locally, waiting for the server
    PendingRevert,
}

/// A boolean post action with an optional counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    active: bool,
    count: Option<u32>,
    state: ToggleState,
}

impl Toggle {
    /// A confirmed toggle with a counter (likes)
    pub const fn counted(active: bool, count: u32) -> Self {
        Self {
            active,
            count: Some(count),
            state: ToggleState::Confirmed,
        }
    }

    /// A confirmed toggle without a counter (bookmarks)
    pub const fn flag(active: bool) -> Self {
        Self {
            active,
            count: None,
            state: ToggleState::Confirmed,
        }
    }

    /// Value to display
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Counter to display
    pub const fn count(&self) -> Option<u32> {
        self.count
    }

    /// Confirmation state
    pub const fn state(&self) -> ToggleState {
        self.state
    }

    /// Whether a server call is in flight
    pub fn is_pending(&self) -> bool {
        self.state != ToggleState::Confirmed
    }

    fn flip(&mut self, on: bool) {
        self.active = on;
        if let Some(count) = self.count.as_mut() {
            *count = if on {
                count.saturating_add(1)
            } else {
                count.saturating_sub(1)
            };
        }
    }

    /// Flip locally and mark the direction pending
    ///
    /// Returns the value the server must be told, or `None` while another
    /// flip is still pending.
    pub fn begin(&mut self) -> Option<bool> {
        if self.is_pending() {
            return None;
        }
        let target = !self.active;
        self.flip(target);
        self.state = if target {
            ToggleState::PendingApply
        } else {
            ToggleState::PendingRevert
        };
        Some(target)
    }

    /// The server accepted the pending flip
    pub fn confirm(&mut self) {
        self.state = ToggleState::Confirmed;
    }

    /// The server rejected the pending flip; undo it
    pub fn fail(&mut self) {
        match self.state {
            ToggleState::PendingApply => self.flip(false),
            ToggleState::PendingRevert => self.flip(true),
            ToggleState::Confirmed => {}
        }
        self.state = ToggleState::Confirmed;
    }
}

/// Errors from toggling a post action
#[derive(Debug, Error)]
pub enum ActionError {
    /// The post is not tracked (or still a placeholder)
    #[error("This post can't be updated yet")]
    UnknownPost(u64),
    /// The previous toggle has not settled
    #[error("Still saving your last change")]
    Pending,
    /// The server rejected the change; the toggle was rolled back
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    like: Toggle,
    bookmark: Toggle,
    bookmark_id: Option<u64>,
}

/// Like/bookmark state for the posts on screen
pub struct PostActions<A> {
    api: Arc<A>,
    events: AuthEvents,
    entries: Mutex<HashMap<u64, Entry>>,
}

impl<A: ForumApi> PostActions<A> {
    /// Create an empty tracker
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            events: AuthEvents::global().clone(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Publish auth transitions to this hub instead of the global one
    pub fn with_auth_events(mut self, events: AuthEvents) -> Self {
        self.events = events;
        self
    }

    fn update<R>(&self, f: impl FnOnce(&mut HashMap<u64, Entry>) -> R) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut entries)
    }

    /// Seed state from freshly fetched comments
    ///
    /// Entries with a call in flight keep their local state.
    pub fn track(&self, comments: &[Comment]) {
        self.update(|entries| {
            for comment in comments {
                let Some(post_id) = comment.post_id() else {
                    continue;
                };
                let fresh = Entry {
                    like: Toggle::counted(comment.liked, comment.likes),
                    bookmark: Toggle::flag(comment.bookmark_id.is_some()),
                    bookmark_id: comment.bookmark_id,
                };
                entries
                    .entry(post_id)
                    .and_modify(|e| {
                        if !e.like.is_pending() {
                            e.like = fresh.like;
                        }
                        if !e.bookmark.is_pending() {
                            e.bookmark = fresh.bookmark;
                            e.bookmark_id = fresh.bookmark_id;
                        }
                    })
                    .or_insert(fresh);
            }
        });
    }

    /// Current like toggle of a post
    pub fn like(&self, post_id: u64) -> Option<Toggle> {
        self.update(|entries| entries.get(&post_id).map(|e| e.like))
    }

    /// Current bookmark toggle of a post
    pub fn bookmark(&self, post_id: u64) -> Option<Toggle> {
        self.update(|entries| entries.get(&post_id).map(|e| e.bookmark))
    }

    fn failed(&self, err: ApiError) -> ActionError {
        tracing::warn!("Post action failed ({}): {}", err.kind, err);
        if err.kind == ErrorKind::AuthRequired {
            self.events.emit(&AuthEvent::SessionExpired);
        }
        ActionError::Api(err)
    }

    /// Like or unlike a post
    pub async fn toggle_like(&self, post_id: u64) -> Result<Toggle, ActionError> {
        let target = self.update(|entries| {
            let entry = entries.get_mut(&post_id).ok_or(ActionError::UnknownPost(post_id))?;
            entry.like.begin().ok_or(ActionError::Pending)
        })?;

        let result = if target {
            self.api.like_post(post_id).await
        } else {
            self.api.unlike_post(post_id).await
        };

        let ok = result.is_ok();
        let toggle = self.update(|entries| {
            entries.get_mut(&post_id).map(|entry| {
                if ok {
                    entry.like.confirm();
                } else {
                    entry.like.fail();
                }
                entry.like
            })
        });

        match result {
            Ok(()) => toggle.ok_or(ActionError::UnknownPost(post_id)),
            Err(e) => Err(self.failed(e)),
        }
    }

    /// Bookmark or un-bookmark a post
    pub async fn toggle_bookmark(&self, post_id: u64) -> Result<Toggle, ActionError> {
        let (target, bookmark_id) = self.update(|entries| {
            let entry = entries.get_mut(&post_id).ok_or(ActionError::UnknownPost(post_id))?;
            let target = entry.bookmark.begin().ok_or(ActionError::Pending)?;
            Ok::<_, ActionError>((target, entry.bookmark_id))
        })?;

        let result = match (target, bookmark_id) {
            (true, _) => self.api.bookmark_post(post_id).await.map(Some),
            (false, Some(id)) => self.api.remove_bookmark(id).await.map(|()| None),
            (false, None) => {
                tracing::debug!("Post {} has no bookmark id to remove", post_id);
                Ok(None)
            }
        };

        let ok = result.is_ok();
        let toggle = self.update(|entries| {
            entries.get_mut(&post_id).map(|entry| {
                if let Ok(new_id) = &result {
                    entry.bookmark_id = *new_id;
                }
                if ok {
                    entry.bookmark.confirm();
                } else {
                    entry.bookmark.fail();
                }
                entry.bookmark
            })
        });

        match result {
            Ok(_) => toggle.ok_or(ActionError::UnknownPost(post_id)),
            Err(e) => Err(self.failed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{self, Call, FakeForum, Op};
    use std::time::Duration;

    fn setup() -> (Arc<FakeForum>, Arc<PostActions<FakeForum>>) {
        let api = Arc::new(FakeForum::new());
        let actions = PostActions::new(Arc::clone(&api)).with_auth_events(AuthEvents::new());
        let mut comments = fake::topic(1, &[100, 101]).comments;
        comments[0].likes = 4;
        comments[1].liked = true;
        comments[1].likes = 2;
        comments[1].bookmark_id = Some(77);
        actions.track(&comments);
        (api, Arc::new(actions))
    }

    #[test]
    fn test_toggle_states() {
        let mut like = Toggle::counted(false, 4);
        assert_eq!(like.begin(), Some(true));
        assert_eq!(like.state(), ToggleState::PendingApply);
        assert_eq!(like.count(), Some(5));
        assert_eq!(like.begin(), None);
        like.confirm();
        assert_eq!(like.begin(), Some(false));
        assert_eq!(like.state(), ToggleState::PendingRevert);
        assert_eq!(like.count(), Some(4));
    }

    #[test]
    fn test_failure_compensates_from_pending_direction() {
        let mut like = Toggle::counted(true, 2);
        like.begin();
        like.fail();
        assert_eq!(like, Toggle::counted(true, 2));

        let mut flag = Toggle::flag(false);
        flag.begin();
        flag.fail();
        assert_eq!(flag, Toggle::flag(false));
        flag.fail();
        assert_eq!(flag, Toggle::flag(false));
    }

    #[tokio::test]
    async fn test_like_confirmed() {
        let (api, actions) = setup();
        let toggle = actions.toggle_like(100).await.unwrap();
        assert!(toggle.is_active());
        assert_eq!(toggle.count(), Some(5));
        assert_eq!(toggle.state(), ToggleState::Confirmed);
        assert_eq!(api.calls(), vec![Call::Like(100)]);

        let toggle = actions.toggle_like(100).await.unwrap();
        assert!(!toggle.is_active());
        assert_eq!(api.calls().last(), Some(&Call::Unlike(100)));
    }

    #[tokio::test]
    async fn test_failed_unlike_rolls_back() {
        let (api, actions) = setup();
        api.fail_next(Op::Unlike, ErrorKind::Network, "offline");

        let err = actions.toggle_like(101).await.unwrap_err();
        assert!(err.to_string().contains("Can't reach the server"));
        let like = actions.like(101).unwrap();
        assert_eq!(like, Toggle::counted(true, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_is_visible_while_pending() {
        let (api, actions) = setup();
        api.set_delay(Op::Like, Duration::from_millis(100));

        let task = {
            let actions = Arc::clone(&actions);
            tokio::spawn(async move { actions.toggle_like(100).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let pending = actions.like(100).unwrap();
        assert!(pending.is_active());
        assert_eq!(pending.state(), ToggleState::PendingApply);
        assert!(matches!(actions.toggle_like(100).await, Err(ActionError::Pending)));

        task.await.unwrap().unwrap();
        assert_eq!(actions.like(100).unwrap().state(), ToggleState::Confirmed);
        assert_eq!(api.calls(), vec![Call::Like(100)]);
    }

    #[tokio::test]
    async fn test_bookmark_keeps_server_id() {
        let (api, actions) = setup();

        let toggle = actions.toggle_bookmark(101).await.unwrap();
        assert!(!toggle.is_active());
        assert_eq!(api.calls(), vec![Call::RemoveBookmark(77)]);

        actions.toggle_bookmark(101).await.unwrap();
        let Some(Call::Bookmark(101)) = api.calls().last().cloned() else {
            panic!("expected a bookmark call");
        };
        assert!(actions.bookmark(101).unwrap().is_active());

        actions.toggle_bookmark(101).await.unwrap();
        assert!(matches!(api.calls().last(), Some(Call::RemoveBookmark(id)) if *id != 77));
    }

    #[tokio::test]
    async fn test_failed_bookmark_rolls_back() {
        let (api, actions) = setup();
        api.fail_next(Op::Bookmark, ErrorKind::AuthRequired, "login");

        assert!(actions.toggle_bookmark(100).await.is_err());
        assert_eq!(actions.bookmark(100).unwrap(), Toggle::flag(false));
    }

    #[tokio::test]
    async fn test_untracked_post() {
        let (api, actions) = setup();
        assert!(matches!(
            actions.toggle_like(999).await,
            Err(ActionError::UnknownPost(999))
        ));
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_track_skips_placeholders_and_pending() {
        let (_api, actions) = setup();
        actions.update(|entries| {
            entries.get_mut(&100).unwrap().like.begin();
        });

        let mut comments = fake::topic(1, &[100]).comments;
        comments.push(Comment::placeholder("new", "me", None, chrono::Utc::now()));
        actions.track(&comments);

        assert_eq!(actions.like(100).unwrap().state(), ToggleState::PendingApply);
        assert_eq!(actions.update(|entries| entries.len()), 2);
    }
}
