//! In-memory forum used by controller tests
//!
//! Records every call and behaves like a small Discourse: drafts keep a
//! sequence that advances on save, created comments show up on the next
//! topic fetch. Failures are injected per operation with [`FakeForum::fail_next`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use crate::error::{ApiError, ApiResult, ErrorKind};
use crate::models::{
    Byte, Category, Comment, CurrentUser, DraftData, RemoteDraft, ThresholdSource, UploadedImage,
    ValidationThresholds,
};

use super::{CreatedPost, ForumApi, NewReply, NewTopic};

/// Operations the fake can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetDraft,
    SaveDraft,
    DeleteDraft,
    Upload,
    CreateTopic,
    CreatePost,
    GetTopic,
    Like,
    Unlike,
    Bookmark,
    RemoveBookmark,
}

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentUser,
    Categories,
    Thresholds,
    GetTopic(u64),
    GetDraft(String),
    SaveDraft {
        key: String,
        sequence: u64,
        data: DraftData,
    },
    DeleteDraft {
        key: String,
        sequence: u64,
    },
    Upload(String),
    CreateTopic(NewTopic),
    CreatePost(NewReply),
    Like(u64),
    Unlike(u64),
    Bookmark(u64),
    RemoveBookmark(u64),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<ApiError>>,
    drafts: HashMap<String, (u64, DraftData)>,
    topic: Option<Byte>,
    next_id: u64,
    delays: HashMap<Op, Duration>,
}

/// Scriptable in-memory [`ForumApi`]
#[derive(Default)]
pub struct FakeForum {
    state: Mutex<State>,
}

impl FakeForum {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.lock().next_id = 5000;
        fake
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Serve this topic from `get_topic`
    pub fn with_topic(self, topic: Byte) -> Self {
        self.lock().topic = Some(topic);
        self
    }

    /// Seed a remote draft
    pub fn with_draft(self, key: &str, sequence: u64, data: DraftData) -> Self {
        self.lock().drafts.insert(key.to_string(), (sequence, data));
        self
    }

    /// Make every call of `op` take this long (in tokio time)
    pub fn set_delay(&self, op: Op, delay: Duration) {
        self.lock().delays.insert(op, delay);
    }

    async fn pause(&self, op: Op) {
        let delay = self.lock().delays.get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Fail the next call of `op` with `kind`
    pub fn fail_next(&self, op: Op, kind: ErrorKind, message: &str) {
        let status = match kind {
            ErrorKind::AuthRequired => Some(403),
            ErrorKind::NotFound => Some(404),
            ErrorKind::ReplyTooSoon | ErrorKind::Validation => Some(422),
            ErrorKind::Server => Some(500),
            _ => None,
        };
        let mut err = ApiError::new(kind, message);
        err.status = status;
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn saves(&self) -> Vec<(String, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SaveDraft { key, sequence, .. } => Some((key, sequence)),
                _ => None,
            })
            .collect()
    }

    pub fn remote_draft(&self, key: &str) -> Option<(u64, DraftData)> {
        self.lock().drafts.get(key).cloned()
    }

    fn record(&self, op: Option<Op>, call: Call) -> ApiResult<()> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(op) = op
            && let Some(err) = state.failures.get_mut(&op).and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(())
    }
}

/// A topic with the given top-level comment ids
pub fn topic(id: u64, comment_ids: &[u64]) -> Byte {
    let comments = comment_ids
        .iter()
        .enumerate()
        .map(|(i, cid)| {
            let mut c = Comment::placeholder(&format!("comment {cid}"), "someone", None, Utc::now());
            c.id = cid.to_string();
            c.post_number = i as u64 + 2;
            c.is_new = false;
            c
        })
        .collect();

    Byte {
        id,
        title: "A Byte".to_string(),
        slug: "a-byte".to_string(),
        category_id: Some(2),
        opening: None,
        comments,
        posts_count: comment_ids.len() as u32 + 1,
        created_at: Utc::now(),
    }
}

impl ForumApi for FakeForum {
    async fn current_user(&self) -> ApiResult<CurrentUser> {
        self.record(None, Call::CurrentUser)?;
        Ok(CurrentUser {
            id: 1,
            username: "tester".to_string(),
            name: Some("Test User".to_string()),
            avatar_template: None,
        })
    }

    async fn categories(&self) -> ApiResult<Vec<Category>> {
        self.record(None, Call::Categories)?;
        Ok(Vec::new())
    }

    async fn validation_thresholds(&self) -> ApiResult<ValidationThresholds> {
        self.record(None, Call::Thresholds)?;
        Ok(ValidationThresholds {
            min_title: 5,
            min_post: 10,
            source: ThresholdSource::Site,
        })
    }

    async fn get_topic(&self, topic_id: u64) -> ApiResult<Byte> {
        self.record(Some(Op::GetTopic), Call::GetTopic(topic_id))?;
        self.lock()
            .topic
            .clone()
            .filter(|t| t.id == topic_id)
            .ok_or_else(|| ApiError::new(ErrorKind::NotFound, "not found").with_status(404))
    }

    async fn get_draft(&self, draft_key: &str) -> ApiResult<Option<RemoteDraft>> {
        self.record(Some(Op::GetDraft), Call::GetDraft(draft_key.to_string()))?;
        let state = self.lock();
        let Some((sequence, data)) = state.drafts.get(draft_key) else {
            return Err(ApiError::new(ErrorKind::NotFound, "not found").with_status(404));
        };
        Ok(Some(RemoteDraft {
            draft_key: draft_key.to_string(),
            sequence: *sequence,
            content: Some(data.clone().into()),
        }))
    }

    async fn save_draft(&self, draft_key: &str, data: &DraftData, sequence: u64) -> ApiResult<u64> {
        self.pause(Op::SaveDraft).await;
        self.record(
            Some(Op::SaveDraft),
            Call::SaveDraft {
                key: draft_key.to_string(),
                sequence,
                data: data.clone(),
            },
        )?;

        let mut state = self.lock();
        let next = sequence + 1;
        state
            .drafts
            .insert(draft_key.to_string(), (next, data.clone()));
        Ok(next)
    }

    async fn delete_draft(&self, draft_key: &str, sequence: u64) -> ApiResult<()> {
        self.record(
            Some(Op::DeleteDraft),
            Call::DeleteDraft {
                key: draft_key.to_string(),
                sequence,
            },
        )?;
        self.lock().drafts.remove(draft_key);
        Ok(())
    }

    async fn upload_image(&self, file_name: &str, _bytes: Vec<u8>) -> ApiResult<UploadedImage> {
        self.record(Some(Op::Upload), Call::Upload(file_name.to_string()))?;
        let mut state = self.lock();
        state.next_id += 1;
        Ok(UploadedImage::new(
            state.next_id,
            &format!("upload://{}.png", state.next_id),
            file_name,
        ))
    }

    async fn create_topic(&self, topic: &NewTopic) -> ApiResult<CreatedPost> {
        self.record(Some(Op::CreateTopic), Call::CreateTopic(topic.clone()))?;
        let mut state = self.lock();
        state.next_id += 1;
        Ok(CreatedPost {
            id: state.next_id,
            topic_id: state.next_id,
            post_number: 1,
            topic_slug: "new-byte".to_string(),
        })
    }

    async fn create_post(&self, reply: &NewReply) -> ApiResult<CreatedPost> {
        self.pause(Op::CreatePost).await;
        self.record(Some(Op::CreatePost), Call::CreatePost(reply.clone()))?;
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;

        let Some(topic) = state.topic.as_mut() else {
            return Err(ApiError::new(ErrorKind::NotFound, "no topic").with_status(404));
        };
        let post_number = topic.posts_count as u64 + 1;
        topic.posts_count += 1;

        let mut comment = Comment::placeholder(&reply.raw, "tester", None, Utc::now());
        comment.id = id.to_string();
        comment.post_number = post_number;
        comment.reply_to_post_number = reply.reply_to_post_number;
        comment.is_reply = reply.reply_to_post_number.is_some();
        comment.is_new = false;
        topic.comments.push(comment);

        Ok(CreatedPost {
            id,
            topic_id: reply.topic_id,
            post_number,
            topic_slug: topic.slug.clone(),
        })
    }

    async fn like_post(&self, post_id: u64) -> ApiResult<()> {
        self.pause(Op::Like).await;
        self.record(Some(Op::Like), Call::Like(post_id))
    }

    async fn unlike_post(&self, post_id: u64) -> ApiResult<()> {
        self.record(Some(Op::Unlike), Call::Unlike(post_id))
    }

    async fn bookmark_post(&self, post_id: u64) -> ApiResult<u64> {
        self.pause(Op::Bookmark).await;
        self.record(Some(Op::Bookmark), Call::Bookmark(post_id))?;
        let mut state = self.lock();
        state.next_id += 1;
        Ok(state.next_id)
    }

    async fn remove_bookmark(&self, bookmark_id: u64) -> ApiResult<()> {
        self.record(Some(Op::RemoveBookmark), Call::RemoveBookmark(bookmark_id))
    }
}
