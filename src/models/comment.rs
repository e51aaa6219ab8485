//! Comment model (a reply inside a Byte)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of ids given to optimistic placeholders
pub const TEMP_ID_PREFIX: &str = "temp-";

/// A forum reply as shown in a comment thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// `temp-<millis>` while unconfirmed, the server post id once confirmed
    pub id: String,
    /// Position in the topic (0 for placeholders)
    pub post_number: u64,
    /// Author username
    pub author_username: String,
    /// Author display name
    pub author_name: String,
    /// Avatar template URL
    pub author_avatar: Option<String>,
    /// Plain-text content
    pub content: String,
    /// When the comment was created
    pub created_at: DateTime<Utc>,
    /// Like count
    pub likes: u32,
    /// Whether the current user liked it
    pub liked: bool,
    /// Bookmark id when the current user bookmarked it
    pub bookmark_id: Option<u64>,
    /// Id of the comment this replies to
    pub parent_id: Option<String>,
    /// Post number this replies to
    pub reply_to_post_number: Option<u64>,
    /// Whether this comment is a reply to another comment
    pub is_reply: bool,
    /// Optimistic entry not yet confirmed by the server
    pub is_new: bool,
}

impl Comment {
    /// Create an optimistic placeholder for a comment being submitted
    pub fn placeholder(
        content: &str,
        author_username: &str,
        reply_to: Option<&Comment>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("{TEMP_ID_PREFIX}{}", now.timestamp_millis()),
            post_number: 0,
            author_username: author_username.to_string(),
            author_name: author_username.to_string(),
            author_avatar: None,
            content: content.to_string(),
            created_at: now,
            likes: 0,
            liked: false,
            bookmark_id: None,
            parent_id: reply_to.map(|c| c.id.clone()),
            reply_to_post_number: reply_to.map(|c| c.post_number),
            is_reply: reply_to.is_some(),
            is_new: true,
        }
    }

    /// Whether this is an unconfirmed placeholder
    pub fn is_placeholder(&self) -> bool {
        self.is_new && self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Top-level comments have no reply linkage
    pub const fn is_top_level(&self) -> bool {
        self.parent_id.is_none() && self.reply_to_post_number.is_none()
    }

    /// Server post id, if confirmed
    pub fn post_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }

    /// Short single-line preview
    pub fn preview(&self, max_chars: usize) -> String {
        let content = self.content.replace('\n', " ");
        if content.chars().count() <= max_chars {
            content
        } else {
            let cut: String = content.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }

    /// Relative time string (e.g., "5m", "2h", "3d")
    pub fn relative_time(&self) -> String {
        let duration = Utc::now().signed_duration_since(self.created_at);

        if duration.num_seconds() < 60 {
            format!("{}s", duration.num_seconds().max(0))
        } else if duration.num_minutes() < 60 {
            format!("{}m", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h", duration.num_hours())
        } else if duration.num_days() < 7 {
            format!("{}d", duration.num_days())
        } else {
            self.created_at.format("%b %d").to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn confirmed(id: &str, post_number: u64) -> Comment {
        let mut c = Comment::placeholder("hi", "alice", None, Utc::now());
        c.id = id.to_string();
        c.post_number = post_number;
        c.is_new = false;
        c
    }

    #[test]
    fn test_placeholder_id_uses_clock_millis() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let c = Comment::placeholder("hello", "bob", None, now);
        assert_eq!(c.id, "temp-1700000000123");
        assert!(c.is_placeholder());
        assert!(c.is_top_level());
        assert_eq!(c.post_id(), None);
    }

    #[test]
    fn test_placeholder_reply_linkage() {
        let parent = confirmed("42", 3);
        let c = Comment::placeholder("re", "bob", Some(&parent), Utc::now());
        assert_eq!(c.parent_id.as_deref(), Some("42"));
        assert_eq!(c.reply_to_post_number, Some(3));
        assert!(c.is_reply);
        assert!(!c.is_top_level());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let mut c = confirmed("1", 2);
        c.content = "héllo wörld and more".to_string();
        assert_eq!(c.preview(8), "héllo...");
        assert_eq!(c.post_id(), Some(1));
    }
}
