//! Byte model (a Discourse topic with its post stream)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Comment;

/// A topic and its comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Byte {
    /// Topic id
    pub id: u64,
    /// Title
    pub title: String,
    /// URL slug
    pub slug: String,
    /// Teret the Byte lives in
    pub category_id: Option<u64>,
    /// The opening post (post number 1)
    pub opening: Option<Comment>,
    /// Replies, in post-number order
    pub comments: Vec<Comment>,
    /// Total posts including the opening post
    pub posts_count: u32,
    /// When the topic was created
    pub created_at: DateTime<Utc>,
}

impl Byte {
    /// Find a comment by id
    pub fn comment(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Web URL of the Byte on the given site
    pub fn url(&self, site: &str) -> String {
        format!("{}/t/{}/{}", site.trim_end_matches('/'), self.slug, self.id)
    }
}

/// Post number of the opening post
pub const OPENING_POST_NUMBER: u64 = 1;

/// Fill in `parent_id` from `reply_to_post_number` within one topic
///
/// Discourse only reports the post number a reply targets; the id link is
/// derived here so either side of the linkage can be used. Replies aimed at
/// the opening post are top-level comments.
pub fn link_replies(comments: &mut [Comment]) {
    let numbers: Vec<(u64, String)> = comments
        .iter()
        .map(|c| (c.post_number, c.id.clone()))
        .collect();

    for comment in comments.iter_mut() {
        if comment.reply_to_post_number == Some(OPENING_POST_NUMBER) {
            comment.reply_to_post_number = None;
        }
        if let Some(target) = comment.reply_to_post_number {
            comment.parent_id = numbers
                .iter()
                .find(|(n, _)| *n == target)
                .map(|(_, id)| id.clone());
            comment.is_reply = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, number: u64, reply_to: Option<u64>) -> Comment {
        let mut c = Comment::placeholder("x", "u", None, Utc::now());
        c.id = id.to_string();
        c.post_number = number;
        c.reply_to_post_number = reply_to;
        c.is_new = false;
        c
    }

    #[test]
    fn test_link_replies() {
        let mut comments = vec![
            comment("10", 2, None),
            comment("11", 3, Some(2)),
            comment("12", 4, Some(1)),
        ];
        link_replies(&mut comments);

        assert_eq!(comments[0].parent_id, None);
        assert!(!comments[0].is_reply);
        assert_eq!(comments[1].parent_id.as_deref(), Some("10"));
        assert!(comments[1].is_reply);
        assert!(comments[2].is_top_level());
        assert!(!comments[2].is_reply);
    }
}
