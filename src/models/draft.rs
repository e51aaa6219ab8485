//! Composer draft model

use serde::{Deserialize, Serialize};

use super::UploadedImage;

/// Discourse draft action for a brand-new topic
pub const CREATE_TOPIC_ACTION: &str = "createTopic";

/// In-progress composer content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftContent {
    /// Topic title
    pub title: String,
    /// Markdown body
    pub body: String,
    /// Selected Teret (subcategory)
    pub category_id: Option<u64>,
    /// Images uploaded for this draft
    pub images: Vec<UploadedImage>,
}

impl DraftContent {
    /// No title, no body and no attachments
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty() && self.images.is_empty()
    }

    /// Convert into the payload Discourse stores for a draft
    pub fn to_data(&self) -> DraftData {
        DraftData {
            reply: self.body.clone(),
            title: self.title.clone(),
            category_id: self.category_id,
            action: CREATE_TOPIC_ACTION.to_string(),
            images: self.images.clone(),
        }
    }
}

/// Draft payload as stored by Discourse (a JSON document inside a string)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftData {
    /// Body
    #[serde(default)]
    pub reply: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Category
    #[serde(default, rename = "categoryId", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    /// Composer action
    #[serde(default)]
    pub action: String,
    /// Uploaded images
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<UploadedImage>,
}

impl From<DraftData> for DraftContent {
    fn from(data: DraftData) -> Self {
        Self {
            title: data.title,
            body: data.reply,
            category_id: data.category_id,
            images: data.images,
        }
    }
}

/// A draft as returned by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDraft {
    /// Draft slot
    pub draft_key: String,
    /// Server sequence for the slot
    pub sequence: u64,
    /// Stored content, `None` when the slot exists but holds nothing
    pub content: Option<DraftContent>,
}

/// Locally cached pointer to the remote draft slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftMeta {
    /// Draft slot
    pub draft_key: String,
    /// Last sequence the server confirmed
    pub sequence: u64,
}
