//! Data models for Fomio

mod category;
mod comment;
mod draft;
mod site;
mod topic;
mod upload;
mod user;

pub use category::{Category, Hub, Teret, find_teret, group_hubs};
pub use comment::{Comment, TEMP_ID_PREFIX};
pub use draft::{CREATE_TOPIC_ACTION, DraftContent, DraftData, DraftMeta, RemoteDraft};
pub use site::{ThresholdSource, ValidationThresholds};
pub use topic::{Byte, OPENING_POST_NUMBER, link_replies};
pub use upload::UploadedImage;
pub use user::CurrentUser;
