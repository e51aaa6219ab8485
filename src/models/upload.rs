//! Uploaded image model

use serde::{Deserialize, Serialize};

/// An image uploaded to the forum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    /// Upload id
    pub id: u64,
    /// `upload://` short URL used in Markdown
    pub short_url: String,
    /// Original file name
    pub original_filename: String,
    /// Pixel width, when known
    #[serde(default)]
    pub width: Option<u32>,
    /// Pixel height, when known
    #[serde(default)]
    pub height: Option<u32>,
}

impl UploadedImage {
    /// Create an upload without dimensions
    pub fn new(id: u64, short_url: &str, original_filename: &str) -> Self {
        Self {
            id,
            short_url: short_url.to_string(),
            original_filename: original_filename.to_string(),
            width: None,
            height: None,
        }
    }

    /// Markdown reference Discourse renders as the image
    pub fn markdown(&self) -> String {
        let stem = self
            .original_filename
            .rsplit_once('.')
            .map_or(self.original_filename.as_str(), |(stem, _)| stem);
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("![{stem}|{w}x{h}]({})", self.short_url),
            _ => format!("![{stem}]({})", self.short_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_with_dimensions() {
        let mut image = UploadedImage::new(3, "upload://abc.jpeg", "cat.photo.jpeg");
        image.width = Some(640);
        image.height = Some(480);
        assert_eq!(image.markdown(), "![cat.photo|640x480](upload://abc.jpeg)");
    }

    #[test]
    fn test_markdown_without_extension() {
        let image = UploadedImage::new(3, "upload://abc", "scan");
        assert_eq!(image.markdown(), "![scan](upload://abc)");
    }
}
