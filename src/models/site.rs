//! Server-supplied composer validation thresholds

use serde::{Deserialize, Serialize};

/// Where a set of thresholds came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    /// Read from the site's settings
    Site,
    /// Stock values; the site settings were not readable
    #[default]
    Defaults,
}

/// Minimum lengths the server enforces for new topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    /// Minimum trimmed title length
    pub min_title: usize,
    /// Minimum trimmed body length
    pub min_post: usize,
    /// Origin of the values above
    #[serde(default)]
    pub source: ThresholdSource,
}

impl ValidationThresholds {
    /// Whether these are the stock values rather than the site's own
    pub fn is_default(&self) -> bool {
        self.source == ThresholdSource::Defaults
    }
}

impl Default for ValidationThresholds {
    /// Discourse's stock `min_topic_title_length` / `min_first_post_length`
    fn default() -> Self {
        Self {
            min_title: 15,
            min_post: 20,
            source: ThresholdSource::Defaults,
        }
    }
}
