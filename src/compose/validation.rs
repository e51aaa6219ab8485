//! Submit gating for the composer

use crate::models::{DraftContent, ValidationThresholds};

/// Why the composer cannot be submitted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Trimmed title is shorter than the server minimum
    TitleTooShort {
        /// Required length
        min: usize,
    },
    /// Trimmed body is shorter than the server minimum
    BodyTooShort {
        /// Required length
        min: usize,
    },
    /// No Teret selected
    MissingCategory,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TitleTooShort { min } => write!(f, "Title must be at least {min} characters"),
            Self::BodyTooShort { min } => write!(f, "Post must be at least {min} characters"),
            Self::MissingCategory => write!(f, "Choose a Teret to post in"),
        }
    }
}

/// Every rule the content currently breaks, in field order
pub fn validate(content: &DraftContent, thresholds: ValidationThresholds) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if content.title.trim().chars().count() < thresholds.min_title {
        issues.push(ValidationIssue::TitleTooShort {
            min: thresholds.min_title,
        });
    }
    if content.body.trim().chars().count() < thresholds.min_post {
        issues.push(ValidationIssue::BodyTooShort {
            min: thresholds.min_post,
        });
    }
    if content.category_id.is_none() {
        issues.push(ValidationIssue::MissingCategory);
    }

    issues
}

/// Whether the submit action is enabled
pub fn can_submit(
    content: &DraftContent,
    thresholds: ValidationThresholds,
    is_submitting: bool,
) -> bool {
    !is_submitting && validate(content, thresholds).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThresholdSource;

    const THRESHOLDS: ValidationThresholds = ValidationThresholds {
        min_title: 5,
        min_post: 10,
        source: ThresholdSource::Site,
    };

    fn content(title: &str, body: &str, category_id: Option<u64>) -> DraftContent {
        DraftContent {
            title: title.to_string(),
            body: body.to_string(),
            category_id,
            images: Vec::new(),
        }
    }

    #[test]
    fn test_enabled_when_all_rules_pass() {
        let c = content("Hello world", "This is a long enough body to post.", Some(3));
        assert!(validate(&c, THRESHOLDS).is_empty());
        assert!(can_submit(&c, THRESHOLDS, false));
        assert!(!can_submit(&c, THRESHOLDS, true));
    }

    #[test]
    fn test_short_title_message() {
        let c = content("hey", "This is a long enough body to post.", Some(3));
        let issues = validate(&c, THRESHOLDS);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].to_string().contains("Title must be at least"));
        assert!(!can_submit(&c, THRESHOLDS, false));
    }

    #[test]
    fn test_lengths_are_trimmed() {
        let c = content("   abcd   ", "  123456789  ", None);
        assert_eq!(
            validate(&c, THRESHOLDS),
            vec![
                ValidationIssue::TitleTooShort { min: 5 },
                ValidationIssue::BodyTooShort { min: 10 },
                ValidationIssue::MissingCategory,
            ]
        );
    }

    #[test]
    fn test_exact_minimums_pass() {
        let c = content("abcde", "0123456789", Some(1));
        assert!(can_submit(&c, THRESHOLDS, false));
    }
}
