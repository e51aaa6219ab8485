//! Signed-in user

use serde::{Deserialize, Serialize};

/// The user the API credentials belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User id
    pub id: u64,
    /// Username
    pub username: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar template (`{size}` placeholder)
    #[serde(default)]
    pub avatar_template: Option<String>,
}

impl CurrentUser {
    /// Name to show, falling back to the username
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }

    /// Avatar URL for a given pixel size, resolved against the site
    pub fn avatar_url(&self, site: &str, size: u32) -> Option<String> {
        let template = self.avatar_template.as_ref()?;
        let path = template.replace("{size}", &size.to_string());
        if path.starts_with("http") {
            Some(path)
        } else {
            Some(format!("{}{}", site.trim_end_matches('/'), path))
        }
    }
}
