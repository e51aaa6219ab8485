//! Hubs (parent categories) and Terets (subcategories)

use serde::{Deserialize, Serialize};

/// A Discourse category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category id
    pub id: u64,
    /// Display name
    pub name: String,
    /// URL slug
    pub slug: String,
    /// Hex color without `#`
    #[serde(default)]
    pub color: String,
    /// Plain-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Parent category, for subcategories
    #[serde(default)]
    pub parent_category_id: Option<u64>,
    /// Number of topics
    #[serde(default)]
    pub topic_count: u32,
}

/// A subcategory; the unit users post into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teret {
    /// Underlying category
    pub category: Category,
    /// Owning Hub id
    pub hub_id: u64,
}

/// A parent category grouping Terets; not directly postable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hub {
    /// Underlying category
    pub category: Category,
    /// Subcategories
    pub terets: Vec<Teret>,
}

impl Hub {
    /// Find a Teret of this Hub by id
    pub fn teret(&self, id: u64) -> Option<&Teret> {
        self.terets.iter().find(|t| t.category.id == id)
    }
}

/// Group a flat category list into Hubs with their Terets
///
/// Hubs keep the order they arrive in. Subcategories whose parent is not in
/// the list are dropped.
pub fn group_hubs(categories: Vec<Category>) -> Vec<Hub> {
    let (parents, children): (Vec<_>, Vec<_>) = categories
        .into_iter()
        .partition(|c| c.parent_category_id.is_none());

    let mut hubs: Vec<Hub> = parents
        .into_iter()
        .map(|category| Hub {
            category,
            terets: Vec::new(),
        })
        .collect();

    for child in children {
        let Some(parent_id) = child.parent_category_id else {
            continue;
        };
        if let Some(hub) = hubs.iter_mut().find(|h| h.category.id == parent_id) {
            hub.terets.push(Teret {
                category: child,
                hub_id: parent_id,
            });
        }
    }

    hubs
}

/// Find a Teret by id across all Hubs
pub fn find_teret(hubs: &[Hub], id: u64) -> Option<&Teret> {
    hubs.iter().find_map(|h| h.teret(id))
}
