use serde::{Deserialize, Serialize};

/// Structural role of a sub-item within the finished artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    Cover,
    Section,
    Body,
    Summary,
    Closing,
}

/// One planned sub-item. Immutable once the plan is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubItemSpec {
    #[serde(default)]
    pub position: usize,
    pub role: ItemRole,
    pub title: String,
    /// Free-form fields consumed by the renderer.
    #[serde(default)]
    pub content: serde_json::Map<String, serde_json::Value>,
}

impl SubItemSpec {
    pub fn new(role: ItemRole, title: impl Into<String>) -> Self {
        Self {
            position: 0,
            role,
            title: title.into(),
            content: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.content.insert(key.into(), value);
        self
    }
}

/// Rewrites every `position` to its index in the plan.
///
/// Planners are free to number items however they like; the index is what
/// orders the final artifacts and names the uploaded blobs.
pub fn normalize_plan(mut items: Vec<SubItemSpec>) -> Vec<SubItemSpec> {
    for (index, item) in items.iter_mut().enumerate() {
        item.position = index;
    }
    items
}
