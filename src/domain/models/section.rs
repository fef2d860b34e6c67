//! Legacy section model.
//!
//! Sections predate blocks. They are kept read-compatible and become inert
//! history once a portfolio's blocks exist.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

/// A legacy, heterogeneous portfolio section.
///
/// Scalar fields deserialize leniently: a mistyped value is coerced where
/// possible and dropped otherwise, never the whole section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Section {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub section_type: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub description: Option<String>,
    /// Either a plain string body or a structured object.
    pub content: Value,
    pub style_config: Option<Value>,
    #[serde(deserialize_with = "lenient::string")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub visibility: Option<String>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub enabled: Option<bool>,
    #[serde(deserialize_with = "lenient::integer")]
    pub order: Option<i64>,
}

impl Section {
    /// A section of the given legacy type with everything else unset.
    pub fn new(section_type: impl Into<String>) -> Self {
        Self {
            section_type: Some(section_type.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// Block type a legacy section type maps to. Unknown types become `custom`.
pub fn block_type_for_section(section_type: &str) -> &'static str {
    match section_type {
        "about" | "education" | "achievements" | "contact" | "interests" => "text",
        "projects" => "projects",
        "certificates" => "certificates",
        "skills" => "skills",
        _ => "custom",
    }
}
