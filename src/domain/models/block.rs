//! Block domain model.
//!
//! A block is the normalized unit of portfolio content. Each block has its
//! own visibility and verification state and a dense, zero-based order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::lenient;
use super::verification::{requires_verification, BlockVerification, StoredVerification, VerificationPatch};

/// Block type used when a caller does not specify one.
pub const DEFAULT_BLOCK_TYPE: &str = "text";

/// Visibility of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockVisibility {
    #[default]
    Public,
    Private,
}

impl BlockVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A normalized content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub content: Map<String, Value>,
    pub style_config: Value,
    pub visibility: BlockVisibility,
    pub order: u32,
    pub verification: BlockVerification,
}

impl Block {
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            content: Map::new(),
            style_config: Value::Object(Map::new()),
            visibility: BlockVisibility::default(),
            order: 0,
            verification: BlockVerification::default(),
        }
    }

    pub fn with_content(mut self, content: Map<String, Value>) -> Self {
        self.content = content;
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn with_visibility(mut self, visibility: BlockVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn requires_verification(&self) -> bool {
        requires_verification(&self.block_type)
    }

    /// String value of a content field, if present.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// Apply a partial update. The id is never overwritten.
    pub fn apply(&mut self, patch: BlockPatch) {
        if let Some(block_type) = patch.block_type {
            self.block_type = block_type;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(style) = patch.style_config {
            self.style_config = style;
        }
        if let Some(visibility) = patch.visibility {
            self.visibility = visibility;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        if let Some(verification) = patch.verification {
            self.verification.merge(verification);
        }
    }
}

/// Generate a fresh block id.
pub fn generate_block_id() -> String {
    format!("block_{}", Uuid::new_v4().simple())
}

/// Generate a block id that does not collide with `taken`.
pub fn generate_unique_block_id<'a>(taken: impl IntoIterator<Item = &'a str> + Clone) -> String {
    loop {
        let candidate = generate_block_id();
        if !taken.clone().into_iter().any(|id| id == candidate) {
            return candidate;
        }
    }
}

/// Input for adding a block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewBlock {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub content: Option<Map<String, Value>>,
    pub style_config: Option<Value>,
    pub visibility: Option<BlockVisibility>,
    pub order: Option<u32>,
    /// Array index to splice the block at; all blocks are renumbered.
    pub position: Option<usize>,
}

impl NewBlock {
    pub fn of_type(block_type: impl Into<String>) -> Self {
        Self {
            block_type: Some(block_type.into()),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: Map<String, Value>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_visibility(mut self, visibility: BlockVisibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Materialize the block with the given id; order is assigned by the layout.
    pub fn into_block(self, id: String) -> Block {
        Block {
            id,
            block_type: self.block_type.unwrap_or_else(|| DEFAULT_BLOCK_TYPE.to_string()),
            content: self.content.unwrap_or_default(),
            style_config: self.style_config.unwrap_or_else(|| Value::Object(Map::new())),
            visibility: self.visibility.unwrap_or_default(),
            order: self.order.unwrap_or(0),
            verification: BlockVerification::default(),
        }
    }
}

/// Partial update of a block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockPatch {
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub content: Option<Map<String, Value>>,
    pub style_config: Option<Value>,
    pub visibility: Option<BlockVisibility>,
    pub order: Option<u32>,
    pub verification: Option<VerificationPatch>,
}

/// Target order for one block in a reorder request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOrder {
    pub block_id: String,
    pub order: u32,
}

impl BlockOrder {
    pub fn new(block_id: impl Into<String>, order: u32) -> Self {
        Self {
            block_id: block_id.into(),
            order,
        }
    }
}

/// Block as found in raw storage, before normalization.
///
/// Every scalar is read leniently so one mistyped field degrades only that
/// field of that block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredBlock {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub block_type: Option<String>,
    pub content: Value,
    pub style_config: Option<Value>,
    #[serde(deserialize_with = "lenient::string")]
    pub visibility: Option<String>,
    #[serde(deserialize_with = "lenient::integer")]
    pub order: Option<i64>,
    #[serde(deserialize_with = "lenient::record")]
    pub verification: Option<StoredVerification>,
}

impl StoredBlock {
    /// Normalize into a block, filling every missing field.
    pub fn normalize(self, fallback_id: impl FnOnce() -> String, fallback_order: u32) -> Block {
        let content = match self.content {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Block {
            id: self.id.filter(|id| !id.is_empty()).unwrap_or_else(fallback_id),
            block_type: self.block_type.unwrap_or_else(|| DEFAULT_BLOCK_TYPE.to_string()),
            content,
            style_config: self.style_config.unwrap_or_else(|| Value::Object(Map::new())),
            visibility: self
                .visibility
                .as_deref()
                .and_then(BlockVisibility::from_str)
                .unwrap_or_default(),
            order: self
                .order
                .and_then(|o| u32::try_from(o).ok())
                .unwrap_or(fallback_order),
            verification: self.verification.map(Into::into).unwrap_or_default(),
        }
    }
}
