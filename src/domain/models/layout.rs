//! Portfolio layout: the ordered block array and its transforms.
//!
//! All transforms are pure: they take the current layout and return the
//! new block array, leaving persistence to the caller.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::block::{generate_unique_block_id, Block, BlockOrder, BlockPatch, NewBlock, StoredBlock};
use super::lenient;
use crate::domain::errors::{DomainError, DomainResult};

/// Page structure of a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutType {
    #[default]
    SinglePage,
    MultiPage,
}

impl LayoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePage => "single-page",
            Self::MultiPage => "multi-page",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "single-page" => Some(Self::SinglePage),
            "multi-page" => Some(Self::MultiPage),
            _ => None,
        }
    }
}

/// Layout as found in storage: a legacy string or a structured object
/// whose blocks may be missing or only partially populated.
///
/// JSON matching neither shape is kept verbatim as `Malformed` so that it
/// can be reported and is never silently overwritten.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredLayout {
    /// Pre-block string layout name such as `"single-page"`.
    Legacy(String),
    /// Object layout, possibly without blocks.
    Structured(StoredBlockLayout),
    /// Anything else, kept untouched.
    Malformed(Value),
}

impl<'de> Deserialize<'de> for StoredLayout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Self::Legacy(s),
            value @ Value::Object(_) => match serde_json::from_value::<StoredBlockLayout>(value.clone()) {
                Ok(structured) => Self::Structured(structured),
                Err(_) => Self::Malformed(value),
            },
            other => Self::Malformed(other),
        })
    }
}

/// Structured layout as stored; every field may be absent or mistyped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredBlockLayout {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub layout_type: Option<String>,
    #[serde(deserialize_with = "stored_blocks")]
    pub blocks: Option<Vec<StoredBlock>>,
}

/// Block arrays are read entry by entry; non-object entries are skipped.
/// A `blocks` value that is not an array at all fails the layout.
fn stored_blocks<'de, D>(deserializer: D) -> Result<Option<Vec<StoredBlock>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Array(values) => {
            let (blocks, skipped) = lenient::records(values);
            if skipped > 0 {
                tracing::warn!(skipped, "non-object entries in stored blocks ignored");
            }
            Ok(Some(blocks))
        }
        other => Err(de::Error::invalid_type(unexpected(&other), &"an array of blocks")),
    }
}

fn unexpected(value: &Value) -> de::Unexpected<'_> {
    match value {
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
        Value::Null => de::Unexpected::Unit,
    }
}

impl StoredLayout {
    /// Layout type named by the stored value, defaulting to single-page.
    pub fn layout_type(&self) -> LayoutType {
        let raw = match self {
            Self::Legacy(s) => Some(s.as_str()),
            Self::Structured(s) => s.layout_type.as_deref(),
            Self::Malformed(_) => None,
        };
        raw.and_then(LayoutType::from_str).unwrap_or_default()
    }

    /// True when the stored layout already carries a block array.
    pub fn has_blocks(&self) -> bool {
        match self {
            Self::Legacy(_) | Self::Malformed(_) => false,
            Self::Structured(s) => s.blocks.as_ref().is_some_and(|b| !b.is_empty()),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Normalized layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Layout {
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    pub blocks: Vec<Block>,
}

impl Layout {
    pub fn new(layout_type: LayoutType, blocks: Vec<Block>) -> Self {
        Self { layout_type, blocks }
    }

    /// Look up a block by id.
    pub fn find(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == block_id)
    }

    fn position(&self, block_id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == block_id)
    }

    fn contains(&self, block_id: &str) -> bool {
        self.position(block_id).is_some()
    }

    /// Pick the id for a new block: the caller's, or a fresh one.
    pub fn resolve_new_id(&self, requested: Option<&str>) -> DomainResult<String> {
        match requested {
            Some(id) if self.contains(id) => Err(DomainError::DuplicateBlockId(id.to_string())),
            Some(id) if id.is_empty() => Err(DomainError::ValidationFailed("block id cannot be empty".into())),
            Some(id) => Ok(id.to_string()),
            None => Ok(generate_unique_block_id(self.blocks.iter().map(|b| b.id.as_str()))),
        }
    }

    /// Insert `block`. With `position`, splice at that index and renumber
    /// every block by array position. Otherwise append with
    /// `order = max + 1`, or place it by the explicit order from `request`
    /// and renumber densely.
    pub fn with_block_added(&self, block: Block, request: &NewBlock) -> DomainResult<Vec<Block>> {
        if self.contains(&block.id) {
            return Err(DomainError::DuplicateBlockId(block.id));
        }

        let mut blocks = self.blocks.clone();
        match request.position {
            Some(position) => {
                let index = position.min(blocks.len());
                blocks.insert(index, block);
                renumber(&mut blocks);
            }
            None => {
                let mut block = block;
                block.order = match request.order {
                    Some(order) => order,
                    None => blocks.iter().map(|b| b.order.saturating_add(1)).max().unwrap_or(0),
                };
                blocks.push(block);
                if request.order.is_some() {
                    blocks.sort_by_key(|b| b.order);
                    renumber(&mut blocks);
                }
            }
        }
        Ok(blocks)
    }

    /// Merge `patch` over the block with `block_id`.
    pub fn with_block_updated(&self, block_id: &str, patch: BlockPatch) -> Option<Vec<Block>> {
        let index = self.position(block_id)?;
        let mut blocks = self.blocks.clone();
        blocks[index].apply(patch);
        Some(blocks)
    }

    /// Apply the given orders, then sort the whole array by order and
    /// renumber densely. Gaps and collisions in the input are resolved by
    /// the stable sort, never rejected.
    pub fn with_blocks_reordered(&self, orders: &[BlockOrder]) -> Result<Vec<Block>, String> {
        let mut blocks = self.blocks.clone();
        for entry in orders {
            let block = blocks
                .iter_mut()
                .find(|b| b.id == entry.block_id)
                .ok_or_else(|| entry.block_id.clone())?;
            block.order = entry.order;
        }
        blocks.sort_by_key(|b| b.order);
        renumber(&mut blocks);
        Ok(blocks)
    }

    /// Remove the block and renumber the rest densely.
    pub fn with_block_removed(&self, block_id: &str) -> Option<(Block, Vec<Block>)> {
        let index = self.position(block_id)?;
        let mut blocks = self.blocks.clone();
        let removed = blocks.remove(index);
        renumber(&mut blocks);
        Some((removed, blocks))
    }
}

/// Assign orders 0..n-1 by array position.
pub fn renumber(blocks: &mut [Block]) {
    for (i, block) in blocks.iter_mut().enumerate() {
        block.order = u32::try_from(i).unwrap_or(u32::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(ids: &[&str]) -> Layout {
        let blocks = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Block::new(*id, "text").with_order(i as u32))
            .collect();
        Layout::new(LayoutType::SinglePage, blocks)
    }

    fn ids(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.id.as_str()).collect()
    }

    fn orders(blocks: &[Block]) -> Vec<u32> {
        blocks.iter().map(|b| b.order).collect()
    }

    #[test]
    fn test_add_at_position_renumbers() {
        let l = layout(&["A", "B"]);
        let request = NewBlock::default().at_position(1);
        let blocks = l.with_block_added(Block::new("new", "text"), &request).unwrap();
        assert_eq!(ids(&blocks), vec!["A", "new", "B"]);
        assert_eq!(orders(&blocks), vec![0, 1, 2]);
    }

    #[test]
    fn test_append_uses_max_order_plus_one() {
        let mut l = layout(&["A", "B"]);
        l.blocks[1].order = 5;
        let blocks = l.with_block_added(Block::new("C", "text"), &NewBlock::default()).unwrap();
        assert_eq!(ids(&blocks), vec!["A", "B", "C"]);
        assert_eq!(blocks[2].order, 6);

        let empty = Layout::default();
        let blocks = empty.with_block_added(Block::new("first", "text"), &NewBlock::default()).unwrap();
        assert_eq!(blocks[0].order, 0);
    }

    #[test]
    fn test_add_position_past_end_appends() {
        let l = layout(&["A"]);
        let blocks = l
            .with_block_added(Block::new("Z", "text"), &NewBlock::default().at_position(40))
            .unwrap();
        assert_eq!(ids(&blocks), vec!["A", "Z"]);
        assert_eq!(orders(&blocks), vec![0, 1]);
    }

    #[test]
    fn test_add_duplicate_id_fails() {
        let l = layout(&["A"]);
        let err = l.with_block_added(Block::new("A", "text"), &NewBlock::default()).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateBlockId(id) if id == "A"));
        assert!(matches!(l.resolve_new_id(Some("A")), Err(DomainError::DuplicateBlockId(_))));
    }

    #[test]
    fn test_reorder_sorts_by_given_orders() {
        let l = layout(&["A", "B", "C"]);
        let blocks = l
            .with_blocks_reordered(&[BlockOrder::new("A", 2), BlockOrder::new("B", 0), BlockOrder::new("C", 1)])
            .unwrap();
        assert_eq!(ids(&blocks), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_reorder_resolves_gaps_and_collisions_densely() {
        let l = layout(&["A", "B", "C"]);
        let blocks = l
            .with_blocks_reordered(&[BlockOrder::new("A", 0), BlockOrder::new("C", 7)])
            .unwrap();
        assert_eq!(ids(&blocks), vec!["A", "B", "C"]);
        assert_eq!(orders(&blocks), vec![0, 1, 2]);

        // B keeps order 1 and collides with C; the stable sort keeps B first.
        let blocks = l
            .with_blocks_reordered(&[BlockOrder::new("C", 1), BlockOrder::new("A", 9)])
            .unwrap();
        assert_eq!(ids(&blocks), vec!["B", "C", "A"]);
        assert_eq!(orders(&blocks), vec![0, 1, 2]);
    }

    #[test]
    fn test_add_with_explicit_order_renumbers() {
        let l = layout(&["A", "B", "C"]);
        let request = NewBlock {
            order: Some(1),
            ..Default::default()
        };
        let blocks = l.with_block_added(Block::new("new", "text"), &request).unwrap();
        assert_eq!(ids(&blocks), vec!["A", "B", "new", "C"]);
        assert_eq!(orders(&blocks), vec![0, 1, 2, 3]);

        let far = NewBlock {
            order: Some(50),
            ..Default::default()
        };
        let blocks = l.with_block_added(Block::new("last", "text"), &far).unwrap();
        assert_eq!(ids(&blocks), vec!["A", "B", "C", "last"]);
        assert_eq!(orders(&blocks), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_reorder_unknown_block() {
        let l = layout(&["A"]);
        assert_eq!(l.with_blocks_reordered(&[BlockOrder::new("X", 0)]).unwrap_err(), "X");
    }

    #[test]
    fn test_remove_renumbers_densely() {
        let l = layout(&["A", "B", "C"]);
        let (removed, blocks) = l.with_block_removed("B").unwrap();
        assert_eq!(removed.id, "B");
        assert_eq!(ids(&blocks), vec!["A", "C"]);
        assert_eq!(orders(&blocks), vec![0, 1]);
        assert!(l.with_block_removed("missing").is_none());
    }

    #[test]
    fn test_stored_layout_keeps_unreadable_json() {
        let odd: StoredLayout = serde_json::from_str("42").unwrap();
        assert!(odd.is_malformed());
        assert!(!odd.has_blocks());
        assert_eq!(odd.layout_type(), LayoutType::SinglePage);

        let bad_blocks: StoredLayout = serde_json::from_str(r#"{"type":"multi-page","blocks":"oops"}"#).unwrap();
        assert!(bad_blocks.is_malformed());
        assert_eq!(
            serde_json::to_value(&bad_blocks).unwrap(),
            serde_json::json!({"type": "multi-page", "blocks": "oops"})
        );

        let partly: StoredLayout =
            serde_json::from_str(r#"{"type":"single-page","blocks":[{"id":"a","order":"2"},3,{"id":"b"}]}"#).unwrap();
        let StoredLayout::Structured(structured) = partly else {
            panic!("expected a structured layout");
        };
        let blocks = structured.blocks.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].order, Some(2));
    }

    #[test]
    fn test_stored_layout_shapes() {
        let legacy: StoredLayout = serde_json::from_str(r#""multi-page""#).unwrap();
        assert_eq!(legacy, StoredLayout::Legacy("multi-page".into()));
        assert_eq!(legacy.layout_type(), LayoutType::MultiPage);
        assert!(!legacy.has_blocks());

        let structured: StoredLayout = serde_json::from_str(r#"{"type":"single-page","blocks":[{"id":"x"}]}"#).unwrap();
        assert!(structured.has_blocks());

        let odd: StoredLayout = serde_json::from_str(r#""grid""#).unwrap();
        assert_eq!(odd.layout_type(), LayoutType::SinglePage);
    }
}
