//! Lazy migration from legacy sections to normalized blocks.
//!
//! `needs_migration` and `ensure_blocks_structure` are pure. The
//! [`MigrationService`] wraps them with loading and version-checked
//! write-back.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::block::generate_unique_block_id;
use crate::domain::models::layout::renumber;
use crate::domain::models::section::block_type_for_section;
use crate::domain::models::{
    Block, BlockVerification, BlockVisibility, Layout, Portfolio, PortfolioDocument, Section, StoredLayout,
};
use crate::domain::ports::{PortfolioFilter, PortfolioRepository};

/// True when the stored layout is a legacy string, or when it has no
/// blocks while legacy sections exist. An unreadable layout never needs
/// migration: nothing may be written over it.
pub fn needs_migration(document: &PortfolioDocument) -> bool {
    match &document.layout {
        Some(StoredLayout::Legacy(_)) => true,
        Some(layout @ StoredLayout::Structured(_)) => !layout.has_blocks() && !document.sections.is_empty(),
        Some(StoredLayout::Malformed(_)) => false,
        None => !document.sections.is_empty(),
    }
}

/// Return the normalized portfolio. Without a pending migration the stored
/// blocks are only normalized (defaults filled); otherwise legacy sections
/// are converted into blocks. An unreadable layout is served from the
/// sections, in memory only.
pub fn ensure_blocks_structure(document: PortfolioDocument) -> Portfolio {
    let migrate = needs_migration(&document) || document.layout.as_ref().is_some_and(StoredLayout::is_malformed);
    let PortfolioDocument { meta, layout, sections } = document;

    let layout_type = layout.as_ref().map(StoredLayout::layout_type).unwrap_or_default();
    let blocks = if migrate {
        sections_to_blocks(&sections)
    } else {
        normalize_stored_blocks(layout)
    };

    Portfolio {
        meta,
        layout: Layout::new(layout_type, blocks),
        sections,
    }
}

fn normalize_stored_blocks(layout: Option<StoredLayout>) -> Vec<Block> {
    let stored = match layout {
        Some(StoredLayout::Structured(structured)) => structured.blocks.unwrap_or_default(),
        _ => return Vec::new(),
    };

    let mut taken: HashSet<String> = stored.iter().filter_map(|b| b.id.clone()).collect();
    let mut blocks: Vec<Block> = stored
        .into_iter()
        .enumerate()
        .map(|(index, block)| {
            let block = block.normalize(
                || generate_unique_block_id(taken.iter().map(String::as_str)),
                u32::try_from(index).unwrap_or(u32::MAX),
            );
            taken.insert(block.id.clone());
            block
        })
        .collect();
    // Stored orders may have gaps or repeats; what the core returns is dense.
    blocks.sort_by_key(|b| b.order);
    renumber(&mut blocks);
    blocks
}

/// Convert legacy sections into blocks: map each section, sort by order
/// (stable on ties), renumber densely and replace duplicate ids.
pub fn sections_to_blocks(sections: &[Section]) -> Vec<Block> {
    let mut keyed: Vec<(i64, Block)> = sections
        .iter()
        .enumerate()
        .map(|(index, section)| {
            let position = i64::try_from(index).unwrap_or(i64::MAX);
            (section.order.unwrap_or(position), section_to_block(section))
        })
        .collect();
    keyed.sort_by_key(|(order, _)| *order);

    let mut blocks: Vec<Block> = keyed.into_iter().map(|(_, block)| block).collect();
    renumber(&mut blocks);
    dedupe_block_ids(&mut blocks);
    blocks
}

fn section_to_block(section: &Section) -> Block {
    let mut content = match &section.content {
        Value::Object(map) => map.clone(),
        Value::String(text) => {
            let mut map = Map::new();
            map.insert("text".to_string(), Value::String(text.clone()));
            map
        }
        _ => Map::new(),
    };

    if let Some(title) = &section.title {
        content.insert("title".to_string(), Value::String(title.clone()));
    }
    if let Some(description) = &section.description {
        content.insert("description".to_string(), Value::String(description.clone()));
    }
    if let Some(slug) = &section.slug {
        content.insert("slug".to_string(), Value::String(slug.clone()));
    }
    if let Some(enabled) = section.enabled {
        content.insert("enabled".to_string(), Value::Bool(enabled));
    }

    let section_type = section.section_type.as_deref().unwrap_or("custom");
    Block {
        id: section.id.clone().filter(|id| !id.is_empty()).unwrap_or_default(),
        block_type: block_type_for_section(section_type).to_string(),
        content,
        style_config: section
            .style_config
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new())),
        visibility: section
            .visibility
            .as_deref()
            .and_then(BlockVisibility::from_str)
            .unwrap_or_default(),
        order: 0,
        verification: BlockVerification::default(),
    }
}

/// Replace empty and repeated ids with fresh ones; the first occurrence of
/// an id keeps it.
fn dedupe_block_ids(blocks: &mut [Block]) {
    let mut all: HashSet<String> = blocks.iter().map(|b| b.id.clone()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    for block in blocks.iter_mut() {
        if block.id.is_empty() || !seen.insert(block.id.clone()) {
            let fresh = generate_unique_block_id(all.iter().map(String::as_str));
            all.insert(fresh.clone());
            seen.insert(fresh.clone());
            block.id = fresh;
        }
    }
}

/// Outcome of a batch migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub scanned: usize,
    pub migrated: usize,
    pub failed: usize,
}

/// Loads portfolios through the migration engine.
pub struct MigrationService {
    portfolios: Arc<dyn PortfolioRepository>,
}

impl MigrationService {
    pub fn new(portfolios: Arc<dyn PortfolioRepository>) -> Self {
        Self { portfolios }
    }

    async fn fetch(&self, id: Uuid) -> DomainResult<PortfolioDocument> {
        self.portfolios.get(id).await?.ok_or(DomainError::PortfolioNotFound(id))
    }

    /// Load and normalize without persisting. Used by the write path, whose
    /// own write carries the migration. Refuses a portfolio whose stored
    /// layout could not be read, since the write would destroy it.
    pub async fn load(&self, id: Uuid) -> DomainResult<Portfolio> {
        let document = self.fetch(id).await?;
        if document.layout.as_ref().is_some_and(StoredLayout::is_malformed) {
            tracing::error!(portfolio_id = %id, "refusing to modify portfolio with unreadable layout");
            return Err(DomainError::UnreadableLayout(id));
        }
        Ok(ensure_blocks_structure(document))
    }

    /// Load and normalize, writing a migrated layout back opportunistically.
    /// A failed write-back is logged; the caller still gets the normalized
    /// view and the stored document is left untouched.
    pub async fn load_for_read(&self, id: Uuid) -> DomainResult<Portfolio> {
        let document = self.fetch(id).await?;
        Ok(self.normalize_for_read(document).await)
    }

    /// Like [`Self::load_for_read`], addressed by slug.
    pub async fn load_for_read_by_slug(&self, slug: &str) -> DomainResult<Portfolio> {
        let document = self
            .portfolios
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::SlugNotFound(slug.to_string()))?;
        Ok(self.normalize_for_read(document).await)
    }

    async fn normalize_for_read(&self, document: PortfolioDocument) -> Portfolio {
        let migrate = needs_migration(&document);
        let mut portfolio = ensure_blocks_structure(document);
        if migrate {
            match self.write_back(&portfolio).await {
                Ok(version) => portfolio.meta.version = version,
                Err(e) => {
                    tracing::warn!(
                        portfolio_id = %portfolio.id(),
                        error = %e,
                        "opportunistic layout migration failed; serving unpersisted view"
                    );
                }
            }
        }
        portfolio
    }

    async fn write_back(&self, portfolio: &Portfolio) -> DomainResult<u64> {
        let verification = portfolio
            .meta
            .verification
            .rederive(&portfolio.layout.blocks, None, Utc::now());
        let version = self
            .portfolios
            .replace_layout(portfolio.id(), &portfolio.layout, &verification, portfolio.meta.version, &[])
            .await?;
        tracing::info!(
            portfolio_id = %portfolio.id(),
            blocks = portfolio.layout.blocks.len(),
            sections = portfolio.sections.len(),
            "migrated legacy layout to blocks"
        );
        Ok(version)
    }

    /// Migrate one portfolio explicitly. Returns whether anything was written.
    pub async fn migrate_portfolio(&self, id: Uuid) -> DomainResult<bool> {
        let document = self.fetch(id).await?;
        if !needs_migration(&document) {
            return Ok(false);
        }
        let portfolio = ensure_blocks_structure(document);
        self.write_back(&portfolio).await?;
        Ok(true)
    }

    /// Migrate every stored portfolio, continuing past individual failures.
    pub async fn migrate_all(&self) -> DomainResult<MigrationSummary> {
        let documents = self.portfolios.list(PortfolioFilter::default()).await?;
        let mut summary = MigrationSummary {
            scanned: documents.len(),
            ..Default::default()
        };

        for document in documents {
            if !needs_migration(&document) {
                continue;
            }
            let portfolio = ensure_blocks_structure(document);
            match self.write_back(&portfolio).await {
                Ok(_) => summary.migrated += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(portfolio_id = %portfolio.id(), error = %e, "batch migration failed");
                }
            }
        }

        tracing::info!(
            scanned = summary.scanned,
            migrated = summary.migrated,
            failed = summary.failed,
            "batch layout migration finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqlitePortfolioRepository};
    use crate::domain::models::{
        PortfolioMeta, PortfolioVerification, Slug, StoredBlockLayout, VerificationLogEntry,
    };
    use async_trait::async_trait;
    use serde_json::json;

    /// Reads from SQLite, but every layout write loses a version race.
    struct RacingRepository {
        inner: SqlitePortfolioRepository,
    }

    #[async_trait]
    impl PortfolioRepository for RacingRepository {
        async fn create(&self, document: &PortfolioDocument) -> DomainResult<()> {
            self.inner.create(document).await
        }

        async fn get(&self, id: Uuid) -> DomainResult<Option<PortfolioDocument>> {
            self.inner.get(id).await
        }

        async fn get_by_slug(&self, slug: &str) -> DomainResult<Option<PortfolioDocument>> {
            self.inner.get_by_slug(slug).await
        }

        async fn list(&self, filter: PortfolioFilter) -> DomainResult<Vec<PortfolioDocument>> {
            self.inner.list(filter).await
        }

        async fn replace_layout(
            &self,
            id: Uuid,
            _layout: &Layout,
            _verification: &PortfolioVerification,
            _expected_version: u64,
            _audit: &[VerificationLogEntry],
        ) -> DomainResult<u64> {
            Err(DomainError::ConcurrencyConflict {
                entity: "portfolio".to_string(),
                id: id.to_string(),
            })
        }

        async fn update_meta(&self, meta: &PortfolioMeta) -> DomainResult<u64> {
            self.inner.update_meta(meta).await
        }

        async fn update_rating(&self, id: Uuid, rating: f64) -> DomainResult<()> {
            self.inner.update_rating(id, rating).await
        }
    }

    fn document(layout: Option<StoredLayout>, sections: Vec<Section>) -> PortfolioDocument {
        let meta = PortfolioMeta::new(Uuid::new_v4(), Slug::parse("test-folio").unwrap(), "Test");
        let mut doc = PortfolioDocument::new(meta).with_sections(sections);
        doc.layout = layout;
        doc
    }

    #[test]
    fn test_needs_migration_cases() {
        let legacy = document(Some(StoredLayout::Legacy("single-page".into())), vec![]);
        assert!(needs_migration(&legacy));

        let empty_with_sections = document(
            Some(StoredLayout::Structured(StoredBlockLayout {
                layout_type: Some("single-page".into()),
                blocks: Some(vec![]),
            })),
            vec![Section::new("about")],
        );
        assert!(needs_migration(&empty_with_sections));

        let nothing = document(None, vec![]);
        assert!(!needs_migration(&nothing));

        let has_blocks: StoredLayout = serde_json::from_value(json!({"type": "single-page", "blocks": [{"id": "b1"}]})).unwrap();
        assert!(!needs_migration(&document(Some(has_blocks), vec![Section::new("about")])));
    }

    #[test]
    fn test_stored_blocks_come_back_dense() {
        let layout: StoredLayout = serde_json::from_value(json!({
            "type": "single-page",
            "blocks": [
                {"id": "late", "order": 9},
                {"id": "early", "order": "2"},
                {"id": "tie", "order": 9}
            ]
        }))
        .unwrap();
        let portfolio = ensure_blocks_structure(document(Some(layout), vec![]));
        let placed: Vec<(&str, u32)> = portfolio.layout.blocks.iter().map(|b| (b.id.as_str(), b.order)).collect();
        assert_eq!(placed, vec![("early", 0), ("late", 1), ("tie", 2)]);
    }

    #[test]
    fn test_unreadable_layout_is_never_migrated() {
        let sections = vec![Section::new("about").with_id("s1").with_content(json!("hello"))];
        let doc = document(Some(StoredLayout::Malformed(json!(42))), sections);
        assert!(!needs_migration(&doc));

        // Readers still get the sections as blocks, in memory.
        let portfolio = ensure_blocks_structure(doc);
        assert_eq!(portfolio.layout.blocks.len(), 1);
        assert_eq!(portfolio.layout.blocks[0].id, "s1");
    }

    #[test]
    fn test_legacy_string_without_sections_yields_empty_blocks() {
        let portfolio = ensure_blocks_structure(document(Some(StoredLayout::Legacy("multi-page".into())), vec![]));
        assert!(portfolio.layout.blocks.is_empty());
        assert_eq!(portfolio.layout.layout_type.as_str(), "multi-page");
    }

    #[test]
    fn test_section_mapping() {
        let mut section = Section::new("about")
            .with_id("s1")
            .with_title("About me")
            .with_content(json!("I like maths"));
        section.enabled = Some(true);
        section.visibility = Some("private".into());

        let portfolio = ensure_blocks_structure(document(Some(StoredLayout::Legacy("single-page".into())), vec![section]));
        let block = &portfolio.layout.blocks[0];
        assert_eq!(block.id, "s1");
        assert_eq!(block.block_type, "text");
        assert_eq!(block.content_str("text"), Some("I like maths"));
        assert_eq!(block.content_str("title"), Some("About me"));
        assert_eq!(block.content.get("enabled"), Some(&json!(true)));
        assert_eq!(block.visibility, BlockVisibility::Private);
    }

    #[test]
    fn test_malformed_content_degrades_to_empty_object() {
        let section = Section::new("skills").with_content(json!([1, 2, 3]));
        let blocks = sections_to_blocks(&[section]);
        assert!(blocks[0].content.is_empty());
        assert_eq!(blocks[0].block_type, "skills");
    }

    #[test]
    fn test_order_sort_and_dense_renumber() {
        let sections = vec![
            Section::new("about").with_id("a").with_order(10),
            Section::new("skills").with_id("b").with_order(2),
            Section::new("projects").with_id("c"),
        ];
        let blocks = sections_to_blocks(&sections);
        let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        let orders: Vec<u32> = blocks.iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_and_missing_ids_replaced() {
        let sections = vec![
            Section::new("about").with_id("dup"),
            Section::new("skills").with_id("dup"),
            Section::new("custom"),
        ];
        let blocks = sections_to_blocks(&sections);
        assert_eq!(blocks[0].id, "dup");
        assert_ne!(blocks[1].id, "dup");
        assert!(!blocks[2].id.is_empty());
        let unique: HashSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_idempotent_on_second_application() {
        let sections = vec![
            Section::new("about").with_content(json!("hello")),
            Section::new("certificates").with_content(json!({"issuedBy": "platform"})),
        ];
        let first = ensure_blocks_structure(document(Some(StoredLayout::Legacy("single-page".into())), sections));
        let stored = first.to_document().unwrap();
        assert!(!needs_migration(&stored));

        let second = ensure_blocks_structure(stored);
        assert_eq!(
            serde_json::to_string(&first.layout).unwrap(),
            serde_json::to_string(&second.layout).unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_write_back_still_serves_normalized_view() {
        let pool = create_migrated_test_pool().await.expect("Failed to create test pool");
        let sqlite = SqlitePortfolioRepository::new(pool);
        let sections = vec![
            Section::new("about").with_id("s1").with_content(json!("hello")),
            Section::new("certificates").with_id("s2"),
        ];
        let doc = document(Some(StoredLayout::Legacy("single-page".into())), sections);
        sqlite.create(&doc).await.unwrap();

        let service = MigrationService::new(Arc::new(RacingRepository { inner: sqlite.clone() }));
        let portfolio = service.load_for_read(doc.meta.id).await.unwrap();
        let ids: Vec<&str> = portfolio.layout.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(portfolio.meta.version, doc.meta.version);

        let by_slug = service.load_for_read_by_slug("test-folio").await.unwrap();
        assert_eq!(by_slug.layout.blocks.len(), 2);

        // The stored document is untouched.
        let stored = sqlite.get(doc.meta.id).await.unwrap().unwrap();
        assert_eq!(stored.layout, Some(StoredLayout::Legacy("single-page".into())));
        assert_eq!(stored.meta.version, doc.meta.version);

        // Explicit migration reports the failure instead.
        assert!(matches!(
            service.migrate_portfolio(doc.meta.id).await,
            Err(DomainError::ConcurrencyConflict { .. })
        ));
        let summary = service.migrate_all().await.unwrap();
        assert_eq!((summary.scanned, summary.migrated, summary.failed), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_write_path_refuses_unreadable_layout() {
        let pool = create_migrated_test_pool().await.expect("Failed to create test pool");
        let sqlite = SqlitePortfolioRepository::new(pool.clone());
        let doc = document(None, vec![]);
        sqlite.create(&doc).await.unwrap();
        sqlx::query("UPDATE portfolios SET layout = '[1, 2]' WHERE id = ?")
            .bind(doc.meta.id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let service = MigrationService::new(Arc::new(sqlite));
        assert!(service.load_for_read(doc.meta.id).await.is_ok());
        assert!(matches!(
            service.load(doc.meta.id).await,
            Err(DomainError::UnreadableLayout(id)) if id == doc.meta.id
        ));
        assert!(!service.migrate_portfolio(doc.meta.id).await.unwrap());
    }
}
