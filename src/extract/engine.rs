//! Extraction engine and collaborator boundaries
//!
//! The engine owns the tree walk: parse stored markup, materialize each
//! node against the registry snapshot taken at entry, splice reusable
//! block references in place and render dynamic blocks. Host integrations
//! plug in through the [`ReusableBlockResolver`] and [`DynamicRenderer`]
//! traits; the bundled no-op implementations make the engine usable
//! standalone.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::block_type::{FREEFORM_BLOCK_NAME, REUSABLE_BLOCK_NAME};
use crate::core::registry::{BlockTypeRegistry, RegistrySnapshot};
use crate::core::ContentId;
use crate::error::ExtractError;
use crate::extract::block::{
    resolve_attributes, save_content, strip_newlines, BlockInstance, ParentContext,
};
use crate::markup::Document;
use crate::parse::{DelimiterParser, MarkupParser, ParsedBlock};

/// Supplies the stored markup of a reusable block wrapper by content id.
pub trait ReusableBlockResolver: Send + Sync {
    /// `Ok(None)` means the reference does not resolve; the engine then
    /// materializes the reference node itself instead of splicing.
    fn fetch(&self, id: ContentId) -> anyhow::Result<Option<String>>;
}

/// Resolver for hosts without reusable blocks: nothing ever resolves.
pub struct NoReusableBlocks;

impl ReusableBlockResolver for NoReusableBlocks {
    fn fetch(&self, _id: ContentId) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Server-side rendering hook for dynamic block types.
pub trait DynamicRenderer: Send + Sync {
    /// Whether a server-side render callback exists for this block name.
    fn is_dynamic(&self, block_name: &str) -> bool;

    /// Render the block from its resolved attributes.
    fn render(
        &self,
        block_name: &str,
        attributes: &Map<String, Value>,
        post_id: ContentId,
    ) -> anyhow::Result<String>;
}

/// Renderer for hosts where no block type is dynamic.
pub struct NoDynamicBlocks;

impl DynamicRenderer for NoDynamicBlocks {
    fn is_dynamic(&self, _block_name: &str) -> bool {
        false
    }

    fn render(
        &self,
        block_name: &str,
        _attributes: &Map<String, Value>,
        _post_id: ContentId,
    ) -> anyhow::Result<String> {
        anyhow::bail!("no dynamic renderer configured for block type {block_name:?}")
    }
}

/// A fully materialized content item: the block-instance tree plus the
/// exact source markup it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedContent {
    pub post_id: ContentId,
    /// Source markup snapshot, kept verbatim for freshness comparison.
    pub source: String,
    pub blocks: Vec<BlockInstance>,
}

impl MaterializedContent {
    /// Whether the live markup has drifted from the snapshot this tree
    /// was derived from. Byte equality; no normalization.
    pub fn is_stale(&self, live_markup: &str) -> bool {
        self.source != live_markup
    }

    /// Fail with [`ExtractError::StaleContent`] when the snapshot no
    /// longer matches the live markup.
    pub fn ensure_fresh(&self, live_markup: &str) -> Result<(), ExtractError> {
        if self.is_stale(live_markup) {
            return Err(ExtractError::StaleContent(self.post_id));
        }
        Ok(())
    }
}

/// Whether a cached materialization is out of date for the given live
/// markup.
pub fn is_stale(live_markup: &str, snapshot: &MaterializedContent) -> bool {
    snapshot.is_stale(live_markup)
}

/// Content-tree extraction engine.
pub struct ExtractionEngine {
    registry: BlockTypeRegistry,
    parser: Box<dyn MarkupParser>,
    resolver: Box<dyn ReusableBlockResolver>,
    renderer: Box<dyn DynamicRenderer>,
}

impl ExtractionEngine {
    /// Engine with the bundled delimiter parser and no-op collaborators.
    pub fn new(registry: BlockTypeRegistry) -> Self {
        Self {
            registry,
            parser: Box::new(DelimiterParser::new()),
            resolver: Box::new(NoReusableBlocks),
            renderer: Box::new(NoDynamicBlocks),
        }
    }

    pub fn with_parser(mut self, parser: impl MarkupParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_resolver(mut self, resolver: impl ReusableBlockResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_renderer(mut self, renderer: impl DynamicRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Materialize one content item's block tree from its stored markup.
    ///
    /// The registry snapshot is taken once at entry, so a catalogue push
    /// mid-extraction cannot produce a tree that mixes schema versions
    /// from different catalogues.
    pub fn extract(
        &self,
        post_id: ContentId,
        markup: &str,
    ) -> Result<MaterializedContent, ExtractError> {
        let snapshot = self.registry.get()?;
        let parsed = self
            .parser
            .parse(markup)
            .map_err(ExtractError::MarkupParse)?;

        let mut visited = vec![post_id];
        let mut blocks = Vec::new();
        for node in parsed {
            self.append_block(node, post_id, &snapshot, None, &mut blocks, &mut visited)?;
        }

        Ok(MaterializedContent {
            post_id,
            source: markup.to_string(),
            blocks,
        })
    }

    /// Materialize many content items. Failures are isolated: one bad
    /// item yields its own `Err` without affecting the rest.
    pub fn extract_batch(
        &self,
        items: &BTreeMap<ContentId, String>,
    ) -> BTreeMap<ContentId, Result<MaterializedContent, ExtractError>> {
        items
            .iter()
            .map(|(id, markup)| (*id, self.extract(*id, markup)))
            .collect()
    }

    /// Materialize one parsed node into `siblings`, splicing reusable
    /// references. Sibling order stays contiguous because dropped nodes
    /// never claim a slot.
    fn append_block(
        &self,
        node: ParsedBlock,
        post_id: ContentId,
        snapshot: &RegistrySnapshot,
        parent: Option<&ParentContext>,
        siblings: &mut Vec<BlockInstance>,
        visited: &mut Vec<ContentId>,
    ) -> Result<(), ExtractError> {
        let name = match &node.block_name {
            Some(name) => name.clone(),
            None => {
                // Whitespace-only gaps between blocks are layout noise,
                // not content.
                if node.inner_html.trim().is_empty() {
                    return Ok(());
                }
                FREEFORM_BLOCK_NAME.to_string()
            }
        };

        if name == REUSABLE_BLOCK_NAME {
            if let Some(reference) = node.attrs.get("ref").and_then(Value::as_i64) {
                let reference = ContentId(reference);
                if visited.contains(&reference) {
                    return Err(ExtractError::CyclicReusableReference(reference));
                }

                let fetched = self
                    .resolver
                    .fetch(reference)
                    .map_err(|source| ExtractError::ReusableFetch {
                        id: reference,
                        source,
                    })?;

                if let Some(markup) = fetched {
                    // The visited list tracks the current reference chain
                    // only; the id is unwound once the spliced subtree is
                    // done, so the same shared block may be referenced
                    // repeatedly from non-nested positions.
                    visited.push(reference);
                    let referenced = self
                        .parser
                        .parse(&markup)
                        .map_err(ExtractError::MarkupParse)?;
                    for inner in referenced {
                        self.append_block(inner, post_id, snapshot, parent, siblings, visited)?;
                    }
                    visited.pop();
                    return Ok(());
                }
                // Unresolvable reference: keep the reference node itself.
            }
        }

        if snapshot.get(&name).is_none() {
            return Err(ExtractError::UnknownBlockType(name));
        }
        let versions = snapshot.versions_for(&name).unwrap_or(&[]);

        let document = Document::parse(&node.inner_html);
        let (attributes, attributes_version) =
            resolve_attributes(&node, &name, versions, &document);
        let save_content = save_content(&node);
        let original_content = strip_newlines(&node.inner_html).to_string();

        let order = siblings.len();
        let parent_context = ParentContext {
            name: name.clone(),
            order,
        };

        let mut inner_blocks = Vec::new();
        for inner in node.inner_blocks {
            self.append_block(
                inner,
                post_id,
                snapshot,
                Some(&parent_context),
                &mut inner_blocks,
                visited,
            )?;
        }

        let is_dynamic = self.renderer.is_dynamic(&name);
        let dynamic_content = if is_dynamic {
            match self.renderer.render(&name, &attributes, post_id) {
                Ok(html) => Some(html),
                Err(error) => {
                    // Render failures degrade to an unrendered block
                    // rather than failing the content item.
                    log::warn!(
                        "dynamic render failed for block {:?} in content {}: {:#}",
                        name,
                        post_id,
                        error
                    );
                    None
                }
            }
        } else {
            None
        };

        siblings.push(BlockInstance {
            save_content,
            original_content,
            name,
            post_id,
            attributes,
            attributes_version,
            inner_blocks,
            order,
            parent: parent.cloned(),
            is_dynamic,
            dynamic_content,
        });

        Ok(())
    }
}
