//! Block tool registry.
//!
//! Provides:
//! - `BlockTool`: validate / sanitize / render capability for one block type
//! - `ToolDescriptor`: name, label, kind and configuration of a tool
//! - `ToolRegistry`: the tool set handed to the editing surface, plus the
//!   raw-to-typed block serialization that runs on every save

mod standard;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::block::{Block, LinkMeta, RawBlock};
use crate::config::ComposerConfig;
use crate::error::{ComposerError, ComposerResult, UploadError};
use crate::link::{LinkPreview, LinkSuggestion};
use crate::upload::{LocalFile, UploadResult, Uploader};

pub use standard::{sanitize_html, standard_tools};

/// Capability interface every block-producing tool implements.
pub trait BlockTool: Send + Sync {
    /// Check block data. An empty list means the block is valid.
    fn validate(&self, data: &Value) -> Vec<String>;

    /// Clean text-bearing fields in place.
    fn sanitize(&self, _data: &mut Value) {}

    /// Render block data as HTML.
    fn render(&self, data: &Value) -> String;
}

/// Whether a tool produces blocks or only formats text inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Block,
    Inline,
}

/// Per-tool configuration.
#[derive(Clone, Default)]
pub enum ToolConfig {
    #[default]
    None,
    Image {
        uploader: Arc<dyn Uploader>,
    },
    LinkMetadata {
        endpoint: Url,
        links: Arc<dyn LinkPreview>,
    },
    LinkAutocomplete {
        endpoint: Url,
        query_param: String,
        links: Arc<dyn LinkPreview>,
    },
    CodeBox {
        theme_url: Url,
        theme_name: String,
        default_theme: String,
    },
}

impl fmt::Debug for ToolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolConfig::None => f.write_str("None"),
            ToolConfig::Image { .. } => f.debug_struct("Image").finish_non_exhaustive(),
            ToolConfig::LinkMetadata { endpoint, .. } => f
                .debug_struct("LinkMetadata")
                .field("endpoint", &endpoint.as_str())
                .finish_non_exhaustive(),
            ToolConfig::LinkAutocomplete {
                endpoint,
                query_param,
                ..
            } => f
                .debug_struct("LinkAutocomplete")
                .field("endpoint", &endpoint.as_str())
                .field("query_param", query_param)
                .finish_non_exhaustive(),
            ToolConfig::CodeBox {
                theme_url,
                theme_name,
                default_theme,
            } => f
                .debug_struct("CodeBox")
                .field("theme_url", &theme_url.as_str())
                .field("theme_name", theme_name)
                .field("default_theme", default_theme)
                .finish(),
        }
    }
}

/// A registered tool.
pub struct ToolDescriptor {
    /// Name blocks are tagged with (e.g. "header", "linkTool").
    pub name: String,
    /// Human-readable label for toolboxes.
    pub label: String,
    pub kind: ToolKind,
    pub config: ToolConfig,
    capability: Option<Arc<dyn BlockTool>>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("emits_blocks", &self.capability.is_some())
            .finish()
    }
}

impl ToolDescriptor {
    /// A tool that produces blocks.
    pub fn block(
        name: impl Into<String>,
        label: impl Into<String>,
        capability: impl BlockTool + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: ToolKind::Block,
            config: ToolConfig::None,
            capability: Some(Arc::new(capability)),
        }
    }

    /// An inline formatting tool.
    pub fn inline(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: ToolKind::Inline,
            config: ToolConfig::None,
            capability: None,
        }
    }

    /// Mark a block-capable tool as living in the inline toolbar.
    pub fn in_inline_toolbar(mut self) -> Self {
        self.kind = ToolKind::Inline;
        self
    }

    pub fn with_config(mut self, config: ToolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capability(&self) -> Option<&dyn BlockTool> {
        self.capability.as_deref()
    }

    /// Whether blocks may be tagged with this tool's name.
    pub fn emits_blocks(&self) -> bool {
        self.capability.is_some()
    }
}

/// Inputs needed to build the standard tool set.
#[derive(Clone)]
pub struct ToolSettings {
    pub api_url: String,
    pub link_metadata_path: String,
    pub link_search_url: String,
    pub link_query_param: String,
    pub code_theme_url: String,
    pub code_theme_name: String,
    pub code_default_theme: String,
    pub uploader: Arc<dyn Uploader>,
    pub links: Arc<dyn LinkPreview>,
}

impl ToolSettings {
    pub fn new(
        config: &ComposerConfig,
        uploader: Arc<dyn Uploader>,
        links: Arc<dyn LinkPreview>,
    ) -> Self {
        Self {
            api_url: config.api_url.clone(),
            link_metadata_path: config.link_metadata_path.clone(),
            link_search_url: config.link_search_url.clone(),
            link_query_param: config.link_query_param.clone(),
            code_theme_url: config.code_theme_url.clone(),
            code_theme_name: config.code_theme_name.clone(),
            code_default_theme: config.code_default_theme.clone(),
            uploader,
            links,
        }
    }
}

/// Registry of tools, in declaration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard tool set. Misconfiguration is reported here, before
    /// any surface is mounted.
    pub fn standard(settings: &ToolSettings) -> ComposerResult<Self> {
        let mut registry = Self::new();
        for tool in standard_tools(settings)? {
            registry.register(tool)?;
        }
        debug!(tools = registry.len(), "tool registry built");
        Ok(registry)
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: ToolDescriptor) -> ComposerResult<()> {
        if tool.name.is_empty() {
            return Err(ComposerError::tool_config("", "tool name must not be empty"));
        }
        if self.index.contains_key(&tool.name) {
            return Err(ComposerError::tool_config(
                &tool.name,
                "tool registered twice",
            ));
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// The uploader configured on the image tool.
    pub fn uploader(&self) -> Option<Arc<dyn Uploader>> {
        self.tools.iter().find_map(|t| match &t.config {
            ToolConfig::Image { uploader } => Some(uploader.clone()),
            _ => None,
        })
    }

    /// Upload a file on behalf of an image block.
    pub async fn upload_image(&self, file: LocalFile) -> Result<UploadResult, UploadError> {
        let uploader = self.uploader().ok_or(UploadError::NoUploader)?;
        uploader.upload_by_file(file).await
    }

    /// Fetch preview metadata through the link tool's endpoint.
    pub async fn link_meta(&self, link: &str) -> Option<LinkMeta> {
        let (endpoint, links) = self.tools.iter().find_map(|t| match &t.config {
            ToolConfig::LinkMetadata { endpoint, links } => Some((endpoint, links.clone())),
            _ => None,
        })?;
        links.fetch_meta(endpoint, link).await
    }

    /// Query the inline link autocomplete.
    pub async fn link_search(&self, query: &str) -> Vec<LinkSuggestion> {
        let Some((endpoint, param, links)) = self.tools.iter().find_map(|t| match &t.config {
            ToolConfig::LinkAutocomplete {
                endpoint,
                query_param,
                links,
            } => Some((endpoint, query_param, links.clone())),
            _ => None,
        }) else {
            return Vec::new();
        };
        links.search(endpoint, param, query).await
    }

    /// Validate block data against the named tool.
    ///
    /// Returns a list of validation error messages. An empty list means the
    /// block is valid.
    pub fn validate_block(&self, tool: &str, data: &Value) -> Vec<String> {
        let Some(descriptor) = self.get(tool) else {
            return vec![format!("unknown block type '{tool}'")];
        };
        match descriptor.capability() {
            Some(capability) => capability.validate(data),
            None => vec![format!("'{tool}' is an inline tool and cannot form a block")],
        }
    }

    /// Turn a surface's raw save output into typed blocks, preserving order.
    ///
    /// Each block is sanitized, validated by its tool, and decoded. The first
    /// block that fails stops serialization.
    pub fn serialize_blocks(&self, raw: Vec<RawBlock>) -> ComposerResult<Vec<Block>> {
        raw.into_iter()
            .enumerate()
            .map(|(index, mut block)| {
                let fail = |message: String| ComposerError::Block {
                    index,
                    tool: block.tool.clone(),
                    message,
                };

                let Some(capability) = self.get(&block.tool).and_then(|t| t.capability())
                else {
                    let errors = self.validate_block(&block.tool, &block.data);
                    return Err(fail(errors.join("; ")));
                };

                capability.sanitize(&mut block.data);
                let errors = capability.validate(&block.data);
                if !errors.is_empty() {
                    return Err(fail(errors.join("; ")));
                }

                let tool = block.tool.clone();
                Block::try_from(block).map_err(|e| ComposerError::Block {
                    index,
                    tool,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Render typed blocks into a single HTML string.
    pub fn render_blocks(&self, blocks: &[Block]) -> String {
        let mut html = String::new();
        for block in blocks {
            let raw = RawBlock::from(block.clone());
            if let Some(capability) = self.get(&raw.tool).and_then(|t| t.capability()) {
                html.push_str(&capability.render(&raw.data));
            }
        }
        html
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::block::{BlockKind, HeaderData};

    struct FixedUploader;

    #[async_trait]
    impl Uploader for FixedUploader {
        async fn upload_by_file(&self, file: LocalFile) -> Result<UploadResult, UploadError> {
            Ok(UploadResult::uploaded(format!("https://cdn.example/{}", file.name)))
        }
    }

    struct FixedLinks;

    #[async_trait]
    impl LinkPreview for FixedLinks {
        async fn fetch_meta(&self, endpoint: &Url, link: &str) -> Option<LinkMeta> {
            Some(LinkMeta {
                title: Some(format!("{link} via {}", endpoint.path())),
                ..LinkMeta::default()
            })
        }

        async fn search(&self, _endpoint: &Url, param: &str, query: &str) -> Vec<LinkSuggestion> {
            vec![LinkSuggestion {
                name: format!("{param}={query}"),
                href: "https://example.com".to_string(),
                description: None,
            }]
        }
    }

    fn settings() -> ToolSettings {
        ToolSettings::new(
            &ComposerConfig::default(),
            Arc::new(FixedUploader),
            Arc::new(FixedLinks),
        )
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::standard(&settings()).unwrap()
    }

    #[test]
    fn standard_tools_in_declaration_order() {
        let registry = registry();
        assert_eq!(
            registry.names(),
            [
                "paragraph",
                "header",
                "linkTool",
                "link",
                "image",
                "list",
                "table",
                "embed",
                "inlineCode",
                "codeBox",
                "code",
                "quote",
                "marker",
                "checklist",
            ]
        );
    }

    #[test]
    fn inline_tools_do_not_emit_blocks() {
        let registry = registry();
        assert_eq!(registry.get("inlineCode").unwrap().kind, ToolKind::Inline);
        assert!(!registry.get("inlineCode").unwrap().emits_blocks());
        assert!(!registry.get("link").unwrap().emits_blocks());
        assert_eq!(registry.get("marker").unwrap().kind, ToolKind::Inline);
        assert!(registry.get("marker").unwrap().emits_blocks());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = registry();
        let err = registry
            .register(ToolDescriptor::inline("marker", "Marker"))
            .unwrap_err();
        assert!(matches!(err, ComposerError::ToolConfig { ref tool, .. } if tool == "marker"));
    }

    #[test]
    fn misconfigured_link_endpoint_is_fatal() {
        let mut settings = settings();
        settings.link_search_url = "not a url".to_string();
        let err = ToolRegistry::standard(&settings).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ComposerError::ToolConfig { ref tool, .. } if tool == "link"));
    }

    #[test]
    fn empty_query_param_is_fatal() {
        let mut settings = settings();
        settings.link_query_param = " ".to_string();
        assert!(ToolRegistry::standard(&settings).is_err());
    }

    #[test]
    fn empty_code_theme_is_fatal() {
        let mut settings = settings();
        settings.code_theme_name = String::new();
        let err = ToolRegistry::standard(&settings).unwrap_err();
        assert!(matches!(err, ComposerError::ToolConfig { ref tool, .. } if tool == "codeBox"));
    }

    #[test]
    fn link_tool_endpoint_resolves_against_api() {
        let registry = registry();
        let ToolConfig::LinkMetadata { endpoint, .. } = &registry.get("linkTool").unwrap().config
        else {
            panic!("expected link metadata config");
        };
        assert_eq!(endpoint.as_str(), "http://localhost:3000/api/link");
    }

    #[test]
    fn validate_unknown_and_inline_tools() {
        let registry = registry();
        let unknown = registry.validate_block("carousel", &json!({}));
        assert_eq!(unknown, ["unknown block type 'carousel'"]);
        let inline = registry.validate_block("inlineCode", &json!({}));
        assert!(inline[0].contains("inline tool"));
    }

    #[test]
    fn serialize_blocks_preserves_order_and_ids() {
        let registry = registry();
        let blocks = registry
            .serialize_blocks(vec![
                RawBlock::new("header", json!({ "text": "Hello World", "level": 2 })).with_id("h1"),
                RawBlock::new("paragraph", json!({ "text": "body" })).with_id("p1"),
            ])
            .unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].id.as_deref(), Some("h1"));
        assert_eq!(
            blocks[0].kind,
            BlockKind::Header(HeaderData {
                text: "Hello World".to_string(),
                level: 2,
                extra: Default::default(),
            })
        );
        assert_eq!(blocks[1].tool(), "paragraph");
    }

    #[test]
    fn serialize_blocks_sanitizes_before_validating() {
        let registry = registry();
        let blocks = registry
            .serialize_blocks(vec![RawBlock::new(
                "paragraph",
                json!({ "text": "<p>Hi</p><script>alert('xss')</script>" }),
            )])
            .unwrap();
        let BlockKind::Paragraph(text) = &blocks[0].kind else {
            panic!("expected paragraph");
        };
        assert!(!text.text.contains("<script>"));
        assert!(text.text.contains("Hi"));
    }

    #[test]
    fn serialize_blocks_keeps_inline_tool_markup() {
        let text = r#"a <mark class="cdx-marker">hi</mark> and <code class="inline-code">x</code>"#;
        let blocks = registry()
            .serialize_blocks(vec![RawBlock::new("paragraph", json!({ "text": text }))])
            .unwrap();
        let BlockKind::Paragraph(paragraph) = &blocks[0].kind else {
            panic!("expected paragraph");
        };
        assert_eq!(paragraph.text, text);
    }

    #[test]
    fn serialize_blocks_keeps_tool_fields_it_does_not_model() {
        let raw = vec![
            RawBlock::new(
                "table",
                json!({ "withHeadings": true, "stretched": true, "content": [["a"]] }),
            ),
            RawBlock::new(
                "linkTool",
                json!({
                    "link": "https://example.com",
                    "meta": { "title": "T", "site_name": "Example" }
                }),
            ),
            RawBlock::new(
                "list",
                json!({
                    "style": "checklist",
                    "items": [{ "content": "a", "meta": { "checked": true }, "items": [] }]
                }),
            ),
        ];

        let blocks = registry().serialize_blocks(raw.clone()).unwrap();

        let sent: Vec<RawBlock> = blocks.into_iter().map(RawBlock::from).collect();
        assert_eq!(sent, raw);
    }

    #[test]
    fn serialize_blocks_reports_failing_index() {
        let registry = registry();
        let err = registry
            .serialize_blocks(vec![
                RawBlock::new("paragraph", json!({ "text": "ok" })),
                RawBlock::new("image", json!({ "file": { "url": "" } })),
            ])
            .unwrap_err();
        let ComposerError::Block { index, tool, message } = err else {
            panic!("expected block error");
        };
        assert_eq!(index, 1);
        assert_eq!(tool, "image");
        assert!(message.contains("must not be empty"));
    }

    #[test]
    fn serialize_blocks_rejects_unknown_tool() {
        let registry = registry();
        let err = registry
            .serialize_blocks(vec![RawBlock::new("carousel", json!({}))])
            .unwrap_err();
        assert!(err.to_string().contains("unknown block type 'carousel'"));
    }

    #[test]
    fn render_blocks_concatenates_in_order() {
        let registry = registry();
        let blocks = registry
            .serialize_blocks(vec![
                RawBlock::new("header", json!({ "text": "Title", "level": 1 })),
                RawBlock::new("paragraph", json!({ "text": "Body" })),
            ])
            .unwrap();
        assert_eq!(registry.render_blocks(&blocks), "<h1>Title</h1><p>Body</p>");
    }

    #[tokio::test]
    async fn image_tool_carries_the_uploader() {
        let registry = registry();
        let result = registry
            .upload_image(LocalFile::new("cat.png", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(result.resource_url, "https://cdn.example/cat.png");
    }

    #[tokio::test]
    async fn empty_registry_has_no_uploader() {
        let registry = ToolRegistry::new();
        let err = registry
            .upload_image(LocalFile::new("cat.png", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NoUploader));
        assert!(registry.link_meta("https://example.com").await.is_none());
        assert!(registry.link_search("rust").await.is_empty());
    }

    #[tokio::test]
    async fn link_tools_use_configured_endpoints() {
        let registry = registry();
        let meta = registry.link_meta("https://example.com").await.unwrap();
        assert_eq!(
            meta.title.as_deref(),
            Some("https://example.com via /api/link")
        );
        let suggestions = registry.link_search("rust").await;
        assert_eq!(suggestions[0].name, "search=rust");
    }
}
