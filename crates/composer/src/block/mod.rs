//! Block content model.
//!
//! A post body is an ordered list of blocks in the block editor's output
//! format: `{ "id": "...", "type": "<tool>", "data": { ... } }`. Surfaces
//! emit [`RawBlock`]s; the tool registry checks them and decodes them into
//! typed [`Block`]s.
//!
//! Data structs name the fields the composer reads. Everything else a tool
//! stores (`stretched`, `meta.site_name`, list item `meta`, ...) is kept in
//! `extra` and written back unchanged.

pub mod render;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A block exactly as a surface emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the tool that produced the block.
    #[serde(rename = "type")]
    pub tool: String,

    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl RawBlock {
    pub fn new(tool: impl Into<String>, data: Value) -> Self {
        Self {
            id: None,
            tool: tool.into(),
            data,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A typed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub id: Option<String>,
    pub kind: BlockKind,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self { id: None, kind }
    }

    /// Tool name this block serializes under.
    pub fn tool(&self) -> &'static str {
        self.kind.tool()
    }
}

impl TryFrom<RawBlock> for Block {
    type Error = serde_json::Error;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let kind = serde_json::from_value(serde_json::json!({
            "type": raw.tool,
            "data": raw.data,
        }))?;
        Ok(Self { id: raw.id, kind })
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        let (tool, data) = match serde_json::to_value(&block.kind) {
            Ok(Value::Object(mut map)) => (
                map.remove("type")
                    .and_then(|t| t.as_str().map(str::to_string))
                    .unwrap_or_else(|| block.kind.tool().to_string()),
                map.remove("data").unwrap_or_else(empty_object),
            ),
            _ => (block.kind.tool().to_string(), empty_object()),
        };
        RawBlock {
            id: block.id,
            tool,
            data,
        }
    }
}

/// Tool-specific block data, tagged by tool name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BlockKind {
    #[serde(rename = "paragraph")]
    Paragraph(TextData),
    #[serde(rename = "header")]
    Header(HeaderData),
    #[serde(rename = "list")]
    List(ListData),
    #[serde(rename = "table")]
    Table(TableData),
    #[serde(rename = "embed")]
    Embed(EmbedData),
    #[serde(rename = "image")]
    Image(ImageData),
    #[serde(rename = "linkTool")]
    Link(LinkData),
    #[serde(rename = "code")]
    Code(CodeData),
    #[serde(rename = "codeBox")]
    CodeBox(CodeBoxData),
    #[serde(rename = "quote")]
    Quote(QuoteData),
    #[serde(rename = "marker")]
    Marker(TextData),
    #[serde(rename = "checklist")]
    Checklist(ChecklistData),
}

impl BlockKind {
    pub fn tool(&self) -> &'static str {
        match self {
            BlockKind::Paragraph(_) => "paragraph",
            BlockKind::Header(_) => "header",
            BlockKind::List(_) => "list",
            BlockKind::Table(_) => "table",
            BlockKind::Embed(_) => "embed",
            BlockKind::Image(_) => "image",
            BlockKind::Link(_) => "linkTool",
            BlockKind::Code(_) => "code",
            BlockKind::CodeBox(_) => "codeBox",
            BlockKind::Quote(_) => "quote",
            BlockKind::Marker(_) => "marker",
            BlockKind::Checklist(_) => "checklist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderData {
    pub text: String,
    #[serde(default = "default_header_level")]
    pub level: u8,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_header_level() -> u8 {
    2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    Ordered,
    #[default]
    Unordered,
    Checklist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub style: ListStyle,
    #[serde(default)]
    pub items: Vec<ListItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A list entry: either plain text or a nested item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Text(String),
    Nested(NestedListItem),
}

/// `{ content, items, meta }`, with `meta.checked` on checklist-style lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedListItem {
    pub content: String,
    #[serde(default)]
    pub items: Vec<ListItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    #[serde(default)]
    pub with_headings: bool,
    #[serde(default)]
    pub content: Vec<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedData {
    pub service: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    pub file: FileRef,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub with_border: bool,
    #[serde(default)]
    pub with_background: bool,
    #[serde(default)]
    pub stretched: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<FileRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkData {
    pub link: String,
    #[serde(default)]
    pub meta: LinkMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeData {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBoxData {
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub theme: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteData {
    pub text: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistData {
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The editor's save output: the ordered blocks plus a timestamp and the
/// surface version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorOutput {
    /// Milliseconds since the Unix epoch.
    pub time: i64,
    pub blocks: Vec<Block>,
    pub version: String,
}
