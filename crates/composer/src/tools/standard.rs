//! The standard tool set and per-tool validation.
//!
//! Validation rules per tool:
//! - paragraph / header / quote / marker: text fields must not carry
//!   disallowed HTML; header level 1..=6
//! - list / checklist / table: every item or cell is checked the same way;
//!   list style is ordered, unordered or checklist
//! - image: `file.url` must be present and non-empty
//! - linkTool: `link` must be an http(s) URL
//! - code / codeBox: `code` field must exist
//! - embed: `service` and `source` fields must exist

use serde_json::Value;
use url::Url;

use crate::block::render;
use crate::error::{ComposerError, ComposerResult};

use super::{BlockTool, ToolConfig, ToolDescriptor, ToolSettings};

/// Build the standard tools in toolbox order.
pub fn standard_tools(settings: &ToolSettings) -> ComposerResult<Vec<ToolDescriptor>> {
    let api = Url::parse(&settings.api_url).map_err(|e| {
        ComposerError::tool_config(
            "linkTool",
            format!("invalid API url '{}': {e}", settings.api_url),
        )
    })?;
    let metadata_endpoint = api.join(&settings.link_metadata_path).map_err(|e| {
        ComposerError::tool_config(
            "linkTool",
            format!("invalid endpoint '{}': {e}", settings.link_metadata_path),
        )
    })?;

    let search_endpoint = Url::parse(&settings.link_search_url).map_err(|e| {
        ComposerError::tool_config(
            "link",
            format!("invalid endpoint '{}': {e}", settings.link_search_url),
        )
    })?;
    if settings.link_query_param.trim().is_empty() {
        return Err(ComposerError::tool_config(
            "link",
            "query parameter must not be empty",
        ));
    }

    let theme_url = Url::parse(&settings.code_theme_url).map_err(|e| {
        ComposerError::tool_config(
            "codeBox",
            format!("invalid theme url '{}': {e}", settings.code_theme_url),
        )
    })?;
    if settings.code_theme_name.trim().is_empty() {
        return Err(ComposerError::tool_config(
            "codeBox",
            "theme name must not be empty",
        ));
    }

    Ok(vec![
        ToolDescriptor::block("paragraph", "Text", ParagraphTool),
        ToolDescriptor::block("header", "Heading", HeaderTool),
        ToolDescriptor::block("linkTool", "Link", LinkTool).with_config(ToolConfig::LinkMetadata {
            endpoint: metadata_endpoint,
            links: settings.links.clone(),
        }),
        ToolDescriptor::inline("link", "Link").with_config(ToolConfig::LinkAutocomplete {
            endpoint: search_endpoint,
            query_param: settings.link_query_param.trim().to_string(),
            links: settings.links.clone(),
        }),
        ToolDescriptor::block("image", "Image", ImageTool).with_config(ToolConfig::Image {
            uploader: settings.uploader.clone(),
        }),
        ToolDescriptor::block("list", "List", ListTool),
        ToolDescriptor::block("table", "Table", TableTool),
        ToolDescriptor::block("embed", "Embed", EmbedTool),
        ToolDescriptor::inline("inlineCode", "Inline Code"),
        ToolDescriptor::block("codeBox", "Code Box", CodeTool).with_config(ToolConfig::CodeBox {
            theme_url,
            theme_name: settings.code_theme_name.clone(),
            default_theme: settings.code_default_theme.clone(),
        }),
        ToolDescriptor::block("code", "Code", CodeTool),
        ToolDescriptor::block("quote", "Quote", QuoteTool),
        ToolDescriptor::block("marker", "Marker", MarkerTool).in_inline_toolbar(),
        ToolDescriptor::block("checklist", "Checklist", ChecklistTool),
    ])
}

struct ParagraphTool;

impl BlockTool for ParagraphTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        require_string(data, "text", "paragraph", &mut errors);
        validate_text_field(data, "text", "paragraph", &mut errors);
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        sanitize_value_field(data, "text");
    }

    fn render(&self, data: &Value) -> String {
        render::render_paragraph(data)
    }
}

struct HeaderTool;

impl BlockTool for HeaderTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        require_string(data, "text", "header", &mut errors);
        validate_text_field(data, "text", "header", &mut errors);
        if let Some(level) = data.get("level") {
            if let Some(n) = level.as_i64() {
                if !(1..=6).contains(&n) {
                    errors.push(format!("header: level must be between 1 and 6, got {n}"));
                }
            } else {
                errors.push("header: level must be an integer".to_string());
            }
        }
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        sanitize_value_field(data, "text");
    }

    fn render(&self, data: &Value) -> String {
        render::render_header(data)
    }
}

struct MarkerTool;

impl BlockTool for MarkerTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        require_string(data, "text", "marker", &mut errors);
        validate_text_field(data, "text", "marker", &mut errors);
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        sanitize_value_field(data, "text");
    }

    fn render(&self, data: &Value) -> String {
        render::render_marker(data)
    }
}

struct QuoteTool;

impl BlockTool for QuoteTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        require_string(data, "text", "quote", &mut errors);
        validate_text_field(data, "text", "quote", &mut errors);
        validate_text_field(data, "caption", "quote", &mut errors);
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        sanitize_value_field(data, "text");
        sanitize_value_field(data, "caption");
    }

    fn render(&self, data: &Value) -> String {
        render::render_quote(data)
    }
}

struct ListTool;

impl BlockTool for ListTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(style) = data.get("style")
            && !matches!(style.as_str(), Some("ordered" | "unordered" | "checklist"))
        {
            errors.push("list: style must be 'ordered', 'unordered' or 'checklist'".to_string());
        }
        match data.get("items").and_then(|v| v.as_array()) {
            Some(items) => validate_list_items(items, "item", &mut errors),
            None => errors.push("list: missing required field 'items'".to_string()),
        }
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        if let Some(items) = data.get_mut("items").and_then(|v| v.as_array_mut()) {
            sanitize_list_items(items);
        }
    }

    fn render(&self, data: &Value) -> String {
        render::render_list(data)
    }
}

fn validate_list_items(items: &[Value], path: &str, errors: &mut Vec<String>) {
    for (i, item) in items.iter().enumerate() {
        let text = item
            .as_str()
            .or_else(|| item.get("content").and_then(|v| v.as_str()));
        match text {
            Some(text) if sanitize_html(text) != text => errors.push(format!(
                "list: {path} {i} contains disallowed HTML that was sanitized"
            )),
            Some(_) => {}
            None => errors.push(format!("list: {path} {i} must be text")),
        }
        if let Some(children) = item.get("items").and_then(|v| v.as_array()) {
            validate_list_items(children, &format!("{path} {i} item"), errors);
        }
    }
}

fn sanitize_list_items(items: &mut [Value]) {
    for item in items.iter_mut() {
        if let Some(text) = item.as_str().map(sanitize_html) {
            *item = Value::String(text);
            continue;
        }
        sanitize_value_field(item, "content");
        if let Some(children) = item.get_mut("items").and_then(|v| v.as_array_mut()) {
            sanitize_list_items(children);
        }
    }
}

struct ChecklistTool;

impl BlockTool for ChecklistTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(items) = data.get("items").and_then(|v| v.as_array()) else {
            errors.push("checklist: missing required field 'items'".to_string());
            return errors;
        };
        for (i, item) in items.iter().enumerate() {
            match item.get("text").and_then(|v| v.as_str()) {
                Some(text) if sanitize_html(text) != text => errors.push(format!(
                    "checklist: item {i} contains disallowed HTML that was sanitized"
                )),
                Some(_) => {}
                None => errors.push(format!("checklist: item {i} is missing 'text'")),
            }
            if let Some(checked) = item.get("checked")
                && !checked.is_boolean()
            {
                errors.push(format!("checklist: item {i} 'checked' must be a boolean"));
            }
        }
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        if let Some(items) = data.get_mut("items").and_then(|v| v.as_array_mut()) {
            for item in items.iter_mut() {
                sanitize_value_field(item, "text");
            }
        }
    }

    fn render(&self, data: &Value) -> String {
        render::render_checklist(data)
    }
}

struct TableTool;

impl BlockTool for TableTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(rows) = data.get("content").and_then(|v| v.as_array()) else {
            errors.push("table: missing required field 'content'".to_string());
            return errors;
        };
        let mut width = None;
        for (r, row) in rows.iter().enumerate() {
            let Some(cells) = row.as_array() else {
                errors.push(format!("table: row {r} must be a list of cells"));
                continue;
            };
            match width {
                None => width = Some(cells.len()),
                Some(w) if w != cells.len() => errors.push(format!(
                    "table: row {r} has {} cells, expected {w}",
                    cells.len()
                )),
                Some(_) => {}
            }
            for (c, cell) in cells.iter().enumerate() {
                match cell.as_str() {
                    Some(text) if sanitize_html(text) != text => errors.push(format!(
                        "table: cell {r}:{c} contains disallowed HTML that was sanitized"
                    )),
                    Some(_) => {}
                    None => errors.push(format!("table: cell {r}:{c} must be text")),
                }
            }
        }
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        let Some(rows) = data.get_mut("content").and_then(|v| v.as_array_mut()) else {
            return;
        };
        for cell in rows
            .iter_mut()
            .filter_map(|row| row.as_array_mut())
            .flatten()
        {
            if let Some(text) = cell.as_str().map(sanitize_html) {
                *cell = Value::String(text);
            }
        }
    }

    fn render(&self, data: &Value) -> String {
        render::render_table(data)
    }
}

struct ImageTool;

impl BlockTool for ImageTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let url = data
            .get("file")
            .and_then(|f| f.get("url"))
            .and_then(|u| u.as_str());
        match url {
            Some("") => vec!["image: file.url must not be empty".to_string()],
            Some(_) => Vec::new(),
            None => vec!["image: missing required field file.url".to_string()],
        }
    }

    fn sanitize(&self, data: &mut Value) {
        sanitize_value_field(data, "caption");
    }

    fn render(&self, data: &Value) -> String {
        render::render_image(data)
    }
}

struct LinkTool;

impl BlockTool for LinkTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        match data.get("link").and_then(|v| v.as_str()) {
            None => vec!["linkTool: missing required field 'link'".to_string()],
            Some(link) if !render::is_safe_url(link) => {
                vec![format!("linkTool: '{link}' is not an http(s) URL")]
            }
            Some(_) => Vec::new(),
        }
    }

    fn render(&self, data: &Value) -> String {
        render::render_link(data)
    }
}

struct CodeTool;

impl BlockTool for CodeTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        if data.get("code").and_then(|v| v.as_str()).is_none() {
            return vec!["code: missing required field 'code'".to_string()];
        }
        Vec::new()
    }

    fn render(&self, data: &Value) -> String {
        render::render_code(data)
    }
}

struct EmbedTool;

impl BlockTool for EmbedTool {
    fn validate(&self, data: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        if data.get("service").is_none() {
            errors.push("embed: missing required field 'service'".to_string());
        }
        if data.get("source").is_none() {
            errors.push("embed: missing required field 'source'".to_string());
        }
        errors
    }

    fn sanitize(&self, data: &mut Value) {
        sanitize_value_field(data, "caption");
    }

    fn render(&self, data: &Value) -> String {
        render::render_embed(data)
    }
}

/// Push an error when a required string field is absent.
fn require_string(data: &Value, field: &str, tool: &str, errors: &mut Vec<String>) {
    if data.get(field).and_then(|v| v.as_str()).is_none() {
        errors.push(format!("{tool}: missing required field '{field}'"));
    }
}

/// Flag a text field that sanitization would change (i.e. contains
/// disallowed HTML). Missing fields are left to `require_string`.
fn validate_text_field(data: &Value, field: &str, tool: &str, errors: &mut Vec<String>) {
    if let Some(text) = data.get(field).and_then(|v| v.as_str())
        && sanitize_html(text) != text
    {
        errors.push(format!(
            "{tool}: '{field}' contains disallowed HTML that was sanitized"
        ));
    }
}

/// Sanitize a string field inside a JSON object in-place using ammonia.
fn sanitize_value_field(data: &mut Value, field: &str) {
    if let Some(text) = data.get(field).and_then(|v| v.as_str()).map(sanitize_html)
        && let Some(v) = data.as_object_mut().and_then(|obj| obj.get_mut(field))
    {
        *v = Value::String(text);
    }
}

/// Sanitize HTML input with ammonia.
///
/// Strips dangerous elements like `<script>`, event handlers, and
/// other XSS vectors while preserving safe formatting tags and the
/// `marker` / `inlineCode` classes.
pub fn sanitize_html(input: &str) -> String {
    render::sanitize_text(input)
}
