//! HTML preview rendering for block data.
//!
//! Each function takes a block's `data` object and returns semantic HTML:
//! - Rich text is cleaned with ammonia; attributes and URLs are escaped
//! - Code uses `syntect` for syntax highlighting when a language is known
//! - Embeds render as iframes only for whitelisted hosts

use serde_json::Value;
use std::sync::LazyLock;

/// Class names the inline tools put on their markup.
const INLINE_TOOL_CLASSES: [(&str, &str); 2] = [("mark", "cdx-marker"), ("code", "inline-code")];

static SANITIZER: LazyLock<ammonia::Builder<'static>> = LazyLock::new(|| {
    let mut builder = ammonia::Builder::default();
    for (tag, class) in INLINE_TOOL_CLASSES {
        builder.add_allowed_classes(tag, [class]);
    }
    builder
});

/// Sanitize user-provided rich text, allowing only safe inline HTML and the
/// inline tools' own classes.
pub fn sanitize_text(input: &str) -> String {
    SANITIZER.clean(input).to_string()
}

/// Escape text for use inside HTML content or attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Whether a URL uses http or https.
pub fn is_safe_url(url: &str) -> bool {
    let trimmed = url.trim();
    trimmed.starts_with("https://") || trimmed.starts_with("http://")
}

static SYNTAX_SET: LazyLock<syntect::parsing::SyntaxSet> =
    LazyLock::new(syntect::parsing::SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<syntect::highlighting::ThemeSet> =
    LazyLock::new(syntect::highlighting::ThemeSet::load_defaults);

fn str_field<'a>(data: &'a Value, field: &str) -> &'a str {
    data.get(field).and_then(|v| v.as_str()).unwrap_or("")
}

/// `{ "text": "..." }`
pub fn render_paragraph(data: &Value) -> String {
    format!("<p>{}</p>", sanitize_text(str_field(data, "text")))
}

/// `{ "text": "...", "level": 2 }`
pub fn render_header(data: &Value) -> String {
    let level = data
        .get("level")
        .and_then(|v| v.as_u64())
        .unwrap_or(2)
        .clamp(1, 6);
    let clean = sanitize_text(str_field(data, "text"));
    format!("<h{level}>{clean}</h{level}>")
}

/// `{ "text": "..." }` rendered as highlighted text.
pub fn render_marker(data: &Value) -> String {
    format!(
        "<p><mark class=\"cdx-marker\">{}</mark></p>",
        sanitize_text(str_field(data, "text"))
    )
}

/// `{ "file": { "url": "..." }, "caption": "..." }`
pub fn render_image(data: &Value) -> String {
    let url = data
        .get("file")
        .and_then(|f| f.get("url"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let escaped_url = html_escape(url);
    let escaped_caption = html_escape(str_field(data, "caption"));
    format!(
        "<figure><img src=\"{escaped_url}\" alt=\"{escaped_caption}\">\
         <figcaption>{escaped_caption}</figcaption></figure>"
    )
}

/// `{ "style": "ordered"|"unordered"|"checklist", "items": [...] }`
///
/// Items are strings or `{ "content": "...", "meta": {...}, "items": [...] }`
/// objects. Checklist items carry `meta.checked`.
pub fn render_list(data: &Value) -> String {
    let style = data
        .get("style")
        .and_then(|v| v.as_str())
        .unwrap_or("unordered");
    let items = data
        .get("items")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    render_list_items(style, items)
}

fn render_list_items(style: &str, items: &[Value]) -> String {
    let (tag, open) = match style {
        "ordered" => ("ol", "<ol>"),
        "checklist" => ("ul", "<ul class=\"checklist\">"),
        _ => ("ul", "<ul>"),
    };
    let mut html = open.to_string();
    for item in items {
        let content = item
            .as_str()
            .or_else(|| item.get("content").and_then(|v| v.as_str()))
            .unwrap_or("");
        html.push_str("<li>");
        if style == "checklist" {
            let checked = item
                .pointer("/meta/checked")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let marker = if checked { " checked" } else { "" };
            html.push_str(&format!("<input type=\"checkbox\" disabled{marker}> "));
        }
        html.push_str(&sanitize_text(content));
        if let Some(children) = item.get("items").and_then(|v| v.as_array())
            && !children.is_empty()
        {
            html.push_str(&render_list_items(style, children));
        }
        html.push_str("</li>");
    }
    html.push_str(&format!("</{tag}>"));
    html
}

/// `{ "withHeadings": true, "content": [["a", "b"], ...] }`
pub fn render_table(data: &Value) -> String {
    let with_headings = data
        .get("withHeadings")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let rows = data
        .get("content")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut html = String::from("<table>");
    for (i, row) in rows.iter().enumerate() {
        let cell_tag = if with_headings && i == 0 { "th" } else { "td" };
        html.push_str("<tr>");
        for cell in row.as_array().map(Vec::as_slice).unwrap_or_default() {
            let text = sanitize_text(cell.as_str().unwrap_or(""));
            html.push_str(&format!("<{cell_tag}>{text}</{cell_tag}>"));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

/// `{ "text": "...", "caption": "..." }`
pub fn render_quote(data: &Value) -> String {
    let clean_text = sanitize_text(str_field(data, "text"));
    let clean_caption = sanitize_text(str_field(data, "caption"));
    if clean_caption.is_empty() {
        format!("<blockquote><p>{clean_text}</p></blockquote>")
    } else {
        format!("<blockquote><p>{clean_text}</p><cite>{clean_caption}</cite></blockquote>")
    }
}

/// `{ "items": [{ "text": "...", "checked": true }] }`
pub fn render_checklist(data: &Value) -> String {
    let items = data
        .get("items")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut html = String::from("<ul class=\"checklist\">");
    for item in items {
        let checked = item
            .get("checked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let marker = if checked { " checked" } else { "" };
        html.push_str(&format!(
            "<li><input type=\"checkbox\" disabled{marker}> {}</li>",
            sanitize_text(str_field(item, "text"))
        ));
    }
    html.push_str("</ul>");
    html
}

/// `{ "link": "...", "meta": { "title": "...", "description": "..." } }`
pub fn render_link(data: &Value) -> String {
    let link = str_field(data, "link");
    let meta = data.get("meta").cloned().unwrap_or(Value::Null);
    let title = meta
        .get("title")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or(link);

    if !is_safe_url(link) {
        return format!("<span>{}</span>", html_escape(title));
    }

    let mut html = format!(
        "<a class=\"link-preview\" href=\"{}\">{}</a>",
        html_escape(link),
        html_escape(title)
    );
    if let Some(description) = meta.get("description").and_then(|v| v.as_str())
        && !description.is_empty()
    {
        html.push_str(&format!(
            "<p class=\"link-description\">{}</p>",
            html_escape(description)
        ));
    }
    html
}

/// `{ "code": "...", "language": "rust" }`
///
/// Uses the "InspiredGitHub" theme with a fallback to "base16-ocean.dark".
/// Unknown or missing languages render as escaped plain text.
pub fn render_code(data: &Value) -> String {
    let code = str_field(data, "code");
    let lang = str_field(data, "language").trim();

    if lang.is_empty() {
        return plain_code(code);
    }

    let ss = &*SYNTAX_SET;
    let ts = &*THEME_SET;

    let syntax = ss
        .find_syntax_by_token(lang)
        .or_else(|| ss.find_syntax_by_name(lang));
    let Some(syntax) = syntax else {
        return plain_code(code);
    };

    let Some(theme) = ts
        .themes
        .get("InspiredGitHub")
        .or_else(|| ts.themes.get("base16-ocean.dark"))
    else {
        return plain_code(code);
    };

    match syntect::html::highlighted_html_for_string(code, ss, syntax, theme) {
        Ok(highlighted) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            html_escape(lang),
            highlighted
        ),
        Err(_) => plain_code(code),
    }
}

fn plain_code(code: &str) -> String {
    format!("<pre><code>{}</code></pre>", html_escape(code))
}

/// `{ "service": "...", "source": "...", "embed": "...", "caption": "..." }`
///
/// Whitelisted sources render as responsive iframes; other http(s) URLs as
/// anchors; anything else as escaped text.
pub fn render_embed(data: &Value) -> String {
    let embed_url = data
        .get("embed")
        .and_then(|v| v.as_str())
        .or_else(|| data.get("source").and_then(|v| v.as_str()))
        .unwrap_or("");

    if embed_url.is_empty() {
        return String::new();
    }

    let caption = str_field(data, "caption");
    let escaped_url = html_escape(embed_url);

    if is_whitelisted_embed(embed_url) {
        let mut html = format!(
            "<div class=\"embed-responsive\">\
             <iframe src=\"{escaped_url}\" frameborder=\"0\" allowfullscreen></iframe>\
             </div>"
        );
        if !caption.is_empty() {
            html.push_str(&format!(
                "<p class=\"embed-caption\">{}</p>",
                html_escape(caption)
            ));
        }
        html
    } else if is_safe_url(embed_url) {
        format!("<a href=\"{escaped_url}\">{escaped_url}</a>")
    } else {
        format!("<span>{escaped_url}</span>")
    }
}

const EMBED_WHITELIST: &[&str] = &[
    "youtube.com/watch",
    "youtube.com/embed/",
    "youtu.be/",
    "vimeo.com/",
    "player.vimeo.com/",
    "twitter.com/",
    "codepen.io/",
];

fn is_whitelisted_embed(url: &str) -> bool {
    let normalised = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");

    EMBED_WHITELIST
        .iter()
        .any(|pattern| normalised.starts_with(pattern))
}
