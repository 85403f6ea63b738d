//! HTML to markdown conversion for reference content.
//!
//! Reference records embed a small HTML subset (paragraphs, lists, emphasis,
//! links, headings). Anything else is stripped to its text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

struct Rules {
    whitespace: Regex,
    line_break: Regex,
    heading_open: Regex,
    heading_close: Regex,
    paragraph: Regex,
    list_item: Regex,
    list_item_close: Regex,
    list: Regex,
    strong: Regex,
    emphasis: Regex,
    link: Regex,
    any_tag: Regex,
    numeric_entity: Regex,
    blank_lines: Regex,
}

static RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    whitespace: Regex::new(r"\s+").unwrap(),
    line_break: Regex::new(r"(?i)<br\s*/?>").unwrap(),
    heading_open: Regex::new(r"(?i)<h([1-6])(?:\s[^>]*)?>").unwrap(),
    heading_close: Regex::new(r"(?i)</h[1-6]\s*>").unwrap(),
    paragraph: Regex::new(r"(?i)</?(?:p|div|section)(?:\s[^>]*)?>").unwrap(),
    list_item: Regex::new(r"(?i)<li(?:\s[^>]*)?>").unwrap(),
    list_item_close: Regex::new(r"(?i)</li\s*>").unwrap(),
    list: Regex::new(r"(?i)</?(?:ul|ol)(?:\s[^>]*)?>").unwrap(),
    strong: Regex::new(r"(?i)</?(?:strong|b)(?:\s[^>]*)?>").unwrap(),
    emphasis: Regex::new(r"(?i)</?(?:em|i)(?:\s[^>]*)?>").unwrap(),
    link: Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*"([^"]*)"[^>]*>(.*?)</a\s*>"#).unwrap(),
    any_tag: Regex::new(r"<[^>]+>").unwrap(),
    numeric_entity: Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap(),
    blank_lines: Regex::new(r"\n{3,}").unwrap(),
});

/// Convert an HTML fragment to markdown-flavoured plain text.
pub fn html_to_markdown(html: &str) -> String {
    let rules = &*RULES;

    let text = rules.whitespace.replace_all(html, " ");
    let text = rules.line_break.replace_all(&text, "\n");
    let text = rules.heading_open.replace_all(&text, |caps: &Captures| {
        let level = caps[1].parse::<usize>().unwrap_or(1);
        format!("\n\n{} ", "#".repeat(level))
    });
    let text = rules.heading_close.replace_all(&text, "\n\n");
    let text = rules.paragraph.replace_all(&text, "\n\n");
    let text = rules.list_item.replace_all(&text, "\n- ");
    let text = rules.list_item_close.replace_all(&text, "");
    let text = rules.list.replace_all(&text, "\n");
    let text = rules.strong.replace_all(&text, "**");
    let text = rules.emphasis.replace_all(&text, "*");
    let text = rules.link.replace_all(&text, "[$2]($1)");
    let text = rules.any_tag.replace_all(&text, "");
    let text = decode_entities(&text);

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    rules
        .blank_lines
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    let decoded = RULES
        .numeric_entity
        .replace_all(text, |caps: &Captures| {
            let raw = &caps[1];
            let code = match raw.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => raw.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();

    // &amp; last so "&amp;lt;" stays literal
    decoded
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
