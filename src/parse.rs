//! Comment-delimited markup parsing
//!
//! Stored content is HTML annotated with comment delimiters:
//!
//! ```text
//! <!-- wp:demo/box {"color":"blue"} -->
//! <div class="box">...</div>
//! <!-- /wp:demo/box -->
//! ```
//!
//! Self-closing blocks use `<!-- wp:name {...} /-->`, names without a
//! namespace default to `core/`, and text between blocks becomes unnamed
//! freeform nodes. Each parsed node keeps the literal/placeholder fragment
//! sequence (`inner_content`) the extractor needs to rebuild serialized
//! markup around materialized inner blocks.
//!
//! The extraction engine consumes this through the [`MarkupParser`] trait,
//! so hosts with their own parsing pipeline can inject it;
//! [`DelimiterParser`] is the bundled implementation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One node of a generic parsed block tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedBlock {
    /// Block type name, or `None` for freeform markup between blocks.
    pub block_name: Option<String>,
    /// Stored attribute record from the opening delimiter.
    #[serde(default)]
    pub attrs: Map<String, Value>,
    /// Nested blocks, in source order.
    #[serde(default)]
    pub inner_blocks: Vec<ParsedBlock>,
    /// Literal markup of this block, excluding inner blocks' markup.
    #[serde(rename = "innerHTML")]
    pub inner_html: String,
    /// Fragment sequence: `Some(literal)` for literal markup, `None` as a
    /// placeholder for the next inner block in order.
    #[serde(default)]
    pub inner_content: Vec<Option<String>>,
}

impl ParsedBlock {
    fn named(name: String, attrs: Map<String, Value>) -> Self {
        Self {
            block_name: Some(name),
            attrs,
            inner_blocks: Vec::new(),
            inner_html: String::new(),
            inner_content: Vec::new(),
        }
    }

    fn freeform(text: &str) -> Self {
        Self {
            block_name: None,
            attrs: Map::new(),
            inner_blocks: Vec::new(),
            inner_html: text.to_string(),
            inner_content: vec![Some(text.to_string())],
        }
    }
}

/// Markup-to-tree parser boundary.
pub trait MarkupParser: Send + Sync {
    fn parse(&self, markup: &str) -> anyhow::Result<Vec<ParsedBlock>>;
}

/// Bundled comment-delimiter parser. Total: any input yields a tree, with
/// malformed delimiters degrading to freeform text.
pub struct DelimiterParser {
    opener: Regex,
}

impl DelimiterParser {
    pub fn new() -> Self {
        // Finds delimiter candidates; the JSON payload and comment tail
        // are scanned by hand since brace matching is not regular.
        let opener = Regex::new(r"<!--\s+(/)?wp:([a-z][a-z0-9_-]*/)?([a-z][a-z0-9_-]*)")
            .expect("static delimiter pattern");
        Self { opener }
    }
}

impl Default for DelimiterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupParser for DelimiterParser {
    fn parse(&self, markup: &str) -> anyhow::Result<Vec<ParsedBlock>> {
        Ok(self.parse_tree(markup))
    }
}

#[derive(Debug)]
struct Token {
    closer: bool,
    void: bool,
    name: String,
    attrs: Map<String, Value>,
    start: usize,
    end: usize,
}

struct Frame {
    block: ParsedBlock,
}

impl DelimiterParser {
    fn parse_tree(&self, markup: &str) -> Vec<ParsedBlock> {
        let mut output: Vec<ParsedBlock> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut last_end = 0;

        let mut scan_from = 0;
        while let Some(token) = self.next_token(markup, scan_from) {
            scan_from = token.end;

            let text = &markup[last_end..token.start];
            last_end = token.end;

            if token.closer {
                push_text(&mut output, &mut stack, text);
                match stack.pop() {
                    Some(frame) => {
                        // A mismatched closer still closes the innermost
                        // open block; machine-written markup does not nest
                        // incorrectly in practice.
                        push_block(&mut output, &mut stack, frame.block);
                    }
                    None => {
                        // Stray closer with nothing open: keep its text.
                        push_text(&mut output, &mut stack, &markup[token.start..token.end]);
                    }
                }
            } else if token.void {
                push_text(&mut output, &mut stack, text);
                push_block(
                    &mut output,
                    &mut stack,
                    ParsedBlock::named(token.name, token.attrs),
                );
            } else {
                push_text(&mut output, &mut stack, text);
                stack.push(Frame {
                    block: ParsedBlock::named(token.name, token.attrs),
                });
            }
        }

        push_text(&mut output, &mut stack, &markup[last_end..]);

        // Unterminated blocks close at end of input.
        while let Some(frame) = stack.pop() {
            push_block(&mut output, &mut stack, frame.block);
        }

        output
    }

    fn next_token(&self, markup: &str, from: usize) -> Option<Token> {
        let mut search = from;
        while let Some(captures) = self.opener.captures(&markup[search..]) {
            let whole = captures.get(0).expect("regex match");
            let start = search + whole.start();
            let mut pos = search + whole.end();

            let closer = captures.get(1).is_some();
            let namespace = captures.get(2).map(|m| m.as_str()).unwrap_or("core/");
            let name = format!("{}{}", namespace, captures.get(3).expect("name group").as_str());

            pos += leading_whitespace(&markup[pos..]);

            let mut attrs = Map::new();
            if !closer && markup[pos..].starts_with('{') {
                match json_object_end(&markup[pos..]) {
                    Some(length) => {
                        attrs = serde_json::from_str(&markup[pos..pos + length])
                            .unwrap_or_default();
                        pos += length;
                        pos += leading_whitespace(&markup[pos..]);
                    }
                    None => {
                        // Unterminated payload: not a delimiter.
                        search = start + 1;
                        continue;
                    }
                }
            }

            let mut void = false;
            if !closer && markup[pos..].starts_with('/') {
                void = true;
                pos += 1;
            }

            if markup[pos..].starts_with("-->") {
                return Some(Token {
                    closer,
                    void,
                    name,
                    attrs,
                    start,
                    end: pos + 3,
                });
            }

            // Comment that merely resembles a delimiter: scan past it.
            search = start + 1;
        }
        None
    }
}

fn push_text(output: &mut Vec<ParsedBlock>, stack: &mut [Frame], text: &str) {
    if text.is_empty() {
        return;
    }
    match stack.last_mut() {
        Some(frame) => {
            frame.block.inner_html.push_str(text);
            frame.block.inner_content.push(Some(text.to_string()));
        }
        // Top-level text becomes a freeform node, whitespace included;
        // the extractor decides what to drop.
        None => output.push(ParsedBlock::freeform(text)),
    }
}

fn push_block(output: &mut Vec<ParsedBlock>, stack: &mut [Frame], block: ParsedBlock) {
    match stack.last_mut() {
        Some(frame) => {
            frame.block.inner_blocks.push(block);
            frame.block.inner_content.push(None);
        }
        None => output.push(block),
    }
}

fn leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

/// Length of the JSON object starting at the beginning of `s`, or `None`
/// if its braces never balance.
fn json_object_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, byte) in s.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index + 1);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(markup: &str) -> Vec<ParsedBlock> {
        DelimiterParser::new().parse(markup).unwrap()
    }

    #[test]
    fn parses_simple_block() {
        let blocks = parse(
            "<!-- wp:demo/box {\"color\":\"blue\"} -->\n<div>hi</div>\n<!-- /wp:demo/box -->",
        );

        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.block_name.as_deref(), Some("demo/box"));
        assert_eq!(block.attrs["color"], json!("blue"));
        assert_eq!(block.inner_html, "\n<div>hi</div>\n");
        assert_eq!(block.inner_content, vec![Some("\n<div>hi</div>\n".to_string())]);
    }

    #[test]
    fn defaults_namespace_to_core() {
        let blocks = parse("<!-- wp:paragraph -->\n<p>x</p>\n<!-- /wp:paragraph -->");
        assert_eq!(blocks[0].block_name.as_deref(), Some("core/paragraph"));
    }

    #[test]
    fn parses_void_block() {
        let blocks = parse("<!-- wp:demo/spacer {\"height\":40} /-->");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_name.as_deref(), Some("demo/spacer"));
        assert_eq!(blocks[0].attrs["height"], json!(40));
        assert!(blocks[0].inner_html.is_empty());
        assert!(blocks[0].inner_content.is_empty());
    }

    #[test]
    fn nests_inner_blocks_with_placeholders() {
        let blocks = parse(
            "<!-- wp:demo/group -->\n<div class=\"group\">\
             <!-- wp:paragraph --><p>a</p><!-- /wp:paragraph -->\
             <!-- wp:paragraph --><p>b</p><!-- /wp:paragraph -->\
             </div>\n<!-- /wp:demo/group -->",
        );

        assert_eq!(blocks.len(), 1);
        let group = &blocks[0];
        assert_eq!(group.inner_blocks.len(), 2);
        assert_eq!(group.inner_html, "\n<div class=\"group\"></div>\n");
        assert_eq!(
            group.inner_content,
            vec![
                Some("\n<div class=\"group\">".to_string()),
                None,
                None,
                Some("</div>\n".to_string()),
            ]
        );
    }

    #[test]
    fn text_between_blocks_is_freeform() {
        let blocks = parse(
            "<p>before</p><!-- wp:demo/spacer /-->\n\n<!-- wp:demo/spacer /-->",
        );

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].block_name, None);
        assert_eq!(blocks[0].inner_html, "<p>before</p>");
        assert_eq!(blocks[2].block_name, None);
        assert_eq!(blocks[2].inner_html, "\n\n");
    }

    #[test]
    fn attrs_with_nested_braces_and_strings() {
        let blocks = parse(
            "<!-- wp:demo/box {\"style\":{\"color\":{\"text\":\"#111\"}},\"label\":\"a } b\"} /-->",
        );
        assert_eq!(blocks[0].attrs["style"]["color"]["text"], json!("#111"));
        assert_eq!(blocks[0].attrs["label"], json!("a } b"));
    }

    #[test]
    fn malformed_delimiter_degrades_to_text() {
        let blocks = parse("<!-- wp:demo/box {\"broken\": -->text");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_name, None);
    }

    #[test]
    fn unterminated_block_closes_at_end_of_input() {
        let blocks = parse("<!-- wp:demo/box --><div>tail</div>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_name.as_deref(), Some("demo/box"));
        assert_eq!(blocks[0].inner_html, "<div>tail</div>");
    }

    #[test]
    fn plain_html_is_one_freeform_node() {
        let blocks = parse("<p>just html</p>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_name, None);
        assert_eq!(blocks[0].inner_content, vec![Some("<p>just html</p>".to_string())]);
    }
}
