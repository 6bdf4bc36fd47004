//! Span-preserving HTML fragment parser
//!
//! Parses a block's embedded markup into an element tree while keeping the
//! original source string. Inner and outer markup are byte-range slices of
//! that source, so comments, entity spellings and whitespace survive
//! exactly as stored.
//!
//! The parser is deliberately forgiving: stray closing tags are ignored,
//! unclosed elements are closed at end of input, and anything that is not
//! a well-formed tag is treated as text. Stored block markup is
//! machine-written and small, so no attempt is made at full spec-grade
//! error recovery.

use crate::markup::selector::Selector;

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text up to the matching closing tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, Option<String>)>,
        children: Vec<usize>,
        inner_start: usize,
        inner_end: usize,
        outer_start: usize,
        outer_end: usize,
    },
    Text {
        start: usize,
        end: usize,
    },
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<usize>,
    kind: NodeKind,
}

/// A parsed HTML fragment plus its original source.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    nodes: Vec<Node>,
    roots: Vec<usize>,
}

/// Reference to one node of a [`Document`].
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    document: &'a Document,
    index: usize,
}

impl Document {
    /// Parse an HTML fragment.
    pub fn parse(source: &str) -> Self {
        Parser::new(source).run()
    }

    /// Original source of the whole fragment.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Top-level element nodes, in document order.
    pub fn root_elements(&self) -> Vec<NodeRef<'_>> {
        self.roots
            .iter()
            .copied()
            .filter(|&index| matches!(self.nodes[index].kind, NodeKind::Element { .. }))
            .map(|index| NodeRef { document: self, index })
            .collect()
    }

    /// First top-level element, used as the extraction context when a rule
    /// has no selector.
    pub fn first_element(&self) -> Option<NodeRef<'_>> {
        self.root_elements().into_iter().next()
    }

    /// All elements matching the selector, in document order.
    pub fn select<'a>(&'a self, selector: &Selector) -> Vec<NodeRef<'a>> {
        self.elements()
            .filter(|node| selector.matches(*node))
            .collect()
    }

    /// First element matching the selector.
    pub fn select_first<'a>(&'a self, selector: &Selector) -> Option<NodeRef<'a>> {
        self.elements().find(|node| selector.matches(*node))
    }

    /// Plain text of the whole fragment, entities decoded.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for &root in &self.roots {
            collect_text(self, root, &mut text);
        }
        text
    }

    fn elements(&self) -> impl Iterator<Item = NodeRef<'_>> {
        // Nodes are created in source order, so a linear scan yields
        // document order.
        (0..self.nodes.len())
            .filter(|&index| matches!(self.nodes[index].kind, NodeKind::Element { .. }))
            .map(|index| NodeRef { document: self, index })
    }
}

impl<'a> NodeRef<'a> {
    /// Lowercase tag name.
    pub fn tag(&self) -> &'a str {
        match &self.document.nodes[self.index].kind {
            NodeKind::Element { tag, .. } => tag,
            NodeKind::Text { .. } => "",
        }
    }

    /// Value of the named attribute, if present. Valueless attributes
    /// yield an empty string.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        match &self.document.nodes[self.index].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(attr_name, _)| attr_name.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_deref().unwrap_or("")),
            NodeKind::Text { .. } => None,
        }
    }

    /// Inner markup, exactly as it appears in the source.
    pub fn inner_html(&self) -> &'a str {
        match &self.document.nodes[self.index].kind {
            NodeKind::Element { inner_start, inner_end, .. } => {
                &self.document.source[*inner_start..*inner_end]
            }
            NodeKind::Text { start, end } => &self.document.source[*start..*end],
        }
    }

    /// Outer markup including the element's own tags.
    pub fn outer_html(&self) -> &'a str {
        match &self.document.nodes[self.index].kind {
            NodeKind::Element { outer_start, outer_end, .. } => {
                &self.document.source[*outer_start..*outer_end]
            }
            NodeKind::Text { start, end } => &self.document.source[*start..*end],
        }
    }

    /// Recursive text content, entities decoded.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        collect_text(self.document, self.index, &mut text);
        text
    }

    /// Direct child elements, in document order.
    pub fn child_elements(&self) -> Vec<NodeRef<'a>> {
        match &self.document.nodes[self.index].kind {
            NodeKind::Element { children, .. } => children
                .iter()
                .copied()
                .filter(|&child| {
                    matches!(self.document.nodes[child].kind, NodeKind::Element { .. })
                })
                .map(|child| NodeRef { document: self.document, index: child })
                .collect(),
            NodeKind::Text { .. } => Vec::new(),
        }
    }

    /// Parent element, if any.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.document.nodes[self.index]
            .parent
            .map(|parent| NodeRef { document: self.document, index: parent })
    }

    /// Elements under this node matching the selector, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<NodeRef<'a>> {
        self.document
            .select(selector)
            .into_iter()
            .filter(|node| node.has_ancestor(*self))
            .collect()
    }

    /// First element under this node matching the selector.
    pub fn select_first(&self, selector: &Selector) -> Option<NodeRef<'a>> {
        self.select(selector).into_iter().next()
    }

    fn has_ancestor(&self, other: NodeRef<'a>) -> bool {
        let mut current = self.parent();
        while let Some(ancestor) = current {
            if ancestor.index == other.index {
                return true;
            }
            current = ancestor.parent();
        }
        false
    }

    pub(crate) fn is_element(&self) -> bool {
        matches!(self.document.nodes[self.index].kind, NodeKind::Element { .. })
    }

    pub(crate) fn classes(&self) -> impl Iterator<Item = &'a str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }
}

fn collect_text(document: &Document, index: usize, out: &mut String) {
    match &document.nodes[index].kind {
        NodeKind::Text { start, end } => {
            out.push_str(&html_escape::decode_html_entities(
                &document.source[*start..*end],
            ));
        }
        NodeKind::Element { children, .. } => {
            for &child in children {
                collect_text(document, child, out);
            }
        }
    }
}

struct Parser<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    text_start: usize,
    nodes: Vec<Node>,
    roots: Vec<usize>,
    open: Vec<usize>,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            text_start: 0,
            nodes: Vec::new(),
            roots: Vec::new(),
            open: Vec::new(),
        }
    }

    fn run(mut self) -> Document {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] != b'<' {
                self.pos += 1;
                continue;
            }

            let rest = &self.source[self.pos..];
            if rest.starts_with("<!--") {
                self.flush_text(self.pos);
                self.skip_until(self.pos + 4, "-->");
                self.text_start = self.pos;
            } else if rest.starts_with("</") {
                self.flush_text(self.pos);
                self.handle_close_tag();
                self.text_start = self.pos;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.flush_text(self.pos);
                self.skip_until(self.pos + 2, ">");
                self.text_start = self.pos;
            } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.flush_text(self.pos);
                self.handle_open_tag();
                self.text_start = self.pos;
            } else {
                // Literal '<' in text.
                self.pos += 1;
            }
        }

        self.flush_text(self.bytes.len());

        // Close anything left open at end of input.
        while let Some(index) = self.open.pop() {
            self.close_element(index, self.bytes.len(), self.bytes.len());
        }

        Document {
            source: self.source.to_string(),
            nodes: self.nodes,
            roots: self.roots,
        }
    }

    fn flush_text(&mut self, end: usize) {
        if self.text_start < end {
            let node = Node {
                parent: self.open.last().copied(),
                kind: NodeKind::Text { start: self.text_start, end },
            };
            self.push_node(node);
        }
    }

    fn push_node(&mut self, node: Node) -> usize {
        let index = self.nodes.len();
        match node.parent {
            Some(parent) => {
                if let NodeKind::Element { children, .. } = &mut self.nodes[parent].kind {
                    children.push(index);
                }
            }
            None => self.roots.push(index),
        }
        self.nodes.push(node);
        index
    }

    /// Advance past the first occurrence of `needle`, or to end of input.
    fn skip_until(&mut self, from: usize, needle: &str) {
        match self.source[from..].find(needle) {
            Some(offset) => self.pos = from + offset + needle.len(),
            None => self.pos = self.bytes.len(),
        }
    }

    fn handle_open_tag(&mut self) {
        let outer_start = self.pos;
        self.pos += 1;
        let tag = self.read_tag_name();
        let attrs = self.read_attributes();

        let mut self_closing = false;
        if self.source[self.pos..].starts_with("/>") {
            self_closing = true;
            self.pos += 2;
        } else if self.pos < self.bytes.len() && self.bytes[self.pos] == b'>' {
            self.pos += 1;
        }

        let content_start = self.pos;
        let is_void = VOID_ELEMENTS.contains(&tag.as_str());

        let node = Node {
            parent: self.open.last().copied(),
            kind: NodeKind::Element {
                tag: tag.clone(),
                attrs,
                children: Vec::new(),
                inner_start: content_start,
                inner_end: content_start,
                outer_start,
                outer_end: self.pos,
            },
        };
        let index = self.push_node(node);

        if self_closing || is_void {
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            self.consume_raw_text(index, &tag, content_start);
            return;
        }

        self.open.push(index);
    }

    /// Raw-text content runs to the matching close tag with no nested
    /// parsing.
    fn consume_raw_text(&mut self, index: usize, tag: &str, content_start: usize) {
        let closer = format!("</{}", tag);
        let lower = self.source[content_start..].to_ascii_lowercase();
        match lower.find(&closer) {
            Some(offset) => {
                let content_end = content_start + offset;
                if content_end > content_start {
                    let text = Node {
                        parent: Some(index),
                        kind: NodeKind::Text { start: content_start, end: content_end },
                    };
                    self.push_node(text);
                }
                self.pos = content_end;
                self.skip_until(self.pos, ">");
                self.close_element(index, content_end, self.pos);
            }
            None => {
                self.pos = self.bytes.len();
                self.close_element(index, self.pos, self.pos);
            }
        }
    }

    fn handle_close_tag(&mut self) {
        let close_start = self.pos;
        self.pos += 2;
        let tag = self.read_tag_name();
        self.skip_until(self.pos, ">");
        let close_end = self.pos;

        // Find the nearest matching open element; stray closers are
        // ignored.
        let matched = self
            .open
            .iter()
            .rposition(|&index| self.element_tag(index) == tag);

        if let Some(position) = matched {
            // Elements left open above the match close implicitly at the
            // start of this closing tag.
            while self.open.len() > position + 1 {
                let index = self.open.pop().unwrap();
                self.close_element(index, close_start, close_start);
            }
            let index = self.open.pop().unwrap();
            self.close_element(index, close_start, close_end);
        }
    }

    fn close_element(&mut self, index: usize, inner_end_at: usize, outer_end_at: usize) {
        if let NodeKind::Element { inner_end, outer_end, .. } = &mut self.nodes[index].kind {
            *inner_end = inner_end_at;
            *outer_end = outer_end_at;
        }
    }

    fn element_tag(&self, index: usize) -> &str {
        match &self.nodes[index].kind {
            NodeKind::Element { tag, .. } => tag,
            NodeKind::Text { .. } => "",
        }
    }

    fn read_tag_name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_ascii_lowercase()
    }

    fn read_attributes(&mut self) -> Vec<(String, Option<String>)> {
        let mut attrs = Vec::new();

        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            if self.pos >= self.bytes.len() {
                break;
            }
            let byte = self.bytes[self.pos];
            if byte == b'>' || self.source[self.pos..].starts_with("/>") {
                break;
            }
            if byte == b'/' {
                self.pos += 1;
                continue;
            }

            let name_start = self.pos;
            while self.pos < self.bytes.len() {
                let byte = self.bytes[self.pos];
                if byte.is_ascii_whitespace() || byte == b'=' || byte == b'>' || byte == b'/' {
                    break;
                }
                self.pos += 1;
            }
            let name = self.source[name_start..self.pos].to_ascii_lowercase();
            if name.is_empty() {
                self.pos += 1;
                continue;
            }

            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            if self.pos < self.bytes.len() && self.bytes[self.pos] == b'=' {
                self.pos += 1;
                while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                    self.pos += 1;
                }
                let value = self.read_attribute_value();
                attrs.push((name, Some(value)));
            } else {
                attrs.push((name, None));
            }
        }

        attrs
    }

    fn read_attribute_value(&mut self) -> String {
        if self.pos >= self.bytes.len() {
            return String::new();
        }

        let quote = self.bytes[self.pos];
        if quote == b'"' || quote == b'\'' {
            self.pos += 1;
            let start = self.pos;
            while self.pos < self.bytes.len() && self.bytes[self.pos] != quote {
                self.pos += 1;
            }
            let raw = &self.source[start..self.pos];
            if self.pos < self.bytes.len() {
                self.pos += 1;
            }
            html_escape::decode_html_entities(raw).into_owned()
        } else {
            let start = self.pos;
            while self.pos < self.bytes.len() {
                let byte = self.bytes[self.pos];
                if byte.is_ascii_whitespace() || byte == b'>' {
                    break;
                }
                self.pos += 1;
            }
            html_escape::decode_html_entities(&self.source[start..self.pos]).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_html_is_a_source_slice() {
        let document = Document::parse("<figure><img src=\"a.png\"/><figcaption>Hi &amp; bye</figcaption></figure>");
        let figure = document.first_element().unwrap();
        assert_eq!(figure.tag(), "figure");
        assert_eq!(
            figure.inner_html(),
            "<img src=\"a.png\"/><figcaption>Hi &amp; bye</figcaption>"
        );
    }

    #[test]
    fn plain_text_decodes_entities() {
        let document = Document::parse("<p>Hi &amp; <em>bye</em></p>");
        assert_eq!(document.plain_text(), "Hi & bye");
    }

    #[test]
    fn attributes_parse_quoted_and_bare() {
        let document = Document::parse("<img src='a.png' width=10 hidden>");
        let img = document.first_element().unwrap();
        assert_eq!(img.attr("src"), Some("a.png"));
        assert_eq!(img.attr("width"), Some("10"));
        assert_eq!(img.attr("hidden"), Some(""));
        assert_eq!(img.attr("missing"), None);
    }

    #[test]
    fn unclosed_elements_close_at_end_of_input() {
        let document = Document::parse("<div><p>open");
        let div = document.first_element().unwrap();
        assert_eq!(div.inner_html(), "<p>open");
        assert_eq!(div.child_elements()[0].inner_html(), "open");
    }

    #[test]
    fn comments_survive_in_inner_html_without_becoming_nodes() {
        let document = Document::parse("<div><!-- note --><span>x</span></div>");
        let div = document.first_element().unwrap();
        assert_eq!(div.inner_html(), "<!-- note --><span>x</span>");
        assert_eq!(div.child_elements().len(), 1);
    }

    #[test]
    fn void_and_raw_text_elements() {
        let document = Document::parse("<br><script>if (a < b) {}</script><p>after</p>");
        let roots = document.root_elements();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[1].inner_html(), "if (a < b) {}");
        assert_eq!(roots[2].plain_text(), "after");
    }
}
