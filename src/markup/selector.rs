//! CSS selector subset for extraction rules
//!
//! Block-type extraction rules use a small slice of CSS: tag names, ids,
//! classes, attribute tests, compound selectors, descendant and child
//! combinators, and comma-separated alternatives. That covers the
//! selectors block catalogues use in practice (`img`, `figure > img`,
//! `.wp-block-audio audio`, `blockquote > p`, ...).

use crate::markup::dom::NodeRef;

/// Selector parse error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("invalid selector {selector:?} at {at:?}")]
    Invalid { selector: String, at: String },
}

#[derive(Debug, Clone, PartialEq)]
struct AttrTest {
    name: String,
    value: Option<String>,
}

/// One simple selector group, e.g. `img.large#main[src]`.
#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, node: NodeRef<'_>) -> bool {
        if !node.is_element() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if tag != "*" && node.tag() != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        for class in &self.classes {
            if !node.classes().any(|candidate| candidate == class) {
                return false;
            }
        }
        for attr in &self.attrs {
            match (node.attr(&attr.name), &attr.value) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != expected => return false,
                _ => {}
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// A combinator chain, matched right to left.
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    /// Leftmost first; every part after the first carries the combinator
    /// linking it to the part before it.
    parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, node: NodeRef<'_>) -> bool {
        let (last_combinator, last) = match self.parts.last() {
            Some(part) => part,
            None => return false,
        };
        debug_assert!(*last_combinator == Combinator::Descendant || self.parts.len() > 1);

        if !last.matches(node) {
            return false;
        }

        self.matches_ancestors(node, self.parts.len() - 1)
    }

    /// Check the chain to the left of `part_index` against the ancestors
    /// of `node`.
    fn matches_ancestors(&self, node: NodeRef<'_>, part_index: usize) -> bool {
        if part_index == 0 {
            return true;
        }

        let (combinator, _) = self.parts[part_index];
        let (_, previous) = &self.parts[part_index - 1];

        match combinator {
            Combinator::Child => match node.parent() {
                Some(parent) => {
                    previous.matches(parent) && self.matches_ancestors(parent, part_index - 1)
                }
                None => false,
            },
            Combinator::Descendant => {
                let mut ancestor = node.parent();
                while let Some(candidate) = ancestor {
                    if previous.matches(candidate)
                        && self.matches_ancestors(candidate, part_index - 1)
                    {
                        return true;
                    }
                    ancestor = candidate.parent();
                }
                false
            }
        }
    }
}

/// A parsed selector: one or more comma-separated alternatives.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

impl Selector {
    /// Parse a selector string.
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let mut alternatives = Vec::new();
        for alternative in selector.split(',') {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(SelectorError::Empty);
            }
            alternatives.push(parse_complex(selector, alternative)?);
        }
        if alternatives.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Self { alternatives })
    }

    /// Whether the node matches any alternative.
    pub fn matches(&self, node: NodeRef<'_>) -> bool {
        self.alternatives
            .iter()
            .any(|alternative| alternative.matches(node))
    }
}

fn parse_complex(full: &str, part: &str) -> Result<Complex, SelectorError> {
    let mut parts = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut pending_explicit = false;

    for token in part.split_whitespace() {
        if token == ">" {
            if parts.is_empty() || pending_explicit {
                return Err(invalid(full, token));
            }
            pending = Combinator::Child;
            pending_explicit = true;
            continue;
        }

        // `a>b` without spaces.
        for (index, piece) in token.split('>').enumerate() {
            if index > 0 {
                if parts.is_empty() {
                    return Err(invalid(full, token));
                }
                pending = Combinator::Child;
            }
            if piece.is_empty() {
                // `a >` / `> b` spacing handled by the surrounding loop.
                pending_explicit = index > 0;
                continue;
            }
            let compound = parse_compound(full, piece)?;
            parts.push((pending, compound));
            pending = Combinator::Descendant;
            pending_explicit = false;
        }
    }

    if parts.is_empty() || pending_explicit {
        return Err(invalid(full, part));
    }

    Ok(Complex { parts })
}

fn parse_compound(full: &str, piece: &str) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    let bytes = piece.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'#' => {
                let (name, next) = read_name(piece, pos + 1);
                if name.is_empty() {
                    return Err(invalid(full, piece));
                }
                compound.id = Some(name);
                pos = next;
            }
            b'.' => {
                let (name, next) = read_name(piece, pos + 1);
                if name.is_empty() {
                    return Err(invalid(full, piece));
                }
                compound.classes.push(name);
                pos = next;
            }
            b'[' => {
                let close = piece[pos..]
                    .find(']')
                    .ok_or_else(|| invalid(full, piece))?;
                let body = &piece[pos + 1..pos + close];
                let test = match body.split_once('=') {
                    Some((name, value)) => AttrTest {
                        name: name.trim().to_ascii_lowercase(),
                        value: Some(value.trim().trim_matches(['"', '\'']).to_string()),
                    },
                    None => AttrTest {
                        name: body.trim().to_ascii_lowercase(),
                        value: None,
                    },
                };
                if test.name.is_empty() {
                    return Err(invalid(full, piece));
                }
                compound.attrs.push(test);
                pos += close + 1;
            }
            b'*' => {
                compound.tag = Some("*".to_string());
                pos += 1;
            }
            byte if byte.is_ascii_alphabetic() => {
                if compound.tag.is_some() || pos != 0 {
                    return Err(invalid(full, piece));
                }
                let (name, next) = read_name(piece, pos);
                compound.tag = Some(name);
                pos = next;
            }
            _ => return Err(invalid(full, piece)),
        }
    }

    if compound.is_empty() {
        return Err(invalid(full, piece));
    }
    Ok(compound)
}

fn read_name(piece: &str, from: usize) -> (String, usize) {
    let bytes = piece.as_bytes();
    let mut end = from;
    while end < bytes.len() {
        let byte = bytes[end];
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || byte == b':' {
            end += 1;
        } else {
            break;
        }
    }
    (piece[from..end].to_ascii_lowercase(), end)
}

fn invalid(selector: &str, at: &str) -> SelectorError {
    SelectorError::Invalid {
        selector: selector.to_string(),
        at: at.to_string(),
    }
}
