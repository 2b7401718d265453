//! Block locators: re-derivable structural paths to a block element.
//!
//! A locator is stored as a CSS-like selector string so bundles written by
//! earlier versions of the annotator (which stored `document.querySelector`
//! selectors such as `.md-content p:nth-of-type(3) > li`) keep resolving.
//!
//! - `#intro` - element with `id="intro"` (CSS-escaped)
//! - `div:nth-of-type(2) > p:nth-of-type(4)` - path from the content root,
//!   one segment per level, `:nth-of-type(1)` omitted

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::dom::{DomTree, NodeKind, contains, element_children};
use crate::error::LocatorParseError;

/// One level of a path locator: tag name and 1-based same-tag ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub tag: SmolStr,
    pub nth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockLocator {
    /// Element with a page-unique id.
    Id(SmolStr),
    /// Path from the content root downwards.
    Path(Vec<PathSegment>),
    /// Stored selector this version cannot interpret. Never resolves, so the
    /// anchor is reported as orphaned instead of the bundle being rejected.
    Unparsed(String),
}

impl BlockLocator {
    /// Locator for `element`, relative to `content_root`.
    ///
    /// Returns `None` when the element is not below the content root.
    pub fn for_element<D: DomTree + ?Sized>(
        dom: &D,
        element: &D::Node,
        content_root: &D::Node,
    ) -> Option<Self> {
        if let Some(id) = dom.attribute(element, "id").filter(|id| !id.is_empty()) {
            return Some(BlockLocator::Id(id.into()));
        }

        let mut segments = Vec::new();
        let mut current = element.clone();
        while &current != content_root {
            if dom.kind(&current) != NodeKind::Element {
                return None;
            }
            let tag = dom.tag_name(&current)?;
            let parent = dom.parent(&current)?;
            let nth = element_children(dom, &parent)
                .into_iter()
                .take_while(|sibling| sibling != &current)
                .filter(|sibling| dom.tag_name(sibling).as_deref() == Some(tag.as_str()))
                .count()
                + 1;
            segments.push(PathSegment {
                tag: tag.into(),
                nth,
            });
            current = parent;
        }

        if segments.is_empty() {
            return None;
        }
        segments.reverse();
        Some(BlockLocator::Path(segments))
    }

    /// Find the element this locator denotes. Only elements strictly inside
    /// `content_root` resolve.
    pub fn resolve<D: DomTree + ?Sized>(&self, dom: &D, content_root: &D::Node) -> Option<D::Node> {
        match self {
            BlockLocator::Id(id) => dom
                .element_by_id(id)
                .filter(|el| el != content_root && contains(dom, content_root, el)),
            BlockLocator::Path(segments) => {
                let mut current = content_root.clone();
                for segment in segments {
                    current = element_children(dom, &current)
                        .into_iter()
                        .filter(|c| dom.tag_name(c).as_deref() == Some(segment.tag.as_str()))
                        .nth(segment.nth.checked_sub(1)?)?;
                }
                Some(current)
            }
            BlockLocator::Unparsed(_) => None,
        }
    }
}

impl fmt::Display for BlockLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLocator::Id(id) => write!(f, "#{}", css_escape(id)),
            BlockLocator::Path(segments) => {
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" > ")?;
                    }
                    f.write_str(&segment.tag)?;
                    if segment.nth > 1 {
                        write!(f, ":nth-of-type({})", segment.nth)?;
                    }
                }
                Ok(())
            }
            BlockLocator::Unparsed(raw) => f.write_str(raw),
        }
    }
}

impl FromStr for BlockLocator {
    type Err = LocatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LocatorParseError::Empty);
        }
        if let Some(id) = s.strip_prefix('#') {
            if id.is_empty() {
                return Err(LocatorParseError::Empty);
            }
            return Ok(BlockLocator::Id(css_unescape(id).into()));
        }

        // Older selectors are prefixed with the content root class.
        let path = match s.split_once(char::is_whitespace) {
            Some((first, rest)) if first.starts_with('.') => rest.trim_start(),
            _ => s,
        };

        let segments = path
            .split('>')
            .map(|raw| parse_segment(raw.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BlockLocator::Path(segments))
    }
}

fn parse_segment(raw: &str) -> Result<PathSegment, LocatorParseError> {
    let invalid = || LocatorParseError::InvalidSegment(raw.to_string());
    let (tag, nth) = match raw.split_once(":nth-of-type(") {
        Some((tag, rest)) => {
            let n = rest.strip_suffix(')').ok_or_else(invalid)?;
            (tag, n.trim().parse::<usize>().map_err(|_| invalid())?)
        }
        None => (raw, 1),
    };
    if tag.is_empty() || nth == 0 || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }
    Ok(PathSegment {
        tag: tag.to_ascii_lowercase().into(),
        nth,
    })
}

impl From<String> for BlockLocator {
    fn from(raw: String) -> Self {
        raw.parse().unwrap_or_else(|e| {
            tracing::debug!(selector = %raw, error = %e, "keeping unparsed locator");
            BlockLocator::Unparsed(raw)
        })
    }
}

impl From<BlockLocator> for String {
    fn from(locator: BlockLocator) -> Self {
        locator.to_string()
    }
}

/// Escape an identifier the way `CSS.escape` does.
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let chars: Vec<char> = ident.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit()
            && (i == 0 || (i == 1 && chars[0] == '-'));
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if leading_digit || ('\u{1}'..='\u{1f}').contains(&c) || c == '\u{7f}' {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Reverse of [`css_escape`]. Unescaped input passes through unchanged.
pub fn css_unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }
        if chars.peek() == Some(&' ') {
            chars.next();
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or('\u{FFFD}');
        out.push(decoded);
    }
    out
}
