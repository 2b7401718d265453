//! Canonical document identity.
//!
//! The same generated page can be observed under many paths: with or without
//! a deployment base path, with a trailing `index.html`, percent-encoded or
//! not. Annotations are keyed by the id of the matching entry in the document
//! index so they follow the document, not the URL.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;

/// Canonical document key. Either a descriptor id from the index, or the
/// normalized observed path when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(SmolStr);

impl DocumentKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(SmolStr::new(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DocumentKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Metadata bag attached to each index entry.
///
/// Only `doc_type` matters to annotation. The rest comes from page
/// frontmatter and is carried untyped for the listing views that share the
/// index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub doc_type: Option<serde_json::Value>,
    #[serde(default)]
    pub chapter: Option<serde_json::Value>,
    #[serde(default)]
    pub chapter_order: Option<serde_json::Value>,
    #[serde(default)]
    pub part: Option<serde_json::Value>,
    #[serde(default)]
    pub order: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
    #[serde(default)]
    pub keywords: Option<serde_json::Value>,
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of the document index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub id: String,
    #[serde(default)]
    pub title: serde_json::Value,
    #[serde(default, deserialize_with = "metadata_or_default")]
    pub metadata: DocumentMetadata,
}

fn metadata_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<DocumentMetadata, D::Error> {
    Ok(Option::<DocumentMetadata>::deserialize(d)?.unwrap_or_default())
}

impl DocumentDescriptor {
    pub fn doc_type(&self) -> Option<&str> {
        self.metadata.doc_type.as_ref().and_then(serde_json::Value::as_str)
    }

    pub fn is_system(&self) -> bool {
        self.doc_type() == Some("system")
    }
}

/// Ids that denote the site root.
const ROOT_IDS: &[&str] = &["/", "/index.html"];

/// Longer ids are more specific; root ids are the least specific of all and
/// tie among themselves, so the first one listed wins.
fn specificity(id: &str) -> usize {
    if ROOT_IDS.contains(&id) { 0 } else { id.len() }
}

/// The document index, in the order the generator wrote it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentIndex {
    descriptors: Vec<DocumentDescriptor>,
    /// Deployment prefixes that are themselves the site root (`/site/`).
    base_paths: Vec<String>,
}

impl DocumentIndex {
    pub fn new(descriptors: Vec<DocumentDescriptor>) -> Self {
        Self {
            descriptors,
            base_paths: Vec::new(),
        }
    }

    /// Parse the index JSON (an array of descriptors). Entries that do not
    /// describe a document are skipped.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;
        let descriptors = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed index entry");
                    None
                }
            })
            .collect();
        Ok(Self::new(descriptors))
    }

    /// Paths that count as the site root in addition to `/`.
    pub fn with_base_paths(mut self, base_paths: impl IntoIterator<Item = String>) -> Self {
        self.base_paths = base_paths.into_iter().map(|p| normalize_path(&p)).collect();
        self
    }

    pub fn descriptors(&self) -> &[DocumentDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether a normalized path is the site root under some deployment.
    pub fn is_root_path(&self, path: &str) -> bool {
        ROOT_IDS.contains(&path) || path.is_empty() || self.base_paths.iter().any(|b| b == path)
    }

    fn matches(&self, id: &str, path: &str, decoded: Option<&str>) -> bool {
        if ROOT_IDS.contains(&id) {
            return self.is_root_path(path);
        }
        id == path || path.ends_with(id) || decoded.is_some_and(|d| d.ends_with(id))
    }

    /// Most specific descriptor for a normalized observed path.
    pub fn descriptor_for(&self, path: &str) -> Option<&DocumentDescriptor> {
        let decoded = percent_decode_str(path).decode_utf8().ok();
        let decoded = decoded.as_deref().filter(|d| *d != path);

        self.descriptors
            .iter()
            .filter(|d| !d.id.is_empty() && self.matches(&d.id, path, decoded))
            .fold(None, |best: Option<&DocumentDescriptor>, d| match best {
                Some(b) if specificity(&b.id) >= specificity(&d.id) => Some(b),
                _ => Some(d),
            })
    }

    /// Canonical key for a normalized observed path. Falls back to the path.
    pub fn resolve(&self, path: &str) -> DocumentKey {
        match self.descriptor_for(path) {
            Some(descriptor) => {
                tracing::trace!(path, key = %descriptor.id, "resolved document key");
                DocumentKey::new(&descriptor.id)
            }
            None => {
                tracing::debug!(path, "no index entry matches, keying by path");
                DocumentKey::new(path)
            }
        }
    }

    /// Descriptor whose id is exactly `key`.
    pub fn get(&self, key: &DocumentKey) -> Option<&DocumentDescriptor> {
        self.descriptors.iter().find(|d| d.id == key.as_str())
    }

    pub fn is_system(&self, key: &DocumentKey) -> bool {
        self.get(key).is_some_and(DocumentDescriptor::is_system)
    }
}

/// Resolve against an index that may not have loaded yet.
pub fn resolve_with(index: Option<&DocumentIndex>, path: &str) -> DocumentKey {
    match index {
        Some(index) => index.resolve(path),
        None => DocumentKey::new(path),
    }
}

/// Normalize a raw page path: drop a trailing `index.html` and give
/// directory-like paths a trailing slash.
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.strip_suffix("index.html").unwrap_or(raw).to_string();
    if path.is_empty() {
        path.push('/');
    }
    if path.len() > 1 && !path.ends_with('/') && !path.contains('.') {
        path.push('/');
    }
    path
}

/// Ticket handed out when an index fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// Holds the loaded index and drops responses that arrive after a newer
/// fetch has already succeeded.
#[derive(Debug, Default)]
pub struct IndexSlot {
    index: Option<Arc<DocumentIndex>>,
    issued: u64,
    loaded: Option<u64>,
}

impl IndexSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket(self.issued)
    }

    /// Store a fetched index. Returns `false` when the response was stale.
    pub fn complete(&mut self, ticket: FetchTicket, index: DocumentIndex) -> bool {
        if self.loaded.is_some_and(|loaded| loaded > ticket.0) {
            tracing::debug!(ticket = ticket.0, "ignoring stale index response");
            return false;
        }
        tracing::debug!(ticket = ticket.0, entries = index.len(), "document index loaded");
        self.index = Some(Arc::new(index));
        self.loaded = Some(ticket.0);
        true
    }

    pub fn get(&self) -> Option<&DocumentIndex> {
        self.index.as_deref()
    }

    pub fn shared(&self) -> Option<Arc<DocumentIndex>> {
        self.index.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> DocumentDescriptor {
        DocumentDescriptor {
            id: id.to_string(),
            title: serde_json::Value::Null,
            metadata: DocumentMetadata::default(),
        }
    }

    fn index(ids: &[&str]) -> DocumentIndex {
        DocumentIndex::new(ids.iter().map(|id| descriptor(id)).collect())
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/sutras/01/index.html"), "/sutras/01/");
        assert_eq!(normalize_path("/sutras/01"), "/sutras/01/");
        assert_eq!(normalize_path("/sutras/01/"), "/sutras/01/");
        assert_eq!(normalize_path("/assets/file.pdf"), "/assets/file.pdf");
        assert_eq!(normalize_path("/index.html"), "/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_resolution_is_stable_across_observed_paths() {
        let idx = index(&["/", "/sutras/", "/sutras/01/"]);
        let expected = DocumentKey::new("/sutras/01/");
        for raw in ["/base/sutras/01/", "/sutras/01/", "/sutras/01/index.html"] {
            assert_eq!(idx.resolve(&normalize_path(raw)), expected, "{raw}");
        }
    }

    #[test]
    fn test_root_descriptor_never_suffix_matches() {
        let idx = index(&["/", "/index.html"]);
        assert_eq!(idx.resolve("/sutras/01/"), DocumentKey::new("/sutras/01/"));
        assert_eq!(idx.resolve("/"), DocumentKey::new("/"));

        let deployed = index(&["/"]).with_base_paths(["/DharmaBase".to_string()]);
        assert_eq!(deployed.resolve("/DharmaBase/"), DocumentKey::new("/"));
        assert_eq!(deployed.resolve("/DharmaBase/x/"), DocumentKey::new("/DharmaBase/x/"));
    }

    #[test]
    fn test_longest_match_wins() {
        let idx = index(&["/01/", "/sutras/01/", "/sutras/"]);
        assert_eq!(idx.resolve("/site/sutras/01/"), DocumentKey::new("/sutras/01/"));
    }

    #[test]
    fn test_percent_decoded_match() {
        let idx = index(&["/경전/01/"]);
        let observed = "/base/%EA%B2%BD%EC%A0%84/01/";
        assert_eq!(idx.resolve(observed), DocumentKey::new("/경전/01/"));
    }

    #[test]
    fn test_unmatched_path_is_its_own_key() {
        assert_eq!(resolve_with(None, "/x/"), DocumentKey::new("/x/"));
        assert_eq!(index(&["/a/"]).resolve("/b/"), DocumentKey::new("/b/"));
    }

    #[test]
    fn test_index_json_and_system_docs() {
        let raw = r#"[
            {"id": "/card_view/", "title": "Cards", "metadata": {"doc_type": "system"}},
            {"id": "/sutras/01/", "title": "First", "metadata": {
                "chapter": "birth", "chapter_order": 1, "part": "I",
                "tags": ["a"], "keywords": ["k"], "summary": "s", "author": "x"
            }}
        ]"#;
        let idx = DocumentIndex::from_json(raw).unwrap();
        assert_eq!(idx.len(), 2);
        assert!(idx.is_system(&DocumentKey::new("/card_view/")));
        assert!(!idx.is_system(&DocumentKey::new("/sutras/01/")));
        let first = idx.get(&DocumentKey::new("/sutras/01/")).unwrap();
        assert_eq!(first.metadata.chapter, Some(serde_json::json!("birth")));
        assert_eq!(first.metadata.extra.get("author"), Some(&serde_json::json!("x")));
    }

    #[test]
    fn test_frontmatter_numbers_do_not_reject_the_index() {
        let raw = r#"[
            {"id": "/sutras/01/", "title": 2024, "metadata": {"part": 2, "summary": 3.5}},
            {"id": "/sutras/02/", "title": "Two", "metadata": null},
            {"title": "no id"},
            {"id": "/notes/", "metadata": {"doc_type": 7}}
        ]"#;
        let idx = DocumentIndex::from_json(raw).unwrap();
        assert_eq!(idx.len(), 3);
        assert_eq!(
            idx.resolve("/base/sutras/01/"),
            DocumentKey::new("/sutras/01/")
        );
        let first = idx.get(&DocumentKey::new("/sutras/01/")).unwrap();
        assert_eq!(first.title, serde_json::json!(2024));
        assert_eq!(first.metadata.part, Some(serde_json::json!(2)));
        assert!(!idx.is_system(&DocumentKey::new("/notes/")));
        assert!(DocumentIndex::from_json("{not json").is_err());
    }

    #[test]
    fn test_stale_index_response_is_ignored() {
        let mut slot = IndexSlot::new();
        let first = slot.begin_fetch();
        let second = slot.begin_fetch();

        assert!(slot.complete(second, index(&["/new/"])));
        assert!(!slot.complete(first, index(&["/old/"])));
        assert_eq!(slot.get().unwrap().descriptors()[0].id, "/new/");

        // An older fetch may still fill an empty slot.
        let mut slot = IndexSlot::new();
        let first = slot.begin_fetch();
        let _second = slot.begin_fetch();
        assert!(slot.complete(first, index(&["/old/"])));
    }
}
