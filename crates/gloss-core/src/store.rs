//! Annotation persistence.
//!
//! Annotations live in the `annotations` section of the user data bundle,
//! next to bookmarks and learning status which other parts of the site own.
//! Every write re-reads the bundle, changes only `annotations`, and writes
//! the whole bundle back, so sections written by others since we loaded are
//! not clobbered.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::anchor::{Anchor, AnchorId};
use crate::error::{GlossError, StorageError};
use crate::identity::DocumentKey;

/// The whole persisted record.
///
/// Bookmarks and learning status are owned by other parts of the site and
/// kept as opaque JSON. A `null` section reads as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default = "empty_array", deserialize_with = "or_empty_array")]
    pub bookmarks: serde_json::Value,
    #[serde(default = "empty_object", deserialize_with = "or_empty_object")]
    pub learning_status: serde_json::Value,
    #[serde(default, deserialize_with = "lenient_annotations")]
    pub annotations: BTreeMap<DocumentKey, Vec<Anchor>>,
    /// Sections this crate does not know about, carried through rewrites.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for UserData {
    fn default() -> Self {
        Self {
            bookmarks: empty_array(),
            learning_status: empty_object(),
            annotations: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn or_empty_array<'de, D: Deserializer<'de>>(d: D) -> Result<serde_json::Value, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(if value.is_null() { empty_array() } else { value })
}

fn or_empty_object<'de, D: Deserializer<'de>>(d: D) -> Result<serde_json::Value, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(if value.is_null() { empty_object() } else { value })
}

/// Annotations section, skipping entries that do not parse instead of
/// failing the whole bundle.
fn lenient_annotations<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<DocumentKey, Vec<Anchor>>, D::Error> {
    let serde_json::Value::Object(documents) = serde_json::Value::deserialize(d)? else {
        return Ok(BTreeMap::new());
    };
    let mut annotations = BTreeMap::new();
    for (key, list) in documents {
        let serde_json::Value::Array(list) = list else {
            tracing::warn!(key = %key, "annotation list is not an array, skipping");
            continue;
        };
        let anchors: Vec<Anchor> = list
            .into_iter()
            .filter_map(|raw| match serde_json::from_value(raw) {
                Ok(anchor) => Some(anchor),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable annotation");
                    None
                }
            })
            .collect();
        if !anchors.is_empty() {
            annotations.insert(DocumentKey::new(key), anchors);
        }
    }
    Ok(annotations)
}

/// Raw string storage for the serialized bundle.
///
/// The browser implementation is backed by `localStorage`;
/// [`MemoryStorage`] covers tests and native use.
pub trait Storage {
    /// Stored bundle, `None` on first run.
    fn load(&self) -> Result<Option<String>, StorageError>;

    fn save(&self, contents: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}

/// Shared in-memory storage. Clones see the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    contents: Rc<RefCell<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Rc::new(RefCell::new(Some(contents.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }

    pub fn set_contents(&self, contents: impl Into<String>) {
        *self.contents.borrow_mut() = Some(contents.into());
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.contents())
    }

    fn save(&self, contents: &str) -> Result<(), StorageError> {
        *self.contents.borrow_mut() = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.contents.borrow_mut() = None;
        Ok(())
    }
}

/// Per-document highlight and memo counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationStats {
    pub highlights: usize,
    pub memos: usize,
}

/// Read the bundle, treating absence and corruption alike as a fresh bundle.
fn read_bundle<S: Storage>(storage: &S) -> UserData {
    match storage.load() {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored user data is corrupt, starting fresh");
            UserData::default()
        }),
        Ok(None) => UserData::default(),
        Err(e) => {
            tracing::warn!(error = %e, "could not read user data, starting fresh");
            UserData::default()
        }
    }
}

pub struct AnnotationStore<S> {
    storage: S,
    data: UserData,
}

impl<S: Storage> AnnotationStore<S> {
    pub fn open(storage: S) -> Self {
        let data = read_bundle(&storage);
        tracing::debug!(
            documents = data.annotations.len(),
            "annotation store opened"
        );
        Self { storage, data }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Bundle as of the last read or write.
    pub fn data(&self) -> &UserData {
        &self.data
    }

    /// Re-read the bundle from storage.
    pub fn reload(&mut self) {
        self.data = read_bundle(&self.storage);
    }

    /// Anchors of one document, in insertion order.
    pub fn anchors(&self, key: &DocumentKey) -> &[Anchor] {
        self.data
            .annotations
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, key: &DocumentKey, id: &AnchorId) -> Option<&Anchor> {
        self.anchors(key).iter().find(|a| &a.id == id)
    }

    pub fn stats(&self, key: &DocumentKey) -> AnnotationStats {
        let anchors = self.anchors(key);
        AnnotationStats {
            highlights: anchors.len(),
            memos: anchors.iter().filter(|a| a.has_memo()).count(),
        }
    }

    /// Append an anchor. Refuses one that overlaps a stored anchor on the
    /// same block.
    pub fn insert(&mut self, key: &DocumentKey, anchor: Anchor) -> Result<(), GlossError> {
        self.modify(|annotations| {
            let list = annotations.entry(key.clone()).or_default();
            if let Some(existing) = list
                .iter()
                .find(|a| a.overlaps(&anchor.locator, &anchor.range()))
            {
                return Err(GlossError::Overlap(existing.id.clone()));
            }
            tracing::debug!(key = %key, id = %anchor.id, text = %anchor.text, "highlight saved");
            list.push(anchor);
            Ok(())
        })
    }

    /// Set or clear the memo. Blank memos are stored as no memo.
    pub fn set_memo(
        &mut self,
        key: &DocumentKey,
        id: &AnchorId,
        memo: Option<String>,
    ) -> Result<Anchor, GlossError> {
        let memo = memo.filter(|m| !m.trim().is_empty());
        self.modify(|annotations| {
            let anchor = annotations
                .get_mut(key)
                .and_then(|list| list.iter_mut().find(|a| &a.id == id))
                .ok_or_else(|| GlossError::UnknownAnchor(id.clone()))?;
            anchor.memo = memo;
            tracing::debug!(key = %key, id = %id, has_memo = anchor.has_memo(), "memo saved");
            Ok(anchor.clone())
        })
    }

    pub fn remove(&mut self, key: &DocumentKey, id: &AnchorId) -> Result<Anchor, GlossError> {
        self.modify(|annotations| {
            let list = annotations
                .get_mut(key)
                .ok_or_else(|| GlossError::UnknownAnchor(id.clone()))?;
            let position = list
                .iter()
                .position(|a| &a.id == id)
                .ok_or_else(|| GlossError::UnknownAnchor(id.clone()))?;
            let removed = list.remove(position);
            if list.is_empty() {
                annotations.remove(key);
            }
            tracing::debug!(key = %key, id = %id, "annotation removed");
            Ok(removed)
        })
    }

    /// Drop all user data, bookmarks and learning status included.
    pub fn reset(&mut self) -> Result<(), GlossError> {
        self.storage.clear()?;
        self.data = UserData::default();
        tracing::info!("user data reset");
        Ok(())
    }

    fn modify<R, F>(&mut self, f: F) -> Result<R, GlossError>
    where
        F: FnOnce(&mut BTreeMap<DocumentKey, Vec<Anchor>>) -> Result<R, GlossError>,
    {
        let mut fresh = read_bundle(&self.storage);
        let result = f(&mut fresh.annotations)?;
        let raw = serde_json::to_string(&fresh)?;
        self.storage.save(&raw)?;
        self.data = fresh;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::HighlightColor;

    fn key() -> DocumentKey {
        DocumentKey::new("/sutras/01/")
    }

    fn anchor(start: usize, text: &str) -> Anchor {
        Anchor::new("p:nth-of-type(2)".parse().unwrap(), start, text, HighlightColor::Yellow)
    }

    #[test]
    fn test_absent_bundle_is_empty() {
        let store = AnnotationStore::open(MemoryStorage::new());
        assert!(store.anchors(&key()).is_empty());
        assert_eq!(store.stats(&key()), AnnotationStats::default());
    }

    #[test]
    fn test_corrupt_bundle_is_treated_as_absent() {
        let storage = MemoryStorage::with_contents("{not json");
        let mut store = AnnotationStore::open(storage.clone());
        assert_eq!(store.data(), &UserData::default());

        store.insert(&key(), anchor(0, "abc")).unwrap();
        let written: UserData = serde_json::from_str(&storage.contents().unwrap()).unwrap();
        assert_eq!(written.annotations[&key()].len(), 1);
    }

    #[test]
    fn test_writes_preserve_other_sections() {
        let storage = MemoryStorage::with_contents(
            r#"{"bookmarks":[{"url":"/a/"}],"learning_status":{"/a/":"done"},"theme":"dark"}"#,
        );
        let mut store = AnnotationStore::open(storage.clone());

        // Another component writes a bookmark after we loaded.
        storage.set_contents(
            r#"{"bookmarks":[{"url":"/a/"},{"url":"/b/"}],"learning_status":{"/a/":"done"},"theme":"dark"}"#,
        );
        store.insert(&key(), anchor(0, "abc")).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&storage.contents().unwrap()).unwrap();
        assert_eq!(written["bookmarks"].as_array().unwrap().len(), 2);
        assert_eq!(written["learning_status"]["/a/"], "done");
        assert_eq!(written["theme"], "dark");
        assert_eq!(written["annotations"]["/sutras/01/"][0]["text"], "abc");
    }

    #[test]
    fn test_insert_rejects_overlap() {
        let mut store = AnnotationStore::open(MemoryStorage::new());
        let first = anchor(5, "0123456789");
        let first_id = first.id.clone();
        store.insert(&key(), first).unwrap();

        let err = store.insert(&key(), anchor(10, "xyz")).unwrap_err();
        assert!(matches!(err, GlossError::Overlap(id) if id == first_id));
        store.insert(&key(), anchor(15, "adjacent")).unwrap();
        assert_eq!(store.anchors(&key()).len(), 2);
    }

    #[test]
    fn test_memo_and_stats() {
        let mut store = AnnotationStore::open(MemoryStorage::new());
        let a = anchor(0, "abc");
        let id = a.id.clone();
        store.insert(&key(), a).unwrap();
        store.insert(&key(), anchor(10, "def")).unwrap();

        let updated = store.set_memo(&key(), &id, Some("why".into())).unwrap();
        assert_eq!(updated.memo.as_deref(), Some("why"));
        assert_eq!(store.stats(&key()), AnnotationStats { highlights: 2, memos: 1 });

        let cleared = store.set_memo(&key(), &id, Some("  ".into())).unwrap();
        assert_eq!(cleared.memo, None);
        assert_eq!(store.stats(&key()).memos, 0);

        let missing = store.set_memo(&key(), &"nope".into(), None);
        assert!(matches!(missing, Err(GlossError::UnknownAnchor(_))));
    }

    #[test]
    fn test_remove_and_reset() {
        let storage = MemoryStorage::new();
        let mut store = AnnotationStore::open(storage.clone());
        let a = anchor(0, "abc");
        let id = a.id.clone();
        store.insert(&key(), a).unwrap();

        let removed = store.remove(&key(), &id).unwrap();
        assert_eq!(removed.id, id);
        assert!(store.anchors(&key()).is_empty());
        assert!(matches!(
            store.remove(&key(), &id),
            Err(GlossError::UnknownAnchor(_))
        ));

        store.insert(&key(), anchor(0, "abc")).unwrap();
        store.reset().unwrap();
        assert_eq!(storage.contents(), None);
        assert!(store.anchors(&key()).is_empty());
    }

    #[test]
    fn test_null_sections_do_not_discard_the_bundle() {
        let storage = MemoryStorage::with_contents(
            r#"{"bookmarks":null,"learning_status":{"/a/":"done"},"annotations":{}}"#,
        );
        let mut store = AnnotationStore::open(storage.clone());
        store.insert(&key(), anchor(0, "abc")).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&storage.contents().unwrap()).unwrap();
        assert_eq!(written["bookmarks"], serde_json::json!([]));
        assert_eq!(written["learning_status"]["/a/"], "done");
        assert_eq!(written["annotations"]["/sutras/01/"][0]["text"], "abc");
    }

    #[test]
    fn test_unreadable_annotation_is_skipped() {
        let storage = MemoryStorage::with_contents(
            r#"{"learning_status":{"/a/":"done"},"annotations":{
                "/sutras/01/":[{"id":"broken"},
                    {"id":"a1","selector":"p:nth-of-type(2)","startOffset":0,
                     "endOffset":3,"text":"abc","color":"yellow","created_at":1}],
                "/sutras/02/":null}}"#,
        );
        let store = AnnotationStore::open(storage);
        assert_eq!(store.anchors(&key()).len(), 1);
        assert_eq!(store.data().learning_status["/a/"], "done");
        assert!(store.anchors(&DocumentKey::new("/sutras/02/")).is_empty());
    }

    #[test]
    fn test_reads_bundle_written_by_earlier_versions() {
        let storage = MemoryStorage::with_contents(
            r#"{"bookmarks":[],"learning_status":{},"annotations":{"/sutras/01/":[
                {"id":"a1","selector":".md-content p:nth-of-type(2)","startOffset":0,
                 "endOffset":3,"text":"abc","color":"yellow","created_at":1,"memo":""}
            ]}}"#,
        );
        let store = AnnotationStore::open(storage);
        let anchors = store.anchors(&key());
        assert_eq!(anchors.len(), 1);
        assert!(!anchors[0].has_memo());
    }
}
