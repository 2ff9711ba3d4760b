//! Batch store: the current list of document pairs, published as snapshots.
//!
//! Every mutation clones the previous snapshot, applies one change and
//! publishes the result on a `watch` channel with a bumped revision. Async
//! completions address documents by [`DocumentId`], so a result arriving
//! after its document was removed finds nothing and is dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{DocumentId, DocumentPair};

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSnapshot {
    pub documents: Vec<DocumentPair>,
    /// Incremented on every published change.
    pub revision: u64,
}

impl BatchSnapshot {
    pub fn get(&self, id: DocumentId) -> Option<&DocumentPair> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// 0-based index of the document in the batch.
    pub fn index_of(&self, id: DocumentId) -> Option<usize> {
        self.documents.iter().position(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|d| d.id).collect()
    }
}

pub struct BatchStore {
    tx: watch::Sender<Arc<BatchSnapshot>>,
}

impl BatchStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(BatchSnapshot::default()));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<BatchSnapshot> {
        self.tx.borrow().clone()
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BatchSnapshot>> {
        self.tx.subscribe()
    }

    /// Install a new batch, dropping the old one.
    pub fn replace(&self, documents: Vec<DocumentPair>) {
        self.commit(|docs| {
            *docs = documents;
            (true, Some(()))
        });
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    /// Remove one document. Returns false when it was not in the batch.
    pub fn remove(&self, id: DocumentId) -> bool {
        self.commit(|docs| {
            let before = docs.len();
            docs.retain(|d| d.id != id);
            let removed = docs.len() != before;
            (removed, Some(removed))
        })
        .unwrap_or(false)
    }

    /// Mutate one document. `f` receives the pair and its 0-based index.
    /// Returns `None` (and publishes nothing) when the document is gone.
    pub fn update<R>(&self, id: DocumentId, f: impl FnOnce(&mut DocumentPair, usize) -> R) -> Option<R> {
        self.commit(|docs| match docs.iter().position(|d| d.id == id) {
            Some(index) => (true, Some(f(&mut docs[index], index))),
            None => (false, None),
        })
    }

    /// Like [`Self::update`], but nothing is published when `f` fails.
    pub fn try_update<R, E>(
        &self,
        id: DocumentId,
        f: impl FnOnce(&mut DocumentPair, usize) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.commit(|docs| {
            let Some(index) = docs.iter().position(|d| d.id == id) else {
                return (false, None);
            };
            let mut candidate = docs[index].clone();
            match f(&mut candidate, index) {
                Ok(value) => {
                    docs[index] = candidate;
                    (true, Some(Ok(value)))
                }
                Err(e) => (false, Some(Err(e))),
            }
        })
    }

    /// Mutate the whole list. `f` returns whether anything changed.
    pub fn modify(&self, f: impl FnOnce(&mut Vec<DocumentPair>) -> bool) -> bool {
        self.commit(|docs| {
            let changed = f(docs);
            (changed, Some(changed))
        })
        .unwrap_or(false)
    }

    fn commit<R>(&self, f: impl FnOnce(&mut Vec<DocumentPair>) -> (bool, Option<R>)) -> Option<R> {
        let mut output = None;
        self.tx.send_if_modified(|current| {
            let mut documents = current.documents.clone();
            let (changed, value) = f(&mut documents);
            output = value;
            if changed {
                *current = Arc::new(BatchSnapshot {
                    documents,
                    revision: current.revision + 1,
                });
            }
            changed
        });
        output
    }
}

impl Default for BatchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageBuffer, OcrState};

    fn docs(n: usize) -> Vec<DocumentPair> {
        (0..n)
            .map(|i| DocumentPair::new(Some(ImageBuffer::new(vec![i as u8])), None))
            .collect()
    }

    #[test]
    fn replace_publishes_new_revision() {
        let store = BatchStore::new();
        let rx = store.subscribe();
        store.replace(docs(3));
        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(store.snapshot().revision, 1);
        assert_eq!(rx.borrow().len(), 3);
    }

    #[test]
    fn update_by_id_survives_removal_of_others() {
        let store = BatchStore::new();
        store.replace(docs(3));
        let ids = store.snapshot().ids();

        assert!(store.remove(ids[0]));
        let index = store.update(ids[2], |pair, index| {
            pair.ocr_state = OcrState::Success;
            index
        });
        assert_eq!(index, Some(1));
        assert_eq!(store.snapshot().get(ids[2]).unwrap().ocr_state, OcrState::Success);
    }

    #[test]
    fn update_of_removed_document_is_discarded() {
        let store = BatchStore::new();
        store.replace(docs(2));
        let id = store.snapshot().documents[0].id;
        store.remove(id);
        let revision = store.snapshot().revision;

        assert!(store.update(id, |pair, _| pair.ocr_state = OcrState::Error).is_none());
        assert_eq!(store.snapshot().revision, revision);
        assert!(!store.remove(id));
    }

    #[test]
    fn failed_try_update_publishes_nothing() {
        let store = BatchStore::new();
        store.replace(docs(1));
        let id = store.snapshot().documents[0].id;
        let revision = store.snapshot().revision;

        let result: Option<Result<(), &str>> = store.try_update(id, |pair, _| {
            pair.display_name = "half-applied".into();
            Err("refused")
        });
        assert_eq!(result, Some(Err("refused")));
        assert_eq!(store.snapshot().revision, revision);
        assert!(store.snapshot().documents[0].display_name.is_empty());
    }

    #[test]
    fn snapshots_are_immutable() {
        let store = BatchStore::new();
        store.replace(docs(1));
        let before = store.snapshot();
        let id = before.documents[0].id;
        store.update(id, |pair, _| pair.display_name = "X1".into());
        assert!(before.documents[0].display_name.is_empty());
        assert_eq!(store.snapshot().documents[0].display_name, "X1");
    }

    #[test]
    fn unchanged_modify_keeps_revision() {
        let store = BatchStore::new();
        store.replace(docs(2));
        let revision = store.snapshot().revision;
        let mut seen = 0;
        let changed = store.modify(|docs| {
            seen = docs.len();
            false
        });
        assert!(!changed);
        assert_eq!(seen, 2);
        assert_eq!(store.snapshot().revision, revision);
    }

    #[test]
    fn clear_empties_batch() {
        let store = BatchStore::new();
        store.replace(docs(2));
        store.clear();
        assert!(store.snapshot().is_empty());
    }
}
