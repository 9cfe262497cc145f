//! Committed tables plus a staging overlay shared by the backends.

use crate::backend::RecordKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted record, the unit of the on-disk snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub collection: String,
    pub key: RecordKey,
    pub value: Vec<u8>,
}

/// Committed state and staged writes.
///
/// A staged value of `None` is a pending delete.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    committed: BTreeMap<String, BTreeMap<RecordKey, Vec<u8>>>,
    staged: BTreeMap<(String, RecordKey), Option<Vec<u8>>>,
}

impl Tables {
    pub fn from_entries(entries: Vec<StoredEntry>) -> Self {
        let mut tables = Self::default();
        for entry in entries {
            tables
                .committed
                .entry(entry.collection)
                .or_default()
                .insert(entry.key, entry.value);
        }
        tables
    }

    pub fn insert(&mut self, collection: &str, key: RecordKey, value: Vec<u8>) {
        self.staged.insert((collection.to_string(), key), Some(value));
    }

    pub fn get(&self, collection: &str, key: &RecordKey) -> Option<Vec<u8>> {
        if let Some(staged) = self.staged.get(&(collection.to_string(), *key)) {
            return staged.clone();
        }
        self.committed
            .get(collection)
            .and_then(|table| table.get(key))
            .cloned()
    }

    pub fn delete(&mut self, collection: &str, key: &RecordKey) -> bool {
        let existed = self.get(collection, key).is_some();
        if existed {
            self.staged.insert((collection.to_string(), *key), None);
        }
        existed
    }

    pub fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&RecordKey, &[u8]) -> bool,
    ) -> Vec<(RecordKey, Vec<u8>)> {
        let mut view: BTreeMap<RecordKey, Vec<u8>> = self
            .committed
            .get(collection)
            .cloned()
            .unwrap_or_default();

        for ((staged_collection, key), value) in &self.staged {
            if staged_collection != collection {
                continue;
            }
            match value {
                Some(value) => {
                    view.insert(*key, value.clone());
                }
                None => {
                    view.remove(key);
                }
            }
        }

        view.into_iter()
            .filter(|(key, value)| predicate(key, value))
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Returns the committed state as it would look after applying the
    /// staged writes, without modifying `self`.
    pub fn preview_commit(&self) -> Vec<StoredEntry> {
        let mut next = self.clone();
        next.apply_staged();
        next.entries()
    }

    pub fn apply_staged(&mut self) {
        let staged = std::mem::take(&mut self.staged);
        for ((collection, key), value) in staged {
            match value {
                Some(value) => {
                    self.committed.entry(collection).or_default().insert(key, value);
                }
                None => {
                    if let Some(table) = self.committed.get_mut(&collection) {
                        table.remove(&key);
                    }
                }
            }
        }
        self.committed.retain(|_, table| !table.is_empty());
    }

    pub fn discard_staged(&mut self) {
        self.staged.clear();
    }

    pub fn entries(&self) -> Vec<StoredEntry> {
        self.committed
            .iter()
            .flat_map(|(collection, table)| {
                table.iter().map(move |(key, value)| StoredEntry {
                    collection: collection.clone(),
                    key: *key,
                    value: value.clone(),
                })
            })
            .collect()
    }

    pub fn committed_len(&self) -> usize {
        self.committed.values().map(BTreeMap::len).sum()
    }
}
