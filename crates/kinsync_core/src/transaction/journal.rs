//! Undo journal for in-memory rollback.

use crate::entity::EntityId;
use crate::model::Record;
use crate::store::StoreState;
use crate::types::EntityKind;

/// One staged write, remembering what it replaced.
#[derive(Debug)]
struct UndoEntry {
    kind: EntityKind,
    id: EntityId,
    previous: Option<Record>,
}

/// Records the prior version of every record a transaction touched.
#[derive(Debug, Default)]
pub(crate) struct UndoJournal {
    entries: Vec<UndoEntry>,
}

impl UndoJournal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, kind: EntityKind, id: EntityId, previous: Option<Record>) {
        self.entries.push(UndoEntry { kind, id, previous });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restores `state` to what it was before the first recorded write.
    pub(crate) fn undo(&mut self, state: &mut StoreState) {
        while let Some(entry) = self.entries.pop() {
            match entry.previous {
                Some(record) => {
                    state.put(record);
                }
                None => {
                    state.remove(entry.kind, entry.id);
                }
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
