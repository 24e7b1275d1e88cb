//! Concurrent collection of finished entries, keyed by archive name.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::entry::{EntryName, EntryRecord, Origin};

/// Outcome of [`EntryStore::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// The name was new.
    Inserted,
    /// The name existed with a lower origin, which was dropped.
    Replaced { previous: Origin },
    /// The name existed with a higher origin; the new record was dropped.
    Kept { existing: Origin },
}

impl Insertion {
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, Insertion::Inserted)
    }
}

/// Entries produced by concurrent workers.
///
/// Inserting is atomic per name. When two records share a name the one with
/// the greater [`Origin`] survives, so the final contents do not depend on
/// which worker finished first.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: DashMap<EntryName, EntryRecord>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: EntryRecord) -> Insertion {
        match self.entries.entry(record.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                Insertion::Inserted
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get().origin;
                if record.origin > existing {
                    slot.insert(record);
                    Insertion::Replaced { previous: existing }
                } else {
                    Insertion::Kept { existing }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All records, ordered by the bytes of their names.
    pub fn into_sorted(self) -> Vec<EntryRecord> {
        let mut records: Vec<EntryRecord> = self.entries.into_iter().map(|(_, r)| r).collect();
        records.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        records
    }
}
