use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::Digest;
use sha2::Sha256;
use tracing::error;

/// Side effect run when an entry is selected.
pub type EntryAction = Box<dyn Fn() + Send + Sync>;

/// A named, optionally actionable item offered to the user: a launchable
/// application, an openable file, or a synthetic candidate such as an
/// evaluated arithmetic expression.
pub struct Entry {
    name: String,
    action: Option<EntryAction>,
}

impl Entry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: None,
        }
    }

    pub fn with_action(name: impl Into<String>, action: EntryAction) -> Self {
        Self {
            name: name.into(),
            action: Some(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the entry's side effect. Returns whether there was one to run.
    pub fn activate(&self) -> bool {
        match &self.action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// 32-bit digest used to key the bucket table. Collisions are tolerated:
/// buckets hold index lists and `transform` returns every entry in a bucket,
/// so two colliding names simply travel together.
fn digest(name: &str) -> u32 {
    let hash = Sha256::digest(name.as_bytes());
    u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]])
}

#[derive(Default)]
struct StoreInner {
    entries: Vec<Arc<Entry>>,
    buckets: HashMap<u32, Vec<usize>>,
}

/// Append-only, insertion-ordered entry store with digest-bucket lookup by
/// name.
///
/// Duplicate names are rejected silently, concurrent inserts are serialised,
/// and the insertion order between two committed entries never changes.
#[derive(Default)]
pub struct EntryStore {
    inner: Mutex<StoreInner>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` unless an entry with the same name is already stored.
    pub fn insert(&self, entry: Entry) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let key = digest(entry.name());
        let index = inner.entries.len();
        let bucket = inner.buckets.entry(key).or_default();
        if bucket
            .iter()
            .any(|&i| inner.entries[i].name() == entry.name())
        {
            return;
        }
        bucket.push(index);
        inner.entries.push(Arc::new(entry));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The name stored at `index`, if the store has grown that far.
    pub fn name_at(&self, index: usize) -> Option<String> {
        self.inner
            .lock()
            .entries
            .get(index)
            .map(|entry| entry.name().to_string())
    }

    /// Visits the names in `[start, end)`, stopping early when `visit`
    /// returns false. `end` may exceed the current length; iteration stops
    /// at whatever the store holds.
    pub fn for_each(&self, start: usize, end: usize, mut visit: impl FnMut(&str) -> bool) {
        for index in start..end {
            let Some(name) = self.name_at(index) else {
                break;
            };
            if !visit(&name) {
                break;
            }
        }
    }

    /// Like [`for_each`](Self::for_each) up to the current end, but re-reads
    /// the length on every step so entries appended by a concurrent loader
    /// are picked up.
    pub fn traverse(&self, start: usize, mut visit: impl FnMut(&str) -> bool) {
        let mut index = start;
        while index < self.len() {
            let Some(name) = self.name_at(index) else {
                break;
            };
            if !visit(&name) {
                break;
            }
            index += 1;
        }
    }

    /// Maps matcher output names back to stored entries, in ascending
    /// insertion order regardless of the order of `names`.
    ///
    /// Every name must have been read out of this store; an unknown name is
    /// a caller bug.
    pub fn transform(&self, names: &[String]) -> Vec<Arc<Entry>> {
        let inner = self.inner.lock();
        let mut indices: Vec<usize> = Vec::with_capacity(names.len());
        for name in names {
            match inner.buckets.get(&digest(name)) {
                Some(bucket) => indices.extend_from_slice(bucket),
                None => {
                    debug_assert!(false, "name not present in storage: {name}");
                    error!(%name, "matched name missing from storage");
                }
            }
        }
        indices.sort_unstable();
        indices
            .into_iter()
            .map(|index| inner.entries[index].clone())
            .collect()
    }

    /// Full ordered snapshot, used for refresh emission.
    pub fn snapshot(&self) -> Vec<Arc<Entry>> {
        self.inner.lock().entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    fn names(entries: &[Arc<Entry>]) -> Vec<String> {
        entries.iter().map(|e| e.name().to_string()).collect()
    }

    fn fill(store: &EntryStore, start: i64, end: i64) {
        for i in start..end {
            store.insert(Entry::new(i.to_string()));
        }
    }

    #[test]
    fn concurrent_inserts_deduplicate_by_name() {
        let store = Arc::new(EntryStore::new());
        thread::scope(|scope| {
            for (start, end) in [(7, 10), (5, 10), (0, 10)] {
                let store = Arc::clone(&store);
                scope.spawn(move || fill(&store, start, end));
            }
        });
        assert_eq!(store.len(), 10);

        let mut seen: Vec<String> = Vec::new();
        store.traverse(0, |name| {
            seen.push(name.to_string());
            true
        });
        seen.sort();
        let mut expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        expected.sort();
        assert_eq!(expected, seen);
    }

    #[test]
    fn for_each_window_follows_insertion_order() {
        let store = EntryStore::new();
        fill(&store, 6, 10);
        fill(&store, 3, 6);
        fill(&store, 0, 3);

        let mut seen: Vec<String> = Vec::new();
        store.for_each(3, 6, |name| {
            seen.push(name.to_string());
            true
        });
        assert_eq!(vec!["9", "3", "4"], seen);
    }

    #[test]
    fn traverse_reads_from_start_to_live_end() {
        let store = EntryStore::new();
        fill(&store, 6, 10);
        fill(&store, 3, 6);
        fill(&store, 0, 3);

        let mut seen: Vec<String> = Vec::new();
        store.traverse(6, |name| {
            seen.push(name.to_string());
            true
        });
        assert_eq!(vec!["5", "0", "1", "2"], seen);
    }

    #[test]
    fn for_each_tolerates_end_past_len_and_early_stop() {
        let store = EntryStore::new();
        fill(&store, 0, 5);

        let mut seen: Vec<String> = Vec::new();
        store.for_each(2, 100, |name| {
            seen.push(name.to_string());
            true
        });
        assert_eq!(vec!["2", "3", "4"], seen);

        seen.clear();
        store.for_each(0, 5, |name| {
            seen.push(name.to_string());
            seen.len() < 2
        });
        assert_eq!(vec!["0", "1"], seen);
    }

    #[test]
    fn transform_returns_insertion_order() {
        let store = EntryStore::new();
        fill(&store, 0, 10);

        let request: Vec<String> = ["9", "1", "6"].iter().map(|s| s.to_string()).collect();
        assert_eq!(vec!["1", "6", "9"], names(&store.transform(&request)));

        let request = vec!["5".to_string()];
        assert_eq!(vec!["5"], names(&store.transform(&request)));
    }

    #[test]
    fn duplicate_inserts_are_rejected_silently() {
        let store = EntryStore::new();
        for _ in 0..3 {
            fill(&store, 0, 4);
        }
        assert_eq!(store.len(), 4);
        assert_eq!(
            vec!["0", "1", "2", "3"],
            names(&store.snapshot())
        );
    }
}
