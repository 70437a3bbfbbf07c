use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use parking_lot::Condvar;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::calculator;
use crate::entry::Entry;
use crate::entry::EntryStore;
use crate::fzf::FzfConfig;
use crate::fzf::FzfDelegate;
use crate::loader::EntrySink;
use crate::loader::Loader;
use crate::msg::EntryMsg;
use crate::msg::RefreshSender;
use crate::reader;

/// Default number of insertions or matches between refresh snapshots.
pub const DEFAULT_EMIT_EVERY: usize = 1000;

/// Lifecycle of a filter job. At most one job is `Filtering` at a time;
/// `Stopping` marks a job that has been asked to cancel but has not yet
/// released its workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FilterState {
    Stopped,
    Filtering,
    Stopping,
}

/// How a filter job ended: naturally, or pre-empted by a newer request.
/// Either way the job's accumulated matches are returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOutcome {
    Filtered,
    Stopped,
}

pub(crate) struct Coord {
    pub state: FilterState,
    /// At least one entry has arrived since a reader last consumed the flag.
    pub data_pending: bool,
    /// The loaders are exhausted; the store will not grow any further.
    pub data_ready: bool,
}

/// State shared between the manager, the append loop and the filter workers.
pub(crate) struct Shared {
    pub storage: EntryStore,
    pub coord: Mutex<Coord>,
    pub cond: Condvar,
}

struct FilterSession {
    matches: Vec<String>,
    since_emit: usize,
}

/// Coordinates loading, filtering, cancellation and selection over the
/// shared entry store. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct EntryManager {
    shared: Arc<Shared>,
    delegate: FzfDelegate,
    refresh: RefreshSender,
    emit_every: usize,
}

impl EntryManager {
    pub fn new(refresh: RefreshSender, config: FzfConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                storage: EntryStore::new(),
                coord: Mutex::new(Coord {
                    state: FilterState::Stopped,
                    data_pending: false,
                    data_ready: false,
                }),
                cond: Condvar::new(),
            }),
            delegate: FzfDelegate::new(config),
            refresh,
            emit_every: DEFAULT_EMIT_EVERY,
        }
    }

    /// Overrides the refresh cadence: the number of insertions or matches
    /// between two emitted snapshots.
    pub fn with_emit_every(mut self, emit_every: usize) -> Self {
        self.emit_every = emit_every.max(1);
        self
    }

    /// Runs `loaders` to completion on the calling thread, streaming their
    /// entries through a background append loop into the store. Returns once
    /// every loader is drained; the append loop keeps consuming the residue
    /// and marks the data ready when the channel closes.
    pub fn load_entries<I>(&self, loaders: I)
    where
        I: IntoIterator<Item = Loader>,
    {
        let (tx, rx) = mpsc::channel();
        let manager = self.clone();
        thread::spawn(move || manager.append_loop(rx));

        let sink = EntrySink::new(tx);
        for loader in loaders {
            loader(&sink);
        }
    }

    fn append_loop(&self, entries: mpsc::Receiver<Entry>) {
        let mut since_emit = 0usize;
        for entry in entries {
            self.shared.storage.insert(entry);
            let idle = {
                let mut coord = self.shared.coord.lock();
                coord.data_pending = true;
                self.shared.cond.notify_all();
                coord.state != FilterState::Filtering
            };
            since_emit += 1;
            let due = self.shared.storage.len() <= self.emit_every || since_emit >= self.emit_every;
            if idle && due {
                since_emit = 0;
                self.refresh
                    .emit(EntryMsg::Refreshed(self.shared.storage.snapshot()));
            }
        }

        {
            let mut coord = self.shared.coord.lock();
            coord.data_ready = true;
            self.shared.cond.notify_all();
        }
        info!(entries = self.shared.storage.len(), "entry load complete");
        if self.shared.coord.lock().state != FilterState::Filtering {
            self.refresh
                .emit(EntryMsg::Refreshed(self.shared.storage.snapshot()));
        }
        self.refresh.emit(EntryMsg::Loaded);
    }

    /// Requests cancellation of the in-flight filter job, if any. With
    /// `wait`, blocks until the job has fully released its workers and the
    /// state has come back to rest. Returns whether a job was cancelled.
    pub fn stop_filter(&self, wait: bool) -> bool {
        let mut coord = self.shared.coord.lock();
        let stopping = coord.state == FilterState::Filtering;
        if stopping {
            coord.state = FilterState::Stopping;
            self.shared.cond.notify_all();
        }
        if wait {
            while coord.state != FilterState::Stopped {
                self.shared.cond.wait(&mut coord);
            }
        }
        stopping
    }

    /// Filters the store against `query`, blocking until the job completes
    /// or is cancelled. A job issued while another is in flight waits for
    /// the previous one to end before it begins.
    ///
    /// When the query evaluates as arithmetic, a synthetic `"<query> = <v>"`
    /// entry is inserted (idempotent by name) and becomes the candidate the
    /// matcher selects.
    pub fn filter_entry(&self, query: &str) -> (Vec<Arc<Entry>>, FilterOutcome) {
        {
            let mut coord = self.shared.coord.lock();
            while coord.state != FilterState::Stopped {
                self.shared.cond.wait(&mut coord);
            }
            coord.state = FilterState::Filtering;
        }
        debug!(query, "filter job started");

        let mut query = query.to_string();
        if let Some(entry) = calculator::calculator_entry(&query) {
            query = entry.name().to_string();
            self.shared.storage.insert(entry);
            self.refresh.emit(EntryMsg::Refreshed(
                self.shared.storage.transform(std::slice::from_ref(&query)),
            ));
        }

        let session = Arc::new(Mutex::new(FilterSession {
            matches: Vec::new(),
            since_emit: 0,
        }));
        let workers = worker_count();
        let chunk = self.shared.storage.len() / workers;
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let start = i * chunk;
            let shared = Arc::clone(&self.shared);
            let on_match = self.on_match_fn(Arc::clone(&session));
            let handle = if i + 1 < workers {
                let end = start + chunk;
                self.delegate.execute_async(&query, on_match, move |stream| {
                    reader::read_async(&shared, start, end, stream);
                })
            } else {
                // The terminal chunk is open-ended: entries the loader is
                // still producing belong to this job.
                self.delegate.execute_async(&query, on_match, move |stream| {
                    reader::read_sync(&shared, start, stream);
                })
            };
            handles.push(handle);
        }
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(%err, "matcher worker failed"),
                Err(_) => warn!("matcher worker panicked"),
            }
        }

        let matches = {
            let mut session = session.lock();
            std::mem::take(&mut session.matches)
        };
        let entries = self.shared.storage.transform(&matches);
        let outcome = {
            let mut coord = self.shared.coord.lock();
            let outcome = if coord.state == FilterState::Filtering {
                FilterOutcome::Filtered
            } else {
                FilterOutcome::Stopped
            };
            coord.state = FilterState::Stopped;
            self.shared.cond.notify_all();
            outcome
        };
        debug!(%query, matches = entries.len(), ?outcome, "filter job finished");
        match outcome {
            FilterOutcome::Filtered => self.refresh.emit(EntryMsg::Filtered(entries.clone())),
            FilterOutcome::Stopped => self.refresh.emit(EntryMsg::Stopped(entries.clone())),
        }
        (entries, outcome)
    }

    fn on_match_fn(&self, session: Arc<Mutex<FilterSession>>) -> impl FnMut(String) + Send + 'static {
        let manager = self.clone();
        move |name: String| {
            let snapshot = {
                let mut session = session.lock();
                session.matches.push(name);
                session.since_emit += 1;
                let due = session.matches.len() <= manager.emit_every
                    || session.since_emit >= manager.emit_every;
                if due {
                    session.since_emit = 0;
                    Some(manager.shared.storage.transform(&session.matches))
                } else {
                    None
                }
            };
            if let Some(entries) = snapshot {
                manager
                    .refresh
                    .emit(EntryMsg::Refreshed(entries));
            }
        }
    }

    /// Runs the selected entry's action, if it has one, and announces the
    /// selection. The action's outcome is not observed.
    pub fn select_entry(&self, entry: &Arc<Entry>) -> bool {
        let ran = entry.activate();
        self.refresh.emit(EntryMsg::Selected(Arc::clone(entry)));
        ran
    }
}

/// One worker per available core, minus one for the coordinator.
fn worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::RefreshSender;
    use pretty_assertions::assert_eq;

    fn manager() -> EntryManager {
        EntryManager::new(
            RefreshSender::disconnected(),
            FzfConfig {
                exact: true,
                ignore_case: true,
                algo: 0,
            },
        )
    }

    fn dummy_loader(count: u64) -> Loader {
        Box::new(move |sink| {
            for i in 0..count {
                sink.push(Entry::new(format!("{i}_")));
            }
        })
    }

    fn names(entries: &[Arc<Entry>]) -> Vec<String> {
        entries.iter().map(|e| e.name().to_string()).collect()
    }

    #[test]
    fn filter_matches_in_insertion_order() {
        let m = manager();
        m.load_entries([dummy_loader(100_000)]);

        let (entries, outcome) = m.filter_entry("4069_");
        assert_eq!(FilterOutcome::Filtered, outcome);
        assert_eq!(vec!["4069_", "14069_", "24069_", "34069_", "44069_", "54069_", "64069_", "74069_", "84069_", "94069_"], names(&entries));
    }

    #[test]
    fn unmatched_query_returns_nothing() {
        let m = manager();
        m.load_entries([dummy_loader(1000)]);

        let (entries, outcome) = m.filter_entry("zzz_");
        assert_eq!(FilterOutcome::Filtered, outcome);
        assert!(entries.is_empty());
    }

    #[test]
    fn arithmetic_query_offers_the_evaluated_candidate() {
        let m = manager();
        m.load_entries([dummy_loader(100)]);

        let (entries, _) = m.filter_entry("2+3");
        assert_eq!(vec!["2+3 = 5"], names(&entries));

        // Idempotent: the synthetic entry is inserted once.
        let (entries, _) = m.filter_entry("2+3");
        assert_eq!(vec!["2+3 = 5"], names(&entries));
    }

    #[test]
    fn stop_without_inflight_job_is_a_no_op() {
        let m = manager();
        assert!(!m.stop_filter(false));
        assert!(!m.stop_filter(true));
    }

    #[test]
    fn filter_after_stop_starts_immediately() {
        let m = manager();
        m.load_entries([dummy_loader(1000)]);

        let (first, _) = m.filter_entry("99_");
        m.stop_filter(true);
        let (second, outcome) = m.filter_entry("99_");
        assert_eq!(FilterOutcome::Filtered, outcome);
        assert_eq!(names(&first), names(&second));
    }
}
