use std::sync::Arc;
use std::thread;

use dsearch_core::EntryManager;
use parking_lot::Mutex;

use crate::app_event::AppEvent;
use crate::app_event::AppEventSender;

#[derive(Default)]
struct SearchState {
    pending: Option<String>,
    running: bool,
}

/// Keeps at most one filter job in flight. A newer query pre-empts the
/// current job and replaces whatever was queued behind it; the worker loops
/// until no query is pending.
#[derive(Clone)]
pub(crate) struct SearchCoordinator {
    manager: EntryManager,
    tx: AppEventSender,
    state: Arc<Mutex<SearchState>>,
}

impl SearchCoordinator {
    pub(crate) fn new(manager: EntryManager, tx: AppEventSender) -> Self {
        Self {
            manager,
            tx,
            state: Arc::new(Mutex::new(SearchState::default())),
        }
    }

    /// Submits the latest query, cancelling the in-flight job if any.
    pub(crate) fn submit(&self, query: String) {
        let spawn = {
            let mut state = self.state.lock();
            state.pending = Some(query);
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };
        self.manager.stop_filter(false);
        if spawn {
            self.spawn_worker();
        }
    }

    fn spawn_worker(&self) {
        let coordinator = self.clone();
        thread::spawn(move || {
            loop {
                let query = {
                    let mut state = coordinator.state.lock();
                    match state.pending.take() {
                        Some(query) => query,
                        None => {
                            state.running = false;
                            break;
                        }
                    }
                };
                let (entries, outcome) = coordinator.manager.filter_entry(&query);
                coordinator.tx.send(AppEvent::FilterDone {
                    query,
                    entries,
                    outcome,
                });
            }
        });
    }
}
