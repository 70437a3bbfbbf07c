use std::sync::Arc;

use dsearch_core::Entry;
use dsearch_core::EntryMsg;
use dsearch_core::FilterOutcome;
use tokio::sync::mpsc::UnboundedSender;

/// Events multiplexed into the application loop.
#[derive(Debug)]
pub(crate) enum AppEvent {
    /// A message from the entry manager's refresh channel.
    Entry(EntryMsg),
    /// A filter job finished. `query` echoes the submitted search term so
    /// the app can decide whether the results are still relevant.
    FilterDone {
        query: String,
        entries: Vec<Arc<Entry>>,
        outcome: FilterOutcome,
    },
}

#[derive(Clone)]
pub(crate) struct AppEventSender {
    tx: UnboundedSender<AppEvent>,
}

impl AppEventSender {
    pub(crate) fn new(tx: UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    /// Sends an event to the app loop. Quietly drops it when the loop has
    /// already shut down.
    pub(crate) fn send(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }
}
