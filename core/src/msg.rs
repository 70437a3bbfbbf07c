use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;

use crate::entry::Entry;

/// Messages published by the entry manager to the view.
#[derive(Debug)]
pub enum EntryMsg {
    /// Every loader has been drained into the store.
    Loaded,
    /// Incremental snapshot of the visible entry list.
    Refreshed(Vec<Arc<Entry>>),
    /// A filter job ran to completion; carries the full result set.
    Filtered(Vec<Arc<Entry>>),
    /// A filter job was cancelled; carries the partial result set.
    Stopped(Vec<Arc<Entry>>),
    /// An entry was activated.
    Selected(Arc<Entry>),
}

/// Producer side of the refresh channel.
///
/// Sends never block: when the view is not ready to receive, the snapshot is
/// dropped and the next successful send carries the latest state. The loader
/// and filter paths are therefore never backpressured by a slow view.
#[derive(Clone)]
pub struct RefreshSender {
    tx: Option<SyncSender<EntryMsg>>,
}

impl RefreshSender {
    /// A sender with no receiver behind it, for headless use in tests.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, msg: EntryMsg) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(msg);
        }
    }
}

/// Creates the refresh channel. Capacity is one slot: a slow view only ever
/// observes the most recent snapshot that fit.
pub fn refresh_channel() -> (RefreshSender, Receiver<EntryMsg>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (RefreshSender { tx: Some(tx) }, rx)
}
