//! Reader strategies: the two ways a filter worker feeds store names into
//! its matcher stream.
//!
//! The asynchronous reader covers a fixed, fully-populated index range and
//! never waits. The synchronous reader covers the open-ended tail of the
//! store and blocks between items until the loader has produced more data,
//! the load has completed, or the job has been cancelled; this is what lets
//! a filter issued mid-load include entries that have not arrived yet.

use crate::fzf::FzfStream;
use crate::manager::FilterState;
use crate::manager::Shared;

/// Feeds the names in `[start, end)` without waiting, aborting as soon as
/// the job leaves `Filtering`. The stream is closed on return.
pub(crate) fn read_async(shared: &Shared, start: usize, end: usize, stream: FzfStream) {
    shared.storage.for_each(start, end, |name| {
        if stream.send(name.to_string()).is_err() {
            return false;
        }
        shared.coord.lock().state == FilterState::Filtering
    });
}

/// Feeds names from `start` towards the still-growing end of the store,
/// calling [`persist`] after each push. The stream is closed when the job
/// leaves `Filtering` or when the cursor has reached the end of a completed
/// load.
pub(crate) fn read_sync(shared: &Shared, start: usize, stream: FzfStream) {
    let mut cursor = start;
    loop {
        match shared.storage.name_at(cursor) {
            Some(name) => {
                if stream.send(name).is_err() {
                    return;
                }
                cursor += 1;
                if !persist(shared) {
                    return;
                }
            }
            None => {
                if !persist(shared) {
                    return;
                }
                if shared.coord.lock().data_ready && cursor >= shared.storage.len() {
                    return;
                }
            }
        }
    }
}

/// The synchronous reader's per-iteration checkpoint: waits on the condvar
/// while the job is still `Filtering` and the loader has neither produced
/// new data nor finished. Observed `data_pending` is consumed. Returns
/// whether the job is still `Filtering`.
fn persist(shared: &Shared) -> bool {
    let mut coord = shared.coord.lock();
    while coord.state == FilterState::Filtering && !coord.data_pending && !coord.data_ready {
        shared.cond.wait(&mut coord);
    }
    if coord.data_pending {
        coord.data_pending = false;
    }
    coord.state == FilterState::Filtering
}
