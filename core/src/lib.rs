//! Core engine for the dsearch launcher.
//!
//! Entries discovered by the loaders stream into an append-only,
//! insertion-ordered store while fuzzy filter jobs run concurrently over
//! whatever has arrived so far. A filter issued mid-load keeps consuming the
//! open-ended tail of the store until loading completes, and a newer query
//! can pre-empt an in-flight job at any point between two candidates.

pub mod calculator;
pub mod entry;
mod error;
pub mod fzf;
pub mod loader;
pub mod manager;
pub mod msg;
mod reader;

pub use entry::Entry;
pub use entry::EntryStore;
pub use error::FzfError;
pub use fzf::FzfConfig;
pub use fzf::FzfDelegate;
pub use loader::EntrySink;
pub use loader::Loader;
pub use loader::load_applications;
pub use loader::load_files;
pub use manager::EntryManager;
pub use manager::FilterOutcome;
pub use msg::EntryMsg;
pub use msg::RefreshSender;
pub use msg::refresh_channel;
