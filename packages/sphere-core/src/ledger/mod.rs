//! Account ledger module.
//!
//! Bookkeeping for the user's simulated accounts: cash, stock and option
//! positions, and the transaction log, with persistence and notifications.

mod book;
mod notify;
mod store;

pub use book::{AccountKind, Ledger};
pub use notify::{LogNotifier, Notification, NotificationSink, RecordingNotifier, Severity};
pub use store::{JsonFileStore, MemoryStore, PortfolioStore};
