//! Embedded persistence for the voice platform
//!
//! One SQLite database holds everything that must survive a restart:
//! sealed call records, the blacklist, the whitelist and the rolling
//! failed-unlock history. The schema evolves by additive column migration
//! at startup; no destructive change is ever applied automatically.
//!
//! The auto-promotion rule lives here: every recorded unlock failure
//! counts the caller's failures inside a 12 h window, and the third one
//! inserts a blacklist entry. Removing a number from the blacklist also
//! deletes its failure history so the next call starts clean.

mod error;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use store::{AccessStore, AUTO_BLACKLIST_REASON, AUTO_BLACKLIST_THRESHOLD};
pub use types::{BlacklistEntry, CallRecord, FailedUnlock, TranscriptLine, WhitelistEntry};
