//! Store trait: the abstract interface for ledger persistence.
//!
//! This trait allows the permission manager to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use permledger_core::{
    Document, DocumentHash, EventId, LedgerEvent, LedgerState, LogHead, Principal, Role,
};

use crate::error::Result;

/// Result of appending an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// Event was appended and its effect applied.
    Appended(EventId),
    /// The exact same event is already in the log (idempotent - not an error).
    AlreadyExists(EventId),
    /// Conflict: a different event exists at the same position.
    Conflict {
        /// The existing event ID at this position.
        existing: EventId,
    },
}

/// The Store trait: synchronous interface for ledger persistence.
///
/// A store holds three things: the event log, the document registry and the
/// role membership sets. The last two are a cache of the first and are only
/// ever changed by [`Store::append`].
///
/// # Design Notes
///
/// - **Atomic append**: `append` checks the chain link and the event's
///   effect, then writes the event and applies the effect as one unit. On
///   any error nothing is written.
/// - **Idempotent appends**: Appending an event already in the log returns
///   `AlreadyExists`.
/// - **Conflict detection**: Appending a different event at an occupied
///   position returns `Conflict` with the existing event ID.
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Log Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an event to the log and apply its effect.
    ///
    /// # Returns
    /// - `Appended` if the event was new and legal.
    /// - `AlreadyExists` if the exact same event is already in the log.
    /// - `Conflict` if a different event exists at the same position.
    ///
    /// Fails with `Validation` if the event does not link onto the head, and
    /// with `InvalidEvent` if its caller lacks authority, or its effect is
    /// illegal or changes nothing. All of this is judged atomically with the
    /// write.
    fn append(&self, event: &LedgerEvent) -> Result<AppendResult>;

    /// The newest event's position, or None for an empty log.
    fn head(&self) -> Result<Option<LogHead>>;

    /// Get the event at `seq`.
    fn get_event(&self, seq: u64) -> Result<Option<LedgerEvent>>;

    /// Get a range of events.
    ///
    /// Returns events with `start <= seq <= end`, ordered by seq.
    fn events_range(&self, start: u64, end: u64) -> Result<Vec<LedgerEvent>>;

    /// All events touching `hash`, ordered by seq.
    fn events_for_document(&self, hash: &DocumentHash) -> Result<Vec<LedgerEvent>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a registered document.
    fn get_document(&self, hash: &DocumentHash) -> Result<Option<Document>>;

    /// Hashes of all documents mastered by `master`, in hash order.
    fn documents_by_master(&self, master: &Principal) -> Result<Vec<DocumentHash>>;

    /// Whether `principal` holds `role` on `hash`.
    fn is_member(&self, hash: &DocumentHash, role: Role, principal: &Principal) -> Result<bool>;

    /// Members of `role` on `hash`, in principal order.
    fn members(&self, hash: &DocumentHash, role: Role) -> Result<Vec<Principal>>;

    /// The full registry and role snapshot.
    fn snapshot(&self) -> Result<LedgerState>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Whether `hash` is registered.
    fn exists(&self, hash: &DocumentHash) -> Result<bool> {
        Ok(self.get_document(hash)?.is_some())
    }

    /// The master of `hash`, if registered.
    fn master_of(&self, hash: &DocumentHash) -> Result<Option<Principal>> {
        Ok(self.get_document(hash)?.map(|d| d.master))
    }

    /// Every event in the log, ordered by seq.
    fn all_events(&self) -> Result<Vec<LedgerEvent>> {
        match self.head()? {
            Some(head) => self.events_range(1, head.seq),
            None => Ok(Vec::new()),
        }
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
