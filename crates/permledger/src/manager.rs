//! The permission manager: public entry points for document registration and
//! role management.
//!
//! Every mutating call runs under one write lock, so calls are applied in a
//! single total order. A call first checks existence and authorization, then
//! builds the next ledger event and hands it to the store, which appends the
//! event and applies its effect atomically. A failing call changes nothing.

use std::sync::{Mutex, MutexGuard};

use permledger_core::{
    Document, DocumentHash, EventBuilder, EventId, LedgerAction, LedgerEvent, LedgerState,
    LogHead, Principal, Role, StateError, ValidationError,
};
use permledger_store::{AppendResult, MemoryStore, Store, StoreError, StoreExt};
use serde::Serialize;

use crate::error::{PermissionError, Result};
use crate::gate::{authorize, Action, RoleChange};

/// Configuration for the permission manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Replay and verify the whole log when opening over an existing store.
    pub verify_on_open: bool,
    /// Log idempotent no-ops at info level instead of debug.
    ///
    /// No-ops never append events either way.
    pub record_unchanged: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            verify_on_open: true,
            record_unchanged: false,
        }
    }
}

/// Outcome of a delegate or remove call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MutationOutcome {
    /// Membership changed; the change was recorded as this event.
    Applied(EventId),
    /// The principal already was (or already was not) a member.
    Unchanged,
}

impl MutationOutcome {
    /// Whether membership changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }

    /// The recorded event, if any.
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            MutationOutcome::Applied(id) => Some(*id),
            MutationOutcome::Unchanged => None,
        }
    }
}

/// Summary of a successful [`PermissionManager::verify_ledger`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Number of events replayed.
    pub events: u64,
    /// Head of the verified log.
    pub head: Option<LogHead>,
    /// Registered documents.
    pub documents: usize,
    /// Role assignments.
    pub assignments: usize,
}

/// One event in audit-export form: identifiers as full hex strings.
#[derive(Debug, Clone, Serialize)]
struct HistoryEntry {
    seq: u64,
    event_id: String,
    prev_event_id: Option<String>,
    caller: String,
    timestamp: i64,
    action: &'static str,
    document: String,
    role: Option<String>,
    principal: Option<String>,
}

impl From<&LedgerEvent> for HistoryEntry {
    fn from(event: &LedgerEvent) -> Self {
        let action = match event.action {
            LedgerAction::Register { .. } => "register",
            LedgerAction::Grant { .. } => "grant",
            LedgerAction::Revoke { .. } => "revoke",
        };
        Self {
            seq: event.seq,
            event_id: event.compute_id().to_hex(),
            prev_event_id: event.prev_event_id.map(|id| id.to_hex()),
            caller: event.caller.to_hex(),
            timestamp: event.timestamp,
            action,
            document: event.document().to_hex(),
            role: event.action.role().map(|r| r.to_string()),
            principal: event.action.principal().map(|p| p.to_hex()),
        }
    }
}

/// The permission manager.
///
/// Provides:
/// - Document registration (the caller becomes the master)
/// - Delegation and removal of Owner, Writer and Reader roles
/// - Unrestricted read queries
/// - Audit history and full-ledger verification
pub struct PermissionManager<S: Store> {
    /// The storage backend.
    store: S,
    /// Configuration.
    config: ManagerConfig,
    /// Serializes every mutating call.
    write_lock: Mutex<()>,
}

impl<S: Store> PermissionManager<S> {
    /// Create a manager over `store` without verifying existing contents.
    pub fn new(store: S, config: ManagerConfig) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Create a manager over `store`, verifying the existing log first if
    /// `verify_on_open` is set.
    pub fn open(store: S, config: ManagerConfig) -> Result<Self> {
        let manager = Self::new(store, config);
        if manager.config.verify_on_open {
            let report = manager.verify_ledger()?;
            tracing::info!(
                events = report.events,
                documents = report.documents,
                "opened verified ledger"
            );
        }
        Ok(manager)
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()).into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutating Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `hash` with `caller` as its master.
    ///
    /// Fails with `AlreadyExists` if the hash is registered, whoever owns it.
    pub fn new_document(&self, caller: &Principal, hash: &DocumentHash) -> Result<EventId> {
        let _guard = self.lock()?;

        if self.store.exists(hash)? {
            tracing::warn!(%caller, document = %hash, "document already exists");
            return Err(PermissionError::AlreadyExists(*hash));
        }

        let event_id = self.commit(caller, LedgerAction::Register { document: *hash })?;
        tracing::info!(master = %caller, document = %hash, id = %event_id, "registered document");
        Ok(event_id)
    }

    /// Add `principal` to `role` on `hash`.
    pub fn delegate(
        &self,
        caller: &Principal,
        role: Role,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.change_role(caller, Action::delegate(role), principal, hash)
    }

    /// Remove `principal` from `role` on `hash`.
    pub fn remove(
        &self,
        caller: &Principal,
        role: Role,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.change_role(caller, Action::remove(role), principal, hash)
    }

    pub fn delegate_permanent_owner(
        &self,
        caller: &Principal,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.delegate(caller, Role::Owner, principal, hash)
    }

    pub fn remove_permanent_owner(
        &self,
        caller: &Principal,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.remove(caller, Role::Owner, principal, hash)
    }

    pub fn delegate_permanent_write(
        &self,
        caller: &Principal,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.delegate(caller, Role::Writer, principal, hash)
    }

    pub fn remove_permanent_write(
        &self,
        caller: &Principal,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.remove(caller, Role::Writer, principal, hash)
    }

    pub fn delegate_permanent_read(
        &self,
        caller: &Principal,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.delegate(caller, Role::Reader, principal, hash)
    }

    pub fn remove_permanent_read(
        &self,
        caller: &Principal,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        self.remove(caller, Role::Reader, principal, hash)
    }

    /// The single implementation behind every delegate and remove call.
    fn change_role(
        &self,
        caller: &Principal,
        action: Action,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<MutationOutcome> {
        let _guard = self.lock()?;

        let authority = match authorize(&self.store, caller, hash, action) {
            Ok(authority) => authority,
            Err(e) => {
                tracing::warn!(
                    %caller,
                    document = %hash,
                    %action,
                    error = %e,
                    "role change denied"
                );
                return Err(e);
            }
        };

        if self.store.master_of(hash)? == Some(*principal) {
            tracing::warn!(%caller, document = %hash, %action, "target is the master");
            return Err(PermissionError::TargetIsMaster { document: *hash });
        }

        let role = action.role;
        let is_member = self.store.is_member(hash, role, principal)?;
        let ledger_action = match (action.change, is_member) {
            (RoleChange::Delegate, false) => LedgerAction::Grant {
                document: *hash,
                role,
                principal: *principal,
            },
            (RoleChange::Remove, true) => LedgerAction::Revoke {
                document: *hash,
                role,
                principal: *principal,
            },
            _ => {
                self.log_unchanged(caller, action, principal, hash);
                return Ok(MutationOutcome::Unchanged);
            }
        };

        let event_id = match self.commit(caller, ledger_action) {
            Ok(id) => id,
            // Another handle on the same store made the same change first.
            Err(PermissionError::Store(StoreError::InvalidEvent(StateError::Ineffective {
                ..
            }))) => {
                self.log_unchanged(caller, action, principal, hash);
                return Ok(MutationOutcome::Unchanged);
            }
            Err(e) => {
                tracing::warn!(
                    %caller,
                    document = %hash,
                    %action,
                    error = %e,
                    "role change refused"
                );
                return Err(e);
            }
        };

        tracing::info!(
            %caller,
            authority = ?authority,
            document = %hash,
            %action,
            member = %principal,
            id = %event_id,
            "role changed"
        );
        Ok(MutationOutcome::Applied(event_id))
    }

    fn log_unchanged(
        &self,
        caller: &Principal,
        action: Action,
        principal: &Principal,
        hash: &DocumentHash,
    ) {
        if self.config.record_unchanged {
            tracing::info!(%caller, document = %hash, %action, member = %principal, "no change");
        } else {
            tracing::debug!(%caller, document = %hash, %action, member = %principal, "no change");
        }
    }

    /// Build the next event for `action` and append it. Caller holds the lock.
    ///
    /// The store re-checks the event against its own state, so a decision made
    /// on rows another handle has since changed is refused here.
    fn commit(&self, caller: &Principal, action: LedgerAction) -> Result<EventId> {
        let head = self.store.head()?;
        let event = EventBuilder::new(*caller, action)
            .after(head.as_ref())
            .timestamp(now_millis())
            .build();

        let result = match self.store.append(&event) {
            Ok(result) => result,
            Err(StoreError::InvalidEvent(e)) => return Err(refused(e)),
            Err(e) => return Err(e.into()),
        };
        match result {
            AppendResult::Appended(id) | AppendResult::AlreadyExists(id) => Ok(id),
            AppendResult::Conflict { existing } => Err(PermissionError::Conflict {
                seq: event.seq,
                existing,
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `hash` is registered.
    pub fn exists(&self, hash: &DocumentHash) -> Result<bool> {
        Ok(self.store.exists(hash)?)
    }

    /// The master of `hash`, if registered.
    pub fn master_of(&self, hash: &DocumentHash) -> Result<Option<Principal>> {
        Ok(self.store.master_of(hash)?)
    }

    /// The full document record.
    pub fn document(&self, hash: &DocumentHash) -> Result<Option<Document>> {
        Ok(self.store.get_document(hash)?)
    }

    /// Whether `principal` holds `role` on `hash`. The master holds no role.
    pub fn is_member(
        &self,
        role: Role,
        principal: &Principal,
        hash: &DocumentHash,
    ) -> Result<bool> {
        Ok(self.store.is_member(hash, role, principal)?)
    }

    pub fn is_owner(&self, principal: &Principal, hash: &DocumentHash) -> Result<bool> {
        self.is_member(Role::Owner, principal, hash)
    }

    pub fn is_writer(&self, principal: &Principal, hash: &DocumentHash) -> Result<bool> {
        self.is_member(Role::Writer, principal, hash)
    }

    pub fn is_reader(&self, principal: &Principal, hash: &DocumentHash) -> Result<bool> {
        self.is_member(Role::Reader, principal, hash)
    }

    pub fn owners_of(&self, hash: &DocumentHash) -> Result<Vec<Principal>> {
        Ok(self.store.members(hash, Role::Owner)?)
    }

    pub fn writers_of(&self, hash: &DocumentHash) -> Result<Vec<Principal>> {
        Ok(self.store.members(hash, Role::Writer)?)
    }

    pub fn readers_of(&self, hash: &DocumentHash) -> Result<Vec<Principal>> {
        Ok(self.store.members(hash, Role::Reader)?)
    }

    /// Documents registered by `master`, in hash order.
    pub fn documents_of(&self, master: &Principal) -> Result<Vec<DocumentHash>> {
        Ok(self.store.documents_by_master(master)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Position of the newest event.
    pub fn head(&self) -> Result<Option<LogHead>> {
        Ok(self.store.head()?)
    }

    /// Every event touching `hash`, in ledger order.
    pub fn history(&self, hash: &DocumentHash) -> Result<Vec<LedgerEvent>> {
        Ok(self.store.events_for_document(hash)?)
    }

    /// Events with `start <= seq <= end`.
    pub fn events(&self, start: u64, end: u64) -> Result<Vec<LedgerEvent>> {
        Ok(self.store.events_range(start, end)?)
    }

    /// Export history as pretty-printed JSON: one document's, or the whole
    /// ledger's when `hash` is None.
    pub fn export_history_json(&self, hash: Option<&DocumentHash>) -> Result<String> {
        let events = match hash {
            Some(hash) => self.store.events_for_document(hash)?,
            None => self.store.all_events()?,
        };
        let entries: Vec<HistoryEntry> = events.iter().map(HistoryEntry::from).collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Replay the whole log and check it against the stored snapshot.
    ///
    /// Checks, for every event: sequence contiguity, the link to its
    /// predecessor, that its effect was legal and non-empty, and that its
    /// caller was authorized under the state replayed so far. Then checks
    /// that the replayed head and snapshot equal the stored ones.
    pub fn verify_ledger(&self) -> Result<VerificationReport> {
        let _guard = self.lock()?;

        match self.replay_and_compare() {
            Ok(report) => {
                tracing::debug!(events = report.events, "ledger verified");
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ledger verification failed");
                Err(e)
            }
        }
    }

    fn replay_and_compare(&self) -> Result<VerificationReport> {
        let events = self.store.all_events()?;
        let replay = MemoryStore::new();

        for event in &events {
            let change = match event.action {
                LedgerAction::Register { .. } => None,
                LedgerAction::Grant { role, .. } => Some(Action::delegate(role)),
                LedgerAction::Revoke { role, .. } => Some(Action::remove(role)),
            };
            if let Some(action) = change {
                match authorize(&replay, &event.caller, event.document(), action) {
                    Ok(_) => {}
                    Err(PermissionError::DocumentNotFound(document)) => {
                        return Err(ValidationError::IllegalTransition {
                            seq: event.seq,
                            source: StateError::DocumentNotFound(document),
                        }
                        .into());
                    }
                    Err(PermissionError::Unauthorized { caller, document }) => {
                        return Err(ValidationError::UnauthorizedEvent {
                            seq: event.seq,
                            caller,
                            document,
                        }
                        .into());
                    }
                    Err(e) => return Err(e),
                }
            }

            match replay.append(event) {
                Ok(AppendResult::Appended(_)) => {}
                Ok(other) => {
                    return Err(ValidationError::StructuralError(format!(
                        "event at seq {} replayed as {:?}",
                        event.seq, other
                    ))
                    .into());
                }
                Err(StoreError::Validation(e)) => return Err(e.into()),
                Err(StoreError::InvalidEvent(StateError::Unauthorized { caller, document })) => {
                    return Err(ValidationError::UnauthorizedEvent {
                        seq: event.seq,
                        caller,
                        document,
                    }
                    .into());
                }
                Err(StoreError::InvalidEvent(source)) => {
                    return Err(ValidationError::IllegalTransition {
                        seq: event.seq,
                        source,
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let replayed_head = replay.head()?;
        let stored_head = self.store.head()?;
        if replayed_head != stored_head {
            return Err(ValidationError::HeadMismatch {
                expected: replayed_head.map(|h| h.event_id),
                got: stored_head.map(|h| h.event_id),
            }
            .into());
        }

        let replayed = replay.snapshot()?;
        let stored = self.store.snapshot()?;
        if replayed != stored {
            let difference = describe_difference(&stored, &replayed);
            return Err(ValidationError::SnapshotMismatch(difference).into());
        }

        Ok(VerificationReport {
            events: events.len() as u64,
            head: replayed_head,
            documents: replayed.registry().len(),
            assignments: replayed.roles().len(),
        })
    }
}

/// Translate a store's refusal into the error a caller would have seen had
/// the manager's own checks caught it.
fn refused(error: StateError) -> PermissionError {
    match error {
        StateError::AlreadyExists(document) => PermissionError::AlreadyExists(document),
        StateError::DocumentNotFound(document) => PermissionError::DocumentNotFound(document),
        StateError::Unauthorized { caller, document } => {
            PermissionError::Unauthorized { caller, document }
        }
        StateError::MasterIsStructural { document, .. } => {
            PermissionError::TargetIsMaster { document }
        }
        other => PermissionError::Store(StoreError::InvalidEvent(other)),
    }
}

/// Name the first difference between a stored and a replayed snapshot.
fn describe_difference(stored: &LedgerState, replayed: &LedgerState) -> String {
    for document in replayed.registry().iter() {
        match stored.get_document(&document.hash) {
            None => return format!("document {} missing from store", document.hash),
            Some(found) if found != document => {
                return format!("document {} differs from its registration", document.hash)
            }
            Some(_) => {}
        }
    }
    for document in stored.registry().iter() {
        if !replayed.exists(&document.hash) {
            return format!("document {} has no registration event", document.hash);
        }
    }

    let stored_roles = stored.assignments();
    let replayed_roles = replayed.assignments();
    if let Some(a) = replayed_roles.iter().find(|a| !stored_roles.contains(a)) {
        return format!(
            "{} {} on {} missing from store",
            a.role, a.principal, a.document
        );
    }
    if let Some(a) = stored_roles.iter().find(|a| !replayed_roles.contains(a)) {
        return format!(
            "{} {} on {} was never granted",
            a.role, a.principal, a.document
        );
    }
    "snapshots differ".to_string()
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
