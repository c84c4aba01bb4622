//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing and for replaying logs during verification.
//! It has the same semantics as SQLite but keeps everything in memory with
//! no persistence.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use permledger_core::{
    validate_link, Document, DocumentHash, EventId, LedgerEvent, LedgerState, LogHead, Principal,
    Role,
};

use crate::error::{Result, StoreError};
use crate::traits::{AppendResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Registry and role membership.
    state: LedgerState,

    /// The log; `events[i]` has seq `i + 1`.
    events: Vec<LedgerEvent>,

    /// Cached ids, parallel to `events`.
    ids: Vec<EventId>,
}

impl MemoryStoreInner {
    fn head(&self) -> Option<LogHead> {
        self.ids.last().map(|id| LogHead {
            seq: self.ids.len() as u64,
            event_id: *id,
        })
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn append(&self, event: &LedgerEvent) -> Result<AppendResult> {
        let mut inner = self.write()?;

        let event_id = event.compute_id();
        let head = inner.head();

        // Position already taken: same event is idempotent, different is a conflict
        if event.seq >= 1 && event.seq <= inner.events.len() as u64 {
            let existing = inner.ids[(event.seq - 1) as usize];
            return Ok(if existing == event_id {
                AppendResult::AlreadyExists(existing)
            } else {
                AppendResult::Conflict { existing }
            });
        }

        validate_link(event, head.as_ref())?;
        inner.state.apply(event)?;
        inner.events.push(event.clone());
        inner.ids.push(event_id);

        tracing::debug!(seq = event.seq, id = %event_id, "appended event (memory)");
        Ok(AppendResult::Appended(event_id))
    }

    fn head(&self) -> Result<Option<LogHead>> {
        Ok(self.read()?.head())
    }

    fn get_event(&self, seq: u64) -> Result<Option<LedgerEvent>> {
        let inner = self.read()?;
        if seq == 0 {
            return Ok(None);
        }
        Ok(inner.events.get((seq - 1) as usize).cloned())
    }

    fn events_range(&self, start: u64, end: u64) -> Result<Vec<LedgerEvent>> {
        let inner = self.read()?;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.seq >= start && e.seq <= end)
            .cloned()
            .collect())
    }

    fn events_for_document(&self, hash: &DocumentHash) -> Result<Vec<LedgerEvent>> {
        let inner = self.read()?;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.document() == hash)
            .cloned()
            .collect())
    }

    fn get_document(&self, hash: &DocumentHash) -> Result<Option<Document>> {
        Ok(self.read()?.state.get_document(hash).cloned())
    }

    fn documents_by_master(&self, master: &Principal) -> Result<Vec<DocumentHash>> {
        Ok(self.read()?.state.registry().documents_by(master))
    }

    fn is_member(&self, hash: &DocumentHash, role: Role, principal: &Principal) -> Result<bool> {
        Ok(self.read()?.state.is_member(hash, role, principal))
    }

    fn members(&self, hash: &DocumentHash, role: Role) -> Result<Vec<Principal>> {
        Ok(self.read()?.state.members(hash, role))
    }

    fn snapshot(&self) -> Result<LedgerState> {
        Ok(self.read()?.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use permledger_core::{EventBuilder, LedgerAction, StateError, ValidationError};

    fn master() -> Principal {
        Principal::from_bytes([0x01; 32])
    }

    fn doc() -> DocumentHash {
        DocumentHash::of(b"doc")
    }

    fn register(head: Option<&LogHead>) -> LedgerEvent {
        EventBuilder::new(master(), LedgerAction::Register { document: doc() })
            .after(head)
            .build()
    }

    fn grant_reader(head: Option<&LogHead>, who: u8) -> LedgerEvent {
        EventBuilder::new(
            master(),
            LedgerAction::Grant {
                document: doc(),
                role: Role::Reader,
                principal: Principal::from_bytes([who; 32]),
            },
        )
        .after(head)
        .build()
    }

    #[test]
    fn test_append_and_query() {
        let store = MemoryStore::new();
        let genesis = register(None);

        let result = store.append(&genesis).unwrap();
        assert_eq!(result, AppendResult::Appended(genesis.compute_id()));

        let head = store.head().unwrap().unwrap();
        store.append(&grant_reader(Some(&head), 0x03)).unwrap();

        assert!(store.exists(&doc()).unwrap());
        assert_eq!(store.master_of(&doc()).unwrap(), Some(master()));
        assert!(store
            .is_member(&doc(), Role::Reader, &Principal::from_bytes([0x03; 32]))
            .unwrap());
        assert_eq!(store.all_events().unwrap().len(), 2);
        assert_eq!(store.events_for_document(&doc()).unwrap().len(), 2);
        assert_eq!(store.get_event(2).unwrap().unwrap().seq, 2);
        assert_eq!(store.get_event(0).unwrap(), None);
    }

    #[test]
    fn test_idempotent_append() {
        let store = MemoryStore::new();
        let genesis = register(None);

        store.append(&genesis).unwrap();
        let again = store.append(&genesis).unwrap();
        assert_eq!(again, AppendResult::AlreadyExists(genesis.compute_id()));
    }

    #[test]
    fn test_conflict_detection() {
        let store = MemoryStore::new();
        let genesis = register(None);
        store.append(&genesis).unwrap();

        let other = EventBuilder::new(master(), LedgerAction::Register { document: doc() })
            .timestamp(99)
            .build();
        let result = store.append(&other).unwrap();
        assert_eq!(
            result,
            AppendResult::Conflict {
                existing: genesis.compute_id()
            }
        );
    }

    #[test]
    fn test_rejects_gap() {
        let store = MemoryStore::new();
        let event = grant_reader(None, 0x03);
        let gapped = EventBuilder::new(master(), event.action)
            .seq(2)
            .prev(EventId::ZERO)
            .build();

        assert!(matches!(
            store.append(&gapped),
            Err(StoreError::Validation(ValidationError::InvalidSequence { .. }))
        ));
        assert_eq!(store.head().unwrap(), None);
    }

    #[test]
    fn test_illegal_effect_leaves_store_unchanged() {
        let store = MemoryStore::new();
        let event = grant_reader(None, 0x03);

        assert!(matches!(
            store.append(&event),
            Err(StoreError::InvalidEvent(StateError::DocumentNotFound(_)))
        ));
        assert!(store.all_events().unwrap().is_empty());
        assert_eq!(store.snapshot().unwrap(), LedgerState::new());
    }

    #[test]
    fn test_rejects_caller_without_authority() {
        let store = MemoryStore::new();
        store.append(&register(None)).unwrap();
        let head = store.head().unwrap();

        let reader = Principal::from_bytes([0x03; 32]);
        let self_grant = EventBuilder::new(
            reader,
            LedgerAction::Grant {
                document: doc(),
                role: Role::Reader,
                principal: reader,
            },
        )
        .after(head.as_ref())
        .build();

        assert!(matches!(
            store.append(&self_grant),
            Err(StoreError::InvalidEvent(StateError::Unauthorized { caller, .. }))
                if caller == reader
        ));
        assert_eq!(store.head().unwrap(), head);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;
        use proptest::prelude::prop;
        use std::collections::BTreeSet;

        proptest! {
            #[test]
            fn duplicate_grants_never_reach_the_log(whos in prop::collection::vec(2u8..=255, 0..24)) {
                let store = MemoryStore::new();
                store.append(&register(None)).unwrap();

                let mut granted = BTreeSet::new();
                for who in whos {
                    let head = store.head().unwrap();
                    let result = store.append(&grant_reader(head.as_ref(), who));
                    if granted.insert(who) {
                        prop_assert!(matches!(result, Ok(AppendResult::Appended(_))));
                    } else {
                        let ineffective = matches!(
                            result,
                            Err(StoreError::InvalidEvent(StateError::Ineffective { .. }))
                        );
                        prop_assert!(ineffective);
                    }
                }

                let head = store.head().unwrap().unwrap();
                prop_assert_eq!(head.seq, 1 + granted.len() as u64);
                let members: BTreeSet<Principal> = store.members(&doc(), Role::Reader).unwrap().into_iter().collect();
                let expected: BTreeSet<Principal> = granted.iter().map(|w| Principal::from_bytes([*w; 32])).collect();
                prop_assert_eq!(members, expected);

                for event in store.all_events().unwrap() {
                    let replayed = matches!(store.append(&event), Ok(AppendResult::AlreadyExists(_)));
                    prop_assert!(replayed);
                }
            }
        }
    }
}
