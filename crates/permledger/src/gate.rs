//! Authorization gate: the single predicate every role mutation passes.
//!
//! | Condition                 | Outcome            |
//! |---------------------------|--------------------|
//! | document does not exist   | `DocumentNotFound` |
//! | caller is the master      | permit             |
//! | caller is an Owner        | permit             |
//! | otherwise                 | `Unauthorized`     |
//!
//! The rule is the same for every role and for both delegation and removal.

use std::fmt;

use permledger_core::{DocumentHash, Principal, Role};
use permledger_store::Store;
use serde::{Deserialize, Serialize};

use crate::error::{PermissionError, Result};

/// Direction of a role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleChange {
    Delegate,
    Remove,
}

/// A requested role mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub change: RoleChange,
    pub role: Role,
}

impl Action {
    pub fn delegate(role: Role) -> Self {
        Self {
            change: RoleChange::Delegate,
            role,
        }
    }

    pub fn remove(role: Role) -> Self {
        Self {
            change: RoleChange::Remove,
            role,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.change {
            RoleChange::Delegate => write!(f, "delegate {}", self.role),
            RoleChange::Remove => write!(f, "remove {}", self.role),
        }
    }
}

/// Why a caller was permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authority {
    /// The caller registered the document.
    Master,
    /// The caller holds the Owner role on the document.
    Owner,
}

/// Decide whether `caller` may perform `action` on `document`.
///
/// The outcome does not depend on `action`: masters and owners may delegate
/// and remove every role.
pub fn authorize<S: Store + ?Sized>(
    store: &S,
    caller: &Principal,
    document: &DocumentHash,
    action: Action,
) -> Result<Authority> {
    tracing::trace!(%caller, %document, %action, "authorizing");

    let record = store
        .get_document(document)?
        .ok_or(PermissionError::DocumentNotFound(*document))?;

    if record.master == *caller {
        return Ok(Authority::Master);
    }

    for role in Role::ALL.into_iter().filter(|r| r.can_administer()) {
        if store.is_member(document, role, caller)? {
            return Ok(Authority::Owner);
        }
    }

    Err(PermissionError::Unauthorized {
        caller: *caller,
        document: *document,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use permledger_core::{EventBuilder, LedgerAction};
    use permledger_store::{MemoryStore, StoreExt};

    fn master() -> Principal {
        Principal::from_bytes([0x01; 32])
    }

    fn owner() -> Principal {
        Principal::from_bytes([0x02; 32])
    }

    fn doc() -> DocumentHash {
        DocumentHash::of(b"doc")
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let actions = [
            LedgerAction::Register { document: doc() },
            LedgerAction::Grant {
                document: doc(),
                role: Role::Owner,
                principal: owner(),
            },
            LedgerAction::Grant {
                document: doc(),
                role: Role::Writer,
                principal: Principal::from_bytes([0x03; 32]),
            },
        ];
        for action in actions {
            let head = store.head().unwrap();
            let event = EventBuilder::new(master(), action)
                .after(head.as_ref())
                .build();
            store.append(&event).unwrap();
        }
        store
    }

    #[test]
    fn test_missing_document() {
        let store = MemoryStore::new();
        let err = authorize(&store, &master(), &doc(), Action::delegate(Role::Reader)).unwrap_err();
        assert!(matches!(err, PermissionError::DocumentNotFound(d) if d == doc()));
    }

    #[test]
    fn test_master_and_owner_permitted() {
        let store = seeded_store();
        for role in Role::ALL {
            for action in [Action::delegate(role), Action::remove(role)] {
                assert_eq!(
                    authorize(&store, &master(), &doc(), action).unwrap(),
                    Authority::Master
                );
                assert_eq!(
                    authorize(&store, &owner(), &doc(), action).unwrap(),
                    Authority::Owner
                );
            }
        }
    }

    #[test]
    fn test_writer_and_stranger_denied() {
        let store = seeded_store();
        let writer = Principal::from_bytes([0x03; 32]);
        let stranger = Principal::from_bytes([0x09; 32]);

        for caller in [writer, stranger] {
            let err =
                authorize(&store, &caller, &doc(), Action::delegate(Role::Reader)).unwrap_err();
            assert!(matches!(err, PermissionError::Unauthorized { .. }));
        }
        assert!(store.exists(&doc()).unwrap());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::delegate(Role::Owner).to_string(), "delegate owner");
        assert_eq!(Action::remove(Role::Reader).to_string(), "remove reader");
    }
}
