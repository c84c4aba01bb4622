//! Proptest generators for property-based testing.
//!
//! Operations draw their principals and documents from a small fixed
//! universe so that generated sequences collide often: the same document is
//! registered twice, owners are delegated and then act, removals hit members.

use proptest::prelude::*;

use permledger::{MutationOutcome, PermissionError, PermissionManager};
use permledger_core::{DocumentHash, EventBuilder, LedgerAction, LedgerEvent, Principal, Role};
use permledger_store::Store;

use crate::fixtures::principal;

/// Number of principals in the standard universe.
pub const PRINCIPALS: u8 = 5;

/// Number of documents in the standard universe.
pub const DOCUMENTS: u8 = 3;

/// The principals and documents operations refer to by index.
#[derive(Debug, Clone)]
pub struct Universe {
    pub principals: Vec<Principal>,
    pub documents: Vec<DocumentHash>,
}

impl Universe {
    /// `PRINCIPALS` seed-derived principals and `DOCUMENTS` content hashes.
    pub fn standard() -> Self {
        Self {
            principals: (1..=PRINCIPALS).map(principal).collect(),
            documents: (0..DOCUMENTS)
                .map(|i| DocumentHash::of(format!("document-{}", i).as_bytes()))
                .collect(),
        }
    }

    pub fn principal(&self, index: u8) -> Principal {
        self.principals[index as usize % self.principals.len()]
    }

    pub fn document(&self, index: u8) -> DocumentHash {
        self.documents[index as usize % self.documents.len()]
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classified result of one facade call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observed {
    Registered,
    Applied,
    Unchanged,
    AlreadyExists,
    DocumentNotFound,
    Unauthorized,
    TargetIsMaster,
}

impl Observed {
    /// Whether the call changed state.
    pub fn is_change(&self) -> bool {
        matches!(self, Observed::Registered | Observed::Applied)
    }
}

/// One generated facade call. Fields are indices into a [`Universe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    NewDocument {
        caller: u8,
        document: u8,
    },
    Delegate {
        caller: u8,
        role: Role,
        target: u8,
        document: u8,
    },
    Remove {
        caller: u8,
        role: Role,
        target: u8,
        document: u8,
    },
}

impl Op {
    /// Run this operation against `manager`.
    ///
    /// Refusals the facade is expected to produce are classified into
    /// [`Observed`]; anything else (storage failures) is returned as an error.
    pub fn run<S: Store>(
        &self,
        manager: &PermissionManager<S>,
        universe: &Universe,
    ) -> Result<Observed, PermissionError> {
        let result = match *self {
            Op::NewDocument { caller, document } => manager
                .new_document(&universe.principal(caller), &universe.document(document))
                .map(|_| Observed::Registered),
            Op::Delegate {
                caller,
                role,
                target,
                document,
            } => manager
                .delegate(
                    &universe.principal(caller),
                    role,
                    &universe.principal(target),
                    &universe.document(document),
                )
                .map(classify),
            Op::Remove {
                caller,
                role,
                target,
                document,
            } => manager
                .remove(
                    &universe.principal(caller),
                    role,
                    &universe.principal(target),
                    &universe.document(document),
                )
                .map(classify),
        };

        match result {
            Ok(observed) => Ok(observed),
            Err(PermissionError::AlreadyExists(_)) => Ok(Observed::AlreadyExists),
            Err(PermissionError::DocumentNotFound(_)) => Ok(Observed::DocumentNotFound),
            Err(PermissionError::Unauthorized { .. }) => Ok(Observed::Unauthorized),
            Err(PermissionError::TargetIsMaster { .. }) => Ok(Observed::TargetIsMaster),
            Err(e) => Err(e),
        }
    }
}

fn classify(outcome: MutationOutcome) -> Observed {
    match outcome {
        MutationOutcome::Applied(_) => Observed::Applied,
        MutationOutcome::Unchanged => Observed::Unchanged,
    }
}

/// Generate a Role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Owner), Just(Role::Writer), Just(Role::Reader)]
}

/// Generate an arbitrary principal (outside the standard universe).
pub fn any_principal() -> impl Strategy<Value = Principal> {
    any::<[u8; 32]>().prop_map(Principal::from_bytes)
}

/// Generate an arbitrary document hash.
pub fn document_hash() -> impl Strategy<Value = DocumentHash> {
    any::<[u8; 32]>().prop_map(DocumentHash::from_bytes)
}

/// Generate one operation over the standard universe.
///
/// Registrations are rarer than role changes so sequences spend most of
/// their length mutating membership.
pub fn op() -> impl Strategy<Value = Op> {
    let idx = || 0..PRINCIPALS;
    let doc = || 0..DOCUMENTS;
    prop_oneof![
        1 => (idx(), doc()).prop_map(|(caller, document)| Op::NewDocument { caller, document }),
        4 => (idx(), role(), idx(), doc()).prop_map(|(caller, role, target, document)| {
            Op::Delegate { caller, role, target, document }
        }),
        3 => (idx(), role(), idx(), doc()).prop_map(|(caller, role, target, document)| {
            Op::Remove { caller, role, target, document }
        }),
    ]
}

/// Generate a sequence of operations.
pub fn ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 0..=max_len)
}

/// Generate a timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate a single well-formed event (not chained to anything).
pub fn ledger_event() -> impl Strategy<Value = LedgerEvent> {
    let action = prop_oneof![
        document_hash().prop_map(|document| LedgerAction::Register { document }),
        (document_hash(), role(), any_principal()).prop_map(|(document, role, principal)| {
            LedgerAction::Grant {
                document,
                role,
                principal,
            }
        }),
        (document_hash(), role(), any_principal()).prop_map(|(document, role, principal)| {
            LedgerAction::Revoke {
                document,
                role,
                principal,
            }
        }),
    ];
    (any_principal(), action, 1u64..1_000_000, any::<[u8; 32]>(), timestamp()).prop_map(
        |(caller, action, seq, prev, timestamp)| {
            let mut builder = EventBuilder::new(caller, action).seq(seq).timestamp(timestamp);
            if seq > 1 {
                builder = builder.prev(permledger_core::EventId::from_bytes(prev));
            }
            builder.build()
        },
    )
}
