//! A reference model of the permission rules.
//!
//! Plain maps, no log and no storage. Property tests run the same operation
//! sequence through the model and a real manager and require identical
//! outcomes and identical final state.

use std::collections::{BTreeMap, BTreeSet};

use permledger_core::{DocumentHash, LedgerState, Principal, Role};

use crate::generators::{Observed, Op, Universe};

/// Expected state of the ledger after a sequence of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    masters: BTreeMap<DocumentHash, Principal>,
    roles: BTreeSet<(DocumentHash, Role, Principal)>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn master_of(&self, document: &DocumentHash) -> Option<Principal> {
        self.masters.get(document).copied()
    }

    pub fn is_member(&self, document: &DocumentHash, role: Role, principal: &Principal) -> bool {
        self.roles.contains(&(*document, role, *principal))
    }

    /// Number of role assignments.
    pub fn assignments(&self) -> usize {
        self.roles.len()
    }

    /// Predict and apply one operation.
    pub fn apply(&mut self, op: &Op, universe: &Universe) -> Observed {
        match *op {
            Op::NewDocument { caller, document } => {
                let document = universe.document(document);
                if self.masters.contains_key(&document) {
                    return Observed::AlreadyExists;
                }
                self.masters.insert(document, universe.principal(caller));
                Observed::Registered
            }
            Op::Delegate {
                caller,
                role,
                target,
                document,
            } => self.change(universe, caller, role, target, document, true),
            Op::Remove {
                caller,
                role,
                target,
                document,
            } => self.change(universe, caller, role, target, document, false),
        }
    }

    fn change(
        &mut self,
        universe: &Universe,
        caller: u8,
        role: Role,
        target: u8,
        document: u8,
        granting: bool,
    ) -> Observed {
        let caller = universe.principal(caller);
        let target = universe.principal(target);
        let document = universe.document(document);

        let Some(master) = self.master_of(&document) else {
            return Observed::DocumentNotFound;
        };
        if caller != master && !self.is_member(&document, Role::Owner, &caller) {
            return Observed::Unauthorized;
        }
        if target == master {
            return Observed::TargetIsMaster;
        }

        let key = (document, role, target);
        let changed = if granting {
            self.roles.insert(key)
        } else {
            self.roles.remove(&key)
        };
        if changed {
            Observed::Applied
        } else {
            Observed::Unchanged
        }
    }

    /// Whether a replayed ledger state holds exactly what the model predicts.
    pub fn matches(&self, state: &LedgerState) -> bool {
        let masters: BTreeMap<DocumentHash, Principal> = state
            .registry()
            .iter()
            .map(|doc| (doc.hash, doc.master))
            .collect();
        let roles: BTreeSet<(DocumentHash, Role, Principal)> = state
            .assignments()
            .into_iter()
            .map(|a| (a.document, a.role, a.principal))
            .collect();
        masters == self.masters && roles == self.roles
    }
}
