//! Role store: per-document membership sets for owners, writers and readers.
//!
//! Membership is a set keyed by (document, role, principal). Granting an
//! existing member and revoking an absent one are both no-ops; the return
//! value says whether membership actually changed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::role::Role;
use crate::types::{DocumentHash, Principal};

/// A single membership triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub document: DocumentHash,
    pub role: Role,
    pub principal: Principal,
}

/// In-memory role membership sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleStore {
    members: BTreeMap<(DocumentHash, Role), BTreeSet<Principal>>,
}

impl RoleStore {
    /// Create an empty role store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `principal` to `role` on `hash`. Returns true if newly added.
    pub fn grant(&mut self, hash: DocumentHash, role: Role, principal: Principal) -> bool {
        self.members.entry((hash, role)).or_default().insert(principal)
    }

    /// Remove `principal` from `role` on `hash`. Returns true if it was a member.
    pub fn revoke(&mut self, hash: &DocumentHash, role: Role, principal: &Principal) -> bool {
        let key = (*hash, role);
        let Some(set) = self.members.get_mut(&key) else {
            return false;
        };
        let removed = set.remove(principal);
        if set.is_empty() {
            // Empty sets are dropped so equal memberships compare equal.
            self.members.remove(&key);
        }
        removed
    }

    /// Whether `principal` holds `role` on `hash`.
    pub fn is_member(&self, hash: &DocumentHash, role: Role, principal: &Principal) -> bool {
        self.members
            .get(&(*hash, role))
            .map(|set| set.contains(principal))
            .unwrap_or(false)
    }

    /// Members of `role` on `hash`, in principal order.
    pub fn members(&self, hash: &DocumentHash, role: Role) -> Vec<Principal> {
        self.members
            .get(&(*hash, role))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All assignments, ordered by (document, role, principal).
    pub fn assignments(&self) -> Vec<RoleAssignment> {
        self.members
            .iter()
            .flat_map(|((document, role), set)| {
                set.iter().map(move |principal| RoleAssignment {
                    document: *document,
                    role: *role,
                    principal: *principal,
                })
            })
            .collect()
    }

    /// Total number of assignments.
    pub fn len(&self) -> usize {
        self.members.values().map(BTreeSet::len).sum()
    }

    /// Whether there are no assignments.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
