//! Ledger state computation.
//!
//! The current registry and role membership are a pure function of the event
//! log. This module applies events one at a time, refusing any event whose
//! caller lacks authority or whose effect is illegal or empty, and rebuilds
//! state by replaying a whole log.

use crate::error::{StateError, ValidationError};
use crate::event::{LedgerAction, LedgerEvent, LogHead};
use crate::registry::{Document, Registry};
use crate::role::Role;
use crate::roles::{RoleAssignment, RoleStore};
use crate::types::{DocumentHash, Principal};
use crate::validation::validate_link;

/// The facts about current state that decide whether an action is legal.
///
/// Storage backends that keep state outside a [`LedgerState`] fill this in
/// from their own tables, inside the same transaction as the append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionFacts {
    /// Current master of the action's document, None if unregistered.
    pub master: Option<Principal>,
    /// Whether the caller holds a role that administers the document.
    pub caller_administers: bool,
    /// Whether the action's target already holds the action's role.
    pub target_is_member: bool,
}

/// Decide whether `caller` may apply `action`.
///
/// Checked in order: registration collisions, unknown documents, the
/// caller's authority (master or Owner), the master as a target, and
/// finally whether the action changes anything at all.
pub fn check_transition(
    caller: &Principal,
    action: &LedgerAction,
    facts: TransitionFacts,
) -> Result<(), StateError> {
    match action {
        LedgerAction::Register { document } => {
            if facts.master.is_some() {
                return Err(StateError::AlreadyExists(*document));
            }
        }
        LedgerAction::Grant {
            document,
            role,
            principal,
        }
        | LedgerAction::Revoke {
            document,
            role,
            principal,
        } => {
            let master = facts.master.ok_or(StateError::DocumentNotFound(*document))?;
            if *caller != master && !facts.caller_administers {
                return Err(StateError::Unauthorized {
                    caller: *caller,
                    document: *document,
                });
            }
            if master == *principal {
                return Err(StateError::MasterIsStructural {
                    document: *document,
                    role: *role,
                });
            }
            let granting = matches!(action, LedgerAction::Grant { .. });
            if granting == facts.target_is_member {
                return Err(StateError::Ineffective {
                    document: *document,
                    role: *role,
                    principal: *principal,
                });
            }
        }
    }
    Ok(())
}

/// Registry plus role membership: the snapshot the event log produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    registry: Registry,
    roles: RoleStore,
}

impl LedgerState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from its parts (used by stores that load snapshots).
    pub fn from_parts(registry: Registry, roles: RoleStore) -> Self {
        Self { registry, roles }
    }

    /// Check whether `event` could be applied, without mutating.
    pub fn check(&self, event: &LedgerEvent) -> Result<(), StateError> {
        let document = event.document();
        let facts = TransitionFacts {
            master: self.registry.master_of(document),
            caller_administers: Role::ALL
                .into_iter()
                .filter(|r| r.can_administer())
                .any(|r| self.roles.is_member(document, r, &event.caller)),
            target_is_member: match (event.action.role(), event.action.principal()) {
                (Some(role), Some(principal)) => self.roles.is_member(document, role, principal),
                _ => false,
            },
        };
        check_transition(&event.caller, &event.action, facts)
    }

    /// Apply a single event. On error the state is untouched.
    pub fn apply(&mut self, event: &LedgerEvent) -> Result<(), StateError> {
        self.check(event)?;

        match event.action {
            LedgerAction::Register { document } => {
                self.registry.register(document, event.caller, event.seq)?;
            }
            LedgerAction::Grant {
                document,
                role,
                principal,
            } => {
                self.roles.grant(document, role, principal);
            }
            LedgerAction::Revoke {
                document,
                role,
                principal,
            } => {
                self.roles.revoke(&document, role, &principal);
            }
        }
        Ok(())
    }

    /// Rebuild state from a complete log, checking chain links along the way.
    ///
    /// Returns the state and the head of the log.
    pub fn replay<'a, I>(events: I) -> Result<(Self, Option<LogHead>), ValidationError>
    where
        I: IntoIterator<Item = &'a LedgerEvent>,
    {
        let mut state = Self::new();
        let mut head: Option<LogHead> = None;

        for event in events {
            validate_link(event, head.as_ref())?;
            state
                .apply(event)
                .map_err(|source| ValidationError::IllegalTransition {
                    seq: event.seq,
                    source,
                })?;
            head = Some(LogHead {
                seq: event.seq,
                event_id: event.compute_id(),
            });
        }

        Ok((state, head))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn roles(&self) -> &RoleStore {
        &self.roles
    }

    pub fn exists(&self, hash: &DocumentHash) -> bool {
        self.registry.exists(hash)
    }

    pub fn master_of(&self, hash: &DocumentHash) -> Option<Principal> {
        self.registry.master_of(hash)
    }

    pub fn get_document(&self, hash: &DocumentHash) -> Option<&Document> {
        self.registry.get(hash)
    }

    pub fn is_member(&self, hash: &DocumentHash, role: Role, principal: &Principal) -> bool {
        self.roles.is_member(hash, role, principal)
    }

    pub fn members(&self, hash: &DocumentHash, role: Role) -> Vec<Principal> {
        self.roles.members(hash, role)
    }

    pub fn assignments(&self) -> Vec<RoleAssignment> {
        self.roles.assignments()
    }
}
