//! Ledger events: the append-only, hash-chained record of every permission change.
//!
//! Each successful mutation becomes exactly one event. Events are never edited;
//! each one names its predecessor by id, so rewriting history breaks the chain.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_bytes;
use crate::role::Role;
use crate::types::{DocumentHash, EventId, Principal};

/// The current event schema version.
pub const EVENT_VERSION: u8 = 0;

/// Domain separator prefixed to canonical bytes before hashing an event id.
pub const EVENT_ID_DOMAIN: &[u8] = b"permledger-event-v0:";

/// Discriminator for the action an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionKind {
    /// A document was registered.
    Register = 1,
    /// A role was granted.
    Grant = 2,
    /// A role was revoked.
    Revoke = 3,
}

impl ActionKind {
    /// Convert to u8 for serialization.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Register),
            2 => Some(Self::Grant),
            3 => Some(Self::Revoke),
            _ => None,
        }
    }
}

/// The state change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerAction {
    /// Register a document; the event's caller becomes its master.
    Register { document: DocumentHash },

    /// Add `principal` to `role` on `document`.
    Grant {
        document: DocumentHash,
        role: Role,
        principal: Principal,
    },

    /// Remove `principal` from `role` on `document`.
    Revoke {
        document: DocumentHash,
        role: Role,
        principal: Principal,
    },
}

impl LedgerAction {
    /// The action discriminator.
    pub fn kind(&self) -> ActionKind {
        match self {
            LedgerAction::Register { .. } => ActionKind::Register,
            LedgerAction::Grant { .. } => ActionKind::Grant,
            LedgerAction::Revoke { .. } => ActionKind::Revoke,
        }
    }

    /// The document this action touches.
    pub fn document(&self) -> &DocumentHash {
        match self {
            LedgerAction::Register { document }
            | LedgerAction::Grant { document, .. }
            | LedgerAction::Revoke { document, .. } => document,
        }
    }

    /// The role this action touches, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            LedgerAction::Register { .. } => None,
            LedgerAction::Grant { role, .. } | LedgerAction::Revoke { role, .. } => Some(*role),
        }
    }

    /// The target principal, if any.
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            LedgerAction::Register { .. } => None,
            LedgerAction::Grant { principal, .. } | LedgerAction::Revoke { principal, .. } => {
                Some(principal)
            }
        }
    }
}

/// A single ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Schema version (currently 0).
    pub version: u8,

    /// Position in the ledger (1-indexed, contiguous).
    pub seq: u64,

    /// Id of the event at `seq - 1` (None for seq=1).
    pub prev_event_id: Option<EventId>,

    /// The principal that made the call.
    pub caller: Principal,

    /// Wall-clock time of the call (Unix milliseconds). Informational only.
    pub timestamp: i64,

    /// The recorded state change.
    pub action: LedgerAction,
}

impl LedgerEvent {
    /// Compute the event ID: Blake3(EVENT_ID_DOMAIN || canonical_bytes(event)).
    pub fn compute_id(&self) -> EventId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(EVENT_ID_DOMAIN);
        hasher.update(&canonical_bytes(self));
        EventId(*hasher.finalize().as_bytes())
    }

    /// The document this event touches.
    pub fn document(&self) -> &DocumentHash {
        self.action.document()
    }

    /// The action discriminator.
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Check if this is the first event of the ledger.
    pub fn is_genesis(&self) -> bool {
        self.seq == 1 && self.prev_event_id.is_none()
    }
}

/// Position of the newest event in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogHead {
    pub seq: u64,
    pub event_id: EventId,
}

impl LogHead {
    /// The sequence number the next event must carry.
    pub fn next_seq(head: Option<&LogHead>) -> u64 {
        head.map(|h| h.seq + 1).unwrap_or(1)
    }
}

/// Builder for creating ledger events.
pub struct EventBuilder {
    caller: Principal,
    action: LedgerAction,
    seq: u64,
    prev_event_id: Option<EventId>,
    timestamp: i64,
}

impl EventBuilder {
    /// Start building an event for `caller` performing `action`.
    pub fn new(caller: Principal, action: LedgerAction) -> Self {
        Self {
            caller,
            action,
            seq: 1,
            prev_event_id: None,
            timestamp: 0,
        }
    }

    /// Chain the event after `head` (or make it the genesis event if None).
    pub fn after(mut self, head: Option<&LogHead>) -> Self {
        self.seq = LogHead::next_seq(head);
        self.prev_event_id = head.map(|h| h.event_id);
        self
    }

    /// Set the sequence number explicitly.
    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Set the previous event ID explicitly.
    pub fn prev(mut self, prev: EventId) -> Self {
        self.prev_event_id = Some(prev);
        self
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Build the event.
    pub fn build(self) -> LedgerEvent {
        LedgerEvent {
            version: EVENT_VERSION,
            seq: self.seq,
            prev_event_id: self.prev_event_id,
            caller: self.caller,
            timestamp: self.timestamp,
            action: self.action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller() -> Principal {
        Principal::from_bytes([0x11; 32])
    }

    #[test]
    fn test_action_kind_roundtrip() {
        for kind in [ActionKind::Register, ActionKind::Grant, ActionKind::Revoke] {
            assert_eq!(ActionKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(ActionKind::from_u8(0), None);
    }

    #[test]
    fn test_action_accessors() {
        let document = DocumentHash::of(b"doc");
        let target = Principal::from_bytes([0x22; 32]);

        let register = LedgerAction::Register { document };
        assert_eq!(register.kind(), ActionKind::Register);
        assert_eq!(register.role(), None);
        assert_eq!(register.principal(), None);

        let grant = LedgerAction::Grant {
            document,
            role: Role::Writer,
            principal: target,
        };
        assert_eq!(grant.document(), &document);
        assert_eq!(grant.role(), Some(Role::Writer));
        assert_eq!(grant.principal(), Some(&target));
    }

    #[test]
    fn test_id_is_domain_separated_hash_of_canonical_bytes() {
        let event = EventBuilder::new(
            caller(),
            LedgerAction::Register {
                document: DocumentHash::from_bytes([0x22; 32]),
            },
        )
        .after(None)
        .timestamp(0)
        .build();

        let mut input = EVENT_ID_DOMAIN.to_vec();
        input.extend_from_slice(&canonical_bytes(&event));
        assert_eq!(event.compute_id().0, *blake3::hash(&input).as_bytes());
        assert_ne!(
            event.compute_id().0,
            *blake3::hash(&canonical_bytes(&event)).as_bytes()
        );
        assert_eq!(
            event.compute_id().to_hex(),
            "645df0466071fecd1dddaf91371d00be4081394381b22a6700363d1fe3c5a537"
        );
    }

    #[test]
    fn test_builder_chains_after_head() {
        let document = DocumentHash::of(b"doc");
        let genesis = EventBuilder::new(caller(), LedgerAction::Register { document })
            .after(None)
            .timestamp(1_700_000_000_000)
            .build();
        assert!(genesis.is_genesis());

        let head = LogHead {
            seq: genesis.seq,
            event_id: genesis.compute_id(),
        };
        let next = EventBuilder::new(
            caller(),
            LedgerAction::Grant {
                document,
                role: Role::Reader,
                principal: Principal::from_bytes([0x33; 32]),
            },
        )
        .after(Some(&head))
        .build();

        assert_eq!(next.seq, 2);
        assert_eq!(next.prev_event_id, Some(head.event_id));
        assert!(!next.is_genesis());
    }

    #[test]
    fn test_event_id_deterministic() {
        let event = EventBuilder::new(
            caller(),
            LedgerAction::Register {
                document: DocumentHash::of(b"doc"),
            },
        )
        .timestamp(1234567890000)
        .build();

        assert_eq!(event.compute_id(), event.compute_id());
    }

    #[test]
    fn test_event_id_changes_with_content() {
        let document = DocumentHash::of(b"doc");
        let a = EventBuilder::new(caller(), LedgerAction::Register { document }).build();
        let b = EventBuilder::new(caller(), LedgerAction::Register { document })
            .timestamp(1)
            .build();

        assert_ne!(a.compute_id(), b.compute_id());
    }

    #[test]
    fn test_event_json_roundtrip_preserves_id() {
        let event = EventBuilder::new(
            caller(),
            LedgerAction::Revoke {
                document: DocumentHash::of(b"doc"),
                role: Role::Owner,
                principal: Principal::from_bytes([0x22; 32]),
            },
        )
        .seq(7)
        .prev(EventId::from_bytes([0x09; 32]))
        .build();

        let json = serde_json::to_string(&event).unwrap();
        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.compute_id(), event.compute_id());
    }
}
