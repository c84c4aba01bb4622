//! The three delegable roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A delegable role on a document.
///
/// The master is deliberately not a role: master authority is structural and
/// is never stored in a role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// Permanent owner: a delegated administrator of the document.
    Owner = 1,
    /// May write the document's content (enforced by consumers).
    Writer = 2,
    /// May read the document's content (enforced by consumers).
    Reader = 3,
}

impl Role {
    /// Every role, in code order.
    pub const ALL: [Role; 3] = [Role::Owner, Role::Writer, Role::Reader];

    /// Convert to u8 for serialization.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Owner),
            2 => Some(Self::Writer),
            3 => Some(Self::Reader),
            _ => None,
        }
    }

    /// Whether holders of this role may manage role membership.
    pub fn can_administer(self) -> bool {
        matches!(self, Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Owner => "owner",
            Role::Writer => "writer",
            Role::Reader => "reader",
        };
        f.write_str(name)
    }
}
