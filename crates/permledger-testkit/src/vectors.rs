//! Golden test vectors for deterministic verification.
//!
//! Each vector pins the canonical CBOR bytes of one ledger event. Any other
//! implementation of the ledger format must produce the same bytes, and
//! therefore the same event IDs.

use serde::Serialize;

use permledger_core::{
    canonical_bytes, ActionKind, DocumentHash, EventBuilder, EventId, LedgerAction, LedgerEvent,
    Principal, Role,
};

/// A golden test vector.
///
/// Identities are 32 copies of a single fill byte to keep the vectors
/// readable in hex.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Sequence number.
    pub seq: u64,
    /// Fill byte of the previous event ID (absent for genesis).
    pub prev_fill: Option<u8>,
    /// Fill byte of the caller.
    pub caller_fill: u8,
    /// Timestamp in milliseconds.
    pub timestamp: i64,
    /// Action kind.
    pub kind: ActionKind,
    /// Fill byte of the document hash.
    pub document_fill: u8,
    /// Role (grant and revoke only).
    pub role: Option<Role>,
    /// Fill byte of the target principal (grant and revoke only).
    pub principal_fill: Option<u8>,
    /// Expected canonical encoding (hex).
    pub expected_canonical_hex: &'static str,
    /// Expected event ID (hex).
    pub expected_event_id: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "Genesis registration",
            seq: 1,
            prev_fill: None,
            caller_fill: 0x11,
            timestamp: 0,
            kind: ActionKind::Register,
            document_fill: 0x22,
            role: None,
            principal_fill: None,
            expected_canonical_hex: "a90000010102f60358201111111111111111111111111111111111111111111111111111111111111111040005010658202222222222222222222222222222222222222222222222222222222222222222\
                                     07f608f6",
            expected_event_id: "645df0466071fecd1dddaf91371d00be4081394381b22a6700363d1fe3c5a537",
        },
        GoldenVector {
            name: "Owner grant",
            seq: 2,
            prev_fill: Some(0xaa),
            caller_fill: 0x11,
            timestamp: 1736870400000,
            kind: ActionKind::Grant,
            document_fill: 0x22,
            role: Some(Role::Owner),
            principal_fill: Some(0x33),
            expected_canonical_hex: "a900000102025820aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
                                     0358201111111111111111111111111111111111111111111111111111111111111111\
                                     041b00000194658b1000050206582022222222222222222222222222222222222222222222222222222222222222220701\
                                     0858203333333333333333333333333333333333333333333333333333333333333333",
            expected_event_id: "f28d6b7bafabf78d24437fd0d65d144db68c637f58b24d7583f20f99708c2906",
        },
        GoldenVector {
            name: "Reader revoke by owner",
            seq: 3,
            prev_fill: Some(0xbb),
            caller_fill: 0x33,
            timestamp: 1736870401000,
            kind: ActionKind::Revoke,
            document_fill: 0x22,
            role: Some(Role::Reader),
            principal_fill: Some(0x44),
            expected_canonical_hex: "a900000103025820bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\
                                     0358203333333333333333333333333333333333333333333333333333333333333333\
                                     041b00000194658b13e8050306582022222222222222222222222222222222222222222222222222222222222222220703\
                                     0858204444444444444444444444444444444444444444444444444444444444444444",
            expected_event_id: "9531a82d0b1caf2a4ecc7551611313bc694ae18655a23f827c572e0a9d31f201",
        },
    ]
}

/// Build the event a vector describes.
///
/// Returns `None` if a grant or revoke vector lacks its role or principal.
pub fn event_from_vector(vector: &GoldenVector) -> Option<LedgerEvent> {
    let document = DocumentHash::from_bytes([vector.document_fill; 32]);
    let action = match vector.kind {
        ActionKind::Register => LedgerAction::Register { document },
        ActionKind::Grant => LedgerAction::Grant {
            document,
            role: vector.role?,
            principal: Principal::from_bytes([vector.principal_fill?; 32]),
        },
        ActionKind::Revoke => LedgerAction::Revoke {
            document,
            role: vector.role?,
            principal: Principal::from_bytes([vector.principal_fill?; 32]),
        },
    };

    let mut builder = EventBuilder::new(Principal::from_bytes([vector.caller_fill; 32]), action)
        .seq(vector.seq)
        .timestamp(vector.timestamp);
    if let Some(fill) = vector.prev_fill {
        builder = builder.prev(EventId::from_bytes([fill; 32]));
    }
    Some(builder.build())
}

/// Verify all golden vectors.
///
/// Returns `(name, matches, event_id_hex)` for each vector. A vector matches
/// when both its canonical bytes and its computed ID are as expected.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| match event_from_vector(v) {
            Some(event) => {
                let bytes_hex = hex::encode(canonical_bytes(&event));
                let id_hex = event.compute_id().to_hex();
                let matches =
                    bytes_hex == v.expected_canonical_hex && id_hex == v.expected_event_id;
                (v.name.to_string(), matches, id_hex)
            }
            None => (v.name.to_string(), false, String::new()),
        })
        .collect()
}

/// The vector set as pretty JSON, for sharing with other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}
