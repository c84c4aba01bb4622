//! Event validation: structural checks and hash-chain linkage.

use crate::error::ValidationError;
use crate::event::{LedgerEvent, LogHead, EVENT_VERSION};

/// Validate an event's structure without ledger context.
///
/// This performs:
/// - Version check
/// - seq must be at least 1
/// - seq=1 has no prev_event_id, every later event has one
pub fn validate_event_structure(event: &LedgerEvent) -> Result<(), ValidationError> {
    if event.version != EVENT_VERSION {
        return Err(ValidationError::UnsupportedVersion(event.version));
    }

    if event.seq == 0 {
        return Err(ValidationError::InvalidSequence {
            expected: 1,
            got: 0,
        });
    }

    if event.seq == 1 && event.prev_event_id.is_some() {
        return Err(ValidationError::InvalidPrevEvent {
            expected: None,
            got: event.prev_event_id,
        });
    }

    if event.seq > 1 && event.prev_event_id.is_none() {
        return Err(ValidationError::StructuralError(
            "seq > 1 requires prev_event_id".into(),
        ));
    }

    Ok(())
}

/// Validate that `event` directly follows `head`.
pub fn validate_link(event: &LedgerEvent, head: Option<&LogHead>) -> Result<(), ValidationError> {
    validate_event_structure(event)?;

    let expected_seq = LogHead::next_seq(head);
    if event.seq != expected_seq {
        return Err(ValidationError::InvalidSequence {
            expected: expected_seq,
            got: event.seq,
        });
    }

    let expected_prev = head.map(|h| h.event_id);
    if event.prev_event_id != expected_prev {
        return Err(ValidationError::InvalidPrevEvent {
            expected: expected_prev,
            got: event.prev_event_id,
        });
    }

    Ok(())
}

/// Verify that `events` form one unbroken chain starting at seq 1.
///
/// Returns the head of the chain, or None for an empty ledger.
pub fn verify_chain<'a, I>(events: I) -> Result<Option<LogHead>, ValidationError>
where
    I: IntoIterator<Item = &'a LedgerEvent>,
{
    let mut head: Option<LogHead> = None;
    for event in events {
        validate_link(event, head.as_ref())?;
        head = Some(LogHead {
            seq: event.seq,
            event_id: event.compute_id(),
        });
    }
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventBuilder, LedgerAction};
    use crate::role::Role;
    use crate::types::{DocumentHash, EventId, Principal};

    fn master() -> Principal {
        Principal::from_bytes([0x01; 32])
    }

    fn chain(len: usize) -> Vec<LedgerEvent> {
        let document = DocumentHash::of(b"doc");
        let mut events: Vec<LedgerEvent> = Vec::new();
        let mut head: Option<LogHead> = None;

        for i in 0..len {
            let action = if i == 0 {
                LedgerAction::Register { document }
            } else {
                LedgerAction::Grant {
                    document,
                    role: Role::Reader,
                    principal: Principal::from_bytes([i as u8 + 1; 32]),
                }
            };
            let event = EventBuilder::new(master(), action)
                .after(head.as_ref())
                .timestamp(i as i64)
                .build();
            head = Some(LogHead {
                seq: event.seq,
                event_id: event.compute_id(),
            });
            events.push(event);
        }
        events
    }

    #[test]
    fn test_valid_chain() {
        let events = chain(4);
        let head = verify_chain(&events).unwrap().unwrap();

        assert_eq!(head.seq, 4);
        assert_eq!(head.event_id, events[3].compute_id());
    }

    #[test]
    fn test_empty_chain() {
        assert_eq!(verify_chain(&Vec::<LedgerEvent>::new()).unwrap(), None);
    }

    #[test]
    fn test_unsupported_version() {
        let mut event = chain(1).remove(0);
        event.version = 9;

        assert!(matches!(
            validate_event_structure(&event),
            Err(ValidationError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_genesis_with_prev_rejected() {
        let mut event = chain(1).remove(0);
        event.prev_event_id = Some(EventId::ZERO);

        assert!(matches!(
            validate_event_structure(&event),
            Err(ValidationError::InvalidPrevEvent { .. })
        ));
    }

    #[test]
    fn test_later_event_without_prev_rejected() {
        let mut event = chain(2).remove(1);
        event.prev_event_id = None;

        assert!(matches!(
            validate_event_structure(&event),
            Err(ValidationError::StructuralError(_))
        ));
    }

    #[test]
    fn test_gap_detected() {
        let mut events = chain(3);
        events.remove(1);

        assert!(matches!(
            verify_chain(&events),
            Err(ValidationError::InvalidSequence {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_tampered_event_breaks_link() {
        let mut events = chain(3);
        events[1].timestamp += 1;

        assert!(matches!(
            verify_chain(&events),
            Err(ValidationError::InvalidPrevEvent { .. })
        ));
    }
}
