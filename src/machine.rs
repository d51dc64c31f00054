//! Status transition machine.
//!
//! Transitions are keyed by `(current status, signature kind)` and may branch
//! on document data. Terminal statuses have no outgoing transitions; a pair
//! with no entry, or whose guard rejects every branch, is an invalid
//! transition rather than a silent no-op.
use super::document::{Acceptation, Document, Status};
use super::error::WorkflowError;

/// Kind of signature event an actor can record. The transport kind resolves
/// to the first unsigned `TRANSPORT_i` slot at signing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Emission,
    Transport,
    Reception,
    Operation,
}

/// Next lifecycle status for a signature event, or an invalid-transition
/// error. Pure function of its inputs.
pub fn transition(
    status: Status,
    kind: SignatureKind,
    doc: &Document,
) -> Result<Status, WorkflowError> {
    let invalid = || WorkflowError::InvalidTransition { status, kind };

    match (status, kind) {
        (Status::Initial, SignatureKind::Emission) => Ok(Status::SignedByEmitter),
        // an emitter off the platform never signs; the first transporter
        // moves the document straight to Sent
        (Status::Initial, SignatureKind::Transport) if doc.emitter_not_on_platform => {
            Ok(Status::Sent)
        }
        (Status::SignedByEmitter, SignatureKind::Transport) => Ok(Status::Sent),
        // multi-modal transport: further transporters sign while Sent
        (Status::Sent, SignatureKind::Transport) => Ok(Status::Sent),
        (Status::Sent, SignatureKind::Reception) => match doc.destination_acceptation_status {
            Some(Acceptation::Refused) => Ok(Status::Refused),
            Some(Acceptation::Accepted) | Some(Acceptation::PartiallyRefused) => {
                Ok(Status::Received)
            }
            None => Err(invalid()),
        },
        (Status::Received, SignatureKind::Operation) => Ok(Status::Processed),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new("vhu_test".into(), 1234)
    }

    #[test]
    fn nominal_chain() {
        let d = doc();
        assert_eq!(
            transition(Status::Initial, SignatureKind::Emission, &d).unwrap(),
            Status::SignedByEmitter
        );
        assert_eq!(
            transition(Status::SignedByEmitter, SignatureKind::Transport, &d).unwrap(),
            Status::Sent
        );
        assert_eq!(
            transition(Status::Received, SignatureKind::Operation, &d).unwrap(),
            Status::Processed
        );
    }

    #[test]
    fn reception_branches_on_acceptation() {
        let mut d = doc();
        d.destination_acceptation_status = Some(Acceptation::Refused);
        assert_eq!(
            transition(Status::Sent, SignatureKind::Reception, &d).unwrap(),
            Status::Refused
        );

        d.destination_acceptation_status = Some(Acceptation::Accepted);
        assert_eq!(
            transition(Status::Sent, SignatureKind::Reception, &d).unwrap(),
            Status::Received
        );

        d.destination_acceptation_status = Some(Acceptation::PartiallyRefused);
        assert_eq!(
            transition(Status::Sent, SignatureKind::Reception, &d).unwrap(),
            Status::Received
        );
    }

    #[test]
    fn reception_without_acceptation_rejects_all_branches() {
        let d = doc();
        assert!(transition(Status::Sent, SignatureKind::Reception, &d).is_err());
    }

    #[test]
    fn additional_transporters_self_loop_in_sent() {
        let d = doc();
        assert_eq!(
            transition(Status::Sent, SignatureKind::Transport, &d).unwrap(),
            Status::Sent
        );
    }

    #[test]
    fn skipped_emitter_lets_transport_leave_initial() {
        let mut d = doc();
        assert!(transition(Status::Initial, SignatureKind::Transport, &d).is_err());

        d.emitter_not_on_platform = true;
        assert_eq!(
            transition(Status::Initial, SignatureKind::Transport, &d).unwrap(),
            Status::Sent
        );
    }

    #[test]
    fn terminal_statuses_reject_everything() {
        let d = doc();
        for kind in [
            SignatureKind::Emission,
            SignatureKind::Transport,
            SignatureKind::Reception,
            SignatureKind::Operation,
        ] {
            assert!(transition(Status::Refused, kind, &d).is_err());
            assert!(transition(Status::Processed, kind, &d).is_err());
        }
    }
}
