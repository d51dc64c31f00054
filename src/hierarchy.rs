//! Signature hierarchy: the ordered chain of steps a document walks through.
//!
//! The chain is built per document because the transport branch expands to
//! one node per declared transporter:
//!
//! `EMISSION -> TRANSPORT_1 .. TRANSPORT_k -> RECEPTION -> OPERATION`
//!
//! A document with zero transporters still gets the `TRANSPORT_1` slot as an
//! unsigned node; the missing transporter is reported by the requirement
//! validator, never here.
use std::fmt;

use super::document::Document;

/// A named signature step. Transport indexes are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Emission,
    Transport(u32),
    Reception,
    Operation,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Emission => write!(f, "EMISSION"),
            Step::Transport(i) => write!(f, "TRANSPORT_{}", i),
            Step::Reception => write!(f, "RECEPTION"),
            Step::Operation => write!(f, "OPERATION"),
        }
    }
}

/// Ordered node sequence for one document. Nodes are referenced by their
/// index into the built chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHierarchy {
    steps: Vec<Step>,
}

impl SignatureHierarchy {
    pub fn for_document(doc: &Document) -> Self {
        Self::for_transporter_count(doc.transporters.len().max(1) as u32)
    }

    pub fn for_transporter_count(k: u32) -> Self {
        let k = k.max(1);
        let mut steps = Vec::with_capacity(k as usize + 3);
        steps.push(Step::Emission);
        for i in 1..=k {
            steps.push(Step::Transport(i));
        }
        steps.push(Step::Reception);
        steps.push(Step::Operation);
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn position(&self, step: Step) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    /// Whether a step counts as signed on this document. Skippable steps
    /// report signed as soon as the skip condition holds, without a
    /// timestamp: an emitter flagged as not on the platform never signs the
    /// emission step explicitly.
    pub fn is_signed(doc: &Document, step: Step) -> bool {
        match step {
            Step::Emission => {
                doc.emitter_not_on_platform || doc.emitter_emission_signature_date.is_some()
            }
            Step::Transport(i) => i
                .checked_sub(1)
                .and_then(|i| doc.transporters.get(i as usize))
                .is_some_and(|t| t.transport_signature_date.is_some()),
            Step::Reception => doc.destination_reception_signature_date.is_some(),
            Step::Operation => doc.destination_operation_signature_date.is_some(),
        }
    }

    /// Like [`Self::is_signed`] but only counts an actual recorded
    /// timestamp, never a skip condition.
    pub fn is_explicitly_signed(doc: &Document, step: Step) -> bool {
        match step {
            Step::Emission => doc.emitter_emission_signature_date.is_some(),
            _ => Self::is_signed(doc, step),
        }
    }

    /// Furthest step carrying an actual signature timestamp. Drives the
    /// requirement checks on create/update, so a merely skipped step never
    /// re-triggers its required-field rules on later edits.
    pub fn current_explicit_signature(&self, doc: &Document) -> Option<Step> {
        self.steps
            .iter()
            .copied()
            .filter(|s| Self::is_explicitly_signed(doc, *s))
            .last()
    }

    /// Furthest signed step in chain order, or `None` when nothing has
    /// fired. A later signature always wins over an unsigned ancestor, so a
    /// downstream party signing first moves the document forward without
    /// waiting on skipped steps.
    pub fn current_signature(&self, doc: &Document) -> Option<Step> {
        self.steps
            .iter()
            .copied()
            .filter(|s| Self::is_signed(doc, *s))
            .last()
    }

    /// Steps from `step` back to the chain's first step, inclusive.
    /// Empty if `step` is not part of this chain.
    pub fn ancestors_of(&self, step: Step) -> Vec<Step> {
        match self.position(step) {
            Some(pos) => self.steps[..=pos].iter().rev().copied().collect(),
            None => vec![],
        }
    }

    /// `step` plus every step that points to it transitively, in chain
    /// order. Used so a check against OPERATION still re-validates rules
    /// anchored on silently skipped ancestors.
    pub fn ancestors_to_check(&self, step: Step) -> Vec<Step> {
        match self.position(step) {
            Some(pos) => self.steps[..=pos].to_vec(),
            None => vec![],
        }
    }

    pub fn next_of(&self, step: Step) -> Option<Step> {
        let pos = self.position(step)?;
        self.steps.get(pos + 1).copied()
    }

    /// First transport node without a recorded signature, used to resolve
    /// which slot a TRANSPORT signature event lands on. `None` when every
    /// declared transporter has signed.
    pub fn next_unsigned_transport(&self, doc: &Document) -> Option<Step> {
        self.steps
            .iter()
            .copied()
            .filter(|s| matches!(s, Step::Transport(_)))
            .find(|s| !Self::is_signed(doc, *s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{TimeStamp, Transporter};

    fn doc_with_transporters(k: usize) -> Document {
        let mut doc = Document::new("vhu_test".into(), 1234);
        for _ in 0..k {
            doc.transporters.push(Transporter::default());
        }
        doc
    }

    #[test]
    fn chain_expands_one_node_per_transporter() {
        let h = SignatureHierarchy::for_transporter_count(3);
        assert_eq!(
            h.steps(),
            &[
                Step::Emission,
                Step::Transport(1),
                Step::Transport(2),
                Step::Transport(3),
                Step::Reception,
                Step::Operation,
            ]
        );
    }

    #[test]
    fn zero_transporters_still_has_the_first_transport_slot() {
        let doc = doc_with_transporters(0);
        let h = SignatureHierarchy::for_document(&doc);
        assert!(h.steps().contains(&Step::Transport(1)));
    }

    #[test]
    fn current_signature_walks_to_the_furthest_step() {
        let mut doc = doc_with_transporters(1);
        let h = SignatureHierarchy::for_document(&doc);
        assert_eq!(h.current_signature(&doc), None);

        doc.emitter_emission_signature_date = Some(TimeStamp::new());
        assert_eq!(h.current_signature(&doc), Some(Step::Emission));

        doc.transporters[0].transport_signature_date = Some(TimeStamp::new());
        assert_eq!(h.current_signature(&doc), Some(Step::Transport(1)));
    }

    #[test]
    fn skipped_emission_counts_as_signed() {
        let mut doc = doc_with_transporters(1);
        doc.emitter_not_on_platform = true;

        let h = SignatureHierarchy::for_document(&doc);
        assert_eq!(h.current_signature(&doc), Some(Step::Emission));
    }

    #[test]
    fn later_signature_wins_over_unsigned_ancestor() {
        // reception never signed explicitly, operation fired anyway
        let mut doc = doc_with_transporters(1);
        doc.destination_operation_signature_date = Some(TimeStamp::new());

        let h = SignatureHierarchy::for_document(&doc);
        assert_eq!(h.current_signature(&doc), Some(Step::Operation));
    }

    #[test]
    fn ancestors_to_check_is_chain_order_up_to_target() {
        let h = SignatureHierarchy::for_transporter_count(2);
        assert_eq!(
            h.ancestors_to_check(Step::Reception),
            vec![
                Step::Emission,
                Step::Transport(1),
                Step::Transport(2),
                Step::Reception,
            ]
        );
        assert!(h.ancestors_to_check(Step::Transport(4)).is_empty());
    }

    #[test]
    fn ancestors_of_runs_backwards_inclusive() {
        let h = SignatureHierarchy::for_transporter_count(1);
        assert_eq!(
            h.ancestors_of(Step::Reception),
            vec![Step::Reception, Step::Transport(1), Step::Emission]
        );
    }

    #[test]
    fn next_of_follows_the_chain() {
        let h = SignatureHierarchy::for_transporter_count(2);
        assert_eq!(h.next_of(Step::Transport(2)), Some(Step::Reception));
        assert_eq!(h.next_of(Step::Operation), None);
    }

    #[test]
    fn next_unsigned_transport_resolves_the_open_slot() {
        let mut doc = doc_with_transporters(2);
        let h = SignatureHierarchy::for_document(&doc);
        assert_eq!(h.next_unsigned_transport(&doc), Some(Step::Transport(1)));

        doc.transporters[0].transport_signature_date = Some(TimeStamp::new());
        assert_eq!(h.next_unsigned_transport(&doc), Some(Step::Transport(2)));

        doc.transporters[1].transport_signature_date = Some(TimeStamp::new());
        assert_eq!(h.next_unsigned_transport(&doc), None);
    }
}
