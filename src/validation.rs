//! Sealing and requirement validators.
//!
//! Both validators collect every violation before failing; a call either
//! accepts the whole update or rejects it, never partially applies it.
use super::diff::{DocumentPatch, changed_fields};
use super::document::Document;
use super::error::WorkflowError;
use super::field::{Field, FieldPath};
use super::hierarchy::{SignatureHierarchy, Step};
use super::rules::{ActorRoles, RuleContext, rule_for};

/// One missing-field finding from the requirement validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub field: Field,
    pub path: String,
    pub message: String,
    pub required_for: Step,
}

// reached = ancestors_to_check(signature context); a field is sealed once
// its anchoring step is among them and its gate (if any) holds.
fn is_sealed_at(doc: &Document, reached: &[Step], path: FieldPath, actor: &ActorRoles) -> bool {
    let rules = rule_for(path.field);
    let ctx = RuleContext::new(*actor, path.transporter);
    let from = rules.sealed.resolve_from(doc, &ctx);
    reached.contains(&from) && rules.sealed.applies(doc, &ctx)
}

/// Reject an update that touches any field frozen at the document's current
/// signature state. All violations are reported together, deduplicated, in
/// first-occurrence order.
pub fn check_sealed(
    persisted: &Document,
    patch: &DocumentPatch,
    actor: &ActorRoles,
) -> Result<(), WorkflowError> {
    let hierarchy = SignatureHierarchy::for_document(persisted);
    let Some(current) = hierarchy.current_signature(persisted) else {
        return Ok(()); // nothing signed, nothing sealed
    };
    let reached = hierarchy.ancestors_to_check(current);

    let violations: Vec<FieldPath> = changed_fields(patch, persisted)
        .into_iter()
        .filter(|path| is_sealed_at(persisted, &reached, *path, actor))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::SealedFields(violations))
    }
}

/// Every field path sealed on `doc` for `actor`, evaluated at the given
/// signature context. Pure function of its inputs; drives UI affordances and
/// gates the auto-completion pipeline.
pub fn sealed_field_paths(
    doc: &Document,
    context: Option<Step>,
    actor: &ActorRoles,
) -> Vec<FieldPath> {
    let hierarchy = SignatureHierarchy::for_document(doc);
    let Some(context) = context else {
        return vec![];
    };
    let reached = hierarchy.ancestors_to_check(context);

    let mut sealed = Vec::new();
    for field in Field::ALL {
        if field.is_transporter_scoped() {
            for i in 1..=doc.transporters.len().max(1) as u32 {
                let path = field.at(Some(i));
                if is_sealed_at(doc, &reached, path, actor) {
                    sealed.push(path);
                }
            }
        } else {
            let path = field.at(None);
            if is_sealed_at(doc, &reached, path, actor) {
                sealed.push(path);
            }
        }
    }
    sealed
}

const MAX_TRANSPORTERS: usize = 5;

/// Every missing field required for recording `target`, including rules
/// anchored on silently skipped ancestor steps. Empty means the signature
/// may proceed.
pub fn check_required(doc: &Document, target: Step) -> Vec<Issue> {
    let hierarchy = SignatureHierarchy::for_document(doc);
    let to_check = hierarchy.ancestors_to_check(target);
    let actor = ActorRoles::default();

    let mut issues = Vec::new();
    let mut check_path = |field: Field, idx: Option<u32>| {
        let Some(required) = rule_for(field).required else {
            return;
        };
        let ctx = RuleContext::new(actor, idx);
        let from = required.resolve_from(doc, &ctx);
        if !to_check.contains(&from) || !required.applies(doc, &ctx) {
            return;
        }
        if !field.is_present(doc, idx) {
            issues.push(Issue {
                field,
                path: field.at(idx).to_string(),
                message: required
                    .message
                    .unwrap_or("this field is required")
                    .to_string(),
                required_for: from,
            });
        }
    };

    for field in Field::ALL {
        if field.is_transporter_scoped() {
            // check declared entries; the missing-first-slot case is covered
            // by the Transporters rule itself
            for i in 1..=doc.transporters.len() as u32 {
                check_path(field, Some(i));
            }
        } else {
            check_path(field, None);
        }
    }

    // transporter cap is a validation constraint, not a hierarchy one
    if doc.transporters.len() > MAX_TRANSPORTERS
        && to_check.iter().any(|s| matches!(s, Step::Transport(_)))
    {
        issues.push(Issue {
            field: Field::Transporters,
            path: Field::Transporters.at(None).to_string(),
            message: format!("a document cannot carry more than {MAX_TRANSPORTERS} transporters"),
            required_for: Step::Transport(1),
        });
    }

    issues
}

/// `check_required` folded into the error type.
pub fn require_all(doc: &Document, target: Step) -> Result<(), WorkflowError> {
    let issues = check_required(doc, target);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Company, TimeStamp, Transporter, TransportMode, Weight};

    fn ready_for_emission() -> Document {
        let mut doc = Document::new("vhu_test".into(), 1234);
        doc.emitter_company = Company {
            name: Some("Casse Auto".into()),
            siret: Some("11111111100011".into()),
            address: Some("1 rue de la Casse".into()),
            ..Default::default()
        };
        doc.emitter_agrement_number = Some("AGR-001".into());
        doc.waste_code = Some("16 01 06".into());
        doc.identification_numbers = vec!["VHU-1".into()];
        doc.quantity = 1;
        doc.weight = Some(Weight {
            value_kg: 1200,
            is_estimate: true,
        });
        doc.destination_company = Company {
            name: Some("Broyeur SA".into()),
            siret: Some("22222222200022".into()),
            ..Default::default()
        };
        doc.destination_agrement_number = Some("AGR-002".into());
        doc.transporters.push(Transporter {
            company: Company {
                name: Some("Trans SARL".into()),
                siret: Some("33333333300033".into()),
                ..Default::default()
            },
            transport_mode: Some(TransportMode::Road),
            plates: vec!["AB-123-CD".into()],
            taken_over_at: Some(TimeStamp::new()),
            ..Default::default()
        });
        doc
    }

    #[test]
    fn nothing_is_sealed_before_any_signature() {
        let doc = ready_for_emission();
        let patch = DocumentPatch {
            waste_code: Some("16 01 04*".into()),
            ..Default::default()
        };
        assert!(check_sealed(&doc, &patch, &ActorRoles::default()).is_ok());
    }

    #[test]
    fn emission_seals_waste_data() {
        let mut doc = ready_for_emission();
        doc.emitter_emission_signature_date = Some(TimeStamp::new());

        let patch = DocumentPatch {
            waste_code: Some("16 01 04*".into()),
            ..Default::default()
        };
        let err = check_sealed(&doc, &patch, &ActorRoles::default()).unwrap_err();
        match err {
            WorkflowError::SealedFields(paths) => {
                assert_eq!(paths, vec![Field::WasteCode.at(None)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn idempotent_resubmission_of_a_sealed_value_passes() {
        let mut doc = ready_for_emission();
        doc.emitter_emission_signature_date = Some(TimeStamp::new());

        let patch = DocumentPatch {
            waste_code: doc.waste_code.clone(),
            ..Default::default()
        };
        assert!(check_sealed(&doc, &patch, &ActorRoles::default()).is_ok());
    }

    #[test]
    fn the_emitter_keeps_editing_until_transport() {
        let mut doc = ready_for_emission();
        doc.emitter_emission_signature_date = Some(TimeStamp::new());

        let patch = DocumentPatch {
            emitter_company_address: Some("2 rue Neuve".into()),
            ..Default::default()
        };
        let emitter = ActorRoles {
            is_emitter: true,
            ..Default::default()
        };
        assert!(check_sealed(&doc, &patch, &emitter).is_ok());
        assert!(check_sealed(&doc, &patch, &ActorRoles::default()).is_err());

        // once the transporter signed, even the emitter is locked out
        doc.transporters[0].transport_signature_date = Some(TimeStamp::new());
        assert!(check_sealed(&doc, &patch, &emitter).is_err());
    }

    #[test]
    fn all_violations_are_collected() {
        let mut doc = ready_for_emission();
        doc.emitter_emission_signature_date = Some(TimeStamp::new());

        let patch = DocumentPatch {
            waste_code: Some("16 01 04*".into()),
            quantity: Some(9),
            ..Default::default()
        };
        match check_sealed(&doc, &patch, &ActorRoles::default()).unwrap_err() {
            WorkflowError::SealedFields(paths) => {
                assert_eq!(paths.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn emission_requirements_report_every_gap() {
        let doc = Document::new("vhu_test".into(), 1234);
        let issues = check_required(&doc, Step::Emission);

        let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"emitter.company.siret"));
        assert!(paths.contains(&"waste.code"));
        assert!(paths.contains(&"destination.company.siret"));
        // reception-anchored rules are not in scope yet
        assert!(!paths.contains(&"destination.reception_date"));
    }

    #[test]
    fn skipped_emitter_relaxes_emitter_requirements() {
        let mut doc = ready_for_emission();
        doc.emitter_company = Company::default();
        doc.emitter_agrement_number = None;
        doc.emitter_not_on_platform = true;

        let issues = check_required(&doc, Step::Transport(1));
        assert!(
            issues
                .iter()
                .all(|i| !i.path.starts_with("emitter.company")),
            "emitter fields should not be required for a skipped emitter: {issues:?}"
        );
    }

    #[test]
    fn reception_check_revalidates_ancestors() {
        let mut doc = ready_for_emission();
        doc.waste_code = None; // emission-anchored gap

        let issues = check_required(&doc, Step::Reception);
        assert!(issues.iter().any(|i| i.path == "waste.code"));
        assert!(
            issues
                .iter()
                .any(|i| i.required_for == Step::Emission && i.path == "waste.code")
        );
    }

    #[test]
    fn zero_transporters_fails_the_transport_requirement() {
        let mut doc = ready_for_emission();
        doc.transporters.clear();

        let issues = check_required(&doc, Step::Transport(1));
        assert!(issues.iter().any(|i| i.field == Field::Transporters));
    }

    #[test]
    fn more_than_five_transporters_is_rejected() {
        let mut doc = ready_for_emission();
        let extra = doc.transporters[0].clone();
        for _ in 0..5 {
            doc.transporters.push(extra.clone());
        }

        let issues = check_required(&doc, Step::Transport(1));
        assert!(
            issues
                .iter()
                .any(|i| i.field == Field::Transporters && i.message.contains("more than"))
        );
    }

    #[test]
    fn plates_required_only_for_road() {
        let mut doc = ready_for_emission();
        doc.transporters[0].plates.clear();

        let issues = check_required(&doc, Step::Transport(1));
        assert!(issues.iter().any(|i| i.field == Field::TransporterPlates));

        doc.transporters[0].transport_mode = Some(TransportMode::Rail);
        let issues = check_required(&doc, Step::Transport(1));
        assert!(!issues.iter().any(|i| i.field == Field::TransporterPlates));
    }

    #[test]
    fn sealed_paths_enumeration_is_consistent_with_check_sealed() {
        let mut doc = ready_for_emission();
        doc.emitter_emission_signature_date = Some(TimeStamp::new());
        doc.transporters[0].transport_signature_date = Some(TimeStamp::new());

        let hierarchy = SignatureHierarchy::for_document(&doc);
        let current = hierarchy.current_signature(&doc);
        let sealed = sealed_field_paths(&doc, current, &ActorRoles::default());

        assert!(sealed.contains(&Field::WasteCode.at(None)));
        assert!(sealed.contains(&Field::TransporterCompanyName.at(Some(1))));
        assert!(!sealed.contains(&Field::DestinationReceptionDate.at(None)));
    }
}
