//! Diff engine: which fields does an incoming update actually change?
//!
//! The comparison is deliberately asymmetric: only keys present in the patch
//! are considered, and a present key counts as changed only when its value
//! differs from the persisted one. Resubmitting an unchanged form therefore
//! diffs to nothing, while a real mutation of a frozen value shows up.
use super::document::{
    Company, CompanyWithRecepisse, Document, Recepisse, TimeStamp, TransportMode, Transporter,
    Weight,
};
use super::field::{Field, FieldPath};
use chrono::Utc;

/// Editable slice of a transporter entry. Signature slots are not part of
/// the input; `apply` carries them over from the persisted entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransporterInput {
    pub company: Company,
    pub recepisse: Option<Recepisse>,
    pub transport_mode: Option<TransportMode>,
    pub plates: Vec<String>,
    pub taken_over_at: Option<TimeStamp<Utc>>,
}

impl TransporterInput {
    pub fn from_persisted(t: &Transporter) -> Self {
        Self {
            company: t.company.clone(),
            recepisse: t.recepisse.clone(),
            transport_mode: t.transport_mode,
            plates: t.plates.clone(),
            taken_over_at: t.taken_over_at.clone(),
        }
    }
}

/// Caller-owned update. `None` means the key was absent from the input, not
/// that the value should be cleared; already-set optional fields are
/// replaced, never erased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub emitter_company_name: Option<String>,
    pub emitter_company_siret: Option<String>,
    pub emitter_company_address: Option<String>,
    pub emitter_company_contact: Option<String>,
    pub emitter_company_phone: Option<String>,
    pub emitter_company_mail: Option<String>,
    pub emitter_agrement_number: Option<String>,
    pub emitter_not_on_platform: Option<bool>,

    pub waste_code: Option<String>,
    pub identification_numbers: Option<Vec<String>>,
    pub quantity: Option<u32>,
    pub weight: Option<Weight>,

    pub transporters: Option<Vec<TransporterInput>>,

    pub destination_company_name: Option<String>,
    pub destination_company_siret: Option<String>,
    pub destination_company_address: Option<String>,
    pub destination_company_contact: Option<String>,
    pub destination_company_phone: Option<String>,
    pub destination_company_mail: Option<String>,
    pub destination_agrement_number: Option<String>,
    pub destination_reception_date: Option<TimeStamp<Utc>>,
    pub destination_acceptation_status: Option<super::document::Acceptation>,
    pub destination_refusal_reason: Option<String>,
    pub destination_reception_weight_kg: Option<u64>,
    pub destination_operation_code: Option<String>,
    pub destination_operation_date: Option<TimeStamp<Utc>>,

    pub broker: Option<CompanyWithRecepisse>,
    pub trader: Option<CompanyWithRecepisse>,
    pub eco_organisme: Option<Company>,
}

// a present key against an optional persisted value
fn differs_opt<T: PartialEq>(patch: &Option<T>, current: &Option<T>) -> bool {
    match patch {
        Some(v) => current.as_ref() != Some(v),
        None => false,
    }
}

// a present key against a plain persisted value
fn differs<T: PartialEq>(patch: &Option<T>, current: &T) -> bool {
    patch.as_ref().is_some_and(|v| v != current)
}

/// Set of field paths the patch actually changes, deduplicated, in first
/// occurrence order. The persisted snapshot is never mutated.
pub fn changed_fields(patch: &DocumentPatch, persisted: &Document) -> Vec<FieldPath> {
    let mut changed = Vec::new();
    let mut push = |field: Field, idx: Option<u32>| {
        let path = field.at(idx);
        if !changed.contains(&path) {
            changed.push(path);
        }
    };

    macro_rules! diff_opt {
        ($field:expr, $patch_field:ident, $($target:ident).+) => {
            if differs_opt(&patch.$patch_field, &persisted.$($target).+) {
                push($field, None);
            }
        };
    }
    macro_rules! diff_val {
        ($field:expr, $patch_field:ident, $($target:ident).+) => {
            if differs(&patch.$patch_field, &persisted.$($target).+) {
                push($field, None);
            }
        };
    }

    diff_opt!(Field::EmitterCompanyName, emitter_company_name, emitter_company.name);
    diff_opt!(Field::EmitterCompanySiret, emitter_company_siret, emitter_company.siret);
    diff_opt!(Field::EmitterCompanyAddress, emitter_company_address, emitter_company.address);
    diff_opt!(Field::EmitterCompanyContact, emitter_company_contact, emitter_company.contact);
    diff_opt!(Field::EmitterCompanyPhone, emitter_company_phone, emitter_company.phone);
    diff_opt!(Field::EmitterCompanyMail, emitter_company_mail, emitter_company.mail);
    diff_opt!(Field::EmitterAgrementNumber, emitter_agrement_number, emitter_agrement_number);
    diff_val!(Field::EmitterNotOnPlatform, emitter_not_on_platform, emitter_not_on_platform);

    diff_opt!(Field::WasteCode, waste_code, waste_code);
    diff_val!(Field::IdentificationNumbers, identification_numbers, identification_numbers);
    diff_val!(Field::Quantity, quantity, quantity);
    diff_opt!(Field::Weight, weight, weight);

    diff_opt!(Field::DestinationCompanyName, destination_company_name, destination_company.name);
    diff_opt!(Field::DestinationCompanySiret, destination_company_siret, destination_company.siret);
    diff_opt!(
        Field::DestinationCompanyAddress,
        destination_company_address,
        destination_company.address
    );
    diff_opt!(
        Field::DestinationCompanyContact,
        destination_company_contact,
        destination_company.contact
    );
    diff_opt!(Field::DestinationCompanyPhone, destination_company_phone, destination_company.phone);
    diff_opt!(Field::DestinationCompanyMail, destination_company_mail, destination_company.mail);
    diff_opt!(
        Field::DestinationAgrementNumber,
        destination_agrement_number,
        destination_agrement_number
    );
    diff_opt!(
        Field::DestinationReceptionDate,
        destination_reception_date,
        destination_reception_date
    );
    diff_opt!(
        Field::DestinationAcceptationStatus,
        destination_acceptation_status,
        destination_acceptation_status
    );
    diff_opt!(
        Field::DestinationRefusalReason,
        destination_refusal_reason,
        destination_refusal_reason
    );
    diff_opt!(
        Field::DestinationReceptionWeight,
        destination_reception_weight_kg,
        destination_reception_weight_kg
    );
    diff_opt!(
        Field::DestinationOperationCode,
        destination_operation_code,
        destination_operation_code
    );
    diff_opt!(
        Field::DestinationOperationDate,
        destination_operation_date,
        destination_operation_date
    );

    diff_opt!(Field::Broker, broker, broker);
    diff_opt!(Field::Trader, trader, trader);
    diff_opt!(Field::EcoOrganisme, eco_organisme, eco_organisme);

    if let Some(inputs) = &patch.transporters {
        if inputs.len() != persisted.transporters.len() {
            push(Field::Transporters, None);
        }
        for (i, current) in persisted.transporters.iter().enumerate() {
            let idx = Some(i as u32 + 1);
            match inputs.get(i) {
                Some(input) => {
                    let leaf_checks = [
                        (
                            Field::TransporterCompanyName,
                            input.company.name != current.company.name,
                        ),
                        (
                            Field::TransporterCompanySiret,
                            input.company.siret != current.company.siret,
                        ),
                        (
                            Field::TransporterCompanyAddress,
                            input.company.address != current.company.address,
                        ),
                        (
                            Field::TransporterCompanyContact,
                            input.company.contact != current.company.contact,
                        ),
                        (
                            Field::TransporterCompanyPhone,
                            input.company.phone != current.company.phone,
                        ),
                        (
                            Field::TransporterCompanyMail,
                            input.company.mail != current.company.mail,
                        ),
                        (
                            Field::TransporterRecepisse,
                            input.recepisse != current.recepisse,
                        ),
                        (
                            Field::TransporterTransportMode,
                            input.transport_mode != current.transport_mode,
                        ),
                        (Field::TransporterPlates, input.plates != current.plates),
                        (
                            Field::TransporterTakenOverAt,
                            input.taken_over_at != current.taken_over_at,
                        ),
                    ];
                    for (field, is_changed) in leaf_checks {
                        if is_changed {
                            push(field, idx);
                        }
                    }
                }
                // entry removed: every leaf of the dropped entry changes
                None => {
                    push(Field::TransporterCompanyName, idx);
                    push(Field::TransporterCompanySiret, idx);
                    push(Field::TransporterCompanyAddress, idx);
                    push(Field::TransporterCompanyContact, idx);
                    push(Field::TransporterCompanyPhone, idx);
                    push(Field::TransporterCompanyMail, idx);
                    push(Field::TransporterRecepisse, idx);
                    push(Field::TransporterTransportMode, idx);
                    push(Field::TransporterPlates, idx);
                    push(Field::TransporterTakenOverAt, idx);
                }
            }
        }
    }

    changed
}

/// Merge a validated patch into a copy of the persisted document. Signature
/// slots on surviving transporter entries are carried over untouched.
pub fn apply(patch: &DocumentPatch, persisted: &Document) -> Document {
    let mut doc = persisted.clone();

    macro_rules! set_opt {
        ($($patch_field:ident => $($target:ident).+),+ $(,)?) => {
            $(if let Some(v) = &patch.$patch_field {
                doc.$($target).+ = Some(v.clone());
            })+
        };
    }

    set_opt! {
        emitter_company_name => emitter_company.name,
        emitter_company_siret => emitter_company.siret,
        emitter_company_address => emitter_company.address,
        emitter_company_contact => emitter_company.contact,
        emitter_company_phone => emitter_company.phone,
        emitter_company_mail => emitter_company.mail,
        emitter_agrement_number => emitter_agrement_number,
        waste_code => waste_code,
        destination_company_name => destination_company.name,
        destination_company_siret => destination_company.siret,
        destination_company_address => destination_company.address,
        destination_company_contact => destination_company.contact,
        destination_company_phone => destination_company.phone,
        destination_company_mail => destination_company.mail,
        destination_agrement_number => destination_agrement_number,
        destination_reception_date => destination_reception_date,
        destination_refusal_reason => destination_refusal_reason,
        destination_operation_code => destination_operation_code,
        destination_operation_date => destination_operation_date,
        broker => broker,
        trader => trader,
        eco_organisme => eco_organisme,
    }

    if let Some(v) = patch.emitter_not_on_platform {
        doc.emitter_not_on_platform = v;
    }
    if let Some(v) = &patch.identification_numbers {
        doc.identification_numbers = v.clone();
    }
    if let Some(v) = patch.quantity {
        doc.quantity = v;
    }
    if let Some(v) = patch.weight {
        doc.weight = Some(v);
    }
    if let Some(v) = patch.destination_acceptation_status {
        doc.destination_acceptation_status = Some(v);
    }
    if let Some(v) = patch.destination_reception_weight_kg {
        doc.destination_reception_weight_kg = Some(v);
    }

    if let Some(inputs) = &patch.transporters {
        doc.transporters = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let (sig_date, sig_author) = persisted
                    .transporters
                    .get(i)
                    .map(|t| {
                        (
                            t.transport_signature_date.clone(),
                            t.transport_signature_author.clone(),
                        )
                    })
                    .unwrap_or((None, None));
                Transporter {
                    company: input.company.clone(),
                    recepisse: input.recepisse.clone(),
                    transport_mode: input.transport_mode,
                    plates: input.plates.clone(),
                    taken_over_at: input.taken_over_at.clone(),
                    transport_signature_date: sig_date,
                    transport_signature_author: sig_author,
                }
            })
            .collect();
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_doc() -> Document {
        let mut doc = Document::new("vhu_test".into(), 1234);
        doc.waste_code = Some("16 01 06".into());
        doc.emitter_company.name = Some("Casse Auto".into());
        doc.transporters.push(Transporter {
            company: Company {
                name: Some("Trans SARL".into()),
                siret: Some("11111111100011".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        doc
    }

    #[test]
    fn absent_keys_never_diff() {
        let doc = base_doc();
        assert!(changed_fields(&DocumentPatch::default(), &doc).is_empty());
    }

    #[test]
    fn resubmitting_the_same_value_is_not_a_change() {
        let doc = base_doc();
        let patch = DocumentPatch {
            waste_code: Some("16 01 06".into()),
            emitter_company_name: Some("Casse Auto".into()),
            ..Default::default()
        };
        assert!(changed_fields(&patch, &doc).is_empty());
    }

    #[test]
    fn real_mutation_is_a_change() {
        let doc = base_doc();
        let patch = DocumentPatch {
            waste_code: Some("16 01 04*".into()),
            ..Default::default()
        };
        assert_eq!(
            changed_fields(&patch, &doc),
            vec![Field::WasteCode.at(None)]
        );
    }

    #[test]
    fn transporter_leaf_changes_carry_the_index() {
        let doc = base_doc();
        let mut input = TransporterInput::from_persisted(&doc.transporters[0]);
        input.company.name = Some("Autre Trans".into());

        let patch = DocumentPatch {
            transporters: Some(vec![input]),
            ..Default::default()
        };
        assert_eq!(
            changed_fields(&patch, &doc),
            vec![Field::TransporterCompanyName.at(Some(1))]
        );
    }

    #[test]
    fn appending_a_transporter_only_touches_membership() {
        let doc = base_doc();
        let existing = TransporterInput::from_persisted(&doc.transporters[0]);
        let patch = DocumentPatch {
            transporters: Some(vec![existing, TransporterInput::default()]),
            ..Default::default()
        };
        assert_eq!(
            changed_fields(&patch, &doc),
            vec![Field::Transporters.at(None)]
        );
    }

    #[test]
    fn removing_a_transporter_touches_its_leaves() {
        let doc = base_doc();
        let patch = DocumentPatch {
            transporters: Some(vec![]),
            ..Default::default()
        };
        let changed = changed_fields(&patch, &doc);
        assert!(changed.contains(&Field::Transporters.at(None)));
        assert!(changed.contains(&Field::TransporterCompanyName.at(Some(1))));
    }

    #[test]
    fn apply_preserves_signature_slots() {
        let mut doc = base_doc();
        doc.transporters[0].transport_signature_date = Some(TimeStamp::new());
        doc.transporters[0].transport_signature_author = Some("11111111100011".into());

        let mut input = TransporterInput::from_persisted(&doc.transporters[0]);
        input.plates = vec!["AB-123-CD".into()];
        let patch = DocumentPatch {
            transporters: Some(vec![input]),
            ..Default::default()
        };

        let updated = apply(&patch, &doc);
        assert_eq!(updated.transporters[0].plates, vec!["AB-123-CD".to_string()]);
        assert!(updated.transporters[0].transport_signature_date.is_some());
    }

    #[test]
    fn apply_never_mutates_the_snapshot() {
        let doc = base_doc();
        let patch = DocumentPatch {
            quantity: Some(3),
            ..Default::default()
        };
        let before = doc.clone();
        let _ = apply(&patch, &doc);
        assert_eq!(doc, before);
    }
}
