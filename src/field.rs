//! Closed set of editable document fields.
//!
//! Every editable leaf (or small group) of [`Document`] has exactly one
//! variant here. The rule table in `rules.rs` matches exhaustively on this
//! enum, so a new field that lacks a rule fails to compile, and the
//! `Field::ALL` walk in the test suite catches the reverse direction.
use std::fmt;

use super::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    // emitter group
    EmitterCompanyName,
    EmitterCompanySiret,
    EmitterCompanyAddress,
    EmitterCompanyContact,
    EmitterCompanyPhone,
    EmitterCompanyMail,
    EmitterAgrementNumber,
    EmitterNotOnPlatform,

    // waste group
    WasteCode,
    IdentificationNumbers,
    Quantity,
    Weight,

    // transporter list membership
    Transporters,

    // per-transporter leaves, addressed with a 1-based index
    TransporterCompanyName,
    TransporterCompanySiret,
    TransporterCompanyAddress,
    TransporterCompanyContact,
    TransporterCompanyPhone,
    TransporterCompanyMail,
    TransporterRecepisse,
    TransporterTransportMode,
    TransporterPlates,
    TransporterTakenOverAt,

    // destination group
    DestinationCompanyName,
    DestinationCompanySiret,
    DestinationCompanyAddress,
    DestinationCompanyContact,
    DestinationCompanyPhone,
    DestinationCompanyMail,
    DestinationAgrementNumber,
    DestinationReceptionDate,
    DestinationAcceptationStatus,
    DestinationRefusalReason,
    DestinationReceptionWeight,
    DestinationOperationCode,
    DestinationOperationDate,

    // whole optional groups
    Broker,
    Trader,
    EcoOrganisme,
}

impl Field {
    pub const ALL: [Field; 39] = [
        Field::EmitterCompanyName,
        Field::EmitterCompanySiret,
        Field::EmitterCompanyAddress,
        Field::EmitterCompanyContact,
        Field::EmitterCompanyPhone,
        Field::EmitterCompanyMail,
        Field::EmitterAgrementNumber,
        Field::EmitterNotOnPlatform,
        Field::WasteCode,
        Field::IdentificationNumbers,
        Field::Quantity,
        Field::Weight,
        Field::Transporters,
        Field::TransporterCompanyName,
        Field::TransporterCompanySiret,
        Field::TransporterCompanyAddress,
        Field::TransporterCompanyContact,
        Field::TransporterCompanyPhone,
        Field::TransporterCompanyMail,
        Field::TransporterRecepisse,
        Field::TransporterTransportMode,
        Field::TransporterPlates,
        Field::TransporterTakenOverAt,
        Field::DestinationCompanyName,
        Field::DestinationCompanySiret,
        Field::DestinationCompanyAddress,
        Field::DestinationCompanyContact,
        Field::DestinationCompanyPhone,
        Field::DestinationCompanyMail,
        Field::DestinationAgrementNumber,
        Field::DestinationReceptionDate,
        Field::DestinationAcceptationStatus,
        Field::DestinationRefusalReason,
        Field::DestinationReceptionWeight,
        Field::DestinationOperationCode,
        Field::DestinationOperationDate,
        Field::Broker,
        Field::Trader,
        Field::EcoOrganisme,
    ];

    /// True for fields addressed per transporter (need an index in the path).
    pub fn is_transporter_scoped(self) -> bool {
        matches!(
            self,
            Field::TransporterCompanyName
                | Field::TransporterCompanySiret
                | Field::TransporterCompanyAddress
                | Field::TransporterCompanyContact
                | Field::TransporterCompanyPhone
                | Field::TransporterCompanyMail
                | Field::TransporterRecepisse
                | Field::TransporterTransportMode
                | Field::TransporterPlates
                | Field::TransporterTakenOverAt
        )
    }

    /// Stable dotted path stem. Transporter-scoped stems are relative to the
    /// indexed entry, see [`FieldPath`] for the rendered form.
    pub fn path_stem(self) -> &'static str {
        match self {
            Field::EmitterCompanyName => "emitter.company.name",
            Field::EmitterCompanySiret => "emitter.company.siret",
            Field::EmitterCompanyAddress => "emitter.company.address",
            Field::EmitterCompanyContact => "emitter.company.contact",
            Field::EmitterCompanyPhone => "emitter.company.phone",
            Field::EmitterCompanyMail => "emitter.company.mail",
            Field::EmitterAgrementNumber => "emitter.agrement_number",
            Field::EmitterNotOnPlatform => "emitter.not_on_platform",
            Field::WasteCode => "waste.code",
            Field::IdentificationNumbers => "waste.identification_numbers",
            Field::Quantity => "waste.quantity",
            Field::Weight => "waste.weight",
            Field::Transporters => "transporters",
            Field::TransporterCompanyName => "company.name",
            Field::TransporterCompanySiret => "company.siret",
            Field::TransporterCompanyAddress => "company.address",
            Field::TransporterCompanyContact => "company.contact",
            Field::TransporterCompanyPhone => "company.phone",
            Field::TransporterCompanyMail => "company.mail",
            Field::TransporterRecepisse => "recepisse",
            Field::TransporterTransportMode => "transport_mode",
            Field::TransporterPlates => "plates",
            Field::TransporterTakenOverAt => "taken_over_at",
            Field::DestinationCompanyName => "destination.company.name",
            Field::DestinationCompanySiret => "destination.company.siret",
            Field::DestinationCompanyAddress => "destination.company.address",
            Field::DestinationCompanyContact => "destination.company.contact",
            Field::DestinationCompanyPhone => "destination.company.phone",
            Field::DestinationCompanyMail => "destination.company.mail",
            Field::DestinationAgrementNumber => "destination.agrement_number",
            Field::DestinationReceptionDate => "destination.reception_date",
            Field::DestinationAcceptationStatus => "destination.acceptation_status",
            Field::DestinationRefusalReason => "destination.refusal_reason",
            Field::DestinationReceptionWeight => "destination.reception_weight",
            Field::DestinationOperationCode => "destination.operation_code",
            Field::DestinationOperationDate => "destination.operation_date",
            Field::Broker => "broker",
            Field::Trader => "trader",
            Field::EcoOrganisme => "eco_organisme",
        }
    }

    /// Presence check used by the requirement validator. Arrays count as
    /// present only when non-empty.
    pub fn is_present(self, doc: &Document, transporter: Option<u32>) -> bool {
        // transporter-scoped fields read the indexed entry; a missing entry is
        // simply absent (the Transporters rule reports the missing slot).
        let t = transporter
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| doc.transporters.get(i as usize));

        match self {
            Field::EmitterCompanyName => doc.emitter_company.name.is_some(),
            Field::EmitterCompanySiret => doc.emitter_company.siret.is_some(),
            Field::EmitterCompanyAddress => doc.emitter_company.address.is_some(),
            Field::EmitterCompanyContact => doc.emitter_company.contact.is_some(),
            Field::EmitterCompanyPhone => doc.emitter_company.phone.is_some(),
            Field::EmitterCompanyMail => doc.emitter_company.mail.is_some(),
            Field::EmitterAgrementNumber => doc.emitter_agrement_number.is_some(),
            Field::EmitterNotOnPlatform => true,
            Field::WasteCode => doc.waste_code.is_some(),
            Field::IdentificationNumbers => !doc.identification_numbers.is_empty(),
            Field::Quantity => doc.quantity > 0,
            Field::Weight => doc.weight.is_some(),
            Field::Transporters => !doc.transporters.is_empty(),
            Field::TransporterCompanyName => t.is_some_and(|t| t.company.name.is_some()),
            Field::TransporterCompanySiret => t.is_some_and(|t| t.company.siret.is_some()),
            Field::TransporterCompanyAddress => t.is_some_and(|t| t.company.address.is_some()),
            Field::TransporterCompanyContact => t.is_some_and(|t| t.company.contact.is_some()),
            Field::TransporterCompanyPhone => t.is_some_and(|t| t.company.phone.is_some()),
            Field::TransporterCompanyMail => t.is_some_and(|t| t.company.mail.is_some()),
            Field::TransporterRecepisse => t.is_some_and(|t| t.recepisse.is_some()),
            Field::TransporterTransportMode => t.is_some_and(|t| t.transport_mode.is_some()),
            Field::TransporterPlates => t.is_some_and(|t| !t.plates.is_empty()),
            Field::TransporterTakenOverAt => t.is_some_and(|t| t.taken_over_at.is_some()),
            Field::DestinationCompanyName => doc.destination_company.name.is_some(),
            Field::DestinationCompanySiret => doc.destination_company.siret.is_some(),
            Field::DestinationCompanyAddress => doc.destination_company.address.is_some(),
            Field::DestinationCompanyContact => doc.destination_company.contact.is_some(),
            Field::DestinationCompanyPhone => doc.destination_company.phone.is_some(),
            Field::DestinationCompanyMail => doc.destination_company.mail.is_some(),
            Field::DestinationAgrementNumber => doc.destination_agrement_number.is_some(),
            Field::DestinationReceptionDate => doc.destination_reception_date.is_some(),
            Field::DestinationAcceptationStatus => doc.destination_acceptation_status.is_some(),
            Field::DestinationRefusalReason => doc.destination_refusal_reason.is_some(),
            Field::DestinationReceptionWeight => doc.destination_reception_weight_kg.is_some(),
            Field::DestinationOperationCode => doc.destination_operation_code.is_some(),
            Field::DestinationOperationDate => doc.destination_operation_date.is_some(),
            Field::Broker => doc.broker.is_some(),
            Field::Trader => doc.trader.is_some(),
            Field::EcoOrganisme => doc.eco_organisme.is_some(),
        }
    }

    /// A field paired with an index where needed.
    pub fn at(self, transporter: Option<u32>) -> FieldPath {
        FieldPath {
            field: self,
            transporter,
        }
    }
}

/// Addressable location of a field on a concrete document. Transporter
/// indexes are 1-based, matching the `TRANSPORT_i` signature steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub field: Field,
    pub transporter: Option<u32>,
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_transporter_scoped() {
            let i = self.transporter.unwrap_or(1);
            write!(f, "transporters[{}].{}", i, self.field.path_stem())
        } else {
            write!(f, "{}", self.field.path_stem())
        }
    }
}
