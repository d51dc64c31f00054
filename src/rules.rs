//! Per-field sealing and requirement rules.
//!
//! Each rule anchors a field to the signature step that freezes it (`sealed`)
//! and, optionally, to the step that demands it (`required`). Both anchors
//! may be functions of the whole document and of who is asking, and both may
//! carry a `when` gate. `rule_for` matches exhaustively on [`Field`], so the
//! compiler enforces that every field has exactly one entry.
use chrono::{TimeZone, Utc};

use super::document::{Acceptation, Document, TransportMode};
use super::field::Field;
use super::hierarchy::Step;

/// Who is editing, resolved by the caller's authorization layer. Role groups
/// are used only here (and for signature authorization), never for rule
/// lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorRoles {
    pub is_emitter: bool,
    pub is_transporter: bool,
    pub is_destination: bool,
    pub is_broker: bool,
    pub is_trader: bool,
    pub is_eco_organisme: bool,
}

/// Evaluation context for rule predicates: the acting party and, for
/// transporter-scoped fields, the 1-based index of the entry being checked.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub actor: ActorRoles,
    pub transporter_index: Option<u32>,
}

impl RuleContext {
    pub fn new(actor: ActorRoles, transporter_index: Option<u32>) -> Self {
        Self {
            actor,
            transporter_index,
        }
    }

    fn transport_step(&self) -> Step {
        Step::Transport(self.transporter_index.unwrap_or(1))
    }
}

/// The anchoring step of a rule: a literal step name, or a function when the
/// anchor depends on the document or on the acting party.
#[derive(Clone, Copy)]
pub enum RuleFrom {
    Step(Step),
    Fn(fn(&Document, &RuleContext) -> Step),
}

#[derive(Clone, Copy)]
pub struct Rule {
    pub from: RuleFrom,
    pub when: Option<fn(&Document, &RuleContext) -> bool>,
    pub message: Option<&'static str>,
}

impl Rule {
    const fn from_step(step: Step) -> Self {
        Self {
            from: RuleFrom::Step(step),
            when: None,
            message: None,
        }
    }

    const fn from_fn(f: fn(&Document, &RuleContext) -> Step) -> Self {
        Self {
            from: RuleFrom::Fn(f),
            when: None,
            message: None,
        }
    }

    const fn when(mut self, gate: fn(&Document, &RuleContext) -> bool) -> Self {
        self.when = Some(gate);
        self
    }

    const fn message(mut self, msg: &'static str) -> Self {
        self.message = Some(msg);
        self
    }

    pub fn resolve_from(&self, doc: &Document, ctx: &RuleContext) -> Step {
        match self.from {
            RuleFrom::Step(step) => step,
            RuleFrom::Fn(f) => f(doc, ctx),
        }
    }

    pub fn applies(&self, doc: &Document, ctx: &RuleContext) -> bool {
        self.when.map(|gate| gate(doc, ctx)).unwrap_or(true)
    }
}

pub struct FieldRules {
    pub sealed: Rule,
    pub required: Option<Rule>,
}

impl FieldRules {
    const fn new(sealed: Rule) -> Self {
        Self {
            sealed,
            required: None,
        }
    }

    const fn required(mut self, rule: Rule) -> Self {
        self.required = Some(rule);
        self
    }
}

/// Documents created before this date predate the reception-weight mandate
/// and stay valid without it. Cutover dates are the supported way to tighten
/// rules without invalidating already-published documents.
pub fn reception_weight_cutover() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

// emitter fields stay editable by the emitter until the first transporter
// takes over; everyone else loses them at emission. An emitter in irregular
// situation never signs, so the anchor shifts to transport for everyone.
fn emitter_sealed_from(doc: &Document, ctx: &RuleContext) -> Step {
    if ctx.actor.is_emitter || doc.emitter_not_on_platform {
        Step::Transport(1)
    } else {
        Step::Emission
    }
}

// emission-anchored data is attested by the emission signature; with a
// skipped emitter it is the first transporter who attests it instead.
fn emission_sealed_from(doc: &Document, _ctx: &RuleContext) -> Step {
    if doc.emitter_not_on_platform {
        Step::Transport(1)
    } else {
        Step::Emission
    }
}

fn transporter_sealed_from(_doc: &Document, ctx: &RuleContext) -> Step {
    ctx.transport_step()
}

fn emitter_on_platform(doc: &Document, _ctx: &RuleContext) -> bool {
    !doc.emitter_not_on_platform
}

fn transport_by_road(doc: &Document, ctx: &RuleContext) -> bool {
    ctx.transporter_index
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| doc.transporters.get(i as usize))
        .is_some_and(|t| t.transport_mode == Some(TransportMode::Road))
}

fn was_refused_or_partially(doc: &Document, _ctx: &RuleContext) -> bool {
    matches!(
        doc.destination_acceptation_status,
        Some(Acceptation::Refused) | Some(Acceptation::PartiallyRefused)
    )
}

fn was_not_refused(doc: &Document, _ctx: &RuleContext) -> bool {
    doc.destination_acceptation_status != Some(Acceptation::Refused)
}

fn created_after_reception_weight_cutover(doc: &Document, _ctx: &RuleContext) -> bool {
    doc.created_at.to_datetime_utc() >= reception_weight_cutover()
}

/// The rule table. One entry per field, checked exhaustive by the compiler.
pub fn rule_for(field: Field) -> FieldRules {
    match field {
        // --- emitter group ---------------------------------------------
        Field::EmitterCompanyName => FieldRules::new(Rule::from_fn(emitter_sealed_from)).required(
            Rule::from_step(Step::Emission)
                .when(emitter_on_platform)
                .message("emitter company name is required"),
        ),
        Field::EmitterCompanySiret => FieldRules::new(Rule::from_fn(emitter_sealed_from))
            .required(
                Rule::from_step(Step::Emission)
                    .when(emitter_on_platform)
                    .message("emitter company SIRET is required"),
            ),
        Field::EmitterCompanyAddress => FieldRules::new(Rule::from_fn(emitter_sealed_from))
            .required(
                Rule::from_step(Step::Emission)
                    .when(emitter_on_platform)
                    .message("emitter company address is required"),
            ),
        Field::EmitterCompanyContact => FieldRules::new(Rule::from_fn(emitter_sealed_from)),
        Field::EmitterCompanyPhone => FieldRules::new(Rule::from_fn(emitter_sealed_from)),
        Field::EmitterCompanyMail => FieldRules::new(Rule::from_fn(emitter_sealed_from)),
        Field::EmitterAgrementNumber => FieldRules::new(Rule::from_fn(emitter_sealed_from))
            .required(
                Rule::from_step(Step::Emission)
                    .when(emitter_on_platform)
                    .message("emitter agrement number is required"),
            ),
        Field::EmitterNotOnPlatform => FieldRules::new(Rule::from_fn(emission_sealed_from)),

        // --- waste group ------------------------------------------------
        Field::WasteCode => FieldRules::new(Rule::from_fn(emission_sealed_from)).required(
            Rule::from_step(Step::Emission).message("waste code is required"),
        ),
        Field::IdentificationNumbers => FieldRules::new(Rule::from_fn(emission_sealed_from))
            .required(
                Rule::from_step(Step::Emission)
                    .message("at least one identification number is required"),
            ),
        Field::Quantity => FieldRules::new(Rule::from_fn(emission_sealed_from)).required(
            Rule::from_step(Step::Emission).message("quantity must be greater than zero"),
        ),
        Field::Weight => FieldRules::new(Rule::from_fn(emission_sealed_from)).required(
            Rule::from_step(Step::Emission).message("weight is required"),
        ),

        // --- transporter list -------------------------------------------
        // membership stays open until reception so an extra transport leg
        // can be appended mid-route; signed entries are locked field by
        // field below.
        Field::Transporters => FieldRules::new(Rule::from_step(Step::Reception)).required(
            Rule::from_step(Step::Transport(1))
                .message("at least one transporter is required"),
        ),

        // --- per-transporter leaves --------------------------------------
        Field::TransporterCompanyName => FieldRules::new(Rule::from_fn(transporter_sealed_from))
            .required(
                Rule::from_fn(transporter_sealed_from)
                    .message("transporter company name is required"),
            ),
        Field::TransporterCompanySiret => FieldRules::new(Rule::from_fn(transporter_sealed_from))
            .required(
                Rule::from_fn(transporter_sealed_from)
                    .message("transporter company SIRET is required"),
            ),
        Field::TransporterCompanyAddress => {
            FieldRules::new(Rule::from_fn(transporter_sealed_from))
        }
        Field::TransporterCompanyContact => {
            FieldRules::new(Rule::from_fn(transporter_sealed_from))
        }
        Field::TransporterCompanyPhone => FieldRules::new(Rule::from_fn(transporter_sealed_from)),
        Field::TransporterCompanyMail => FieldRules::new(Rule::from_fn(transporter_sealed_from)),
        Field::TransporterRecepisse => FieldRules::new(Rule::from_fn(transporter_sealed_from)),
        Field::TransporterTransportMode => FieldRules::new(Rule::from_fn(transporter_sealed_from))
            .required(
                Rule::from_fn(transporter_sealed_from).message("transport mode is required"),
            ),
        Field::TransporterPlates => FieldRules::new(Rule::from_fn(transporter_sealed_from))
            .required(
                Rule::from_fn(transporter_sealed_from)
                    .when(transport_by_road)
                    .message("licence plates are required for road transport"),
            ),
        Field::TransporterTakenOverAt => FieldRules::new(Rule::from_fn(transporter_sealed_from))
            .required(
                Rule::from_fn(transporter_sealed_from)
                    .message("takeover date is required"),
            ),

        // --- destination group -------------------------------------------
        Field::DestinationCompanyName => FieldRules::new(Rule::from_fn(emission_sealed_from))
            .required(
                Rule::from_step(Step::Emission).message("destination company name is required"),
            ),
        Field::DestinationCompanySiret => FieldRules::new(Rule::from_fn(emission_sealed_from))
            .required(
                Rule::from_step(Step::Emission).message("destination company SIRET is required"),
            ),
        Field::DestinationCompanyAddress => FieldRules::new(Rule::from_fn(emission_sealed_from)),
        Field::DestinationCompanyContact => FieldRules::new(Rule::from_fn(emission_sealed_from)),
        Field::DestinationCompanyPhone => FieldRules::new(Rule::from_fn(emission_sealed_from)),
        Field::DestinationCompanyMail => FieldRules::new(Rule::from_fn(emission_sealed_from)),
        Field::DestinationAgrementNumber => FieldRules::new(Rule::from_fn(emission_sealed_from))
            .required(
                Rule::from_step(Step::Emission)
                    .message("destination agrement number is required"),
            ),
        Field::DestinationReceptionDate => FieldRules::new(Rule::from_step(Step::Reception))
            .required(
                Rule::from_step(Step::Reception).message("reception date is required"),
            ),
        Field::DestinationAcceptationStatus => FieldRules::new(Rule::from_step(Step::Reception))
            .required(
                Rule::from_step(Step::Reception).message("acceptation status is required"),
            ),
        Field::DestinationRefusalReason => FieldRules::new(Rule::from_step(Step::Reception))
            .required(
                Rule::from_step(Step::Reception)
                    .when(was_refused_or_partially)
                    .message("a refusal reason is required when the waste is not fully accepted"),
            ),
        Field::DestinationReceptionWeight => FieldRules::new(Rule::from_step(Step::Reception))
            .required(
                Rule::from_step(Step::Reception)
                    .when(created_after_reception_weight_cutover)
                    .message("reception weight is required"),
            ),
        Field::DestinationOperationCode => FieldRules::new(Rule::from_step(Step::Operation))
            .required(
                Rule::from_step(Step::Operation)
                    .when(was_not_refused)
                    .message("operation code is required"),
            ),
        Field::DestinationOperationDate => FieldRules::new(Rule::from_step(Step::Operation))
            .required(
                Rule::from_step(Step::Operation)
                    .when(was_not_refused)
                    .message("operation date is required"),
            ),

        // --- optional parties --------------------------------------------
        Field::Broker => FieldRules::new(Rule::from_step(Step::Operation)),
        Field::Trader => FieldRules::new(Rule::from_step(Step::Operation)),
        Field::EcoOrganisme => FieldRules::new(Rule::from_fn(emission_sealed_from)),
    }
}
