//! Service layer API for document workflow operations.
//!
//! Wires the pure engine (diff, sealing, requirements, transition machine)
//! to its collaborators: sled persistence, the receipt directory and the
//! search-index notifier. Per-document mutation is serialized with an
//! optimistic precondition: the stored bytes must still be the ones the
//! computation was based on, otherwise the caller gets a conflict and must
//! retry with fresh data.
use chrono::Utc;
use sled::Batch;
use std::sync::Arc;

use super::diff::{DocumentPatch, apply, changed_fields};
use super::document::{Document, TimeStamp};
use super::error::WorkflowError;
use super::hierarchy::{SignatureHierarchy, Step};
use super::machine::{SignatureKind, transition};
use super::recipify::{ReceiptDirectory, recipify};
use super::rules::ActorRoles;
use super::utils;
use super::validation::{check_required, check_sealed, sealed_field_paths};

/// A signature attempt by an external actor. `author` is the signing
/// company's org id; the security code is the fallback for actors signing on
/// a device of another party.
#[derive(Debug, Clone)]
pub struct SignatureEvent {
    pub kind: SignatureKind,
    pub author: String,
    pub date: TimeStamp<Utc>,
    pub security_code: Option<u32>,
}

/// Fire-and-forget post-commit notification, keyed by document id.
pub trait IndexNotifier {
    fn document_updated(&self, document_id: &str);
}

pub struct NoopNotifier;

impl IndexNotifier for NoopNotifier {
    fn document_updated(&self, _document_id: &str) {}
}

/// Side-effect log entry written next to every persisted mutation.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct EventRecord {
    #[n(0)]
    pub kind: String,
    #[n(1)]
    pub changed: Vec<String>, // field paths the mutation touched
    #[n(2)]
    pub digest: String, // sha256 of the persisted document bytes
    #[n(3)]
    pub author: Option<String>,
    #[n(4)]
    pub at: TimeStamp<Utc>,
}

pub struct DocumentService {
    instance: Arc<sled::Db>,
    directory: Arc<dyn ReceiptDirectory>,
    notifier: Arc<dyn IndexNotifier>,
}

fn decode_document(bytes: &[u8]) -> Result<Document, WorkflowError> {
    minicbor::decode(bytes).map_err(|e| WorkflowError::Codec(e.to_string()))
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, WorkflowError> {
    minicbor::to_vec(value).map_err(|e| WorkflowError::Codec(e.to_string()))
}

impl DocumentService {
    pub fn new(instance: Arc<sled::Db>, directory: Arc<dyn ReceiptDirectory>) -> Self {
        Self {
            instance,
            directory,
            notifier: Arc::new(NoopNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn IndexNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn load(&self, id: &str) -> Result<(Document, sled::IVec), WorkflowError> {
        let bytes = self
            .instance
            .get(id.as_bytes())?
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        let doc = decode_document(&bytes)?;
        Ok((doc, bytes))
    }

    pub fn get_document(&self, id: &str) -> anyhow::Result<Document> {
        let (doc, _) = self.load(id)?;
        Ok(doc)
    }

    /// Create a new draft document from the given input.
    pub fn create_document(&self, input: DocumentPatch) -> anyhow::Result<Document> {
        let id = utils::new_uuid_to_bech32("vhu_")?;
        let fresh = Document::new(id, utils::new_security_code());
        let mut doc = apply(&input, &fresh);

        // nothing is signed yet, so nothing is sealed and no requirement
        // applies; the directory still fills the receipt groups
        recipify(&mut doc, &[], self.directory.as_ref());

        let doc_cbor = encode(&doc)?;
        let mut batch = Batch::default();
        batch.insert(doc.id.as_bytes(), doc_cbor.clone());
        let (event_key, event_cbor) = self.event_entry("created", &doc, &doc_cbor, &[], None)?;
        batch.insert(event_key.as_bytes(), event_cbor);
        self.instance.apply_batch(batch)?;

        self.notifier.document_updated(&doc.id);
        Ok(doc)
    }

    /// Apply an update to a persisted document. The whole patch is accepted
    /// or the whole call fails; resubmitting unchanged values for sealed
    /// fields is a valid no-op.
    pub fn update_document(
        &self,
        id: &str,
        patch: DocumentPatch,
        actor: &ActorRoles,
    ) -> anyhow::Result<Document> {
        let (persisted, stored_bytes) = self.load(id)?;

        let changed = changed_fields(&patch, &persisted);
        if changed.is_empty() {
            return Ok(persisted); // idempotent re-save
        }

        check_sealed(&persisted, &patch, actor)?;

        let mut doc = apply(&patch, &persisted);
        let hierarchy = SignatureHierarchy::for_document(&doc);

        let sealed = sealed_field_paths(&doc, hierarchy.current_signature(&doc), actor);
        recipify(&mut doc, &sealed, self.directory.as_ref());

        // requirement check runs after the directory lookups, which may
        // satisfy a requirement the raw input left blank. Only steps with an
        // actual recorded signature are validated, so a merely skipped step
        // does not re-trigger its rules on edits.
        let context = hierarchy.current_explicit_signature(&doc);
        if let Some(context) = context {
            let issues = check_required(&doc, context);
            if !issues.is_empty() {
                return Err(WorkflowError::Validation(issues).into());
            }
        }

        let doc_cbor = encode(&doc)?;
        self.swap(id, &stored_bytes, &doc_cbor)?;

        let changed_paths: Vec<String> = changed.iter().map(|p| p.to_string()).collect();
        self.append_event("updated", &doc, &doc_cbor, &changed_paths, None)?;
        self.notifier.document_updated(id);
        Ok(doc)
    }

    /// Record a signature. Runs authorization, the already-signed check, the
    /// requirement validator for the target step, then the transition
    /// machine, and persists with the optimistic status precondition.
    pub fn sign(&self, id: &str, event: SignatureEvent) -> anyhow::Result<Document> {
        let (persisted, stored_bytes) = self.load(id)?;
        let hierarchy = SignatureHierarchy::for_document(&persisted);

        let target = self.resolve_target(&hierarchy, &persisted, event.kind)?;
        if SignatureHierarchy::is_explicitly_signed(&persisted, target) {
            return Err(WorkflowError::AlreadySigned(target).into());
        }

        self.authorize(&persisted, target, &event)?;

        let issues = check_required(&persisted, target);
        if !issues.is_empty() {
            return Err(WorkflowError::Validation(issues).into());
        }

        let next_status = transition(persisted.status, event.kind, &persisted)?;

        let mut doc = persisted.clone();
        doc.status = next_status;
        doc.is_draft = false;
        Self::record_signature(&mut doc, target, &event);

        let doc_cbor = encode(&doc)?;
        self.swap(id, &stored_bytes, &doc_cbor)?;

        let kind = format!("signed:{target}");
        self.append_event(&kind, &doc, &doc_cbor, &[], Some(event.author))?;
        self.notifier.document_updated(id);
        Ok(doc)
    }

    /// Sealed paths for UI affordances, computed on the live document.
    pub fn sealed_fields(&self, id: &str, actor: &ActorRoles) -> anyhow::Result<Vec<String>> {
        let (doc, _) = self.load(id)?;
        let hierarchy = SignatureHierarchy::for_document(&doc);
        let sealed = sealed_field_paths(&doc, hierarchy.current_signature(&doc), actor);
        Ok(sealed.iter().map(|p| p.to_string()).collect())
    }

    /// Side-effect log for one document, oldest first.
    pub fn events(&self, id: &str) -> anyhow::Result<Vec<EventRecord>> {
        let prefix = format!("evt/{id}/");
        let mut events = Vec::new();
        for entry in self.instance.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            let record: EventRecord =
                minicbor::decode(&bytes).map_err(|e| WorkflowError::Codec(e.to_string()))?;
            events.push(record);
        }
        Ok(events)
    }

    // which step does this event land on? TRANSPORT resolves to the first
    // unsigned transporter slot
    fn resolve_target(
        &self,
        hierarchy: &SignatureHierarchy,
        doc: &Document,
        kind: SignatureKind,
    ) -> Result<Step, WorkflowError> {
        match kind {
            SignatureKind::Emission => Ok(Step::Emission),
            SignatureKind::Transport => hierarchy.next_unsigned_transport(doc).ok_or(
                WorkflowError::AlreadySigned(Step::Transport(doc.transporters.len().max(1) as u32)),
            ),
            SignatureKind::Reception => Ok(Step::Reception),
            SignatureKind::Operation => Ok(Step::Operation),
        }
    }

    fn authorize(
        &self,
        doc: &Document,
        target: Step,
        event: &SignatureEvent,
    ) -> Result<(), WorkflowError> {
        if event.security_code == Some(doc.security_code) {
            return Ok(());
        }
        let authorized = self.authorized_org_ids(doc, target);
        if authorized.iter().any(|org| *org == event.author) {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized {
                kind: match target {
                    Step::Emission => SignatureKind::Emission,
                    Step::Transport(_) => SignatureKind::Transport,
                    Step::Reception => SignatureKind::Reception,
                    Step::Operation => SignatureKind::Operation,
                },
                author: event.author.clone(),
            })
        }
    }

    fn authorized_org_ids(&self, doc: &Document, target: Step) -> Vec<String> {
        match target {
            Step::Emission => {
                let mut orgs: Vec<String> = doc.emitter_company.siret.iter().cloned().collect();
                if let Some(eco) = &doc.eco_organisme {
                    orgs.extend(eco.siret.iter().cloned());
                }
                orgs
            }
            Step::Transport(i) => i
                .checked_sub(1)
                .and_then(|i| doc.transporters.get(i as usize))
                .and_then(|t| t.company.siret.clone())
                .into_iter()
                .collect(),
            Step::Reception | Step::Operation => {
                doc.destination_company.siret.iter().cloned().collect()
            }
        }
    }

    fn record_signature(doc: &mut Document, target: Step, event: &SignatureEvent) {
        match target {
            Step::Emission => {
                doc.emitter_emission_signature_date = Some(event.date.clone());
                doc.emitter_emission_signature_author = Some(event.author.clone());
            }
            Step::Transport(i) => {
                if let Some(t) = i
                    .checked_sub(1)
                    .and_then(|i| doc.transporters.get_mut(i as usize))
                {
                    t.transport_signature_date = Some(event.date.clone());
                    t.transport_signature_author = Some(event.author.clone());
                }
            }
            Step::Reception => {
                doc.destination_reception_signature_date = Some(event.date.clone());
                doc.destination_reception_signature_author = Some(event.author.clone());
            }
            Step::Operation => {
                doc.destination_operation_signature_date = Some(event.date.clone());
                doc.destination_operation_signature_author = Some(event.author.clone());
            }
        }
    }

    // persist with the optimistic precondition: stored bytes must still be
    // the ones this computation was based on
    fn swap(&self, id: &str, old: &sled::IVec, new: &[u8]) -> Result<(), WorkflowError> {
        self.instance
            .compare_and_swap(id.as_bytes(), Some(old.clone()), Some(new.to_vec()))?
            .map_err(|_| WorkflowError::Conflict)
    }

    fn event_entry(
        &self,
        kind: &str,
        doc: &Document,
        doc_cbor: &[u8],
        changed: &[String],
        author: Option<String>,
    ) -> Result<(String, Vec<u8>), WorkflowError> {
        let seq = self.instance.generate_id()?;
        let key = format!("evt/{}/{:020}", doc.id, seq);
        let record = EventRecord {
            kind: kind.to_string(),
            changed: changed.to_vec(),
            digest: sha256::digest(doc_cbor),
            author,
            at: TimeStamp::new(),
        };
        Ok((key, encode(&record)?))
    }

    fn append_event(
        &self,
        kind: &str,
        doc: &Document,
        doc_cbor: &[u8],
        changed: &[String],
        author: Option<String>,
    ) -> Result<(), WorkflowError> {
        let (key, cbor) = self.event_entry(kind, doc, doc_cbor, changed, author)?;
        self.instance.insert(key.as_bytes(), cbor)?;
        Ok(())
    }
}
