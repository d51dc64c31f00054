//! Auto-completion of receipt ("recepisse") groups from an external
//! directory.
//!
//! The directory is a collaborator behind a trait: the engine only decides
//! which groups may still be written (never a sealed one) and degrades a
//! failed lookup to an unset group instead of aborting the pipeline.
use chrono::Utc;

use super::document::{Document, Recepisse, TimeStamp};
use super::field::{Field, FieldPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptRole {
    Transporter,
    Broker,
    Trader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub number: String,
    pub department: String,
    pub validity_limit: TimeStamp<Utc>,
}

impl From<Receipt> for Recepisse {
    fn from(r: Receipt) -> Self {
        Recepisse {
            number: r.number,
            department: r.department,
            validity_limit: r.validity_limit,
        }
    }
}

/// External company-directory lookup. Implementations are expected to apply
/// their own timeout and report a miss as `Ok(None)`.
pub trait ReceiptDirectory {
    fn find_receipt(&self, org_id: &str, role: ReceiptRole) -> anyhow::Result<Option<Receipt>>;
}

/// Directory that never finds anything. Useful default for callers that do
/// not wire a real registry.
pub struct NullDirectory;

impl ReceiptDirectory for NullDirectory {
    fn find_receipt(&self, _org_id: &str, _role: ReceiptRole) -> anyhow::Result<Option<Receipt>> {
        Ok(None)
    }
}

// lookup failures degrade to "no receipt"; they never abort validation
fn lookup(directory: &dyn ReceiptDirectory, org_id: &str, role: ReceiptRole) -> Option<Recepisse> {
    directory
        .find_receipt(org_id, role)
        .unwrap_or(None)
        .map(Recepisse::from)
}

/// Overwrite every unsealed receipt group from the directory, keyed by the
/// owning company's org id. `sealed` is the set computed by
/// `validation::sealed_field_paths` for the document itself.
pub fn recipify(doc: &mut Document, sealed: &[FieldPath], directory: &dyn ReceiptDirectory) {
    for i in 0..doc.transporters.len() {
        let path = Field::TransporterRecepisse.at(Some(i as u32 + 1));
        if sealed.contains(&path) {
            continue;
        }
        if let Some(siret) = doc.transporters[i].company.siret.clone() {
            doc.transporters[i].recepisse = lookup(directory, &siret, ReceiptRole::Transporter);
        }
    }

    if !sealed.contains(&Field::Broker.at(None))
        && let Some(broker) = doc.broker.as_mut()
        && let Some(siret) = broker.company.siret.clone()
    {
        broker.recepisse = lookup(directory, &siret, ReceiptRole::Broker);
    }

    if !sealed.contains(&Field::Trader.at(None))
        && let Some(trader) = doc.trader.as_mut()
        && let Some(siret) = trader.company.siret.clone()
    {
        trader.recepisse = lookup(directory, &siret, ReceiptRole::Trader);
    }
}
