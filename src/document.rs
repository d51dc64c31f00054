//! Core document record and the small nested groups it is made of.
use chrono::{DateTime, TimeZone, Utc};

/// Lifecycle status of a document. `Refused` and `Processed` are terminal.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
#[cbor(index_only)]
pub enum Status {
    #[n(0)]
    Initial,
    #[n(1)]
    SignedByEmitter,
    #[n(2)]
    Sent,
    #[n(3)]
    Received,
    #[n(4)]
    Refused,
    #[n(5)]
    Processed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Refused | Status::Processed)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
#[cbor(index_only)]
pub enum Acceptation {
    #[n(0)]
    Accepted,
    #[n(1)]
    Refused,
    #[n(2)]
    PartiallyRefused,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
#[cbor(index_only)]
pub enum TransportMode {
    #[n(0)]
    Road,
    #[n(1)]
    Rail,
    #[n(2)]
    River,
    #[n(3)]
    Sea,
    #[n(4)]
    Air,
}

// Identity block shared by every party on the document.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Company {
    #[n(0)]
    pub name: Option<String>,
    #[n(1)]
    pub siret: Option<String>, // org id: SIRET or VAT-equivalent
    #[n(2)]
    pub address: Option<String>,
    #[n(3)]
    pub contact: Option<String>,
    #[n(4)]
    pub phone: Option<String>,
    #[n(5)]
    pub mail: Option<String>,
}

// Transporter/broker/trader receipt, filled by the directory lookup.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Recepisse {
    #[n(0)]
    pub number: String,
    #[n(1)]
    pub department: String,
    #[n(2)]
    pub validity_limit: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weight {
    #[n(0)]
    pub value_kg: u64,
    #[n(1)]
    pub is_estimate: bool,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Transporter {
    #[n(0)]
    pub company: Company,
    #[n(1)]
    pub recepisse: Option<Recepisse>,
    #[n(2)]
    pub transport_mode: Option<TransportMode>,
    #[n(3)]
    pub plates: Vec<String>,
    #[n(4)]
    pub taken_over_at: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub transport_signature_date: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub transport_signature_author: Option<String>,
}

// Broker and trader carry the same shape: a company plus its receipt.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyWithRecepisse {
    #[n(0)]
    pub company: Company,
    #[n(1)]
    pub recepisse: Option<Recepisse>,
}

/// A waste-shipment document. Flat record of typed fields; each field belongs
/// to exactly one role group (emitter, transporter[n], destination, broker,
/// trader, eco-organisme).
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Document {
    #[n(0)]
    pub id: String, // bech32-encoded uuid7
    #[n(1)]
    pub status: Status,
    #[n(2)]
    pub is_draft: bool,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
    #[n(4)]
    pub security_code: u32, // signature-by-code fallback, never editable

    // emitter group
    #[n(5)]
    pub emitter_company: Company,
    #[n(6)]
    pub emitter_agrement_number: Option<String>,
    #[n(7)]
    pub emitter_not_on_platform: bool, // skip condition for the emission step
    #[n(8)]
    pub emitter_emission_signature_date: Option<TimeStamp<Utc>>,
    #[n(9)]
    pub emitter_emission_signature_author: Option<String>,

    // waste group (owned by the emitter for sealing purposes)
    #[n(10)]
    pub waste_code: Option<String>,
    #[n(11)]
    pub identification_numbers: Vec<String>,
    #[n(12)]
    pub quantity: u32,
    #[n(13)]
    pub weight: Option<Weight>,

    #[n(14)]
    pub transporters: Vec<Transporter>,

    // destination group
    #[n(15)]
    pub destination_company: Company,
    #[n(16)]
    pub destination_agrement_number: Option<String>,
    #[n(17)]
    pub destination_reception_date: Option<TimeStamp<Utc>>,
    #[n(18)]
    pub destination_acceptation_status: Option<Acceptation>,
    #[n(19)]
    pub destination_refusal_reason: Option<String>,
    #[n(20)]
    pub destination_reception_weight_kg: Option<u64>,
    #[n(21)]
    pub destination_operation_code: Option<String>,
    #[n(22)]
    pub destination_operation_date: Option<TimeStamp<Utc>>,
    #[n(23)]
    pub destination_reception_signature_date: Option<TimeStamp<Utc>>,
    #[n(24)]
    pub destination_reception_signature_author: Option<String>,
    #[n(25)]
    pub destination_operation_signature_date: Option<TimeStamp<Utc>>,
    #[n(26)]
    pub destination_operation_signature_author: Option<String>,

    #[n(27)]
    pub broker: Option<CompanyWithRecepisse>,
    #[n(28)]
    pub trader: Option<CompanyWithRecepisse>,
    #[n(29)]
    pub eco_organisme: Option<Company>,
}

impl Document {
    /// Fresh draft in `Initial` status. Fields are filled by applying a patch.
    pub fn new(id: String, security_code: u32) -> Self {
        Self {
            id,
            status: Status::Initial,
            is_draft: true,
            created_at: TimeStamp::new(),
            security_code,
            emitter_company: Company::default(),
            emitter_agrement_number: None,
            emitter_not_on_platform: false,
            emitter_emission_signature_date: None,
            emitter_emission_signature_author: None,
            waste_code: None,
            identification_numbers: vec![],
            quantity: 0,
            weight: None,
            transporters: vec![],
            destination_company: Company::default(),
            destination_agrement_number: None,
            destination_reception_date: None,
            destination_acceptation_status: None,
            destination_refusal_reason: None,
            destination_reception_weight_kg: None,
            destination_operation_code: None,
            destination_operation_date: None,
            destination_reception_signature_date: None,
            destination_reception_signature_author: None,
            destination_operation_signature_date: None,
            destination_operation_signature_author: None,
            broker: None,
            trader: None,
            eco_organisme: None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn document_encoding() {
        let mut doc = Document::new("vhu_test".into(), 1234);
        doc.waste_code = Some("16 01 06".into());
        doc.transporters.push(Transporter::default());

        let encoding = minicbor::to_vec(&doc).unwrap();
        let decode: Document = minicbor::decode(&encoding).unwrap();

        assert_eq!(doc, decode);
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Refused.is_terminal());
        assert!(Status::Processed.is_terminal());
        assert!(!Status::Sent.is_terminal());
    }
}
