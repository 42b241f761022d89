//! Payment correlation types shared by the gateway adapter and the
//! reconciliation path.
//!
//! Transaction metadata is set by us at initialize time and echoed back by
//! the gateway on both delivery channels; it is the only thing that survives
//! a lost reference lookup, so its shape is a closed tagged union rather
//! than free-form JSON.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::course::{CourseId, SectionId};
use crate::domain::enrollment::{EnrollmentId, UserId};

/// Purchase shapes discriminated at deserialization time; payloads that match
/// neither are rejected by serde.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentMetadata {
    Section(SectionPurchase),
    Course(CoursePurchase),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePurchase {
    pub course_id: CourseId,
    pub user_id: UserId,
    #[serde(default)]
    pub include_all_sections: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_section_ids: Option<Vec<SectionId>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionPurchase {
    pub section_id: SectionId,
    pub course_id: CourseId,
    pub user_id: UserId,
    pub enrollment_id: EnrollmentId,
}

/// A channel-independent payment result, as applied by reconciliation. Both
/// the webhook push and the client-triggered verify collapse into this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub reference: String,
    pub succeeded: bool,
    pub amount_minor: i64,
    pub metadata: PaymentMetadata,
}

/// Which delivery channel carried an outcome. Both are non-exclusive for the
/// same transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileChannel {
    Webhook,
    Verify,
}

impl ReconcileChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Verify => "verify",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "webhook" => Some(Self::Webhook),
            "verify" => Some(Self::Verify),
            _ => None,
        }
    }
}

/// What happened when an outcome was applied to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileDisposition {
    /// The outcome mutated ledger state.
    Applied,
    /// A terminal state was re-delivered; nothing changed.
    Duplicate,
    /// The outcome contradicted an existing terminal state and was refused.
    Conflicting,
    /// No enrollment could be located by reference or metadata; the outcome
    /// was logged and dropped.
    Unmatched,
    /// Nothing to apply for this outcome kind (e.g. a failed section-only
    /// charge, which never created ledger state).
    Ignored,
}

impl ReconcileDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Duplicate => "duplicate",
            Self::Conflicting => "conflicting",
            Self::Unmatched => "unmatched",
            Self::Ignored => "ignored",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "applied" => Some(Self::Applied),
            "duplicate" => Some(Self::Duplicate),
            "conflicting" => Some(Self::Conflicting),
            "unmatched" => Some(Self::Unmatched),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }
}

/// Append-only trace of every outcome application, kept for support
/// workflows; unmatched deliveries are only recoverable from here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentAuditEvent {
    pub id: String,
    pub reference: String,
    pub channel: ReconcileChannel,
    pub disposition: ReconcileDisposition,
    pub succeeded: bool,
    pub metadata_json: String,
    pub occurred_at: chrono::DateTime<Utc>,
}

const REFERENCE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const REFERENCE_SUFFIX_LEN: usize = 13;

/// Globally unique transaction reference, generated here and never trusted
/// from the gateway.
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("lms_{}_{suffix}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{generate_reference, PaymentMetadata};

    #[test]
    fn course_purchase_metadata_deserializes() {
        let metadata: PaymentMetadata = serde_json::from_value(json!({
            "courseId": "c-1",
            "userId": "u-1",
            "includeAllSections": true,
            "paidSectionIds": ["s-1", "s-2"],
        }))
        .expect("course purchase shape");

        match metadata {
            PaymentMetadata::Course(purchase) => {
                assert!(purchase.include_all_sections);
                assert_eq!(purchase.paid_section_ids.map(|ids| ids.len()), Some(2));
            }
            PaymentMetadata::Section(_) => panic!("expected course purchase"),
        }
    }

    #[test]
    fn section_purchase_metadata_wins_when_section_id_present() {
        let metadata: PaymentMetadata = serde_json::from_value(json!({
            "sectionId": "s-9",
            "courseId": "c-1",
            "userId": "u-1",
            "enrollmentId": "e-1",
        }))
        .expect("section purchase shape");

        assert!(matches!(metadata, PaymentMetadata::Section(ref p) if p.section_id.0 == "s-9"));
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        let result: Result<PaymentMetadata, _> =
            serde_json::from_value(json!({ "orderId": "o-1" }));
        assert!(result.is_err());
    }

    #[test]
    fn include_all_sections_defaults_to_false() {
        let metadata: PaymentMetadata = serde_json::from_value(json!({
            "courseId": "c-1",
            "userId": "u-1",
        }))
        .expect("minimal course purchase shape");

        assert!(
            matches!(metadata, PaymentMetadata::Course(ref p) if !p.include_all_sections)
        );
    }

    #[test]
    fn references_are_prefixed_and_unique() {
        let first = generate_reference();
        let second = generate_reference();

        assert!(first.starts_with("lms_"));
        assert_ne!(first, second);
    }
}
