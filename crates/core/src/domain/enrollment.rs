use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::course::{CourseId, SectionId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The ledger row binding one user to one course's payment and progress
/// state. Unique per (user_id, course_id).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub paid_sections: Vec<SectionId>,
    pub progress_percent: f64,
    pub total_score: i64,
    pub max_possible_score: i64,
    pub row_version: i64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// How an incoming payment outcome relates to the enrollment's current
/// status. Terminal states absorb identical redeliveries and reject
/// contradictions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeApplicability {
    Apply,
    DuplicateTerminal,
}

impl Enrollment {
    pub fn outcome_applicability(
        &self,
        requested: PaymentStatus,
        reference: &str,
    ) -> Result<OutcomeApplicability, DomainError> {
        match (self.payment_status, requested) {
            (PaymentStatus::Pending, _) => Ok(OutcomeApplicability::Apply),
            (current, requested) if current == requested => {
                Ok(OutcomeApplicability::DuplicateTerminal)
            }
            (current, requested) => Err(DomainError::ConflictingPaymentOutcome {
                reference: reference.to_string(),
                current,
                requested,
            }),
        }
    }

    pub fn has_paid_section(&self, section_id: &SectionId) -> bool {
        self.paid_sections.contains(section_id)
    }

    pub fn score_percent(&self) -> u32 {
        if self.max_possible_score <= 0 {
            return 0;
        }
        ((self.total_score as f64 / self.max_possible_score as f64) * 100.0).round() as u32
    }
}
