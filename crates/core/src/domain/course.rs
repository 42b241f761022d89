use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LectureId(pub String);

/// Gates certificate issuance for a course. `min_score_percent` only applies
/// when `require_min_score` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CertificatePolicy {
    pub enabled: bool,
    pub require_completion: bool,
    pub require_min_score: bool,
    pub min_score_percent: Option<f64>,
}

impl Default for CertificatePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            require_completion: true,
            require_min_score: false,
            min_score_percent: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LectureKind {
    Video,
    Text,
    Quiz,
    PracticeTest,
    Assignment,
    Pdf,
}

impl LectureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "VIDEO",
            Self::Text => "TEXT",
            Self::Quiz => "QUIZ",
            Self::PracticeTest => "PRACTICE_TEST",
            Self::Assignment => "ASSIGNMENT",
            Self::Pdf => "PDF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "VIDEO" => Some(Self::Video),
            "TEXT" => Some(Self::Text),
            "QUIZ" => Some(Self::Quiz),
            "PRACTICE_TEST" => Some(Self::PracticeTest),
            "ASSIGNMENT" => Some(Self::Assignment),
            "PDF" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Kinds whose lectures own a backing quiz record.
    pub fn owns_quiz(&self) -> bool {
        matches!(self, Self::Quiz | Self::PracticeTest)
    }

    pub fn owns_assignment(&self) -> bool {
        matches!(self, Self::Assignment)
    }
}

/// Payload shape depends on the lecture kind; decoded from the stored JSON
/// with the kind as discriminant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LectureContent {
    Video { url: String },
    Text { body: String },
    Quiz { instructions: Option<String> },
    PracticeTest { instructions: Option<String> },
    Assignment { description: String, due_date: Option<DateTime<Utc>> },
    Pdf { file_url: String },
}

impl LectureContent {
    pub fn kind(&self) -> LectureKind {
        match self {
            Self::Video { .. } => LectureKind::Video,
            Self::Text { .. } => LectureKind::Text,
            Self::Quiz { .. } => LectureKind::Quiz,
            Self::PracticeTest { .. } => LectureKind::PracticeTest,
            Self::Assignment { .. } => LectureKind::Assignment,
            Self::Pdf { .. } => LectureKind::Pdf,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: LectureId,
    pub section_id: SectionId,
    pub title: String,
    pub order: i64,
    pub kind: LectureKind,
    pub content: LectureContent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub course_id: CourseId,
    pub title: String,
    pub order: i64,
    pub is_paid: bool,
    pub price: Option<i64>,
    pub lectures: Vec<Lecture>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub is_paid: bool,
    pub price: Option<i64>,
    pub is_active: bool,
    pub certificate: CertificatePolicy,
    pub sections: Vec<Section>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    /// Pricing invariants: a paid course carries a non-negative price, and so
    /// does every paid section.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_paid && !matches!(self.price, Some(price) if price >= 0) {
            return Err(DomainError::InvariantViolation(format!(
                "paid course {} requires a non-negative price",
                self.id.0
            )));
        }
        for section in &self.sections {
            if section.is_paid && !matches!(section.price, Some(price) if price >= 0) {
                return Err(DomainError::InvariantViolation(format!(
                    "paid section {} requires a non-negative price",
                    section.id.0
                )));
            }
        }
        Ok(())
    }

    pub fn paid_section_ids(&self) -> Vec<SectionId> {
        self.sections
            .iter()
            .filter(|section| section.is_paid)
            .map(|section| section.id.clone())
            .collect()
    }
}
