use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::course::LectureId;
use crate::domain::enrollment::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// Backing record for an ASSIGNMENT lecture, kept in sync with the lecture
/// content payload when the lecture is created or updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub lecture_id: LectureId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Append-only per (user, lecture); a newer submission supersedes an older
/// one for display without deleting it. Grading is applied out-of-band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub lecture_id: LectureId,
    pub assignment_id: AssignmentId,
    pub content: String,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
