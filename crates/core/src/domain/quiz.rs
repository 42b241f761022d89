use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::course::LectureId;
use crate::domain::enrollment::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuizId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub quiz_id: QuizId,
    pub order: i64,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: i64,
}

impl Question {
    /// Editor-side validation: a question needs at least two non-empty
    /// options and an in-range correct index.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.prompt.trim().is_empty() {
            return Err(DomainError::InvariantViolation("question prompt is required".to_string()));
        }
        let options = self.options.iter().filter(|option| !option.trim().is_empty()).count();
        if options < 2 {
            return Err(DomainError::InvariantViolation(
                "question needs at least two options".to_string(),
            ));
        }
        if self.correct_index < 0 || self.correct_index >= self.options.len() as i64 {
            return Err(DomainError::InvariantViolation(
                "correct index out of range".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub lecture_id: LectureId,
    pub title: String,
    pub questions: Vec<Question>,
}

/// Append-only record of one graded submission. Never mutated; the
/// enrollment score accumulators are bumped additively per attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub answers: Vec<i64>,
    pub score: i64,
    pub max_score: i64,
    pub submitted_at: DateTime<Utc>,
}
