use async_trait::async_trait;
use thiserror::Error;

use acadia_core::domain::assignment::{Assignment, Submission, SubmissionId};
use acadia_core::domain::certificate::Certificate;
use acadia_core::domain::course::{
    Course, CourseId, Lecture, LectureContent, LectureId, Section, SectionId,
};
use acadia_core::domain::enrollment::{Enrollment, EnrollmentId, PaymentStatus, UserId};
use acadia_core::domain::quiz::{Question, Quiz, QuizAttempt, QuizId};
use acadia_core::payment::PaymentAuditEvent;

pub mod assignment;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod memory;
pub mod payment_audit;
pub mod quiz;

pub use assignment::SqlAssignmentRepository;
pub use certificate::SqlCertificateRepository;
pub use course::SqlCourseRepository;
pub use enrollment::SqlEnrollmentRepository;
pub use memory::{
    InMemoryCertificateRepository, InMemoryEnrollmentRepository, InMemoryPaymentAuditRepository,
};
pub use payment_audit::SqlPaymentAuditRepository;
pub use quiz::SqlQuizRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("constraint conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// True when the underlying sqlite error is a UNIQUE violation; used to
    /// turn insert races into named domain conflicts.
    pub fn is_unique_violation(error: &sqlx::Error) -> bool {
        matches!(
            error,
            sqlx::Error::Database(db_error) if db_error.message().contains("UNIQUE constraint failed")
        )
    }
}

/// Outcome of appending a section to `paid_sections`; reconciliation treats
/// `AlreadyPresent` as an idempotent redelivery while the purchase endpoint
/// surfaces it as `AlreadyPurchased`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionGrant {
    Added,
    AlreadyPresent,
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn find_by_id(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<Course>, RepositoryError>;
    async fn insert(&self, course: &Course) -> Result<(), RepositoryError>;
    async fn update_course(&self, course: &Course) -> Result<u64, RepositoryError>;
    async fn insert_section(
        &self,
        course_id: &CourseId,
        title: &str,
        is_paid: bool,
        price: Option<i64>,
    ) -> Result<Section, RepositoryError>;
    async fn find_section(&self, id: &SectionId) -> Result<Option<Section>, RepositoryError>;
    async fn insert_lecture(
        &self,
        section_id: &SectionId,
        title: &str,
        content: &LectureContent,
    ) -> Result<Lecture, RepositoryError>;
    async fn update_lecture(
        &self,
        id: &LectureId,
        title: &str,
        content: &LectureContent,
    ) -> Result<u64, RepositoryError>;
    async fn find_lecture(&self, id: &LectureId) -> Result<Option<Lecture>, RepositoryError>;
    async fn course_id_for_lecture(
        &self,
        id: &LectureId,
    ) -> Result<Option<CourseId>, RepositoryError>;
}

/// The authoritative per-(user, course) payment/progress state machine. All
/// mutations are single-row conditional updates; callers check the returned
/// rows-affected count to detect races and stale outcomes.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Enrollment>, RepositoryError>;

    async fn find_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Enrollment>, RepositoryError>;

    /// Creates or re-points the PENDING row for this (user, course) at a new
    /// gateway reference. A still-pending earlier transaction is abandoned by
    /// the overwrite (single-flight per course).
    async fn begin_paid_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        reference: &str,
    ) -> Result<Enrollment, RepositoryError>;

    /// Inserts a COMPLETED row with no payment reference. A UNIQUE violation
    /// maps to `RepositoryError::Conflict`.
    async fn insert_free_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Enrollment, RepositoryError>;

    /// `UPDATE … WHERE payment_reference = ? AND payment_status = 'pending'`;
    /// returns rows affected (0 or 1).
    async fn apply_outcome_by_reference(
        &self,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<u64, RepositoryError>;

    /// Fallback for outcomes whose reference lookup missed: adopts the
    /// reference onto the PENDING enrollment for (user, course), if any.
    async fn apply_outcome_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<u64, RepositoryError>;

    async fn add_paid_section(
        &self,
        id: &EnrollmentId,
        section_id: &SectionId,
    ) -> Result<SectionGrant, RepositoryError>;

    /// Set-union append used by full-access settlement; idempotent under
    /// redelivery.
    async fn add_paid_sections(
        &self,
        id: &EnrollmentId,
        section_ids: &[SectionId],
    ) -> Result<(), RepositoryError>;

    /// Stores the percent and stamps `completed_at` exactly once when the
    /// percent reaches 100. No monotonicity clamp.
    async fn record_progress(
        &self,
        id: &EnrollmentId,
        percent: f64,
    ) -> Result<Enrollment, RepositoryError>;

    /// Additive accumulator bump; repeated attempts accumulate by design.
    async fn accumulate_score(
        &self,
        id: &EnrollmentId,
        score: i64,
        max_score: i64,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn find_by_lecture(&self, lecture_id: &LectureId)
        -> Result<Option<Quiz>, RepositoryError>;
    async fn find_by_id(&self, id: &QuizId) -> Result<Option<Quiz>, RepositoryError>;
    /// Provisions the backing quiz for a QUIZ / PRACTICE_TEST lecture if it
    /// does not exist yet.
    async fn ensure_for_lecture(
        &self,
        lecture_id: &LectureId,
        title: &str,
    ) -> Result<Quiz, RepositoryError>;
    async fn replace_questions(
        &self,
        quiz_id: &QuizId,
        questions: &[Question],
    ) -> Result<(), RepositoryError>;
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<(), RepositoryError>;
    async fn list_attempts(
        &self,
        user_id: &UserId,
        quiz_id: &QuizId,
    ) -> Result<Vec<QuizAttempt>, RepositoryError>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn find_by_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Option<Assignment>, RepositoryError>;
    /// Creates or refreshes the backing assignment from the lecture payload.
    async fn ensure_for_lecture(
        &self,
        lecture_id: &LectureId,
        title: &str,
        description: &str,
        due_date: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Assignment, RepositoryError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn append(&self, submission: &Submission) -> Result<(), RepositoryError>;
    async fn latest_for_user_lecture(
        &self,
        user_id: &UserId,
        lecture_id: &LectureId,
    ) -> Result<Option<Submission>, RepositoryError>;
    /// Out-of-band grading write; returns rows affected.
    async fn set_grade(
        &self,
        id: &SubmissionId,
        grade: f64,
        feedback: Option<&str>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn find_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<Certificate>, RepositoryError>;
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, RepositoryError>;
    /// `INSERT … ON CONFLICT DO NOTHING`; returns whether this call created
    /// the row, making issuance exactly-once even under races.
    async fn insert_if_absent(&self, certificate: &Certificate) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait PaymentAuditRepository: Send + Sync {
    async fn append(&self, event: &PaymentAuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<PaymentAuditEvent>, RepositoryError>;
}
