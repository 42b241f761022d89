pub mod access;
pub mod certification;
pub mod config;
pub mod domain;
pub mod errors;
pub mod payment;
pub mod pricing;
pub mod scoring;

pub use access::{accessible_lecture_count, is_section_accessible, progress_percent};
pub use certification::{evaluate as evaluate_certificate_policy, CertificateDecision};
pub use domain::assignment::{Assignment, AssignmentId, Submission, SubmissionId};
pub use domain::certificate::{Certificate, CertificateId};
pub use domain::course::{
    CertificatePolicy, Course, CourseId, Lecture, LectureContent, LectureId, LectureKind, Section,
    SectionId,
};
pub use domain::enrollment::{
    Enrollment, EnrollmentId, OutcomeApplicability, PaymentStatus, UserId,
};
pub use domain::quiz::{Question, QuestionId, Quiz, QuizAttempt, QuizId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use payment::{
    generate_reference, CoursePurchase, PaymentAuditEvent, PaymentMetadata, PaymentOutcome,
    ReconcileChannel, ReconcileDisposition, SectionPurchase,
};
pub use pricing::{breakdown as price_breakdown, course_price, full_access_price, section_price};
pub use scoring::{grade as grade_quiz, GradeResult};

pub use chrono;
