//! Certificate policy evaluation, run after progress updates and, once a
//! course is complete, after grading events. Evaluation is pure; the
//! existence check and artifact upload happen in the issuing service.

use serde::{Deserialize, Serialize};

use crate::domain::course::Course;
use crate::domain::enrollment::Enrollment;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum CertificateDecision {
    /// Policy satisfied; `score_percent` is carried for display when the
    /// course gates on a minimum score.
    Issue { score_percent: Option<u32> },
    NotEnabled,
    CompletionNotMet,
    ScoreBelowMinimum { score_percent: u32, required: u32 },
}

pub fn evaluate(course: &Course, enrollment: &Enrollment) -> CertificateDecision {
    let policy = &course.certificate;
    if !policy.enabled {
        return CertificateDecision::NotEnabled;
    }

    if policy.require_completion && enrollment.progress_percent < 100.0 {
        return CertificateDecision::CompletionNotMet;
    }

    if policy.require_min_score {
        let required = policy.min_score_percent.unwrap_or(0.0).round() as u32;
        let score_percent = enrollment.score_percent();
        if score_percent < required {
            return CertificateDecision::ScoreBelowMinimum { score_percent, required };
        }
        return CertificateDecision::Issue { score_percent: Some(score_percent) };
    }

    CertificateDecision::Issue { score_percent: None }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::course::{CertificatePolicy, Course, CourseId};
    use crate::domain::enrollment::{Enrollment, EnrollmentId, PaymentStatus, UserId};

    use super::{evaluate, CertificateDecision};

    fn course(policy: CertificatePolicy) -> Course {
        Course {
            id: CourseId("c-1".to_string()),
            title: "Cargo Handling".to_string(),
            description: String::new(),
            is_paid: false,
            price: None,
            is_active: true,
            certificate: policy,
            sections: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn enrollment(progress: f64, total: i64, max: i64) -> Enrollment {
        Enrollment {
            id: EnrollmentId("e-1".to_string()),
            user_id: UserId("u-1".to_string()),
            course_id: CourseId("c-1".to_string()),
            payment_status: PaymentStatus::Completed,
            payment_reference: None,
            paid_sections: Vec::new(),
            progress_percent: progress,
            total_score: total,
            max_possible_score: max,
            row_version: 1,
            enrolled_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn disabled_policy_is_a_silent_no_op() {
        let course = course(CertificatePolicy::default());
        assert_eq!(evaluate(&course, &enrollment(100.0, 10, 10)), CertificateDecision::NotEnabled);
    }

    #[test]
    fn completion_requirement_blocks_partial_progress() {
        let course = course(CertificatePolicy {
            enabled: true,
            require_completion: true,
            require_min_score: false,
            min_score_percent: None,
        });
        assert_eq!(
            evaluate(&course, &enrollment(90.0, 0, 0)),
            CertificateDecision::CompletionNotMet
        );
        assert_eq!(
            evaluate(&course, &enrollment(100.0, 0, 0)),
            CertificateDecision::Issue { score_percent: None }
        );
    }

    #[test]
    fn min_score_gate_uses_rounded_percent() {
        let course = course(CertificatePolicy {
            enabled: true,
            require_completion: true,
            require_min_score: true,
            min_score_percent: Some(70.0),
        });

        assert_eq!(
            evaluate(&course, &enrollment(100.0, 13, 20)),
            CertificateDecision::ScoreBelowMinimum { score_percent: 65, required: 70 }
        );
        assert_eq!(
            evaluate(&course, &enrollment(100.0, 13, 18)),
            CertificateDecision::Issue { score_percent: Some(72) }
        );
    }

    #[test]
    fn zero_max_score_evaluates_as_zero_percent() {
        let course = course(CertificatePolicy {
            enabled: true,
            require_completion: false,
            require_min_score: true,
            min_score_percent: Some(1.0),
        });
        assert_eq!(
            evaluate(&course, &enrollment(100.0, 0, 0)),
            CertificateDecision::ScoreBelowMinimum { score_percent: 0, required: 1 }
        );
    }
}
