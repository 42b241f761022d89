//! Content gating: which sections a learner may open, and how many lectures
//! count toward the progress denominator.
//!
//! A course-level "full access" purchase is represented purely by populating
//! `paid_sections` at reconciliation time, so the accessibility check is
//! uniform across purchase types.

use crate::domain::course::{Course, Section};
use crate::domain::enrollment::{Enrollment, PaymentStatus};

pub fn is_section_accessible(section: &Section, enrollment: &Enrollment) -> bool {
    if !section.is_paid {
        return true;
    }
    enrollment.payment_status == PaymentStatus::Completed
        && enrollment.has_paid_section(&section.id)
}

/// Denominator for progress percent: locked content must never depress the
/// learner's visible completion ratio.
pub fn accessible_lecture_count(course: &Course, enrollment: &Enrollment) -> usize {
    course
        .sections
        .iter()
        .filter(|section| is_section_accessible(section, enrollment))
        .map(|section| section.lectures.len())
        .sum()
}

pub fn progress_percent(completed_lectures: usize, accessible_lectures: usize) -> f64 {
    if accessible_lectures == 0 {
        return 0.0;
    }
    (completed_lectures as f64 / accessible_lectures as f64) * 100.0
}
