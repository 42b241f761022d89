//! Checkout pricing. All amounts are minor-currency integers; malformed
//! catalog rows (a paid item without a price) quote as 0 rather than error.

use serde::{Deserialize, Serialize};

use crate::domain::course::{Course, Section, SectionId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub course_price: i64,
    pub sections_price: i64,
    pub total_price: i64,
    pub paid_sections: Vec<(SectionId, i64)>,
}

pub fn course_price(course: &Course) -> i64 {
    if course.is_paid {
        course.price.unwrap_or(0).max(0)
    } else {
        0
    }
}

pub fn section_price(section: &Section) -> i64 {
    if section.is_paid {
        section.price.unwrap_or(0).max(0)
    } else {
        0
    }
}

/// Course price plus every premium section's price. The amount quoted here at
/// checkout is the amount the reconciliation path later trusts via payment
/// metadata; mid-transaction price edits are not re-quoted.
pub fn full_access_price(course: &Course) -> i64 {
    course_price(course) + course.sections.iter().map(section_price).sum::<i64>()
}

pub fn breakdown(course: &Course) -> PriceBreakdown {
    let paid_sections: Vec<(SectionId, i64)> = course
        .sections
        .iter()
        .filter(|section| section.is_paid)
        .map(|section| (section.id.clone(), section_price(section)))
        .collect();
    let sections_price = paid_sections.iter().map(|(_, price)| price).sum();
    let course_price = course_price(course);

    PriceBreakdown {
        course_price,
        sections_price,
        total_price: course_price + sections_price,
        paid_sections,
    }
}

/// Checks a client-submitted checkout amount against the current quote.
pub fn validate_payment_amount(course: &Course, amount: i64, include_all_sections: bool) -> bool {
    if include_all_sections {
        full_access_price(course) == amount
    } else {
        course_price(course) == amount
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::course::{CertificatePolicy, Course, CourseId, Section, SectionId};

    use super::{breakdown, course_price, full_access_price, section_price, validate_payment_amount};

    fn section(id: &str, is_paid: bool, price: Option<i64>) -> Section {
        Section {
            id: SectionId(id.to_string()),
            course_id: CourseId("c-1".to_string()),
            title: id.to_string(),
            order: 0,
            is_paid,
            price,
            lectures: Vec::new(),
        }
    }

    fn course(is_paid: bool, price: Option<i64>, sections: Vec<Section>) -> Course {
        Course {
            id: CourseId("c-1".to_string()),
            title: "Aviation Safety".to_string(),
            description: String::new(),
            is_paid,
            price,
            is_active: true,
            certificate: CertificatePolicy::default(),
            sections,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn free_course_quotes_zero() {
        assert_eq!(course_price(&course(false, Some(9_999), Vec::new())), 0);
    }

    #[test]
    fn malformed_paid_items_quote_zero() {
        assert_eq!(course_price(&course(true, None, Vec::new())), 0);
        assert_eq!(section_price(&section("s-1", true, None)), 0);
        assert_eq!(section_price(&section("s-1", true, Some(-50))), 0);
    }

    #[test]
    fn full_access_price_is_course_plus_premium_sections() {
        let course = course(
            true,
            Some(5000),
            vec![
                section("s-1", false, None),
                section("s-2", true, Some(2000)),
                section("s-3", true, Some(1500)),
            ],
        );

        assert_eq!(full_access_price(&course), 8500);

        let breakdown = breakdown(&course);
        assert_eq!(breakdown.course_price, 5000);
        assert_eq!(breakdown.sections_price, 3500);
        assert_eq!(breakdown.total_price, 8500);
        assert_eq!(breakdown.paid_sections.len(), 2);
    }

    #[test]
    fn full_access_price_is_order_independent() {
        let forward = course(
            true,
            Some(5000),
            vec![section("s-1", true, Some(2000)), section("s-2", true, Some(1500))],
        );
        let reversed = course(
            true,
            Some(5000),
            vec![section("s-2", true, Some(1500)), section("s-1", true, Some(2000))],
        );

        assert_eq!(full_access_price(&forward), full_access_price(&reversed));
    }

    #[test]
    fn validate_payment_amount_matches_purchase_type() {
        let course = course(true, Some(5000), vec![section("s-2", true, Some(2000))]);

        assert!(validate_payment_amount(&course, 7000, true));
        assert!(!validate_payment_amount(&course, 5000, true));
        assert!(validate_payment_amount(&course, 5000, false));
        assert!(!validate_payment_amount(&course, 7000, false));
    }
}
