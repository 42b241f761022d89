use std::collections::HashMap;

use acadia_core::chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use acadia_core::domain::certificate::Certificate;
use acadia_core::domain::course::{CourseId, SectionId};
use acadia_core::domain::enrollment::{Enrollment, EnrollmentId, PaymentStatus, UserId};
use acadia_core::payment::PaymentAuditEvent;

use super::{
    CertificateRepository, EnrollmentRepository, PaymentAuditRepository, RepositoryError,
    SectionGrant,
};

/// Test double mirroring the SQL ledger's conditional-update semantics; the
/// single write lock stands in for row-level atomicity.
#[derive(Default)]
pub struct InMemoryEnrollmentRepository {
    enrollments: RwLock<HashMap<String, Enrollment>>,
}

impl InMemoryEnrollmentRepository {
    pub async fn insert(&self, enrollment: Enrollment) {
        let mut enrollments = self.enrollments.write().await;
        enrollments.insert(enrollment.id.0.clone(), enrollment);
    }
}

#[async_trait::async_trait]
impl EnrollmentRepository for InMemoryEnrollmentRepository {
    async fn find_by_id(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        let enrollments = self.enrollments.read().await;
        Ok(enrollments.get(&id.0).cloned())
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let enrollments = self.enrollments.read().await;
        Ok(enrollments
            .values()
            .find(|enrollment| enrollment.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn find_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let enrollments = self.enrollments.read().await;
        Ok(enrollments
            .values()
            .find(|enrollment| {
                enrollment.user_id == *user_id && enrollment.course_id == *course_id
            })
            .cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Enrollment>, RepositoryError> {
        let enrollments = self.enrollments.read().await;
        let mut matching: Vec<Enrollment> = enrollments
            .values()
            .filter(|enrollment| enrollment.user_id == *user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        Ok(matching)
    }

    async fn begin_paid_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        reference: &str,
    ) -> Result<Enrollment, RepositoryError> {
        let mut enrollments = self.enrollments.write().await;

        if let Some(existing) = enrollments
            .values_mut()
            .find(|enrollment| enrollment.user_id == *user_id && enrollment.course_id == *course_id)
        {
            existing.payment_status = PaymentStatus::Pending;
            existing.payment_reference = Some(reference.to_string());
            existing.row_version += 1;
            return Ok(existing.clone());
        }

        let enrollment = Enrollment {
            id: EnrollmentId(Uuid::new_v4().to_string()),
            user_id: user_id.clone(),
            course_id: course_id.clone(),
            payment_status: PaymentStatus::Pending,
            payment_reference: Some(reference.to_string()),
            paid_sections: Vec::new(),
            progress_percent: 0.0,
            total_score: 0,
            max_possible_score: 0,
            row_version: 1,
            enrolled_at: Utc::now(),
            completed_at: None,
        };
        enrollments.insert(enrollment.id.0.clone(), enrollment.clone());
        Ok(enrollment)
    }

    async fn insert_free_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Enrollment, RepositoryError> {
        let mut enrollments = self.enrollments.write().await;

        let exists = enrollments
            .values()
            .any(|enrollment| enrollment.user_id == *user_id && enrollment.course_id == *course_id);
        if exists {
            return Err(RepositoryError::Conflict(format!(
                "enrollment already exists for user {} in course {}",
                user_id.0, course_id.0
            )));
        }

        let enrollment = Enrollment {
            id: EnrollmentId(Uuid::new_v4().to_string()),
            user_id: user_id.clone(),
            course_id: course_id.clone(),
            payment_status: PaymentStatus::Completed,
            payment_reference: None,
            paid_sections: Vec::new(),
            progress_percent: 0.0,
            total_score: 0,
            max_possible_score: 0,
            row_version: 1,
            enrolled_at: Utc::now(),
            completed_at: None,
        };
        enrollments.insert(enrollment.id.0.clone(), enrollment.clone());
        Ok(enrollment)
    }

    async fn apply_outcome_by_reference(
        &self,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<u64, RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        let Some(enrollment) = enrollments.values_mut().find(|enrollment| {
            enrollment.payment_reference.as_deref() == Some(reference)
                && enrollment.payment_status == PaymentStatus::Pending
        }) else {
            return Ok(0);
        };

        enrollment.payment_status = status;
        enrollment.row_version += 1;
        Ok(1)
    }

    async fn apply_outcome_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<u64, RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        let Some(enrollment) = enrollments.values_mut().find(|enrollment| {
            enrollment.user_id == *user_id
                && enrollment.course_id == *course_id
                && enrollment.payment_status == PaymentStatus::Pending
        }) else {
            return Ok(0);
        };

        enrollment.payment_status = status;
        enrollment.payment_reference = Some(reference.to_string());
        enrollment.row_version += 1;
        Ok(1)
    }

    async fn add_paid_section(
        &self,
        id: &EnrollmentId,
        section_id: &SectionId,
    ) -> Result<SectionGrant, RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrollments
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::Conflict(format!("enrollment {} not found", id.0)))?;

        if enrollment.paid_sections.contains(section_id) {
            return Ok(SectionGrant::AlreadyPresent);
        }

        enrollment.paid_sections.push(section_id.clone());
        enrollment.row_version += 1;
        Ok(SectionGrant::Added)
    }

    async fn add_paid_sections(
        &self,
        id: &EnrollmentId,
        section_ids: &[SectionId],
    ) -> Result<(), RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrollments
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::Conflict(format!("enrollment {} not found", id.0)))?;

        let mut changed = false;
        for section_id in section_ids {
            if !enrollment.paid_sections.contains(section_id) {
                enrollment.paid_sections.push(section_id.clone());
                changed = true;
            }
        }
        if changed {
            enrollment.row_version += 1;
        }
        Ok(())
    }

    async fn record_progress(
        &self,
        id: &EnrollmentId,
        percent: f64,
    ) -> Result<Enrollment, RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrollments
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::Database(sqlx::Error::RowNotFound))?;

        enrollment.progress_percent = percent;
        if percent >= 100.0 && enrollment.completed_at.is_none() {
            enrollment.completed_at = Some(Utc::now());
        }
        enrollment.row_version += 1;
        Ok(enrollment.clone())
    }

    async fn accumulate_score(
        &self,
        id: &EnrollmentId,
        score: i64,
        max_score: i64,
    ) -> Result<(), RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrollments
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::Database(sqlx::Error::RowNotFound))?;

        enrollment.total_score += score;
        enrollment.max_possible_score += max_score;
        enrollment.row_version += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCertificateRepository {
    certificates: RwLock<Vec<Certificate>>,
}

#[async_trait::async_trait]
impl CertificateRepository for InMemoryCertificateRepository {
    async fn find_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<Certificate>, RepositoryError> {
        let certificates = self.certificates.read().await;
        Ok(certificates
            .iter()
            .find(|certificate| {
                certificate.user_id == *user_id && certificate.course_id == *course_id
            })
            .cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, RepositoryError> {
        let certificates = self.certificates.read().await;
        Ok(certificates
            .iter()
            .filter(|certificate| certificate.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn insert_if_absent(&self, certificate: &Certificate) -> Result<bool, RepositoryError> {
        let mut certificates = self.certificates.write().await;
        let exists = certificates.iter().any(|existing| {
            existing.user_id == certificate.user_id && existing.course_id == certificate.course_id
        });
        if exists {
            return Ok(false);
        }
        certificates.push(certificate.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryPaymentAuditRepository {
    events: RwLock<Vec<PaymentAuditEvent>>,
}

impl InMemoryPaymentAuditRepository {
    pub async fn events(&self) -> Vec<PaymentAuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait::async_trait]
impl PaymentAuditRepository for InMemoryPaymentAuditRepository {
    async fn append(&self, event: &PaymentAuditEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        events.push(event.clone());
        Ok(())
    }

    async fn list_for_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<PaymentAuditEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| event.reference == reference).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use acadia_core::domain::course::{CourseId, SectionId};
    use acadia_core::domain::enrollment::{PaymentStatus, UserId};

    use crate::repositories::{
        EnrollmentRepository, InMemoryEnrollmentRepository, SectionGrant,
    };

    #[tokio::test]
    async fn in_memory_ledger_matches_sql_conditional_semantics() {
        let repo = InMemoryEnrollmentRepository::default();
        let user = UserId("u-1".to_string());
        let course = CourseId("c-1".to_string());

        let enrollment =
            repo.begin_paid_enrollment(&user, &course, "lms_1_aaa").await.expect("pending");
        assert_eq!(enrollment.payment_status, PaymentStatus::Pending);

        assert_eq!(
            repo.apply_outcome_by_reference("lms_1_aaa", PaymentStatus::Completed)
                .await
                .expect("apply"),
            1
        );
        assert_eq!(
            repo.apply_outcome_by_reference("lms_1_aaa", PaymentStatus::Completed)
                .await
                .expect("replay"),
            0
        );

        let grant = repo
            .add_paid_section(&enrollment.id, &SectionId("s-1".to_string()))
            .await
            .expect("grant");
        assert_eq!(grant, SectionGrant::Added);
        let replay = repo
            .add_paid_section(&enrollment.id, &SectionId("s-1".to_string()))
            .await
            .expect("replay grant");
        assert_eq!(replay, SectionGrant::AlreadyPresent);
    }
}
