//! Applies payment outcomes to the enrollment ledger exactly once, no matter
//! which channel delivered them or how many times.
//!
//! Both the authenticated webhook push and the client-triggered verify call
//! collapse into `apply_outcome`. The ledger's conditional updates carry the
//! idempotency; this service handles correlation fallback, terminal-state
//! conflicts, and the audit trail.

use std::sync::Arc;

use acadia_core::chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use acadia_core::domain::course::CourseId;
use acadia_core::domain::enrollment::{
    Enrollment, EnrollmentId, OutcomeApplicability, PaymentStatus,
};
use acadia_core::payment::{
    CoursePurchase, PaymentAuditEvent, PaymentMetadata, PaymentOutcome, ReconcileChannel,
    ReconcileDisposition, SectionPurchase,
};
use acadia_core::ApplicationError;
use acadia_db::repositories::{
    EnrollmentRepository, PaymentAuditRepository, RepositoryError, SectionGrant,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub disposition: ReconcileDisposition,
    pub succeeded: bool,
    pub course_id: CourseId,
    pub enrollment_id: Option<EnrollmentId>,
}

impl Reconciled {
    /// What the UI layer gets to see: the outcome landed (now or earlier)
    /// and the charge succeeded.
    pub fn is_success(&self) -> bool {
        self.succeeded
            && matches!(
                self.disposition,
                ReconcileDisposition::Applied | ReconcileDisposition::Duplicate
            )
    }
}

pub struct ReconciliationService {
    enrollments: Arc<dyn EnrollmentRepository>,
    audit: Arc<dyn PaymentAuditRepository>,
}

impl ReconciliationService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        audit: Arc<dyn PaymentAuditRepository>,
    ) -> Self {
        Self { enrollments, audit }
    }

    pub async fn apply_outcome(
        &self,
        channel: ReconcileChannel,
        outcome: &PaymentOutcome,
    ) -> Result<Reconciled, ApplicationError> {
        let reconciled = match &outcome.metadata {
            PaymentMetadata::Course(purchase) => {
                self.apply_course_outcome(outcome, purchase).await?
            }
            PaymentMetadata::Section(purchase) => {
                self.apply_section_outcome(outcome, purchase).await?
            }
        };

        self.record_audit(channel, outcome, reconciled.disposition).await;

        info!(
            event_name = "reconcile.outcome.settled",
            reference = %outcome.reference,
            channel = channel.as_str(),
            disposition = reconciled.disposition.as_str(),
            succeeded = outcome.succeeded,
            course_id = %reconciled.course_id.0,
            "payment outcome reconciled"
        );

        Ok(reconciled)
    }

    async fn apply_course_outcome(
        &self,
        outcome: &PaymentOutcome,
        purchase: &CoursePurchase,
    ) -> Result<Reconciled, ApplicationError> {
        let requested =
            if outcome.succeeded { PaymentStatus::Completed } else { PaymentStatus::Failed };

        let rows = self
            .enrollments
            .apply_outcome_by_reference(&outcome.reference, requested)
            .await
            .map_err(persistence)?;

        if rows == 1 {
            let enrollment = self
                .enrollments
                .find_by_reference(&outcome.reference)
                .await
                .map_err(persistence)?;
            return self.settle_applied(outcome, purchase, enrollment).await;
        }

        // Nothing PENDING under this reference: either a redelivery against a
        // terminal row, or the reference was never adopted.
        if let Some(enrollment) = self
            .enrollments
            .find_by_reference(&outcome.reference)
            .await
            .map_err(persistence)?
        {
            return self.settle_terminal(outcome, purchase, enrollment, requested).await;
        }

        // Correlation fallback: locate the PENDING enrollment from metadata
        // and adopt the reference onto it.
        let rows = self
            .enrollments
            .apply_outcome_by_user_course(
                &purchase.user_id,
                &purchase.course_id,
                &outcome.reference,
                requested,
            )
            .await
            .map_err(persistence)?;

        if rows == 1 {
            let enrollment = self
                .enrollments
                .find_by_reference(&outcome.reference)
                .await
                .map_err(persistence)?;
            return self.settle_applied(outcome, purchase, enrollment).await;
        }

        if let Some(enrollment) = self
            .enrollments
            .find_by_user_course(&purchase.user_id, &purchase.course_id)
            .await
            .map_err(persistence)?
        {
            return self.settle_terminal(outcome, purchase, enrollment, requested).await;
        }

        // The accepted lost-outcome case: no row by reference, none by
        // metadata. Logged with full metadata for support, then dropped.
        warn!(
            event_name = "reconcile.outcome.unmatched",
            reference = %outcome.reference,
            course_id = %purchase.course_id.0,
            user_id = %purchase.user_id.0,
            succeeded = outcome.succeeded,
            metadata = %metadata_json(&outcome.metadata),
            "no enrollment matched this payment outcome; dropping"
        );

        Ok(Reconciled {
            disposition: ReconcileDisposition::Unmatched,
            succeeded: outcome.succeeded,
            course_id: purchase.course_id.clone(),
            enrollment_id: None,
        })
    }

    /// The transition just landed; grant full-access sections when the
    /// metadata declared them at initialize time.
    async fn settle_applied(
        &self,
        outcome: &PaymentOutcome,
        purchase: &CoursePurchase,
        enrollment: Option<Enrollment>,
    ) -> Result<Reconciled, ApplicationError> {
        let enrollment_id = enrollment.as_ref().map(|enrollment| enrollment.id.clone());

        if outcome.succeeded {
            if let Some(enrollment) = &enrollment {
                self.grant_declared_sections(enrollment, purchase).await?;
            }
        }

        Ok(Reconciled {
            disposition: ReconcileDisposition::Applied,
            succeeded: outcome.succeeded,
            course_id: purchase.course_id.clone(),
            enrollment_id,
        })
    }

    /// The row is already terminal. Same-state redelivery is absorbed (and
    /// the section grant re-unioned, which is a no-op on replay);
    /// contradictions are refused and only logged.
    async fn settle_terminal(
        &self,
        outcome: &PaymentOutcome,
        purchase: &CoursePurchase,
        enrollment: Enrollment,
        requested: PaymentStatus,
    ) -> Result<Reconciled, ApplicationError> {
        match enrollment.outcome_applicability(requested, &outcome.reference) {
            Ok(OutcomeApplicability::DuplicateTerminal) => {
                if outcome.succeeded {
                    self.grant_declared_sections(&enrollment, purchase).await?;
                }
                Ok(Reconciled {
                    disposition: ReconcileDisposition::Duplicate,
                    succeeded: outcome.succeeded,
                    course_id: purchase.course_id.clone(),
                    enrollment_id: Some(enrollment.id),
                })
            }
            Ok(OutcomeApplicability::Apply) => {
                // A writer raced us between the conditional update and the
                // read-back; one more conditional pass settles it.
                let rows = self
                    .enrollments
                    .apply_outcome_by_reference(&outcome.reference, requested)
                    .await
                    .map_err(persistence)?;
                if rows == 1 {
                    return self.settle_applied(outcome, purchase, Some(enrollment)).await;
                }
                Ok(Reconciled {
                    disposition: ReconcileDisposition::Duplicate,
                    succeeded: outcome.succeeded,
                    course_id: purchase.course_id.clone(),
                    enrollment_id: Some(enrollment.id),
                })
            }
            Err(conflict) => {
                error!(
                    event_name = "reconcile.outcome.conflicting",
                    reference = %outcome.reference,
                    course_id = %purchase.course_id.0,
                    error = %conflict,
                    metadata = %metadata_json(&outcome.metadata),
                    "stale or contradictory outcome refused"
                );
                Ok(Reconciled {
                    disposition: ReconcileDisposition::Conflicting,
                    succeeded: outcome.succeeded,
                    course_id: purchase.course_id.clone(),
                    enrollment_id: Some(enrollment.id),
                })
            }
        }
    }

    /// Populates `paid_sections` from the ids captured in metadata when the
    /// transaction was initialized. Sections added to the course afterwards
    /// are deliberately not granted.
    async fn grant_declared_sections(
        &self,
        enrollment: &Enrollment,
        purchase: &CoursePurchase,
    ) -> Result<(), ApplicationError> {
        if !purchase.include_all_sections {
            return Ok(());
        }
        let Some(section_ids) = &purchase.paid_section_ids else {
            return Ok(());
        };
        if section_ids.is_empty() {
            return Ok(());
        }

        self.enrollments
            .add_paid_sections(&enrollment.id, section_ids)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn apply_section_outcome(
        &self,
        outcome: &PaymentOutcome,
        purchase: &SectionPurchase,
    ) -> Result<Reconciled, ApplicationError> {
        if !outcome.succeeded {
            // Section purchases create no pending ledger state, so a failed
            // charge leaves nothing to transition.
            return Ok(Reconciled {
                disposition: ReconcileDisposition::Ignored,
                succeeded: false,
                course_id: purchase.course_id.clone(),
                enrollment_id: Some(purchase.enrollment_id.clone()),
            });
        }

        let enrollment = match self
            .enrollments
            .find_by_id(&purchase.enrollment_id)
            .await
            .map_err(persistence)?
        {
            Some(enrollment) => Some(enrollment),
            None => self
                .enrollments
                .find_by_user_course(&purchase.user_id, &purchase.course_id)
                .await
                .map_err(persistence)?,
        };

        let Some(enrollment) = enrollment else {
            warn!(
                event_name = "reconcile.outcome.unmatched",
                reference = %outcome.reference,
                section_id = %purchase.section_id.0,
                course_id = %purchase.course_id.0,
                user_id = %purchase.user_id.0,
                metadata = %metadata_json(&outcome.metadata),
                "no enrollment matched this section purchase; dropping"
            );
            return Ok(Reconciled {
                disposition: ReconcileDisposition::Unmatched,
                succeeded: true,
                course_id: purchase.course_id.clone(),
                enrollment_id: None,
            });
        };

        let grant = self
            .enrollments
            .add_paid_section(&enrollment.id, &purchase.section_id)
            .await
            .map_err(persistence)?;

        let disposition = match grant {
            SectionGrant::Added => ReconcileDisposition::Applied,
            SectionGrant::AlreadyPresent => ReconcileDisposition::Duplicate,
        };

        Ok(Reconciled {
            disposition,
            succeeded: true,
            course_id: purchase.course_id.clone(),
            enrollment_id: Some(enrollment.id),
        })
    }

    /// Audit writes are best-effort: losing a trace row must not turn a
    /// settled payment into a 5xx.
    async fn record_audit(
        &self,
        channel: ReconcileChannel,
        outcome: &PaymentOutcome,
        disposition: ReconcileDisposition,
    ) {
        let event = PaymentAuditEvent {
            id: Uuid::new_v4().to_string(),
            reference: outcome.reference.clone(),
            channel,
            disposition,
            succeeded: outcome.succeeded,
            metadata_json: metadata_json(&outcome.metadata),
            occurred_at: Utc::now(),
        };

        if let Err(error) = self.audit.append(&event).await {
            error!(
                event_name = "reconcile.audit.write_failed",
                reference = %outcome.reference,
                error = %error,
                "failed to append payment audit event"
            );
        }
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn metadata_json(metadata: &PaymentMetadata) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string())
}
