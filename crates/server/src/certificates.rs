//! Certificate issuance. Policy evaluation is pure
//! (`acadia_core::certification`); this service owns the existence check,
//! artifact rendering, object-store upload, and the exactly-once insert.
//!
//! Ordering matters: the Certificate row is written only after the upload
//! returns a URL, so a store outage can never leave a row pointing at a
//! missing asset. The progress update that triggered evaluation is never
//! rolled back by an issuance failure.

use std::sync::Arc;

use acadia_core::chrono::Utc;
use tera::{Context, Tera};
use tracing::{info, warn};
use uuid::Uuid;

use acadia_core::certification::{evaluate, CertificateDecision};
use acadia_core::domain::certificate::{Certificate, CertificateId};
use acadia_core::domain::course::Course;
use acadia_core::domain::enrollment::Enrollment;
use acadia_core::ApplicationError;
use acadia_db::repositories::CertificateRepository;

use crate::storage::ObjectStore;

const CERTIFICATE_TEMPLATE: &str = include_str!("../templates/certificate.svg.tera");

#[derive(Clone, Debug, PartialEq)]
pub enum IssueOutcome {
    Issued(Certificate),
    AlreadyIssued(Certificate),
    NotEligible(CertificateDecision),
}

pub struct CertificateIssuer {
    certificates: Arc<dyn CertificateRepository>,
    store: Arc<dyn ObjectStore>,
    templates: Tera,
}

impl CertificateIssuer {
    pub fn new(certificates: Arc<dyn CertificateRepository>, store: Arc<dyn ObjectStore>) -> Self {
        let mut templates = Tera::default();
        templates
            .add_raw_template("certificate.svg", CERTIFICATE_TEMPLATE)
            .expect("embedded certificate template must parse");

        Self { certificates, store, templates }
    }

    pub async fn evaluate_and_issue(
        &self,
        course: &Course,
        enrollment: &Enrollment,
        learner_name: &str,
    ) -> Result<IssueOutcome, ApplicationError> {
        let decision = evaluate(course, enrollment);
        let score_percent = match decision {
            CertificateDecision::Issue { score_percent } => score_percent,
            other => return Ok(IssueOutcome::NotEligible(other)),
        };

        if let Some(existing) = self
            .certificates
            .find_by_user_course(&enrollment.user_id, &enrollment.course_id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?
        {
            return Ok(IssueOutcome::AlreadyIssued(existing));
        }

        let issued_at = Utc::now();
        let svg = self.render(learner_name, &course.title, score_percent, &issued_at)?;

        let image_url = self
            .store
            .put(svg.into_bytes(), "image/svg+xml", "certificate")
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;

        let certificate = Certificate {
            id: CertificateId(Uuid::new_v4().to_string()),
            user_id: enrollment.user_id.clone(),
            course_id: enrollment.course_id.clone(),
            image_url,
            issued_at,
        };

        let created = self
            .certificates
            .insert_if_absent(&certificate)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        if !created {
            // A concurrent issuance won; the uploaded artifact is orphaned
            // but no row references it.
            warn!(
                event_name = "certificate.issue.lost_race",
                user_id = %enrollment.user_id.0,
                course_id = %enrollment.course_id.0,
                "certificate already issued by a concurrent request"
            );
            let existing = self
                .certificates
                .find_by_user_course(&enrollment.user_id, &enrollment.course_id)
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?
                .ok_or_else(|| {
                    ApplicationError::Persistence("certificate vanished after conflict".to_string())
                })?;
            return Ok(IssueOutcome::AlreadyIssued(existing));
        }

        info!(
            event_name = "certificate.issued",
            user_id = %enrollment.user_id.0,
            course_id = %enrollment.course_id.0,
            image_url = %certificate.image_url,
            "certificate issued"
        );

        Ok(IssueOutcome::Issued(certificate))
    }

    fn render(
        &self,
        learner_name: &str,
        course_title: &str,
        score_percent: Option<u32>,
        issued_at: &acadia_core::chrono::DateTime<Utc>,
    ) -> Result<String, ApplicationError> {
        let mut context = Context::new();
        context.insert("student", learner_name);
        context.insert("course", course_title);
        context.insert("date", &issued_at.format("%B %e, %Y").to_string());
        if let Some(score_percent) = score_percent {
            context.insert("score_text", &format!("Final Score: {score_percent}%"));
        }

        self.templates
            .render("certificate.svg", &context)
            .map_err(|error| ApplicationError::Configuration(error.to_string()))
    }
}
