use acadia_core::chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use acadia_core::domain::course::{CourseId, SectionId};
use acadia_core::domain::enrollment::{Enrollment, EnrollmentId, PaymentStatus, UserId};

use super::{EnrollmentRepository, RepositoryError, SectionGrant};
use crate::DbPool;

/// Attempts per compare-and-swap loop before giving up; contention on a
/// single enrollment row is rare and short-lived.
const CAS_ATTEMPTS: u32 = 3;

pub struct SqlEnrollmentRepository {
    pool: DbPool,
}

impl SqlEnrollmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, course_id, payment_status, payment_reference,
        paid_sections_json, progress_percent, total_score, max_possible_score,
        row_version, enrolled_at, completed_at";

#[async_trait::async_trait]
impl EnrollmentRepository for SqlEnrollmentRepository {
    async fn find_by_id(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM enrollment WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(enrollment_from_row).transpose()
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM enrollment WHERE payment_reference = ?"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(enrollment_from_row).transpose()
    }

    async fn find_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM enrollment WHERE user_id = ? AND course_id = ?"
        ))
        .bind(&user_id.0)
        .bind(&course_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(enrollment_from_row).transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Enrollment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM enrollment WHERE user_id = ? ORDER BY enrolled_at DESC"
        ))
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(enrollment_from_row).collect()
    }

    async fn begin_paid_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        reference: &str,
    ) -> Result<Enrollment, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO enrollment (
                id, user_id, course_id, payment_status, payment_reference, enrolled_at
             ) VALUES (?, ?, ?, 'pending', ?, ?)
             ON CONFLICT(user_id, course_id) DO UPDATE SET
                payment_status = 'pending',
                payment_reference = excluded.payment_reference,
                row_version = row_version + 1",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user_id.0)
        .bind(&course_id.0)
        .bind(reference)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM enrollment WHERE user_id = ? AND course_id = ?"
        ))
        .bind(&user_id.0)
        .bind(&course_id.0)
        .fetch_one(&self.pool)
        .await?;

        enrollment_from_row(row)
    }

    async fn insert_free_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Enrollment, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            "INSERT INTO enrollment (id, user_id, course_id, payment_status, enrolled_at)
             VALUES (?, ?, ?, 'completed', ?)",
        )
        .bind(&id)
        .bind(&user_id.0)
        .bind(&course_id.0)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(error) if RepositoryError::is_unique_violation(&error) => {
                return Err(RepositoryError::Conflict(format!(
                    "enrollment already exists for user {} in course {}",
                    user_id.0, course_id.0
                )));
            }
            Err(error) => return Err(error.into()),
        }

        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM enrollment WHERE id = ?"))
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;

        enrollment_from_row(row)
    }

    async fn apply_outcome_by_reference(
        &self,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE enrollment
             SET payment_status = ?, row_version = row_version + 1
             WHERE payment_reference = ? AND payment_status = 'pending'",
        )
        .bind(status.as_str())
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn apply_outcome_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE enrollment
             SET payment_status = ?, payment_reference = ?, row_version = row_version + 1
             WHERE user_id = ? AND course_id = ? AND payment_status = 'pending'",
        )
        .bind(status.as_str())
        .bind(reference)
        .bind(&user_id.0)
        .bind(&course_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn add_paid_section(
        &self,
        id: &EnrollmentId,
        section_id: &SectionId,
    ) -> Result<SectionGrant, RepositoryError> {
        for _ in 0..CAS_ATTEMPTS {
            let Some(enrollment) = self.find_by_id(id).await? else {
                return Err(RepositoryError::Conflict(format!(
                    "enrollment {} not found",
                    id.0
                )));
            };

            if enrollment.paid_sections.contains(section_id) {
                return Ok(SectionGrant::AlreadyPresent);
            }

            let mut sections = enrollment.paid_sections.clone();
            sections.push(section_id.clone());

            if self.swap_paid_sections(id, &sections, enrollment.row_version).await? {
                return Ok(SectionGrant::Added);
            }
        }

        Err(RepositoryError::Conflict(format!(
            "concurrent updates exhausted retries for enrollment {}",
            id.0
        )))
    }

    async fn add_paid_sections(
        &self,
        id: &EnrollmentId,
        section_ids: &[SectionId],
    ) -> Result<(), RepositoryError> {
        for _ in 0..CAS_ATTEMPTS {
            let Some(enrollment) = self.find_by_id(id).await? else {
                return Err(RepositoryError::Conflict(format!(
                    "enrollment {} not found",
                    id.0
                )));
            };

            let mut sections = enrollment.paid_sections.clone();
            let mut changed = false;
            for section_id in section_ids {
                if !sections.contains(section_id) {
                    sections.push(section_id.clone());
                    changed = true;
                }
            }

            if !changed {
                return Ok(());
            }

            if self.swap_paid_sections(id, &sections, enrollment.row_version).await? {
                return Ok(());
            }
        }

        Err(RepositoryError::Conflict(format!(
            "concurrent updates exhausted retries for enrollment {}",
            id.0
        )))
    }

    async fn record_progress(
        &self,
        id: &EnrollmentId,
        percent: f64,
    ) -> Result<Enrollment, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE enrollment
             SET progress_percent = ?1,
                 completed_at = CASE
                     WHEN ?1 >= 100.0 AND completed_at IS NULL THEN ?2
                     ELSE completed_at
                 END,
                 row_version = row_version + 1
             WHERE id = ?3",
        )
        .bind(percent)
        .bind(&now)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM enrollment WHERE id = ?"))
            .bind(&id.0)
            .fetch_one(&self.pool)
            .await?;

        enrollment_from_row(row)
    }

    async fn accumulate_score(
        &self,
        id: &EnrollmentId,
        score: i64,
        max_score: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE enrollment
             SET total_score = total_score + ?,
                 max_possible_score = max_possible_score + ?,
                 row_version = row_version + 1
             WHERE id = ?",
        )
        .bind(score)
        .bind(max_score)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl SqlEnrollmentRepository {
    /// Version-guarded write of the paid-section set. Returns false when a
    /// concurrent writer bumped `row_version` first.
    async fn swap_paid_sections(
        &self,
        id: &EnrollmentId,
        sections: &[SectionId],
        expected_version: i64,
    ) -> Result<bool, RepositoryError> {
        let payload = serde_json::to_string(
            &sections.iter().map(|section| section.0.as_str()).collect::<Vec<_>>(),
        )
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let result = sqlx::query(
            "UPDATE enrollment
             SET paid_sections_json = ?, row_version = row_version + 1
             WHERE id = ? AND row_version = ?",
        )
        .bind(payload)
        .bind(&id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn enrollment_from_row(row: SqliteRow) -> Result<Enrollment, RepositoryError> {
    let status_raw = row.try_get::<String, _>("payment_status")?;
    let payment_status = PaymentStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment status `{status_raw}`"))
    })?;

    let sections_raw = row.try_get::<String, _>("paid_sections_json")?;
    let paid_sections: Vec<String> = serde_json::from_str(&sections_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid paid_sections_json: {error}"))
    })?;

    Ok(Enrollment {
        id: EnrollmentId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        payment_status,
        payment_reference: row.try_get("payment_reference")?,
        paid_sections: paid_sections.into_iter().map(SectionId).collect(),
        progress_percent: row.try_get("progress_percent")?,
        total_score: row.try_get("total_score")?,
        max_possible_score: row.try_get("max_possible_score")?,
        row_version: row.try_get("row_version")?,
        enrolled_at: parse_timestamp("enrolled_at", row.try_get("enrolled_at")?)?,
        completed_at: parse_optional_timestamp("completed_at", row.try_get("completed_at")?)?,
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
