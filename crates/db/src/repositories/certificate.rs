use sqlx::{sqlite::SqliteRow, Row};

use acadia_core::domain::certificate::{Certificate, CertificateId};
use acadia_core::domain::course::CourseId;
use acadia_core::domain::enrollment::UserId;

use super::{CertificateRepository, RepositoryError};
use crate::repositories::enrollment::parse_timestamp;
use crate::DbPool;

pub struct SqlCertificateRepository {
    pool: DbPool,
}

impl SqlCertificateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CertificateRepository for SqlCertificateRepository {
    async fn find_by_user_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<Certificate>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, course_id, image_url, issued_at
             FROM certificate
             WHERE user_id = ? AND course_id = ?",
        )
        .bind(&user_id.0)
        .bind(&course_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(certificate_from_row).transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, course_id, image_url, issued_at
             FROM certificate
             WHERE user_id = ?
             ORDER BY issued_at DESC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(certificate_from_row).collect()
    }

    async fn insert_if_absent(&self, certificate: &Certificate) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO certificate (id, user_id, course_id, image_url, issued_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, course_id) DO NOTHING",
        )
        .bind(&certificate.id.0)
        .bind(&certificate.user_id.0)
        .bind(&certificate.course_id.0)
        .bind(&certificate.image_url)
        .bind(certificate.issued_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn certificate_from_row(row: SqliteRow) -> Result<Certificate, RepositoryError> {
    Ok(Certificate {
        id: CertificateId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        image_url: row.try_get("image_url")?,
        issued_at: parse_timestamp("issued_at", row.try_get("issued_at")?)?,
    })
}
