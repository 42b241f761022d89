use sqlx::{sqlite::SqliteRow, Row};

use acadia_core::payment::{PaymentAuditEvent, ReconcileChannel, ReconcileDisposition};

use super::{PaymentAuditRepository, RepositoryError};
use crate::repositories::enrollment::parse_timestamp;
use crate::DbPool;

pub struct SqlPaymentAuditRepository {
    pool: DbPool,
}

impl SqlPaymentAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PaymentAuditRepository for SqlPaymentAuditRepository {
    async fn append(&self, event: &PaymentAuditEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO payment_event_audit (
                id, reference, channel, disposition, succeeded, metadata_json, occurred_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.reference)
        .bind(event.channel.as_str())
        .bind(event.disposition.as_str())
        .bind(event.succeeded)
        .bind(&event.metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<PaymentAuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, reference, channel, disposition, succeeded, metadata_json, occurred_at
             FROM payment_event_audit
             WHERE reference = ?
             ORDER BY occurred_at ASC",
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(event_from_row).collect()
    }
}

fn event_from_row(row: SqliteRow) -> Result<PaymentAuditEvent, RepositoryError> {
    let channel_raw = row.try_get::<String, _>("channel")?;
    let channel = ReconcileChannel::parse(&channel_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown channel `{channel_raw}`")))?;

    let disposition_raw = row.try_get::<String, _>("disposition")?;
    let disposition = ReconcileDisposition::parse(&disposition_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown disposition `{disposition_raw}`"))
    })?;

    Ok(PaymentAuditEvent {
        id: row.try_get("id")?,
        reference: row.try_get("reference")?,
        channel,
        disposition,
        succeeded: row.try_get("succeeded")?,
        metadata_json: row.try_get("metadata_json")?,
        occurred_at: parse_timestamp("occurred_at", row.try_get("occurred_at")?)?,
    })
}
