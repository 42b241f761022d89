use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::course::CourseId;
use crate::domain::enrollment::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateId(pub String);

/// Issued at most once per (user, course); never deleted or regenerated by
/// this system. `image_url` points at the rendered artifact in the object
/// store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub image_url: String,
    pub issued_at: DateTime<Utc>,
}
