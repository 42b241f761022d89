use acadia_core::chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use acadia_core::domain::assignment::{Assignment, AssignmentId, Submission, SubmissionId};
use acadia_core::domain::course::LectureId;
use acadia_core::domain::enrollment::UserId;

use super::{AssignmentRepository, RepositoryError, SubmissionRepository};
use crate::repositories::enrollment::{parse_optional_timestamp, parse_timestamp};
use crate::DbPool;

pub struct SqlAssignmentRepository {
    pool: DbPool,
}

impl SqlAssignmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AssignmentRepository for SqlAssignmentRepository {
    async fn find_by_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Option<Assignment>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, lecture_id, title, description, due_date
             FROM assignment WHERE lecture_id = ?",
        )
        .bind(&lecture_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(assignment_from_row).transpose()
    }

    async fn ensure_for_lecture(
        &self,
        lecture_id: &LectureId,
        title: &str,
        description: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Assignment, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO assignment (id, lecture_id, title, description, due_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(lecture_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                due_date = excluded.due_date",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&lecture_id.0)
        .bind(title)
        .bind(description)
        .bind(due_date.map(|value| value.to_rfc3339()))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_by_lecture(lecture_id).await?.ok_or_else(|| {
            RepositoryError::Decode("assignment vanished after upsert".to_string())
        })
    }
}

#[async_trait::async_trait]
impl SubmissionRepository for SqlAssignmentRepository {
    async fn append(&self, submission: &Submission) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO submission (id, user_id, lecture_id, assignment_id, content, grade, feedback, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&submission.id.0)
        .bind(&submission.user_id.0)
        .bind(&submission.lecture_id.0)
        .bind(&submission.assignment_id.0)
        .bind(&submission.content)
        .bind(submission.grade)
        .bind(submission.feedback.as_deref())
        .bind(submission.submitted_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_for_user_lecture(
        &self,
        user_id: &UserId,
        lecture_id: &LectureId,
    ) -> Result<Option<Submission>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, lecture_id, assignment_id, content, grade, feedback, submitted_at
             FROM submission
             WHERE user_id = ? AND lecture_id = ?
             ORDER BY submitted_at DESC
             LIMIT 1",
        )
        .bind(&user_id.0)
        .bind(&lecture_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(submission_from_row).transpose()
    }

    async fn set_grade(
        &self,
        id: &SubmissionId,
        grade: f64,
        feedback: Option<&str>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE submission SET grade = ?, feedback = ? WHERE id = ?")
            .bind(grade)
            .bind(feedback)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn assignment_from_row(row: SqliteRow) -> Result<Assignment, RepositoryError> {
    Ok(Assignment {
        id: AssignmentId(row.try_get("id")?),
        lecture_id: LectureId(row.try_get("lecture_id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        due_date: parse_optional_timestamp("due_date", row.try_get("due_date")?)?,
    })
}

fn submission_from_row(row: SqliteRow) -> Result<Submission, RepositoryError> {
    Ok(Submission {
        id: SubmissionId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        lecture_id: LectureId(row.try_get("lecture_id")?),
        assignment_id: AssignmentId(row.try_get("assignment_id")?),
        content: row.try_get("content")?,
        grade: row.try_get("grade")?,
        feedback: row.try_get("feedback")?,
        submitted_at: parse_timestamp("submitted_at", row.try_get("submitted_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use acadia_core::chrono::{Duration, Utc};
    use acadia_core::domain::assignment::{Submission, SubmissionId};
    use acadia_core::domain::course::{CourseId, LectureContent, LectureId};
    use acadia_core::domain::enrollment::UserId;

    use super::SqlAssignmentRepository;
    use crate::migrations;
    use crate::repositories::{
        AssignmentRepository, CourseRepository, SqlCourseRepository, SubmissionRepository,
    };
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> (DbPool, LectureId) {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let course_id = uuid::Uuid::new_v4().to_string();
        let timestamp = "2026-05-12T09:00:00Z";
        sqlx::query(
            "INSERT INTO course (id, title, created_at, updated_at) VALUES (?, 'Test', ?, ?)",
        )
        .bind(&course_id)
        .bind(timestamp)
        .bind(timestamp)
        .execute(&pool)
        .await
        .expect("insert course");

        let courses = SqlCourseRepository::new(pool.clone());
        let section = courses
            .insert_section(&CourseId(course_id), "S1", false, None)
            .await
            .expect("section");
        let lecture = courses
            .insert_lecture(
                &section.id,
                "Case study",
                &LectureContent::Assignment {
                    description: "Write a voyage plan".to_string(),
                    due_date: None,
                },
            )
            .await
            .expect("lecture");

        (pool, lecture.id)
    }

    #[tokio::test]
    async fn ensure_for_lecture_upserts_from_lecture_payload() {
        let (pool, lecture_id) = setup().await;
        let repo = SqlAssignmentRepository::new(pool.clone());

        let created = repo
            .ensure_for_lecture(&lecture_id, "Case study", "Write a voyage plan", None)
            .await
            .expect("provision");

        let due = Utc::now() + Duration::days(7);
        let refreshed = repo
            .ensure_for_lecture(&lecture_id, "Case study v2", "Write a voyage plan", Some(due))
            .await
            .expect("refresh");

        assert_eq!(created.id, refreshed.id, "backing record is reused");
        assert_eq!(refreshed.title, "Case study v2");
        assert!(refreshed.due_date.is_some());

        pool.close().await;
    }

    #[tokio::test]
    async fn submissions_append_and_latest_wins_for_display() {
        let (pool, lecture_id) = setup().await;
        let repo = SqlAssignmentRepository::new(pool.clone());
        let assignment = repo
            .ensure_for_lecture(&lecture_id, "Case study", "Write a voyage plan", None)
            .await
            .expect("provision");
        let user = UserId("u-1".to_string());

        let base = Utc::now();
        for (index, offset_secs) in [(1, 0), (2, 30)] {
            repo.append(&Submission {
                id: SubmissionId(format!("sub-{index}")),
                user_id: user.clone(),
                lecture_id: lecture_id.clone(),
                assignment_id: assignment.id.clone(),
                content: format!("Draft {index}"),
                grade: None,
                feedback: None,
                submitted_at: base + Duration::seconds(offset_secs),
            })
            .await
            .expect("append submission");
        }

        let latest = repo
            .latest_for_user_lecture(&user, &lecture_id)
            .await
            .expect("lookup")
            .expect("submission exists");
        assert_eq!(latest.content, "Draft 2");

        let graded = repo.set_grade(&latest.id, 87.5, Some("Solid work")).await.expect("grade");
        assert_eq!(graded, 1);

        let regraded = repo
            .latest_for_user_lecture(&user, &lecture_id)
            .await
            .expect("lookup")
            .expect("submission exists");
        assert_eq!(regraded.grade, Some(87.5));

        pool.close().await;
    }
}
