use acadia_core::chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use acadia_core::domain::course::{
    CertificatePolicy, Course, CourseId, Lecture, LectureContent, LectureId, Section, SectionId,
};

use super::{CourseRepository, RepositoryError};
use crate::repositories::enrollment::parse_timestamp;
use crate::DbPool;

pub struct SqlCourseRepository {
    pool: DbPool,
}

impl SqlCourseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_sections(&self, course_id: &CourseId) -> Result<Vec<Section>, RepositoryError> {
        let section_rows = sqlx::query(
            "SELECT id, course_id, title, display_order, is_paid, price
             FROM section
             WHERE course_id = ?
             ORDER BY display_order ASC",
        )
        .bind(&course_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut sections = Vec::with_capacity(section_rows.len());
        for row in section_rows {
            let mut section = section_from_row(row)?;
            section.lectures = self.load_lectures(&section.id).await?;
            sections.push(section);
        }
        Ok(sections)
    }

    async fn load_lectures(&self, section_id: &SectionId) -> Result<Vec<Lecture>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, section_id, title, display_order, kind, content_json
             FROM lecture
             WHERE section_id = ?
             ORDER BY display_order ASC",
        )
        .bind(&section_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(lecture_from_row).collect()
    }
}

#[async_trait::async_trait]
impl CourseRepository for SqlCourseRepository {
    async fn find_by_id(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, description, is_paid, price, is_active,
                    certificate_enabled, certificate_require_completion,
                    certificate_require_min_score, certificate_min_score, created_at
             FROM course WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut course = course_from_row(row)?;
        course.sections = self.load_sections(&course.id).await?;
        Ok(Some(course))
    }

    async fn list_active(&self) -> Result<Vec<Course>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, description, is_paid, price, is_active,
                    certificate_enabled, certificate_require_completion,
                    certificate_require_min_score, certificate_min_score, created_at
             FROM course
             WHERE is_active = 1
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            let mut course = course_from_row(row)?;
            course.sections = self.load_sections(&course.id).await?;
            courses.push(course);
        }
        Ok(courses)
    }

    async fn insert(&self, course: &Course) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO course (
                id, title, description, is_paid, price, is_active,
                certificate_enabled, certificate_require_completion,
                certificate_require_min_score, certificate_min_score,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&course.id.0)
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.is_paid)
        .bind(course.price)
        .bind(course.is_active)
        .bind(course.certificate.enabled)
        .bind(course.certificate.require_completion)
        .bind(course.certificate.require_min_score)
        .bind(course.certificate.min_score_percent)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_course(&self, course: &Course) -> Result<u64, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE course SET
                title = ?, description = ?, is_paid = ?, price = ?, is_active = ?,
                certificate_enabled = ?, certificate_require_completion = ?,
                certificate_require_min_score = ?, certificate_min_score = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.is_paid)
        .bind(course.price)
        .bind(course.is_active)
        .bind(course.certificate.enabled)
        .bind(course.certificate.require_completion)
        .bind(course.certificate.require_min_score)
        .bind(course.certificate.min_score_percent)
        .bind(&now)
        .bind(&course.id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_section(
        &self,
        course_id: &CourseId,
        title: &str,
        is_paid: bool,
        price: Option<i64>,
    ) -> Result<Section, RepositoryError> {
        let id = SectionId(Uuid::new_v4().to_string());
        let now = Utc::now().to_rfc3339();

        let next_order: i64 = sqlx::query_scalar(
            "SELECT IFNULL(MAX(display_order), 0) + 1 FROM section WHERE course_id = ?",
        )
        .bind(&course_id.0)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO section (id, course_id, title, display_order, is_paid, price, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&course_id.0)
        .bind(title)
        .bind(next_order)
        .bind(is_paid)
        .bind(price)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Section {
            id,
            course_id: course_id.clone(),
            title: title.to_string(),
            order: next_order,
            is_paid,
            price,
            lectures: Vec::new(),
        })
    }

    async fn find_section(&self, id: &SectionId) -> Result<Option<Section>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, course_id, title, display_order, is_paid, price
             FROM section WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut section = section_from_row(row)?;
        section.lectures = self.load_lectures(&section.id).await?;
        Ok(Some(section))
    }

    async fn insert_lecture(
        &self,
        section_id: &SectionId,
        title: &str,
        content: &LectureContent,
    ) -> Result<Lecture, RepositoryError> {
        let id = LectureId(Uuid::new_v4().to_string());
        let kind = content.kind();
        let now = Utc::now().to_rfc3339();
        let content_json = serde_json::to_string(content)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let next_order: i64 = sqlx::query_scalar(
            "SELECT IFNULL(MAX(display_order), 0) + 1 FROM lecture WHERE section_id = ?",
        )
        .bind(&section_id.0)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO lecture (id, section_id, title, display_order, kind, content_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&section_id.0)
        .bind(title)
        .bind(next_order)
        .bind(kind.as_str())
        .bind(&content_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Lecture {
            id,
            section_id: section_id.clone(),
            title: title.to_string(),
            order: next_order,
            kind,
            content: content.clone(),
        })
    }

    async fn update_lecture(
        &self,
        id: &LectureId,
        title: &str,
        content: &LectureContent,
    ) -> Result<u64, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let content_json = serde_json::to_string(content)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let result = sqlx::query(
            "UPDATE lecture SET title = ?, kind = ?, content_json = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(title)
        .bind(content.kind().as_str())
        .bind(&content_json)
        .bind(&now)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_lecture(&self, id: &LectureId) -> Result<Option<Lecture>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, section_id, title, display_order, kind, content_json
             FROM lecture WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(lecture_from_row).transpose()
    }

    async fn course_id_for_lecture(
        &self,
        id: &LectureId,
    ) -> Result<Option<CourseId>, RepositoryError> {
        let row = sqlx::query(
            "SELECT s.course_id AS course_id
             FROM lecture l
             JOIN section s ON s.id = l.section_id
             WHERE l.id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CourseId(row.get("course_id"))))
    }
}

fn course_from_row(row: SqliteRow) -> Result<Course, RepositoryError> {
    Ok(Course {
        id: CourseId(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        is_paid: row.try_get("is_paid")?,
        price: row.try_get("price")?,
        is_active: row.try_get("is_active")?,
        certificate: CertificatePolicy {
            enabled: row.try_get("certificate_enabled")?,
            require_completion: row.try_get("certificate_require_completion")?,
            require_min_score: row.try_get("certificate_require_min_score")?,
            min_score_percent: row.try_get("certificate_min_score")?,
        },
        sections: Vec::new(),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn section_from_row(row: SqliteRow) -> Result<Section, RepositoryError> {
    Ok(Section {
        id: SectionId(row.try_get("id")?),
        course_id: CourseId(row.try_get("course_id")?),
        title: row.try_get("title")?,
        order: row.try_get("display_order")?,
        is_paid: row.try_get("is_paid")?,
        price: row.try_get("price")?,
        lectures: Vec::new(),
    })
}

fn lecture_from_row(row: SqliteRow) -> Result<Lecture, RepositoryError> {
    let content_raw = row.try_get::<String, _>("content_json")?;
    let content: LectureContent = serde_json::from_str(&content_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid lecture content: {error}")))?;

    Ok(Lecture {
        id: LectureId(row.try_get("id")?),
        section_id: SectionId(row.try_get("section_id")?),
        title: row.try_get("title")?,
        order: row.try_get("display_order")?,
        kind: content.kind(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use acadia_core::chrono::Utc;
    use acadia_core::domain::course::{
        CertificatePolicy, Course, CourseId, LectureContent, LectureKind,
    };

    use super::SqlCourseRepository;
    use crate::migrations;
    use crate::repositories::CourseRepository;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn sample_course(id: &str) -> Course {
        Course {
            id: CourseId(id.to_string()),
            title: "Maritime Law".to_string(),
            description: "Contracts and carriage".to_string(),
            is_paid: true,
            price: Some(5000),
            is_active: true,
            certificate: CertificatePolicy {
                enabled: true,
                require_completion: true,
                require_min_score: true,
                min_score_percent: Some(70.0),
            },
            sections: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn course_tree_round_trips_with_sections_and_lectures() {
        let pool = setup_pool().await;
        let repo = SqlCourseRepository::new(pool.clone());

        let course = sample_course("c-tree");
        repo.insert(&course).await.expect("insert course");

        let section = repo
            .insert_section(&course.id, "Freight Basics", true, Some(2000))
            .await
            .expect("insert section");
        assert_eq!(section.order, 1);

        let second = repo
            .insert_section(&course.id, "Claims", false, None)
            .await
            .expect("insert second section");
        assert_eq!(second.order, 2, "orders are appended per course");

        let lecture = repo
            .insert_lecture(
                &section.id,
                "Intro video",
                &LectureContent::Video { url: "https://cdn.example/intro.mp4".to_string() },
            )
            .await
            .expect("insert lecture");
        assert_eq!(lecture.kind, LectureKind::Video);

        let loaded = repo.find_by_id(&course.id).await.expect("load").expect("course exists");
        assert_eq!(loaded.sections.len(), 2);
        assert_eq!(loaded.sections[0].lectures.len(), 1);
        assert_eq!(loaded.certificate.min_score_percent, Some(70.0));

        pool.close().await;
    }

    #[tokio::test]
    async fn update_lecture_changes_kind_with_content() {
        let pool = setup_pool().await;
        let repo = SqlCourseRepository::new(pool.clone());

        let course = sample_course("c-kind");
        repo.insert(&course).await.expect("insert course");
        let section =
            repo.insert_section(&course.id, "Fundamentals", false, None).await.expect("section");
        let lecture = repo
            .insert_lecture(
                &section.id,
                "Checkpoint",
                &LectureContent::Text { body: "Read chapter 1".to_string() },
            )
            .await
            .expect("lecture");

        let updated = repo
            .update_lecture(
                &lecture.id,
                "Checkpoint quiz",
                &LectureContent::Quiz { instructions: Some("Answer all".to_string()) },
            )
            .await
            .expect("update");
        assert_eq!(updated, 1);

        let reloaded =
            repo.find_lecture(&lecture.id).await.expect("lookup").expect("lecture exists");
        assert_eq!(reloaded.kind, LectureKind::Quiz);

        pool.close().await;
    }

    #[tokio::test]
    async fn course_id_for_lecture_traverses_the_tree() {
        let pool = setup_pool().await;
        let repo = SqlCourseRepository::new(pool.clone());

        let course = sample_course("c-9");
        repo.insert(&course).await.expect("insert course");
        let section =
            repo.insert_section(&course.id, "Fundamentals", false, None).await.expect("section");
        let lecture = repo
            .insert_lecture(
                &section.id,
                "Intro",
                &LectureContent::Text { body: "Welcome".to_string() },
            )
            .await
            .expect("lecture");

        let course_id =
            repo.course_id_for_lecture(&lecture.id).await.expect("lookup").expect("found");
        assert_eq!(course_id, course.id);

        pool.close().await;
    }
}
