//! Deterministic demo fixtures for local development and smoke checks.
//!
//! Seeds one free course and one paid course with a premium section, a quiz
//! checkpoint, and an assignment, using fixed ids so reseeding is idempotent.

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_TIMESTAMP: &str = "2026-01-05T08:00:00Z";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub courses: u32,
    pub sections: u32,
    pub lectures: u32,
    pub questions: u32,
}

pub async fn seed_demo_catalog(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
    let mut result = SeedResult::default();

    result.courses += insert_course(
        pool,
        "course-free-001",
        "Introduction to Port Operations",
        false,
        None,
        false,
    )
    .await?;
    result.courses +=
        insert_course(pool, "course-paid-001", "Advanced Freight Forwarding", true, Some(5000), true)
            .await?;

    result.sections += insert_section(pool, "sec-free-001", "course-free-001", "Getting Started", 1, false, None).await?;
    result.sections +=
        insert_section(pool, "sec-paid-001", "course-paid-001", "Fundamentals", 1, false, None).await?;
    result.sections += insert_section(
        pool,
        "sec-paid-002",
        "course-paid-001",
        "Customs Deep Dive",
        2,
        true,
        Some(2000),
    )
    .await?;

    result.lectures += insert_lecture(
        pool,
        "lec-001",
        "sec-free-001",
        "Welcome aboard",
        1,
        "VIDEO",
        r#"{"type":"VIDEO","url":"https://cdn.example/welcome.mp4"}"#,
    )
    .await?;
    result.lectures += insert_lecture(
        pool,
        "lec-002",
        "sec-paid-001",
        "Incoterms overview",
        1,
        "TEXT",
        r#"{"type":"TEXT","body":"EXW, FOB, CIF and friends."}"#,
    )
    .await?;
    result.lectures += insert_lecture(
        pool,
        "lec-003",
        "sec-paid-001",
        "Checkpoint quiz",
        2,
        "QUIZ",
        r#"{"type":"QUIZ","instructions":"Answer every question."}"#,
    )
    .await?;
    result.lectures += insert_lecture(
        pool,
        "lec-004",
        "sec-paid-002",
        "Customs declaration workshop",
        1,
        "ASSIGNMENT",
        r#"{"type":"ASSIGNMENT","description":"Draft a declaration for the sample shipment.","due_date":null}"#,
    )
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO quiz (id, lecture_id, title, created_at)
         VALUES ('quiz-001', 'lec-003', 'Checkpoint quiz', ?)",
    )
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO assignment (id, lecture_id, title, description, created_at)
         VALUES ('asg-001', 'lec-004', 'Customs declaration workshop',
                 'Draft a declaration for the sample shipment.', ?)",
    )
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    let questions: [(&str, i64, &str, &str, i64); 2] = [
        (
            "q-001",
            1,
            "Which incoterm places maximum obligation on the seller?",
            r#"["EXW","DDP","FOB"]"#,
            1,
        ),
        (
            "q-002",
            2,
            "Who files the export declaration under FOB?",
            r#"["Buyer","Seller"]"#,
            1,
        ),
    ];

    for (id, order, prompt, options, correct) in questions {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO question (id, quiz_id, display_order, prompt, options_json, correct_index)
             VALUES (?, 'quiz-001', ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(order)
        .bind(prompt)
        .bind(options)
        .bind(correct)
        .execute(pool)
        .await?;
        result.questions += inserted.rows_affected() as u32;
    }

    Ok(result)
}

async fn insert_course(
    pool: &DbPool,
    id: &str,
    title: &str,
    is_paid: bool,
    price: Option<i64>,
    certificate_enabled: bool,
) -> Result<u32, RepositoryError> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO course (
            id, title, description, is_paid, price, is_active,
            certificate_enabled, certificate_require_completion,
            certificate_require_min_score, certificate_min_score,
            created_at, updated_at
         ) VALUES (?, ?, '', ?, ?, 1, ?, 1, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(title)
    .bind(is_paid)
    .bind(price)
    .bind(certificate_enabled)
    .bind(certificate_enabled)
    .bind(certificate_enabled.then_some(70.0))
    .bind(SEED_TIMESTAMP)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    Ok(inserted.rows_affected() as u32)
}

async fn insert_section(
    pool: &DbPool,
    id: &str,
    course_id: &str,
    title: &str,
    order: i64,
    is_paid: bool,
    price: Option<i64>,
) -> Result<u32, RepositoryError> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO section (id, course_id, title, display_order, is_paid, price, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(course_id)
    .bind(title)
    .bind(order)
    .bind(is_paid)
    .bind(price)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    Ok(inserted.rows_affected() as u32)
}

async fn insert_lecture(
    pool: &DbPool,
    id: &str,
    section_id: &str,
    title: &str,
    order: i64,
    kind: &str,
    content_json: &str,
) -> Result<u32, RepositoryError> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO lecture (id, section_id, title, display_order, kind, content_json, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(section_id)
    .bind(title)
    .bind(order)
    .bind(kind)
    .bind(content_json)
    .bind(SEED_TIMESTAMP)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await?;

    Ok(inserted.rows_affected() as u32)
}

#[cfg(test)]
mod tests {
    use super::seed_demo_catalog;
    use crate::migrations;
    use crate::repositories::{CourseRepository, SqlCourseRepository};
    use crate::connect_with_settings;

    use acadia_core::domain::course::CourseId;

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = seed_demo_catalog(&pool).await.expect("first seed");
        assert_eq!(first.courses, 2);
        assert_eq!(first.sections, 3);
        assert_eq!(first.lectures, 4);
        assert_eq!(first.questions, 2);

        let second = seed_demo_catalog(&pool).await.expect("second seed");
        assert_eq!(second.courses, 0, "fixed ids make reseeding a no-op");

        let courses = SqlCourseRepository::new(pool.clone());
        let paid = courses
            .find_by_id(&CourseId("course-paid-001".to_string()))
            .await
            .expect("lookup")
            .expect("seeded course exists");
        assert_eq!(paid.sections.len(), 2);
        assert!(paid.certificate.enabled);

        pool.close().await;
    }
}
