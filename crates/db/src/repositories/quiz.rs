use acadia_core::chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use acadia_core::domain::course::LectureId;
use acadia_core::domain::enrollment::UserId;
use acadia_core::domain::quiz::{Question, QuestionId, Quiz, QuizAttempt, QuizId};

use super::{QuizRepository, RepositoryError};
use crate::repositories::enrollment::parse_timestamp;
use crate::DbPool;

pub struct SqlQuizRepository {
    pool: DbPool,
}

impl SqlQuizRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, quiz_id, display_order, prompt, options_json, correct_index
             FROM question
             WHERE quiz_id = ?
             ORDER BY display_order ASC",
        )
        .bind(&quiz_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(question_from_row).collect()
    }

    async fn quiz_row(&self, lecture_id: &LectureId) -> Result<Option<(QuizId, LectureId, String)>, RepositoryError> {
        let row = sqlx::query("SELECT id, lecture_id, title FROM quiz WHERE lecture_id = ?")
            .bind(&lecture_id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            (QuizId(row.get("id")), LectureId(row.get("lecture_id")), row.get("title"))
        }))
    }
}

#[async_trait::async_trait]
impl QuizRepository for SqlQuizRepository {
    async fn find_by_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Option<Quiz>, RepositoryError> {
        let Some((id, lecture_id, title)) = self.quiz_row(lecture_id).await? else {
            return Ok(None);
        };

        let questions = self.load_questions(&id).await?;
        Ok(Some(Quiz { id, lecture_id, title, questions }))
    }

    async fn find_by_id(&self, id: &QuizId) -> Result<Option<Quiz>, RepositoryError> {
        let row = sqlx::query("SELECT id, lecture_id, title FROM quiz WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let quiz_id = QuizId(row.get("id"));
        let questions = self.load_questions(&quiz_id).await?;
        Ok(Some(Quiz {
            id: quiz_id,
            lecture_id: LectureId(row.get("lecture_id")),
            title: row.get("title"),
            questions,
        }))
    }

    async fn ensure_for_lecture(
        &self,
        lecture_id: &LectureId,
        title: &str,
    ) -> Result<Quiz, RepositoryError> {
        if let Some(existing) = self.find_by_lecture(lecture_id).await? {
            return Ok(existing);
        }

        let id = QuizId(Uuid::new_v4().to_string());
        let now = Utc::now().to_rfc3339();

        // A concurrent provisioner may win the insert; the unique lecture_id
        // constraint turns that into a fallthrough read.
        let inserted = sqlx::query(
            "INSERT INTO quiz (id, lecture_id, title, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&lecture_id.0)
        .bind(title)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(Quiz {
                id,
                lecture_id: lecture_id.clone(),
                title: title.to_string(),
                questions: Vec::new(),
            }),
            Err(error) if RepositoryError::is_unique_violation(&error) => self
                .find_by_lecture(lecture_id)
                .await?
                .ok_or_else(|| RepositoryError::Decode("quiz vanished after conflict".to_string())),
            Err(error) => Err(error.into()),
        }
    }

    async fn replace_questions(
        &self,
        quiz_id: &QuizId,
        questions: &[Question],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM question WHERE quiz_id = ?")
            .bind(&quiz_id.0)
            .execute(&mut *tx)
            .await?;

        for question in questions {
            let options_json = serde_json::to_string(&question.options)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;

            sqlx::query(
                "INSERT INTO question (id, quiz_id, display_order, prompt, options_json, correct_index)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&question.id.0)
            .bind(&quiz_id.0)
            .bind(question.order)
            .bind(&question.prompt)
            .bind(&options_json)
            .bind(question.correct_index)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<(), RepositoryError> {
        let answers_json = serde_json::to_string(&attempt.answers)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO quiz_attempt (id, user_id, quiz_id, answers_json, score, max_score, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&attempt.id)
        .bind(&attempt.user_id.0)
        .bind(&attempt.quiz_id.0)
        .bind(&answers_json)
        .bind(attempt.score)
        .bind(attempt.max_score)
        .bind(attempt.submitted_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_attempts(
        &self,
        user_id: &UserId,
        quiz_id: &QuizId,
    ) -> Result<Vec<QuizAttempt>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, quiz_id, answers_json, score, max_score, submitted_at
             FROM quiz_attempt
             WHERE user_id = ? AND quiz_id = ?
             ORDER BY submitted_at ASC",
        )
        .bind(&user_id.0)
        .bind(&quiz_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(attempt_from_row).collect()
    }
}

fn question_from_row(row: SqliteRow) -> Result<Question, RepositoryError> {
    let options_raw = row.try_get::<String, _>("options_json")?;
    let options: Vec<String> = serde_json::from_str(&options_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid options_json: {error}")))?;

    Ok(Question {
        id: QuestionId(row.try_get("id")?),
        quiz_id: QuizId(row.try_get("quiz_id")?),
        order: row.try_get("display_order")?,
        prompt: row.try_get("prompt")?,
        options,
        correct_index: row.try_get("correct_index")?,
    })
}

fn attempt_from_row(row: SqliteRow) -> Result<QuizAttempt, RepositoryError> {
    let answers_raw = row.try_get::<String, _>("answers_json")?;
    let answers: Vec<i64> = serde_json::from_str(&answers_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid answers_json: {error}")))?;

    Ok(QuizAttempt {
        id: row.try_get("id")?,
        user_id: UserId(row.try_get("user_id")?),
        quiz_id: QuizId(row.try_get("quiz_id")?),
        answers,
        score: row.try_get("score")?,
        max_score: row.try_get("max_score")?,
        submitted_at: parse_timestamp("submitted_at", row.try_get("submitted_at")?)?,
    })
}
