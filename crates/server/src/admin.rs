//! Admin authoring endpoints: course/section/lecture management, quiz
//! editing, and out-of-band submission grading. All routes require the
//! forwarded ADMIN role.
//!
//! Creating or re-typing a QUIZ / PRACTICE_TEST / ASSIGNMENT lecture
//! provisions its backing record immediately, so the learner-facing runner
//! never finds a configured lecture without one.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use acadia_core::chrono::Utc;
use acadia_core::domain::assignment::SubmissionId;
use acadia_core::domain::course::{
    CertificatePolicy, Course, CourseId, Lecture, LectureContent, LectureId, SectionId,
};
use acadia_core::domain::quiz::{Question, QuestionId};
use acadia_core::ApplicationError;

use crate::bootstrap::AppState;
use crate::identity::RequireAdmin;
use crate::{error_response, interface_error_response, ErrorResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_paid: bool,
    pub price: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub certificate_enabled: bool,
    #[serde(default = "default_true")]
    pub certificate_require_completion: bool,
    #[serde(default)]
    pub certificate_require_min_score: bool,
    pub certificate_min_score: Option<f64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionPayload {
    pub title: String,
    #[serde(default)]
    pub is_paid: bool,
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturePayload {
    pub title: String,
    pub content: LectureContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizPayload {
    pub title: Option<String>,
    pub questions: Vec<QuestionPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub question: String,
    pub options: Vec<String>,
    pub correct: i64,
    pub order: i64,
}

#[derive(Debug, Deserialize)]
pub struct GradePayload {
    pub grade: f64,
    pub feedback: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/courses", post(create_course))
        .route("/api/admin/courses/{course_id}", patch(update_course))
        .route("/api/admin/courses/{course_id}/sections", post(create_section))
        .route("/api/admin/sections/{section_id}/lectures", post(create_lecture))
        .route("/api/admin/lectures/{lecture_id}", patch(update_lecture))
        .route("/api/admin/lectures/{lecture_id}/quiz", put(save_quiz))
        .route("/api/admin/submissions/{submission_id}/grade", post(grade_submission))
        .with_state(state)
}

fn course_from_payload(id: CourseId, payload: &CoursePayload) -> Course {
    Course {
        id,
        title: payload.title.clone(),
        description: payload.description.clone(),
        is_paid: payload.is_paid,
        price: payload.price,
        is_active: payload.is_active,
        certificate: CertificatePolicy {
            enabled: payload.certificate_enabled,
            require_completion: payload.certificate_require_completion,
            require_min_score: payload.certificate_require_min_score,
            min_score_percent: payload
                .certificate_require_min_score
                .then_some(payload.certificate_min_score)
                .flatten(),
        },
        sections: Vec::new(),
        created_at: Utc::now(),
    }
}

async fn create_course(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<CoursePayload>,
) -> Result<Json<Value>, ErrorResponse> {
    if payload.title.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Title is required"));
    }

    let course = course_from_payload(CourseId(Uuid::new_v4().to_string()), &payload);
    course.validate().map_err(|error| {
        interface_error_response(ApplicationError::from(error).into_interface("admin"))
    })?;

    state
        .courses
        .insert(&course)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    info!(
        event_name = "admin.course.created",
        course_id = %course.id.0,
        actor_id = %admin.user_id.0,
        "course created"
    );

    Ok(Json(json!({ "success": true, "courseId": course.id.0 })))
}

async fn update_course(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(course_id): Path<String>,
    Json(payload): Json<CoursePayload>,
) -> Result<Json<Value>, ErrorResponse> {
    let course = course_from_payload(CourseId(course_id), &payload);
    course.validate().map_err(|error| {
        interface_error_response(ApplicationError::from(error).into_interface("admin"))
    })?;

    let updated = state
        .courses
        .update_course(&course)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;
    if updated == 0 {
        return Err(error_response(StatusCode::NOT_FOUND, "Course not found"));
    }

    Ok(Json(json!({ "success": true })))
}

async fn create_section(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(course_id): Path<String>,
    Json(payload): Json<SectionPayload>,
) -> Result<Json<Value>, ErrorResponse> {
    if payload.title.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Title is required"));
    }
    if payload.is_paid && !matches!(payload.price, Some(price) if price >= 0) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Paid sections need a non-negative price",
        ));
    }

    let course_id = CourseId(course_id);
    if state
        .courses
        .find_by_id(&course_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .is_none()
    {
        return Err(error_response(StatusCode::NOT_FOUND, "Course not found"));
    }

    let price = payload.is_paid.then_some(payload.price).flatten();
    let section = state
        .courses
        .insert_section(&course_id, payload.title.trim(), payload.is_paid, price)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    Ok(Json(json!({ "success": true, "sectionId": section.id.0, "order": section.order })))
}

async fn create_lecture(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(section_id): Path<String>,
    Json(payload): Json<LecturePayload>,
) -> Result<Json<Value>, ErrorResponse> {
    if payload.title.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Title is required"));
    }

    let section_id = SectionId(section_id);
    if state
        .courses
        .find_section(&section_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .is_none()
    {
        return Err(error_response(StatusCode::NOT_FOUND, "Section not found"));
    }

    let lecture = state
        .courses
        .insert_lecture(&section_id, payload.title.trim(), &payload.content)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    provision_backing_records(&state, &lecture).await?;

    Ok(Json(json!({ "success": true, "lectureId": lecture.id.0 })))
}

async fn update_lecture(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(lecture_id): Path<String>,
    Json(payload): Json<LecturePayload>,
) -> Result<Json<Value>, ErrorResponse> {
    let lecture_id = LectureId(lecture_id);

    let updated = state
        .courses
        .update_lecture(&lecture_id, payload.title.trim(), &payload.content)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;
    if updated == 0 {
        return Err(error_response(StatusCode::NOT_FOUND, "Lecture not found"));
    }

    let lecture = state
        .courses
        .find_lecture(&lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Lecture not found"))?;

    provision_backing_records(&state, &lecture).await?;

    Ok(Json(json!({ "success": true })))
}

/// Keeps quiz/assignment backing rows in sync with the lecture kind.
async fn provision_backing_records(
    state: &AppState,
    lecture: &Lecture,
) -> Result<(), ErrorResponse> {
    if lecture.kind.owns_quiz() {
        state
            .quizzes
            .ensure_for_lecture(&lecture.id, &lecture.title)
            .await
            .map_err(|error| persistence_response(error.to_string()))?;
    }

    if lecture.kind.owns_assignment() {
        let (description, due_date) = match &lecture.content {
            LectureContent::Assignment { description, due_date } => {
                (description.clone(), *due_date)
            }
            _ => (String::new(), None),
        };
        state
            .assignments
            .ensure_for_lecture(&lecture.id, &lecture.title, &description, due_date)
            .await
            .map_err(|error| persistence_response(error.to_string()))?;
    }

    Ok(())
}

/// Replace-all editor save: the question set is swapped wholesale after
/// validation, ordered by the payload's `order` field.
async fn save_quiz(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(lecture_id): Path<String>,
    Json(payload): Json<QuizPayload>,
) -> Result<Json<Value>, ErrorResponse> {
    let lecture_id = LectureId(lecture_id);

    let lecture = state
        .courses
        .find_lecture(&lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Lecture not found"))?;
    if !lecture.kind.owns_quiz() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Lecture has no quiz"));
    }

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(&lecture.title);
    let quiz = state
        .quizzes
        .ensure_for_lecture(&lecture_id, title)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    let mut ordered = payload.questions;
    ordered.sort_by_key(|question| question.order);
    for question in ordered {
        let question = Question {
            id: QuestionId(Uuid::new_v4().to_string()),
            quiz_id: quiz.id.clone(),
            order: question.order,
            prompt: question.question.trim().to_string(),
            options: question
                .options
                .iter()
                .map(|option| option.trim().to_string())
                .filter(|option| !option.is_empty())
                .collect(),
            correct_index: question.correct,
        };
        question.validate().map_err(|error| {
            interface_error_response(ApplicationError::from(error).into_interface("admin"))
        })?;
        questions.push(question);
    }

    state
        .quizzes
        .replace_questions(&quiz.id, &questions)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    Ok(Json(json!({ "success": true, "quizId": quiz.id.0, "questionCount": questions.len() })))
}

/// The out-of-band grading write; not part of the learner write path.
async fn grade_submission(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(submission_id): Path<String>,
    Json(payload): Json<GradePayload>,
) -> Result<Json<Value>, ErrorResponse> {
    if !(0.0..=100.0).contains(&payload.grade) {
        return Err(error_response(StatusCode::BAD_REQUEST, "Grade must be between 0 and 100"));
    }

    let updated = state
        .submissions
        .set_grade(
            &SubmissionId(submission_id.clone()),
            payload.grade,
            payload.feedback.as_deref(),
        )
        .await
        .map_err(|error| persistence_response(error.to_string()))?;
    if updated == 0 {
        return Err(error_response(StatusCode::NOT_FOUND, "Submission not found"));
    }

    info!(
        event_name = "admin.submission.graded",
        submission_id = %submission_id,
        actor_id = %admin.user_id.0,
        grade = payload.grade,
        "submission graded"
    );

    Ok(Json(json!({ "success": true })))
}

fn persistence_response(detail: String) -> ErrorResponse {
    interface_error_response(ApplicationError::Persistence(detail).into_interface("admin"))
}
