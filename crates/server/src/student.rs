//! Learner-facing endpoints: enrollment, the course player's content tree,
//! progress recording, quiz attempts, assignment submissions, and issued
//! certificates. Every operation is scoped to the authenticated user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use acadia_core::access::{accessible_lecture_count, is_section_accessible};
use acadia_core::chrono::Utc;
use acadia_core::domain::assignment::{Submission, SubmissionId};
use acadia_core::domain::course::{Course, CourseId, Lecture, LectureId, Section};
use acadia_core::domain::enrollment::{Enrollment, PaymentStatus};
use acadia_core::domain::quiz::QuizAttempt;
use acadia_core::scoring;
use acadia_core::{ApplicationError, DomainError};

use crate::bootstrap::AppState;
use crate::certificates::IssueOutcome;
use crate::identity::Identity;
use crate::{error_response, interface_error_response, ErrorResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordProgressRequest {
    pub progress_percent: f64,
}

#[derive(Debug, Deserialize)]
pub struct QuizAttemptRequest {
    pub answers: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAssignmentRequest {
    pub content: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/courses/{course_id}/enroll", post(enroll_free))
        .route("/api/courses/{course_id}", get(get_course))
        .route("/api/courses/{course_id}/progress", post(record_progress))
        .route("/api/lectures/{lecture_id}/quiz", get(get_quiz))
        .route("/api/lectures/{lecture_id}/quiz/attempts", post(submit_quiz_attempt))
        .route("/api/lectures/{lecture_id}/assignment", get(get_assignment))
        .route("/api/lectures/{lecture_id}/submissions", post(submit_assignment))
        .route("/api/certificates", get(list_certificates))
        .route("/api/enrollments", get(list_enrollments))
        .with_state(state)
}

async fn enroll_free(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<String>,
) -> Result<Json<Value>, ErrorResponse> {
    let course_id = CourseId(course_id);
    let course = find_active_course(&state, &course_id).await?;

    if course.is_paid {
        return Err(interface_error_response(
            ApplicationError::from(DomainError::CourseIsPaid { course_id: course_id.0.clone() })
                .into_interface(course_id.0.clone()),
        ));
    }

    let enrollment = state
        .enrollments
        .insert_free_enrollment(&identity.user_id, &course_id)
        .await
        .map_err(|error| match error {
            acadia_db::repositories::RepositoryError::Conflict(_) => interface_error_response(
                ApplicationError::from(DomainError::AlreadyEnrolled {
                    user_id: identity.user_id.0.clone(),
                    course_id: course_id.0.clone(),
                })
                .into_interface(course_id.0.clone()),
            ),
            other => persistence_response(other.to_string()),
        })?;

    info!(
        event_name = "enrollment.free.created",
        user_id = %identity.user_id.0,
        course_id = %course_id.0,
        enrollment_id = %enrollment.id.0,
        "free enrollment created"
    );

    Ok(Json(json!({
        "success": true,
        "courseId": course_id.0,
        "enrollmentId": enrollment.id.0,
    })))
}

/// Course player payload: the content tree annotated with per-section
/// accessibility, plus the learner's ledger summary. Locked sections list
/// their lectures without content payloads.
async fn get_course(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<String>,
) -> Result<Json<Value>, ErrorResponse> {
    let course_id = CourseId(course_id);
    let course = find_active_course(&state, &course_id).await?;
    let enrollment = find_completed_enrollment(&state, &identity, &course_id).await?;

    let sections: Vec<Value> = course
        .sections
        .iter()
        .map(|section| section_json(section, &enrollment))
        .collect();

    Ok(Json(json!({
        "course": {
            "id": course.id.0,
            "title": course.title,
            "description": course.description,
            "isPaid": course.is_paid,
            "price": course.price,
            "certificateEnabled": course.certificate.enabled,
            "sections": sections,
        },
        "enrollment": enrollment_json(&enrollment),
        "accessibleLectureCount": accessible_lecture_count(&course, &enrollment),
    })))
}

async fn record_progress(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<String>,
    Json(request): Json<RecordProgressRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    if !(0.0..=100.0).contains(&request.progress_percent) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "progressPercent must be between 0 and 100",
        ));
    }

    let course_id = CourseId(course_id);
    let course = find_active_course(&state, &course_id).await?;
    let enrollment = find_completed_enrollment(&state, &identity, &course_id).await?;

    let updated = state
        .enrollments
        .record_progress(&enrollment.id, request.progress_percent)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    let mut certificate_url = None;
    if updated.completed_at.is_some() {
        // Issuance failures surface as retryable 503s; the stored progress
        // stands either way.
        let outcome = state
            .issuer
            .evaluate_and_issue(&course, &updated, identity.learner_name())
            .await
            .map_err(|error| interface_error_response(error.into_interface(course_id.0.clone())))?;
        certificate_url = match outcome {
            IssueOutcome::Issued(certificate) | IssueOutcome::AlreadyIssued(certificate) => {
                Some(certificate.image_url)
            }
            IssueOutcome::NotEligible(_) => None,
        };
    }

    Ok(Json(json!({
        "success": true,
        "progressPercent": updated.progress_percent,
        "completedAt": updated.completed_at.map(|at| at.to_rfc3339()),
        "certificateUrl": certificate_url,
    })))
}

async fn get_quiz(
    State(state): State<AppState>,
    identity: Identity,
    Path(lecture_id): Path<String>,
) -> Result<Json<Value>, ErrorResponse> {
    let lecture_id = LectureId(lecture_id);
    lecture_context(&state, &identity, &lecture_id).await?;

    let quiz = state
        .quizzes
        .find_by_lecture(&lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No quiz for lecture"))?;

    // Learner view: correct indexes stay server-side.
    let questions: Vec<Value> = quiz
        .questions
        .iter()
        .map(|question| {
            json!({
                "id": question.id.0,
                "order": question.order,
                "question": question.prompt,
                "options": question.options,
            })
        })
        .collect();

    Ok(Json(json!({
        "id": quiz.id.0,
        "title": quiz.title,
        "questions": questions,
    })))
}

async fn submit_quiz_attempt(
    State(state): State<AppState>,
    identity: Identity,
    Path(lecture_id): Path<String>,
    Json(request): Json<QuizAttemptRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    let lecture_id = LectureId(lecture_id);
    let (course, _, _, enrollment) = lecture_context(&state, &identity, &lecture_id).await?;

    let quiz = state
        .quizzes
        .find_by_lecture(&lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No quiz for lecture"))?;

    let result = scoring::grade(&quiz, &request.answers);

    state
        .quizzes
        .append_attempt(&QuizAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: identity.user_id.clone(),
            quiz_id: quiz.id.clone(),
            answers: request.answers,
            score: result.score,
            max_score: result.max_score,
            submitted_at: Utc::now(),
        })
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    state
        .enrollments
        .accumulate_score(&enrollment.id, result.score, result.max_score)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    info!(
        event_name = "quiz.attempt.graded",
        user_id = %identity.user_id.0,
        quiz_id = %quiz.id.0,
        score = result.score,
        max_score = result.max_score,
        "quiz attempt graded"
    );

    // A graded attempt can push an already-complete learner over the score
    // gate; re-evaluate, but never fail the grading response over it.
    if enrollment.completed_at.is_some() || enrollment.progress_percent >= 100.0 {
        if let Some(current) = state
            .enrollments
            .find_by_id(&enrollment.id)
            .await
            .map_err(|error| persistence_response(error.to_string()))?
        {
            if let Err(issue_error) =
                state.issuer.evaluate_and_issue(&course, &current, identity.learner_name()).await
            {
                error!(
                    event_name = "certificate.issue.deferred",
                    user_id = %identity.user_id.0,
                    course_id = %course.id.0,
                    error = %issue_error,
                    "certificate evaluation failed after grading; will retry on next trigger"
                );
            }
        }
    }

    Ok(Json(json!({
        "success": true,
        "score": result.score,
        "maxScore": result.max_score,
    })))
}

async fn get_assignment(
    State(state): State<AppState>,
    identity: Identity,
    Path(lecture_id): Path<String>,
) -> Result<Json<Value>, ErrorResponse> {
    let lecture_id = LectureId(lecture_id);
    lecture_context(&state, &identity, &lecture_id).await?;

    let assignment = state
        .assignments
        .find_by_lecture(&lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No assignment for lecture"))?;

    let submission = state
        .submissions
        .latest_for_user_lecture(&identity.user_id, &lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    Ok(Json(json!({
        "id": assignment.id.0,
        "title": assignment.title,
        "description": assignment.description,
        "dueDate": assignment.due_date.map(|at| at.to_rfc3339()),
        "mySubmission": submission.map(|submission| json!({
            "id": submission.id.0,
            "content": submission.content,
            "grade": submission.grade,
            "feedback": submission.feedback,
            "submittedAt": submission.submitted_at.to_rfc3339(),
        })),
    })))
}

async fn submit_assignment(
    State(state): State<AppState>,
    identity: Identity,
    Path(lecture_id): Path<String>,
    Json(request): Json<SubmitAssignmentRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    if request.content.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Submission content is required"));
    }

    let lecture_id = LectureId(lecture_id);
    lecture_context(&state, &identity, &lecture_id).await?;

    let assignment = state
        .assignments
        .find_by_lecture(&lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No assignment for lecture"))?;

    // Append-only: resubmission becomes "the latest" without deleting the
    // earlier attempt.
    state
        .submissions
        .append(&Submission {
            id: SubmissionId(Uuid::new_v4().to_string()),
            user_id: identity.user_id.clone(),
            lecture_id: lecture_id.clone(),
            assignment_id: assignment.id,
            content: request.content,
            grade: None,
            feedback: None,
            submitted_at: Utc::now(),
        })
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    Ok(Json(json!({ "success": true })))
}

async fn list_certificates(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Value>, ErrorResponse> {
    let certificates = state
        .certificates
        .list_for_user(&identity.user_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    let certificates: Vec<Value> = certificates
        .into_iter()
        .map(|certificate| {
            json!({
                "id": certificate.id.0,
                "courseId": certificate.course_id.0,
                "imageUrl": certificate.image_url,
                "issuedAt": certificate.issued_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({ "certificates": certificates })))
}

async fn list_enrollments(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Value>, ErrorResponse> {
    let enrollments = state
        .enrollments
        .list_for_user(&identity.user_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?;

    let enrollments: Vec<Value> =
        enrollments.iter().map(enrollment_json).collect();

    Ok(Json(json!({ "enrollments": enrollments })))
}

async fn find_active_course(
    state: &AppState,
    course_id: &CourseId,
) -> Result<Course, ErrorResponse> {
    state
        .courses
        .find_by_id(course_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .filter(|course| course.is_active)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Course not found or inactive"))
}

/// Course content requires a settled enrollment; pending or failed payment
/// states see nothing.
async fn find_completed_enrollment(
    state: &AppState,
    identity: &Identity,
    course_id: &CourseId,
) -> Result<Enrollment, ErrorResponse> {
    state
        .enrollments
        .find_by_user_course(&identity.user_id, course_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .filter(|enrollment| enrollment.payment_status == PaymentStatus::Completed)
        .ok_or_else(|| error_response(StatusCode::FORBIDDEN, "Not enrolled in this course"))
}

/// Resolves a lecture to its course/section/enrollment context and enforces
/// the access policy for the owning section.
async fn lecture_context(
    state: &AppState,
    identity: &Identity,
    lecture_id: &LectureId,
) -> Result<(Course, Section, Lecture, Enrollment), ErrorResponse> {
    let lecture = state
        .courses
        .find_lecture(lecture_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Lecture not found"))?;

    let section = state
        .courses
        .find_section(&lecture.section_id)
        .await
        .map_err(|error| persistence_response(error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Section not found"))?;

    let course = find_active_course(state, &section.course_id).await?;
    let enrollment = find_completed_enrollment(state, identity, &course.id).await?;

    if !is_section_accessible(&section, &enrollment) {
        return Err(error_response(StatusCode::FORBIDDEN, "Section is locked"));
    }

    Ok((course, section, lecture, enrollment))
}

fn section_json(section: &Section, enrollment: &Enrollment) -> Value {
    let accessible = is_section_accessible(section, enrollment);
    let lectures: Vec<Value> = section
        .lectures
        .iter()
        .map(|lecture| {
            let mut entry = json!({
                "id": lecture.id.0,
                "title": lecture.title,
                "order": lecture.order,
                "type": lecture.kind.as_str(),
            });
            if accessible {
                entry["content"] = serde_json::to_value(&lecture.content).unwrap_or(Value::Null);
            }
            entry
        })
        .collect();

    json!({
        "id": section.id.0,
        "title": section.title,
        "order": section.order,
        "isPaid": section.is_paid,
        "price": section.price,
        "accessible": accessible,
        "lectures": lectures,
    })
}

fn enrollment_json(enrollment: &Enrollment) -> Value {
    json!({
        "id": enrollment.id.0,
        "courseId": enrollment.course_id.0,
        "paymentStatus": enrollment.payment_status.as_str(),
        "paidSections": enrollment.paid_sections.iter().map(|id| id.0.clone()).collect::<Vec<_>>(),
        "progressPercent": enrollment.progress_percent,
        "totalScore": enrollment.total_score,
        "maxPossibleScore": enrollment.max_possible_score,
        "enrolledAt": enrollment.enrolled_at.to_rfc3339(),
        "completedAt": enrollment.completed_at.map(|at| at.to_rfc3339()),
    })
}

fn persistence_response(detail: String) -> ErrorResponse {
    interface_error_response(ApplicationError::Persistence(detail).into_interface("student"))
}
