//! Quiz grading. `max_score` is the question count; each position scores one
//! point when the submitted answer index matches the question's correct
//! index. A short answer array counts the missing tail as wrong instead of
//! erroring.

use serde::{Deserialize, Serialize};

use crate::domain::quiz::Quiz;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub score: i64,
    pub max_score: i64,
}

pub fn grade(quiz: &Quiz, answers: &[i64]) -> GradeResult {
    let max_score = quiz.questions.len() as i64;
    let score = quiz
        .questions
        .iter()
        .enumerate()
        .filter(|(index, question)| answers.get(*index) == Some(&question.correct_index))
        .count() as i64;

    GradeResult { score, max_score }
}

#[cfg(test)]
mod tests {
    use crate::domain::course::LectureId;
    use crate::domain::quiz::{Question, QuestionId, Quiz, QuizId};

    use super::grade;

    fn quiz(correct: &[i64]) -> Quiz {
        Quiz {
            id: QuizId("quiz-1".to_string()),
            lecture_id: LectureId("l-1".to_string()),
            title: "Navigation Rules".to_string(),
            questions: correct
                .iter()
                .enumerate()
                .map(|(index, correct_index)| Question {
                    id: QuestionId(format!("q-{index}")),
                    quiz_id: QuizId("quiz-1".to_string()),
                    order: index as i64 + 1,
                    prompt: format!("Question {index}"),
                    options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                    correct_index: *correct_index,
                })
                .collect(),
        }
    }

    #[test]
    fn grades_matching_positions() {
        let result = grade(&quiz(&[1, 1, 1, 0]), &[1, 0, 1, 1]);
        assert_eq!(result.score, 2);
        assert_eq!(result.max_score, 4);
    }

    #[test]
    fn short_answer_array_counts_missing_tail_as_wrong() {
        let result = grade(&quiz(&[0, 1, 2]), &[0]);
        assert_eq!(result.score, 1);
        assert_eq!(result.max_score, 3);
    }

    #[test]
    fn extra_answers_are_ignored() {
        let result = grade(&quiz(&[0]), &[0, 2, 2, 2]);
        assert_eq!(result.score, 1);
        assert_eq!(result.max_score, 1);
    }

    #[test]
    fn score_stays_within_bounds() {
        let quiz = quiz(&[2, 2, 2, 2, 2]);
        for answers in [vec![], vec![2, 2, 2, 2, 2], vec![0, 0, 0, 0, 0]] {
            let result = grade(&quiz, &answers);
            assert!(result.score >= 0 && result.score <= result.max_score);
            assert_eq!(result.max_score, 5);
        }
    }
}
