//! DTOs for quiz results and the leaderboard.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dao::models::{AnswerEntity, Difficulty, QuizResultEntity, ResultStatus, Visibility};
use crate::dto::format_system_time;

/// One answered question.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerDto {
    /// Question as shown.
    pub question_text: Option<String>,
    /// Options as shown.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_index: Option<i64>,
    /// Index the player picked.
    pub selected_index: Option<i64>,
    /// Whether the pick was correct.
    pub is_correct: bool,
}

impl From<AnswerDto> for AnswerEntity {
    fn from(value: AnswerDto) -> Self {
        Self {
            question_text: value.question_text,
            options: value.options,
            correct_index: value.correct_index,
            selected_index: value.selected_index,
            is_correct: value.is_correct,
        }
    }
}

impl From<AnswerEntity> for AnswerDto {
    fn from(value: AnswerEntity) -> Self {
        Self {
            question_text: value.question_text,
            options: value.options,
            correct_index: value.correct_index,
            selected_index: value.selected_index,
            is_correct: value.is_correct,
        }
    }
}

/// Body of `POST /results`.
///
/// Counts are optional at the JSON level so that missing values get the same
/// message as out-of-range ones.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateResultRequest {
    /// Topics of the quiz.
    pub topics: Vec<String>,
    /// Difficulty tier.
    pub difficulty: Option<Difficulty>,
    /// Questions asked; must be positive.
    pub number_of_questions: Option<i64>,
    /// Correct answers; at most `numberOfQuestions`.
    pub correct_count: Option<i64>,
    /// Time spent; defaults to 0.
    pub total_time_seconds: Option<i64>,
    /// Fraction in `[0, 1]`; derived from the counts when omitted.
    #[validate(range(min = 0.0, max = 1.0, message = "accuracy must be between 0 and 1."))]
    pub accuracy: Option<f64>,
    /// Per-question answers.
    pub answers: Vec<AnswerDto>,
    /// Defaults to `private`.
    pub visibility: Option<Visibility>,
    /// Defaults to `completed`.
    pub status: Option<ResultStatus>,
    /// Trimmed; blank notes are dropped.
    pub notes: Option<String>,
}

/// Body of `PUT /results/{id}`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateResultRequest {
    /// `private` or `public`.
    #[serde(with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub visibility: Option<Option<String>>,
    /// `null` clears the notes.
    #[serde(with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

/// Query string of `GET /results`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct ResultListQuery {
    /// `public` lists every public completed result; anything else lists the caller's own.
    pub visibility: Option<String>,
    /// `me` is accepted and equivalent to the default.
    pub user: Option<String>,
}

/// Query string of `GET /leaderboard`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Maximum number of entries; invalid or non-positive values fall back to 10.
    pub limit: Option<String>,
}

/// Quiz result as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    /// Result identifier.
    pub id: String,
    /// Owner id, absent for anonymous results.
    pub user: Option<String>,
    /// Topics of the quiz.
    pub topics: Vec<String>,
    /// Difficulty tier.
    pub difficulty: Option<Difficulty>,
    /// Questions asked.
    pub number_of_questions: u32,
    /// Correct answers.
    pub correct_count: u32,
    /// Time spent, in seconds.
    pub total_time_seconds: u32,
    /// Fraction of correct answers in `[0, 1]`.
    pub accuracy: f64,
    /// Per-question answers.
    pub answers: Vec<AnswerDto>,
    /// Who may read the result.
    pub visibility: Visibility,
    /// Outcome of the attempt.
    pub status: ResultStatus,
    /// Owner notes.
    pub notes: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 last update time.
    pub updated_at: String,
}

impl From<QuizResultEntity> for ResultResponse {
    fn from(value: QuizResultEntity) -> Self {
        Self {
            id: value.id,
            user: value.user,
            topics: value.topics,
            difficulty: value.difficulty,
            number_of_questions: value.number_of_questions,
            correct_count: value.correct_count,
            total_time_seconds: value.total_time_seconds,
            accuracy: value.accuracy,
            answers: value.answers.into_iter().map(Into::into).collect(),
            visibility: value.visibility,
            status: value.status,
            notes: value.notes,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

/// Owner projection exposed on the leaderboard.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct LeaderboardUser {
    /// Email of the result owner.
    pub email: String,
}

/// Leaderboard row: a public completed result whose owner is reduced to an email.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Result identifier.
    pub id: String,
    /// Owner email, when the owner is known.
    pub user: Option<LeaderboardUser>,
    /// Topics of the quiz.
    pub topics: Vec<String>,
    /// Difficulty tier.
    pub difficulty: Option<Difficulty>,
    /// Questions asked.
    pub number_of_questions: u32,
    /// Correct answers.
    pub correct_count: u32,
    /// Time spent, in seconds.
    pub total_time_seconds: u32,
    /// Fraction of correct answers in `[0, 1]`.
    pub accuracy: f64,
    /// Per-question answers.
    pub answers: Vec<AnswerDto>,
    /// Who may read the result.
    pub visibility: Visibility,
    /// Outcome of the attempt.
    pub status: ResultStatus,
    /// Owner notes.
    pub notes: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 last update time.
    pub updated_at: String,
}

impl LeaderboardEntry {
    /// Project a result, attaching the owner's email when known.
    pub fn new(value: QuizResultEntity, email: Option<String>) -> Self {
        Self {
            id: value.id,
            user: email.map(|email| LeaderboardUser { email }),
            topics: value.topics,
            difficulty: value.difficulty,
            number_of_questions: value.number_of_questions,
            correct_count: value.correct_count,
            total_time_seconds: value.total_time_seconds,
            accuracy: value.accuracy,
            answers: value.answers.into_iter().map(Into::into).collect(),
            visibility: value.visibility,
            status: value.status,
            notes: value.notes,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::NewQuizResult;

    #[test]
    fn create_request_rejects_non_array_answers() {
        let parsed = serde_json::from_str::<CreateResultRequest>(
            r#"{"numberOfQuestions": 3, "correctCount": 1, "answers": "nope"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn accuracy_range_is_validated() {
        let body = CreateResultRequest {
            accuracy: Some(1.5),
            ..CreateResultRequest::default()
        };
        assert!(body.validate().is_err());

        let body = CreateResultRequest {
            accuracy: Some(0.5),
            ..CreateResultRequest::default()
        };
        assert!(body.validate().is_ok());
    }

    #[test]
    fn update_request_keeps_explicit_null() {
        let body: UpdateResultRequest = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(body.notes, Some(None));
        assert_eq!(body.visibility, None);
    }

    #[test]
    fn leaderboard_entry_keeps_answers_and_notes() {
        let entity = QuizResultEntity::from_new(
            "r1".into(),
            NewQuizResult {
                user: Some("u1".into()),
                topics: vec!["art".into()],
                difficulty: None,
                number_of_questions: 1,
                correct_count: 1,
                total_time_seconds: 12,
                accuracy: 1.0,
                answers: vec![AnswerEntity {
                    question_text: Some("Who painted it?".into()),
                    options: vec!["a".into(), "b".into()],
                    correct_index: Some(0),
                    selected_index: Some(0),
                    is_correct: true,
                }],
                visibility: Visibility::Public,
                status: ResultStatus::Completed,
                notes: Some("lucky".into()),
            },
            std::time::SystemTime::UNIX_EPOCH,
        );

        let entry = LeaderboardEntry::new(entity, Some("u1@example.com".into()));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["user"]["email"], "u1@example.com");
        assert_eq!(value["answers"][0]["questionText"], "Who painted it?");
        assert_eq!(value["answers"][0]["isCorrect"], true);
        assert_eq!(value["notes"], "lucky");
    }
}
