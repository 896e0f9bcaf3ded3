//! DTOs for the game session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::models::{
    GameSessionEntity, ParticipantEntity, QuizSettingsEntity, SessionMode, SessionStatus,
};
use crate::dto::format_system_time;

/// Quiz configuration attached to a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizSettingsDto {
    /// Topics of the quiz.
    pub topics: Vec<String>,
    /// Free-form difficulty tier.
    pub difficulty: Option<String>,
    /// Requested question count.
    pub number_of_questions: Option<u32>,
}

impl From<QuizSettingsDto> for QuizSettingsEntity {
    fn from(value: QuizSettingsDto) -> Self {
        Self {
            topics: value.topics,
            difficulty: value.difficulty,
            number_of_questions: value.number_of_questions,
        }
    }
}

impl From<QuizSettingsEntity> for QuizSettingsDto {
    fn from(value: QuizSettingsEntity) -> Self {
        Self {
            topics: value.topics,
            difficulty: value.difficulty,
            number_of_questions: value.number_of_questions,
        }
    }
}

/// Participant slot; guests have no `user`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantDto {
    /// Registered user id.
    pub user: Option<String>,
    /// Display name.
    pub nickname: Option<String>,
    /// Points earned.
    pub score: i64,
    /// Marks the host slot.
    pub is_host: bool,
}

impl From<ParticipantDto> for ParticipantEntity {
    fn from(value: ParticipantDto) -> Self {
        Self {
            user: value.user,
            nickname: value.nickname,
            score: value.score,
            is_host: value.is_host,
        }
    }
}

impl From<ParticipantEntity> for ParticipantDto {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user: value.user,
            nickname: value.nickname,
            score: value.score,
            is_host: value.is_host,
        }
    }
}

/// Body of `POST /sessions`. Every field is optional.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionRequest {
    /// Defaults to `solo`.
    pub mode: Option<SessionMode>,
    /// Quiz configuration.
    pub quiz_settings: Option<QuizSettingsDto>,
    /// Initial participants; defaults to none.
    pub participants: Option<Vec<ParticipantDto>>,
}

/// Body of `PUT /sessions/{id}`. Fields outside this set are ignored.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSessionRequest {
    /// New play mode.
    pub mode: Option<SessionMode>,
    /// New lifecycle status.
    pub status: Option<SessionStatus>,
    /// Replacement quiz configuration.
    pub quiz_settings: Option<QuizSettingsDto>,
    /// Replacement participant list.
    pub participants: Option<Vec<ParticipantDto>>,
    /// RFC 3339 timestamp; `null` clears it.
    #[serde(with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub started_at: Option<Option<String>>,
    /// RFC 3339 timestamp; `null` clears it.
    #[serde(with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub ended_at: Option<Option<String>>,
}

impl UpdateSessionRequest {
    /// Whether the body names none of the writable fields.
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.status.is_none()
            && self.quiz_settings.is_none()
            && self.participants.is_none()
            && self.started_at.is_none()
            && self.ended_at.is_none()
    }
}

/// Session as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Session identifier.
    pub id: String,
    /// User id of the host.
    pub host: String,
    /// Shareable code.
    pub code: String,
    /// Play mode.
    pub mode: SessionMode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Quiz configuration.
    pub quiz_settings: Option<QuizSettingsDto>,
    /// Participants in join order.
    pub participants: Vec<ParticipantDto>,
    /// RFC 3339 start time.
    pub started_at: Option<String>,
    /// RFC 3339 end time.
    pub ended_at: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 last update time.
    pub updated_at: String,
}

impl From<GameSessionEntity> for SessionResponse {
    fn from(value: GameSessionEntity) -> Self {
        Self {
            id: value.id,
            host: value.host,
            code: value.code,
            mode: value.mode,
            status: value.status,
            quiz_settings: value.quiz_settings.map(Into::into),
            participants: value.participants.into_iter().map(Into::into).collect(),
            started_at: value.started_at.map(format_system_time),
            ended_at: value.ended_at.map(format_system_time),
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

/// Plain acknowledgement, e.g. after a delete.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human readable confirmation.
    pub message: String,
}

impl MessageResponse {
    /// Wrap a confirmation message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_missing() {
        let body: UpdateSessionRequest =
            serde_json::from_str(r#"{"startedAt": null, "unknown": 1}"#).unwrap();
        assert_eq!(body.started_at, Some(None));
        assert_eq!(body.ended_at, None);
        assert!(!body.is_empty());

        let body: UpdateSessionRequest = serde_json::from_str(r#"{"host": "x"}"#).unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn participant_defaults_apply() {
        let dto: ParticipantDto = serde_json::from_str(r#"{"nickname": "ana"}"#).unwrap();
        assert_eq!(dto.score, 0);
        assert!(!dto.is_host);
        assert!(dto.user.is_none());
    }
}
