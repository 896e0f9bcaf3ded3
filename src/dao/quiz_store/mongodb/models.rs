use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    AnswerEntity, Difficulty, GameSessionEntity, NewGameSession, NewQuizResult,
    ParticipantEntity, QuizResultEntity, QuizSettingsEntity, ResultStatus, SessionMode,
    SessionStatus, Visibility,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(with = "user_ref_serde")]
    pub host: String,
    pub code: String,
    #[serde(default)]
    pub mode: SessionMode,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_settings: Option<QuizSettingsEntity>,
    #[serde(default)]
    pub participants: Vec<MongoParticipant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl MongoSessionDocument {
    pub fn from_new(id: ObjectId, value: NewGameSession, now: DateTime) -> Self {
        Self {
            id,
            host: value.host,
            code: value.code,
            mode: value.mode,
            status: value.status,
            quiz_settings: value.quiz_settings,
            participants: value.participants.into_iter().map(Into::into).collect(),
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_entity(id: ObjectId, value: GameSessionEntity) -> Self {
        Self {
            id,
            host: value.host,
            code: value.code,
            mode: value.mode,
            status: value.status,
            quiz_settings: value.quiz_settings,
            participants: value.participants.into_iter().map(Into::into).collect(),
            started_at: value.started_at.map(DateTime::from_system_time),
            ended_at: value.ended_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoSessionDocument> for GameSessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            id: value.id.to_hex(),
            host: value.host,
            code: value.code,
            mode: value.mode,
            status: value.status,
            quiz_settings: value.quiz_settings,
            participants: value.participants.into_iter().map(Into::into).collect(),
            started_at: value.started_at.map(DateTime::to_system_time),
            ended_at: value.ended_at.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Participant slot as stored, with the user kept as a reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MongoParticipant {
    #[serde(skip_serializing_if = "Option::is_none", with = "user_ref_serde::option")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub score: i64,
    pub is_host: bool,
}

impl From<ParticipantEntity> for MongoParticipant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user: value.user,
            nickname: value.nickname,
            score: value.score,
            is_host: value.is_host,
        }
    }
}

impl From<MongoParticipant> for ParticipantEntity {
    fn from(value: MongoParticipant) -> Self {
        Self {
            user: value.user,
            nickname: value.nickname,
            score: value.score,
            is_host: value.is_host,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoResultDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "user_ref_serde::option"
    )]
    pub user: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    pub number_of_questions: u32,
    pub correct_count: u32,
    #[serde(default)]
    pub total_time_seconds: u32,
    pub accuracy: f64,
    #[serde(default)]
    pub answers: Vec<AnswerEntity>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl MongoResultDocument {
    pub fn from_new(id: ObjectId, value: NewQuizResult, now: DateTime) -> Self {
        Self {
            id,
            user: value.user,
            topics: value.topics,
            difficulty: value.difficulty,
            number_of_questions: value.number_of_questions,
            correct_count: value.correct_count,
            total_time_seconds: value.total_time_seconds,
            accuracy: value.accuracy,
            answers: value.answers,
            visibility: value.visibility,
            status: value.status,
            notes: value.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_entity(id: ObjectId, value: QuizResultEntity) -> Self {
        Self {
            id,
            user: value.user,
            topics: value.topics,
            difficulty: value.difficulty,
            number_of_questions: value.number_of_questions,
            correct_count: value.correct_count,
            total_time_seconds: value.total_time_seconds,
            accuracy: value.accuracy,
            answers: value.answers,
            visibility: value.visibility,
            status: value.status,
            notes: value.notes,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoResultDocument> for QuizResultEntity {
    fn from(value: MongoResultDocument) -> Self {
        Self {
            id: value.id.to_hex(),
            user: value.user,
            topics: value.topics,
            difficulty: value.difficulty,
            number_of_questions: value.number_of_questions,
            correct_count: value.correct_count,
            total_time_seconds: value.total_time_seconds,
            accuracy: value.accuracy,
            answers: value.answers,
            visibility: value.visibility,
            status: value.status,
            notes: value.notes,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Projection of a user document down to the fields exposed on the leaderboard.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoUserEmail {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Parse a hex identifier, treating malformed input as absent.
pub fn parse_object_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

pub fn doc_id(id: ObjectId) -> Document {
    doc! {"_id": id}
}

/// User references are stored as ObjectIds when the id is ObjectId hex, as strings otherwise.
pub fn user_ref(id: &str) -> Bson {
    match parse_object_id(id) {
        Some(oid) => Bson::ObjectId(oid),
        None => Bson::String(id.to_owned()),
    }
}

fn user_from_bson(value: Bson) -> Result<Option<String>, String> {
    match value {
        Bson::ObjectId(oid) => Ok(Some(oid.to_hex())),
        Bson::String(id) => Ok(Some(id)),
        Bson::Null => Ok(None),
        other => Err(format!("unsupported user reference: {other}")),
    }
}

mod user_ref_serde {
    use mongodb::bson::Bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

    use super::{user_from_bson, user_ref};

    pub fn serialize<S: Serializer>(id: &str, serializer: S) -> Result<S::Ok, S::Error> {
        user_ref(id).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        user_from_bson(Bson::deserialize(deserializer)?)
            .map_err(D::Error::custom)?
            .ok_or_else(|| D::Error::custom("missing user reference"))
    }

    pub mod option {
        use mongodb::bson::Bson;
        use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

        use super::super::{user_from_bson, user_ref};

        pub fn serialize<S: Serializer>(
            id: &Option<String>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            id.as_deref().map(user_ref).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<String>, D::Error> {
            user_from_bson(Bson::deserialize(deserializer)?).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use mongodb::bson::{self, doc};

    use super::*;

    #[test]
    fn object_id_users_round_trip_as_references() {
        let host = ObjectId::new();
        let guest = ObjectId::new();
        let stored = doc! {
            "_id": ObjectId::new(),
            "host": host,
            "code": "ABC123",
            "participants": [{"user": guest, "nickname": "g", "score": 3, "isHost": false}],
            "createdAt": DateTime::now(),
            "updatedAt": DateTime::now(),
        };

        let parsed: MongoSessionDocument = bson::deserialize_from_document(stored).unwrap();
        let entity = GameSessionEntity::from(parsed);
        assert_eq!(entity.host, host.to_hex());
        assert_eq!(entity.participants[0].user, Some(guest.to_hex()));

        let oid = parse_object_id(&entity.id).unwrap();
        let written =
            bson::serialize_to_document(&MongoSessionDocument::from_entity(oid, entity)).unwrap();
        assert_eq!(written.get_object_id("host").unwrap(), host);
        let participants = written.get_array("participants").unwrap();
        let first = participants[0].as_document().unwrap();
        assert_eq!(first.get_object_id("user").unwrap(), guest);
    }

    #[test]
    fn non_hex_users_stay_strings() {
        let now = DateTime::from_system_time(SystemTime::UNIX_EPOCH);
        let result = MongoResultDocument::from_new(
            ObjectId::new(),
            NewQuizResult {
                user: Some("local-user".into()),
                topics: Vec::new(),
                difficulty: None,
                number_of_questions: 1,
                correct_count: 0,
                total_time_seconds: 0,
                accuracy: 0.0,
                answers: Vec::new(),
                visibility: Visibility::Private,
                status: ResultStatus::Completed,
                notes: None,
            },
            now,
        );
        let written = bson::serialize_to_document(&result).unwrap();
        assert_eq!(written.get_str("user").unwrap(), "local-user");

        let anonymous = doc! {
            "_id": ObjectId::new(),
            "numberOfQuestions": 1,
            "correctCount": 1,
            "accuracy": 1.0,
            "createdAt": now,
            "updatedAt": now,
        };
        let parsed: MongoResultDocument = bson::deserialize_from_document(anonymous).unwrap();
        assert_eq!(parsed.user, None);
    }

    #[test]
    fn user_ref_picks_object_ids_for_hex() {
        let oid = ObjectId::new();
        assert_eq!(user_ref(&oid.to_hex()), Bson::ObjectId(oid));
        assert_eq!(user_ref("guest"), Bson::String("guest".into()));
    }
}
