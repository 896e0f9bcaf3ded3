use std::{cmp::Ordering, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Play mode of a game session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum SessionMode {
    /// Single player.
    #[default]
    #[serde(rename = "solo")]
    Solo,
    /// Players compete against each other.
    #[serde(rename = "versus")]
    Versus,
    /// Players share one score.
    #[serde(rename = "co-op")]
    CoOp,
}

/// Lifecycle marker of a game session. Any value may overwrite any other.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for players.
    #[default]
    Lobby,
    /// Questions are being played.
    InProgress,
    /// Play is over.
    Finished,
}

/// Difficulty tiers accepted on stored quiz results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum Difficulty {
    /// Gentlest tier.
    Friendly,
    /// Easy questions.
    Easy,
    /// Middle tier.
    Intermediate,
    /// Hard questions.
    Hard,
    /// Hardest tier.
    Immortal,
}

/// Who may read a quiz result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Owner only.
    #[default]
    Private,
    /// Anyone, including the leaderboard.
    Public,
}

impl Visibility {
    /// Parse the wire value (`private` / `public`), rejecting anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Outcome of a quiz attempt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// The quiz was finished.
    #[default]
    Completed,
    /// The player left early.
    Abandoned,
}

/// Quiz configuration embedded in a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizSettingsEntity {
    /// Topics the questions are drawn from.
    pub topics: Vec<String>,
    /// Free-form difficulty tier.
    pub difficulty: Option<String>,
    /// Requested question count.
    pub number_of_questions: Option<u32>,
}

/// Participant slot inside a session, in join order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantEntity {
    /// Registered user behind the slot, absent for guests.
    pub user: Option<String>,
    /// Name shown to other players.
    pub nickname: Option<String>,
    /// Points earned in this session.
    pub score: i64,
    /// Whether the slot belongs to the host.
    pub is_host: bool,
}

/// Session fields provided by the caller before the store assigns identity and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGameSession {
    /// User id of the creator.
    pub host: String,
    /// Allocated shareable code.
    pub code: String,
    /// Play mode.
    pub mode: SessionMode,
    /// Initial lifecycle marker.
    pub status: SessionStatus,
    /// Quiz configuration, when provided.
    pub quiz_settings: Option<QuizSettingsEntity>,
    /// Participant slots in join order.
    pub participants: Vec<ParticipantEntity>,
}

/// Persisted game session.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSessionEntity {
    /// Store-assigned identifier.
    pub id: String,
    /// User id of the host; never changes after creation.
    pub host: String,
    /// Uppercase shareable code, unique across sessions.
    pub code: String,
    /// Play mode.
    pub mode: SessionMode,
    /// Lifecycle marker.
    pub status: SessionStatus,
    /// Quiz configuration, when provided.
    pub quiz_settings: Option<QuizSettingsEntity>,
    /// Participant slots in join order.
    pub participants: Vec<ParticipantEntity>,
    /// When play started.
    pub started_at: Option<SystemTime>,
    /// When play ended.
    pub ended_at: Option<SystemTime>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last modification time.
    pub updated_at: SystemTime,
}

impl GameSessionEntity {
    /// Attach store-managed fields to a new session.
    pub fn from_new(id: String, new: NewGameSession, now: SystemTime) -> Self {
        Self {
            id,
            host: new.host,
            code: new.code,
            mode: new.mode,
            status: new.status,
            quiz_settings: new.quiz_settings,
            participants: new.participants,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Single answered question recorded inside a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerEntity {
    /// Question as it was shown.
    pub question_text: Option<String>,
    /// Options as they were shown.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_index: Option<i64>,
    /// Index the player picked, absent when skipped.
    pub selected_index: Option<i64>,
    /// Whether the pick was correct.
    pub is_correct: bool,
}

/// Result fields provided by the caller before the store assigns identity and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuizResult {
    /// Submitting user, absent for anonymous submissions.
    pub user: Option<String>,
    /// Topics of the quiz.
    pub topics: Vec<String>,
    /// Difficulty tier, when known.
    pub difficulty: Option<Difficulty>,
    /// Questions asked.
    pub number_of_questions: u32,
    /// Questions answered correctly.
    pub correct_count: u32,
    /// Time spent on the quiz.
    pub total_time_seconds: u32,
    /// Fraction of correct answers in `[0, 1]`.
    pub accuracy: f64,
    /// Per-question answers.
    pub answers: Vec<AnswerEntity>,
    /// Who may read the result.
    pub visibility: Visibility,
    /// Outcome of the attempt.
    pub status: ResultStatus,
    /// Free-text notes from the owner.
    pub notes: Option<String>,
}

/// Persisted quiz result.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizResultEntity {
    /// Store-assigned identifier.
    pub id: String,
    /// Submitting user, absent for anonymous submissions.
    pub user: Option<String>,
    /// Topics of the quiz.
    pub topics: Vec<String>,
    /// Difficulty tier, when known.
    pub difficulty: Option<Difficulty>,
    /// Questions asked.
    pub number_of_questions: u32,
    /// Questions answered correctly.
    pub correct_count: u32,
    /// Time spent on the quiz.
    pub total_time_seconds: u32,
    /// Fraction of correct answers in `[0, 1]`, fixed at creation.
    pub accuracy: f64,
    /// Per-question answers.
    pub answers: Vec<AnswerEntity>,
    /// Who may read the result.
    pub visibility: Visibility,
    /// Outcome of the attempt.
    pub status: ResultStatus,
    /// Free-text notes from the owner.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last modification time.
    pub updated_at: SystemTime,
}

impl QuizResultEntity {
    /// Attach store-managed fields to a new result.
    pub fn from_new(id: String, new: NewQuizResult, now: SystemTime) -> Self {
        Self {
            id,
            user: new.user,
            topics: new.topics,
            difficulty: new.difficulty,
            number_of_questions: new.number_of_questions,
            correct_count: new.correct_count,
            total_time_seconds: new.total_time_seconds,
            accuracy: new.accuracy,
            answers: new.answers,
            visibility: new.visibility,
            status: new.status,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the result may appear in public listings and the leaderboard.
    pub fn is_public_completed(&self) -> bool {
        self.visibility == Visibility::Public && self.status == ResultStatus::Completed
    }

    /// Whether `user_id` submitted this result.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user.as_deref() == Some(user_id)
    }

    /// Leaderboard ranking: accuracy desc, correct count desc, time asc, creation asc.
    pub fn leaderboard_cmp(&self, other: &Self) -> Ordering {
        other
            .accuracy
            .total_cmp(&self.accuracy)
            .then_with(|| other.correct_count.cmp(&self.correct_count))
            .then_with(|| self.total_time_seconds.cmp(&other.total_time_seconds))
            .then_with(|| self.created_at.cmp(&other.created_at))
    }
}

/// Selection applied when listing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultFilter {
    /// Every public, completed result.
    PublicCompleted,
    /// Every result submitted by the given user.
    OwnedBy(String),
}

impl ResultFilter {
    /// Evaluate the filter against a single result.
    pub fn matches(&self, result: &QuizResultEntity) -> bool {
        match self {
            Self::PublicCompleted => result.is_public_completed(),
            Self::OwnedBy(user) => result.is_owned_by(user),
        }
    }
}
