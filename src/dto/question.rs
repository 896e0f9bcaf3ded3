use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Body of `POST /questions`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    /// Topics to draw questions from.
    #[validate(length(min = 1, message = "topics must not be empty."))]
    pub topics: Vec<String>,
    /// Free-form tier name; unknown values use the intermediate setting.
    #[serde(default)]
    pub difficulty: Option<String>,
    /// How many questions to generate.
    #[validate(range(min = 1, max = 50, message = "numberOfQuestions must be between 1 and 50."))]
    pub number_of_questions: u32,
}

/// Multiple choice question produced by the generator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Question {
    /// Question text.
    pub question: String,
    /// Exactly four options.
    pub options: Vec<String>,
    /// Index of the correct option, in `0..=3`.
    pub answer_index: u8,
}
