use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    adapters::{CompletionError, CompletionRequest},
    dto::question::{Question, QuestionRequest},
    error::ServiceError,
    state::SharedState,
};

const SYSTEM_PROMPT: &str = "You must output ONLY valid JSON. No prose or explanations.";
const DEFAULT_TOP_P: f64 = 0.6;
const OPTION_COUNT: usize = 4;

/// Sampling breadth for a difficulty tier; unknown tiers sit in the middle.
pub fn top_p_for(difficulty: Option<&str>) -> f64 {
    match difficulty {
        Some("Friendly") => 0.2,
        Some("Easy") => 0.4,
        Some("Intermediate") => 0.6,
        Some("Hard") => 0.8,
        Some("Immortal") => 1.0,
        _ => DEFAULT_TOP_P,
    }
}

/// Instruction asking for `count` questions in the strict array format.
pub fn build_prompt(topics: &[String], difficulty: Option<&str>, count: u32) -> String {
    format!(
        "Generate {count} questions about {topics}.\n\
         Use difficulty {difficulty}.\n\
         Return format MUST be:\n\
         [\n  {{\n    \"question\": \"text\",\n    \"options\": [\"opt1\", \"opt2\", \"opt3\", \"opt4\"],\n    \"answer_index\": 2\n  }}\n]\n\
         No markdown, no commentary.",
        topics = topics.join(","),
        difficulty = difficulty.unwrap_or("Intermediate"),
    )
}

/// Remove surrounding whitespace and a single Markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Parse the completion text into questions; any malformed element rejects the batch.
pub fn parse_questions(raw: &str) -> Result<Vec<Question>, ServiceError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|err| ServiceError::UpstreamFormat(format!("not JSON: {err}")))?;

    let Value::Array(items) = value else {
        return Err(ServiceError::UpstreamFormat("expected a JSON array".into()));
    };
    if items.is_empty() {
        return Err(ServiceError::UpstreamFormat("empty question list".into()));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            parse_question(item)
                .ok_or_else(|| ServiceError::UpstreamFormat(format!("invalid question at {index}")))
        })
        .collect()
}

fn parse_question(item: &Value) -> Option<Question> {
    let object = item.as_object()?;
    let question = object.get("question")?.as_str()?.to_owned();

    let options = object.get("options")?.as_array()?;
    if options.len() != OPTION_COUNT {
        return None;
    }
    let options = options
        .iter()
        .map(|option| option.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()?;

    // Integral floats such as `2.0` count as integers.
    let answer_index = match object.get("answer_index")? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))?,
        _ => return None,
    };
    if answer_index >= OPTION_COUNT as u64 {
        return None;
    }

    Some(Question {
        question,
        options,
        answer_index: answer_index as u8,
    })
}

/// Ask the completion service for a fresh batch of questions. No retry.
pub async fn generate_questions(
    state: &SharedState,
    request: QuestionRequest,
) -> Result<Vec<Question>, ServiceError> {
    request.validate()?;

    let difficulty = request.difficulty.as_deref();
    let completion = CompletionRequest {
        system: SYSTEM_PROMPT.into(),
        prompt: build_prompt(&request.topics, difficulty, request.number_of_questions),
        top_p: top_p_for(difficulty),
    };

    let raw = state
        .completion()
        .complete(completion)
        .await
        .map_err(|err| {
            match &err {
                CompletionError::Status { status, body } => {
                    warn!(%status, body = %body, "question generation rejected upstream");
                }
                other => warn!(error = %other, "question generation failed upstream"),
            }
            ServiceError::Upstream(err)
        })?;

    let questions = parse_questions(&raw).inspect_err(|_| {
        warn!(raw = %raw, "upstream returned unusable questions");
    })?;
    info!(
        requested = request.number_of_questions,
        received = questions.len(),
        "questions generated"
    );
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{ScriptedCompletion, memory_state};

    const VALID: &str = r#"[
        {"question": "2+2?", "options": ["1", "2", "3", "4"], "answer_index": 3},
        {"question": "Capital of France?", "options": ["Paris", "Rome", "Oslo", "Bern"], "answer_index": 0}
    ]"#;

    fn request(difficulty: &str) -> QuestionRequest {
        QuestionRequest {
            topics: vec!["math".into(), "geography".into()],
            difficulty: Some(difficulty.into()),
            number_of_questions: 2,
        }
    }

    #[test]
    fn difficulty_table_matches_tiers() {
        assert_eq!(top_p_for(Some("Friendly")), 0.2);
        assert_eq!(top_p_for(Some("Easy")), 0.4);
        assert_eq!(top_p_for(Some("Intermediate")), 0.6);
        assert_eq!(top_p_for(Some("Hard")), 0.8);
        assert_eq!(top_p_for(Some("Immortal")), 1.0);
        assert_eq!(top_p_for(Some("hard")), 0.6);
        assert_eq!(top_p_for(None), 0.6);
    }

    #[test]
    fn prompt_embeds_count_topics_and_difficulty() {
        let prompt = build_prompt(&["a".into(), "b".into()], Some("Hard"), 7);
        assert!(prompt.starts_with("Generate 7 questions about a,b.\nUse difficulty Hard.\n"));
        assert!(prompt.contains("\"answer_index\": 2"));
        assert!(prompt.ends_with("No markdown, no commentary."));
    }

    #[test]
    fn valid_batch_is_returned_unchanged() {
        let questions = parse_questions(VALID).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options, vec!["1", "2", "3", "4"]);
        assert_eq!(questions[1].answer_index, 0);
    }

    #[test]
    fn fenced_output_is_accepted() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(parse_questions(&fenced).unwrap().len(), 2);
    }

    #[test]
    fn any_invalid_element_rejects_the_batch() {
        let cases = [
            "not json at all",
            r#"{"question": "x"}"#,
            "[]",
            r#"[{"question": "q", "options": ["a", "b", "c"], "answer_index": 0}]"#,
            r#"[{"question": "q", "options": ["a", "b", "c", "d"], "answer_index": 4}]"#,
            r#"[{"question": "q", "options": ["a", "b", "c", 4], "answer_index": 1}]"#,
            r#"[{"question": "q", "options": ["a", "b", "c", "d"], "answer_index": 1.5}]"#,
            r#"[{"question": 1, "options": ["a", "b", "c", "d"], "answer_index": 1}]"#,
        ];
        for raw in cases {
            assert!(
                matches!(parse_questions(raw), Err(ServiceError::UpstreamFormat(_))),
                "accepted {raw}"
            );
        }

        let mixed = r#"[
            {"question": "ok", "options": ["a", "b", "c", "d"], "answer_index": 1},
            {"question": "bad", "options": ["a", "b", "c", "d"], "answer_index": -1}
        ]"#;
        assert!(parse_questions(mixed).is_err());
    }

    #[tokio::test]
    async fn generate_sends_one_request_with_mapped_top_p() {
        let completion = ScriptedCompletion::replying(VALID);
        let (state, _store) = memory_state(completion.clone()).await;

        let questions = generate_questions(&state, request("Friendly")).await.unwrap();
        assert_eq!(questions.len(), 2);

        let sent = completion.requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].top_p, 0.2);
        assert_eq!(sent[0].system, SYSTEM_PROMPT);
        assert!(sent[0].prompt.contains("about math,geography"));
    }

    #[tokio::test]
    async fn upstream_failures_are_distinguished() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        assert!(matches!(
            generate_questions(&state, request("Easy")).await,
            Err(ServiceError::Upstream(_))
        ));

        let completion = ScriptedCompletion::replying("Sure! Here are your questions.");
        let (state, _store) = memory_state(completion.clone()).await;
        assert!(matches!(
            generate_questions(&state, request("Easy")).await,
            Err(ServiceError::UpstreamFormat(_))
        ));
        assert_eq!(completion.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_upstream() {
        let completion = ScriptedCompletion::replying(VALID);
        let (state, _store) = memory_state(completion.clone()).await;

        let empty_topics = QuestionRequest {
            topics: vec![],
            ..request("Hard")
        };
        let too_many = QuestionRequest {
            number_of_questions: 51,
            ..request("Hard")
        };
        for body in [empty_topics, too_many] {
            assert!(matches!(
                generate_questions(&state, body).await,
                Err(ServiceError::InvalidInput(_))
            ));
        }
        assert!(completion.requests.lock().unwrap().is_empty());
    }
}
