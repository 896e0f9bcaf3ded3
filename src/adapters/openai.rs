use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionError, CompletionRequest, CompletionResult, TextCompletion};

const MAX_COMPLETION_TOKENS: u32 = 3500;

/// Chat-completions client speaking the OpenAI REST dialect.
#[derive(Clone)]
pub struct OpenAiCompletion {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
    model: Arc<str>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verbosity: Option<&'static str>,
    max_completion_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    /// Reasoning models only accept their default sampling, so they get effort hints instead.
    fn new(model: &'a str, request: &'a CompletionRequest) -> Self {
        let reasoning = is_reasoning_model(model);
        Self {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            top_p: (!reasoning).then_some(request.top_p),
            reasoning_effort: reasoning.then_some("medium"),
            verbosity: model.starts_with("gpt-5").then_some("medium"),
            max_completion_tokens: MAX_COMPLETION_TOKENS,
        }
    }
}

fn is_reasoning_model(model: &str) -> bool {
    ["gpt-5", "o1", "o3", "o4"]
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletion {
    /// Build a client; requests are bounded by `timeout` end to end.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .build()
            .map_err(|source| CompletionError::Transport { source })?;
        let base_url: String = base_url.into();
        let model: String = model.into();

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            api_key: api_key.filter(|key| !key.is_empty()).map(Arc::from),
            model: Arc::from(model),
            timeout,
        })
    }

    async fn send(&self, request: CompletionRequest) -> CompletionResult<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CompletionError::Configuration("missing API key"));
        };

        let body = ChatRequest::new(&self.model, &request);

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let payload: ChatResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Decode(err.to_string())
            }
        })?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Decode("response carried no completion".into()))?;

        debug!(raw = %content, "completion received");
        Ok(content)
    }
}

fn map_transport(source: reqwest::Error) -> CompletionError {
    if source.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Transport { source }
    }
}

impl TextCompletion for OpenAiCompletion {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'static, CompletionResult<String>> {
        let client = self.clone();
        Box::pin(async move { client.send(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_fails_without_a_request() {
        let client = OpenAiCompletion::new(
            "http://127.0.0.1:9/v1/",
            Some(String::new()),
            "gpt-5-mini",
            Duration::from_secs(1),
        )
        .unwrap();

        let err = client
            .complete(CompletionRequest {
                system: "s".into(),
                prompt: "p".into(),
                top_p: 0.6,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Configuration(_)));
    }

    fn request(top_p: f64) -> CompletionRequest {
        CompletionRequest {
            system: "sys".into(),
            prompt: "hi".into(),
            top_p,
        }
    }

    #[test]
    fn request_body_uses_chat_completion_shape() {
        let request = request(0.2);
        let value = serde_json::to_value(ChatRequest::new("gpt-4o-mini", &request)).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["top_p"], 0.2);
        assert_eq!(value["max_completion_tokens"], 3500);
        assert!(value.get("reasoning_effort").is_none());
        assert!(value.get("verbosity").is_none());
    }

    #[test]
    fn default_model_gets_effort_hints_instead_of_top_p() {
        let request = request(0.4);
        let value = serde_json::to_value(ChatRequest::new("gpt-5-mini", &request)).unwrap();
        assert!(value.get("top_p").is_none());
        assert_eq!(value["reasoning_effort"], "medium");
        assert_eq!(value["verbosity"], "medium");
    }

    #[test]
    fn o_series_models_skip_verbosity() {
        let request = request(0.8);
        let value = serde_json::to_value(ChatRequest::new("o4-mini", &request)).unwrap();
        assert!(value.get("top_p").is_none());
        assert_eq!(value["reasoning_effort"], "medium");
        assert!(value.get("verbosity").is_none());
    }
}
