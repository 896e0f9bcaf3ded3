//! Clients for external services the backend depends on.

/// OpenAI-compatible chat-completions client.
pub mod openai;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use thiserror::Error;

pub use self::openai::OpenAiCompletion;

/// Result alias for completion calls.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// Failures reaching the text-completion service. Content problems are not represented here:
/// any text the service returns is handed back to the caller for parsing.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No API key configured, so no request was attempted.
    #[error("completion service is not configured: {0}")]
    Configuration(&'static str),
    /// The request could not be sent or the connection failed.
    #[error("failed to reach completion service")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    /// The call exceeded the configured timeout.
    #[error("completion request timed out")]
    Timeout,
    /// The service answered with a non-success status.
    #[error("completion service answered with status {status}")]
    Status { status: StatusCode, body: String },
    /// The response envelope could not be decoded or carried no completion text.
    #[error("failed to decode completion response: {0}")]
    Decode(String),
}

/// Single prompt sent to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Instruction constraining the output format.
    pub system: String,
    /// Task description.
    pub prompt: String,
    /// Nucleus sampling parameter in `(0, 1]`; not sent to reasoning models.
    pub top_p: f64,
}

/// Opaque text-completion service: one prompt in, one text out.
pub trait TextCompletion: Send + Sync {
    /// Send one prompt and return the raw completion text.
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'static, CompletionResult<String>>;
}
