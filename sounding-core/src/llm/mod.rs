//! Language-model summaries of source files.

pub mod cache;
pub mod prompt;
mod summarizer;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use cache::{CacheEntry, SummaryCache};
pub use summarizer::{LlmSummarizer, SummaryBatch, SummaryJob};

/// Boxed future returned by [`CompletionClient::complete`].
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<Completion, CompletionError>> + Send + 'a>>;

/// One event of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A chunk of generated text.
    Token(String),
    /// The service signalled the end of the stream.
    Done,
}

/// What a completion service returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The whole text at once.
    Text(String),
    /// Partial tokens in arrival order.
    Stream(Vec<StreamEvent>),
}

impl Completion {
    /// Accumulate the completion into one string.
    ///
    /// A stream without a [`StreamEvent::Done`] terminator is
    /// [`CompletionError::Interrupted`].
    pub fn into_text(self) -> std::result::Result<String, CompletionError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Stream(events) => {
                let mut text = String::new();
                for event in events {
                    match event {
                        StreamEvent::Token(token) => text.push_str(&token),
                        StreamEvent::Done => return Ok(text),
                    }
                }
                Err(CompletionError::Interrupted)
            }
        }
    }
}

/// Failures reported by a completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The request did not finish in time.
    Timeout,
    /// The service asked us to slow down.
    RateLimited,
    /// The service is temporarily down.
    Unavailable(String),
    /// A streamed response ended before its terminator.
    Interrupted,
    /// Credentials were rejected.
    AuthError(String),
    /// The service refused the request as invalid.
    MalformedRequest(String),
}

impl CompletionError {
    /// Whether a resubmission could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::Unavailable(_) | Self::Interrupted
        )
    }

    /// Short machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Unavailable(_) => "unavailable",
            Self::Interrupted => "interrupted",
            Self::AuthError(_) => "auth_error",
            Self::MalformedRequest(_) => "malformed_request",
        }
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::Unavailable(message) => write!(f, "service unavailable: {message}"),
            Self::Interrupted => write!(f, "stream interrupted"),
            Self::AuthError(message) => write!(f, "authentication failed: {message}"),
            Self::MalformedRequest(message) => write!(f, "malformed request: {message}"),
        }
    }
}

impl std::error::Error for CompletionError {}

/// A text completion service.
pub trait CompletionClient: Send + Sync {
    /// Complete `prompt`.
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a>;
}

/// Async sleep abstraction so retry delays can be observed in tests.
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Tokio-backed sleeper used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::{Completion, CompletionError, StreamEvent};

    #[test]
    fn stream_accumulates_until_done() {
        let completion = Completion::Stream(vec![
            StreamEvent::Token("Hello".to_string()),
            StreamEvent::Token(", world".to_string()),
            StreamEvent::Done,
            StreamEvent::Token("ignored".to_string()),
        ]);
        assert_eq!(completion.into_text(), Ok("Hello, world".to_string()));
    }

    #[test]
    fn stream_without_terminator_is_interrupted() {
        let completion = Completion::Stream(vec![StreamEvent::Token("Hel".to_string())]);
        assert_eq!(completion.into_text(), Err(CompletionError::Interrupted));
    }

    #[test]
    fn retryable_classification() {
        assert!(CompletionError::Timeout.is_retryable());
        assert!(CompletionError::RateLimited.is_retryable());
        assert!(CompletionError::Unavailable("502".to_string()).is_retryable());
        assert!(CompletionError::Interrupted.is_retryable());
        assert!(!CompletionError::AuthError("bad key".to_string()).is_retryable());
        assert!(!CompletionError::MalformedRequest("bad json".to_string()).is_retryable());
    }
}
