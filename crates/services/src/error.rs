//! Shared error types for the services crate.

use thiserror::Error;

/// Failures reported by a `QuestionService` transport.
///
/// None of these are fatal to a session: they are handed to the retry prompt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error("question service unavailable: {0}")]
    Unavailable(String),
    #[error("question service timed out")]
    Timeout,
    #[error("question service rejected the request with status {status}")]
    Rejected { status: u16 },
    #[error("could not decode question service response: {0}")]
    Decode(String),
}

/// Errors emitted by a test session controller.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("test session is no longer running")]
    Closed,
}
