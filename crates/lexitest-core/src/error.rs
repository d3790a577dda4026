//! Error types.
//!
//! `ApiError` represents failures talking to the test platform. It is
//! defined here rather than in `lexitest-client` so sessions can downcast
//! backend errors and word their messages without string matching.

use thiserror::Error;

use crate::session::Phase;

/// Errors that can occur when talking to the test platform.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown test code, session, or level.
    #[error("not found: {0}")]
    NotFound(String),

    /// The test code or session has expired.
    #[error("expired: {0}")]
    Expired(String),

    /// The server returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns `true` if retrying the same request cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized(_) | ApiError::NotFound(_) | ApiError::Expired(_)
        )
    }
}

/// Errors surfaced by a test session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be started. No state was created.
    #[error("could not start test: {message}")]
    Start {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The backend returned a session with no questions.
    #[error("test has no questions")]
    EmptyPool,

    /// The operation is not valid in the current phase.
    #[error("cannot {action} while {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },

    /// A navigation target outside the exam.
    #[error("question {index} out of range (exam has {len})")]
    OutOfRange { index: usize, len: usize },

    /// The exam batch could not be submitted. The session is back in
    /// `Testing` and the submit can be retried.
    #[error("could not submit answers: {message}")]
    Submit {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SessionError {
    pub(crate) fn start(source: anyhow::Error) -> Self {
        Self::Start {
            message: user_message(&source),
            source,
        }
    }

    pub(crate) fn submit(source: anyhow::Error) -> Self {
        Self::Submit {
            message: user_message(&source),
            source,
        }
    }
}

/// Short message for display, using the typed cause when there is one.
pub fn user_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ApiError>() {
        Some(ApiError::NotFound(_)) => "test code not found".to_string(),
        Some(ApiError::Expired(_)) => "test code has expired".to_string(),
        Some(ApiError::Unauthorized(_)) => "not signed in or access denied".to_string(),
        Some(ApiError::Timeout(_)) | Some(ApiError::Network(_)) => {
            "the server could not be reached, try again".to_string()
        }
        Some(other) => other.to_string(),
        None => format!("{error:#}"),
    }
}
