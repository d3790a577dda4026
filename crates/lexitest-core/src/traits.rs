//! Collaborator traits the engine consumes.
//!
//! These async traits are implemented by the `lexitest-client` crate (HTTP,
//! offline, and mock backends). Failures are returned as `anyhow::Error`,
//! usually wrapping an [`ApiError`](crate::error::ApiError) the session can
//! downcast for its messages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{EngineKind, Question, TimeMode};
use crate::result::FinalResult;

// ---------------------------------------------------------------------------
// Question source
// ---------------------------------------------------------------------------

/// Where sessions and their question pools come from.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Human-readable backend name (e.g. "http").
    fn name(&self) -> &str;

    /// Start a test session by code or test type.
    async fn start_session(&self, request: &StartRequest) -> anyhow::Result<SessionStart>;

    /// Additional questions for one level, used for prefetching.
    async fn fetch_level_pool(&self, session_id: &str, level: u32) -> anyhow::Result<Vec<Question>>;
}

/// Request to start a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Invitation or test code handed out by an instructor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Self-service test type (e.g. "placement").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
}

impl StartRequest {
    pub fn by_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            test_type: None,
        }
    }

    pub fn by_type(test_type: impl Into<String>) -> Self {
        Self {
            code: None,
            test_type: Some(test_type.into()),
        }
    }
}

/// A freshly started session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: String,
    #[serde(default)]
    pub name: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub time_mode: TimeMode,
    /// Questions to ask in per-question mode.
    #[serde(default)]
    pub question_budget: Option<usize>,
    #[serde(default)]
    pub level_count: Option<u32>,
    /// Total time limit for exam mode.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Result recorder
// ---------------------------------------------------------------------------

/// Where answers and results are persisted.
#[async_trait]
pub trait ResultRecorder: Send + Sync {
    /// Record a single answer. Advisory: the session never waits on it.
    async fn submit_answer(&self, submission: &AnswerSubmission) -> anyhow::Result<AnswerReceipt>;

    /// Submit every exam answer at once.
    async fn submit_batch(&self, session_id: &str, entries: &[BatchEntry]) -> anyhow::Result<FinalResult>;

    /// Finalize a per-question session.
    async fn complete_session(
        &self,
        session_id: &str,
        request: &CompletionRequest,
    ) -> anyhow::Result<FinalResult>;
}

/// One answer sent to the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub session_id: String,
    pub question_id: String,
    pub selected_answer: String,
    pub time_taken_ms: u64,
}

/// The recorder's verdict on an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerReceipt {
    pub correct: bool,
    pub correct_answer: String,
}

/// One exam answer. Unanswered questions carry an empty `selected_answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub question_id: String,
    pub selected_answer: String,
    pub time_taken_ms: u64,
}

/// Final state reported when a per-question session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub final_level: Option<u32>,
    #[serde(default)]
    pub best_combo: Option<u32>,
}
