//! Core data model types for lexitest.
//!
//! These are the fundamental types the engine, the client backends, and the
//! CLI share to represent questions, question sets, and session modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single vocabulary question presented to the test-taker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier for this question.
    pub id: String,
    /// The prompt shown to the test-taker (usually the word itself).
    pub word: String,
    /// Multiple-choice options. Empty for spelling questions.
    #[serde(default)]
    pub options: Vec<String>,
    /// Canonical correct answer.
    pub answer: String,
    /// Difficulty level, starting at 1.
    pub level: u32,
    /// Optional finer-grained sub-level (e.g. "3-2").
    #[serde(default)]
    pub lesson: Option<String>,
    /// Question type.
    #[serde(default)]
    pub kind: QuestionKind,
}

impl Question {
    /// Check a selected value against the canonical answer.
    ///
    /// Choice questions compare the trimmed option verbatim; spelling
    /// questions ignore case and surrounding whitespace.
    pub fn is_correct(&self, selected: &str) -> bool {
        match self.kind {
            QuestionKind::Choice => selected.trim() == self.answer.trim(),
            QuestionKind::Spelling => selected.trim().eq_ignore_ascii_case(self.answer.trim()),
        }
    }
}

/// Question type tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Pick the meaning from a list of options.
    #[default]
    Choice,
    /// Type the word from its meaning.
    Spelling,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Choice => write!(f, "choice"),
            QuestionKind::Spelling => write!(f, "spelling"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "choice" | "mcq" => Ok(QuestionKind::Choice),
            "spelling" | "text" => Ok(QuestionKind::Spelling),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// Which progression strategy drives question selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Continuous difficulty cursor over pool positions.
    Cursor,
    /// Discrete levels driven by an XP economy.
    #[default]
    Xp,
    /// Pool order, no adaptation.
    Sequential,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Cursor => write!(f, "cursor"),
            EngineKind::Xp => write!(f, "xp"),
            EngineKind::Sequential => write!(f, "sequential"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cursor" | "adaptive" => Ok(EngineKind::Cursor),
            "xp" => Ok(EngineKind::Xp),
            "sequential" | "simple" => Ok(EngineKind::Sequential),
            other => Err(format!("unknown engine: {other}")),
        }
    }
}

/// How the test is timed and submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeMode {
    /// Each answer is submitted immediately with feedback before advancing.
    #[default]
    PerQuestion,
    /// Exam mode: free navigation, one batch submission at the end.
    Total,
}

impl fmt::Display for TimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeMode::PerQuestion => write!(f, "per-question"),
            TimeMode::Total => write!(f, "total"),
        }
    }
}

impl FromStr for TimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-question" | "per_question" | "question" => Ok(TimeMode::PerQuestion),
            "total" | "exam" => Ok(TimeMode::Total),
            other => Err(format!("unknown time mode: {other}")),
        }
    }
}

/// A named collection of questions with session defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    /// Unique identifier, also used as the test code offline.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub time_mode: TimeMode,
    /// Number of questions to ask in per-question mode.
    #[serde(default)]
    pub question_budget: Option<usize>,
    /// Number of difficulty levels. Defaults to the highest level present.
    #[serde(default)]
    pub level_count: Option<u32>,
    /// Total time limit for exam mode.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionSet {
    /// Level count declared by the set, or the highest level present.
    pub fn effective_level_count(&self) -> u32 {
        self.level_count
            .unwrap_or_else(|| self.questions.iter().map(|q| q.level).max().unwrap_or(1))
            .max(1)
    }
}

/// A missed question, kept for the mastery report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrongAnswer {
    pub word: String,
    pub correct_answer: String,
    pub selected_answer: String,
    #[serde(default)]
    pub time_taken_ms: Option<u64>,
}
