//! Session reports with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exam::ExamSession;
use crate::model::{EngineKind, TimeMode};
use crate::result::FinalResult;
use crate::session::{AdaptiveSession, TraceEntry};

/// Everything worth keeping about a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session_id: String,
    /// Name of the test that was taken.
    pub question_set: String,
    /// Progression engine, absent for exams.
    #[serde(default)]
    pub engine: Option<EngineKind>,
    pub time_mode: TimeMode,
    pub result: FinalResult,
    /// Per-answer progression trace, empty for exams.
    #[serde(default)]
    pub level_trace: Vec<TraceEntry>,
}

impl SessionReport {
    pub fn from_adaptive(session: &AdaptiveSession, result: FinalResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            session_id: session.session_id().to_string(),
            question_set: session.name().to_string(),
            engine: Some(session.engine()),
            time_mode: TimeMode::PerQuestion,
            result,
            level_trace: session.trace().to_vec(),
        }
    }

    pub fn from_exam(session: &ExamSession, result: FinalResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            session_id: session.session_id().to_string(),
            question_set: session.name().to_string(),
            engine: None,
            time_mode: TimeMode::Total,
            result,
            level_trace: Vec::new(),
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let r = &self.result;

        md.push_str(&format!("## {}\n\n", self.question_set));
        md.push_str(&format!(
            "**Score:** {}/{} ({:.1}%)",
            r.correct, r.total, r.accuracy
        ));
        if let Some(level) = r.final_level {
            md.push_str(&format!(", final level {level}"));
        }
        if let Some(combo) = r.best_combo {
            md.push_str(&format!(", best combo {combo}"));
        }
        md.push_str("\n\n");

        if !self.level_trace.is_empty() {
            md.push_str("### Progression\n\n");
            md.push_str("| # | Question | Level | Result | Time | XP | Change |\n");
            md.push_str("|---|----------|-------|--------|------|----|--------|\n");
            for t in &self.level_trace {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {:.1}s | {} | {} |\n",
                    t.number,
                    t.question_id,
                    t.question_level,
                    if t.correct { "correct" } else { "wrong" },
                    t.elapsed_ms as f64 / 1000.0,
                    t.xp_delta.map(|d| format!("{d:+}")).unwrap_or_default(),
                    t.level_change.map(|c| c.to_string()).unwrap_or_default(),
                ));
            }
            md.push('\n');
        }

        if !r.wrong_answers.is_empty() {
            md.push_str("### Words to review\n\n");
            md.push_str("| Word | Correct | Your answer |\n");
            md.push_str("|------|---------|-------------|\n");
            for w in &r.wrong_answers {
                let selected = if w.selected_answer.is_empty() {
                    "(no answer)"
                } else {
                    w.selected_answer.as_str()
                };
                md.push_str(&format!("| {} | {} | {} |\n", w.word, w.correct_answer, selected));
            }
        }

        md
    }
}
