//! Final session results.

use serde::{Deserialize, Serialize};

use crate::model::{Question, WrongAnswer};
use crate::progress::ProgressTracker;
use crate::scoring::accuracy_percent;
use crate::traits::BatchEntry;

/// Terminal summary of a session.
///
/// Also the shape returned by the batch and completion endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Questions counted toward the result.
    pub total: usize,
    pub correct: usize,
    /// Accuracy percentage, 0-100.
    pub accuracy: f64,
    #[serde(default)]
    pub final_level: Option<u32>,
    #[serde(default)]
    pub best_combo: Option<u32>,
    #[serde(default)]
    pub wrong_answers: Vec<WrongAnswer>,
}

impl FinalResult {
    /// Finalize a per-question session from its tracker.
    pub fn from_progress(progress: &ProgressTracker, final_level: Option<u32>) -> Self {
        Self {
            total: progress.answered(),
            correct: progress.correct(),
            accuracy: progress.accuracy(),
            final_level,
            best_combo: Some(progress.best_combo()),
            wrong_answers: progress.wrong_answers().to_vec(),
        }
    }

    /// Grade an exam batch against its questions.
    ///
    /// Every question counts toward the total, answered or not. Entries whose
    /// question id is unknown are ignored.
    pub fn grade_batch(questions: &[Question], entries: &[BatchEntry]) -> Self {
        let mut correct = 0;
        let mut wrong_answers = Vec::new();
        let mut combo = 0u32;
        let mut best_combo = 0u32;

        for question in questions {
            let entry = entries.iter().find(|e| e.question_id == question.id);
            let selected = entry.map(|e| e.selected_answer.as_str()).unwrap_or("");
            if !selected.is_empty() && question.is_correct(selected) {
                correct += 1;
                combo += 1;
                best_combo = best_combo.max(combo);
            } else {
                combo = 0;
                wrong_answers.push(WrongAnswer {
                    word: question.word.clone(),
                    correct_answer: question.answer.clone(),
                    selected_answer: selected.to_string(),
                    time_taken_ms: entry.map(|e| e.time_taken_ms),
                });
            }
        }

        Self {
            total: questions.len(),
            correct,
            accuracy: accuracy_percent(correct, questions.len()),
            final_level: None,
            best_combo: Some(best_combo),
            wrong_answers,
        }
    }

    /// Number of incorrect or unanswered questions.
    pub fn incorrect(&self) -> usize {
        self.total.saturating_sub(self.correct)
    }
}
