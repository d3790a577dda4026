//! Session progress bookkeeping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Question, WrongAnswer};
use crate::scoring::accuracy_percent;

/// Running tally of a session.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    answered: usize,
    correct: usize,
    wrong_answers: Vec<WrongAnswer>,
    combo: u32,
    best_combo: u32,
    wrong_streak: u32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a correct answer. Returns the streak including it.
    pub fn record_hit(&mut self) -> u32 {
        self.answered += 1;
        self.correct += 1;
        self.combo += 1;
        self.best_combo = self.best_combo.max(self.combo);
        self.wrong_streak = 0;
        self.combo
    }

    /// Record a miss. Returns the consecutive-miss count including it.
    pub fn record_miss(&mut self, question: &Question, selected: &str, elapsed: Option<Duration>) -> u32 {
        self.answered += 1;
        self.combo = 0;
        self.wrong_streak += 1;
        self.wrong_answers.push(WrongAnswer {
            word: question.word.clone(),
            correct_answer: question.answer.clone(),
            selected_answer: selected.to_string(),
            time_taken_ms: elapsed.map(|d| d.as_millis() as u64),
        });
        self.wrong_streak
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn best_combo(&self) -> u32 {
        self.best_combo
    }

    pub fn wrong_streak(&self) -> u32 {
        self.wrong_streak
    }

    pub fn wrong_answers(&self) -> &[WrongAnswer] {
        &self.wrong_answers
    }

    /// Accuracy as a percentage.
    pub fn accuracy(&self) -> f64 {
        accuracy_percent(self.correct, self.answered)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            answered: self.answered,
            correct: self.correct,
            accuracy: self.accuracy(),
            combo: self.combo,
            best_combo: self.best_combo,
            wrong_answers: self.wrong_answers.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Immutable copy of the tracker for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub answered: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub combo: u32,
    pub best_combo: u32,
    pub wrong_answers: Vec<WrongAnswer>,
}
