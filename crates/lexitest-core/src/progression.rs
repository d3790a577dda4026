//! Progression strategies.
//!
//! A `Progression` turns answer outcomes into a difficulty state and picks
//! the next pool position from it. The session owns exactly one, chosen by
//! [`EngineKind`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cursor::CursorProgression;
use crate::model::EngineKind;
use crate::pool::{QuestionPool, UsedSet};
use crate::xp::XpProgression;

/// One answer, as seen by a progression strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerEvent {
    pub correct: bool,
    pub elapsed: Duration,
    /// Level of the question that was answered.
    pub question_level: u32,
    /// Consecutive correct answers, including this one.
    pub streak: u32,
    /// Consecutive misses, including this one.
    pub wrong_streak: u32,
}

/// A change of the active discrete level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum LevelChange {
    Up { from: u32, to: u32 },
    Down { from: u32, to: u32 },
}

impl LevelChange {
    /// The level after the change.
    pub fn level(&self) -> u32 {
        match self {
            LevelChange::Up { to, .. } | LevelChange::Down { to, .. } => *to,
        }
    }
}

impl fmt::Display for LevelChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelChange::Up { from, to } => write!(f, "level up {from} -> {to}"),
            LevelChange::Down { from, to } => write!(f, "level down {from} -> {to}"),
        }
    }
}

/// Strategy-specific state, exposed for display and session traces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum ProgressionState {
    Cursor { cursor: f64, level: u32 },
    Xp { xp: i32, level: u32, threshold: i32 },
    Sequential { level: u32 },
}

impl ProgressionState {
    pub fn level(&self) -> u32 {
        match self {
            ProgressionState::Cursor { level, .. }
            | ProgressionState::Xp { level, .. }
            | ProgressionState::Sequential { level } => *level,
        }
    }
}

/// What a single recorded answer did to the difficulty state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    pub level_change: Option<LevelChange>,
    /// XP delta applied, for the XP economy.
    pub xp_delta: Option<i32>,
}

/// A question-selection strategy.
pub trait Progression: Send + fmt::Debug {
    fn kind(&self) -> EngineKind;

    /// Apply an answer outcome.
    fn record(&mut self, event: &AnswerEvent, pool: &QuestionPool) -> StepOutcome;

    /// Next unused pool position, or `None` when the pool is exhausted.
    fn select(&self, pool: &QuestionPool, used: &UsedSet) -> Option<usize>;

    /// Current discrete level, always within `1..=level_count`.
    fn level(&self) -> u32;

    fn state(&self) -> ProgressionState;

    /// Return to the initial state.
    fn reset(&mut self);
}

/// Build the strategy for `kind`.
pub fn progression_for(kind: EngineKind, pool: &QuestionPool, level_count: u32) -> Box<dyn Progression> {
    match kind {
        EngineKind::Cursor => Box::new(CursorProgression::new(level_count)),
        EngineKind::Xp => {
            let start = pool.levels().first().copied().unwrap_or(1);
            Box::new(XpProgression::new(start, level_count))
        }
        EngineKind::Sequential => Box::new(SequentialProgression::new(level_count)),
    }
}

/// Presents the pool in order, without adapting.
#[derive(Debug, Clone)]
pub struct SequentialProgression {
    level: u32,
    level_count: u32,
}

impl SequentialProgression {
    pub fn new(level_count: u32) -> Self {
        Self {
            level: 1,
            level_count: level_count.max(1),
        }
    }
}

impl Progression for SequentialProgression {
    fn kind(&self) -> EngineKind {
        EngineKind::Sequential
    }

    fn record(&mut self, event: &AnswerEvent, _pool: &QuestionPool) -> StepOutcome {
        self.level = event.question_level.clamp(1, self.level_count);
        StepOutcome::default()
    }

    fn select(&self, pool: &QuestionPool, used: &UsedSet) -> Option<usize> {
        pool.first_unused(used)
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn state(&self) -> ProgressionState {
        ProgressionState::Sequential { level: self.level }
    }

    fn reset(&mut self) {
        self.level = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, QuestionKind};

    fn pool_with_levels(levels: &[u32]) -> QuestionPool {
        QuestionPool::new(
            levels
                .iter()
                .enumerate()
                .map(|(i, &level)| Question {
                    id: format!("q{i}"),
                    word: format!("w{i}"),
                    options: vec![],
                    answer: "a".into(),
                    level,
                    lesson: None,
                    kind: QuestionKind::Choice,
                })
                .collect(),
        )
    }

    #[test]
    fn factory_builds_requested_kind() {
        let pool = pool_with_levels(&[3, 4, 5]);
        for kind in [EngineKind::Cursor, EngineKind::Xp, EngineKind::Sequential] {
            assert_eq!(progression_for(kind, &pool, 5).kind(), kind);
        }
    }

    #[test]
    fn xp_starts_at_lowest_pool_level() {
        let pool = pool_with_levels(&[3, 4, 5]);
        assert_eq!(progression_for(EngineKind::Xp, &pool, 5).level(), 3);
    }

    #[test]
    fn sequential_walks_pool_order() {
        let pool = pool_with_levels(&[2, 1, 3]);
        let mut progression = SequentialProgression::new(3);
        let mut used = UsedSet::new();
        let mut order = Vec::new();
        while let Some(position) = progression.select(&pool, &used) {
            used.insert(position);
            let question = pool.get(position).unwrap();
            order.push(question.level);
            progression.record(
                &AnswerEvent {
                    correct: false,
                    elapsed: Duration::from_secs(1),
                    question_level: question.level,
                    streak: 0,
                    wrong_streak: 1,
                },
                &pool,
            );
        }
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(progression.level(), 3);
    }

    #[test]
    fn level_change_display() {
        assert_eq!(LevelChange::Up { from: 1, to: 2 }.to_string(), "level up 1 -> 2");
        assert_eq!(LevelChange::Down { from: 3, to: 2 }.level(), 2);
    }
}
