//! Cursor-based selection over pool positions.
//!
//! The cursor is a continuous position in the sorted pool. Fast correct
//! answers move it further up than slow ones; misses move it down by one.
//! Because it works on pool density rather than level labels, an uneven
//! pool (many level-1 words, few level-10 words) still progresses smoothly.

use crate::model::EngineKind;
use crate::pool::{QuestionPool, UsedSet};
use crate::progression::{AnswerEvent, LevelChange, Progression, ProgressionState, StepOutcome};
use crate::scoring::{cursor_level, cursor_step, CURSOR_MISS_STEP};

#[derive(Debug, Clone)]
pub struct CursorProgression {
    cursor: f64,
    level: u32,
    level_count: u32,
}

impl CursorProgression {
    pub fn new(level_count: u32) -> Self {
        Self {
            cursor: 0.0,
            level: 1,
            level_count: level_count.max(1),
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }
}

impl Progression for CursorProgression {
    fn kind(&self) -> EngineKind {
        EngineKind::Cursor
    }

    fn record(&mut self, event: &AnswerEvent, pool: &QuestionPool) -> StepOutcome {
        if event.correct {
            self.cursor += cursor_step(event.elapsed);
        } else {
            self.cursor = (self.cursor - CURSOR_MISS_STEP).max(0.0);
        }

        let from = self.level;
        self.level = cursor_level(self.cursor, pool.len(), self.level_count);
        tracing::debug!(cursor = self.cursor, level = self.level, "cursor moved");

        let level_change = match self.level.cmp(&from) {
            std::cmp::Ordering::Greater => Some(LevelChange::Up { from, to: self.level }),
            std::cmp::Ordering::Less => Some(LevelChange::Down { from, to: self.level }),
            std::cmp::Ordering::Equal => None,
        };
        StepOutcome {
            level_change,
            xp_delta: None,
        }
    }

    fn select(&self, pool: &QuestionPool, used: &UsedSet) -> Option<usize> {
        pool.nearest_to_position(self.cursor, used)
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn state(&self) -> ProgressionState {
        ProgressionState::Cursor {
            cursor: self.cursor,
            level: self.level,
        }
    }

    fn reset(&mut self) {
        self.cursor = 0.0;
        self.level = 1;
    }
}
