//! Scoring rules shared by every progression strategy.
//!
//! All functions here are pure. The interactive engine applies them locally
//! for immediate feedback, and anything validating sessions after the fact
//! should call the same functions so the two never drift.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Consecutive-correct streak at which the combo bonus starts.
pub const COMBO_THRESHOLD: u32 = 3;
/// Largest combo bonus per answer.
pub const MAX_COMBO_BONUS: i32 = 5;
/// Number of levels the XP thresholds are tuned for.
pub const REFERENCE_LEVEL_COUNT: u32 = 15;

/// Cursor step for a correct answer, in pool positions.
///
/// Faster answers move the cursor further: under 4s is 3, under 8s is 2,
/// anything slower is 1.
pub fn cursor_step(elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs < 4.0 {
        3.0
    } else if secs < 8.0 {
        2.0
    } else {
        1.0
    }
}

/// Cursor step for an incorrect answer.
pub const CURSOR_MISS_STEP: f64 = 1.0;

/// Discrete level for a cursor position.
///
/// `clamp(floor(cursor / (pool_size / level_count)) + 1, 1, level_count)`.
pub fn cursor_level(cursor: f64, pool_size: usize, level_count: u32) -> u32 {
    let level_count = level_count.max(1);
    let per_level = (pool_size as f64 / level_count as f64).max(1.0);
    let raw = (cursor.max(0.0) / per_level).floor() as u64 + 1;
    raw.clamp(1, level_count as u64) as u32
}

/// Breakdown of the XP awarded for one correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpGain {
    pub base: i32,
    pub speed: i32,
    pub combo: i32,
}

impl XpGain {
    pub fn total(&self) -> i32 {
        self.base + self.speed + self.combo
    }
}

/// Base XP for a correct answer.
///
/// Questions below the current level are worth `max(4, book)`; anything at
/// or above it is worth `8 + 2 * book`.
pub fn base_xp(question_level: u32, book: u32) -> i32 {
    if question_level < book {
        (book as i32).max(4)
    } else {
        8 + book as i32 * 2
    }
}

/// Speed bonus: 5 at or under 1s, stepping down to 1 at 8s, 0 beyond.
pub fn speed_bonus(elapsed: Duration) -> i32 {
    let secs = elapsed.as_secs_f64();
    match secs {
        s if s <= 1.0 => 5,
        s if s <= 2.0 => 4,
        s if s <= 4.0 => 3,
        s if s <= 6.0 => 2,
        s if s <= 8.0 => 1,
        _ => 0,
    }
}

/// Combo bonus for a streak that includes the current answer.
pub fn combo_bonus(streak: u32) -> i32 {
    if streak >= COMBO_THRESHOLD {
        ((streak / 5) as i32 + 1).min(MAX_COMBO_BONUS)
    } else {
        0
    }
}

/// Full XP award for a correct answer.
pub fn correct_xp(question_level: u32, book: u32, elapsed: Duration, streak: u32) -> XpGain {
    XpGain {
        base: base_xp(question_level, book),
        speed: speed_bonus(elapsed),
        combo: combo_bonus(streak),
    }
}

/// XP penalty (negative) for a miss.
///
/// `wrong_streak` counts consecutive misses including this one: the first
/// costs `3 + book`, the second `5 + book`, every further one `8 + book`.
pub fn miss_penalty(wrong_streak: u32, book: u32) -> i32 {
    let step = match wrong_streak {
        0 | 1 => 3,
        2 => 5,
        _ => 8,
    };
    -(step + book as i32)
}

/// XP needed to leave `level`.
///
/// `(4 + level) * max(1, ceil(15 / level_count))`.
pub fn lesson_xp(level: u32, level_count: u32) -> i32 {
    let level_count = level_count.max(1);
    let multiplier = REFERENCE_LEVEL_COUNT.div_ceil(level_count).max(1);
    (4 + level as i32) * multiplier as i32
}

/// Accuracy as a percentage, 0 when nothing was answered.
pub fn accuracy_percent(correct: usize, answered: usize) -> f64 {
    if answered == 0 {
        0.0
    } else {
        correct as f64 / answered as f64 * 100.0
    }
}
