//! XP economy over discrete levels ("books").
//!
//! Correct answers earn XP (base + speed + combo), misses cost XP with an
//! escalating penalty. Reaching the level threshold promotes and resets XP to
//! zero; going negative demotes and lands at half the lower level's
//! threshold so the next answer does not immediately promote again.

use crate::model::EngineKind;
use crate::pool::{QuestionPool, UsedSet};
use crate::progression::{AnswerEvent, LevelChange, Progression, ProgressionState, StepOutcome};
use crate::scoring::{correct_xp, lesson_xp, miss_penalty};

#[derive(Debug, Clone)]
pub struct XpProgression {
    xp: i32,
    book: u32,
    start_book: u32,
    level_count: u32,
}

impl XpProgression {
    pub fn new(start_book: u32, level_count: u32) -> Self {
        let level_count = level_count.max(1);
        let start_book = start_book.clamp(1, level_count);
        Self {
            xp: 0,
            book: start_book,
            start_book,
            level_count,
        }
    }

    pub fn xp(&self) -> i32 {
        self.xp
    }

    /// XP needed to leave the current level.
    pub fn threshold(&self) -> i32 {
        lesson_xp(self.book, self.level_count)
    }

    /// Add `delta` and resolve any promotion or demotion.
    ///
    /// Transitions only land on levels that have questions in `pool`. With
    /// no such level above, XP is capped at the threshold; with none below,
    /// it floors at zero.
    pub fn apply(&mut self, delta: i32, pool: &QuestionPool) -> Option<LevelChange> {
        self.xp += delta;
        let threshold = self.threshold();

        if self.xp >= threshold {
            if let Some(to) = pool.next_level_above(self.book, self.level_count) {
                let from = self.book;
                self.book = to;
                self.xp = 0;
                return Some(LevelChange::Up { from, to });
            }
            self.xp = threshold;
        } else if self.xp < 0 {
            if let Some(to) = pool.next_level_below(self.book) {
                let from = self.book;
                self.book = to;
                self.xp = lesson_xp(to, self.level_count) / 2;
                return Some(LevelChange::Down { from, to });
            }
            self.xp = 0;
        }
        None
    }
}

impl Progression for XpProgression {
    fn kind(&self) -> EngineKind {
        EngineKind::Xp
    }

    fn record(&mut self, event: &AnswerEvent, pool: &QuestionPool) -> StepOutcome {
        let delta = if event.correct {
            correct_xp(event.question_level, self.book, event.elapsed, event.streak).total()
        } else {
            miss_penalty(event.wrong_streak, self.book)
        };
        let level_change = self.apply(delta, pool);
        tracing::debug!(delta, xp = self.xp, book = self.book, "xp applied");
        StepOutcome {
            level_change,
            xp_delta: Some(delta),
        }
    }

    fn select(&self, pool: &QuestionPool, used: &UsedSet) -> Option<usize> {
        pool.nearest_to_level(self.book, self.level_count, used)
    }

    fn level(&self) -> u32 {
        self.book
    }

    fn state(&self) -> ProgressionState {
        ProgressionState::Xp {
            xp: self.xp,
            level: self.book,
            threshold: self.threshold(),
        }
    }

    fn reset(&mut self) {
        self.xp = 0;
        self.book = self.start_book;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::{Question, QuestionKind};

    fn pool(levels: &[u32]) -> QuestionPool {
        QuestionPool::new(
            levels
                .iter()
                .map(|&level| Question {
                    id: format!("q{level}"),
                    word: format!("word{level}"),
                    options: vec![],
                    answer: "x".into(),
                    level,
                    lesson: None,
                    kind: QuestionKind::Spelling,
                })
                .collect(),
        )
    }

    fn hit(question_level: u32, secs: f64, streak: u32) -> AnswerEvent {
        AnswerEvent {
            correct: true,
            elapsed: Duration::from_secs_f64(secs),
            question_level,
            streak,
            wrong_streak: 0,
        }
    }

    fn miss(wrong_streak: u32) -> AnswerEvent {
        AnswerEvent {
            correct: false,
            elapsed: Duration::from_secs(2),
            question_level: 1,
            streak: 0,
            wrong_streak,
        }
    }

    #[test]
    fn fast_first_answer_promotes_at_fifteen_levels() {
        let pool = pool(&[1, 2]);
        let mut xp = XpProgression::new(1, 15);
        let outcome = xp.record(&hit(1, 1.0, 1), &pool);
        assert_eq!(outcome.xp_delta, Some(15));
        // threshold for level 1 is 5
        assert_eq!(outcome.level_change, Some(LevelChange::Up { from: 1, to: 2 }));
        assert_eq!(xp.xp(), 0);
    }

    #[test]
    fn promotion_skips_missing_levels() {
        let pool = pool(&[1, 5]);
        let mut xp = XpProgression::new(1, 5);
        // lesson_xp(1, 5) = 5 * 3 = 15
        let outcome = xp.record(&hit(1, 1.0, 1), &pool);
        assert_eq!(outcome.level_change, Some(LevelChange::Up { from: 1, to: 5 }));
        assert_eq!(xp.level(), 5);
    }

    #[test]
    fn escalating_misses() {
        let pool = pool(&[1, 2, 3]);
        // level 2 of 3: threshold is (4+2)*5 = 30, so misses do not promote
        let mut xp = XpProgression::new(2, 3);
        xp.apply(25, &pool);
        let deltas: Vec<i32> = (1..=3)
            .map(|streak| xp.record(&miss(streak), &pool).xp_delta.unwrap())
            .collect();
        assert_eq!(deltas, vec![-5, -7, -10]);
        assert_eq!(xp.xp(), 3);
        assert_eq!(xp.level(), 2);
    }

    #[test]
    fn demotion_lands_at_half_threshold() {
        let mut xp = XpProgression::new(3, 5);
        let change = xp.apply(-1, &pool(&[2, 3]));
        assert_eq!(change, Some(LevelChange::Down { from: 3, to: 2 }));
        // lesson_xp(2, 5) = 6 * 3 = 18
        assert_eq!(xp.xp(), 9);
    }

    #[test]
    fn demotion_skips_missing_levels() {
        let mut xp = XpProgression::new(3, 5);
        let change = xp.apply(-1, &pool(&[1, 3]));
        assert_eq!(change, Some(LevelChange::Down { from: 3, to: 1 }));
        // lesson_xp(1, 5) = 5 * 3 = 15
        assert_eq!(xp.xp(), 7);
    }

    #[test]
    fn no_lower_level_in_pool_floors_at_zero() {
        let pool = pool(&[3, 4, 5]);
        let mut xp = XpProgression::new(3, 5);
        let outcome = xp.record(&miss(1), &pool);
        assert_eq!(outcome.level_change, None);
        assert_eq!(xp.level(), 3);
        assert_eq!(xp.xp(), 0);
    }

    #[test]
    fn lowest_level_floors_at_zero() {
        let mut xp = XpProgression::new(1, 5);
        assert_eq!(xp.apply(-20, &pool(&[1, 2])), None);
        assert_eq!(xp.xp(), 0);
        assert_eq!(xp.level(), 1);
    }

    #[test]
    fn top_level_caps_xp() {
        let mut xp = XpProgression::new(5, 5);
        assert_eq!(xp.apply(1_000, &pool(&[4, 5])), None);
        assert_eq!(xp.xp(), xp.threshold());
        assert_eq!(xp.level(), 5);
    }

    #[test]
    fn highest_pool_level_caps_xp() {
        let mut xp = XpProgression::new(2, 5);
        assert_eq!(xp.apply(1_000, &pool(&[1, 2])), None);
        assert_eq!(xp.xp(), xp.threshold());
        assert_eq!(xp.level(), 2);
    }

    #[test]
    fn xp_never_negative_and_level_in_pool() {
        let pool = pool(&[1, 3, 6]);
        let levels = pool.levels();
        let mut xp = XpProgression::new(1, 6);
        let mut streak = 0;
        let mut wrong = 0;
        for i in 0..300u32 {
            let correct = (i * 7 + 3) % 5 < 3;
            if correct {
                streak += 1;
                wrong = 0;
            } else {
                wrong += 1;
                streak = 0;
            }
            let event = AnswerEvent {
                correct,
                elapsed: Duration::from_secs(u64::from(i % 10)),
                question_level: (i % 6) + 1,
                streak,
                wrong_streak: wrong,
            };
            xp.record(&event, &pool);
            assert!(xp.xp() >= 0);
            assert!(levels.contains(&xp.level()));
        }
    }

    #[test]
    fn reset_returns_to_start() {
        let mut xp = XpProgression::new(2, 5);
        xp.apply(100, &pool(&[2, 3]));
        xp.reset();
        assert_eq!(xp.level(), 2);
        assert_eq!(xp.xp(), 0);
    }
}
