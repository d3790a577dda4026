//! Difficulty-indexed question pool.
//!
//! The pool is sorted by (level, lesson) once at construction. Positions are
//! stable afterwards: merged questions are appended, so a position recorded
//! in a session's used set always refers to the same question.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::model::Question;

/// Pool positions that have already been presented in a session.
pub type UsedSet = BTreeSet<usize>;

/// The candidate questions for one session.
#[derive(Debug, Clone, Default)]
pub struct QuestionPool {
    questions: Vec<Question>,
    by_level: BTreeMap<u32, Vec<usize>>,
    ids: HashSet<String>,
}

impl QuestionPool {
    /// Build a pool, sorting by level then lesson. Duplicate ids keep the
    /// first occurrence.
    pub fn new(questions: Vec<Question>) -> Self {
        let mut seen = HashSet::new();
        let mut questions: Vec<Question> = questions
            .into_iter()
            .filter(|q| seen.insert(q.id.clone()))
            .collect();
        questions.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| compare_lessons(a.lesson.as_deref(), b.lesson.as_deref()))
        });

        let mut pool = Self {
            questions: Vec::with_capacity(questions.len()),
            by_level: BTreeMap::new(),
            ids: HashSet::new(),
        };
        for q in questions {
            pool.push(q);
        }
        pool
    }

    fn push(&mut self, question: Question) {
        let position = self.questions.len();
        self.by_level.entry(question.level).or_default().push(position);
        self.ids.insert(question.id.clone());
        self.questions.push(question);
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Question> {
        self.questions.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Levels that have at least one question, ascending.
    pub fn levels(&self) -> Vec<u32> {
        self.by_level.keys().copied().collect()
    }

    /// Highest level present, or 1 for an empty pool.
    pub fn max_level(&self) -> u32 {
        self.by_level.keys().next_back().copied().unwrap_or(1)
    }

    /// Lowest level present above `level`, no higher than `max`.
    pub fn next_level_above(&self, level: u32, max: u32) -> Option<u32> {
        if level >= max {
            return None;
        }
        self.by_level.range(level + 1..=max).next().map(|(l, _)| *l)
    }

    /// Highest level present below `level`, ignoring level 0.
    pub fn next_level_below(&self, level: u32) -> Option<u32> {
        if level <= 1 {
            return None;
        }
        self.by_level.range(1..level).next_back().map(|(l, _)| *l)
    }

    /// Number of unused questions at exactly `level`.
    pub fn unused_at_level(&self, level: u32, used: &UsedSet) -> usize {
        self.by_level
            .get(&level)
            .map(|positions| positions.iter().filter(|p| !used.contains(p)).count())
            .unwrap_or(0)
    }

    /// Append questions whose id is not already in the pool.
    ///
    /// Returns the number of questions added. Merging the same response twice
    /// adds nothing the second time.
    pub fn merge(&mut self, questions: Vec<Question>) -> usize {
        let mut added = 0;
        for q in questions {
            if self.ids.contains(&q.id) {
                continue;
            }
            self.push(q);
            added += 1;
        }
        added
    }

    /// Nearest unused question to `level`.
    ///
    /// Searches `level`, then `level + 1`, `level - 1`, `level + 2`, ... up to
    /// `level_count` steps away. Falls back to any unused question. Returns
    /// `None` once every position is used.
    pub fn nearest_to_level(&self, level: u32, level_count: u32, used: &UsedSet) -> Option<usize> {
        for delta in 0..=level_count {
            let above = level.checked_add(delta);
            let below = level.checked_sub(delta).filter(|_| delta > 0);
            for candidate in [above, below].into_iter().flatten() {
                let hit = self
                    .by_level
                    .get(&candidate)
                    .and_then(|positions| positions.iter().find(|p| !used.contains(p)));
                if let Some(position) = hit {
                    return Some(*position);
                }
            }
        }
        self.first_unused(used)
    }

    /// Nearest unused pool position to a continuous position.
    ///
    /// Starts at `round(position)` clamped into the pool and alternates
    /// `+k` / `-k`. Returns `None` once every position is used.
    pub fn nearest_to_position(&self, position: f64, used: &UsedSet) -> Option<usize> {
        let len = self.questions.len();
        if len == 0 {
            return None;
        }
        let start = if position.is_finite() && position > 0.0 {
            (position.round() as usize).min(len - 1)
        } else {
            0
        };

        for offset in 0..len {
            let up = start + offset;
            if up < len && !used.contains(&up) {
                return Some(up);
            }
            if offset > 0 && offset <= start && !used.contains(&(start - offset)) {
                return Some(start - offset);
            }
        }
        None
    }

    /// Lowest unused position.
    pub fn first_unused(&self, used: &UsedSet) -> Option<usize> {
        (0..self.questions.len()).find(|p| !used.contains(p))
    }
}

/// Order lessons naturally: `None` first, numeric segments ("2-10") compared
/// as numbers, anything else lexically.
fn compare_lessons(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (numeric_segments(a), numeric_segments(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.cmp(b),
        },
    }
}

fn numeric_segments(lesson: &str) -> Option<Vec<u32>> {
    lesson
        .split(['-', '.', '_'])
        .map(|s| s.trim().parse::<u32>().ok())
        .collect()
}
