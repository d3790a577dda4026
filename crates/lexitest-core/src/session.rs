//! Test sessions.
//!
//! A session owns everything for one sitting: the pool, the used set, the
//! progression strategy, the tally, and its background work. Nothing is
//! shared between sessions, so `reset` is a plain field reset plus a new
//! background generation. The backend session id survives a reset, which is
//! why a reset session finishes with its local result.
//!
//! Per-question mode: `Briefing → Testing → (answer → Feedback → advance →
//! Testing)* → Complete`. Every answer is graded locally and applied at once;
//! recording it on the server happens in the background and never blocks or
//! rolls back local state.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::background::{Background, BackgroundEvent};
use crate::error::{ApiError, SessionError};
use crate::exam::ExamSession;
use crate::model::{EngineKind, Question, TimeMode};
use crate::pool::{QuestionPool, UsedSet};
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::progression::{progression_for, AnswerEvent, LevelChange, Progression, ProgressionState};
use crate::result::FinalResult;
use crate::traits::{
    AnswerSubmission, CompletionRequest, QuestionSource, ResultRecorder, SessionStart, StartRequest,
};

/// Default number of questions in per-question mode.
pub const DEFAULT_QUESTION_BUDGET: usize = 30;

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing started yet.
    #[default]
    Idle,
    /// Started, instructions shown, no question yet.
    Briefing,
    /// A question is on screen.
    Testing,
    /// Per-question mode: the last answer's feedback is on screen.
    Feedback,
    /// Exam mode: the batch is in flight.
    Submitting,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Briefing => "briefing",
            Phase::Testing => "testing",
            Phase::Feedback => "showing feedback",
            Phase::Submitting => "submitting",
            Phase::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Engine settings that the backend does not dictate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Questions per session when the backend does not set a budget.
    #[serde(default = "default_budget")]
    pub question_budget: usize,
    /// Level count when neither the backend nor the pool implies one.
    #[serde(default)]
    pub level_count: Option<u32>,
    /// Fetch more questions for a level after moving to it.
    #[serde(default = "default_true")]
    pub prefetch: bool,
    /// Prefetch only when fewer unused questions than this remain at the level.
    #[serde(default = "default_low_water")]
    pub prefetch_low_water: usize,
}

fn default_budget() -> usize {
    DEFAULT_QUESTION_BUDGET
}

fn default_true() -> bool {
    true
}

fn default_low_water() -> usize {
    3
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            question_budget: default_budget(),
            level_count: None,
            prefetch: true,
            prefetch_low_water: default_low_water(),
        }
    }
}

/// A started session in either mode.
#[derive(Debug)]
pub enum TestSession {
    PerQuestion(AdaptiveSession),
    Exam(ExamSession),
}

impl TestSession {
    /// Start a session through `source`.
    ///
    /// Fails with [`SessionError::Start`] when the backend refuses, and with
    /// [`SessionError::EmptyPool`] when it returns no questions.
    pub async fn start(
        source: Arc<dyn QuestionSource>,
        recorder: Arc<dyn ResultRecorder>,
        request: &StartRequest,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let start = source
            .start_session(request)
            .await
            .map_err(SessionError::start)?;
        tracing::info!(
            session = %start.session_id,
            engine = %start.engine,
            mode = %start.time_mode,
            questions = start.questions.len(),
            "session started via {}",
            source.name()
        );

        match start.time_mode {
            TimeMode::PerQuestion => Ok(Self::PerQuestion(AdaptiveSession::new(
                start, source, recorder, config,
            )?)),
            TimeMode::Total => Ok(Self::Exam(ExamSession::new(start, recorder)?)),
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            TestSession::PerQuestion(s) => s.session_id(),
            TestSession::Exam(s) => s.session_id(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            TestSession::PerQuestion(s) => s.phase(),
            TestSession::Exam(s) => s.phase(),
        }
    }
}

/// What the test-taker sees after answering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub correct_answer: String,
    pub selected_answer: String,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub xp_delta: Option<i32>,
    #[serde(default)]
    pub level_change: Option<LevelChange>,
    pub level: u32,
    pub combo: u32,
    /// The budget is used up; `advance` will complete the session.
    pub finished: bool,
}

/// One answered question, for traces and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub number: usize,
    pub question_id: String,
    pub question_level: u32,
    pub correct: bool,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub xp_delta: Option<i32>,
    #[serde(default)]
    pub level_change: Option<LevelChange>,
    pub state: ProgressionState,
}

/// Adaptive per-question session.
pub struct AdaptiveSession {
    session_id: String,
    name: String,
    source: Arc<dyn QuestionSource>,
    recorder: Arc<dyn ResultRecorder>,
    config: SessionConfig,
    budget: usize,
    level_count: u32,
    initial_questions: Vec<Question>,
    pool: QuestionPool,
    used: UsedSet,
    progression: Box<dyn Progression>,
    progress: ProgressTracker,
    phase: Phase,
    current: Option<usize>,
    shown_at: Option<Instant>,
    prefetching: HashSet<u32>,
    prefetch_disabled: bool,
    background: Background,
    trace: Vec<TraceEntry>,
    result: Option<FinalResult>,
}

impl fmt::Debug for AdaptiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveSession")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("engine", &self.progression.kind())
            .field("budget", &self.budget)
            .field("pool", &self.pool.len())
            .field("used", &self.used.len())
            .finish()
    }
}

impl AdaptiveSession {
    pub fn new(
        start: SessionStart,
        source: Arc<dyn QuestionSource>,
        recorder: Arc<dyn ResultRecorder>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        if start.questions.is_empty() {
            return Err(SessionError::EmptyPool);
        }
        let pool = QuestionPool::new(start.questions.clone());
        let level_count = start
            .level_count
            .or(config.level_count)
            .unwrap_or_else(|| pool.max_level())
            .max(1);
        let budget = start.question_budget.unwrap_or(config.question_budget).max(1);
        let progression = progression_for(start.engine, &pool, level_count);

        Ok(Self {
            session_id: start.session_id,
            name: start.name,
            source,
            recorder,
            config,
            budget,
            level_count,
            initial_questions: start.questions,
            pool,
            used: UsedSet::new(),
            progression,
            progress: ProgressTracker::new(),
            phase: Phase::Briefing,
            current: None,
            shown_at: None,
            prefetching: HashSet::new(),
            prefetch_disabled: false,
            background: Background::new(),
            trace: Vec::new(),
            result: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> EngineKind {
        self.progression.kind()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    /// Current discrete level.
    pub fn level(&self) -> u32 {
        self.progression.level()
    }

    pub fn progression_state(&self) -> ProgressionState {
        self.progression.state()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn pool(&self) -> &QuestionPool {
        &self.pool
    }

    /// Pool positions presented so far.
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn result(&self) -> Option<&FinalResult> {
        self.result.as_ref()
    }

    /// The question on screen, if any.
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Testing | Phase::Feedback => self.current.and_then(|p| self.pool.get(p)),
            _ => None,
        }
    }

    /// Leave the briefing and show the first question.
    pub fn begin(&mut self) -> Result<Option<&Question>, SessionError> {
        self.expect_phase(Phase::Briefing, "begin")?;
        self.phase = Phase::Testing;
        Ok(self.present_next())
    }

    /// Answer the current question, timing it from when it was shown.
    pub fn answer(&mut self, selected: &str) -> Result<AnswerFeedback, SessionError> {
        let elapsed = self.shown_at.map(|t| t.elapsed()).unwrap_or_default();
        self.answer_timed(selected, elapsed)
    }

    /// Answer the current question with an externally measured time.
    pub fn answer_timed(&mut self, selected: &str, elapsed: Duration) -> Result<AnswerFeedback, SessionError> {
        self.expect_phase(Phase::Testing, "answer")?;
        self.apply_background();

        let Some(question) = self.current.and_then(|p| self.pool.get(p)).cloned() else {
            return Err(SessionError::InvalidPhase {
                action: "answer without a question",
                phase: self.phase,
            });
        };

        let correct = question.is_correct(selected);
        let (streak, wrong_streak) = if correct {
            (self.progress.record_hit(), 0)
        } else {
            (0, self.progress.record_miss(&question, selected, Some(elapsed)))
        };

        let step = self.progression.record(
            &AnswerEvent {
                correct,
                elapsed,
                question_level: question.level,
                streak,
                wrong_streak,
            },
            &self.pool,
        );
        if let Some(change) = step.level_change {
            tracing::info!(session = %self.session_id, "{change}");
            self.maybe_prefetch(change.level());
        }

        let elapsed_ms = elapsed.as_millis() as u64;
        self.trace.push(TraceEntry {
            number: self.progress.answered(),
            question_id: question.id.clone(),
            question_level: question.level,
            correct,
            elapsed_ms,
            xp_delta: step.xp_delta,
            level_change: step.level_change,
            state: self.progression.state(),
        });
        self.record_in_background(&question, selected, elapsed_ms);

        let finished = self.progress.answered() >= self.budget;
        if finished {
            self.finalize();
        }
        self.phase = Phase::Feedback;

        Ok(AnswerFeedback {
            correct,
            correct_answer: question.answer,
            selected_answer: selected.to_string(),
            elapsed_ms,
            xp_delta: step.xp_delta,
            level_change: step.level_change,
            level: self.progression.level(),
            combo: self.progress.combo(),
            finished,
        })
    }

    /// Move past the feedback to the next question.
    ///
    /// Returns `None` and completes the session when the budget is used up
    /// or no unused question is left.
    pub fn advance(&mut self) -> Result<Option<&Question>, SessionError> {
        self.expect_phase(Phase::Feedback, "advance")?;
        self.apply_background();

        if self.result.is_some() {
            self.phase = Phase::Complete;
            return Ok(None);
        }
        self.phase = Phase::Testing;
        if self.select_next().is_none() {
            tracing::info!(session = %self.session_id, "question pool exhausted");
            self.finalize();
            self.phase = Phase::Complete;
            return Ok(None);
        }
        Ok(self.current_question())
    }

    /// Finish the session and report it to the recorder.
    ///
    /// Ends early if called before the budget is used up. Waits for pending
    /// answer recordings first. The server's summary is returned when it
    /// covers exactly this run; otherwise, or when the call fails, the
    /// locally computed result is.
    pub async fn complete(&mut self) -> Result<FinalResult, SessionError> {
        if self.phase == Phase::Briefing || self.phase == Phase::Idle {
            return Err(SessionError::InvalidPhase {
                action: "complete",
                phase: self.phase,
            });
        }
        self.settle().await;
        if self.result.is_none() {
            self.finalize();
        }
        self.phase = Phase::Complete;

        let local = self.result.clone().unwrap_or_else(|| {
            FinalResult::from_progress(&self.progress, Some(self.progression.level()))
        });
        let request = CompletionRequest {
            final_level: local.final_level,
            best_combo: local.best_combo,
        };
        let result = match self.recorder.complete_session(&self.session_id, &request).await {
            // the server tally also counts answers recorded before a reset
            Ok(server) if self.background.generation() > 0 || server.total != local.total => {
                tracing::warn!(
                    session = %self.session_id,
                    server_total = server.total,
                    local_total = local.total,
                    "server summary does not match this run, keeping local result"
                );
                local
            }
            Ok(mut server) => {
                if server.wrong_answers.is_empty() {
                    server.wrong_answers = local.wrong_answers.clone();
                }
                server
            }
            Err(e) => {
                tracing::warn!(session = %self.session_id, "completion not recorded: {e:#}");
                local
            }
        };
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Start over with the original pool. Results of requests issued before
    /// the reset are discarded when they arrive. A backend that refused
    /// prefetching stays refused.
    pub fn reset(&mut self) {
        self.background.bump();
        // drop anything already queued from the old generation
        let _ = self.background.drain();
        self.pool = QuestionPool::new(self.initial_questions.clone());
        self.used.clear();
        self.progression.reset();
        self.progress.reset();
        self.prefetching.clear();
        self.trace.clear();
        self.current = None;
        self.shown_at = None;
        self.result = None;
        self.phase = Phase::Briefing;
        tracing::info!(session = %self.session_id, generation = self.background.generation(), "session reset");
    }

    /// Wait for background requests and apply their results.
    pub async fn settle(&mut self) {
        self.background.settle().await;
        self.apply_background();
    }

    /// Levels with a prefetch in flight.
    pub fn prefetching(&self) -> Vec<u32> {
        let mut levels: Vec<u32> = self.prefetching.iter().copied().collect();
        levels.sort_unstable();
        levels
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                action,
                phase: self.phase,
            })
        }
    }

    fn present_next(&mut self) -> Option<&Question> {
        if self.select_next().is_none() {
            self.finalize();
            self.phase = Phase::Complete;
            return None;
        }
        self.current_question()
    }

    fn select_next(&mut self) -> Option<usize> {
        let position = self.progression.select(&self.pool, &self.used)?;
        self.used.insert(position);
        self.current = Some(position);
        self.shown_at = Some(Instant::now());
        tracing::debug!(
            position,
            level = self.pool.get(position).map(|q| q.level),
            target = self.progression.level(),
            "question selected"
        );
        Some(position)
    }

    fn finalize(&mut self) {
        let result = FinalResult::from_progress(&self.progress, Some(self.progression.level()));
        tracing::info!(
            session = %self.session_id,
            answered = result.total,
            correct = result.correct,
            accuracy = format!("{:.1}", result.accuracy),
            "session finished"
        );
        self.result = Some(result);
    }

    fn maybe_prefetch(&mut self, level: u32) {
        if !self.config.prefetch || self.prefetch_disabled || self.progression.kind() != EngineKind::Xp {
            return;
        }
        if self.pool.unused_at_level(level, &self.used) >= self.config.prefetch_low_water {
            return;
        }
        if !self.prefetching.insert(level) {
            return;
        }
        let source = Arc::clone(&self.source);
        let session_id = self.session_id.clone();
        let spawned = self.background.spawn(async move {
            let result = source.fetch_level_pool(&session_id, level).await;
            BackgroundEvent::Prefetched { level, result }
        });
        if spawned {
            tracing::debug!(level, "prefetching level pool");
        } else {
            self.prefetching.remove(&level);
        }
    }

    fn record_in_background(&mut self, question: &Question, selected: &str, elapsed_ms: u64) {
        let recorder = Arc::clone(&self.recorder);
        let submission = AnswerSubmission {
            session_id: self.session_id.clone(),
            question_id: question.id.clone(),
            selected_answer: selected.to_string(),
            time_taken_ms: elapsed_ms,
        };
        self.background.spawn(async move {
            let result = recorder.submit_answer(&submission).await;
            BackgroundEvent::Recorded {
                question_id: submission.question_id,
                result,
            }
        });
    }

    fn apply_background(&mut self) {
        for event in self.background.drain() {
            match event {
                BackgroundEvent::Prefetched { level, result } => {
                    self.prefetching.remove(&level);
                    match result {
                        Ok(questions) => {
                            let added = self.pool.merge(questions);
                            tracing::debug!(level, added, "prefetch merged");
                        }
                        Err(e) => {
                            tracing::debug!(level, "prefetch failed: {e:#}");
                            if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_permanent) {
                                tracing::info!(session = %self.session_id, "prefetch disabled: {e}");
                                self.prefetch_disabled = true;
                            }
                        }
                    }
                }
                BackgroundEvent::Recorded { question_id, result } => match result {
                    Ok(receipt) => tracing::debug!(question = %question_id, correct = receipt.correct, "answer recorded"),
                    Err(e) => tracing::warn!(question = %question_id, "answer not recorded: {e:#}"),
                },
            }
        }
    }
}
