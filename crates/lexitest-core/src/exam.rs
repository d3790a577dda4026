//! Exam mode: free navigation, one batch submit, one deadline.
//!
//! Answers are kept locally until [`ExamSession::submit`]. The time for a
//! question runs from its first display to its first answer and is frozen
//! after that, so later edits do not change it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::SessionError;
use crate::model::Question;
use crate::result::FinalResult;
use crate::session::Phase;
use crate::traits::{BatchEntry, ResultRecorder, SessionStart};

pub struct ExamSession {
    session_id: String,
    name: String,
    recorder: Arc<dyn ResultRecorder>,
    questions: Vec<Question>,
    answers: Vec<Option<String>>,
    first_shown: HashMap<usize, Instant>,
    time_taken: HashMap<usize, Duration>,
    index: usize,
    phase: Phase,
    time_limit: Option<Duration>,
    started_at: Option<Instant>,
    error: Option<String>,
    result: Option<FinalResult>,
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("questions", &self.questions.len())
            .field("answered", &self.answered_count())
            .field("index", &self.index)
            .finish()
    }
}

impl ExamSession {
    pub fn new(start: SessionStart, recorder: Arc<dyn ResultRecorder>) -> Result<Self, SessionError> {
        if start.questions.is_empty() {
            return Err(SessionError::EmptyPool);
        }
        let len = start.questions.len();
        Ok(Self {
            session_id: start.session_id,
            name: start.name,
            recorder,
            questions: start.questions,
            answers: vec![None; len],
            first_shown: HashMap::new(),
            time_taken: HashMap::new(),
            index: 0,
            phase: Phase::Briefing,
            time_limit: start.time_limit_secs.map(Duration::from_secs),
            started_at: None,
            error: None,
            result: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Last submit failure, cleared by the next submit attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&FinalResult> {
        self.result.as_ref()
    }

    /// Leave the briefing, start the clock and show the first question.
    pub fn begin(&mut self) -> Result<&Question, SessionError> {
        if self.phase != Phase::Briefing {
            return Err(SessionError::InvalidPhase {
                action: "begin",
                phase: self.phase,
            });
        }
        self.phase = Phase::Testing;
        self.started_at = Some(Instant::now());
        self.show(0);
        Ok(&self.questions[0])
    }

    /// The question on screen.
    pub fn current(&self) -> Option<&Question> {
        match self.phase {
            Phase::Testing | Phase::Submitting => self.questions.get(self.index),
            _ => None,
        }
    }

    /// The locally stored answer for the current question.
    pub fn current_answer(&self) -> Option<&str> {
        self.answers.get(self.index).and_then(|a| a.as_deref())
    }

    /// Jump to question `index`.
    pub fn go_to(&mut self, index: usize) -> Result<&Question, SessionError> {
        self.expect_testing("navigate")?;
        if index >= self.questions.len() {
            return Err(SessionError::OutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.show(index);
        Ok(&self.questions[index])
    }

    /// Move forward one question. Stays on the last one.
    pub fn next(&mut self) -> Result<&Question, SessionError> {
        let target = (self.index + 1).min(self.questions.len() - 1);
        self.go_to(target)
    }

    /// Move back one question. Stays on the first one.
    pub fn previous(&mut self) -> Result<&Question, SessionError> {
        self.go_to(self.index.saturating_sub(1))
    }

    /// Store an answer for the current question, replacing any earlier one.
    pub fn answer(&mut self, selected: &str) -> Result<(), SessionError> {
        self.expect_testing("answer")?;
        let index = self.index;
        if !self.time_taken.contains_key(&index) {
            let elapsed = self
                .first_shown
                .get(&index)
                .map(|shown| shown.elapsed())
                .unwrap_or_default();
            self.time_taken.insert(index, elapsed);
        }
        self.answers[index] = Some(selected.to_string());
        Ok(())
    }

    /// Recorded time for question `index`, if it has been answered.
    pub fn time_taken(&self, index: usize) -> Option<Duration> {
        self.time_taken.get(&index).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    /// Indices of questions without an answer.
    pub fn unanswered(&self) -> Vec<usize> {
        self.answers
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Time left before the deadline. `None` without a time limit.
    pub fn time_remaining(&self) -> Option<Duration> {
        let limit = self.time_limit?;
        let elapsed = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        Some(limit.saturating_sub(elapsed))
    }

    pub fn is_time_up(&self) -> bool {
        self.time_remaining().is_some_and(|left| left.is_zero())
    }

    /// The batch as it would be submitted now: one entry per question, in
    /// order, with an empty answer for anything not answered.
    pub fn entries(&self) -> Vec<BatchEntry> {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, question)| BatchEntry {
                question_id: question.id.clone(),
                selected_answer: self.answers[i].clone().unwrap_or_default(),
                time_taken_ms: self
                    .time_taken
                    .get(&i)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0),
            })
            .collect()
    }

    /// Submit every answer in one request.
    ///
    /// On failure the session goes back to `Testing` with the error message
    /// set, and the submit can be retried.
    pub async fn submit(&mut self) -> Result<FinalResult, SessionError> {
        self.expect_testing("submit")?;
        self.phase = Phase::Submitting;
        self.error = None;

        let entries = self.entries();
        tracing::info!(
            session = %self.session_id,
            answered = self.answered_count(),
            total = entries.len(),
            "submitting exam"
        );
        match self.recorder.submit_batch(&self.session_id, &entries).await {
            Ok(result) => {
                self.phase = Phase::Complete;
                self.result = Some(result.clone());
                Ok(result)
            }
            Err(e) => {
                let err = SessionError::submit(e);
                tracing::warn!(session = %self.session_id, "{err}");
                self.error = Some(err.to_string());
                self.phase = Phase::Testing;
                Err(err)
            }
        }
    }

    /// Clear every answer and timing and return to the briefing.
    pub fn reset(&mut self) {
        self.answers.iter_mut().for_each(|a| *a = None);
        self.first_shown.clear();
        self.time_taken.clear();
        self.index = 0;
        self.started_at = None;
        self.error = None;
        self.result = None;
        self.phase = Phase::Briefing;
    }

    fn show(&mut self, index: usize) {
        self.index = index;
        self.first_shown.entry(index).or_insert_with(Instant::now);
    }

    fn expect_testing(&self, action: &'static str) -> Result<(), SessionError> {
        if self.phase == Phase::Testing {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                action,
                phase: self.phase,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ApiError;
    use crate::model::{EngineKind, QuestionKind, TimeMode};
    use crate::traits::{AnswerReceipt, AnswerSubmission, CompletionRequest};

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            word: format!("word-{id}"),
            options: vec![format!("right-{id}"), "wrong".into()],
            answer: format!("right-{id}"),
            level: 1,
            lesson: None,
            kind: QuestionKind::Choice,
        }
    }

    #[derive(Default)]
    struct BatchRecorder {
        failures_left: Mutex<u32>,
        batches: Mutex<Vec<Vec<BatchEntry>>>,
        questions: Vec<Question>,
    }

    #[async_trait]
    impl ResultRecorder for BatchRecorder {
        async fn submit_answer(&self, _submission: &AnswerSubmission) -> anyhow::Result<AnswerReceipt> {
            anyhow::bail!("exam mode never records single answers")
        }

        async fn submit_batch(&self, _session_id: &str, entries: &[BatchEntry]) -> anyhow::Result<FinalResult> {
            self.batches.lock().unwrap().push(entries.to_vec());
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                anyhow::bail!(ApiError::Network("connection reset".into()));
            }
            Ok(FinalResult::grade_batch(&self.questions, entries))
        }

        async fn complete_session(&self, _id: &str, _request: &CompletionRequest) -> anyhow::Result<FinalResult> {
            anyhow::bail!("exam mode never completes")
        }
    }

    fn exam(recorder: &Arc<BatchRecorder>, time_limit_secs: Option<u64>) -> ExamSession {
        let start = SessionStart {
            session_id: "exam-1".into(),
            name: "Midterm".into(),
            questions: recorder.questions.clone(),
            engine: EngineKind::Sequential,
            time_mode: TimeMode::Total,
            question_budget: None,
            level_count: None,
            time_limit_secs,
        };
        ExamSession::new(start, Arc::clone(recorder) as Arc<dyn ResultRecorder>).unwrap()
    }

    fn recorder(ids: &[&str], failures: u32) -> Arc<BatchRecorder> {
        Arc::new(BatchRecorder {
            failures_left: Mutex::new(failures),
            questions: ids.iter().map(|id| question(id)).collect(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn unanswered_question_still_submitted() {
        let recorder = recorder(&["a", "b"], 0);
        let mut exam = exam(&recorder, None);

        exam.begin().unwrap();
        exam.answer("right-a").unwrap();
        exam.next().unwrap();
        assert_eq!(exam.unanswered(), vec![1]);

        let result = exam.submit().await.unwrap();
        assert_eq!(exam.phase(), Phase::Complete);
        assert_eq!(result.total, 2);
        assert_eq!(result.correct, 1);

        let batches = recorder.batches.lock().unwrap();
        let entries = &batches[0];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].question_id, "b");
        assert_eq!(entries[1].selected_answer, "");
        assert_eq!(entries[1].time_taken_ms, 0);
    }

    #[tokio::test]
    async fn failed_submit_reverts_and_retries() {
        let recorder = recorder(&["a"], 1);
        let mut exam = exam(&recorder, None);

        exam.begin().unwrap();
        exam.answer("right-a").unwrap();
        let err = exam.submit().await.unwrap_err();
        assert!(matches!(err, SessionError::Submit { .. }));
        assert_eq!(exam.phase(), Phase::Testing);
        assert_eq!(
            exam.error(),
            Some("could not submit answers: the server could not be reached, try again")
        );
        assert_eq!(exam.current_answer(), Some("right-a"));

        let result = exam.submit().await.unwrap();
        assert_eq!(result.correct, 1);
        assert_eq!(exam.phase(), Phase::Complete);
        assert!(exam.error().is_none());
        assert_eq!(recorder.batches.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_time_is_frozen_on_first_write() {
        let recorder = recorder(&["a", "b"], 0);
        let mut exam = exam(&recorder, None);

        exam.begin().unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        exam.answer("wrong").unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        exam.answer("right-a").unwrap();
        assert_eq!(exam.time_taken(0), Some(Duration::from_secs(3)));

        // revisiting does not restart the first-display clock
        exam.next().unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        exam.previous().unwrap();
        exam.next().unwrap();
        exam.answer("right-b").unwrap();
        assert_eq!(exam.time_taken(1), Some(Duration::from_secs(1)));

        let entries = exam.entries();
        assert_eq!(entries[0].selected_answer, "right-a");
        assert_eq!(entries[0].time_taken_ms, 3_000);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_counts_down() {
        let recorder = recorder(&["a"], 0);
        let mut exam = exam(&recorder, Some(60));

        assert_eq!(exam.time_remaining(), Some(Duration::from_secs(60)));
        exam.begin().unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(exam.time_remaining(), Some(Duration::from_secs(15)));
        assert!(!exam.is_time_up());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(exam.is_time_up());
    }

    #[tokio::test]
    async fn navigation_bounds_and_phases() {
        let recorder = recorder(&["a", "b", "c"], 0);
        let mut exam = exam(&recorder, None);

        assert!(exam.answer("x").is_err());
        assert!(exam.current().is_none());
        exam.begin().unwrap();
        assert!(exam.begin().is_err());

        assert_eq!(exam.previous().unwrap().id, "a");
        assert_eq!(exam.go_to(2).unwrap().id, "c");
        assert_eq!(exam.next().unwrap().id, "c");
        assert!(matches!(
            exam.go_to(3),
            Err(SessionError::OutOfRange { index: 3, len: 3 })
        ));

        exam.answer("right-c").unwrap();
        exam.submit().await.unwrap();
        assert!(exam.answer("x").is_err());
        assert!(exam.submit().await.is_err());

        exam.reset();
        assert_eq!(exam.phase(), Phase::Briefing);
        assert_eq!(exam.answered_count(), 0);
        assert!(exam.result().is_none());
    }
}
