//! Mock backend for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use lexitest_core::error::ApiError;
use lexitest_core::model::Question;
use lexitest_core::result::FinalResult;
use lexitest_core::traits::{
    AnswerReceipt, AnswerSubmission, BatchEntry, CompletionRequest, QuestionSource, ResultRecorder,
    SessionStart, StartRequest,
};

/// A scripted backend for exercising sessions without a server.
///
/// Returns a fixed session on start, per-level pools on prefetch, and grades
/// against the questions it knows. Every call is recorded, and individual
/// operations can be made to fail.
pub struct MockBackend {
    start: SessionStart,
    level_pools: HashMap<u32, Vec<Question>>,
    fail_start: AtomicBool,
    fail_answers: AtomicBool,
    fail_completion: AtomicBool,
    /// Number of upcoming batch submits that fail.
    batch_failures: AtomicU32,
    start_calls: AtomicU32,
    fetches: Mutex<Vec<u32>>,
    submissions: Mutex<Vec<AnswerSubmission>>,
    batches: Mutex<Vec<Vec<BatchEntry>>>,
    completions: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a mock that starts `start` for any request.
    pub fn new(start: SessionStart) -> Self {
        Self {
            start,
            level_pools: HashMap::new(),
            fail_start: AtomicBool::new(false),
            fail_answers: AtomicBool::new(false),
            fail_completion: AtomicBool::new(false),
            batch_failures: AtomicU32::new(0),
            start_calls: AtomicU32::new(0),
            fetches: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        }
    }

    /// Serve `questions` when `level` is prefetched.
    pub fn with_level_pool(mut self, level: u32, questions: Vec<Question>) -> Self {
        self.level_pools.insert(level, questions);
        self
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Relaxed);
    }

    pub fn fail_answers(&self, fail: bool) {
        self.fail_answers.store(fail, Ordering::Relaxed);
    }

    pub fn fail_completion(&self, fail: bool) {
        self.fail_completion.store(fail, Ordering::Relaxed);
    }

    /// Make the next `count` batch submits fail.
    pub fn fail_batches(&self, count: u32) {
        self.batch_failures.store(count, Ordering::Relaxed);
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::Relaxed)
    }

    /// Levels requested through `fetch_level_pool`, in call order.
    pub fn fetches(&self) -> Vec<u32> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<AnswerSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<BatchEntry>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn completions(&self) -> Vec<CompletionRequest> {
        self.completions.lock().unwrap().clone()
    }

    fn known_questions(&self) -> impl Iterator<Item = &Question> {
        self.start
            .questions
            .iter()
            .chain(self.level_pools.values().flatten())
    }
}

#[async_trait]
impl QuestionSource for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_session(&self, request: &StartRequest) -> anyhow::Result<SessionStart> {
        self.start_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_start.load(Ordering::Relaxed) {
            let code = request.code.clone().unwrap_or_default();
            return Err(ApiError::NotFound(format!("test code {code}")).into());
        }
        Ok(self.start.clone())
    }

    async fn fetch_level_pool(&self, _session_id: &str, level: u32) -> anyhow::Result<Vec<Question>> {
        self.fetches.lock().unwrap().push(level);
        Ok(self.level_pools.get(&level).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ResultRecorder for MockBackend {
    async fn submit_answer(&self, submission: &AnswerSubmission) -> anyhow::Result<AnswerReceipt> {
        self.submissions.lock().unwrap().push(submission.clone());
        if self.fail_answers.load(Ordering::Relaxed) {
            return Err(ApiError::Rejected {
                status: 503,
                message: "answer service unavailable".into(),
            }
            .into());
        }
        let question = self
            .known_questions()
            .find(|q| q.id == submission.question_id)
            .ok_or_else(|| ApiError::NotFound(submission.question_id.clone()))?;
        Ok(AnswerReceipt {
            correct: question.is_correct(&submission.selected_answer),
            correct_answer: question.answer.clone(),
        })
    }

    async fn submit_batch(&self, _session_id: &str, entries: &[BatchEntry]) -> anyhow::Result<FinalResult> {
        self.batches.lock().unwrap().push(entries.to_vec());
        let failing = self
            .batch_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ApiError::Network("connection reset".into()).into());
        }
        Ok(FinalResult::grade_batch(&self.start.questions, entries))
    }

    async fn complete_session(
        &self,
        _session_id: &str,
        request: &CompletionRequest,
    ) -> anyhow::Result<FinalResult> {
        self.completions.lock().unwrap().push(request.clone());
        if self.fail_completion.load(Ordering::Relaxed) {
            return Err(ApiError::Timeout(30).into());
        }
        let submissions = self.submissions.lock().unwrap();
        let correct = submissions
            .iter()
            .filter(|s| {
                self.known_questions()
                    .any(|q| q.id == s.question_id && q.is_correct(&s.selected_answer))
            })
            .count();
        Ok(FinalResult {
            total: submissions.len(),
            correct,
            accuracy: lexitest_core::scoring::accuracy_percent(correct, submissions.len()),
            final_level: request.final_level,
            best_combo: request.best_combo,
            wrong_answers: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexitest_core::model::{EngineKind, QuestionKind, TimeMode};

    fn question(id: &str, level: u32) -> Question {
        Question {
            id: id.into(),
            word: id.into(),
            options: vec!["yes".into(), "no".into()],
            answer: "yes".into(),
            level,
            lesson: None,
            kind: QuestionKind::Choice,
        }
    }

    fn start() -> SessionStart {
        SessionStart {
            session_id: "mock-1".into(),
            name: "Mock".into(),
            questions: vec![question("a", 1), question("b", 1)],
            engine: EngineKind::Xp,
            time_mode: TimeMode::Total,
            question_budget: None,
            level_count: Some(3),
            time_limit_secs: None,
        }
    }

    #[tokio::test]
    async fn records_calls() {
        let mock = MockBackend::new(start()).with_level_pool(2, vec![question("c", 2)]);
        mock.start_session(&StartRequest::by_code("X")).await.unwrap();
        let pool = mock.fetch_level_pool("mock-1", 2).await.unwrap();
        assert_eq!(pool[0].id, "c");
        assert!(mock.fetch_level_pool("mock-1", 3).await.unwrap().is_empty());

        let receipt = mock
            .submit_answer(&AnswerSubmission {
                session_id: "mock-1".into(),
                question_id: "c".into(),
                selected_answer: "yes".into(),
                time_taken_ms: 10,
            })
            .await
            .unwrap();
        assert!(receipt.correct);

        assert_eq!(mock.start_calls(), 1);
        assert_eq!(mock.fetches(), vec![2, 3]);
        assert_eq!(mock.submissions().len(), 1);
    }

    #[tokio::test]
    async fn batch_failures_count_down() {
        let mock = MockBackend::new(start());
        mock.fail_batches(1);
        assert!(mock.submit_batch("mock-1", &[]).await.is_err());
        let result = mock.submit_batch("mock-1", &[]).await.unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.correct, 0);
        assert_eq!(mock.batches().len(), 2);
    }

    #[tokio::test]
    async fn injected_start_failure() {
        let mock = MockBackend::new(start());
        mock.fail_start(true);
        let err = mock.start_session(&StartRequest::by_code("GONE")).await.unwrap_err();
        assert!(err.to_string().contains("GONE"));
    }
}
