//! Offline backend serving a question set file.
//!
//! Grades answers locally and keeps per-session tallies in memory, so the
//! engine can run without a server.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;

use lexitest_core::error::ApiError;
use lexitest_core::model::{Question, QuestionSet, WrongAnswer};
use lexitest_core::parser::parse_question_set;
use lexitest_core::result::FinalResult;
use lexitest_core::scoring::accuracy_percent;
use lexitest_core::traits::{
    AnswerReceipt, AnswerSubmission, BatchEntry, CompletionRequest, QuestionSource, ResultRecorder,
    SessionStart, StartRequest,
};

#[derive(Debug, Default)]
struct Tally {
    answered: usize,
    correct: usize,
    wrong_answers: Vec<WrongAnswer>,
}

/// Serves one question set. The set id doubles as its test code.
#[derive(Debug)]
pub struct LocalBackend {
    set: QuestionSet,
    tallies: Mutex<HashMap<String, Tally>>,
}

impl LocalBackend {
    pub fn new(set: QuestionSet) -> Self {
        Self {
            set,
            tallies: Mutex::new(HashMap::new()),
        }
    }

    /// Load the question set at `path`.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let set = parse_question_set(path)
            .with_context(|| format!("failed to load question set {}", path.display()))?;
        Ok(Self::new(set))
    }

    fn find(&self, question_id: &str) -> Option<&Question> {
        self.set.questions.iter().find(|q| q.id == question_id)
    }

    fn with_tally<T>(&self, session_id: &str, f: impl FnOnce(&mut Tally) -> T) -> anyhow::Result<T> {
        let mut tallies = self
            .tallies
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))?;
        let tally = tallies
            .get_mut(session_id)
            .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;
        Ok(f(tally))
    }
}

#[async_trait]
impl QuestionSource for LocalBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn start_session(&self, request: &StartRequest) -> anyhow::Result<SessionStart> {
        if let Some(code) = &request.code {
            if !code.eq_ignore_ascii_case(&self.set.id) {
                return Err(ApiError::NotFound(format!("test code {code}")).into());
            }
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        self.tallies
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))?
            .insert(session_id.clone(), Tally::default());

        Ok(SessionStart {
            session_id,
            name: self.set.name.clone(),
            questions: self.set.questions.clone(),
            engine: self.set.engine,
            time_mode: self.set.time_mode,
            question_budget: self.set.question_budget,
            level_count: Some(self.set.effective_level_count()),
            time_limit_secs: self.set.time_limit_secs,
        })
    }

    async fn fetch_level_pool(&self, _session_id: &str, level: u32) -> anyhow::Result<Vec<Question>> {
        Ok(self
            .set
            .questions
            .iter()
            .filter(|q| q.level == level)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultRecorder for LocalBackend {
    async fn submit_answer(&self, submission: &AnswerSubmission) -> anyhow::Result<AnswerReceipt> {
        let question = self
            .find(&submission.question_id)
            .ok_or_else(|| ApiError::NotFound(format!("question {}", submission.question_id)))?;
        let correct = question.is_correct(&submission.selected_answer);

        self.with_tally(&submission.session_id, |tally| {
            tally.answered += 1;
            if correct {
                tally.correct += 1;
            } else {
                tally.wrong_answers.push(WrongAnswer {
                    word: question.word.clone(),
                    correct_answer: question.answer.clone(),
                    selected_answer: submission.selected_answer.clone(),
                    time_taken_ms: Some(submission.time_taken_ms),
                });
            }
        })?;

        Ok(AnswerReceipt {
            correct,
            correct_answer: question.answer.clone(),
        })
    }

    async fn submit_batch(&self, session_id: &str, entries: &[BatchEntry]) -> anyhow::Result<FinalResult> {
        let result = FinalResult::grade_batch(&self.set.questions, entries);
        self.with_tally(session_id, |tally| {
            tally.answered = result.total;
            tally.correct = result.correct;
        })?;
        Ok(result)
    }

    async fn complete_session(
        &self,
        session_id: &str,
        request: &CompletionRequest,
    ) -> anyhow::Result<FinalResult> {
        self.with_tally(session_id, |tally| FinalResult {
            total: tally.answered,
            correct: tally.correct,
            accuracy: accuracy_percent(tally.correct, tally.answered),
            final_level: request.final_level,
            best_combo: request.best_combo,
            wrong_answers: tally.wrong_answers.clone(),
        })
    }
}
