//! End-to-end session tests against the mock backend.
//!
//! These drive full sessions (start → answer → complete/submit) through the
//! public API, the same path the CLI takes.

use std::sync::Arc;
use std::time::Duration;

use lexitest_client::{LocalBackend, MockBackend};
use lexitest_core::error::SessionError;
use lexitest_core::model::{EngineKind, Question, QuestionKind, TimeMode};
use lexitest_core::session::{Phase, SessionConfig, TestSession};
use lexitest_core::traits::{SessionStart, StartRequest};

fn question(id: &str, level: u32) -> Question {
    Question {
        id: id.into(),
        word: format!("word-{id}"),
        options: vec![format!("ans-{id}"), "decoy".into()],
        answer: format!("ans-{id}"),
        level,
        lesson: None,
        kind: QuestionKind::Choice,
    }
}

fn start(engine: EngineKind, time_mode: TimeMode, questions: Vec<Question>) -> SessionStart {
    SessionStart {
        session_id: "e2e".into(),
        name: "E2E".into(),
        questions,
        engine,
        time_mode,
        question_budget: Some(3),
        level_count: Some(15),
        time_limit_secs: None,
    }
}

async fn begin(mock: &Arc<MockBackend>) -> Result<TestSession, SessionError> {
    TestSession::start(
        mock.clone(),
        mock.clone(),
        &StartRequest::by_code("E2E"),
        SessionConfig::default(),
    )
    .await
}

#[tokio::test]
async fn e2e_per_question_budget() {
    let questions = (0..9).map(|i| question(&format!("q{i}"), 1 + i / 3)).collect();
    let mock = Arc::new(MockBackend::new(start(EngineKind::Xp, TimeMode::PerQuestion, questions)));

    let TestSession::PerQuestion(mut session) = begin(&mock).await.unwrap() else {
        panic!("expected a per-question session");
    };

    session.begin().unwrap();
    for correct in [true, true, false] {
        let question = session.current_question().unwrap().clone();
        let selected = if correct { question.answer.clone() } else { "decoy".into() };
        session.answer_timed(&selected, Duration::from_secs(1)).unwrap();
        session.advance().unwrap();
    }
    assert_eq!(session.phase(), Phase::Complete);

    let result = session.complete().await.unwrap();
    assert_eq!(result.total, 3);
    assert_eq!(result.correct, 2);
    assert!((result.accuracy - 66.7).abs() < 0.1);

    let submissions = mock.submissions();
    assert_eq!(submissions.len(), 3);
    let mut ids: Vec<_> = submissions.iter().map(|s| s.question_id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3, "no question asked twice");
    assert_eq!(mock.completions().len(), 1);
}

#[tokio::test]
async fn e2e_prefetch_fills_new_level() {
    let mock = Arc::new(
        MockBackend::new(start(
            EngineKind::Xp,
            TimeMode::PerQuestion,
            vec![question("a", 1), question("b", 1), question("c", 1), question("d", 2)],
        ))
        .with_level_pool(2, vec![question("x", 2), question("y", 2)]),
    );

    let TestSession::PerQuestion(mut session) = begin(&mock).await.unwrap() else {
        panic!("expected a per-question session");
    };

    session.begin().unwrap();
    let answer = session.current_question().unwrap().answer.clone();
    let feedback = session.answer_timed(&answer, Duration::from_millis(800)).unwrap();
    assert_eq!(feedback.level, 2);

    session.settle().await;
    assert_eq!(mock.fetches(), vec![2]);
    let next = session.advance().unwrap().unwrap();
    assert_eq!(next.level, 2);
}

#[tokio::test]
async fn e2e_answer_failures_are_silent() {
    let mock = Arc::new(MockBackend::new(start(
        EngineKind::Cursor,
        TimeMode::PerQuestion,
        vec![question("a", 1), question("b", 2), question("c", 3)],
    )));
    mock.fail_answers(true);
    mock.fail_completion(true);

    let TestSession::PerQuestion(mut session) = begin(&mock).await.unwrap() else {
        panic!("expected a per-question session");
    };

    session.begin().unwrap();
    let answer = session.current_question().unwrap().answer.clone();
    let feedback = session.answer_timed(&answer, Duration::from_secs(3)).unwrap();
    assert!(feedback.correct);

    let result = session.complete().await.unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.correct, 1);
}

#[tokio::test]
async fn e2e_exam_retry_after_failed_submit() {
    let mock = Arc::new(MockBackend::new(start(
        EngineKind::Sequential,
        TimeMode::Total,
        vec![question("a", 1), question("b", 1)],
    )));
    mock.fail_batches(1);

    let TestSession::Exam(mut exam) = begin(&mock).await.unwrap() else {
        panic!("expected an exam session");
    };

    exam.begin().unwrap();
    exam.answer("ans-a").unwrap();

    assert!(exam.submit().await.is_err());
    assert_eq!(exam.phase(), Phase::Testing);
    assert!(exam.error().is_some());

    let result = exam.submit().await.unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(result.correct, 1);

    let batches = mock.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[1][1].selected_answer, "");
}

#[tokio::test]
async fn e2e_start_failure() {
    let mock = Arc::new(MockBackend::new(start(
        EngineKind::Xp,
        TimeMode::PerQuestion,
        vec![question("a", 1)],
    )));
    mock.fail_start(true);

    let err = begin(&mock).await.unwrap_err();
    assert!(matches!(err, SessionError::Start { .. }));
    assert_eq!(err.to_string(), "could not start test: test code not found");
    assert_eq!(mock.start_calls(), 1);
}

#[tokio::test]
async fn e2e_offline_reset_reports_only_the_new_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("short.toml");
    std::fs::write(
        &path,
        r#"
[question_set]
id = "short"
name = "Short"
engine = "sequential"
question_budget = 2

[[questions]]
id = "s1"
word = "one"
options = ["uno", "dos"]
answer = "uno"

[[questions]]
id = "s2"
word = "two"
options = ["uno", "dos"]
answer = "dos"

[[questions]]
id = "s3"
word = "three"
options = ["tres", "dos"]
answer = "tres"
"#,
    )
    .unwrap();

    let local = Arc::new(LocalBackend::from_path(&path).unwrap());
    let TestSession::PerQuestion(mut session) =
        TestSession::start(local.clone(), local, &StartRequest::default(), SessionConfig::default())
            .await
            .unwrap()
    else {
        panic!("expected a per-question session");
    };

    session.begin().unwrap();
    session.answer_timed("nope", Duration::from_secs(1)).unwrap();
    session.settle().await;
    session.reset();

    session.begin().unwrap();
    for _ in 0..2 {
        let answer = session.current_question().unwrap().answer.clone();
        session.answer_timed(&answer, Duration::from_secs(1)).unwrap();
        session.advance().unwrap();
    }
    let result = session.complete().await.unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.correct, 2);
    assert!(result.wrong_answers.is_empty());
}
