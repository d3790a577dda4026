//! The `lexitest simulate` command.
//!
//! Drives a session over an offline question set with a scripted answer
//! sequence and prints how the engine moved after every answer.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use lexitest_client::{Backend, LocalBackend};
use lexitest_core::model::{Question, QuestionKind};
use lexitest_core::progression::ProgressionState;
use lexitest_core::report::SessionReport;
use lexitest_core::session::{AdaptiveSession, SessionConfig, TestSession};
use lexitest_core::traits::StartRequest;

use crate::commands::report::summary_line;

const DEFAULT_ANSWER_SECS: f64 = 2.0;

/// One scripted answer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scripted {
    correct: bool,
    elapsed: Duration,
}

fn parse_script(script: &str) -> Result<Vec<Scripted>> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            let correct = match chars.next() {
                Some('c' | 'C') => true,
                Some('w' | 'W') => false,
                _ => anyhow::bail!("invalid answer '{token}': expected c or w"),
            };
            let secs = chars.as_str();
            let secs = if secs.is_empty() {
                DEFAULT_ANSWER_SECS
            } else {
                secs.parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .with_context(|| format!("invalid answer time in '{token}'"))?
            };
            Ok(Scripted {
                correct,
                elapsed: Duration::from_secs_f64(secs),
            })
        })
        .collect()
}

fn wrong_choice(question: &Question) -> String {
    match question.kind {
        QuestionKind::Choice => question
            .options
            .iter()
            .find(|o| **o != question.answer)
            .cloned()
            .unwrap_or_else(|| "-".to_string()),
        QuestionKind::Spelling => format!("{}x", question.answer),
    }
}

fn describe_state(state: &ProgressionState) -> String {
    match state {
        ProgressionState::Cursor { cursor, level } => format!("L{level} cursor {cursor:.1}"),
        ProgressionState::Xp { xp, level, threshold } => format!("L{level} {xp}/{threshold} xp"),
        ProgressionState::Sequential { level } => format!("L{level}"),
    }
}

pub async fn execute(set_path: PathBuf, answers: String, output: Option<PathBuf>) -> Result<()> {
    let script = parse_script(&answers)?;
    anyhow::ensure!(!script.is_empty(), "answer script is empty");

    let backend = Backend::new(LocalBackend::from_path(&set_path)?);
    let session = TestSession::start(
        backend.source.clone(),
        backend.recorder.clone(),
        &StartRequest::default(),
        SessionConfig::default(),
    )
    .await?;

    let report = match session {
        TestSession::PerQuestion(mut session) => simulate_adaptive(&mut session, &script).await?,
        TestSession::Exam(mut exam) => {
            exam.begin()?;
            for (i, step) in script.iter().enumerate().take(exam.len()) {
                let question = exam.go_to(i)?.clone();
                let selected = if step.correct {
                    question.answer.clone()
                } else {
                    wrong_choice(&question)
                };
                exam.answer(&selected)?;
            }
            let result = exam.submit().await?;
            SessionReport::from_exam(&exam, result)
        }
    };

    println!("\n{}", summary_line(&report));

    if let Some(path) = output {
        report.save_json(&path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

async fn simulate_adaptive(session: &mut AdaptiveSession, script: &[Scripted]) -> Result<SessionReport> {
    let mut table = Table::new();
    table.set_header(vec!["#", "Word", "Level", "Answer", "Time", "XP", "State", "Change"]);

    let mut next = session.begin()?.cloned();
    for step in script {
        let Some(question) = next.take() else {
            break;
        };
        let selected = if step.correct {
            question.answer.clone()
        } else {
            wrong_choice(&question)
        };
        let feedback = session.answer_timed(&selected, step.elapsed)?;

        table.add_row(vec![
            Cell::new(session.progress().answered),
            Cell::new(&question.word),
            Cell::new(question.level),
            Cell::new(if feedback.correct { "correct" } else { "wrong" }),
            Cell::new(format!("{:.1}s", step.elapsed.as_secs_f64())),
            Cell::new(feedback.xp_delta.map(|d| format!("{d:+}")).unwrap_or_default()),
            Cell::new(describe_state(&session.progression_state())),
            Cell::new(feedback.level_change.map(|c| c.to_string()).unwrap_or_default()),
        ]);

        next = session.advance()?.cloned();
    }

    println!(
        "{} [{} engine, budget {}, {} levels]",
        session.name(),
        session.engine(),
        session.budget(),
        session.level_count()
    );
    println!("{table}");

    let result = session.complete().await?;
    Ok(SessionReport::from_adaptive(session, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script() {
        let script = parse_script("c, w5,C0.5 ,").unwrap();
        assert_eq!(script.len(), 3);
        assert!(script[0].correct);
        assert_eq!(script[0].elapsed, Duration::from_secs(2));
        assert!(!script[1].correct);
        assert_eq!(script[1].elapsed, Duration::from_secs(5));
        assert_eq!(script[2].elapsed, Duration::from_millis(500));
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!(parse_script("x2").is_err());
        assert!(parse_script("c-1").is_err());
        assert!(parse_script("cfast").is_err());
    }
}
