//! The `lexitest run` command.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use lexitest_client::{create_backend, load_config_from};
use lexitest_core::exam::ExamSession;
use lexitest_core::model::{Question, QuestionKind};
use lexitest_core::report::SessionReport;
use lexitest_core::result::FinalResult;
use lexitest_core::session::{AdaptiveSession, TestSession};
use lexitest_core::traits::StartRequest;

use crate::commands::report::summary_line;

/// Line-oriented console input.
struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Read one trimmed line. `None` at end of input.
    async fn read(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        let line = self.lines.next_line().await.context("failed to read input")?;
        Ok(line.map(|l| l.trim().to_string()))
    }
}

pub async fn execute(
    set: Option<PathBuf>,
    code: Option<String>,
    test_type: Option<String>,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let request = match (&code, &test_type) {
        (Some(code), _) => StartRequest::by_code(code),
        (None, Some(test_type)) => StartRequest::by_type(test_type),
        (None, None) if set.is_some() => StartRequest::default(),
        (None, None) => anyhow::bail!("pass --set <file>, --code <code>, or --test-type <type>"),
    };

    let backend = create_backend(&config, set.as_deref())?;
    let session = TestSession::start(
        backend.source.clone(),
        backend.recorder.clone(),
        &request,
        config.engine.clone(),
    )
    .await?;

    let mut console = Console::new();
    let report = match session {
        TestSession::PerQuestion(mut session) => {
            let result = take_adaptive(&mut session, &mut console).await?;
            SessionReport::from_adaptive(&session, result)
        }
        TestSession::Exam(mut exam) => {
            let result = take_exam(&mut exam, &mut console).await?;
            SessionReport::from_exam(&exam, result)
        }
    };

    println!("\n{}", summary_line(&report));
    for w in &report.result.wrong_answers {
        println!("  {} -> {}", w.word, w.correct_answer);
    }

    let output_dir = output.unwrap_or(config.output_dir);
    std::fs::create_dir_all(&output_dir)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let path = output_dir.join(format!("session-{timestamp}.json"));
    report.save_json(&path)?;
    eprintln!("Report saved to: {}", path.display());

    Ok(())
}

fn show_question(question: &Question, header: &str) {
    println!("\n{header}  {}", question.word);
    match question.kind {
        QuestionKind::Choice => {
            for (i, option) in question.options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
        QuestionKind::Spelling => println!("  (type the word)"),
    }
}

/// Map an option number to its text. Anything else is taken literally.
fn resolve_answer(question: &Question, input: &str) -> String {
    if question.kind == QuestionKind::Choice {
        if let Ok(n) = input.parse::<usize>() {
            if let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i)) {
                return option.clone();
            }
        }
    }
    input.to_string()
}

async fn take_adaptive(session: &mut AdaptiveSession, console: &mut Console) -> Result<FinalResult> {
    println!(
        "{} ({} questions, {} engine). Answer with the option number, q to stop.",
        session.name(),
        session.budget(),
        session.engine()
    );
    session.begin()?;

    while let Some(question) = session.current_question().cloned() {
        let header = format!(
            "[{}/{}] level {}",
            session.progress().answered + 1,
            session.budget(),
            session.level()
        );
        show_question(&question, &header);

        let Some(input) = console.read("> ").await? else {
            break;
        };
        if input.eq_ignore_ascii_case("q") {
            break;
        }

        let feedback = session.answer(&resolve_answer(&question, &input))?;
        if feedback.correct {
            print!("Correct");
        } else {
            print!("Wrong, the answer is {}", feedback.correct_answer);
        }
        if let Some(xp) = feedback.xp_delta {
            print!(" ({xp:+} xp)");
        }
        if feedback.combo >= 3 {
            print!(", combo {}", feedback.combo);
        }
        println!();
        if let Some(change) = feedback.level_change {
            println!("{change}");
        }

        if session.advance()?.is_none() {
            break;
        }
    }

    Ok(session.complete().await?)
}

async fn take_exam(exam: &mut ExamSession, console: &mut Console) -> Result<FinalResult> {
    println!(
        "{} ({} questions). Answer with the option number; n/p to move, g <n> to jump, s to submit.",
        exam.name(),
        exam.len()
    );
    exam.begin()?;

    loop {
        if exam.is_time_up() {
            println!("Time is up, submitting.");
            return Ok(exam.submit().await?);
        }

        let Some(question) = exam.current().cloned() else {
            anyhow::bail!("exam has no current question");
        };
        let mut header = format!("[{}/{}]", exam.index() + 1, exam.len());
        if let Some(left) = exam.time_remaining() {
            header.push_str(&format!(" {}s left", left.as_secs()));
        }
        show_question(&question, &header);
        if let Some(answer) = exam.current_answer() {
            println!("  current answer: {answer}");
        }

        let Some(input) = console.read("> ").await? else {
            return Ok(exam.submit().await?);
        };

        match input.as_str() {
            "n" => {
                exam.next()?;
            }
            "p" => {
                exam.previous()?;
            }
            "s" => {
                let unanswered = exam.unanswered().len();
                if unanswered > 0 {
                    println!("{unanswered} question(s) left unanswered.");
                }
                match exam.submit().await {
                    Ok(result) => return Ok(result),
                    Err(e) => eprintln!("{e}. Enter s to try again."),
                }
            }
            jump if jump.starts_with("g ") => {
                let target = jump[2..].trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1));
                match target.map(|i| exam.go_to(i)) {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => eprintln!("{e}"),
                    None => eprintln!("usage: g <question number>"),
                }
            }
            "" => {}
            answer => {
                exam.answer(&resolve_answer(&question, answer))?;
                if exam.index() + 1 < exam.len() {
                    exam.next()?;
                }
            }
        }
    }
}
