//! The `lexitest report` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use lexitest_core::report::SessionReport;

pub fn execute(path: PathBuf, format: String) -> Result<()> {
    let report = SessionReport::load_json(&path)?;

    match format.as_str() {
        "markdown" | "md" => print!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_text(&report),
        other => anyhow::bail!("unknown format: {other} (expected text, markdown, or json)"),
    }

    Ok(())
}

/// Summary line shared with `run` and `simulate`.
pub fn summary_line(report: &SessionReport) -> String {
    let r = &report.result;
    let mut line = format!("Score: {}/{} ({:.1}%)", r.correct, r.total, r.accuracy);
    if let Some(level) = r.final_level {
        line.push_str(&format!(", final level {level}"));
    }
    if let Some(combo) = r.best_combo {
        line.push_str(&format!(", best combo {combo}"));
    }
    line
}

fn print_text(report: &SessionReport) {
    println!(
        "{} [{}] {}",
        report.question_set,
        report.engine.map(|e| e.to_string()).unwrap_or_else(|| "exam".into()),
        report.created_at.format("%Y-%m-%d %H:%M")
    );
    println!("{}", summary_line(report));

    if !report.result.wrong_answers.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Word", "Correct", "Your answer"]);
        for w in &report.result.wrong_answers {
            table.add_row(vec![
                Cell::new(&w.word),
                Cell::new(&w.correct_answer),
                Cell::new(if w.selected_answer.is_empty() {
                    "(no answer)"
                } else {
                    w.selected_answer.as_str()
                }),
            ]);
        }
        println!("\nWords to review:\n{table}");
    }
}
