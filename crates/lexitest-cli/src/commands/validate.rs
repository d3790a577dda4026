//! The `lexitest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use lexitest_core::parser;

pub fn execute(set_path: PathBuf) -> Result<()> {
    let sets = if set_path.is_dir() {
        parser::load_question_directory(&set_path)?
    } else {
        vec![parser::parse_question_set(&set_path)?]
    };

    let mut total_warnings = 0;

    for set in &sets {
        println!(
            "Question set: {} ({} questions, {} levels, {} engine)",
            set.name,
            set.questions.len(),
            set.effective_level_count(),
            set.engine
        );

        let warnings = parser::validate_question_set(set);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All question sets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
