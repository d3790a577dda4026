//! The `lexitest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("lexitest.toml").exists() {
        println!("lexitest.toml already exists, skipping.");
    } else {
        std::fs::write("lexitest.toml", SAMPLE_CONFIG)?;
        println!("Created lexitest.toml");
    }

    std::fs::create_dir_all("question-sets")?;
    let example_path = std::path::Path::new("question-sets/example.toml");
    if example_path.exists() {
        println!("question-sets/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTION_SET)?;
        println!("Created question-sets/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit lexitest.toml with your server URL and token");
    println!("  2. Run: lexitest validate --set question-sets/example.toml");
    println!("  3. Run: lexitest run --set question-sets/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# lexitest configuration

output_dir = "./lexitest-results"

[server]
base_url = "http://localhost:8080/api"
token = "${LEXITEST_TOKEN}"
timeout_secs = 30

[engine]
question_budget = 30
prefetch = true
prefetch_low_water = 3
"#;

const EXAMPLE_QUESTION_SET: &str = r#"[question_set]
id = "example"
name = "Example Vocabulary"
description = "A small set to get started"
engine = "xp"
question_budget = 4
level_count = 3

[[questions]]
id = "cat"
word = "cat"
options = ["кошка", "собака", "птица"]
answer = "кошка"
level = 1
lesson = "1"

[[questions]]
id = "house"
word = "house"
options = ["дом", "сад", "улица"]
answer = "дом"
level = 1
lesson = "1"

[[questions]]
id = "journey"
word = "journey"
options = ["путешествие", "работа", "отдых"]
answer = "путешествие"
level = 2
lesson = "2"

[[questions]]
id = "enough"
word = "достаточно"
answer = "enough"
kind = "spelling"
level = 2
lesson = "2"

[[questions]]
id = "reluctant"
word = "reluctant"
options = ["неохотный", "радостный", "громкий"]
answer = "неохотный"
level = 3
lesson = "3"
"#;
