//! TOML question set parser.
//!
//! Loads question sets from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{EngineKind, Question, QuestionKind, QuestionSet, TimeMode};

/// Intermediate TOML structure for parsing question set files.
#[derive(Debug, Deserialize)]
struct TomlQuestionFile {
    question_set: TomlQuestionSetHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestionSetHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    engine: Option<String>,
    #[serde(default)]
    time_mode: Option<String>,
    #[serde(default)]
    question_budget: Option<usize>,
    #[serde(default)]
    level_count: Option<u32>,
    #[serde(default)]
    time_limit_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    word: String,
    answer: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default = "default_level")]
    level: u32,
    #[serde(default)]
    lesson: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

fn default_level() -> u32 {
    1
}

fn parse_field<T: std::str::FromStr<Err = String>>(value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| v.parse().map_err(|e: String| anyhow::anyhow!("{}", e)))
        .transpose()
}

/// Parse a single TOML file into a `QuestionSet`.
pub fn parse_question_set(path: &Path) -> Result<QuestionSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question set file: {}", path.display()))?;

    parse_question_set_str(&content, path)
}

/// Parse a TOML string into a `QuestionSet`.
pub fn parse_question_set_str(content: &str, source_path: &Path) -> Result<QuestionSet> {
    let parsed: TomlQuestionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let header = parsed.question_set;
    let engine: Option<EngineKind> = parse_field(header.engine)?;
    let time_mode: Option<TimeMode> = parse_field(header.time_mode)?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let kind: Option<QuestionKind> =
                parse_field(q.kind).with_context(|| format!("question '{}'", q.id))?;
            Ok(Question {
                id: q.id,
                word: q.word,
                options: q.options,
                answer: q.answer,
                level: q.level,
                lesson: q.lesson,
                kind: kind.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionSet {
        id: header.id,
        name: header.name,
        description: header.description,
        engine: engine.unwrap_or_default(),
        time_mode: time_mode.unwrap_or_default(),
        question_budget: header.question_budget,
        level_count: header.level_count,
        time_limit_secs: header.time_limit_secs,
        questions,
    })
}

/// Recursively load all `.toml` question set files from a directory.
pub fn load_question_directory(dir: &Path) -> Result<Vec<QuestionSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            sets.extend(load_question_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question_set(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// A warning from question set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn set(message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            message: message.into(),
        }
    }

    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a question set for common issues.
pub fn validate_question_set(set: &QuestionSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if set.questions.is_empty() {
        warnings.push(ValidationWarning::set("question set has no questions"));
        return warnings;
    }

    let level_count = set.effective_level_count();
    let mut seen_ids = HashSet::new();
    for q in &set.questions {
        if !seen_ids.insert(q.id.as_str()) {
            warnings.push(ValidationWarning::question(&q.id, format!("duplicate question ID: {}", q.id)));
        }
        if q.kind == QuestionKind::Choice && !q.options.iter().any(|o| o == &q.answer) {
            warnings.push(ValidationWarning::question(&q.id, "answer is not among the options"));
        }
        if q.level == 0 {
            warnings.push(ValidationWarning::question(&q.id, "level must be at least 1"));
        } else if q.level > level_count {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("level {} is above the level count ({level_count})", q.level),
            ));
        }
    }

    // duplicates are dropped when the pool is built
    if let Some(budget) = set.question_budget {
        if set.time_mode == TimeMode::PerQuestion && budget > seen_ids.len() {
            warnings.push(ValidationWarning::set(format!(
                "question budget {budget} exceeds the {} unique questions",
                seen_ids.len()
            )));
        }
    }

    warnings
}
