//! Client configuration and backend factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lexitest_core::session::SessionConfig;
use lexitest_core::traits::{QuestionSource, ResultRecorder};

use crate::http::{HttpClient, DEFAULT_TIMEOUT_SECS};
use crate::local::LocalBackend;

/// Connection settings for the test platform.
///
/// Note: Custom Debug impl masks the token to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token, `${VAR}` references are expanded.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Top-level lexitest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexitestConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Session defaults the backend does not dictate.
    #[serde(default)]
    pub engine: SessionConfig,
    /// Output directory for session reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./lexitest-results")
}

impl Default for LexitestConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: SessionConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        // substituted values are not scanned again
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `lexitest.toml` in the current directory
/// 2. `~/.config/lexitest/config.toml`
///
/// Environment variable overrides: `LEXITEST_SERVER_URL`, `LEXITEST_TOKEN`.
pub fn load_config() -> Result<LexitestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LexitestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("lexitest.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content).with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LexitestConfig::default(),
    };

    if let Ok(url) = std::env::var("LEXITEST_SERVER_URL") {
        config.server.base_url = Some(url);
    }
    if let Ok(token) = std::env::var("LEXITEST_TOKEN") {
        config.server.token = Some(token);
    }

    config.server.base_url = config.server.base_url.as_deref().map(resolve_env_vars);
    config.server.token = config
        .server
        .token
        .as_deref()
        .map(resolve_env_vars)
        .filter(|t| !t.is_empty());

    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn parse_config(content: &str) -> Result<LexitestConfig> {
    Ok(toml::from_str(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("lexitest"))
}

/// A backend implementing both collaborator traits.
#[derive(Clone)]
pub struct Backend {
    pub source: Arc<dyn QuestionSource>,
    pub recorder: Arc<dyn ResultRecorder>,
}

impl Backend {
    pub fn new<B>(backend: B) -> Self
    where
        B: QuestionSource + ResultRecorder + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            source: backend.clone(),
            recorder: backend,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }
}

/// Create the backend for a run: offline when a question set is given,
/// otherwise the configured server.
pub fn create_backend(config: &LexitestConfig, question_set: Option<&Path>) -> Result<Backend> {
    if let Some(path) = question_set {
        return Ok(Backend::new(LocalBackend::from_path(path)?));
    }
    let base_url = config.server.base_url.as_deref().context(
        "no server configured: set server.base_url in lexitest.toml or LEXITEST_SERVER_URL, or pass --set",
    )?;
    Ok(Backend::new(HttpClient::new(
        base_url,
        config.server.token.clone(),
        config.server.timeout_secs,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_LEXITEST_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_LEXITEST_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_LEXITEST_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${_LEXITEST_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("open ${never closed"), "open ${never closed");
        std::env::remove_var("_LEXITEST_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_expand_values() {
        std::env::set_var("_LEXITEST_SELF_REF", "${_LEXITEST_SELF_REF}");
        assert_eq!(
            resolve_env_vars("a-${_LEXITEST_SELF_REF}-b"),
            "a-${_LEXITEST_SELF_REF}-b"
        );
        std::env::remove_var("_LEXITEST_SELF_REF");
    }

    #[test]
    fn default_config() {
        let config = LexitestConfig::default();
        assert!(config.server.base_url.is_none());
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.engine.question_budget, 30);
        assert!(config.engine.prefetch);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
output_dir = "results"

[server]
base_url = "https://tests.example.com/api"
token = "${LEXITEST_TOKEN}"
timeout_secs = 10

[engine]
question_budget = 20
level_count = 15
prefetch = false
"#;
        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.server.timeout_secs, 10);
        assert_eq!(config.engine.question_budget, 20);
        assert_eq!(config.engine.level_count, Some(15));
        assert!(!config.engine.prefetch);
        assert_eq!(config.engine.prefetch_low_water, 3);
        assert_eq!(config.output_dir, PathBuf::from("results"));
    }

    #[test]
    fn debug_masks_token() {
        let server = ServerConfig {
            base_url: None,
            token: Some("sk-secret".into()),
            timeout_secs: 5,
        };
        assert!(!format!("{server:?}").contains("sk-secret"));
    }

    #[test]
    fn load_explicit_path_and_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexitest.toml");
        std::fs::write(&path, "[server]\ntoken = \"${_LEXITEST_TOKEN_REF}\"\n").unwrap();

        std::env::set_var("_LEXITEST_TOKEN_REF", "from-env");
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.server.token.as_deref(), Some("from-env"));
        std::env::remove_var("_LEXITEST_TOKEN_REF");

        let config = load_config_from(Some(&path)).unwrap();
        assert!(config.server.token.is_none(), "empty token is dropped");
    }

    #[test]
    fn missing_explicit_config_fails() {
        let err = load_config_from(Some(Path::new("/nonexistent/lexitest.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn backend_requires_server_or_set() {
        let err = create_backend(&LexitestConfig::default(), None).err().unwrap();
        assert!(err.to_string().contains("no server configured"));

        let mut config = LexitestConfig::default();
        config.server.base_url = Some("http://localhost:8080".into());
        let backend = create_backend(&config, None).unwrap();
        assert_eq!(backend.name(), "http");
    }
}
