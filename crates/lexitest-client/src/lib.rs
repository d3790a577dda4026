//! lexitest-client: backends for the test engine.
//!
//! Implements the `QuestionSource` and `ResultRecorder` traits over the
//! platform's REST API, over a local question set file, and as a scripted
//! mock for tests.

pub mod config;
pub mod http;
pub mod local;
pub mod mock;

pub use config::{create_backend, load_config, load_config_from, Backend, LexitestConfig, ServerConfig};
pub use http::HttpClient;
pub use lexitest_core::error::ApiError;
pub use local::LocalBackend;
pub use mock::MockBackend;
