//! REST client for the test platform.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lexitest_core::error::ApiError;
use lexitest_core::model::Question;
use lexitest_core::result::FinalResult;
use lexitest_core::traits::{
    AnswerReceipt, AnswerSubmission, BatchEntry, CompletionRequest, QuestionSource, ResultRecorder,
    SessionStart, StartRequest,
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP implementation of both collaborator traits.
pub struct HttpClient {
    base_url: String,
    token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HttpClient {
    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout_secs)
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body).into());
        }

        let body = response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout_secs)
            } else {
                ApiError::Decode(e.to_string())
            }
        })?;
        Ok(body)
    }
}

fn status_error(status: StatusCode, body: String) -> ApiError {
    match status.as_u16() {
        401 | 403 => ApiError::Unauthorized(body),
        404 => ApiError::NotFound(body),
        410 => ApiError::Expired(body),
        code => ApiError::Rejected {
            status: code,
            message: body,
        },
    }
}

#[derive(Deserialize)]
struct LevelPoolResponse {
    questions: Vec<Question>,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    answers: &'a [BatchEntry],
}

#[async_trait]
impl QuestionSource for HttpClient {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(code = ?request.code, test_type = ?request.test_type))]
    async fn start_session(&self, request: &StartRequest) -> anyhow::Result<SessionStart> {
        let start: SessionStart = self
            .send(self.client.post(self.url("/tests/start")).json(request))
            .await?;
        tracing::debug!(session = %start.session_id, questions = start.questions.len(), "session started");
        Ok(start)
    }

    #[instrument(skip(self))]
    async fn fetch_level_pool(&self, session_id: &str, level: u32) -> anyhow::Result<Vec<Question>> {
        let path = format!("/sessions/{session_id}/levels/{level}/questions");
        let response: LevelPoolResponse = self.send(self.client.get(self.url(&path))).await?;
        Ok(response.questions)
    }
}

#[async_trait]
impl ResultRecorder for HttpClient {
    #[instrument(skip(self, submission), fields(session = %submission.session_id, question = %submission.question_id))]
    async fn submit_answer(&self, submission: &AnswerSubmission) -> anyhow::Result<AnswerReceipt> {
        let path = format!("/sessions/{}/answers", submission.session_id);
        self.send(self.client.post(self.url(&path)).json(submission)).await
    }

    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    async fn submit_batch(&self, session_id: &str, entries: &[BatchEntry]) -> anyhow::Result<FinalResult> {
        let path = format!("/sessions/{session_id}/submit");
        self.send(
            self.client
                .post(self.url(&path))
                .json(&BatchRequest { answers: entries }),
        )
        .await
    }

    #[instrument(skip(self, request))]
    async fn complete_session(
        &self,
        session_id: &str,
        request: &CompletionRequest,
    ) -> anyhow::Result<FinalResult> {
        let path = format!("/sessions/{session_id}/complete");
        self.send(self.client.post(self.url(&path)).json(request)).await
    }
}
