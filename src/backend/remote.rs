use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{InferenceBackend, InferenceObserver, InferenceScope};
use crate::error::{AssistError, Result};
use crate::history::{ChatHistory, ChatTurn};
use crate::operation::{GenerationParams, Operation};

/// JSON body posted to the inference endpoint.
#[derive(Debug, Serialize)]
struct RemotePayload<'a> {
    prompt: &'a str,
    endpoint: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suffix: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    history: Vec<ChatTurn>,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteResponse {
    generated_text: String,
}

/// Backend that posts requests to a network inference endpoint.
///
/// General requests go to `api_url`; completion and insertion go to
/// `completion_url`. Both URLs are used exactly as configured.
pub struct RemoteInferencer {
    client: reqwest::Client,
    api_url: String,
    completion_url: String,
    history: ChatHistory,
    default_params: GenerationParams,
    observer: Arc<dyn InferenceObserver>,
}

impl RemoteInferencer {
    pub fn new(
        api_url: impl Into<String>,
        completion_url: impl Into<String>,
        timeout_secs: u64,
        history_capacity: usize,
        observer: Arc<dyn InferenceObserver>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self::with_client(
            client,
            api_url,
            completion_url,
            history_capacity,
            observer,
        ))
    }

    /// Use a preconfigured HTTP client (proxy, TLS or timeout settings).
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        completion_url: impl Into<String>,
        history_capacity: usize,
        observer: Arc<dyn InferenceObserver>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            completion_url: completion_url.into(),
            history: ChatHistory::new(history_capacity),
            default_params: GenerationParams::default(),
            observer,
        }
    }

    /// Params sent with generation, completion and insertion, which take none from the caller.
    pub fn with_default_params(mut self, params: GenerationParams) -> Self {
        self.default_params = params;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn completion_url(&self) -> &str {
        &self.completion_url
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    async fn request(
        &self,
        operation: Operation,
        prompt: &str,
        context: Option<&str>,
        suffix: Option<&str>,
        params: &GenerationParams,
    ) -> Result<String> {
        let scope = InferenceScope::begin(self.observer.clone());

        let url = if operation.uses_completion_endpoint() {
            &self.completion_url
        } else {
            &self.api_url
        };
        let history = if operation == Operation::SolidityAnswer {
            self.history.snapshot()
        } else {
            Vec::new()
        };
        let payload = RemotePayload {
            prompt,
            endpoint: operation,
            context: context.filter(|c| !c.is_empty()),
            suffix,
            history,
            params,
        };

        tracing::debug!(%operation, url = %url, "posting inference request");
        let result = self.send(url, &payload, params.stream_result, &scope).await;

        match &result {
            Ok(text) if !operation.uses_completion_endpoint() => self.history.push(prompt, text),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%operation, "inference request failed: {}", e);
                self.history.clear();
            }
        }
        result
    }

    async fn send(
        &self,
        url: &str,
        payload: &RemotePayload<'_>,
        stream: bool,
        scope: &InferenceScope,
    ) -> Result<String> {
        let mut response = self.client.post(url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistError::Api {
                status: status.as_u16(),
                body,
            });
        }

        if !stream {
            let body: RemoteResponse = response.json().await?;
            return Ok(body.generated_text);
        }

        let mut text = String::new();
        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            pending.extend_from_slice(&chunk);
            let piece = drain_utf8(&mut pending);
            if !piece.is_empty() {
                scope.stream(&piece);
                text.push_str(&piece);
            }
        }
        if !pending.is_empty() {
            let piece = String::from_utf8_lossy(&pending).into_owned();
            scope.stream(&piece);
            text.push_str(&piece);
        }
        Ok(text)
    }
}

/// Decode as much of `pending` as possible, replacing invalid bytes with
/// U+FFFD. Only an incomplete character at the very end is left in `pending`.
fn drain_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(s) => {
                out.push_str(s);
                pending.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + bad);
                    }
                    None => {
                        pending.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl InferenceBackend for RemoteInferencer {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.request(
            Operation::CodeGeneration,
            prompt,
            None,
            None,
            &self.default_params,
        )
        .await
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.request(
            Operation::CodeCompletion,
            prompt,
            None,
            None,
            &self.default_params,
        )
        .await
    }

    async fn answer(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.request(Operation::SolidityAnswer, prompt, None, None, params)
            .await
    }

    async fn explain(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.request(Operation::CodeExplaining, prompt, Some(context), None, params)
            .await
    }

    async fn explain_error(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.request(Operation::ErrorExplaining, prompt, Some(context), None, params)
            .await
    }

    async fn insert(&self, prefix: &str, suffix: &str) -> Result<String> {
        self.request(
            Operation::CodeInsertion,
            prefix,
            None,
            Some(suffix),
            &self.default_params,
        )
        .await
    }

    fn name(&self) -> &str {
        "remote"
    }
}
