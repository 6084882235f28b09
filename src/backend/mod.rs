pub mod companion;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::operation::{GenerationParams, Operation};

/// Lifecycle notification emitted by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceEvent {
    Started,
    /// Partial output of a streamed result.
    Stream(String),
    Finished,
}

/// Receives lifecycle notifications from the active backend.
pub trait InferenceObserver: Send + Sync {
    fn on_event(&self, event: InferenceEvent);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl InferenceObserver for NoopObserver {
    fn on_event(&self, _event: InferenceEvent) {}
}

/// Emits `Started` on creation and `Finished` on drop, so every exit path
/// of an inference call (including errors and dropped futures) reports completion.
pub(crate) struct InferenceScope {
    observer: Arc<dyn InferenceObserver>,
}

impl InferenceScope {
    pub(crate) fn begin(observer: Arc<dyn InferenceObserver>) -> Self {
        observer.on_event(InferenceEvent::Started);
        Self { observer }
    }

    pub(crate) fn stream(&self, chunk: &str) {
        self.observer
            .on_event(InferenceEvent::Stream(chunk.to_string()));
    }
}

impl Drop for InferenceScope {
    fn drop(&mut self) {
        self.observer.on_event(InferenceEvent::Finished);
    }
}

/// Fully-resolved inference call, as carried to a companion process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub operation: Operation,
    pub prompt: String,
    /// Surrounding code for explanations; the suffix for insertions.
    pub context: Option<String>,
    #[serde(default)]
    pub params: GenerationParams,
}

/// A provider of AI inference. Exactly one is active per assistant.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn answer(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    async fn explain(&self, prompt: &str, context: &str, params: &GenerationParams)
        -> Result<String>;

    async fn explain_error(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String>;

    async fn insert(&self, prefix: &str, suffix: &str) -> Result<String>;

    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &str;

    /// Route a resolved request to the matching capability method.
    async fn dispatch(&self, request: &InferenceRequest) -> Result<String> {
        let context = request.context.as_deref().unwrap_or("");
        match request.operation {
            Operation::CodeGeneration => self.generate(&request.prompt).await,
            Operation::CodeCompletion => self.complete(&request.prompt).await,
            Operation::SolidityAnswer => self.answer(&request.prompt, &request.params).await,
            Operation::CodeExplaining => {
                self.explain(&request.prompt, context, &request.params)
                    .await
            }
            Operation::ErrorExplaining => {
                self.explain_error(&request.prompt, context, &request.params)
                    .await
            }
            Operation::CodeInsertion => self.insert(&request.prompt, context).await,
        }
    }
}
