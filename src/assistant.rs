use std::sync::Arc;

use crate::agent::{PassthroughAgent, PromptAgent};
use crate::backend::companion::CompanionClient;
use crate::backend::remote::RemoteInferencer;
use crate::backend::{InferenceBackend, InferenceEvent, InferenceObserver};
use crate::config::{default_socket_path, AssistConfig, BackendConfig};
use crate::error::{AssistError, Result};
use crate::gate::BusyGate;
use crate::operation::{GenerationParams, Operation, RequestDescriptor};
use crate::sink::{Composer, LogEntry, Logger};
use crate::slot::PendingSlot;

/// Warning logged when a guarded operation is refused.
pub const BUSY_WARNING: &str = "AI assistant is already busy!";

/// Wires backend lifecycle events to the busy gate and streams partial
/// output to the terminal logger.
struct GateObserver {
    gate: Arc<BusyGate>,
    logger: Arc<dyn Logger>,
}

impl InferenceObserver for GateObserver {
    fn on_event(&self, event: InferenceEvent) {
        match event {
            InferenceEvent::Started => self.gate.set(true),
            InferenceEvent::Finished => self.gate.set(false),
            InferenceEvent::Stream(chunk) => self.logger.log(LogEntry::log(chunk)),
        }
    }
}

/// Relays assist requests to the active backend.
///
/// Owns the busy gate, which refuses guarded operations while an inference
/// is outstanding, and the pending slot, which holds one request staged by
/// the chat UI until it is flushed.
pub struct Assistant {
    backend: Arc<dyn InferenceBackend>,
    gate: Arc<BusyGate>,
    slot: PendingSlot,
    logger: Arc<dyn Logger>,
    composer: Arc<dyn Composer>,
    agent: Arc<dyn PromptAgent>,
}

impl Assistant {
    /// Build an assistant around a backend created by `make_backend`, which
    /// receives the observer the backend must report lifecycle events to.
    pub fn new<F>(logger: Arc<dyn Logger>, composer: Arc<dyn Composer>, make_backend: F) -> Self
    where
        F: FnOnce(Arc<dyn InferenceObserver>) -> Arc<dyn InferenceBackend>,
    {
        let gate = Arc::new(BusyGate::new());
        let backend = make_backend(observer_for(&gate, &logger));
        Self::from_parts(gate, backend, logger, composer)
    }

    /// Select and start the backend named by `config`.
    ///
    /// `config.params` become the backend's params for the operations that
    /// take none from the caller. For a companion backend the companion is
    /// asked to load its models first; a refusal fails initialization.
    pub async fn initialize(
        config: &AssistConfig,
        logger: Arc<dyn Logger>,
        composer: Arc<dyn Composer>,
    ) -> Result<Self> {
        let gate = Arc::new(BusyGate::new());
        let observer = observer_for(&gate, &logger);

        let backend: Arc<dyn InferenceBackend> = match &config.backend {
            BackendConfig::Remote {
                api_url,
                completion_url,
                timeout_secs,
            } => Arc::new(RemoteInferencer::new(
                api_url.clone(),
                completion_url.clone(),
                *timeout_secs,
                config.history_capacity,
                observer,
            )?
            .with_default_params(config.params.clone())),
            BackendConfig::Companion {
                socket_path,
                timeout_secs,
                use_remote,
                general_model,
                completion_model,
            } => {
                let socket_path = socket_path.clone().unwrap_or_else(default_socket_path);
                let client = CompanionClient::new(socket_path, *timeout_secs, observer)
                    .with_default_params(config.params.clone());
                let ready = client
                    .initialize_model_backend(
                        *use_remote,
                        general_model.clone(),
                        completion_model.clone(),
                    )
                    .await?;
                if !ready {
                    return Err(AssistError::Companion {
                        reason: "companion refused to initialize its model backend".into(),
                    });
                }
                Arc::new(client)
            }
        };

        tracing::info!(backend = backend.name(), "assistant initialized");
        Ok(Self::from_parts(gate, backend, logger, composer))
    }

    fn from_parts(
        gate: Arc<BusyGate>,
        backend: Arc<dyn InferenceBackend>,
        logger: Arc<dyn Logger>,
        composer: Arc<dyn Composer>,
    ) -> Self {
        Self {
            backend,
            gate,
            slot: PendingSlot::new(),
            logger,
            composer,
            agent: Arc::new(PassthroughAgent),
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn PromptAgent>) -> Self {
        self.agent = agent;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Log the busy warning and return true if `operation` must abort.
    fn refuse_if_busy(&self, operation: Operation) -> bool {
        if operation.is_guarded() && self.gate.is_busy() {
            self.logger.log(LogEntry::warning(BUSY_WARNING));
            return true;
        }
        false
    }

    fn echo(&self, result: &str, params: &GenerationParams) {
        if params.terminal_output && !result.is_empty() {
            self.logger.log(LogEntry::warning(result));
        }
    }

    /// Generate code from a description. `Ok(None)` if the assistant is busy.
    pub async fn code_generation(&self, prompt: &str) -> Result<Option<String>> {
        if self.refuse_if_busy(Operation::CodeGeneration) {
            return Ok(None);
        }
        self.backend.generate(prompt).await.map(Some)
    }

    /// Inline completion. Not gated.
    pub async fn code_completion(&self, prompt: &str) -> Result<String> {
        self.backend.complete(prompt).await
    }

    /// Answer a chat question after passing it through the prompt agent.
    pub async fn solidity_answer(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Option<String>> {
        if self.refuse_if_busy(Operation::SolidityAnswer) {
            return Ok(None);
        }
        let prompt = self.agent.chat_command(prompt).await?;
        let result = self.backend.answer(&prompt, params).await?;
        self.echo(&result, params);
        Ok(Some(result))
    }

    pub async fn code_explaining(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<Option<String>> {
        if self.refuse_if_busy(Operation::CodeExplaining) {
            return Ok(None);
        }
        let result = self.backend.explain(prompt, context, params).await?;
        self.echo(&result, params);
        Ok(Some(result))
    }

    pub async fn error_explaining(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<Option<String>> {
        if self.refuse_if_busy(Operation::ErrorExplaining) {
            return Ok(None);
        }
        let result = self.backend.explain_error(prompt, context, params).await?;
        self.echo(&result, params);
        Ok(Some(result))
    }

    /// Fill-in-the-middle insertion between `prefix` and `suffix`. Not gated.
    pub async fn code_insertion(&self, prefix: &str, suffix: &str) -> Result<String> {
        self.backend.insert(prefix, suffix).await
    }

    /// Run the operation a descriptor names. Ungated operations always yield `Some`.
    pub async fn dispatch(
        &self,
        request: &RequestDescriptor,
        params: &GenerationParams,
    ) -> Result<Option<String>> {
        let prompt = request.prompt.as_str();
        let context = request.context.as_deref().unwrap_or("");
        match request.operation {
            Operation::CodeGeneration => self.code_generation(prompt).await,
            Operation::CodeCompletion => self.code_completion(prompt).await.map(Some),
            Operation::SolidityAnswer => self.solidity_answer(prompt, params).await,
            Operation::CodeExplaining => self.code_explaining(prompt, context, params).await,
            Operation::ErrorExplaining => self.error_explaining(prompt, context, params).await,
            Operation::CodeInsertion => self.code_insertion(prompt, context).await.map(Some),
        }
    }

    /// Stage a request for the chat UI and tell the composer what is being asked.
    ///
    /// `pipe_message` overrides the operation's default composer text. If a
    /// request is already staged this is a no-op and returns false.
    pub fn chat_pipe(
        &self,
        operation: Operation,
        prompt: &str,
        context: Option<&str>,
        pipe_message: Option<&str>,
    ) -> bool {
        let descriptor = RequestDescriptor::new(operation, prompt, context.map(String::from));
        if !self.slot.stage(descriptor) {
            tracing::info!(
                %operation,
                "chat request buffer is not empty; process the last request first"
            );
            return false;
        }

        match pipe_message
            .filter(|m| !m.is_empty())
            .or_else(|| operation.composer_prompt())
        {
            Some(message) => self.composer.send(message),
            None => tracing::debug!(%operation, "no composer prompt for staged operation"),
        }
        true
    }

    /// Run the staged request and clear the slot.
    ///
    /// The slot is emptied before the operation runs, so it ends up empty even
    /// when the operation fails. Returns an empty string if nothing was staged
    /// or the busy gate refused the call.
    pub async fn process_chat_request_buffer(&self, params: &GenerationParams) -> Result<String> {
        let Some(request) = self.slot.take() else {
            tracing::info!("chat request buffer is empty");
            return Ok(String::new());
        };
        let result = self.dispatch(&request, params).await?;
        Ok(result.unwrap_or_default())
    }

    pub fn is_chat_request_pending(&self) -> bool {
        self.slot.is_pending()
    }

    /// The staged request, if any, without consuming it.
    pub fn pending_request(&self) -> Option<RequestDescriptor> {
        self.slot.peek()
    }
}

fn observer_for(gate: &Arc<BusyGate>, logger: &Arc<dyn Logger>) -> Arc<dyn InferenceObserver> {
    Arc::new(GateObserver {
        gate: gate.clone(),
        logger: logger.clone(),
    })
}
