use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;

use crate::backend::{InferenceBackend, InferenceObserver, InferenceRequest, InferenceScope};
use crate::error::{AssistError, Result};
use crate::operation::{GenerationParams, Operation};

/// Upper bound on the bytes either side reads from one companion exchange.
pub const MAX_EXCHANGE_BYTES: u64 = 1_048_576;

/// Request line sent to the companion process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompanionRequest {
    /// Load the companion's models. Sent once when the assistant starts.
    Initialize {
        use_remote: bool,
        general_model: Option<String>,
        completion_model: Option<String>,
    },
    Infer(InferenceRequest),
}

/// Line sent back by the companion. An exchange ends with exactly one of
/// `Result`, `Error` or `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompanionMessage {
    Inference,
    Stream { value: String },
    InferenceDone,
    Result { value: String },
    Error { reason: String },
    Ready { ok: bool },
}

impl CompanionMessage {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompanionMessage::Result { .. }
                | CompanionMessage::Error { .. }
                | CompanionMessage::Ready { .. }
        )
    }
}

/// Backend that forwards requests to a local companion process over a Unix socket.
pub struct CompanionClient {
    socket_path: PathBuf,
    timeout_secs: u64,
    default_params: GenerationParams,
    observer: Arc<dyn InferenceObserver>,
}

impl CompanionClient {
    pub fn new(socket_path: PathBuf, timeout_secs: u64, observer: Arc<dyn InferenceObserver>) -> Self {
        Self {
            socket_path,
            timeout_secs,
            default_params: GenerationParams::default(),
            observer,
        }
    }

    /// Params sent with generation, completion and insertion, which take none from the caller.
    pub fn with_default_params(mut self, params: GenerationParams) -> Self {
        self.default_params = params;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Ask the companion to load its models. Returns the companion's verdict.
    pub async fn initialize_model_backend(
        &self,
        use_remote: bool,
        general_model: Option<String>,
        completion_model: Option<String>,
    ) -> Result<bool> {
        let request = CompanionRequest::Initialize {
            use_remote,
            general_model,
            completion_model,
        };
        match self.exchange(&request).await? {
            CompanionMessage::Ready { ok } => Ok(ok),
            CompanionMessage::Error { reason } => Err(AssistError::Companion { reason }),
            other => Err(AssistError::Ipc {
                reason: format!("unexpected reply to initialize: {:?}", other),
            }),
        }
    }

    async fn infer(
        &self,
        operation: Operation,
        prompt: &str,
        context: Option<&str>,
        params: &GenerationParams,
    ) -> Result<String> {
        let request = CompanionRequest::Infer(InferenceRequest {
            operation,
            prompt: prompt.to_string(),
            context: context.map(String::from),
            params: params.clone(),
        });
        match self.exchange(&request).await? {
            CompanionMessage::Result { value } => Ok(value),
            CompanionMessage::Error { reason } => Err(AssistError::Companion { reason }),
            other => Err(AssistError::Ipc {
                reason: format!("unexpected reply to {}: {:?}", operation, other),
            }),
        }
    }

    /// Send one request and read reply lines until a terminal message,
    /// relaying lifecycle lines to the observer on the way.
    async fn exchange(&self, request: &CompanionRequest) -> Result<CompanionMessage> {
        if !self.socket_path.exists() {
            return Err(AssistError::SocketNotFound {
                path: self.socket_path.clone(),
            });
        }

        let timeout = std::time::Duration::from_secs(self.timeout_secs);

        let result = tokio::time::timeout(timeout, async {
            let mut stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
                AssistError::Ipc {
                    reason: format!("connect failed: {}", e),
                }
            })?;

            let request_json = serde_json::to_string(request)?;
            stream
                .write_all(request_json.as_bytes())
                .await
                .map_err(|e| AssistError::Ipc {
                    reason: format!("write failed: {}", e),
                })?;
            stream
                .write_all(b"\n")
                .await
                .map_err(|e| AssistError::Ipc {
                    reason: format!("write newline failed: {}", e),
                })?;
            stream.shutdown().await.map_err(|e| AssistError::Ipc {
                reason: format!("shutdown write failed: {}", e),
            })?;

            let mut lines = BufReader::new(stream.take(MAX_EXCHANGE_BYTES)).lines();
            // Held while the companion reports an inference in flight; dropping
            // it reports completion even if the companion never does.
            let mut in_flight: Option<InferenceScope> = None;

            while let Some(line) = lines.next_line().await.map_err(|e| AssistError::Ipc {
                reason: format!("read failed: {}", e),
            })? {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let message: CompanionMessage =
                    serde_json::from_str(trimmed).map_err(|e| AssistError::Ipc {
                        reason: format!("invalid companion message: {}", e),
                    })?;

                if message.is_terminal() {
                    return Ok(message);
                }
                match message {
                    CompanionMessage::Inference => {
                        if in_flight.is_none() {
                            in_flight = Some(InferenceScope::begin(self.observer.clone()));
                        }
                    }
                    CompanionMessage::Stream { value } => {
                        if let Some(scope) = &in_flight {
                            scope.stream(&value);
                        }
                    }
                    CompanionMessage::InferenceDone => in_flight = None,
                    _ => {}
                }
            }

            Err(AssistError::Ipc {
                reason: "companion closed the connection without a result".into(),
            })
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(AssistError::CompanionTimeout {
                timeout_secs: self.timeout_secs,
            }),
        }
    }
}

#[async_trait]
impl InferenceBackend for CompanionClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.infer(
            Operation::CodeGeneration,
            prompt,
            None,
            &self.default_params,
        )
        .await
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.infer(
            Operation::CodeCompletion,
            prompt,
            None,
            &self.default_params,
        )
        .await
    }

    async fn answer(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.infer(Operation::SolidityAnswer, prompt, None, params)
            .await
    }

    async fn explain(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.infer(Operation::CodeExplaining, prompt, Some(context), params)
            .await
    }

    async fn explain_error(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.infer(Operation::ErrorExplaining, prompt, Some(context), params)
            .await
    }

    async fn insert(&self, prefix: &str, suffix: &str) -> Result<String> {
        self.infer(
            Operation::CodeInsertion,
            prefix,
            Some(suffix),
            &self.default_params,
        )
        .await
    }

    fn name(&self) -> &str {
        "companion"
    }
}

/// Companion-side server: hosts an inference backend on a Unix socket.
pub struct CompanionServer {
    socket_path: PathBuf,
    shutdown_signal: Arc<Notify>,
}

impl CompanionServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            shutdown_signal: Arc::new(Notify::new()),
        }
    }

    /// Accept connections until shutdown, answering each on its own task.
    pub async fn serve(&self, backend: Arc<dyn InferenceBackend>) -> Result<()> {
        let listener = self.bind()?;
        tracing::info!(
            socket = %self.socket_path.display(),
            backend = backend.name(),
            "companion listening"
        );

        let shutdown = self.shutdown_signal.clone();
        loop {
            let stream = tokio::select! {
                _ = shutdown.notified() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        tracing::warn!(error = %e, "companion could not accept a client");
                        continue;
                    }
                },
            };
            let backend = backend.clone();
            tokio::spawn(async move {
                if let Err(e) = answer_client(stream, backend).await {
                    tracing::warn!(error = %e, "companion client dropped");
                }
            });
        }

        tracing::info!("companion stopped accepting clients");
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    /// Handle that stops `serve` from another task.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown_signal.clone()
    }

    /// Replace a stale socket file and listen on a fresh one.
    fn bind(&self) -> Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(dir) = self.socket_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        UnixListener::bind(&self.socket_path).map_err(|e| AssistError::Ipc {
            reason: format!("cannot listen on {}: {}", self.socket_path.display(), e),
        })
    }
}

/// Read the single request line a client sends, capped at `MAX_EXCHANGE_BYTES`.
async fn read_request(reader: tokio::net::unix::OwnedReadHalf) -> Result<CompanionRequest> {
    let mut line = String::new();
    BufReader::new(reader.take(MAX_EXCHANGE_BYTES))
        .read_line(&mut line)
        .await
        .map_err(|e| AssistError::Ipc {
            reason: format!("request unreadable: {}", e),
        })?;
    serde_json::from_str(line.trim()).map_err(|e| AssistError::Ipc {
        reason: format!("malformed companion request: {}", e),
    })
}

async fn answer_client(stream: UnixStream, backend: Arc<dyn InferenceBackend>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();

    match read_request(reader).await? {
        CompanionRequest::Initialize {
            use_remote,
            general_model,
            completion_model,
        } => {
            tracing::info!(
                use_remote,
                general_model = general_model.as_deref().unwrap_or("-"),
                completion_model = completion_model.as_deref().unwrap_or("-"),
                "companion initialize"
            );
            write_message(&mut writer, &CompanionMessage::Ready { ok: true }).await?;
        }
        CompanionRequest::Infer(request) => {
            write_message(&mut writer, &CompanionMessage::Inference).await?;
            let outcome = backend.dispatch(&request).await;
            write_message(&mut writer, &CompanionMessage::InferenceDone).await?;
            let reply = match outcome {
                Ok(value) => CompanionMessage::Result { value },
                Err(e) => CompanionMessage::Error {
                    reason: e.to_string(),
                },
            };
            write_message(&mut writer, &reply).await?;
        }
    }

    writer.shutdown().await.map_err(|e| AssistError::Ipc {
        reason: format!("closing reply stream: {}", e),
    })
}

async fn write_message(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    message: &CompanionMessage,
) -> Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| AssistError::Ipc {
            reason: format!("reply write failed: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_messages() {
        assert!(CompanionMessage::Ready { ok: true }.is_terminal());
        assert!(CompanionMessage::Result { value: String::new() }.is_terminal());
        assert!(!CompanionMessage::InferenceDone.is_terminal());
        assert!(!CompanionMessage::Stream { value: "x".into() }.is_terminal());
    }

    #[test]
    fn infer_request_is_tagged_and_flat() {
        let request = CompanionRequest::Infer(InferenceRequest {
            operation: Operation::CodeExplaining,
            prompt: "explain".into(),
            context: Some("contract A {}".into()),
            params: GenerationParams::default(),
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "infer");
        assert_eq!(value["operation"], "code_explaining");
        assert_eq!(value["context"], "contract A {}");
    }
}
