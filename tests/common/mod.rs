//! Recording fakes shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use assist_relay::backend::{InferenceBackend, InferenceEvent, InferenceObserver};
use assist_relay::error::{AssistError, Result};
use assist_relay::operation::{GenerationParams, Operation};
use assist_relay::sink::{Composer, LogEntry, LogKind, Logger};
use assist_relay::Assistant;

#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.kind == LogKind::Warning)
            .map(|e| e.value)
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.kind == LogKind::Log)
            .map(|e| e.value)
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

#[derive(Default)]
pub struct RecordingComposer {
    messages: Mutex<Vec<String>>,
}

impl RecordingComposer {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Composer for RecordingComposer {
    fn send(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<InferenceEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<InferenceEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl InferenceObserver for RecordingObserver {
    fn on_event(&self, event: InferenceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A call received by the fake backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operation: Operation,
    pub prompt: String,
    pub context: Option<String>,
    pub params: Option<GenerationParams>,
}

/// Backend that records calls and answers `"<reply>: <prompt>"`.
pub struct FakeBackend {
    observer: Arc<dyn InferenceObserver>,
    reply: String,
    calls: Mutex<Vec<Call>>,
    fail_with: Mutex<Option<String>>,
    stream_chunks: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(observer: Arc<dyn InferenceObserver>, reply: &str) -> Self {
        Self {
            observer,
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
            stream_chunks: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every subsequent call fail with a companion error.
    pub fn fail_with(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }

    /// Emit these chunks as stream events during each call.
    pub fn stream(&self, chunks: &[&str]) {
        *self.stream_chunks.lock().unwrap() = chunks.iter().map(|c| c.to_string()).collect();
    }

    /// Emit a lifecycle event as if an inference were starting or ending elsewhere.
    pub fn signal(&self, event: InferenceEvent) {
        self.observer.on_event(event);
    }

    fn handle(
        &self,
        operation: Operation,
        prompt: &str,
        context: Option<&str>,
        params: Option<&GenerationParams>,
    ) -> Result<String> {
        self.observer.on_event(InferenceEvent::Started);
        self.calls.lock().unwrap().push(Call {
            operation,
            prompt: prompt.to_string(),
            context: context.map(String::from),
            params: params.cloned(),
        });
        for chunk in self.stream_chunks.lock().unwrap().iter() {
            self.observer.on_event(InferenceEvent::Stream(chunk.clone()));
        }
        let outcome = match self.fail_with.lock().unwrap().clone() {
            Some(reason) => Err(AssistError::Companion { reason }),
            None => Ok(format!("{}: {}", self.reply, prompt)),
        };
        self.observer.on_event(InferenceEvent::Finished);
        outcome
    }
}

#[async_trait]
impl InferenceBackend for FakeBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.handle(Operation::CodeGeneration, prompt, None, None)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.handle(Operation::CodeCompletion, prompt, None, None)
    }

    async fn answer(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.handle(Operation::SolidityAnswer, prompt, None, Some(params))
    }

    async fn explain(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.handle(Operation::CodeExplaining, prompt, Some(context), Some(params))
    }

    async fn explain_error(
        &self,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.handle(Operation::ErrorExplaining, prompt, Some(context), Some(params))
    }

    async fn insert(&self, prefix: &str, suffix: &str) -> Result<String> {
        self.handle(Operation::CodeInsertion, prefix, Some(suffix), None)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct Harness {
    pub assistant: Assistant,
    pub backend: Arc<FakeBackend>,
    pub logger: Arc<RecordingLogger>,
    pub composer: Arc<RecordingComposer>,
}

pub fn harness(reply: &str) -> Harness {
    let logger = Arc::new(RecordingLogger::default());
    let composer = Arc::new(RecordingComposer::default());
    let mut handle = None;

    let assistant = Assistant::new(logger.clone(), composer.clone(), |observer| {
        let fake = Arc::new(FakeBackend::new(observer, reply));
        handle = Some(fake.clone());
        let backend: Arc<dyn InferenceBackend> = fake;
        backend
    });

    Harness {
        assistant,
        backend: handle.expect("backend factory runs during construction"),
        logger,
        composer,
    }
}
