//! Orchestrator behavior: busy gate, pending slot, dispatch and echo.

mod common;

use std::sync::Arc;

use assist_relay::agent::PromptAgent;
use assist_relay::assistant::BUSY_WARNING;
use assist_relay::backend::InferenceEvent;
use assist_relay::error::{AssistError, Result};
use assist_relay::operation::{GenerationParams, Operation, RequestDescriptor};

use common::harness;

fn params() -> GenerationParams {
    GenerationParams::default()
}

// ---------------------------------------------------------------------------
// Pending slot through the assistant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stage_sends_default_composer_message() {
    let h = harness("answer");

    assert!(h
        .assistant
        .chat_pipe(Operation::SolidityAnswer, "What is a mapping?", None, None));

    assert_eq!(h.composer.messages(), vec!["Answer the following question"]);
    assert!(h.assistant.is_chat_request_pending());
    assert_eq!(
        h.assistant.pending_request(),
        Some(RequestDescriptor::new(
            Operation::SolidityAnswer,
            "What is a mapping?",
            None
        ))
    );
}

#[tokio::test]
async fn second_stage_is_dropped() {
    let h = harness("answer");

    h.assistant
        .chat_pipe(Operation::SolidityAnswer, "What is a mapping?", None, None);
    let staged = h.assistant.chat_pipe(
        Operation::CodeExplaining,
        "explain this",
        Some("contract A {}"),
        None,
    );

    assert!(!staged);
    assert_eq!(h.composer.messages().len(), 1);
    let pending = h.assistant.pending_request().unwrap();
    assert_eq!(pending.operation, Operation::SolidityAnswer);
    assert_eq!(pending.prompt, "What is a mapping?");
}

#[tokio::test]
async fn only_first_of_many_stages_is_kept() {
    let h = harness("answer");

    for i in 0..5 {
        h.assistant.chat_pipe(
            Operation::ErrorExplaining,
            &format!("error {i}"),
            None,
            None,
        );
    }

    assert_eq!(h.composer.messages(), vec!["Explain the error"]);
    assert_eq!(h.assistant.pending_request().unwrap().prompt, "error 0");
}

#[tokio::test]
async fn flush_invokes_staged_operation_and_empties_slot() {
    let h = harness("answer");

    h.assistant
        .chat_pipe(Operation::SolidityAnswer, "What is a mapping?", None, None);
    let result = h
        .assistant
        .process_chat_request_buffer(&params())
        .await
        .unwrap();

    assert_eq!(result, "answer: What is a mapping?");
    assert!(!h.assistant.is_chat_request_pending());

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, Operation::SolidityAnswer);
    assert_eq!(calls[0].prompt, "What is a mapping?");
}

#[tokio::test]
async fn flush_passes_context_and_params() {
    let h = harness("explained");
    let flush_params = params().with_terminal_output(true);

    h.assistant.chat_pipe(
        Operation::CodeExplaining,
        "what does this do",
        Some("contract A {}"),
        None,
    );
    h.assistant
        .process_chat_request_buffer(&flush_params)
        .await
        .unwrap();

    let calls = h.backend.calls();
    assert_eq!(calls[0].context.as_deref(), Some("contract A {}"));
    assert_eq!(calls[0].params.as_ref(), Some(&flush_params));
}

#[tokio::test]
async fn flush_insertion_uses_context_as_suffix() {
    let h = harness("inserted");

    h.assistant.chat_pipe(
        Operation::CodeInsertion,
        "function f() {",
        Some("}"),
        None,
    );
    let result = h
        .assistant
        .process_chat_request_buffer(&params())
        .await
        .unwrap();

    assert_eq!(result, "inserted: function f() {");
    let calls = h.backend.calls();
    assert_eq!(calls[0].operation, Operation::CodeInsertion);
    assert_eq!(calls[0].context.as_deref(), Some("}"));
}

#[tokio::test]
async fn flush_empty_slot_returns_empty_string() {
    let h = harness("answer");

    let result = h
        .assistant
        .process_chat_request_buffer(&params())
        .await
        .unwrap();

    assert_eq!(result, "");
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn flush_clears_slot_even_when_operation_fails() {
    let h = harness("answer");
    h.backend.fail_with("model crashed");

    h.assistant
        .chat_pipe(Operation::CodeExplaining, "explain", None, None);
    let err = h
        .assistant
        .process_chat_request_buffer(&params())
        .await
        .unwrap_err();

    assert!(matches!(err, AssistError::Companion { ref reason } if reason == "model crashed"));
    assert!(!h.assistant.is_chat_request_pending());
    // Slot can be used again
    assert!(h
        .assistant
        .chat_pipe(Operation::CodeExplaining, "again", None, None));
}

#[tokio::test]
async fn pipe_message_overrides_default() {
    let h = harness("answer");

    h.assistant.chat_pipe(
        Operation::CodeExplaining,
        "explain",
        None,
        Some("Explain the selected function"),
    );

    assert_eq!(h.composer.messages(), vec!["Explain the selected function"]);
}

#[tokio::test]
async fn empty_pipe_message_falls_back_to_default() {
    let h = harness("answer");

    h.assistant
        .chat_pipe(Operation::CodeExplaining, "explain", None, Some(""));

    assert_eq!(h.composer.messages(), vec!["Explain the current code"]);
}

#[tokio::test]
async fn operation_without_default_prompt_is_staged_silently() {
    let h = harness("code");

    assert!(h
        .assistant
        .chat_pipe(Operation::CodeGeneration, "an ERC20 token", None, None));

    assert!(h.composer.messages().is_empty());
    assert!(h.assistant.is_chat_request_pending());
    let result = h
        .assistant
        .process_chat_request_buffer(&params())
        .await
        .unwrap();
    assert_eq!(result, "code: an ERC20 token");
}

#[test]
fn concurrent_staging_keeps_one_request() {
    let h = Arc::new(harness("answer"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let h = h.clone();
            std::thread::spawn(move || {
                h.assistant.chat_pipe(
                    Operation::SolidityAnswer,
                    &format!("question {i}"),
                    None,
                    None,
                )
            })
        })
        .collect();

    let staged = handles
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|staged| *staged)
        .count();

    assert_eq!(staged, 1);
    assert_eq!(h.composer.messages().len(), 1);

    let result = tokio_test::block_on(h.assistant.process_chat_request_buffer(&params())).unwrap();
    assert!(result.starts_with("answer: question "));
    assert!(!h.assistant.is_chat_request_pending());
}

// ---------------------------------------------------------------------------
// Busy gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gate_follows_backend_lifecycle() {
    let h = harness("answer");
    assert!(!h.assistant.is_busy());

    h.backend.signal(InferenceEvent::Started);
    assert!(h.assistant.is_busy());

    h.backend.signal(InferenceEvent::Finished);
    assert!(!h.assistant.is_busy());
}

#[tokio::test]
async fn guarded_operations_abort_while_busy() {
    let h = harness("answer");
    h.backend.signal(InferenceEvent::Started);

    assert_eq!(h.assistant.code_generation("token").await.unwrap(), None);
    assert_eq!(
        h.assistant
            .solidity_answer("What is a mapping?", &params())
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        h.assistant
            .code_explaining("explain", "", &params())
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        h.assistant
            .error_explaining("error", "", &params())
            .await
            .unwrap(),
        None
    );

    assert!(h.backend.calls().is_empty());
    assert_eq!(h.logger.warnings(), vec![BUSY_WARNING; 4]);
}

#[tokio::test]
async fn busy_abort_logs_exactly_one_warning() {
    let h = harness("answer");
    h.backend.signal(InferenceEvent::Started);

    let result = h.assistant.code_generation("token").await.unwrap();

    assert!(result.is_none());
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.logger.entries().len(), 1);
    assert_eq!(h.logger.warnings(), vec![BUSY_WARNING]);
}

#[tokio::test]
async fn completion_and_insertion_ignore_gate() {
    let h = harness("done");
    h.backend.signal(InferenceEvent::Started);

    let completion = h.assistant.code_completion("uint256 x =").await.unwrap();
    let insertion = h.assistant.code_insertion("a", "b").await.unwrap();

    assert_eq!(completion, "done: uint256 x =");
    assert_eq!(insertion, "done: a");
    assert!(h.logger.warnings().is_empty());
    // The fake's own lifecycle cleared the gate
    assert!(!h.assistant.is_busy());
}

#[tokio::test]
async fn flush_while_busy_returns_empty_and_clears_slot() {
    let h = harness("answer");
    h.assistant
        .chat_pipe(Operation::SolidityAnswer, "What is a mapping?", None, None);
    h.backend.signal(InferenceEvent::Started);

    let result = h
        .assistant
        .process_chat_request_buffer(&params())
        .await
        .unwrap();

    assert_eq!(result, "");
    assert!(!h.assistant.is_chat_request_pending());
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.logger.warnings(), vec![BUSY_WARNING]);
}

#[tokio::test]
async fn gate_stays_set_without_completion_signal() {
    let h = harness("answer");
    h.backend.signal(InferenceEvent::Started);

    for _ in 0..3 {
        assert!(h.assistant.code_generation("x").await.unwrap().is_none());
    }
    assert!(h.assistant.is_busy());
}

// ---------------------------------------------------------------------------
// Echo, streaming, prompt agent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_output_echoes_result() {
    let h = harness("answer");

    h.assistant
        .solidity_answer("What is a mapping?", &params().with_terminal_output(true))
        .await
        .unwrap();
    h.assistant
        .code_explaining("quiet", "", &params())
        .await
        .unwrap();

    assert_eq!(h.logger.warnings(), vec!["answer: What is a mapping?"]);
}

#[tokio::test]
async fn stream_chunks_reach_logger() {
    let h = harness("answer");
    h.backend.stream(&["A mapping ", "is a hash table."]);

    h.assistant
        .solidity_answer("What is a mapping?", &params())
        .await
        .unwrap();

    assert_eq!(h.logger.logs(), vec!["A mapping ", "is a hash table."]);
}

struct PrefixAgent;

#[async_trait::async_trait]
impl PromptAgent for PrefixAgent {
    async fn chat_command(&self, prompt: &str) -> Result<String> {
        Ok(format!("[workspace] {prompt}"))
    }
}

#[tokio::test]
async fn answer_prompt_passes_through_agent() {
    let common::Harness {
        assistant, backend, ..
    } = harness("answer");
    let assistant = assistant.with_agent(Arc::new(PrefixAgent));

    assistant
        .solidity_answer("What is a mapping?", &params())
        .await
        .unwrap();
    assistant
        .code_explaining("explain", "ctx", &params())
        .await
        .unwrap();

    let calls = backend.calls();
    assert_eq!(calls[0].prompt, "[workspace] What is a mapping?");
    assert_eq!(calls[1].prompt, "explain");
}

#[tokio::test]
async fn dispatch_routes_every_operation() {
    let h = harness("ok");

    for op in Operation::ALL {
        let request = RequestDescriptor::new(op, op.as_str(), Some("ctx".into()));
        let result = h.assistant.dispatch(&request, &params()).await.unwrap();
        assert_eq!(result, Some(format!("ok: {}", op.as_str())));
    }

    let ops: Vec<_> = h.backend.calls().into_iter().map(|c| c.operation).collect();
    assert_eq!(ops, Operation::ALL.to_vec());
}
