use serde::{Deserialize, Serialize};

use crate::error::AssistError;

/// The six assist operations a backend can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CodeGeneration,
    CodeCompletion,
    SolidityAnswer,
    CodeExplaining,
    ErrorExplaining,
    CodeInsertion,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::CodeGeneration,
        Operation::CodeCompletion,
        Operation::SolidityAnswer,
        Operation::CodeExplaining,
        Operation::ErrorExplaining,
        Operation::CodeInsertion,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CodeGeneration => "code_generation",
            Operation::CodeCompletion => "code_completion",
            Operation::SolidityAnswer => "solidity_answer",
            Operation::CodeExplaining => "code_explaining",
            Operation::ErrorExplaining => "error_explaining",
            Operation::CodeInsertion => "code_insertion",
        }
    }

    /// Whether the orchestrator checks the busy gate before issuing this operation.
    /// Completion and insertion run on every keystroke and are never gated.
    pub fn is_guarded(&self) -> bool {
        !matches!(self, Operation::CodeCompletion | Operation::CodeInsertion)
    }

    /// Whether the remote backend posts this operation to the completion endpoint.
    pub fn uses_completion_endpoint(&self) -> bool {
        matches!(self, Operation::CodeCompletion | Operation::CodeInsertion)
    }

    /// Default message sent to the chat composer when the operation is staged.
    pub fn composer_prompt(&self) -> Option<&'static str> {
        match self {
            Operation::CodeExplaining => Some("Explain the current code"),
            Operation::ErrorExplaining => Some("Explain the error"),
            Operation::SolidityAnswer => Some("Answer the following question"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = AssistError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| AssistError::UnknownOperation { name: s.to_string() })
    }
}

/// A request staged in the pending slot, awaiting an explicit flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub operation: Operation,
    pub prompt: String,
    pub context: Option<String>,
}

impl RequestDescriptor {
    pub fn new(operation: Operation, prompt: impl Into<String>, context: Option<String>) -> Self {
        Self {
            operation,
            prompt: prompt.into(),
            context,
        }
    }
}

/// Generation options forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    /// Read the response incrementally and relay partial output to the logger.
    #[serde(default)]
    pub stream_result: bool,

    /// Echo the final result to the logger.
    #[serde(default)]
    pub terminal_output: bool,
}

fn default_temperature() -> f32 {
    0.5
}
fn default_max_new_tokens() -> u32 {
    2000
}
fn default_repeat_penalty() -> f32 {
    1.2
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_new_tokens: default_max_new_tokens(),
            repeat_penalty: default_repeat_penalty(),
            stream_result: false,
            terminal_output: false,
        }
    }
}

impl GenerationParams {
    pub fn with_terminal_output(mut self, on: bool) -> Self {
        self.terminal_output = on;
        self
    }

    pub fn with_stream_result(mut self, on: bool) -> Self {
        self.stream_result = on;
        self
    }
}
