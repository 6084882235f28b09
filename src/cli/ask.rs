use std::path::Path;
use std::sync::Arc;

use crate::assistant::Assistant;
use crate::config::AssistConfig;
use crate::error::Result;
use crate::operation::{GenerationParams, Operation, RequestDescriptor};
use crate::sink::{ConsoleComposer, TerminalLogger};

/// Options shared by `ask` and `pipe`.
#[derive(Debug, Clone, Default)]
pub struct AskOptions<'a> {
    pub context: Option<&'a str>,
    pub echo: bool,
    pub stream: bool,
}

fn params_for(config: &AssistConfig, opts: &AskOptions<'_>) -> GenerationParams {
    let mut params = config.params.clone();
    params.terminal_output |= opts.echo;
    params.stream_result |= opts.stream;
    params
}

async fn assistant(config: &AssistConfig) -> Result<Assistant> {
    Assistant::initialize(config, Arc::new(TerminalLogger), Arc::new(ConsoleComposer)).await
}

/// Run one operation directly and print its result.
pub async fn run_ask(
    config_path: Option<&Path>,
    operation: &str,
    prompt: &str,
    opts: AskOptions<'_>,
) -> Result<()> {
    let operation: Operation = operation.parse()?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let config = AssistConfig::load(config_path, &cwd)?;
    let params = params_for(&config, &opts);
    let assistant = assistant(&config).await?;

    let request = RequestDescriptor::new(operation, prompt, opts.context.map(String::from));
    match assistant.dispatch(&request, &params).await? {
        Some(result) => print_result(&result, &params),
        None => std::process::exit(2),
    }
    Ok(())
}

/// Stage a request the way the chat UI does, then flush it.
pub async fn run_pipe(
    config_path: Option<&Path>,
    operation: &str,
    prompt: &str,
    message: Option<&str>,
    opts: AskOptions<'_>,
) -> Result<()> {
    let operation: Operation = operation.parse()?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let config = AssistConfig::load(config_path, &cwd)?;
    let params = params_for(&config, &opts);
    let assistant = assistant(&config).await?;

    assistant.chat_pipe(operation, prompt, opts.context, message);
    let result = assistant.process_chat_request_buffer(&params).await?;
    print_result(&result, &params);
    Ok(())
}

fn print_result(result: &str, params: &GenerationParams) {
    // Streamed and echoed output already reached the terminal
    if params.stream_result {
        println!();
    } else if !params.terminal_output {
        println!("{}", result);
    }
}
