use std::path::PathBuf;

use clap::{Parser, Subcommand};

use assist_relay::cli;
use assist_relay::cli::ask::AskOptions;

#[derive(Parser)]
#[command(name = "assist-relay", version, about = "Relay AI code-assist requests to a companion or remote endpoint")]
struct Cli {
    /// Config file (default: .assist-relay/config.yml, then ~/.config/assist-relay/config.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one operation and print the result
    Ask {
        /// code_generation, code_completion, solidity_answer, code_explaining,
        /// error_explaining or code_insertion
        operation: String,
        prompt: String,
        /// Surrounding code, or the suffix for code_insertion
        #[arg(long)]
        context: Option<String>,
        /// Echo the result to the terminal log
        #[arg(long)]
        echo: bool,
        /// Stream partial output as it arrives
        #[arg(long)]
        stream: bool,
    },
    /// Stage a request as the chat UI would, then process it
    Pipe {
        operation: String,
        prompt: String,
        #[arg(long)]
        context: Option<String>,
        /// Composer message to show instead of the operation's default
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        echo: bool,
        #[arg(long)]
        stream: bool,
    },
    /// Run a companion process serving requests on a Unix socket
    Serve {
        #[arg(long)]
        socket: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Command::Ask {
            operation,
            prompt,
            context,
            echo,
            stream,
        } => {
            let opts = AskOptions {
                context: context.as_deref(),
                echo,
                stream,
            };
            cli::ask::run_ask(config, &operation, &prompt, opts).await?;
        }
        Command::Pipe {
            operation,
            prompt,
            context,
            message,
            echo,
            stream,
        } => {
            let opts = AskOptions {
                context: context.as_deref(),
                echo,
                stream,
            };
            cli::ask::run_pipe(config, &operation, &prompt, message.as_deref(), opts).await?;
        }
        Command::Serve { socket } => cli::serve::run_serve(config, socket).await?,
        Command::Config => cli::config_cmd::run_config(config).await?,
    }

    Ok(())
}
