//! AlterEgo CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write the default config file
//! - `ask`      — Ask the persona a single question
//! - `chat`     — Interactive chat with streamed answers
//! - `persona`  — Show the loaded persona and its prompt size

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "alterego",
    about = "AlterEgo — talk to an AI clone of a person",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init,

    /// Ask a single question and print the answer
    Ask {
        /// The visitor's message
        #[arg(short, long)]
        message: String,
    },

    /// Chat interactively, streaming each answer
    Chat,

    /// Show the loaded persona
    Persona {
        /// Also print the full system prompt
        #[arg(long)]
        show_prompt: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed answers on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Ask { message } => commands::ask::run(message).await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Persona { show_prompt } => commands::persona::run(show_prompt).await?,
    }

    Ok(())
}
