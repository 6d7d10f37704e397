use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod ask;
pub mod chat;
pub mod serve;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Serve the page and the chat API
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Chat with the edge expert from the terminal
    Chat {},
    /// Ask the edge expert a single question
    Ask {
        #[arg(long)]
        question: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    let Some(command) = args.command else {
        return Ok(());
    };

    // Read once, a missing API key stops everything here
    let config = AppConfig::from_env()?;

    // Handle each sub command
    match command {
        Command::Serve { host, port } => {
            serve::run(host, port, config).await?;
        }
        Command::Chat {} => {
            chat::run(config).await?;
        }
        Command::Ask { question } => {
            ask::run(config, &question).await?;
        }
    }

    Ok(())
}
