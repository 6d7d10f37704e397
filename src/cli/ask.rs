use anyhow::{Result, bail};

use crate::chat::CompletionGateway;
use crate::core::{AppConfig, init_tracing};

async fn answer(gateway: &CompletionGateway, question: &str) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        bail!("Question is empty");
    }
    Ok(gateway.ask(question).await)
}

pub async fn run(config: AppConfig, question: &str) -> Result<()> {
    init_tracing("warn");

    let gateway = CompletionGateway::from_config(&config);
    println!("{}", answer(&gateway, question).await?);

    Ok(())
}
