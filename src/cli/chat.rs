use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::{ChatSession, CompletionGateway, SubmitError};
use crate::core::{AppConfig, init_tracing};

const GREETING: &str =
    "Pregúntame cualquier cosa sobre por qué Cloudflare es la mejor opción para tu proyecto.";

/// Run one line of input through the session and return the reply.
/// Blank lines give `None` without asking anything.
async fn answer(
    session: &mut ChatSession,
    gateway: &CompletionGateway,
    line: &str,
) -> Result<Option<String>, SubmitError> {
    session.set_draft(line);
    let question = match session.submit() {
        Ok(question) => question,
        Err(SubmitError::Empty) => return Ok(None),
        Err(e) => return Err(e),
    };

    // Typing indicator while the reply is pending
    println!("...");
    let reply = gateway.ask(&question).await;
    session.resolve(&reply);

    Ok(session.transcript().last().map(|msg| msg.text().to_string()))
}

pub async fn run(config: AppConfig) -> Result<()> {
    init_tracing("warn");

    let gateway = CompletionGateway::from_config(&config);
    let mut session = ChatSession::new();
    let mut rl = DefaultEditor::new()?;

    println!("{}\n", GREETING);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => match answer(&mut session, &gateway, &line).await {
                Ok(Some(reply)) => {
                    let _ = rl.add_history_entry(line.trim());
                    println!("{}\n", reply);
                }
                Ok(None) => continue,
                Err(e) => println!("{}", e),
            },
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
