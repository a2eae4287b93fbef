//! Interactive terminal chat over the elicitation engine, using the stub
//! collaborators. Useful for walking the full stage sequence by hand.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use etp_engine::providers::stub::{StaticRetrievalService, StubGenerationService};
use etp_engine::store::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use etp_engine::{EngineConfig, SessionOrchestrator, TransitionEngine};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_log::LogTracer::init()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = EngineConfig::load();
    let store: Arc<dyn SessionStore> = match &config.database_path {
        Some(path) => {
            tracing::info!(path = %path, "using sqlite session store");
            Arc::new(SqliteSessionStore::new(path.clone())?)
        }
        None => Arc::new(InMemorySessionStore::new()),
    };
    let engine = TransitionEngine::new(
        Arc::new(StubGenerationService::new(config.suggestion_count)),
        Arc::new(StaticRetrievalService::new(config.retrieval_top_k)),
        config,
    );
    let orchestrator = SessionOrchestrator::new(store, engine);

    println!("=== Assistente de ETP ===");
    println!("Descreva a necessidade da contratação para começar.");
    println!("(\"sair\" encerra, \"nova necessidade\" ou /reset recomeça)\n");

    let stdin = io::stdin();
    let mut session_id: Option<String> = None;
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("sair") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if line == "/reset" {
            if let Some(id) = &session_id {
                orchestrator.reset(id).await?;
                println!("\nSessão reiniciada. Me descreva a nova necessidade.\n");
            } else {
                println!("\nNenhuma sessão aberta ainda.\n");
            }
            continue;
        }

        match orchestrator.handle_turn(session_id.as_deref(), line).await {
            Ok(outcome) => {
                session_id = Some(outcome.session_id.clone());
                println!("\n{}\n", outcome.response_text);
                tracing::debug!(
                    session = %outcome.session_id,
                    stage = %outcome.stage,
                    changed = outcome.state_changed,
                    "turn committed"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                println!("\nNão consegui registrar este turno ({e}). Tente novamente.\n");
            }
        }
    }

    println!("Até logo!");
    Ok(())
}
