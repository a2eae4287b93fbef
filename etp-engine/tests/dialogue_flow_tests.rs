//! End-to-end dialogue runs through the orchestrator with the stub
//! collaborators: the full happy path, the acceptance scenarios, and the
//! failure paths that must leave committed state untouched.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tokio::runtime::Runtime;

use etp_engine::providers::stub::{StaticRetrievalService, StubGenerationService};
use etp_engine::providers::{
    GenerationService, ProviderError, RetrievalService, RetrievedPassage,
};
use etp_engine::store::{InMemorySessionStore, SessionStore};
use etp_engine::{EngineConfig, SessionOrchestrator, Stage, TransitionEngine, TurnOutcome};

fn orchestrator_with(
    generation: Arc<dyn GenerationService>,
    retrieval: Arc<dyn RetrievalService>,
) -> (SessionOrchestrator, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new());
    let engine = TransitionEngine::new(generation, retrieval, EngineConfig::default());
    (SessionOrchestrator::new(store.clone(), engine), store)
}

fn stub_orchestrator() -> (SessionOrchestrator, Arc<InMemorySessionStore>) {
    orchestrator_with(
        Arc::new(StubGenerationService::new(5)),
        Arc::new(StaticRetrievalService::new(3)),
    )
}

fn turn(rt: &Runtime, orch: &SessionOrchestrator, id: &str, text: &str) -> TurnOutcome {
    rt.block_on(orch.handle_turn(Some(id), text)).unwrap()
}

/// Generation that answers suggestions normally but fails document requests.
struct FailsDocuments {
    inner: StubGenerationService,
}

#[async_trait]
impl GenerationService for FailsDocuments {
    async fn generate(
        &self,
        stage: Stage,
        necessity: &str,
        context: &[RetrievedPassage],
        answers: &IndexMap<String, String>,
    ) -> Result<Value, ProviderError> {
        match stage {
            Stage::GenerateEtp | Stage::Preview => {
                Err(ProviderError::Unavailable("generation offline".to_string()))
            }
            _ => self.inner.generate(stage, necessity, context, answers).await,
        }
    }
}

#[test]
fn full_elicitation_from_necessity_to_finalize() {
    let rt = Runtime::new().unwrap();
    let (orch, store) = stub_orchestrator();
    let id = "walk-1";

    // Scenario A: the necessity populates the suggestion list
    let out = turn(&rt, &orch, id, "gestão de frota de aeronaves");
    assert_eq!(out.stage, Stage::SuggestRequirements);
    assert_eq!(out.requirements.len(), 5);
    assert!(out.state_changed);

    // Scenario B: structural removal renumbers, stage unchanged
    let out = turn(&rt, &orch, id, "remover 2 e 4");
    assert_eq!(out.stage, Stage::SuggestRequirements);
    assert_eq!(out.requirements.len(), 3);
    let ids: Vec<u32> = out.requirements.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let out = turn(&rt, &orch, id, "adicionar: rastreamento da frota em tempo real");
    assert_eq!(out.requirements.len(), 4);
    assert_eq!(out.requirements[3].id, 4);
    assert_eq!(out.requirements[3].text, "rastreamento da frota em tempo real");

    // Two confirmations walk the refinement stages
    assert_eq!(turn(&rt, &orch, id, "ok").stage, Stage::RefineRequirements);
    assert_eq!(turn(&rt, &orch, id, "pode seguir").stage, Stage::ConfirmRequirements);

    // Locking the list in moves to strategy selection
    let out = turn(&rt, &orch, id, "sim");
    assert_eq!(out.stage, Stage::RecommendSolutionPath);
    assert!(out.response_text.contains("Leasing Operacional"));

    // Selection loops in place until confirmed
    let out = turn(&rt, &orch, id, "2");
    assert_eq!(out.stage, Stage::RecommendSolutionPath);
    assert!(out.response_text.contains("Leasing Operacional"));
    assert_eq!(turn(&rt, &orch, id, "pode seguir").stage, Stage::AskPca);

    // Scenario C: "não sei" is a skip, recorded as não informado
    let out = turn(&rt, &orch, id, "não sei");
    assert_eq!(out.stage, Stage::AskLegalNorms);
    assert!(out.response_text.contains("Lei 14.133/2021"));

    let out = turn(&rt, &orch, id, "Lei 14.133/2021 e IN SEGES 58/2022");
    assert_eq!(out.stage, Stage::AskQuantValue);

    let out = turn(&rt, &orch, id, "10 aeronaves, R$ 1,2 milhões por ano");
    assert_eq!(out.stage, Stage::AskParcelamento);
    assert!(out.response_text.contains("R$ 1.200.000,00"));

    let out = turn(&rt, &orch, id, "não");
    assert_eq!(out.stage, Stage::ConfirmSummary);
    assert!(out.response_text.contains("resumo do ETP"));
    assert!(out.response_text.contains("não informado"));

    // Scenario D: a generic ack does not generate
    let out = turn(&rt, &orch, id, "ok");
    assert_eq!(out.stage, Stage::ConfirmSummary);
    assert!(!out.state_changed);

    assert_eq!(turn(&rt, &orch, id, "pode gerar").stage, Stage::GenerateEtp);
    let out = turn(&rt, &orch, id, "pode gerar");
    assert_eq!(out.stage, Stage::Preview);
    assert!(out.response_text.contains("ESTUDO TÉCNICO PRELIMINAR"));

    let out = turn(&rt, &orch, id, "ok");
    assert_eq!(out.stage, Stage::Finalize);

    // Terminal: everything but a restart stays put
    let out = turn(&rt, &orch, id, "ok");
    assert_eq!(out.stage, Stage::Finalize);
    assert!(!out.state_changed);

    let session = rt.block_on(store.load(id)).unwrap();
    assert_eq!(session.necessity.as_deref(), Some("gestão de frota de aeronaves"));
    assert_eq!(session.answer("pca"), Some("não informado"));
    assert_eq!(session.answer("solution_path"), Some("Leasing Operacional"));
    assert_eq!(session.answer("parcelamento"), Some("não"));
    assert!(session.generated_document.is_some());
    // Every turn committed exactly once
    assert_eq!(session.version, 17);
    assert_eq!(session.turns.len(), 34);
}

#[test]
fn generation_failure_at_generate_etp_preserves_everything() {
    let rt = Runtime::new().unwrap();
    let (orch, store) = orchestrator_with(
        Arc::new(FailsDocuments {
            inner: StubGenerationService::new(5),
        }),
        Arc::new(StaticRetrievalService::new(3)),
    );
    let id = "walk-2";

    for text in [
        "manutenção de equipamentos hospitalares",
        "ok",
        "ok",
        "sim",
        "1",
        "ok",
        "pular",
        "pular",
        "pular",
        "pular",
        "pode gerar",
    ] {
        turn(&rt, &orch, id, text);
    }
    let before = rt.block_on(store.load(id)).unwrap();
    assert_eq!(before.stage, Stage::GenerateEtp);

    // Scenario E: the failing generation leaves stage and answers intact
    let out = turn(&rt, &orch, id, "pode gerar");
    assert_eq!(out.stage, Stage::GenerateEtp);
    assert!(!out.state_changed);
    assert!(out.response_text.contains("erro técnico"));

    let after = rt.block_on(store.load(id)).unwrap();
    assert_eq!(after.stage, Stage::GenerateEtp);
    assert_eq!(after.answers, before.answers);
    assert!(after.generated_document.is_none());
    // The failed turn still commits its two history entries
    assert_eq!(after.turns.len(), before.turns.len() + 2);
}

#[test]
fn restart_mid_flow_switches_the_necessity() {
    let rt = Runtime::new().unwrap();
    let (orch, store) = stub_orchestrator();
    let id = "walk-3";

    turn(&rt, &orch, id, "gestão de frota de aeronaves");
    turn(&rt, &orch, id, "ok");
    turn(&rt, &orch, id, "ok");
    turn(&rt, &orch, id, "sim");

    let out = turn(&rt, &orch, id, "na verdade a necessidade é transporte de cargas");
    assert_eq!(out.stage, Stage::SuggestRequirements);
    assert!(out.state_changed);

    let session = rt.block_on(store.load(id)).unwrap();
    assert_eq!(session.necessity.as_deref(), Some("transporte de cargas"));
    assert!(session.confirmed.is_empty());
    assert!(session.answers.is_empty());
    // History survives the reset
    assert_eq!(session.turns.len(), 10);
}

#[test]
fn bare_sim_at_ask_pca_records_the_answer_and_advances() {
    let rt = Runtime::new().unwrap();
    let (orch, store) = stub_orchestrator();
    let id = "walk-8";

    for text in ["gestão de frota de aeronaves", "ok", "ok", "sim", "1", "ok"] {
        turn(&rt, &orch, id, text);
    }
    let before = rt.block_on(store.load(id)).unwrap();
    assert_eq!(before.stage, Stage::AskPca);

    // The prompt invites a plain "sim"; it must count as the answer
    let out = turn(&rt, &orch, id, "sim");
    assert_eq!(out.stage, Stage::AskLegalNorms);
    assert!(out.state_changed);
    let after = rt.block_on(store.load(id)).unwrap();
    assert_eq!(after.answer("pca"), Some("sim, previsto no PCA"));

    // Same wording at ask_parcelamento
    turn(&rt, &orch, id, "Lei 14.133/2021");
    turn(&rt, &orch, id, "10 unidades");
    let out = turn(&rt, &orch, id, "sim");
    assert_eq!(out.stage, Stage::ConfirmSummary);
    let after = rt.block_on(store.load(id)).unwrap();
    assert_eq!(after.answer("parcelamento"), Some("sim"));
}

#[test]
fn duplicate_inclusion_is_rejected_and_list_kept() {
    let rt = Runtime::new().unwrap();
    let (orch, _) = stub_orchestrator();
    let id = "walk-4";

    let first = turn(&rt, &orch, id, "gestão de frota de veículos");
    let existing = first.requirements[0].text.clone();

    let out = turn(&rt, &orch, id, &format!("adicionar: {}", existing.to_uppercase()));
    assert!(!out.state_changed);
    assert!(out.response_text.contains("já está na lista"));
    assert_eq!(out.requirements, first.requirements);
}

#[test]
fn necessity_never_changes_outside_a_restart() {
    let rt = Runtime::new().unwrap();
    let (orch, store) = stub_orchestrator();
    let id = "walk-5";

    turn(&rt, &orch, id, "gestão de frota de aeronaves");
    for text in ["remover 1", "adicionar: novo requisito", "ok", "ok", "sim", "3", "ok", "sim"] {
        turn(&rt, &orch, id, text);
        let session = rt.block_on(store.load(id)).unwrap();
        assert_eq!(
            session.necessity.as_deref(),
            Some("gestão de frota de aeronaves"),
            "after turn {text:?}"
        );
    }
}

#[test]
fn ids_stay_contiguous_across_a_mutation_sequence() {
    let rt = Runtime::new().unwrap();
    let (orch, _) = stub_orchestrator();
    let id = "walk-6";

    turn(&rt, &orch, id, "gestão de frota de aeronaves");
    for text in [
        "remover 2",
        "adicionar: cobertura nacional de atendimento",
        "trocar 1: disponibilidade mínima de 98%",
        "manter apenas 1 e 3",
        "adicionar: relatórios mensais de operação",
    ] {
        let out = turn(&rt, &orch, id, text);
        let ids: Vec<u32> = out.requirements.iter().map(|r| r.id).collect();
        let expected: Vec<u32> = (1..=out.requirements.len() as u32).collect();
        assert_eq!(ids, expected, "after turn {text:?}");
    }
}

#[test]
fn edits_after_lockdown_are_stage_mismatches() {
    let rt = Runtime::new().unwrap();
    let (orch, store) = stub_orchestrator();
    let id = "walk-7";

    for text in ["gestão de frota de aeronaves", "ok", "ok", "sim"] {
        turn(&rt, &orch, id, text);
    }
    let before = rt.block_on(store.load(id)).unwrap();
    assert_eq!(before.stage, Stage::RecommendSolutionPath);

    let out = turn(&rt, &orch, id, "remover 2");
    assert_eq!(out.stage, Stage::RecommendSolutionPath);
    assert!(!out.state_changed);
    assert!(out.response_text.contains("já foi confirmada"));
    assert_eq!(out.requirements, before.requirements);
}
