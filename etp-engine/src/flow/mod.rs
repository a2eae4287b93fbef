//! Stage transition engine: decides, per (stage, command), whether the
//! session advances, remains, or resets, invoking collaborators where a
//! transition needs generated or retrieved content.
//!
//! The engine mutates the working session copy it is handed and reports the
//! outcome as a [`StageResult`]; committing the copy is the orchestrator's
//! job. A collaborator failure never changes the stage or drops an answer:
//! the result carries `state_changed = false` and a retry-oriented message.

pub mod answers;
pub mod presenter;
pub mod transitions;

use std::sync::Arc;

use itertools::Itertools;

use crate::config::EngineConfig;
use crate::normalizer::{self, Confidence};
use crate::providers::{GenerationService, RetrievalService, RetrievedPassage};
use crate::types::{Command, Session, Stage, StageResult};
use transitions::Outcome;

pub struct TransitionEngine {
    generation: Arc<dyn GenerationService>,
    retrieval: Arc<dyn RetrievalService>,
    config: EngineConfig,
}

fn result(session: &Session, response_text: String, state_changed: bool) -> StageResult {
    StageResult {
        next_stage: session.stage,
        response_text,
        requirements_snapshot: session.requirements.clone(),
        state_changed,
    }
}

impl TransitionEngine {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        retrieval: Arc<dyn RetrievalService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generation,
            retrieval,
            config,
        }
    }

    /// Process one non-structural command against the session. Structural
    /// commands at the editable stages belong to the list manager; if one
    /// reaches the engine it resolves to a remain.
    pub async fn process(&self, session: &mut Session, command: &Command) -> StageResult {
        let stage = session.stage;
        log::debug!(
            "transition: stage={stage} command={:?} outcome={:?}",
            command.class(),
            transitions::outcome(stage, command.class())
        );
        match transitions::outcome(stage, command.class()) {
            Outcome::Reset => self.restart(session, command).await,
            Outcome::Remain => self.remain(session, command).await,
            Outcome::Advance => self.advance(session, command).await,
        }
    }

    async fn restart(&self, session: &mut Session, command: &Command) -> StageResult {
        session.reset_elicited();
        let text = match command {
            Command::RestartNecessity { text } => text.clone(),
            other => {
                log::warn!("reset outcome for non-restart command {other:?}");
                None
            }
        };
        match text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(necessity) => {
                // The reset itself commits even if the follow-on suggestion
                // call fails; a retry then starts from the clean state.
                let mut inner = self.capture_necessity(session, &necessity).await;
                inner.state_changed = true;
                inner.response_text = format!(
                    "Entendido, vamos recomeçar com a nova necessidade.\n\n{}",
                    inner.response_text
                );
                inner
            }
            None => result(
                session,
                format!(
                    "Sem problemas, vamos recomeçar do zero. {}",
                    presenter::stage_prompt(Stage::CollectNeed, session)
                ),
                true,
            ),
        }
    }

    async fn remain(&self, session: &mut Session, command: &Command) -> StageResult {
        let stage = session.stage;
        match command {
            Command::Unclear => result(session, presenter::unclear(stage), false),
            Command::Edit { .. } | Command::Remove { .. } | Command::KeepOnly { .. } | Command::Include { .. } => {
                let message = if stage == Stage::CollectNeed {
                    "Ainda não temos uma lista de requisitos para editar. Primeiro me descreva a \
                     necessidade da contratação."
                        .to_string()
                } else if stage.holds_requirement_edits() {
                    // Normally handled by the list manager before the engine
                    presenter::unclear(stage)
                } else {
                    presenter::stage_mismatch(stage)
                };
                result(session, message, false)
            }
            Command::Confirm => {
                let message = match stage {
                    // Restate the open question; a bare ack answers nothing
                    Stage::AskPca
                    | Stage::AskLegalNorms
                    | Stage::AskQuantValue
                    | Stage::AskParcelamento
                    | Stage::ConfirmSummary
                    | Stage::Finalize => presenter::stage_prompt(stage, session),
                    _ => presenter::unclear(stage),
                };
                result(session, message, false)
            }
            Command::ConfirmGenerate => {
                if stage == Stage::Preview {
                    return self.generate_document(session, Stage::Preview).await;
                }
                result(session, presenter::unclear(stage), false)
            }
            Command::Skip => result(session, presenter::unclear(stage), false),
            Command::FreeAnswer { text } => match stage {
                Stage::RecommendSolutionPath => self.select_path(session, text),
                _ => result(session, presenter::unclear(stage), false),
            },
            Command::RestartNecessity { .. } => {
                log::warn!("remain outcome for restart command");
                result(session, presenter::unclear(stage), false)
            }
        }
    }

    async fn advance(&self, session: &mut Session, command: &Command) -> StageResult {
        let stage = session.stage;
        match (stage, command) {
            (Stage::CollectNeed, Command::FreeAnswer { text }) => {
                self.capture_necessity(session, text).await
            }
            (Stage::SuggestRequirements | Stage::RefineRequirements, Command::Confirm) => {
                self.step_forward(session)
            }
            (Stage::ConfirmRequirements, Command::Confirm) => {
                session.confirmed.insert(Stage::ConfirmRequirements, true);
                self.step_forward(session)
            }
            (Stage::RecommendSolutionPath, Command::Confirm) => {
                if session.answer("solution_path").is_some() {
                    session.confirmed.insert(Stage::RecommendSolutionPath, true);
                    self.step_forward(session)
                } else {
                    result(
                        session,
                        format!(
                            "Antes de seguir, preciso que escolha uma estratégia.\n\n{}",
                            presenter::solution_options()
                        ),
                        false,
                    )
                }
            }
            (
                Stage::AskPca | Stage::AskLegalNorms | Stage::AskQuantValue | Stage::AskParcelamento,
                Command::FreeAnswer { .. } | Command::Skip,
            ) => self.record_answer(session, command).await,
            (Stage::ConfirmSummary, Command::ConfirmGenerate) => {
                session.confirmed.insert(Stage::ConfirmSummary, true);
                self.step_forward(session)
            }
            (Stage::GenerateEtp, Command::ConfirmGenerate) => {
                self.generate_document(session, Stage::GenerateEtp).await
            }
            (Stage::Preview, Command::Confirm) => self.step_forward(session),
            (other_stage, other_command) => {
                // Declared advances are enumerated above; anything else here
                // is a table/engine disagreement worth logging loudly.
                log::error!("unhandled advance pair: {other_stage} / {other_command:?}");
                result(session, presenter::unclear(other_stage), false)
            }
        }
    }

    /// Move to the declared successor and present its entry prompt.
    fn step_forward(&self, session: &mut Session) -> StageResult {
        match session.stage.next() {
            Some(next) => {
                session.stage = next;
                let message = presenter::stage_prompt(next, session);
                result(session, message, true)
            }
            None => result(session, presenter::stage_prompt(session.stage, session), false),
        }
    }

    /// First turn of the elicitation: capture the necessity and populate the
    /// suggested requirement list. Nothing is captured if generation fails.
    async fn capture_necessity(&self, session: &mut Session, necessity: &str) -> StageResult {
        let context = match self
            .retrieval
            .retrieve_for_stage(Stage::SuggestRequirements, necessity)
            .await
        {
            Ok(passages) => passages,
            Err(e) => {
                // Supporting material only; suggestion still proceeds
                log::warn!("retrieval unavailable for suggestion context: {e}");
                Vec::new()
            }
        };

        let raw = match self
            .generation
            .generate(Stage::SuggestRequirements, necessity, &context, &session.answers)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("suggestion generation failed: {e}");
                return result(session, presenter::service_failure(session.stage), false);
            }
        };

        let payload = normalizer::normalize(&raw);
        if payload.items.is_empty() {
            log::warn!("suggestion payload carried no usable items");
            return result(session, presenter::service_failure(session.stage), false);
        }

        session.necessity = Some(necessity.to_string());
        session.requirements = payload.items;
        session.stage = Stage::SuggestRequirements;
        let message = presenter::suggestions(&session.requirements, &payload.message);
        result(session, message, true)
    }

    /// Self-loop at `recommend_solution_path`: record the chosen path.
    fn select_path(&self, session: &mut Session, text: &str) -> StageResult {
        match answers::select_solution_path(text, self.config.similarity_threshold) {
            Some(index) => {
                let (title, _) = answers::SOLUTION_PATHS[index];
                session
                    .answers
                    .insert("solution_path".to_string(), title.to_string());
                result(
                    session,
                    format!(
                        "Estratégia registrada: **{title}**. Se estiver de acordo, confirme para \
                         seguirmos ao PCA; ou escolha outra opção."
                    ),
                    true,
                )
            }
            None => result(session, presenter::unclear(Stage::RecommendSolutionPath), false),
        }
    }

    /// Record the answer for one question stage and advance. Entering
    /// `ask_legal_norms` consults the retrieval corpus first; if that call
    /// fails the whole turn stays at `ask_pca` with nothing recorded.
    async fn record_answer(&self, session: &mut Session, command: &Command) -> StageResult {
        let stage = session.stage;
        let key = match stage.answer_key() {
            Some(key) => key.to_string(),
            None => {
                log::error!("record_answer at stage {stage} without an answer key");
                return result(session, presenter::unclear(stage), false);
            }
        };
        let value = match command {
            Command::Skip => "não informado".to_string(),
            Command::FreeAnswer { text } => answers::interpret(stage, text),
            other => {
                log::error!("record_answer with non-answer command {other:?}");
                return result(session, presenter::unclear(stage), false);
            }
        };

        let mut entry_message = None;
        if stage == Stage::AskPca {
            let necessity = session.necessity.clone().unwrap_or_default();
            match self
                .retrieval
                .retrieve_for_stage(Stage::AskLegalNorms, &necessity)
                .await
            {
                Ok(passages) => entry_message = Some(presenter::norm_suggestions(&passages)),
                Err(e) => {
                    log::warn!("norm retrieval failed, staying at ask_pca: {e}");
                    return result(session, presenter::service_failure(stage), false);
                }
            }
        }

        let echo = if stage == Stage::AskQuantValue {
            match command {
                Command::FreeAnswer { text } => answers::quant_value_echo(text),
                _ => None,
            }
        } else {
            None
        };

        session.answers.insert(key, value);
        let mut outcome = self.step_forward(session);
        if let Some(message) = entry_message {
            outcome.response_text = message;
        }
        if let Some(echo) = echo {
            outcome.response_text = format!("Registrado: {echo}.\n\n{}", outcome.response_text);
        }
        outcome
    }

    /// Generate (or regenerate) the ETP document. On success the session
    /// moves to `preview` (or stays there for a regeneration); on failure
    /// nothing changes.
    async fn generate_document(&self, session: &mut Session, at: Stage) -> StageResult {
        let necessity = session.necessity.clone().unwrap_or_default();

        let mut context: Vec<RetrievedPassage> = session
            .requirements
            .iter()
            .map(|r| RetrievedPassage {
                id: format!("req-{}", r.id),
                section: "requisitos".to_string(),
                text: r.text.clone(),
                score: 1.0,
            })
            .collect();
        match self
            .retrieval
            .retrieve_for_stage(Stage::AskLegalNorms, &necessity)
            .await
        {
            Ok(passages) => context.extend(passages),
            Err(e) => log::warn!("norm retrieval unavailable for document context: {e}"),
        }

        let raw = match self
            .generation
            .generate(Stage::GenerateEtp, &necessity, &context, &session.answers)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("document generation failed at {at}: {e}");
                return result(session, presenter::service_failure(at), false);
            }
        };

        let payload = normalizer::normalize(&raw);
        let document = match payload.confidence {
            Confidence::Confident => payload.message,
            // Salvaged text is better than losing the turn, but an empty
            // salvage is a failure
            Confidence::Degraded => payload.items.iter().map(|r| r.text.as_str()).join("\n"),
        };
        if document.trim().is_empty() {
            log::warn!("document payload degraded to nothing at {at}");
            return result(session, presenter::service_failure(at), false);
        }

        session.generated_document = Some(document);
        if at == Stage::GenerateEtp {
            session.stage = Stage::Preview;
        }
        let message = presenter::stage_prompt(Stage::Preview, session);
        result(session, message, true)
    }
}
