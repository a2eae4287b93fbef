//! Session orchestrator: the single entry point for a user turn.
//!
//! One call resolves the session, classifies the turn, routes it to the list
//! manager or the transition engine, appends both turns to the history and
//! commits the snapshot with a compare-and-swap on the session version. On a
//! version conflict the whole turn is replayed once against the fresh
//! snapshot; a second conflict surfaces to the caller.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::flow::{presenter, TransitionEngine};
use crate::intent;
use crate::requirements::{self, ListRejection};
use crate::store::{SessionStore, StoreError};
use crate::types::{Command, Role, Session, StageResult, TurnOutcome};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SessionOrchestrator {
    store: Arc<dyn SessionStore>,
    engine: TransitionEngine,
}

impl SessionOrchestrator {
    pub fn new(store: Arc<dyn SessionStore>, engine: TransitionEngine) -> Self {
        Self { store, engine }
    }

    /// Process one user turn end to end. `session_id = None` opens a fresh
    /// session; an unknown id also opens one under that id, so a client may
    /// pick its own identifiers.
    pub async fn handle_turn(
        &self,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<TurnOutcome, EngineError> {
        let mut session = self.load_or_create(session_id).await?;
        let expected = session.version;
        let result = self.run_turn(&mut session, text).await;

        match self.store.save(&session, expected).await {
            Ok(_) => Ok(outcome(&session, result)),
            Err(StoreError::Conflict { id, .. }) => {
                log::warn!("commit conflict on session {id}, replaying the turn once");
                let mut fresh = self.store.load(&id).await?;
                let expected = fresh.version;
                let result = self.run_turn(&mut fresh, text).await;
                self.store.save(&fresh, expected).await?;
                Ok(outcome(&fresh, result))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Current committed snapshot, untouched.
    pub async fn get_snapshot(&self, session_id: &str) -> Result<Session, EngineError> {
        Ok(self.store.load(session_id).await?)
    }

    /// Programmatic restart: clears elicited state, keeps the history.
    pub async fn reset(&self, session_id: &str) -> Result<Session, EngineError> {
        let mut session = self.store.load(session_id).await?;
        let expected = session.version;
        session.reset_elicited();
        self.store.save(&session, expected).await?;
        Ok(session)
    }

    async fn load_or_create(&self, session_id: Option<&str>) -> Result<Session, EngineError> {
        match session_id {
            Some(id) => match self.store.load(id).await {
                Ok(session) => Ok(session),
                Err(StoreError::NotFound(_)) => Ok(Session::new(id)),
                Err(e) => Err(e.into()),
            },
            None => Ok(Session::new(Uuid::new_v4().to_string())),
        }
    }

    /// Classify and apply one turn against the working copy; turns are
    /// appended here, commit happens in the caller.
    async fn run_turn(&self, session: &mut Session, text: &str) -> StageResult {
        session.push_turn(Role::User, text);
        let command = intent::classify(session.stage, text);
        log::info!(
            "session {} stage {} classified as {:?}",
            session.id,
            session.stage,
            command.class()
        );

        let result = if session.stage.holds_requirement_edits() && is_structural(&command) {
            self.edit_requirements(session, &command)
        } else {
            self.engine.process(session, &command).await
        };

        session.push_turn(Role::Assistant, result.response_text.clone());
        session.updated_at = chrono::Utc::now();
        result
    }

    /// Structural edit at an editable stage: delegate to the list manager and
    /// phrase the outcome. The stage never moves here; a rejected edit leaves
    /// the list untouched.
    fn edit_requirements(&self, session: &mut Session, command: &Command) -> StageResult {
        let necessity = session.necessity.clone();
        let applied = requirements::apply(&session.requirements, command, necessity.as_deref());
        let (response_text, state_changed) = match applied {
            Ok((next, true)) => {
                session.requirements = next;
                (
                    format!(
                        "Atualizei a lista:\n\n{}\n\nQuer ajustar mais alguma coisa ou podemos \
                         seguir?",
                        presenter::requirements_block(&session.requirements)
                    ),
                    true,
                )
            }
            Ok((_, false)) => {
                let message = match command {
                    Command::Edit { text: None, .. } => {
                        "Entendi que quer trocar um requisito, mas preciso do novo texto. Diga, \
                         por exemplo, \"trocar 2: novo texto do requisito\"."
                            .to_string()
                    }
                    _ => presenter::unclear(session.stage),
                };
                (message, false)
            }
            Err(ListRejection::AmbiguousReference { resolved: 0 }) => (
                "Não consegui identificar qual requisito você quis dizer. Use o número que \
                 aparece na lista (ex.: \"remover 2\")."
                    .to_string(),
                false,
            ),
            Err(ListRejection::AmbiguousReference { .. }) => (
                "Para trocar um requisito, indique apenas um por vez (ex.: \"trocar 3: novo \
                 texto\")."
                    .to_string(),
                false,
            ),
            Err(ListRejection::DuplicateRejected { text }) => (
                format!("O requisito \"{text}\" já está na lista, então mantive tudo como estava."),
                false,
            ),
        };

        StageResult {
            next_stage: session.stage,
            response_text,
            requirements_snapshot: session.requirements.clone(),
            state_changed,
        }
    }
}

fn is_structural(command: &Command) -> bool {
    matches!(
        command,
        Command::Edit { .. } | Command::Remove { .. } | Command::KeepOnly { .. } | Command::Include { .. }
    )
}

fn outcome(session: &Session, result: StageResult) -> TurnOutcome {
    TurnOutcome {
        session_id: session.id.clone(),
        stage: result.next_stage,
        response_text: result.response_text,
        requirements: result.requirements_snapshot,
        state_changed: result.state_changed,
    }
}
