//! Multi-stage elicitation engine for Estudos Técnicos Preliminares (ETP).
//!
//! The engine drives a Portuguese-language dialogue through a fixed sequence
//! of stages: capture the contracting necessity, suggest and refine a
//! requirement list, pick a contracting strategy, collect the planning
//! answers (PCA, legal norms, quantity/value, parcelamento), recap, generate
//! the document and finalize. Every piece of dialogue logic is deterministic;
//! free-form text only enters through the [`providers`] traits, behind the
//! [`normalizer`].
//!
//! [`orchestrator::SessionOrchestrator::handle_turn`] is the entry point:
//! hand it a session id and the user's words, get back the assistant reply
//! and the committed session state.

pub mod config;
pub mod flow;
pub mod intent;
pub mod normalizer;
pub mod orchestrator;
pub mod providers;
pub mod requirements;
pub mod store;
pub mod text;
pub mod types;

pub use config::EngineConfig;
pub use flow::TransitionEngine;
pub use orchestrator::{EngineError, SessionOrchestrator};
pub use types::{Command, Requirement, Session, Stage, TurnOutcome};
