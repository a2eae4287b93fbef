//! Collaborator contracts: generation and retrieval services consumed by the
//! transition engine through narrow async traits. Deterministic in-crate
//! implementations live in [`stub`]; anything network-backed is an adapter
//! concern outside this crate.

pub mod stub;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::Stage;

/// Failure of an external collaborator. Converted to a retry-oriented
/// dialogue response at the engine boundary, never to a stage change.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("service timed out after {0}ms")]
    Timeout(u64),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// One passage of supporting reference material, ordered by score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub section: String,
    pub text: String,
    pub score: f64,
}

/// Turns session context into candidate text. The payload is untyped and may
/// be empty or malformed; callers route it through the response normalizer
/// before storing anything.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(
        &self,
        stage: Stage,
        necessity: &str,
        context: &[RetrievedPassage],
        answers: &IndexMap<String, String>,
    ) -> Result<Value, ProviderError>;
}

/// Supplies supporting reference material for a stage. An empty result is
/// valid and means "not found in corpus".
#[async_trait]
pub trait RetrievalService: Send + Sync {
    async fn retrieve_for_stage(
        &self,
        stage: Stage,
        necessity: &str,
    ) -> Result<Vec<RetrievedPassage>, ProviderError>;
}
