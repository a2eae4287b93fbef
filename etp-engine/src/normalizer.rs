//! Response normalizer: the single decode boundary for upstream payloads.
//!
//! The generation service may answer with a fenced JSON string, a bare JSON
//! string, an already-structured mapping, or a flat sequence of items. This
//! module branches on the runtime shape of the payload before any key access
//! and canonicalizes everything into [`NormalizedPayload`]. A payload that
//! cannot be decoded degrades into a single low-confidence item carrying the
//! raw text; it never becomes an error for the caller.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::text;
use crate::types::Requirement;

/// How much the decoded payload can be trusted. A degraded parse must never
/// be mistaken for a confident one downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    /// Payload matched one of the accepted shapes
    Confident,
    /// Payload was empty, malformed, or unrecognized; content was salvaged
    Degraded,
}

/// Canonical form of one upstream payload
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedPayload {
    /// Items with fresh contiguous IDs, duplicates removed
    pub items: Vec<Requirement>,
    /// Consultative message accompanying the items, possibly empty
    pub message: String,
    pub confidence: Confidence,
}

impl NormalizedPayload {
    fn degraded(items: Vec<Requirement>, message: &str) -> Self {
        Self {
            items,
            message: message.to_string(),
            confidence: Confidence::Degraded,
        }
    }

    /// The canonical mapping shape this payload round-trips through.
    pub fn to_value(&self) -> Value {
        Value::Object(serde_json::Map::from_iter([
            (
                "suggested_requirements".to_string(),
                serde_json::to_value(&self.items).unwrap_or(Value::Array(vec![])),
            ),
            ("consultative_message".to_string(), Value::String(self.message.clone())),
        ]))
    }
}

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:json)?\s*(\{[\s\S]*?\})\s*```").unwrap());

/// Strip a ```json fence (tag optional) and fall back to the outermost
/// brace pair when no fence is present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(captures) = JSON_FENCE.captures(trimmed) {
        if let Some(inner) = captures.get(1) {
            return inner.as_str();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return &trimmed[start..=end];
        }
    }
    trimmed
}

/// Canonicalize an upstream payload. Never fails: unparseable content comes
/// back as a degraded payload wrapping the raw text.
pub fn normalize(raw: &Value) -> NormalizedPayload {
    match raw {
        Value::Null => {
            log::warn!("normalize: empty payload");
            NormalizedPayload::degraded(Vec::new(), "Resposta vazia do sistema")
        }
        Value::String(s) => normalize_text(s),
        Value::Array(items) => {
            let items = collect_items(items);
            NormalizedPayload {
                items,
                message: "Requisitos processados com sucesso".to_string(),
                confidence: Confidence::Confident,
            }
        }
        Value::Object(_) => normalize_mapping(raw),
        other => {
            log::warn!("normalize: unsupported payload shape: {other}");
            NormalizedPayload::degraded(Vec::new(), "Tipo de resposta não suportado")
        }
    }
}

/// Entry point for raw text payloads (the common transport shape).
pub fn normalize_text(raw: &str) -> NormalizedPayload {
    if raw.trim().is_empty() {
        log::warn!("normalize: empty string payload");
        return NormalizedPayload::degraded(Vec::new(), "Resposta vazia do sistema");
    }
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => normalize(&value),
        Ok(_) | Err(_) => {
            log::warn!("normalize: payload is not decodable JSON, degrading to a single item");
            NormalizedPayload::degraded(
                dedupe_and_renumber(vec![(raw.trim().to_string(), None)]),
                "Não foi possível processar a resposta do sistema. Tente novamente.",
            )
        }
    }
}

fn normalize_mapping(raw: &Value) -> NormalizedPayload {
    // Document payloads come back as {"document": "..."} from the
    // generation stage.
    if let Some(document) = raw.get("document").and_then(Value::as_str) {
        return NormalizedPayload {
            items: Vec::new(),
            message: document.to_string(),
            confidence: Confidence::Confident,
        };
    }

    let (list, message) = if let Some(list) = raw.get("suggested_requirements").and_then(Value::as_array) {
        let message = raw
            .get("consultative_message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        (list, message.to_string())
    } else if let Some(list) = raw.get("requirements").and_then(Value::as_array) {
        // Legacy spelling
        (list, "Requisitos convertidos do formato legado".to_string())
    } else {
        log::warn!("normalize: unrecognized mapping structure");
        return NormalizedPayload::degraded(Vec::new(), "Estrutura de resposta não reconhecida");
    };

    NormalizedPayload {
        items: collect_items(list),
        message,
        confidence: Confidence::Confident,
    }
}

/// Pull (text, justification) pairs out of a payload item list. Items may be
/// plain strings or mappings carrying `text` (legacy `description`) and an
/// optional `justification`. Embedded IDs are ignored: output IDs are always
/// freshly assigned.
fn collect_items(list: &[Value]) -> Vec<Requirement> {
    let mut pairs = Vec::with_capacity(list.len());
    for item in list {
        match item {
            Value::String(s) if !s.trim().is_empty() => {
                pairs.push((s.trim().to_string(), None));
            }
            Value::Object(map) => {
                let text = map
                    .get("text")
                    .and_then(Value::as_str)
                    .or_else(|| map.get("description").and_then(Value::as_str))
                    .map(str::trim)
                    .unwrap_or_default();
                if text.is_empty() {
                    log::warn!("normalize: skipping item without text");
                    continue;
                }
                let justification = map
                    .get("justification")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|j| !j.is_empty())
                    .map(String::from);
                pairs.push((text.to_string(), justification));
            }
            other => {
                log::warn!("normalize: skipping invalid item: {other}");
            }
        }
    }
    dedupe_and_renumber(pairs)
}

/// First occurrence wins; relative order preserved; IDs contiguous from 1.
fn dedupe_and_renumber(pairs: Vec<(String, Option<String>)>) -> Vec<Requirement> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for (text, justification) in pairs {
        let key = text::dedupe_key(&text);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(Requirement {
            id: out.len() as u32 + 1,
            text,
            justification,
        });
    }
    out
}
