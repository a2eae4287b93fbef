//! Intent classification: one user turn in, one [`Command`] out.
//!
//! A fixed, ordered rule table is evaluated top-down over the folded text and
//! the first matching rule wins. The order carries meaning: restart phrases
//! outrank everything, generation go-aheads outrank generic confirmations
//! (plain "ok" must never count as "pode gerar"), structural edit phrases
//! outrank the confirmation word "manter", and free text is only a fallback
//! at stages that accept it. At stages with a closed command set an unmatched
//! turn is [`Command::Unclear`], never a coerced answer.

pub mod refs;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text;
use crate::types::{Command, ListRef, Stage};

/// Everything a rule may look at.
struct MatchCtx<'a> {
    /// Original text, trimmed (casing and accents preserved for captures)
    raw: &'a str,
    /// Lower-cased, accent-folded text used for matching
    folded: String,
    /// Requirement references found anywhere in the text
    refs: Vec<ListRef>,
    stage: Stage,
}

struct Rule {
    name: &'static str,
    build: fn(&MatchCtx) -> Option<Command>,
}

/// The ordered rule table. First match wins; order is part of the contract.
const RULES: &[Rule] = &[
    Rule { name: "restart_necessity", build: match_restart },
    Rule { name: "confirm_generate", build: match_confirm_generate },
    Rule { name: "remove", build: match_remove },
    Rule { name: "keep_only", build: match_keep_only },
    Rule { name: "edit", build: match_edit },
    Rule { name: "include", build: match_include },
    Rule { name: "skip", build: match_skip },
    Rule { name: "confirm", build: match_confirm },
];

/// Classify one turn against the current stage.
pub fn classify(stage: Stage, raw_text: &str) -> Command {
    let raw = raw_text.trim();
    if raw.is_empty() {
        return Command::Unclear;
    }
    let folded = text::fold(raw);
    let ctx = MatchCtx {
        raw,
        refs: refs::extract(&folded),
        folded,
        stage,
    };

    for rule in RULES {
        if let Some(command) = (rule.build)(&ctx) {
            log::debug!("classify: rule '{}' matched at stage {}", rule.name, stage);
            return command;
        }
    }

    if stage.accepts_free_text() {
        Command::FreeAnswer {
            text: raw.to_string(),
        }
    } else {
        Command::Unclear
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

static RESTART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"nova\s+necessidade|trocar\s+a\s+necessidade|mudou\s+a\s+necessidade|preciso\s+trocar\s+a\s+necessidade|na\s+verdade\s+a\s+necessidade\s+e\b",
    )
    .unwrap()
});

// Runs on the raw text so the captured necessity keeps its casing/accents.
static RESTART_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:nova necessidade|na verdade a necessidade [ée]|(?:preciso trocar|trocar|mudou) a necessidade(?: para)?)\s*[:,.-]?\s*(.*)$",
    )
    .unwrap()
});

fn match_restart(ctx: &MatchCtx) -> Option<Command> {
    if !RESTART.is_match(&ctx.folded) {
        return None;
    }
    let captured = RESTART_TEXT
        .captures(ctx.raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());
    Some(Command::RestartNecessity { text: captured })
}

static CONFIRM_GENERATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"pode\s+gerar|gerar\s+(?:o\s+)?etp|gera\s+(?:o\s+)?etp|ok\s+gerar|fechou\s+gerar|^gerar[\s.!?]*$").unwrap()
});

fn match_confirm_generate(ctx: &MatchCtx) -> Option<Command> {
    CONFIRM_GENERATE.is_match(&ctx.folded).then_some(Command::ConfirmGenerate)
}

static REMOVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:remover|remova|tirar|tire|excluir|exclua|deletar|delete|retirar|retire|apagar|apague)\b").unwrap());

fn match_remove(ctx: &MatchCtx) -> Option<Command> {
    if REMOVE.is_match(&ctx.folded) && !ctx.refs.is_empty() {
        return Some(Command::Remove {
            targets: ctx.refs.clone(),
        });
    }
    None
}

static KEEP_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"manter\s+apenas|manter\s+somente|manter\s+so\b|so\s+manter").unwrap());

// Bare "apenas 1 e 3" only reads as a keep-only while a requirement list is
// under review; at the question stages "apenas 10 unidades" is an answer.
static KEEP_ONLY_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsomente\b|\bapenas\b").unwrap());

fn match_keep_only(ctx: &MatchCtx) -> Option<Command> {
    if ctx.refs.is_empty() {
        return None;
    }
    let matched = KEEP_ONLY.is_match(&ctx.folded)
        || (ctx.stage.holds_requirement_edits() && KEEP_ONLY_BARE.is_match(&ctx.folded));
    if matched {
        return Some(Command::KeepOnly {
            targets: ctx.refs.clone(),
        });
    }
    None
}

static EDIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:alterar|altere|modificar|modifique|trocar|troque|mudar|mude|editar|edite|ajustar|ajuste|corrigir|corrija)\b").unwrap());

// Replacement wording comes after a colon, from the raw text.
static AFTER_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*(.+)$").unwrap());

fn match_edit(ctx: &MatchCtx) -> Option<Command> {
    if !EDIT.is_match(&ctx.folded) {
        return None;
    }
    // Targets live before the colon; the replacement text after it may carry
    // numbers of its own ("trocar 3: garantia de 24 meses").
    let head = match ctx.folded.find(':') {
        Some(i) => &ctx.folded[..i],
        None => ctx.folded.as_str(),
    };
    let targets = refs::extract(head);
    if targets.is_empty() {
        return None;
    }
    let new_text = AFTER_COLON
        .captures(ctx.raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());
    Some(Command::Edit { targets, text: new_text })
}

static INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:adicionar|adicione|incluir|inclua|acrescentar|acrescente)\b|novo\s+requisito|mais\s+um\b").unwrap());

// Same keywords, matched on the raw text to slice the remainder out of it.
// Longer alternatives first: alternation is leftmost-first.
static INCLUDE_RAW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:novo requisito|mais um requisito|mais um|adicionar|adicione|incluir|inclua|acrescentar|acrescente)\b\s*[:,-]?\s*(.*)$").unwrap()
});

fn match_include(ctx: &MatchCtx) -> Option<Command> {
    if !INCLUDE.is_match(&ctx.folded) {
        return None;
    }
    let content = INCLUDE_RAW
        .captures(ctx.raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());
    match content {
        // "adicionar" with nothing after it: there is no requirement text to
        // append, so let the stage ask for it.
        None => Some(Command::Unclear),
        Some(text) => Some(Command::Include { text }),
    }
}

/// Whole-message skip phrases.
const SKIP_PHRASES: &[&str] = &[
    "nao sei",
    "n sei",
    "ns",
    "pular",
    "pula",
    "depois",
    "sem informacao",
    "nao tenho",
    "nao informado",
    "desconheco",
    "sem ideia",
    "sem nocao",
];

/// Uncertainty wordings that count as a skip wherever they appear.
static UNCERTAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"nao\s+sei|\bns\b|desconheco|nao\s+tenho\s+(?:certeza|ideia|nocao)|sem\s+(?:nocao|ideia|base)|dificil\s+estimar|nao\s+faco\s+ideia|ainda\s+nao\s+sei|por\s+enquanto\s+nada|nao\s+tenho\s+isso",
    )
    .unwrap()
});

fn strip_trailing_punct(folded: &str) -> &str {
    folded.trim_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '!' | '?' | ','))
}

fn match_skip(ctx: &MatchCtx) -> Option<Command> {
    let bare = strip_trailing_punct(&ctx.folded);
    if SKIP_PHRASES.contains(&bare) || UNCERTAIN.is_match(&ctx.folded) {
        return Some(Command::Skip);
    }
    None
}

/// Vague-acknowledgment vocabulary. A turn is a generic confirmation only
/// when every word of it comes from this set, so "ok" confirms but
/// "a capacidade está ok, mas aumente o prazo" stays a free answer.
const ACK_TOKENS: &[&str] = &[
    "ok", "okay", "blz", "beleza", "sim", "certo", "correto", "confirmo", "confirmado", "perfeito",
    "fechou", "concordo", "acordo", "de", "aceito", "esta", "ta", "bom", "assim", "pode", "ser",
    "seguir", "segue", "continuar", "prosseguir", "manter", "mantenha", "mantido", "isso", "mesmo",
    "vamos", "entendido", "manda", "partiu", "uai", "claro", "exato", "positivo",
];

fn match_confirm(ctx: &MatchCtx) -> Option<Command> {
    // At the yes/no question stages a whole-message "sim" answers the
    // question itself, so it falls through to FreeAnswer and the stage
    // interpreter records it ("não" never matches here and already does).
    if matches!(ctx.stage, Stage::AskPca | Stage::AskParcelamento)
        && strip_trailing_punct(&ctx.folded) == "sim"
    {
        return None;
    }
    let mut any = false;
    for word in ctx.folded.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if !ACK_TOKENS.contains(&word) {
            return None;
        }
        any = true;
    }
    any.then_some(Command::Confirm)
}
