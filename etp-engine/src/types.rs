// Core types for the elicitation dialogue engine

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Unique identifier for an elicitation session
pub type SessionId = String;

/// A step in the fixed elicitation sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial stage, capturing the contracting necessity
    CollectNeed,
    /// Requirement suggestions presented, list editable
    SuggestRequirements,
    /// Requirement refinement loop
    RefineRequirements,
    /// Requirement list locked in on confirmation
    ConfirmRequirements,
    /// Contracting path selection loop
    RecommendSolutionPath,
    /// PCA inclusion question
    AskPca,
    /// Applicable legal norms question
    AskLegalNorms,
    /// Quantity and estimated value question
    AskQuantValue,
    /// Parcelamento (lot splitting) question
    AskParcelamento,
    /// Full recap awaiting the generation go-ahead
    ConfirmSummary,
    /// Document generation gate
    GenerateEtp,
    /// Generated document review
    Preview,
    /// Terminal stage
    Finalize,
}

impl Stage {
    /// Every stage, in elicitation order.
    pub const ALL: [Stage; 13] = [
        Stage::CollectNeed,
        Stage::SuggestRequirements,
        Stage::RefineRequirements,
        Stage::ConfirmRequirements,
        Stage::RecommendSolutionPath,
        Stage::AskPca,
        Stage::AskLegalNorms,
        Stage::AskQuantValue,
        Stage::AskParcelamento,
        Stage::ConfirmSummary,
        Stage::GenerateEtp,
        Stage::Preview,
        Stage::Finalize,
    ];

    /// Declared successor in the sequence, `None` for the terminal stage.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::CollectNeed => Some(Stage::SuggestRequirements),
            Stage::SuggestRequirements => Some(Stage::RefineRequirements),
            Stage::RefineRequirements => Some(Stage::ConfirmRequirements),
            Stage::ConfirmRequirements => Some(Stage::RecommendSolutionPath),
            Stage::RecommendSolutionPath => Some(Stage::AskPca),
            Stage::AskPca => Some(Stage::AskLegalNorms),
            Stage::AskLegalNorms => Some(Stage::AskQuantValue),
            Stage::AskQuantValue => Some(Stage::AskParcelamento),
            Stage::AskParcelamento => Some(Stage::ConfirmSummary),
            Stage::ConfirmSummary => Some(Stage::GenerateEtp),
            Stage::GenerateEtp => Some(Stage::Preview),
            Stage::Preview => Some(Stage::Finalize),
            Stage::Finalize => None,
        }
    }

    /// Key under which this stage stores its captured answer, if any.
    pub fn answer_key(self) -> Option<&'static str> {
        match self {
            Stage::RecommendSolutionPath => Some("solution_path"),
            Stage::AskPca => Some("pca"),
            Stage::AskLegalNorms => Some("legal_norms"),
            Stage::AskQuantValue => Some("quant_value"),
            Stage::AskParcelamento => Some("parcelamento"),
            _ => None,
        }
    }

    /// Answer key for stages whose field may be skipped. Skip-eligibility is
    /// an explicit per-stage property: only the four question stages are
    /// skippable, every other stage treats a skip as a vague turn.
    pub fn optional_field(self) -> Option<&'static str> {
        match self {
            Stage::AskPca | Stage::AskLegalNorms | Stage::AskQuantValue | Stage::AskParcelamento => {
                self.answer_key()
            }
            _ => None,
        }
    }

    /// Whether unmatched free text is an acceptable answer here. Stages with
    /// a closed command set map unmatched input to `Command::Unclear`.
    pub fn accepts_free_text(self) -> bool {
        !matches!(
            self,
            Stage::ConfirmRequirements
                | Stage::ConfirmSummary
                | Stage::GenerateEtp
                | Stage::Preview
                | Stage::Finalize
        )
    }

    /// Whether structural requirement edits are applied at this stage.
    /// From `ConfirmRequirements` on they are rejected as stage mismatches.
    pub fn holds_requirement_edits(self) -> bool {
        matches!(self, Stage::SuggestRequirements | Stage::RefineRequirements)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Finalize)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::CollectNeed => "collect_need",
            Stage::SuggestRequirements => "suggest_requirements",
            Stage::RefineRequirements => "refine_requirements",
            Stage::ConfirmRequirements => "confirm_requirements",
            Stage::RecommendSolutionPath => "recommend_solution_path",
            Stage::AskPca => "ask_pca",
            Stage::AskLegalNorms => "ask_legal_norms",
            Stage::AskQuantValue => "ask_quant_value",
            Stage::AskParcelamento => "ask_parcelamento",
            Stage::ConfirmSummary => "confirm_summary",
            Stage::GenerateEtp => "generate_etp",
            Stage::Preview => "preview",
            Stage::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::CollectNeed
    }
}

/// One structured, ID-addressed item in the evolving requirement list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Contiguous label, always exactly 1..N after any mutation
    pub id: u32,
    /// Requirement wording
    pub text: String,
    /// Short rationale, generated when the user supplies none
    pub justification: Option<String>,
}

impl Requirement {
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            justification: None,
        }
    }

    pub fn with_justification(id: u32, text: impl Into<String>, justification: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            justification: Some(justification.into()),
        }
    }
}

/// Who produced a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn in the conversation. Append-only, never edited or deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke
    pub role: Role,
    /// What was said
    pub content: String,
    /// Position in the conversation (0-indexed)
    pub order: usize,
    /// When the turn was recorded
    pub created_at: DateTime<Utc>,
}

/// Complete state of one elicitation session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// Current stage in the sequence
    pub stage: Stage,
    /// Free-text statement of the underlying need. Write-once: it changes
    /// only through an explicit restart, which also clears requirements and
    /// answers.
    pub necessity: Option<String>,
    /// Ordered requirement list
    pub requirements: Vec<Requirement>,
    /// Captured answers keyed by stage answer key, in capture order
    pub answers: IndexMap<String, String>,
    /// Stages the user has explicitly confirmed
    pub confirmed: IndexMap<Stage, bool>,
    /// Full conversation history
    pub turns: Vec<Turn>,
    /// Generated document, present from a successful generation on
    pub generated_document: Option<String>,
    /// Per-session commit counter for optimistic concurrency
    pub version: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last commit timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            stage: Stage::CollectNeed,
            necessity: None,
            requirements: Vec::new(),
            answers: IndexMap::new(),
            confirmed: IndexMap::new(),
            turns: Vec::new(),
            generated_document: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn, assigning the next order index.
    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
        let order = self.turns.len();
        self.turns.push(Turn {
            role,
            content: content.into(),
            order,
            created_at: Utc::now(),
        });
    }

    /// Clear everything elicited so far and return to the initial stage.
    /// The turn history survives: it is append-only by contract.
    pub fn reset_elicited(&mut self) {
        self.stage = Stage::CollectNeed;
        self.necessity = None;
        self.requirements.clear();
        self.answers.clear();
        self.confirmed.clear();
        self.generated_document = None;
    }

    pub fn answer(&self, key: &str) -> Option<&str> {
        self.answers.get(key).map(String::as_str)
    }
}

/// A reference to one requirement as the user phrased it. `Last` and
/// `SecondLast` are list-relative and resolve only against the current list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListRef {
    /// 1-based position ("2", "R2", "segundo")
    Index(usize),
    /// "último"
    Last,
    /// "penúltimo"
    SecondLast,
}

impl ListRef {
    /// Resolve against a list of `len` items to a 1-based index, if in range.
    pub fn resolve(self, len: usize) -> Option<usize> {
        match self {
            ListRef::Index(i) if i >= 1 && i <= len => Some(i),
            ListRef::Index(_) => None,
            ListRef::Last if len >= 1 => Some(len),
            ListRef::Last => None,
            ListRef::SecondLast if len >= 2 => Some(len - 1),
            ListRef::SecondLast => None,
        }
    }
}

/// Resolve a batch of references: in-range, deduplicated, ascending.
pub fn resolve_refs(refs: &[ListRef], len: usize) -> Vec<usize> {
    let mut out: Vec<usize> = refs.iter().filter_map(|r| r.resolve(len)).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// The classified, structured interpretation of one user turn
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Generic stage confirmation ("ok", "pode seguir")
    Confirm,
    /// Explicit go-ahead for document generation ("pode gerar")
    ConfirmGenerate,
    /// Declined to answer an optional field ("não sei", "pular")
    Skip,
    /// Replace the text of exactly one requirement
    Edit {
        targets: Vec<ListRef>,
        text: Option<String>,
    },
    /// Delete the referenced requirements
    Remove { targets: Vec<ListRef> },
    /// Retain only the referenced requirements
    KeepOnly { targets: Vec<ListRef> },
    /// Append a new requirement
    Include { text: String },
    /// Discard everything elicited and start over, optionally with a new
    /// necessity already stated
    RestartNecessity { text: Option<String> },
    /// Substantive free-text answer for the current stage
    FreeAnswer { text: String },
    /// Unmatched input at a stage with a closed command set
    Unclear,
}

/// Command grouping used by the transition table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandClass {
    Confirm,
    ConfirmGenerate,
    Skip,
    Structural,
    Restart,
    FreeAnswer,
    Unclear,
}

impl CommandClass {
    pub const ALL: [CommandClass; 7] = [
        CommandClass::Confirm,
        CommandClass::ConfirmGenerate,
        CommandClass::Skip,
        CommandClass::Structural,
        CommandClass::Restart,
        CommandClass::FreeAnswer,
        CommandClass::Unclear,
    ];
}

impl Command {
    pub fn class(&self) -> CommandClass {
        match self {
            Command::Confirm => CommandClass::Confirm,
            Command::ConfirmGenerate => CommandClass::ConfirmGenerate,
            Command::Skip => CommandClass::Skip,
            Command::Edit { .. } | Command::Remove { .. } | Command::KeepOnly { .. } | Command::Include { .. } => {
                CommandClass::Structural
            }
            Command::RestartNecessity { .. } => CommandClass::Restart,
            Command::FreeAnswer { .. } => CommandClass::FreeAnswer,
            Command::Unclear => CommandClass::Unclear,
        }
    }
}

/// Outcome of one processed turn, before commit
#[derive(Clone, Debug)]
pub struct StageResult {
    /// Stage after the turn
    pub next_stage: Stage,
    /// Assistant response for the turn
    pub response_text: String,
    /// Requirement list after the turn
    pub requirements_snapshot: Vec<Requirement>,
    /// Whether elicited state (stage, requirements, answers) changed
    pub state_changed: bool,
}

/// What the caller layer receives from a committed turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub stage: Stage,
    pub response_text: String,
    pub requirements: Vec<Requirement>,
    pub state_changed: bool,
}
