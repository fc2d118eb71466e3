//! Per-turn conversation state and the workflow stage machine.
//!
//! Routing lives in a pure transition function over an enumerated stage
//! set rather than inside stage bodies, so the turn's control flow can be
//! tested without any collaborator.

use crate::retriever::filter::PriceCampusInfo;
use serde::{Deserialize, Serialize};

/// Outcome of the 4-way classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    ProgramSelection,
    Rules,
    FollowUp,
    #[default]
    General,
}

/// Whether the previous turn's exclusion list applies to this retrieval.
/// `Repeat` deliberately disables exclusion so the user can re-request
/// previously shown results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetrieverIntent {
    #[default]
    New,
    Repeat,
}

/// Transient per-turn state, owned exclusively by one workflow invocation
#[derive(Debug, Clone, Default)]
pub struct TurnState {
    /// Raw user input
    pub query: String,
    /// Prior turns, flattened into text blocks
    pub history: String,
    /// Set once by the rewrite stage; never mutated after
    pub rewritten_query: Option<String>,
    /// Set once by the classifier
    pub question_category: Option<QuestionCategory>,
    pub program_type: Option<Vec<String>>,
    pub price_campus_info: PriceCampusInfo,
    pub entry_level: Vec<String>,
    pub retriever_intent: RetrieverIntent,
    /// Ids already shown to the user across turns
    pub excluded_ids: Vec<String>,
    /// Formatted retrieved documents, input to grounded generation
    pub content: Option<Vec<String>>,
    /// Final generated text
    pub response: Option<String>,
}

impl TurnState {
    pub fn new(query: String, history: String, excluded_ids: Vec<String>) -> Self {
        Self {
            query,
            history,
            excluded_ids,
            ..Default::default()
        }
    }

    /// Query used downstream: the rewrite when available, the raw input
    /// otherwise.
    pub fn effective_query(&self) -> &str {
        self.rewritten_query.as_deref().unwrap_or(&self.query)
    }
}

/// Stages of one conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RewriteQuery,
    Classify,
    ExtractFilters,
    Retrieve,
    GenerateGrounded,
    GenerateRules,
    GenerateFollowUp,
    GenerateGeneral,
    Done,
}

impl Stage {
    /// Terminal generation stages end the graph
    pub fn is_generation(&self) -> bool {
        matches!(
            self,
            Stage::GenerateGrounded
                | Stage::GenerateRules
                | Stage::GenerateFollowUp
                | Stage::GenerateGeneral
        )
    }
}

/// Pure transition function. The edge out of `Classify` is chosen by the
/// classified category, defaulting to the general branch when the field is
/// absent.
pub fn next_stage(stage: Stage, state: &TurnState) -> Stage {
    match stage {
        Stage::RewriteQuery => Stage::Classify,
        Stage::Classify => match state.question_category.unwrap_or_default() {
            QuestionCategory::ProgramSelection => Stage::ExtractFilters,
            QuestionCategory::Rules => Stage::GenerateRules,
            QuestionCategory::FollowUp => Stage::GenerateFollowUp,
            QuestionCategory::General => Stage::GenerateGeneral,
        },
        Stage::ExtractFilters => Stage::Retrieve,
        Stage::Retrieve => Stage::GenerateGrounded,
        _ => Stage::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(category: Option<QuestionCategory>) -> TurnState {
        TurnState {
            question_category: category,
            ..Default::default()
        }
    }

    #[test]
    fn test_routing_reaches_matching_branch() {
        let cases = [
            (QuestionCategory::ProgramSelection, Stage::ExtractFilters),
            (QuestionCategory::Rules, Stage::GenerateRules),
            (QuestionCategory::FollowUp, Stage::GenerateFollowUp),
            (QuestionCategory::General, Stage::GenerateGeneral),
        ];
        for (category, expected) in cases {
            let state = state_with(Some(category));
            assert_eq!(next_stage(Stage::Classify, &state), expected);
        }
    }

    #[test]
    fn test_unset_category_routes_to_general() {
        let state = state_with(None);
        assert_eq!(next_stage(Stage::Classify, &state), Stage::GenerateGeneral);
    }

    #[test]
    fn test_program_selection_path_order() {
        let state = state_with(Some(QuestionCategory::ProgramSelection));
        assert_eq!(next_stage(Stage::RewriteQuery, &state), Stage::Classify);
        assert_eq!(next_stage(Stage::Classify, &state), Stage::ExtractFilters);
        assert_eq!(next_stage(Stage::ExtractFilters, &state), Stage::Retrieve);
        assert_eq!(next_stage(Stage::Retrieve, &state), Stage::GenerateGrounded);
        assert_eq!(next_stage(Stage::GenerateGrounded, &state), Stage::Done);
    }

    #[test]
    fn test_generation_stages_terminate() {
        let state = TurnState::default();
        for stage in [
            Stage::GenerateGrounded,
            Stage::GenerateRules,
            Stage::GenerateFollowUp,
            Stage::GenerateGeneral,
        ] {
            assert!(stage.is_generation());
            assert_eq!(next_stage(stage, &state), Stage::Done);
        }
    }

    #[test]
    fn test_effective_query_prefers_rewrite() {
        let mut state = TurnState::new("raw".into(), String::new(), vec![]);
        assert_eq!(state.effective_query(), "raw");
        state.rewritten_query = Some("rewritten".into());
        assert_eq!(state.effective_query(), "rewritten");
    }

    #[test]
    fn test_retriever_intent_wire_format() {
        let intent: RetrieverIntent = serde_json::from_str("\"REPEAT\"").unwrap();
        assert_eq!(intent, RetrieverIntent::Repeat);
        assert_eq!(RetrieverIntent::default(), RetrieverIntent::New);
    }
}
