//! The turn state machine and its driver.

pub mod graph;
pub mod state;

pub use graph::{TurnRequest, TurnStream, TurnSummary, Workflow};
pub use state::{next_stage, QuestionCategory, RetrieverIntent, Stage, TurnState};
