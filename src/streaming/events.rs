//! Event vocabulary of a streamed turn.

use serde::{Deserialize, Serialize};

/// Kind of answer the turn produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Plain conversational answer
    #[default]
    Text,
    /// Grounded program recommendations
    Programs,
}

/// One event in a turn's output stream.
///
/// Ordering invariants: at most one `response_type` metadata event, emitted
/// before the first text delta; a final metadata event (run id + rewritten
/// query) precedes the terminal `Done`; the stream always ends with `Done`,
/// even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextDelta {
        text: String,
    },
    Metadata {
        #[serde(skip_serializing_if = "Option::is_none")]
        response_type: Option<ResponseType>,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rewritten_query: Option<String>,
    },
    SchoolLogo {
        school_logo: String,
    },
    ProgramLink {
        program_link: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        message: String,
    },
    Done,
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::TextDelta { text: text.into() }
    }

    pub fn response_type(response_type: ResponseType) -> Self {
        StreamEvent::Metadata {
            response_type: Some(response_type),
            run_id: None,
            rewritten_query: None,
        }
    }

    pub fn final_metadata(run_id: Option<String>, rewritten_query: Option<String>) -> Self {
        StreamEvent::Metadata {
            response_type: None,
            run_id,
            rewritten_query,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, StreamEvent::TextDelta { .. })
    }
}
