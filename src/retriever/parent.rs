//! Parent-document store.
//!
//! Child-document hits only carry a parent identifier; the full program
//! records live in an offline-built JSON map loaded here once. Resolved
//! records are rendered into structured text blocks for the grounded
//! generation prompt: program header, per-year detail sections, then the
//! trailing descriptive fields.

use crate::errors::{AdvisorError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

const SECTION_DIVIDER: &str = "\n---------------------------------------------------------------------------------------------------------------------------\n\n";

const YEAR_KEYS: [&str; 5] = ["year_1", "year_2", "year_3", "year_4", "year_5"];

const FOOTER_FIELDS: [&str; 6] = [
    "campuses",
    "languages",
    "school_type",
    "field",
    "program_type",
    "program_link",
];

/// Offline-built identifier -> full-record mapping
#[derive(Debug)]
pub struct ParentStore {
    records: HashMap<String, Value>,
}

impl ParentStore {
    /// Load the parent map from its JSON file. A missing or malformed file
    /// is a deployment error and fails loudly.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AdvisorError::ConfigError(format!(
                "cannot read parent documents at {}: {}",
                path.display(),
                e
            ))
        })?;
        let records: HashMap<String, Value> = serde_json::from_str(&contents).map_err(|e| {
            AdvisorError::ConfigError(format!("parent documents are not a valid id map: {}", e))
        })?;

        Ok(Self { records })
    }

    #[cfg(test)]
    pub fn from_records(records: HashMap<String, Value>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve ids to formatted program blocks; unknown ids are skipped
    pub fn resolve(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.records.get(id))
            .map(format_program_block)
            .collect()
    }
}

/// Render one program record into the text block the grounded prompt
/// receives. Every year entry is kept, including those without an intake,
/// since they still carry price and campus detail.
pub fn format_program_block(record: &Value) -> String {
    let program = text_field(record, "program", "Unknown");
    let description = text_field(record, "program_description", "N/A");
    let school = text_field(record, "school", "Unknown");
    let school_logo = text_field(record, "school_logo", "N/A");
    let school_rank = text_field(record, "school_rank", "un ranked");
    let program_id = text_field(record, "program_id", "N/A");
    let accreditations = record
        .get("school_accreditations")
        .cloned()
        .unwrap_or(Value::Array(vec![]));

    let mut parts = Vec::new();
    parts.push(format!("Program: {}\n\n", program));
    parts.push(format!(
        "{{'school_logo': {}, 'program': '{}', 'program_description': {}, 'school': '{}', \
         'school rank': '{}', 'school_accreditations': {}, 'program_id': {}}}",
        school_logo, program, description, school, school_rank, accreditations, program_id
    ));

    if let Some(year_details) = record.get("year_details").and_then(Value::as_object) {
        for year_key in YEAR_KEYS {
            let Some(entries) = year_details.get(year_key).and_then(Value::as_array) else {
                continue;
            };
            if entries.is_empty() {
                continue;
            }
            let renamed: Vec<Value> = entries.iter().map(rename_intake_field).collect();
            parts.push(format!(
                "{}'{}': {}",
                SECTION_DIVIDER,
                year_key,
                Value::Array(renamed)
            ));
        }
    }

    let footer: Vec<String> = FOOTER_FIELDS
        .iter()
        .filter_map(|field| {
            record.get(*field).map(|value| match value {
                Value::String(s) => format!("'{}': '{}'", field, s),
                other => format!("'{}': {}", field, other),
            })
        })
        .collect();
    if !footer.is_empty() {
        parts.push(format!("{}{}", SECTION_DIVIDER, footer.join(", ")));
    }

    parts.concat()
}

/// Year entries use `program_intake` offline; the prompt vocabulary calls
/// it `year_intake`.
fn rename_intake_field(entry: &Value) -> Value {
    let Some(object) = entry.as_object() else {
        return entry.clone();
    };
    let mut renamed = object.clone();
    if let Some(intake) = renamed.remove("program_intake") {
        renamed.insert("year_intake".to_string(), intake);
    }
    Value::Object(renamed)
}

fn text_field(record: &Value, field: &str, default: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}
