//! Filter-expression tree and search-parameter construction.
//!
//! Pure translation from extracted constraints to a retrieval filter; the
//! retrievers apply the result verbatim and never edit filter semantics.

use crate::config::RetrievalConfig;
use qdrant_client::qdrant::{
    condition::ConditionOneOf, r#match::MatchValue, Condition, FieldCondition, Filter, Match,
    Range, RepeatedIntegers, RepeatedStrings,
};
use serde::{Deserialize, Serialize};

/// Full catalog of known program types. Substituted whenever extraction
/// yields no program-type constraint: the type filter is always present,
/// never a no-op.
pub const DEFAULT_PROGRAM_TYPES: [&str; 12] = [
    "PGE",
    "BTS",
    "BBA",
    "MIM",
    "MBA",
    "Other",
    "Bachelor",
    "Cycle prépa",
    "Cycle d'Ingénieur",
    "Cycle Préparatoire",
    "Programme d'Ingénieur",
    "Master",
];

/// Direction of an approximate price constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceCondition {
    #[serde(rename = "gt", alias = "gte")]
    Gt,
    #[serde(rename = "lt", alias = "lte")]
    Lt,
}

/// Price / campus / language constraints extracted from the query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceCampusInfo {
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub price_condition: Option<PriceCondition>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub primos_arrivant: Option<bool>,
    #[serde(default)]
    pub school_rank: Option<i64>,
}

/// A tree of conditions over document metadata fields
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// field >= value
    GtEq(String, i64),
    /// field <= value
    LtEq(String, i64),
    /// field == value
    EqBool(String, bool),
    /// field matches one of the given keywords
    AnyOf(String, Vec<String>),
    /// field matches none of the given keywords
    NoneOf(String, Vec<String>),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    /// Convert to a top-level qdrant filter
    pub fn to_filter(&self) -> Filter {
        match self {
            FilterExpr::And(children) => Filter {
                must: children.iter().map(|c| c.to_condition()).collect(),
                ..Default::default()
            },
            FilterExpr::Or(children) => Filter {
                should: children.iter().map(|c| c.to_condition()).collect(),
                ..Default::default()
            },
            other => Filter {
                must: vec![other.to_condition()],
                ..Default::default()
            },
        }
    }

    fn to_condition(&self) -> Condition {
        match self {
            FilterExpr::GtEq(field, value) => field_condition(FieldCondition {
                key: field.clone(),
                range: Some(Range {
                    gte: Some(*value as f64),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            FilterExpr::LtEq(field, value) => field_condition(FieldCondition {
                key: field.clone(),
                range: Some(Range {
                    lte: Some(*value as f64),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            FilterExpr::EqBool(field, value) => field_condition(FieldCondition {
                key: field.clone(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Boolean(*value)),
                }),
                ..Default::default()
            }),
            FilterExpr::AnyOf(field, values) => field_condition(FieldCondition {
                key: field.clone(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keywords(RepeatedStrings {
                        strings: values.clone(),
                    })),
                }),
                ..Default::default()
            }),
            // Payload ids are strings or integers depending on corpus
            // generation vintage; excluding under both representations keeps
            // the condition effective either way (the arm that does not
            // match the field's type is vacuously true).
            FilterExpr::NoneOf(field, values) => {
                let mut must = vec![field_condition(FieldCondition {
                    key: field.clone(),
                    r#match: Some(Match {
                        match_value: Some(MatchValue::ExceptKeywords(RepeatedStrings {
                            strings: values.clone(),
                        })),
                    }),
                    ..Default::default()
                })];

                let integers: Vec<i64> = values.iter().filter_map(|v| v.parse().ok()).collect();
                if !integers.is_empty() {
                    must.push(field_condition(FieldCondition {
                        key: field.clone(),
                        r#match: Some(Match {
                            match_value: Some(MatchValue::ExceptIntegers(RepeatedIntegers {
                                integers,
                            })),
                        }),
                        ..Default::default()
                    }));
                }

                if must.len() == 1 {
                    must.into_iter().next().unwrap()
                } else {
                    Condition {
                        condition_one_of: Some(ConditionOneOf::Filter(Filter {
                            must,
                            ..Default::default()
                        })),
                    }
                }
            }
            FilterExpr::And(_) | FilterExpr::Or(_) => Condition {
                condition_one_of: Some(ConditionOneOf::Filter(self.to_filter())),
            },
        }
    }
}

fn field_condition(field: FieldCondition) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(field)),
    }
}

/// Immutable parameters the retrievers apply verbatim
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub k: usize,
    pub filter: FilterExpr,
}

/// Value object passed into every retrieval call
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub rewritten_query: String,
    pub search_params: SearchParams,
}

/// Build the filter-condition tree from the extracted constraints.
///
/// The exclusion condition is included only when there are ids to exclude
/// AND the exclude flag is set; the REPEAT intent path deliberately
/// disables it so previously shown programs can reappear.
pub fn build_filter_conditions(
    program_types: &[String],
    exclude_ids: &[String],
    exclude: bool,
    price_campus: &PriceCampusInfo,
    entry_level: &[String],
    tunables: &RetrievalConfig,
) -> FilterExpr {
    let mut conditions = Vec::new();

    // Extracted prices are approximate ("around 10k"), so bounds are
    // padded toward recall rather than applied exactly.
    if let Some(price) = price_campus.price {
        match price_campus.price_condition {
            Some(PriceCondition::Gt) => {
                conditions.push(FilterExpr::GtEq(
                    "price".to_string(),
                    price - tunables.price_band_lower,
                ));
            }
            Some(PriceCondition::Lt) => {
                conditions.push(FilterExpr::LtEq(
                    "price".to_string(),
                    price + tunables.price_band_upper,
                ));
            }
            None => {}
        }
    }

    if price_campus.primos_arrivant == Some(true) {
        conditions.push(FilterExpr::EqBool("primos_arrivant".to_string(), true));
    }

    if let Some(languages) = &price_campus.languages {
        let language_conditions: Vec<FilterExpr> = languages
            .iter()
            .map(|lang| FilterExpr::EqBool(lang.clone(), true))
            .collect();
        match language_conditions.len() {
            0 => {}
            1 => conditions.push(language_conditions.into_iter().next().unwrap()),
            _ => conditions.push(FilterExpr::Or(language_conditions)),
        }
    }

    if !entry_level.is_empty() {
        let level_conditions: Vec<FilterExpr> = entry_level
            .iter()
            .map(|level| FilterExpr::EqBool(level.clone(), true))
            .collect();
        if level_conditions.len() == 1 {
            conditions.push(level_conditions.into_iter().next().unwrap());
        } else {
            conditions.push(FilterExpr::Or(level_conditions));
        }
    }

    // Lower numeric rank is better, so a rank constraint is an upper bound
    if let Some(rank) = price_campus.school_rank {
        conditions.push(FilterExpr::LtEq("school_rank".to_string(), rank));
    }

    // Program-type filter is always present
    let types: Vec<String> = if program_types.is_empty() {
        DEFAULT_PROGRAM_TYPES.iter().map(|s| s.to_string()).collect()
    } else {
        program_types.to_vec()
    };
    conditions.push(FilterExpr::AnyOf("program_type".to_string(), types));

    if !exclude_ids.is_empty() && exclude {
        conditions.push(FilterExpr::NoneOf(
            "program_id".to_string(),
            exclude_ids.to_vec(),
        ));
    }

    if conditions.len() == 1 {
        conditions.into_iter().next().unwrap()
    } else {
        FilterExpr::And(conditions)
    }
}

/// Build the full search parameters for a child-document search.
///
/// Requests one extra result beyond the caller's `k` (headroom for
/// de-duplication downstream; tunable, not a contract).
pub fn build_search_params(
    program_types: &[String],
    k: usize,
    exclude_ids: &[String],
    price_campus: &PriceCampusInfo,
    entry_level: &[String],
    exclude: bool,
    tunables: &RetrievalConfig,
) -> SearchParams {
    SearchParams {
        k: k + tunables.k_headroom,
        filter: build_filter_conditions(
            program_types,
            exclude_ids,
            exclude,
            price_campus,
            entry_level,
            tunables,
        ),
    }
}
