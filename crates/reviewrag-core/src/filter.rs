//! Filter predicates over [`ReviewMetadata`].
//!
//! A [`FilterConfig`] is what a caller picks (review type, minimum thumbs up);
//! [`Predicate::from_config`] turns it into clauses over the metadata
//! vocabulary. Clauses are joined by conjunction. The same predicate can be
//! rendered as a LanceDB filter string or evaluated in memory.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ReviewMetadata;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    #[default]
    All,
    NegativeOnly,
    PositiveOnly,
}

impl ReviewType {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewType::All => "All reviews",
            ReviewType::NegativeOnly => "Negative only",
            ReviewType::PositiveOnly => "Positive only",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub review_type: ReviewType,
    #[serde(default)]
    pub min_thumbs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolField {
    IsNegative,
    IsPositive,
}

impl BoolField {
    pub fn column(&self) -> &'static str {
        match self {
            BoolField::IsNegative => "is_negative",
            BoolField::IsPositive => "is_positive",
        }
    }

    fn get(&self, m: &ReviewMetadata) -> bool {
        match self {
            BoolField::IsNegative => m.is_negative,
            BoolField::IsPositive => m.is_positive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntField {
    ThumbsUp,
}

impl IntField {
    pub fn column(&self) -> &'static str {
        match self {
            IntField::ThumbsUp => "thumbs_up",
        }
    }

    fn get(&self, m: &ReviewMetadata) -> i64 {
        match self {
            IntField::ThumbsUp => i64::from(m.thumbs_up),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Is(BoolField, bool),
    AtLeast(IntField, i64),
}

impl Clause {
    pub fn matches(&self, m: &ReviewMetadata) -> bool {
        match self {
            Clause::Is(field, want) => field.get(m) == *want,
            Clause::AtLeast(field, min) => field.get(m) >= *min,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Is(field, v) => write!(f, "{} = {}", field.column(), v),
            Clause::AtLeast(field, v) => write!(f, "{} >= {}", field.column(), v),
        }
    }
}

/// Non-empty conjunction of clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// `None` when the config asks for nothing narrower than "all reviews".
    pub fn from_config(config: &FilterConfig) -> Option<Self> {
        let mut clauses = Vec::new();
        match config.review_type {
            ReviewType::All => {}
            ReviewType::NegativeOnly => clauses.push(Clause::Is(BoolField::IsNegative, true)),
            ReviewType::PositiveOnly => clauses.push(Clause::Is(BoolField::IsPositive, true)),
        }
        if config.min_thumbs > 0 {
            clauses.push(Clause::AtLeast(IntField::ThumbsUp, i64::from(config.min_thumbs)));
        }
        (!clauses.is_empty()).then_some(Self { clauses })
    }

    /// Filter expression for LanceDB's `only_if`.
    pub fn to_sql(&self) -> String {
        self.clauses.iter().map(ToString::to_string).collect::<Vec<_>>().join(" AND ")
    }

    pub fn matches(&self, m: &ReviewMetadata) -> bool {
        self.clauses.iter().all(|c| c.matches(m))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
