//! Criteria expressions and their evaluation against documents.

use serde_json::Value;

use super::compare::{comparable, compare, values_equal};
use super::Cursor;
use crate::document::Fields;
use crate::{Document, StoreError};

/// A Mongo-style criteria object.
///
/// The empty criteria matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    terms: Fields,
}

impl Criteria {
    /// Criteria that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a JSON object into criteria.
    pub fn new(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(terms) => Ok(Self { terms }),
            other => Err(StoreError::InvalidDocument(format!(
                "criteria must be an object, got {}",
                other
            ))),
        }
    }

    /// Single equality term.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    /// Add an equality term.
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Top-level terms whose condition is a literal string, e.g.
    /// `{"status": "open"}`. These are the only terms an equality index can
    /// answer.
    pub fn string_terms(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.terms
            .iter()
            .filter(|(key, value)| !key.starts_with('$') && value.is_string())
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn test(&self, document: &Document) -> bool {
        matches_object(&self.terms, document)
    }

    /// Filter `documents` into a cursor, preserving their order.
    pub fn find<I>(&self, documents: I) -> Cursor
    where
        I: IntoIterator<Item = Document>,
    {
        Cursor::new(documents.into_iter().filter(|d| self.test(d)).collect())
    }
}

impl TryFrom<Value> for Criteria {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Criteria::new(value)
    }
}

fn matches_object(terms: &Fields, document: &Document) -> bool {
    terms.iter().all(|(key, condition)| match key.as_str() {
        "$and" => sub_criteria(condition).all(|c| matches_value(c, document)),
        "$or" => sub_criteria(condition).any(|c| matches_value(c, document)),
        "$nor" => !sub_criteria(condition).any(|c| matches_value(c, document)),
        path => matches_condition(document.get_path(path), condition),
    })
}

fn sub_criteria(condition: &Value) -> impl Iterator<Item = &Value> {
    condition.as_array().into_iter().flatten()
}

fn matches_value(criteria: &Value, document: &Document) -> bool {
    match criteria {
        Value::Object(terms) => matches_object(terms, document),
        _ => false,
    }
}

fn is_operator_object(condition: &Value) -> bool {
    match condition {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn matches_condition(value: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(ops) if is_operator_object(condition) => ops
            .iter()
            .all(|(op, operand)| matches_operator(value, op, operand)),
        _ => matches_eq(value, condition),
    }
}

fn matches_eq(value: Option<&Value>, target: &Value) -> bool {
    match (value, target) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), t) if !t.is_array() => {
            items.iter().any(|item| values_equal(item, t))
        }
        (Some(v), t) => values_equal(v, t),
    }
}

fn matches_range(value: Option<&Value>, operand: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    let check = |v: &Value| comparable(v, operand) && accept(compare(v, operand));
    match value {
        None => false,
        Some(Value::Array(items)) if !operand.is_array() => items.iter().any(check),
        Some(v) => check(v),
    }
}

fn matches_operator(value: Option<&Value>, op: &str, operand: &Value) -> bool {
    use std::cmp::Ordering::*;

    match op {
        "$eq" => matches_eq(value, operand),
        "$ne" => !matches_eq(value, operand),
        "$gt" => matches_range(value, operand, |o| o == Greater),
        "$gte" => matches_range(value, operand, |o| o != Less),
        "$lt" => matches_range(value, operand, |o| o == Less),
        "$lte" => matches_range(value, operand, |o| o != Greater),
        "$in" => operand
            .as_array()
            .is_some_and(|choices| choices.iter().any(|c| matches_eq(value, c))),
        "$nin" => operand
            .as_array()
            .map_or(true, |choices| !choices.iter().any(|c| matches_eq(value, c))),
        "$exists" => value.is_some() == operand.as_bool().unwrap_or(true),
        _ => false,
    }
}
