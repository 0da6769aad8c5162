//! Merge logic for combining two documents.
//!
//! `merge(base, overlay)` walks every key of the overlay and combines it with
//! the base value according to the field's [`FieldMergeStrategy`]. Keys only
//! present in the base pass through unchanged.
//!
//! # Strategies
//!
//! - `Sum`: numbers are added; objects are combined over the union of their
//!   keys, recursing into matching keys. A side missing a key counts as 0.
//!   This models counters recorded offline being added to, not replacing,
//!   the server's counts.
//! - `Union`: arrays are combined as a deduplicated union. Base order is
//!   kept and overlay-only elements are appended.
//! - `Override`: the overlay value wins. Nested objects are not deep-merged.
//!
//! When the two sides of a `Sum` or `Union` field do not have the expected
//! shapes, the overlay value replaces the base.
//!
//! `merge` is not commutative in general, but `Sum` and `Union` fields are
//! commutative and associative (for `Union`, up to element order).

use crate::{Document, FieldMergeStrategy, MergeSchema};
use serde_json::{Map, Number, Value};

/// Combines documents according to a [`MergeSchema`].
#[derive(Debug, Clone, Copy)]
pub struct MergeEngine<'a> {
    schema: &'a MergeSchema,
}

impl<'a> MergeEngine<'a> {
    /// Create a merge engine for a schema.
    pub fn new(schema: &'a MergeSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'a MergeSchema {
        self.schema
    }

    /// Merge `overlay` into `base`, producing a new document.
    ///
    /// Neither input is modified.
    pub fn merge(&self, base: &Document, overlay: &Document) -> Document {
        let mut merged = base.clone();

        for (field, value) in overlay {
            let combined = match self.schema.strategy_for(field) {
                FieldMergeStrategy::Sum => sum_values(base.get(field), value),
                FieldMergeStrategy::Union => union_values(base.get(field), value),
                FieldMergeStrategy::Override => value.clone(),
            };
            merged.insert(field.clone(), combined);
        }

        merged
    }

    /// Fold a sequence of patches left to right, starting from `{}`.
    pub fn fold<'p>(&self, patches: impl IntoIterator<Item = &'p Document>) -> Document {
        patches
            .into_iter()
            .fold(Document::new(), |acc, patch| self.merge(&acc, patch))
    }
}

/// Merge two documents with a schema.
pub fn merge(schema: &MergeSchema, base: &Document, overlay: &Document) -> Document {
    MergeEngine::new(schema).merge(base, overlay)
}

fn sum_values(base: Option<&Value>, overlay: &Value) -> Value {
    match (base, overlay) {
        (Some(Value::Number(a)), Value::Number(b)) => add_numbers(a, b),
        (Some(Value::Object(a)), Value::Object(b)) => {
            let mut summed = Map::new();
            for (key, value) in a {
                let combined = match b.get(key) {
                    Some(other) => sum_values(Some(value), other),
                    None => value.clone(),
                };
                summed.insert(key.clone(), combined);
            }
            for (key, value) in b {
                if !a.contains_key(key) {
                    summed.insert(key.clone(), value.clone());
                }
            }
            Value::Object(summed)
        }
        // Missing on the base side counts as zero; mismatched shapes override
        _ => overlay.clone(),
    }
}

fn add_numbers(a: &Number, b: &Number) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }

    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .map(Value::Number)
        .unwrap_or_else(|| Value::Number(b.clone()))
}

fn union_values(base: Option<&Value>, overlay: &Value) -> Value {
    let Value::Array(incoming) = overlay else {
        return overlay.clone();
    };

    let existing = match base {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    let mut combined: Vec<Value> = Vec::with_capacity(existing.len() + incoming.len());
    for item in existing.iter().chain(incoming) {
        if !combined.contains(item) {
            combined.push(item.clone());
        }
    }
    Value::Array(combined)
}
