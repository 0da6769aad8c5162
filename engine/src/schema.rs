//! Merge schema definition and patch validation.
//!
//! A schema declares, per top-level field name, how two values of that field
//! are combined. Fields the schema does not mention use override semantics.

use crate::{error::Result, Document, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How two values of the same field are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMergeStrategy {
    /// Numeric leaves at matching keys are added (counters by date)
    Sum,
    /// Arrays are combined with duplicates removed
    Union,
    /// The overlay value replaces the base value
    #[default]
    Override,
}

impl std::fmt::Display for FieldMergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldMergeStrategy::Sum => write!(f, "Sum"),
            FieldMergeStrategy::Union => write!(f, "Union"),
            FieldMergeStrategy::Override => write!(f, "Override"),
        }
    }
}

/// Per-field merge strategies for a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSchema {
    /// Strategy by field name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMergeStrategy>,
}

impl MergeSchema {
    /// Create an empty schema; every field uses override semantics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the strategy for a field.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        strategy: FieldMergeStrategy,
    ) -> &mut Self {
        self.fields.insert(name.into(), strategy);
        self
    }

    /// Builder-style method to declare a field.
    pub fn with_field(mut self, name: impl Into<String>, strategy: FieldMergeStrategy) -> Self {
        self.add_field(name, strategy);
        self
    }

    /// Shorthand for a summed counter field.
    pub fn sum(self, name: impl Into<String>) -> Self {
        self.with_field(name, FieldMergeStrategy::Sum)
    }

    /// Shorthand for a set-union array field.
    pub fn union(self, name: impl Into<String>) -> Self {
        self.with_field(name, FieldMergeStrategy::Union)
    }

    /// Strategy for a field, defaulting to override.
    pub fn strategy_for(&self, field: &str) -> FieldMergeStrategy {
        self.fields.get(field).copied().unwrap_or_default()
    }

    /// Parse a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSchema(e.to_string()))
    }

    /// Validate a patch against the declared field shapes.
    ///
    /// `null` is accepted for every field.
    pub fn validate_patch(&self, patch: &Document) -> Result<()> {
        for (field, value) in patch {
            if value.is_null() {
                continue;
            }
            match self.strategy_for(field) {
                FieldMergeStrategy::Sum => {
                    if !is_numeric_tree(value) {
                        return Err(Error::TypeMismatch {
                            field: field.clone(),
                            expected: "numeric map".into(),
                            got: json_type_name(value).into(),
                        });
                    }
                }
                FieldMergeStrategy::Union => {
                    if !value.is_array() {
                        return Err(Error::TypeMismatch {
                            field: field.clone(),
                            expected: "Array".into(),
                            got: json_type_name(value).into(),
                        });
                    }
                }
                FieldMergeStrategy::Override => {}
            }
        }
        Ok(())
    }

    /// Validate an arbitrary JSON value as a document.
    pub fn validate_document(&self, value: &Value) -> Result<()> {
        let doc = value
            .as_object()
            .ok_or_else(|| Error::InvalidDocument("document must be an object".into()))?;
        self.validate_patch(doc)
    }
}

/// A number, or an object whose leaves are all numbers.
fn is_numeric_tree(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::Object(map) => map.values().all(is_numeric_tree),
        _ => false,
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}
