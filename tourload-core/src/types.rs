//! Row and value types exchanged with the store

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single field value.
///
/// Values are totally ordered; text compares lexicographically, which is the
/// order the verifier's min/max checks rely on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

/// A document: named fields in key order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text value of a field, if present and textual
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

/// Key of a secondary index entry: one value per indexed field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexKey(pub Vec<Value>);

impl IndexKey {
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// The value of a single-field key
    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    /// Text of a single-field key
    pub fn as_text(&self) -> Option<&str> {
        match self.0.as_slice() {
            [value] => value.as_text(),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [value] => write!(f, "{}", value),
            values => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Definition of a secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<String>,
}

impl IndexSpec {
    /// Index over a single field, named after it
    pub fn simple(field: &str) -> Self {
        Self {
            name: field.to_string(),
            fields: vec![field.to_string()],
        }
    }

    /// Index over several fields
    pub fn compound(name: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Extract the key of a row, or `None` when an indexed field is missing
    pub fn key_of(&self, row: &Row) -> Option<IndexKey> {
        self.fields
            .iter()
            .map(|field| row.get(field).cloned())
            .collect::<Option<Vec<_>>>()
            .map(IndexKey)
    }
}

/// Row filter used by grouped counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowPredicate {
    FieldEq(String, Value),
    FieldNe(String, Value),
}

impl RowPredicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        RowPredicate::FieldEq(field.to_string(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        RowPredicate::FieldNe(field.to_string(), value.into())
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            RowPredicate::FieldEq(field, value) => row.get(field) == Some(value),
            RowPredicate::FieldNe(field, value) => row.get(field) != Some(value),
        }
    }
}
