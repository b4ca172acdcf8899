//! Program values and canonicalization
//!
//! This module defines the dynamic value vocabulary shared by programs,
//! distributions, and marginals, together with the canonical key form used
//! to deduplicate structurally equal values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A value produced by a stochastic program or a distribution.
///
/// Mappings preserve insertion order; structural equality of mappings is
/// insertion-order-independent only after canonicalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean scalar
    Bool(bool),
    /// Integer scalar
    Int(i64),
    /// Floating-point scalar
    Float(f64),
    /// String scalar
    Str(String),
    /// Fixed-arity sequence (tuple or vector)
    Seq(Vec<Value>),
    /// String-keyed mapping, insertion-ordered
    Map(IndexMap<String, Value>),
}

/// Canonical, hashable, totally ordered key form of a [`Value`].
///
/// Scalars reduce to primitive keys; floats are keyed by their IEEE-754 bit
/// pattern, so equal-looking floats produced by different arithmetic may
/// canonicalize apart. Mappings convert recursively to a sequence of
/// `(key, canonical-value)` pairs sorted by key, so two mappings with the
/// same content but different insertion order collide to the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalKey {
    /// Canonical boolean
    Bool(bool),
    /// Canonical integer
    Int(i64),
    /// Float keyed by bit pattern
    Float(u64),
    /// Canonical string
    Str(String),
    /// Element-wise canonical sequence
    Seq(Vec<CanonicalKey>),
    /// Mapping entries sorted by key
    Entries(Vec<(String, CanonicalKey)>),
}

impl Value {
    /// Convert to the canonical key form used for hashing and deduplication.
    pub fn canonical(&self) -> CanonicalKey {
        match self {
            Value::Bool(b) => CanonicalKey::Bool(*b),
            Value::Int(i) => CanonicalKey::Int(*i),
            Value::Float(f) => CanonicalKey::Float(f.to_bits()),
            Value::Str(s) => CanonicalKey::Str(s.clone()),
            Value::Seq(xs) => CanonicalKey::Seq(xs.iter().map(Value::canonical).collect()),
            Value::Map(m) => {
                let mut entries: Vec<(String, CanonicalKey)> = m
                    .iter()
                    .map(|(k, v)| (k.clone(), v.canonical()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                CanonicalKey::Entries(entries)
            }
        }
    }

    /// Numeric view of a scalar value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric-vector view used by moment queries.
    ///
    /// Numeric scalars convert to a one-element vector; sequences convert
    /// element-wise when every element is a numeric scalar. Everything else
    /// has no numeric view.
    pub fn as_numeric_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::Int(_) | Value::Float(_) => self.as_f64().map(|x| vec![x]),
            Value::Seq(xs) => xs.iter().map(Value::as_f64).collect(),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Self {
        Value::Seq(xs)
    }
}
