//! Distribution contract and discrete primitives
//!
//! Search only ever needs three things from a distribution: drawing a
//! value, scoring a value, and enumerating a finite support. Distributions
//! with no finite support report `None` from [`Distribution::support`] and
//! cannot be driven by enumeration.

use std::fmt::Debug;

use rand::{Rng, RngCore};

use crate::value::Value;

/// Contract consumed by the executor and the search loop.
///
/// Object-safe so suspended executions can carry the distribution of the
/// interrupting site.
pub trait Distribution: Debug {
    /// Draw a value.
    fn sample(&self, rng: &mut dyn RngCore) -> Value;

    /// Log-probability of a value under this distribution.
    ///
    /// Values outside the support score `f64::NEG_INFINITY`.
    fn log_prob(&self, value: &Value) -> f64;

    /// The finite enumerable support, or `None` when there is none.
    fn support(&self) -> Option<Vec<Value>>;
}

/// Bernoulli distribution over boolean values.
#[derive(Clone, Debug)]
pub struct Bernoulli {
    /// Probability of `true`
    pub p: f64,
}

impl Bernoulli {
    /// Create a Bernoulli with success probability `p`, clamped to [0, 1].
    pub fn new(p: f64) -> Self {
        Self {
            p: p.clamp(0.0, 1.0),
        }
    }
}

impl Distribution for Bernoulli {
    fn sample(&self, mut rng: &mut dyn RngCore) -> Value {
        let u: f64 = rng.gen();
        Value::Bool(u < self.p)
    }

    fn log_prob(&self, value: &Value) -> f64 {
        match value {
            Value::Bool(true) => self.p.ln(),
            Value::Bool(false) => (1.0 - self.p).ln(),
            _ => f64::NEG_INFINITY,
        }
    }

    fn support(&self) -> Option<Vec<Value>> {
        Some(vec![Value::Bool(true), Value::Bool(false)])
    }
}

/// Categorical distribution over an explicit list of values.
#[derive(Clone, Debug)]
pub struct Categorical {
    values: Vec<Value>,
    log_probs: Vec<f64>,
}

impl Categorical {
    /// Create a categorical from values and unnormalized positive weights.
    ///
    /// Weights are normalized over their sum; values and weights must have
    /// equal length.
    pub fn new(values: Vec<Value>, weights: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), weights.len());
        let total: f64 = weights.iter().sum();
        let log_probs = weights.iter().map(|w| (w / total).ln()).collect();
        Self { values, log_probs }
    }

    /// Uniform categorical over the given values.
    pub fn uniform(values: Vec<Value>) -> Self {
        let n = values.len();
        let weights = vec![1.0; n];
        Self::new(values, weights)
    }

    fn index_of(&self, value: &Value) -> Option<usize> {
        let key = value.canonical();
        self.values.iter().position(|v| v.canonical() == key)
    }
}

impl Distribution for Categorical {
    fn sample(&self, mut rng: &mut dyn RngCore) -> Value {
        let u: f64 = rng.gen();
        let mut acc = 0.0;
        for (value, lp) in self.values.iter().zip(&self.log_probs) {
            acc += lp.exp();
            if u < acc {
                return value.clone();
            }
        }
        // Rounding can leave u marginally above the accumulated mass.
        self.values[self.values.len() - 1].clone()
    }

    fn log_prob(&self, value: &Value) -> f64 {
        match self.index_of(value) {
            Some(ix) => self.log_probs[ix],
            None => f64::NEG_INFINITY,
        }
    }

    fn support(&self) -> Option<Vec<Value>> {
        Some(self.values.clone())
    }
}

/// Point-mass distribution on a single value.
#[derive(Clone, Debug)]
pub struct Delta {
    /// The single supported value
    pub value: Value,
}

impl Delta {
    /// Create a point mass at `value`.
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Distribution for Delta {
    fn sample(&self, _rng: &mut dyn RngCore) -> Value {
        self.value.clone()
    }

    fn log_prob(&self, value: &Value) -> f64 {
        if value.canonical() == self.value.canonical() {
            0.0
        } else {
            f64::NEG_INFINITY
        }
    }

    fn support(&self) -> Option<Vec<Value>> {
        Some(vec![self.value.clone()])
    }
}
