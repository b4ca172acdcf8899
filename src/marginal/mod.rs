//! Marginal distributions over completed executions
//!
//! A marginal turns the weighted completions of a search into a
//! deduplicated, normalized distribution over values: completions are
//! canonicalized, hash-deduplicated, merged in log space, and normalized
//! once, then queried through `sample`, `log_prob`, `enumerate_support`,
//! and the moment operations.

pub mod cache;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rand::Rng;
use tracing::debug;

use crate::error::{InferenceResult, MarginalError};
use crate::logspace::{log_add_exp, log_sum_exp};
use crate::search::Completions;
use crate::trace::CompletedTrace;
use crate::value::{CanonicalKey, Value};

use self::cache::BoundedCache;

/// Capacity of the per-collection memoization cache.
pub const MEMO_CAPACITY: usize = 10;

/// Which value a completed trace contributes to the marginal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Selector {
    /// The program's return value
    Return,
    /// A mapping assembled from the named sites
    Sites(Vec<String>),
}

/// Post-selection transform applied before canonicalization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Extraction {
    /// The selected value itself
    Identity,
    /// One coordinate of a two-coordinate sequence value
    Coordinate(usize),
}

/// The normalized, deduplicated result of the aggregation pipeline.
#[derive(Clone, Debug)]
struct Aggregate {
    /// First-seen representative per canonical key, in insertion order
    values: Vec<Value>,
    /// Canonical key to entry index
    index: IndexMap<CanonicalKey, usize>,
    /// Normalized log-probability per entry
    log_probs: Vec<f64>,
}

impl Aggregate {
    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Draw an entry index under the normalized categorical.
    fn sample_index<R: Rng>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.gen();
        let mut acc = 0.0;
        for (ix, lp) in self.log_probs.iter().enumerate() {
            acc += lp.exp();
            if u < acc {
                return ix;
            }
        }
        self.log_probs.len() - 1
    }

    /// Rows of numeric-vector views of every support value, all of one
    /// dimension.
    fn numeric_rows(&self) -> Result<Vec<Vec<f64>>, MarginalError> {
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(self.values.len());
        for value in &self.values {
            let row = value
                .as_numeric_vec()
                .ok_or_else(|| MarginalError::NotNumeric(value.clone()))?;
            if let Some(first) = rows.first() {
                let expected = first.len();
                if row.len() != expected {
                    return Err(MarginalError::DimensionMismatch {
                        expected,
                        actual: row.len(),
                    });
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Weighted mean of `rows`, stabilized by exponentiating log-weights
    /// relative to their maximum.
    fn weighted_mean(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let max = self
            .log_probs
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let rel: Vec<f64> = self.log_probs.iter().map(|lp| (lp - max).exp()).collect();
        let denom: f64 = rel.iter().sum();

        let dim = rows.first().map(Vec::len).unwrap_or(0);
        let mut mean = vec![0.0; dim];
        for (row, w) in rows.iter().zip(&rel) {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x * w;
            }
        }
        for m in &mut mean {
            *m /= denom;
        }
        mean
    }
}

/// Deduplicated, normalized distribution over the values of a completed
/// trace collection.
///
/// The aggregation pipeline is memoized in a bounded cache shared by every
/// marginal derived from the same collection, so repeated queries and
/// coordinate projections reuse prior work.
#[derive(Debug)]
pub struct Marginal {
    completions: Rc<Completions>,
    selector: Selector,
    extraction: Extraction,
    memo: Rc<RefCell<BoundedCache<(Selector, Extraction), Rc<Aggregate>>>>,
}

impl Marginal {
    /// Marginal over the programs' return values.
    pub fn new(completions: Completions) -> Self {
        Self {
            completions: Rc::new(completions),
            selector: Selector::Return,
            extraction: Extraction::Identity,
            memo: Rc::new(RefCell::new(BoundedCache::new(MEMO_CAPACITY))),
        }
    }

    /// Marginal over a mapping of the named sites instead of the return
    /// value.
    pub fn over_sites(completions: Completions, sites: Vec<String>) -> Self {
        Self {
            completions: Rc::new(completions),
            selector: Selector::Sites(sites),
            extraction: Extraction::Identity,
            memo: Rc::new(RefCell::new(BoundedCache::new(MEMO_CAPACITY))),
        }
    }

    /// Derived marginal over one coordinate of a two-coordinate joint.
    ///
    /// Re-runs aggregation over the original completions with a
    /// coordinate-extracting canonicalization, so the projected marginal is
    /// exact rather than derived from the already-deduplicated joint.
    /// Coordinates must be equality-safe under canonicalization; float
    /// coordinates risk collisions and misses.
    pub fn project(&self, coordinate: usize) -> InferenceResult<Marginal> {
        if coordinate > 1 {
            return Err(MarginalError::InvalidProjection(format!(
                "only two-coordinate joints are supported, got coordinate {coordinate}"
            ))
            .into());
        }
        if self.extraction != Extraction::Identity {
            return Err(MarginalError::InvalidProjection(
                "cannot project an already-projected marginal".to_string(),
            )
            .into());
        }
        Ok(Marginal {
            completions: Rc::clone(&self.completions),
            selector: self.selector.clone(),
            extraction: Extraction::Coordinate(coordinate),
            memo: Rc::clone(&self.memo),
        })
    }

    /// The underlying completed-trace collection.
    pub fn completions(&self) -> &Completions {
        &self.completions
    }

    /// Drop every memoized aggregation.
    pub fn invalidate(&self) {
        self.memo.borrow_mut().clear();
    }

    /// Draw a value under the normalized distribution; independent per
    /// call.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> InferenceResult<Value> {
        let agg = self.aggregate()?;
        if agg.is_empty() {
            return Err(MarginalError::EmptySupport.into());
        }
        let ix = agg.sample_index(rng);
        Ok(agg.values[ix].clone())
    }

    /// Normalized log-probability of a value.
    pub fn log_prob(&self, value: &Value) -> InferenceResult<f64> {
        let agg = self.aggregate()?;
        match agg.index.get(&value.canonical()) {
            Some(&ix) => Ok(agg.log_probs[ix]),
            None => Err(MarginalError::ValueOutOfSupport {
                value: value.clone(),
                support: agg.values.clone(),
            }
            .into()),
        }
    }

    /// The ordered sequence of distinct values; idempotent and
    /// restartable.
    pub fn enumerate_support(&self) -> InferenceResult<Vec<Value>> {
        Ok(self.aggregate()?.values.clone())
    }

    /// Weighted mean of the support, for numeric-vector-like values.
    pub fn mean(&self) -> InferenceResult<Vec<f64>> {
        let agg = self.aggregate()?;
        if agg.is_empty() {
            return Err(MarginalError::EmptySupport.into());
        }
        let rows = agg.numeric_rows()?;
        Ok(agg.weighted_mean(&rows))
    }

    /// Weighted variance of the support, for numeric-vector-like values.
    pub fn variance(&self) -> InferenceResult<Vec<f64>> {
        let agg = self.aggregate()?;
        if agg.is_empty() {
            return Err(MarginalError::EmptySupport.into());
        }
        let rows = agg.numeric_rows()?;
        let mean = agg.weighted_mean(&rows);
        let deviations: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&mean)
                    .map(|(x, m)| (x - m) * (x - m))
                    .collect()
            })
            .collect();
        Ok(agg.weighted_mean(&deviations))
    }

    fn aggregate(&self) -> InferenceResult<Rc<Aggregate>> {
        let key = (self.selector.clone(), self.extraction.clone());
        if let Some(hit) = self.memo.borrow_mut().get(&key) {
            return Ok(hit);
        }
        let built = Rc::new(self.build()?);
        self.memo.borrow_mut().insert(key, Rc::clone(&built));
        Ok(built)
    }

    fn build(&self) -> Result<Aggregate, MarginalError> {
        let mut values: Vec<Value> = Vec::new();
        let mut index: IndexMap<CanonicalKey, usize> = IndexMap::new();
        let mut logits: Vec<f64> = Vec::new();

        for completed in self.completions.iter() {
            let value = self.extract(completed)?;
            let key = value.canonical();
            match index.get(&key) {
                Some(&ix) => {
                    logits[ix] = log_add_exp(logits[ix], completed.log_weight);
                }
                None => {
                    index.insert(key, values.len());
                    values.push(value);
                    logits.push(completed.log_weight);
                }
            }
        }

        let norm = log_sum_exp(&logits);
        let log_probs: Vec<f64> = logits.iter().map(|lw| lw - norm).collect();

        debug!(
            "aggregated {} completions into {} support entries",
            self.completions.len(),
            values.len()
        );
        Ok(Aggregate {
            values,
            index,
            log_probs,
        })
    }

    fn extract(&self, completed: &CompletedTrace) -> Result<Value, MarginalError> {
        let selected = match &self.selector {
            Selector::Return => completed.value.clone(),
            Selector::Sites(names) => {
                let mut map = IndexMap::new();
                for name in names {
                    let value = completed
                        .site_value(name)
                        .ok_or_else(|| MarginalError::MissingSite(name.clone()))?;
                    map.insert(name.clone(), value.clone());
                }
                Value::Map(map)
            }
        };
        match self.extraction {
            Extraction::Identity => Ok(selected),
            Extraction::Coordinate(ix) => match selected {
                Value::Seq(coords) if coords.len() == 2 => Ok(coords[ix].clone()),
                other => Err(MarginalError::InvalidProjection(format!(
                    "expected a two-coordinate sequence value, got {other:?}"
                ))),
            },
        }
    }
}
