//! Execution traces
//!
//! A trace is the ordered record of the named stochastic choices one
//! program execution has made, together with each choice's log-probability
//! contribution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::value::Value;

/// One named stochastic choice within a trace.
///
/// Immutable once appended to a trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Site name, unique within its trace
    pub name: String,
    /// The chosen value
    pub value: Value,
    /// Log-probability contribution of this choice
    pub log_prob: f64,
    /// Whether the value was observed rather than sampled
    pub observed: bool,
}

impl Site {
    /// Create an unobserved sample site.
    pub fn sampled(name: impl Into<String>, value: Value, log_prob: f64) -> Self {
        Self {
            name: name.into(),
            value,
            log_prob,
            observed: false,
        }
    }

    /// Create an observed site.
    pub fn observed(name: impl Into<String>, value: Value, log_prob: f64) -> Self {
        Self {
            name: name.into(),
            value,
            log_prob,
            observed: true,
        }
    }
}

/// Ordered record of the sites one execution has visited.
///
/// A partial trace grows by appending during a single execution attempt;
/// completion freezes it into a [`CompletedTrace`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    sites: IndexMap<String, Site>,
}

impl Trace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a site. Site names are unique within a trace.
    pub fn insert(&mut self, site: Site) -> Result<(), TraceError> {
        if self.sites.contains_key(&site.name) {
            return Err(TraceError::DuplicateSite(site.name));
        }
        self.sites.insert(site.name.clone(), site);
        Ok(())
    }

    /// Look up a site by name.
    pub fn get(&self, name: &str) -> Option<&Site> {
        self.sites.get(name)
    }

    /// Whether a site with this name has been recorded.
    pub fn contains(&self, name: &str) -> bool {
        self.sites.contains_key(name)
    }

    /// Total log-weight: the sum of all site log-probabilities.
    pub fn log_weight(&self) -> f64 {
        self.sites.values().map(|s| s.log_prob).sum()
    }

    /// Number of recorded sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether no sites have been recorded.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Iterate sites in insertion order.
    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }
}

/// A frozen trace from an execution that reached its return value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedTrace {
    /// The full choice record
    pub trace: Trace,
    /// The program's return value
    pub value: Value,
    /// Total log-weight at completion
    pub log_weight: f64,
}

impl CompletedTrace {
    /// Freeze a finished execution.
    pub fn new(trace: Trace, value: Value) -> Self {
        let log_weight = trace.log_weight();
        Self {
            trace,
            value,
            log_weight,
        }
    }

    /// The value recorded at a named site, if present.
    pub fn site_value(&self, name: &str) -> Option<&Value> {
        self.trace.get(name).map(|s| &s.value)
    }
}
