//! Frontier-driven search over program executions
//!
//! Both search variants share one control loop: pop a partial trace, run
//! the program against it, record completions, and extend suspensions over
//! the interrupting site's support. They differ only in frontier ordering
//! and stopping rule.

pub mod frontier;

use rand::Rng;
use tracing::{debug, trace};

use crate::distribution::Distribution;
use crate::error::SearchError;
use crate::executor::{execute, Execution, Program};
use crate::trace::{CompletedTrace, Site, Trace};

use self::frontier::{FifoFrontier, Frontier, FrontierEntry, PriorityFrontier};

/// Default try budget for the exhaustive search.
pub const DEFAULT_MAX_TRIES: usize = 1_000_000;

/// Default completion count collected by the best-first search.
pub const DEFAULT_NUM_SAMPLES: usize = 100;

/// The weighted collection of completed executions a search produces.
#[derive(Clone, Debug, Default)]
pub struct Completions {
    traces: Vec<CompletedTrace>,
}

impl Completions {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed trace.
    pub fn push(&mut self, completed: CompletedTrace) {
        self.traces.push(completed);
    }

    /// Number of completed traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether no executions completed.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Iterate completions in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &CompletedTrace> {
        self.traces.iter()
    }

    /// The log-weight of every completion, in discovery order.
    pub fn log_weights(&self) -> Vec<f64> {
        self.traces.iter().map(|t| t.log_weight).collect()
    }
}

impl<'a> IntoIterator for &'a Completions {
    type Item = &'a CompletedTrace;
    type IntoIter = std::slice::Iter<'a, CompletedTrace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

/// Enumerate every candidate continuation of a suspended execution.
///
/// One child trace is produced per support value of the interrupting
/// site's distribution, each scored with that value's log-probability.
fn extend(
    site: &str,
    dist: &dyn Distribution,
    parent: &Trace,
) -> Result<Vec<Trace>, SearchError> {
    let support = dist
        .support()
        .ok_or_else(|| SearchError::NotEnumerable(site.to_string()))?;

    let mut children = Vec::with_capacity(support.len());
    for value in support {
        let log_prob = dist.log_prob(&value);
        let mut child = parent.clone();
        child.insert(Site::sampled(site, value, log_prob))?;
        children.push(child);
    }
    Ok(children)
}

/// Stopping rule for the shared control loop.
#[derive(Clone, Copy, Debug)]
enum StopRule {
    /// Run until the frontier drains, erroring past the try budget
    Exhaustion { max_tries: usize },
    /// Run until this many completions are collected; a drained frontier
    /// after at least one completion is a legitimate partial result
    CountBound { num_samples: usize },
}

/// The control loop shared by both search variants.
fn drive<P, F>(program: &P, frontier: &mut F, stop: StopRule) -> Result<Completions, SearchError>
where
    P: Program + ?Sized,
    F: Frontier,
{
    let mut completions = Completions::new();
    let mut tries = 0usize;

    frontier.push(FrontierEntry {
        score: 0.0,
        trace: Trace::new(),
    });

    loop {
        if let StopRule::CountBound { num_samples } = stop {
            if completions.len() >= num_samples {
                break;
            }
        }

        let Some(next) = frontier.pop() else {
            match stop {
                StopRule::Exhaustion { .. } => break,
                StopRule::CountBound { .. } => {
                    if completions.is_empty() {
                        return Err(SearchError::FrontierUnderflow);
                    }
                    debug!(
                        "frontier drained after {} completions; returning partial results",
                        completions.len()
                    );
                    break;
                }
            }
        };

        if let StopRule::Exhaustion { max_tries } = stop {
            if tries >= max_tries {
                return Err(SearchError::MaxTriesExceeded(max_tries));
            }
        }
        tries += 1;

        match execute(program, &next)? {
            Execution::Completed(completed) => {
                trace!(
                    "completed trace with log-weight {:.6}",
                    completed.log_weight
                );
                completions.push(completed);
            }
            Execution::Suspended { site, dist, trace } => {
                let children = extend(&site, dist.as_ref(), &trace)?;
                trace!("extending site {site} into {} children", children.len());
                for child in children {
                    let score = child.log_weight();
                    frontier.push(FrontierEntry {
                        score,
                        trace: child,
                    });
                }
            }
        }
    }

    debug!(
        "search finished: {} completions in {tries} tries",
        completions.len()
    );
    Ok(completions)
}

/// Exact inference by enumerating every possible execution.
///
/// The completed set is the exact weighted support of the program whenever
/// every reachable site has finite discrete support.
#[derive(Clone, Debug)]
pub struct Search {
    max_tries: usize,
}

impl Search {
    /// Create an exhaustive search with the default try budget.
    pub fn new() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
        }
    }

    /// Set the try budget.
    pub fn max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Enumerate all executions of `program`.
    pub fn run<P>(&self, program: &P) -> Result<Completions, SearchError>
    where
        P: Program + ?Sized,
    {
        let mut frontier = FifoFrontier::new();
        drive(
            program,
            &mut frontier,
            StopRule::Exhaustion {
                max_tries: self.max_tries,
            },
        )
    }
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

/// Inference by enumerating executions in order of decreasing probability.
///
/// Exact, and equivalent to [`Search`], when `num_samples` covers the whole
/// support; otherwise the highest-weight completions found so far are
/// returned and normalized over the discovered subset.
#[derive(Clone, Debug)]
pub struct BestFirstSearch {
    num_samples: usize,
}

impl BestFirstSearch {
    /// Create a best-first search with the default completion count.
    pub fn new() -> Self {
        Self {
            num_samples: DEFAULT_NUM_SAMPLES,
        }
    }

    /// Set the number of completions to collect.
    pub fn num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Enumerate the highest-weight executions of `program`.
    pub fn run<P, R>(&self, program: &P, rng: &mut R) -> Result<Completions, SearchError>
    where
        P: Program + ?Sized,
        R: Rng,
    {
        let mut frontier = PriorityFrontier::new(rng);
        drive(
            program,
            &mut frontier,
            StopRule::CountBound {
                num_samples: self.num_samples,
            },
        )
    }
}

impl Default for BestFirstSearch {
    fn default() -> Self {
        Self::new()
    }
}
