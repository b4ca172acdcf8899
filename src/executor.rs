//! Replay/escape execution of stochastic programs
//!
//! One execution attempt drives a program against a partial trace: choices
//! already recorded are replayed deterministically, and the first new
//! unobserved choice interrupts the attempt. Interruption is an ordinary
//! early return through `?`, not unwinding; the caller branches on the
//! two-variant [`Execution`] result.

use std::sync::Arc;

use tracing::trace;

use crate::distribution::Distribution;
use crate::error::TraceError;
use crate::trace::{CompletedTrace, Site, Trace};
use crate::value::Value;

/// Why an execution attempt stopped before returning.
///
/// Programs propagate this with `?`; they never construct it directly.
#[derive(Clone, Debug)]
pub enum Interrupt {
    /// A new unobserved choice was reached; the attempt must be extended
    /// over the site's support before it can proceed
    Escape {
        /// Name of the interrupting site
        site: String,
        /// Distribution backing the interrupting site
        dist: Arc<dyn Distribution>,
    },
    /// Trace bookkeeping failed, e.g. a duplicate site name
    Fault(TraceError),
}

impl From<TraceError> for Interrupt {
    fn from(err: TraceError) -> Self {
        Interrupt::Fault(err)
    }
}

/// A stochastic program: a callable making zero or more named choices
/// through the executor handle.
pub trait Program {
    /// Run one execution attempt.
    fn run(&self, exec: &mut Executor<'_>) -> Result<Value, Interrupt>;
}

impl<F> Program for F
where
    F: Fn(&mut Executor<'_>) -> Result<Value, Interrupt>,
{
    fn run(&self, exec: &mut Executor<'_>) -> Result<Value, Interrupt> {
        self(exec)
    }
}

/// Handle through which a program makes its stochastic choices.
///
/// Replays values recorded in the base trace and interrupts at the first
/// unresolved sample site.
pub struct Executor<'a> {
    base: &'a Trace,
    trace: Trace,
}

impl<'a> Executor<'a> {
    fn new(base: &'a Trace) -> Self {
        Self {
            base,
            trace: Trace::new(),
        }
    }

    /// Make a named stochastic choice.
    ///
    /// If the site already appears in the base trace its recorded value is
    /// reused and rescored under `dist`; otherwise the attempt is
    /// interrupted and no further program statements run.
    pub fn sample<D>(&mut self, name: impl Into<String>, dist: &D) -> Result<Value, Interrupt>
    where
        D: Distribution + Clone + 'static,
    {
        let name = name.into();
        match self.base.get(&name) {
            Some(recorded) => {
                let value = recorded.value.clone();
                let log_prob = dist.log_prob(&value);
                self.trace
                    .insert(Site::sampled(name, value.clone(), log_prob))?;
                Ok(value)
            }
            None => {
                trace!("escaping at new sample site {name}");
                Err(Interrupt::Escape {
                    site: name,
                    dist: Arc::new(dist.clone()),
                })
            }
        }
    }

    /// Record an observed value for a named site.
    ///
    /// Observed sites never interrupt; their log-probability under `dist`
    /// joins the trace weight.
    pub fn observe<D>(
        &mut self,
        name: impl Into<String>,
        dist: &D,
        value: Value,
    ) -> Result<(), Interrupt>
    where
        D: Distribution,
    {
        let log_prob = dist.log_prob(&value);
        self.trace.insert(Site::observed(name, value, log_prob))?;
        Ok(())
    }

    /// Add a raw log-weight to the trace under a named site.
    pub fn factor(&mut self, name: impl Into<String>, log_weight: f64) -> Result<(), Interrupt> {
        self.trace
            .insert(Site::observed(name, Value::Bool(true), log_weight))?;
        Ok(())
    }

    /// The partial trace built so far in this attempt.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }
}

/// Outcome of one execution attempt.
#[derive(Clone, Debug)]
pub enum Execution {
    /// The program reached its return value with every choice resolved
    Completed(CompletedTrace),
    /// The program was interrupted at its first new unobserved choice
    Suspended {
        /// Name of the interrupting site
        site: String,
        /// Distribution backing the interrupting site
        dist: Arc<dyn Distribution>,
        /// Partial trace accumulated before the interrupt
        trace: Trace,
    },
}

/// Run one execution attempt of `program` against `base`.
pub fn execute<P>(program: &P, base: &Trace) -> Result<Execution, TraceError>
where
    P: Program + ?Sized,
{
    let mut exec = Executor::new(base);
    match program.run(&mut exec) {
        Ok(value) => Ok(Execution::Completed(CompletedTrace::new(exec.trace, value))),
        Err(Interrupt::Escape { site, dist }) => Ok(Execution::Suspended {
            site,
            dist,
            trace: exec.trace,
        }),
        Err(Interrupt::Fault(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Bernoulli, Categorical};

    fn coin_pair(exec: &mut Executor<'_>) -> Result<Value, Interrupt> {
        let a = exec.sample("a", &Bernoulli::new(0.5))?;
        let b = exec.sample("b", &Bernoulli::new(0.5))?;
        Ok(Value::Seq(vec![a, b]))
    }

    #[test]
    fn test_empty_base_suspends_at_first_site() {
        let result = execute(&coin_pair, &Trace::new()).unwrap();
        match result {
            Execution::Suspended { site, trace, .. } => {
                assert_eq!(site, "a");
                assert!(trace.is_empty());
            }
            Execution::Completed(_) => panic!("expected suspension"),
        }
    }

    #[test]
    fn test_partial_base_suspends_at_next_site() {
        let mut base = Trace::new();
        base.insert(Site::sampled("a", Value::Bool(true), (0.5f64).ln()))
            .unwrap();

        let result = execute(&coin_pair, &base).unwrap();
        match result {
            Execution::Suspended { site, trace, .. } => {
                assert_eq!(site, "b");
                assert_eq!(trace.len(), 1);
                assert_eq!(trace.get("a").unwrap().value, Value::Bool(true));
            }
            Execution::Completed(_) => panic!("expected suspension"),
        }
    }

    #[test]
    fn test_full_base_completes_with_replayed_values() {
        let mut base = Trace::new();
        base.insert(Site::sampled("a", Value::Bool(true), (0.5f64).ln()))
            .unwrap();
        base.insert(Site::sampled("b", Value::Bool(false), (0.5f64).ln()))
            .unwrap();

        let result = execute(&coin_pair, &base).unwrap();
        match result {
            Execution::Completed(completed) => {
                assert_eq!(
                    completed.value,
                    Value::Seq(vec![Value::Bool(true), Value::Bool(false)])
                );
                assert!((completed.log_weight - (0.25f64).ln()).abs() < 1e-12);
            }
            Execution::Suspended { .. } => panic!("expected completion"),
        }
    }

    #[test]
    fn test_replay_rescores_under_program_distribution() {
        // The base records the value with a stale log-probability; replay
        // recomputes it against the distribution the program supplies.
        let mut base = Trace::new();
        base.insert(Site::sampled("x", Value::Int(0), 0.0)).unwrap();

        let program = |exec: &mut Executor<'_>| {
            let d = Categorical::new(vec![Value::Int(0), Value::Int(1)], vec![3.0, 1.0]);
            exec.sample("x", &d)
        };
        let result = execute(&program, &base).unwrap();
        match result {
            Execution::Completed(completed) => {
                assert!((completed.log_weight - (0.75f64).ln()).abs() < 1e-12);
            }
            Execution::Suspended { .. } => panic!("expected completion"),
        }
    }

    #[test]
    fn test_observe_never_suspends() {
        let program = |exec: &mut Executor<'_>| -> Result<Value, Interrupt> {
            exec.observe("evidence", &Bernoulli::new(0.9), Value::Bool(true))?;
            Ok(Value::Bool(true))
        };
        let result = execute(&program, &Trace::new()).unwrap();
        match result {
            Execution::Completed(completed) => {
                assert!((completed.log_weight - (0.9f64).ln()).abs() < 1e-12);
                assert!(completed.trace.get("evidence").unwrap().observed);
            }
            Execution::Suspended { .. } => panic!("expected completion"),
        }
    }

    #[test]
    fn test_factor_adds_exact_log_weight() {
        let program = |exec: &mut Executor<'_>| -> Result<Value, Interrupt> {
            exec.factor("penalty", -2.5)?;
            Ok(Value::Int(0))
        };
        let result = execute(&program, &Trace::new()).unwrap();
        match result {
            Execution::Completed(completed) => {
                assert!((completed.log_weight - (-2.5)).abs() < 1e-12);
            }
            Execution::Suspended { .. } => panic!("expected completion"),
        }
    }

    #[test]
    fn test_duplicate_site_faults() {
        let mut base = Trace::new();
        base.insert(Site::sampled("x", Value::Bool(true), 0.0))
            .unwrap();

        let program = |exec: &mut Executor<'_>| -> Result<Value, Interrupt> {
            exec.sample("x", &Bernoulli::new(0.5))?;
            exec.sample("x", &Bernoulli::new(0.5))?;
            Ok(Value::Bool(true))
        };
        let err = execute(&program, &base).unwrap_err();
        assert_eq!(err, TraceError::DuplicateSite("x".to_string()));
    }
}
