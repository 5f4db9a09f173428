//! Stream topology engine.
//!
//! A topology is a fixed chain `filter* / map* -> aggregate -> sink`, built
//! once and then replayed for every input. Stages are composed into a
//! single boxed closure at build time, so per-event dispatch is one call.
//!
//! The builder is typestate-shaped: [`TopologyBuilder`] offers `filter`,
//! `map` and `aggregate`; `aggregate` consumes it and returns an
//! [`Aggregated`] that only offers `sink`, which yields the runnable
//! [`Topology`]. A chain therefore always has exactly one aggregate stage
//! and one sink.
//!
//! ```
//! use fanpulse_core::topology::{SinkTrigger, TopologyBuilder};
//!
//! let mut emitted = Vec::new();
//! let mut topology = TopologyBuilder::<i64>::new()
//!     .filter("positive", |n| *n > 0)
//!     .map("double", |n| Ok(Some(n * 2)))
//!     .aggregate("sum", 0i64, |sum, n| {
//!         *sum += n;
//!         Ok(())
//!     })
//!     .sink("record", move |sum, trigger| {
//!         if trigger == SinkTrigger::Flush {
//!             emitted.push(*sum);
//!         }
//!         Ok(())
//!     });
//!
//! for n in [3, -1, 4] {
//!     topology.process(n).unwrap();
//! }
//! assert_eq!(*topology.state(), 14);
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use thiserror::Error;

/// Failure of a single stage for a single input. The input is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("stage `{stage}` failed: {reason}")]
    Failed { stage: &'static str, reason: String },

    #[error("stage panicked: {0}")]
    Panicked(String),
}

impl StageError {
    /// A failure raised from inside a stage closure. The engine fills in
    /// the stage name.
    pub fn failed(reason: impl Into<String>) -> Self {
        StageError::Failed {
            stage: "",
            reason: reason.into(),
        }
    }

    fn in_stage(self, name: &'static str) -> Self {
        match self {
            StageError::Failed { stage: "", reason } => StageError::Failed {
                stage: name,
                reason,
            },
            other => other,
        }
    }

    fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        StageError::Panicked(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Filter,
    Map,
    Aggregate,
    Sink,
}

/// Observable description of one stage, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub name: &'static str,
}

impl fmt::Display for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            StageKind::Filter => "filter",
            StageKind::Map => "map",
            StageKind::Aggregate => "aggregate",
            StageKind::Sink => "sink",
        };
        write!(f, "{kind}({})", self.name)
    }
}

/// Why the sink is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkTrigger {
    /// An input made it through the whole chain and was folded.
    Folded,
    /// A forced flush (timer tick or shutdown).
    Flush,
}

/// What happened to one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Folded,
    /// Rejected by a filter, or a map returned `None`.
    Skipped,
}

type Chain<In, Out> = Box<dyn FnMut(In) -> Result<Option<Out>, StageError> + Send>;
type Step<In, S> = Box<dyn FnMut(&mut S, In) -> Result<bool, StageError> + Send>;
type Sink<S> = Box<dyn FnMut(&mut S, SinkTrigger) -> Result<(), StageError> + Send>;

/// Pre-aggregate part of a topology: accepts `In`, currently yields `Cur`.
pub struct TopologyBuilder<In, Cur = In> {
    stages: Vec<StageDescriptor>,
    chain: Chain<In, Cur>,
}

impl<In: Send + 'static> TopologyBuilder<In, In> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            chain: Box::new(|input: In| -> Result<Option<In>, StageError> { Ok(Some(input)) }),
        }
    }
}

impl<In: Send + 'static> Default for TopologyBuilder<In, In> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In: Send + 'static, Cur: Send + 'static> TopologyBuilder<In, Cur> {
    /// Drop values for which `predicate` is false.
    pub fn filter<F>(mut self, name: &'static str, mut predicate: F) -> Self
    where
        F: FnMut(&Cur) -> bool + Send + 'static,
    {
        self.stages.push(StageDescriptor {
            kind: StageKind::Filter,
            name,
        });
        let mut prev = self.chain;
        Self {
            stages: self.stages,
            chain: Box::new(move |input: In| -> Result<Option<Cur>, StageError> {
                Ok(prev(input)?.filter(|value| predicate(value)))
            }),
        }
    }

    /// Transform values. Later stages see the transformed value; `Ok(None)`
    /// short-circuits the chain for this input.
    pub fn map<U, F>(mut self, name: &'static str, mut transform: F) -> TopologyBuilder<In, U>
    where
        U: Send + 'static,
        F: FnMut(Cur) -> Result<Option<U>, StageError> + Send + 'static,
    {
        self.stages.push(StageDescriptor {
            kind: StageKind::Map,
            name,
        });
        let mut prev = self.chain;
        TopologyBuilder {
            stages: self.stages,
            chain: Box::new(move |input: In| -> Result<Option<U>, StageError> {
                match prev(input)? {
                    Some(value) => transform(value).map_err(|err| err.in_stage(name)),
                    None => Ok(None),
                }
            }),
        }
    }

    /// Fold every surviving value into `initial`. Ends the pre-aggregate part.
    pub fn aggregate<S, F>(
        mut self,
        name: &'static str,
        initial: S,
        mut fold: F,
    ) -> Aggregated<In, S>
    where
        S: Send + 'static,
        F: FnMut(&mut S, Cur) -> Result<(), StageError> + Send + 'static,
    {
        self.stages.push(StageDescriptor {
            kind: StageKind::Aggregate,
            name,
        });
        let mut chain = self.chain;
        Aggregated {
            stages: self.stages,
            state: initial,
            step: Box::new(move |state: &mut S, input: In| -> Result<bool, StageError> {
                match chain(input)? {
                    Some(value) => {
                        fold(state, value).map_err(|err| err.in_stage(name))?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }),
        }
    }
}

/// A topology with its aggregate in place, waiting for a sink.
pub struct Aggregated<In, S> {
    stages: Vec<StageDescriptor>,
    state: S,
    step: Step<In, S>,
}

impl<In, S> Aggregated<In, S> {
    /// Terminal side-effecting stage. Receives the aggregate state after
    /// every folded input and on every [`Topology::flush`].
    pub fn sink<F>(mut self, name: &'static str, mut action: F) -> Topology<In, S>
    where
        F: FnMut(&mut S, SinkTrigger) -> Result<(), StageError> + Send + 'static,
    {
        self.stages.push(StageDescriptor {
            kind: StageKind::Sink,
            name,
        });
        Topology {
            stages: self.stages,
            state: self.state,
            step: self.step,
            sink: Box::new(move |state: &mut S, trigger: SinkTrigger| -> Result<(), StageError> {
                action(state, trigger).map_err(|err| err.in_stage(name))
            }),
        }
    }
}

/// A complete, runnable chain.
pub struct Topology<In, S> {
    stages: Vec<StageDescriptor>,
    state: S,
    step: Step<In, S>,
    sink: Sink<S>,
}

impl<In, S> Topology<In, S> {
    pub fn describe(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Run one input through the chain. A failing or panicking stage
    /// returns an error and leaves the topology usable for the next input.
    pub fn process(&mut self, input: In) -> Result<StepOutcome, StageError> {
        let Self {
            state, step, sink, ..
        } = self;
        catch_unwind(AssertUnwindSafe(|| -> Result<StepOutcome, StageError> {
            if step(state, input)? {
                sink(state, SinkTrigger::Folded)?;
                Ok(StepOutcome::Folded)
            } else {
                Ok(StepOutcome::Skipped)
            }
        }))
        .unwrap_or_else(|payload| Err(StageError::from_panic(payload)))
    }

    /// Invoke the sink with [`SinkTrigger::Flush`].
    pub fn flush(&mut self) -> Result<(), StageError> {
        let Self { state, sink, .. } = self;
        catch_unwind(AssertUnwindSafe(|| sink(state, SinkTrigger::Flush)))
            .unwrap_or_else(|payload| Err(StageError::from_panic(payload)))
    }
}
