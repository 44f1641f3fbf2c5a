//! Parallel execution of independent simulations
//!
//! Each scenario gets its own [`Simulation`], built on a worker thread from a
//! scenario index, so no state is shared between runs. Results come back in
//! scenario order and are identical to running the same builders one after
//! another on a single thread.
//!
//! # Example: a sweep over resource capacities
//!
//! ```rust
//! use des::parallel::{ParallelRunner, simple_progress_reporter};
//! use des::{Context, Process, SimResult, Simulation, Step};
//!
//! struct Tick;
//! impl Process<u32> for Tick {
//!     fn resume(&mut self, ctx: &mut Context<'_, u32>) -> SimResult<Step> {
//!         *ctx.state_mut() += 1;
//!         Ok(Step::Timeout(1.0))
//!     }
//! }
//!
//! let results = ParallelRunner::new(8, |scenario_id| {
//!     let mut sim = Simulation::new(0u32);
//!     sim.add_resource(scenario_id + 1)?;
//!     sim.spawn(Tick);
//!     Ok(sim)
//! })
//! .progress(simple_progress_reporter(4))
//! .num_threads(2)
//! .run(10.0);
//!
//! for result in &results {
//!     assert_eq!(result.as_ref().ok(), Some(&10));
//! }
//! ```
//!
//! # Determinism
//!
//! Results are deterministic when the builder seeds every random generator it
//! puts into the model state from the scenario alone. Thread count and
//! completion order have no influence.
//!
//! # Error Handling
//!
//! A kernel error or a panic inside one scenario is returned as that
//! scenario's [`RunFailure`]. Other scenarios carry on.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::{SimError, SimResult, Simulation};

/// Why a scenario produced no final state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunFailure {
    #[error("simulation failed: {0}")]
    Kernel(#[from] SimError),

    #[error("scenario panicked: {0}")]
    Panic(String),
}

/// Runs independent simulations on a rayon thread pool
///
/// Generic over:
/// - `C`: model state, handed back once the run reaches its deadline
/// - `F`: builder, `Fn(scenario_id) -> SimResult<Simulation<C>>`
pub struct ParallelRunner<C, F>
where
    F: Fn(usize) -> SimResult<Simulation<C>> + Send + Sync,
    C: Send,
{
    num_scenarios: usize,
    builder: F,
    num_threads: Option<usize>,
    progress_callback: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
}

impl<C, F> ParallelRunner<C, F>
where
    F: Fn(usize) -> SimResult<Simulation<C>> + Send + Sync,
    C: Send,
{
    /// `builder` is called once per scenario id in `0..num_scenarios`, on
    /// whichever worker picks the scenario up.
    pub fn new(num_scenarios: usize, builder: F) -> Self {
        ParallelRunner {
            num_scenarios,
            builder,
            num_threads: None,
            progress_callback: None,
        }
    }

    /// Runs on a dedicated pool of `n` workers instead of rayon's global one.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Called with `(completed, total)` each time a scenario finishes,
    /// successfully or not.
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Execute all scenarios up to `deadline` and return their final states
    /// in scenario_id order
    pub fn run(self, deadline: f64) -> Vec<Result<C, RunFailure>> {
        let progress_counter = Arc::new(AtomicUsize::new(0));

        // Fall back to the global pool if a dedicated one cannot be built
        let pool = self.num_threads.and_then(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| warn!("using global thread pool: {}", e))
                .ok()
        });

        let execute = || {
            (0..self.num_scenarios)
                .into_par_iter()
                .map(|scenario_id| {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                        || -> Result<C, RunFailure> {
                            let mut sim = (self.builder)(scenario_id)?;
                            sim.run_until(deadline)?;
                            Ok(sim.into_state())
                        },
                    ));

                    let completed = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(completed, self.num_scenarios);
                    }

                    match result {
                        Ok(outcome) => outcome,
                        Err(panic) => Err(RunFailure::Panic(panic_message(panic))),
                    }
                })
                .collect()
        };

        if let Some(pool) = pool {
            pool.install(execute)
        } else {
            execute()
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// [`ParallelRunner::run`] on the global pool, without progress reporting.
pub fn run_parallel<C, F>(
    num_scenarios: usize,
    builder: F,
    deadline: f64,
) -> Vec<Result<C, RunFailure>>
where
    F: Fn(usize) -> SimResult<Simulation<C>> + Send + Sync,
    C: Send,
{
    ParallelRunner::new(num_scenarios, builder).run(deadline)
}

/// Progress callback printing every `interval` completed scenarios
pub fn simple_progress_reporter(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            println!("  Completed {}/{} scenarios", completed, total);
        }
    }
}
