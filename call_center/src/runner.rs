//! Runs scenarios one by one (or on a thread pool) and reduces them to
//! summaries.

use des::parallel::ParallelRunner;
use des::{SimResult, Simulation};
use tracing::info;

use crate::config::{ScenarioConfig, SimulationConfig, validate_horizon, validate_scenarios};
use crate::error::{Error, Result};
use crate::metrics::{ScenarioResults, ScenarioSummary};
use crate::processes::{ArrivalGenerator, CallCenter, QueueSampler};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioRunner {
    horizon: f64,
    seed: u64,
    sample_queue: bool,
}

impl ScenarioRunner {
    pub fn new(horizon: f64, seed: u64) -> Self {
        ScenarioRunner {
            horizon,
            seed,
            sample_queue: false,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        ScenarioRunner::new(config.horizon, config.seed).with_queue_sampling(config.sample_queue)
    }

    /// Also run a [`QueueSampler`] and report the average queue length.
    pub fn with_queue_sampling(mut self, enabled: bool) -> Self {
        self.sample_queue = enabled;
        self
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Wires a fresh simulation for `scenario`: one pool of agents, the
    /// arrival generator and, if enabled, the queue sampler. Nothing has run
    /// yet.
    pub fn build(&self, scenario: &ScenarioConfig) -> Result<Simulation<CallCenter>> {
        validate_horizon(self.horizon)?;
        let center = CallCenter::new(scenario, self.seed)?;
        Ok(self.wire(center, scenario.num_agents)?)
    }

    fn wire(&self, center: CallCenter, num_agents: usize) -> SimResult<Simulation<CallCenter>> {
        let mut sim = Simulation::new(center);
        let agents = sim.add_resource(num_agents)?;
        sim.spawn(ArrivalGenerator::new(agents));
        if self.sample_queue {
            sim.spawn(QueueSampler::new(agents));
        }
        Ok(sim)
    }

    /// Runs `scenario` to the horizon and returns the final model state.
    pub fn simulate(&self, scenario: &ScenarioConfig) -> Result<CallCenter> {
        let mut sim = self.build(scenario)?;
        info!(
            scenario = %scenario.name,
            agents = scenario.num_agents,
            horizon = self.horizon,
            seed = self.seed,
            "running scenario"
        );
        sim.run_until(self.horizon)?;
        Ok(sim.into_state())
    }

    pub fn run_scenario(&self, scenario: &ScenarioConfig) -> Result<ScenarioSummary> {
        let center = self.simulate(scenario)?;
        Ok(self.summarize(scenario, &center))
    }

    /// Runs every scenario in order, each from the same seed.
    ///
    /// All scenarios are validated before the first one is scheduled.
    pub fn run(&self, scenarios: &[ScenarioConfig]) -> Result<ScenarioResults> {
        validate_horizon(self.horizon)?;
        validate_scenarios(scenarios)?;

        let mut results = ScenarioResults::new();
        for scenario in scenarios {
            let summary = self.run_scenario(scenario)?;
            results.insert(scenario.name.clone(), summary);
        }
        Ok(results)
    }

    /// Same results as [`ScenarioRunner::run`], computed on rayon's pool.
    pub fn run_parallel(&self, scenarios: &[ScenarioConfig]) -> Result<ScenarioResults> {
        validate_horizon(self.horizon)?;
        validate_scenarios(scenarios)?;

        let centers = scenarios
            .iter()
            .map(|scenario| CallCenter::new(scenario, self.seed))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(
            scenarios = scenarios.len(),
            horizon = self.horizon,
            "running scenarios in parallel"
        );
        let outcomes = ParallelRunner::new(scenarios.len(), |i| {
            self.wire(centers[i].clone(), scenarios[i].num_agents)
        })
        .run(self.horizon);

        let mut results = ScenarioResults::new();
        for (scenario, outcome) in scenarios.iter().zip(outcomes) {
            let center = outcome.map_err(|source| Error::ScenarioFailed {
                scenario: scenario.name.clone(),
                source,
            })?;
            results.insert(scenario.name.clone(), self.summarize(scenario, &center));
        }
        Ok(results)
    }

    fn summarize(&self, scenario: &ScenarioConfig, center: &CallCenter) -> ScenarioSummary {
        let summary = center
            .metrics()
            .summarize(self.horizon, scenario.num_agents, self.sample_queue);
        info!(
            scenario = %scenario.name,
            calls_handled = summary.calls_handled,
            avg_wait_time = summary.avg_wait_time,
            utilization = summary.utilization,
            "scenario finished"
        );
        summary
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        ScenarioRunner::from_config(&SimulationConfig::baseline())
    }
}
