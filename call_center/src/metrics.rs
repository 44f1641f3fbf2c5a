//! Per-run observations and the summaries derived from them

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Raw observations from one scenario run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsCollector {
    wait_times: Vec<f64>,     // one per granted call, in grant order
    agent_busy_time: f64,     // minutes
    calls_handled: usize,
    queue_length_samples: Vec<usize>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_wait(&mut self, wait: f64) {
        self.wait_times.push(wait);
    }

    pub fn add_busy_time(&mut self, minutes: f64) {
        self.agent_busy_time += minutes;
    }

    pub fn record_call_handled(&mut self) {
        self.calls_handled += 1;
    }

    pub fn record_queue_length(&mut self, length: usize) {
        self.queue_length_samples.push(length);
    }

    pub fn wait_times(&self) -> &[f64] {
        &self.wait_times
    }

    pub fn agent_busy_time(&self) -> f64 {
        self.agent_busy_time
    }

    pub fn calls_handled(&self) -> usize {
        self.calls_handled
    }

    pub fn queue_length_samples(&self) -> &[usize] {
        &self.queue_length_samples
    }

    /// Mean wait of every granted call, 0 when no call was granted.
    pub fn avg_wait_time(&self) -> f64 {
        mean(self.wait_times.iter().copied())
    }

    /// Mean sampled queue length, 0 when nothing was sampled.
    pub fn avg_queue_length(&self) -> f64 {
        mean(self.queue_length_samples.iter().map(|&len| len as f64))
    }

    /// Busy time over available agent time, 0 when no agent time was
    /// available.
    pub fn utilization(&self, horizon: f64, num_agents: usize) -> f64 {
        let available = horizon * num_agents as f64;
        if available > 0.0 {
            self.agent_busy_time / available
        } else {
            0.0
        }
    }

    pub fn summarize(&self, horizon: f64, num_agents: usize, sampled: bool) -> ScenarioSummary {
        ScenarioSummary {
            avg_wait_time: self.avg_wait_time(),
            utilization: self.utilization(horizon, num_agents),
            calls_handled: self.calls_handled,
            avg_queue_length: sampled.then(|| self.avg_queue_length()),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Headline figures for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Minutes
    pub avg_wait_time: f64,
    /// Usually within 0..1, see [`crate::processes::CallProcess`] for why it
    /// is not a true occupancy measure
    pub utilization: f64,
    pub calls_handled: usize,
    /// Only present when the queue was sampled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_queue_length: Option<f64>,
}

impl ScenarioSummary {
    /// Figures rounded to two decimals for display.
    pub fn rounded(&self) -> Self {
        ScenarioSummary {
            avg_wait_time: round2(self.avg_wait_time),
            utilization: round2(self.utilization),
            calls_handled: self.calls_handled,
            avg_queue_length: self.avg_queue_length.map(round2),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Summaries keyed by scenario name, in the order the scenarios ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioResults {
    entries: Vec<(String, ScenarioSummary)>,
}

impl ScenarioResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the summary for `name`, returning the old one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        summary: ScenarioSummary,
    ) -> Option<ScenarioSummary> {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, summary)),
            None => {
                self.entries.push((name, summary));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioSummary> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, summary)| summary)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScenarioSummary)> {
        self.entries
            .iter()
            .map(|(name, summary)| (name.as_str(), summary))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// A map keeps scenario names as JSON keys, in run order
impl Serialize for ScenarioResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, summary) in &self.entries {
            map.serialize_entry(name, summary)?;
        }
        map.end()
    }
}
