//! Scenario and run configuration
//!
//! Configs can be built in code or loaded from TOML:
//!
//! ```toml
//! horizon = 480.0
//! seed = 42
//! sample_queue = true
//!
//! [[scenarios]]
//! name = "Base Case"
//! num_agents = 3
//! mean_service_time = 5.0
//! mean_interarrival_time = 3.0
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Error, Result};
use crate::{RANDOM_SEED, SIM_TIME};

/// One staffing/service configuration to simulate. Times are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub num_agents: usize,
    pub mean_service_time: f64,
    pub mean_interarrival_time: f64,
}

impl ScenarioConfig {
    pub fn new(
        name: impl Into<String>,
        num_agents: usize,
        mean_service_time: f64,
        mean_interarrival_time: f64,
    ) -> Self {
        ScenarioConfig {
            name: name.into(),
            num_agents,
            mean_service_time,
            mean_interarrival_time,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.num_agents == 0 {
            return Err(ConfigurationError::NoAgents {
                scenario: self.name.clone(),
            });
        }
        if !is_positive_minutes(self.mean_service_time) {
            return Err(ConfigurationError::ServiceTime {
                scenario: self.name.clone(),
                value: self.mean_service_time,
            });
        }
        if !is_positive_minutes(self.mean_interarrival_time) {
            return Err(ConfigurationError::InterarrivalTime {
                scenario: self.name.clone(),
                value: self.mean_interarrival_time,
            });
        }
        Ok(())
    }
}

fn is_positive_minutes(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Everything needed for one comparison study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulated minutes per scenario
    #[serde(default = "default_horizon")]
    pub horizon: f64,
    /// Seed applied afresh to every scenario
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Record the wait-queue length once per minute
    #[serde(default)]
    pub sample_queue: bool,
    pub scenarios: Vec<ScenarioConfig>,
}

fn default_horizon() -> f64 {
    SIM_TIME
}

fn default_seed() -> u64 {
    RANDOM_SEED
}

impl SimulationConfig {
    /// The reference study: an 8-hour shift, one call every 3 minutes on
    /// average, comparing extra staff against faster service.
    pub fn baseline() -> Self {
        SimulationConfig {
            horizon: SIM_TIME,
            seed: RANDOM_SEED,
            sample_queue: true,
            scenarios: vec![
                ScenarioConfig::new("Base Case", 3, 5.0, 3.0),
                ScenarioConfig::new("More Agents", 5, 5.0, 3.0),
                ScenarioConfig::new("Faster Service", 3, 4.0, 3.0),
            ],
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        validate_horizon(self.horizon)?;
        validate_scenarios(&self.scenarios)
    }
}

pub(crate) fn validate_horizon(horizon: f64) -> std::result::Result<(), ConfigurationError> {
    if horizon.is_finite() && horizon >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::Horizon(horizon))
    }
}

pub(crate) fn validate_scenarios(
    scenarios: &[ScenarioConfig],
) -> std::result::Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for scenario in scenarios {
        scenario.validate()?;
        if !seen.insert(scenario.name.as_str()) {
            return Err(ConfigurationError::DuplicateScenario(scenario.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_valid() {
        let config = SimulationConfig::baseline();
        assert!(config.validate().is_ok());
        assert_eq!(config.scenarios.len(), 3);
        assert_eq!(config.seed, 42);
        assert_eq!(config.horizon, 480.0);
    }

    #[test]
    fn zero_agents_rejected() {
        let scenario = ScenarioConfig::new("Empty Floor", 0, 5.0, 3.0);
        assert_eq!(
            scenario.validate(),
            Err(ConfigurationError::NoAgents {
                scenario: "Empty Floor".to_string()
            })
        );
    }

    #[test]
    fn non_positive_times_rejected() {
        let service = ScenarioConfig::new("s", 3, 0.0, 3.0).validate();
        assert!(matches!(
            service,
            Err(ConfigurationError::ServiceTime { value, .. }) if value == 0.0
        ));

        let arrivals = ScenarioConfig::new("a", 3, 5.0, -1.0).validate();
        assert!(matches!(
            arrivals,
            Err(ConfigurationError::InterarrivalTime { value, .. }) if value == -1.0
        ));

        assert!(ScenarioConfig::new("n", 3, f64::NAN, 3.0).validate().is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let scenarios = vec![
            ScenarioConfig::new("Same", 3, 5.0, 3.0),
            ScenarioConfig::new("Same", 5, 5.0, 3.0),
        ];
        assert_eq!(
            validate_scenarios(&scenarios),
            Err(ConfigurationError::DuplicateScenario("Same".to_string()))
        );
    }

    #[test]
    fn horizon_bounds() {
        assert!(validate_horizon(0.0).is_ok());
        assert!(validate_horizon(480.0).is_ok());
        assert_eq!(validate_horizon(-1.0), Err(ConfigurationError::Horizon(-1.0)));
        assert!(validate_horizon(f64::INFINITY).is_err());
    }

    #[test]
    fn parses_toml_with_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [[scenarios]]
            name = "Night Shift"
            num_agents = 2
            mean_service_time = 6.5
            mean_interarrival_time = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(config.horizon, SIM_TIME);
        assert_eq!(config.seed, RANDOM_SEED);
        assert!(!config.sample_queue);
        assert_eq!(
            config.scenarios,
            vec![ScenarioConfig::new("Night Shift", 2, 6.5, 10.0)]
        );
    }

    #[test]
    fn invalid_toml_values_are_configuration_errors() {
        let result = SimulationConfig::from_toml_str(
            r#"
            horizon = 60.0
            [[scenarios]]
            name = "Broken"
            num_agents = 0
            mean_service_time = 5.0
            mean_interarrival_time = 3.0
            "#,
        );
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::NoAgents { .. }))
        ));

        let result = SimulationConfig::from_toml_str("horizon = \"long\"\nscenarios = []");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SimulationConfig::from_path("does/not/exist.toml").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
