use std::path::PathBuf;

use des::SimError;
use des::parallel::RunFailure;
use thiserror::Error;

/// Invalid scenario parameters, detected before anything is scheduled.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("scenario '{scenario}': num_agents must be at least 1")]
    NoAgents { scenario: String },

    #[error("scenario '{scenario}': mean_service_time must be positive, got {value}")]
    ServiceTime { scenario: String, value: f64 },

    #[error("scenario '{scenario}': mean_interarrival_time must be positive, got {value}")]
    InterarrivalTime { scenario: String, value: f64 },

    #[error("horizon must be a finite, non-negative number of minutes, got {0}")]
    Horizon(f64),

    #[error("scenario name '{0}' is used more than once")]
    DuplicateScenario(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error("scenario '{scenario}' failed: {source}")]
    ScenarioFailed {
        scenario: String,
        #[source]
        source: RunFailure,
    },

    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
