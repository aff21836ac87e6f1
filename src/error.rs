use thiserror::Error;

use crate::sim::{BallId, EventId};

/// Caller misuse of a simulation or its configuration
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Negative or non-finite time step: {dt}")]
    NegativeTimeStep { dt: f64 },

    #[error("Unknown ball: {0}")]
    UnknownBall(BallId),

    #[error("Unknown {kind}: {index}")]
    UnknownObstacle { kind: &'static str, index: usize },

    #[error("Event {0} is no longer scheduled")]
    StaleEvent(EventId),

    #[error("Simulation has not been initialized")]
    NotInitialized,

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

impl SimError {
    /// Errors that only reflect a bad argument; the run itself is intact.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SimError::NegativeTimeStep { .. } => true,
            SimError::UnknownBall(_) => true,
            SimError::UnknownObstacle { .. } => true,
            SimError::NotInitialized => true,
            SimError::StaleEvent(_) => false,
            SimError::InvalidSettings(_) | SimError::Settings(_) => true,
        }
    }
}
