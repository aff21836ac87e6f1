//! Event-driven simulation module
//!
//! Balls move along closed-form trajectories between events. The engine
//! never steps time: it solves for the next instant anything interesting
//! happens, applies it and derives the next candidates.
//! - Ball state and motion phases: `state`, `motion`
//! - Static geometry and broad phase: `table`, `tiles`
//! - Contact times and impact response: `collision`, `cue`
//! - Engine: `event`, `engine`, `in_time`, `prescheduled`, `observer`

pub mod collision;
pub mod cue;
pub mod engine;
pub mod event;
pub mod in_time;
pub mod motion;
pub mod observer;
pub mod prescheduled;
pub mod state;
pub mod table;
pub mod tiles;

pub use collision::{CollisionSolver, Trajectory, exchange_momentum, phase_after_impact, reflect};
pub use cue::{CueShot, KinematicNoise, ShotNoise, noisy_kinematics};
pub use engine::{EventBook, Simulation, World};
pub use event::{Event, EventId, EventKind};
pub use in_time::InTimeSimulation;
pub use motion::BallMotion;
pub use observer::{CollisionLimit, EventHandler, EventRecorder, Flow};
pub use prescheduled::PrescheduledSimulation;
pub use state::{Ball, BallId, BallKind, Friction, MotionPhase};
pub use table::{Cushion, Orientation, Pocket, PocketCorner, Table};
pub use tiles::{Obstacle, Tile, TileGrid, TileId};
