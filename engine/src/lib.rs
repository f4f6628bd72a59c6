//! Stride engine: local-first habit, workout, and goal tracking with
//! two-way remote reconciliation.

pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod remote;
pub mod services;
pub mod store;
pub mod sync;
pub mod tracker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use identity::IdentityProvider;
pub use sync::{Change, CollectionSync, SyncState};
pub use tracker::{
    Adapters, GoalUpdate, HabitStats, HabitUpdate, NewGoal, NewHabit, NewWorkout, Tracker,
};
