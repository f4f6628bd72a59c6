//! Stride Shared Library
//!
//! This crate contains the entity model, streak calculations, and input
//! validation shared by the sync engine and any UI layer. It is pure:
//! no I/O, no async, no clock access.

pub mod models;
pub mod streak;
pub mod validation;

// Re-export commonly used items
pub use models::{
    new_entity_id, Entity, Goal, GoalTimeframe, GoalType, Habit, HabitCategory,
    HabitFrequency, WeatherPrefs, Workout, WorkoutIntensity, WorkoutType,
};
