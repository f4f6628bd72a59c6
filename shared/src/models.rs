//! Data models for the Stride tracking core
//!
//! Habits, workouts, and goals are plain serde-serializable documents keyed
//! by an opaque string id. The same document shape is written to the local
//! durable store and pushed to the remote live collection, so everything
//! here must round-trip through JSON unchanged.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Mint a fresh opaque entity id.
///
/// Ids are stable across the local and remote stores; nothing may parse
/// them back into anything structured.
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// A document that participates in local/remote reconciliation.
///
/// Every entity belongs to exactly one named collection, is keyed by an
/// opaque id, and defines the stable user-visible ordering used when the
/// canonical in-memory view is republished.
pub trait Entity:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Collection name, used as the store tree name and the remote
    /// document-set key.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Stable ordering for the canonical view.
    fn view_order(&self, other: &Self) -> Ordering;
}

// ============================================================================
// Habit
// ============================================================================

/// Habit category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HabitCategory {
    Health,
    Fitness,
    Productivity,
    Mindfulness,
    Learning,
    Social,
    #[default]
    Other,
}

/// How often a habit is expected to be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HabitFrequency {
    #[default]
    Daily,
    Weekdays,
    Weekends,
    /// Target a configurable number of days per week.
    Custom,
}

impl HabitFrequency {
    /// Whether the habit is due on a given weekday. `Custom` habits carry
    /// a weekly target instead of fixed days, so every day counts as due.
    pub fn is_due_on(&self, day: Weekday) -> bool {
        match self {
            HabitFrequency::Daily | HabitFrequency::Custom => true,
            HabitFrequency::Weekdays => !matches!(day, Weekday::Sat | Weekday::Sun),
            HabitFrequency::Weekends => matches!(day, Weekday::Sat | Weekday::Sun),
        }
    }

    /// Expected completions per week, given the habit's weekly target.
    pub fn target_per_week(&self, target_days_per_week: u8) -> u8 {
        match self {
            HabitFrequency::Daily => 7,
            HabitFrequency::Weekdays => 5,
            HabitFrequency::Weekends => 2,
            HabitFrequency::Custom => target_days_per_week.clamp(1, 7),
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            HabitFrequency::Daily => "Every day",
            HabitFrequency::Weekdays => "Monday through Friday",
            HabitFrequency::Weekends => "Saturday and Sunday",
            HabitFrequency::Custom => "A chosen number of days per week",
        }
    }
}

/// Outdoor-suitability preferences for a habit.
///
/// Owned by the habit and serialized with it, rather than kept in a
/// separate keyed side table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WeatherPrefs {
    /// The habit is performed outdoors.
    pub outdoor: bool,
    pub min_temp_c: Option<f64>,
    pub max_temp_c: Option<f64>,
    pub avoid_rain: bool,
}

/// A recurring habit with a per-calendar-day completion history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: HabitCategory,
    pub frequency: HabitFrequency,
    /// Meaningful only for [`HabitFrequency::Custom`]; always 1..=7.
    pub target_days_per_week: u8,
    /// Optional daily reminder time-of-day.
    pub reminder: Option<NaiveTime>,
    pub start_date: NaiveDate,
    /// Calendar days on which the habit was completed. The set keeps the
    /// one-entry-per-day invariant; time-of-day is never recorded.
    pub completions: BTreeSet<NaiveDate>,
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherPrefs>,
}

impl Habit {
    pub fn new(
        name: impl Into<String>,
        category: HabitCategory,
        frequency: HabitFrequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            description: None,
            category,
            frequency,
            target_days_per_week: frequency.target_per_week(7),
            reminder: None,
            start_date,
            completions: BTreeSet::new(),
            archived: false,
            weather: None,
        }
    }

    pub fn is_completed_on(&self, day: NaiveDate) -> bool {
        self.completions.contains(&day)
    }

    /// Toggle the completion mark for a calendar day.
    ///
    /// Returns `true` when the day is now completed, `false` when the
    /// toggle removed an existing completion.
    pub fn toggle_completion(&mut self, day: NaiveDate) -> bool {
        if self.completions.remove(&day) {
            false
        } else {
            self.completions.insert(day);
            true
        }
    }

    /// Completions falling in the Monday-started week containing `today`.
    pub fn completions_this_week(&self, today: NaiveDate) -> usize {
        let week = today.week(Weekday::Mon);
        self.completions
            .range(week.first_day()..=week.last_day())
            .count()
    }
}

impl Entity for Habit {
    const COLLECTION: &'static str = "habits";

    fn id(&self) -> &str {
        &self.id
    }

    fn view_order(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.id.cmp(&other.id))
    }
}

// ============================================================================
// Workout
// ============================================================================

/// Workout type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Running,
    Cycling,
    Swimming,
    Strength,
    Walking,
    Hiit,
    Yoga,
    #[default]
    Other,
}

/// Subjective workout intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutIntensity {
    Low,
    Moderate,
    High,
}

/// A discrete workout session.
///
/// Unlike habit completions, a workout keeps its full timestamp; two
/// workouts on the same day are distinct entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub name: String,
    pub workout_type: WorkoutType,
    pub duration_secs: u32,
    /// May be user-entered or estimated upstream.
    pub calories: f64,
    pub performed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub distance_km: Option<f64>,
    pub intensity: Option<WorkoutIntensity>,
    pub avg_heart_rate: Option<u32>,
}

impl Workout {
    pub fn new(
        name: impl Into<String>,
        workout_type: WorkoutType,
        duration_secs: u32,
        calories: f64,
        performed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            workout_type,
            duration_secs,
            calories,
            performed_at,
            notes: None,
            distance_km: None,
            intensity: None,
            avg_heart_rate: None,
        }
    }
}

impl Entity for Workout {
    const COLLECTION: &'static str = "workouts";

    fn id(&self) -> &str {
        &self.id
    }

    // Most recent first.
    fn view_order(&self, other: &Self) -> Ordering {
        other
            .performed_at
            .cmp(&self.performed_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

// ============================================================================
// Goal
// ============================================================================

/// Goal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Number of workouts logged.
    WorkoutCount,
    /// Number of habit completion events.
    HabitCompletions,
    /// Accumulated workout distance, kilometers.
    Distance,
    /// Accumulated workout duration, seconds.
    Duration,
    /// Derived from the linked habit's current streak.
    Streak,
    /// Target weight; updated directly by the user, never by linkage.
    Weight,
}

/// Goal timeframe, used only to compute a remaining-days deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalTimeframe {
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl GoalTimeframe {
    pub fn length_days(&self) -> i64 {
        match self {
            GoalTimeframe::Weekly => 7,
            GoalTimeframe::Monthly => 30,
            GoalTimeframe::Quarterly => 90,
            GoalTimeframe::Yearly => 365,
        }
    }

    /// Days until the deadline implied by a start date, floored at zero.
    pub fn days_remaining(&self, start_date: NaiveDate, today: NaiveDate) -> i64 {
        let deadline = start_date + chrono::Duration::days(self.length_days());
        (deadline - today).num_days().max(0)
    }
}

/// A progress goal, optionally linked to a habit by id.
///
/// The habit link is a weak reference: deleting the habit leaves the id
/// unresolvable and linkage updates for it become no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub goal_type: GoalType,
    pub target_value: f64,
    /// Never negative; see [`Goal::add_progress`].
    pub current_value: f64,
    pub linked_habit_id: Option<String>,
    pub timeframe: GoalTimeframe,
    pub start_date: NaiveDate,
    pub archived: bool,
}

impl Goal {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        goal_type: GoalType,
        target_value: f64,
        timeframe: GoalTimeframe,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: new_entity_id(),
            user_id: user_id.into(),
            title: title.into(),
            goal_type,
            target_value,
            current_value: 0.0,
            linked_habit_id: None,
            timeframe,
            start_date,
            archived: false,
        }
    }

    /// Completion is always derived, never stored.
    pub fn is_completed(&self) -> bool {
        self.current_value >= self.target_value
    }

    /// Event-sourced progress bump, clamped at a floor of zero.
    pub fn add_progress(&mut self, delta: f64) {
        self.current_value = (self.current_value + delta).max(0.0);
    }

    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        self.timeframe.days_remaining(self.start_date, today)
    }

    /// Progress as a 0..=100 percentage.
    pub fn progress_percent(&self) -> f64 {
        if self.target_value <= 0.0 {
            return if self.is_completed() { 100.0 } else { 0.0 };
        }
        ((self.current_value / self.target_value) * 100.0).clamp(0.0, 100.0)
    }
}

impl Entity for Goal {
    const COLLECTION: &'static str = "goals";

    fn id(&self) -> &str {
        &self.id
    }

    fn view_order(&self, other: &Self) -> Ordering {
        self.title
            .to_lowercase()
            .cmp(&other.title.to_lowercase())
            .then_with(|| self.id.cmp(&other.id))
    }
}
