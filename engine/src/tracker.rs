//! Tracker facade
//!
//! Composition root for the engine: wires the identity provider, clock,
//! local stores, remote collections, per-collection sync, and the goal
//! linkage engine, and exposes the operations callers use.
//!
//! Write operations follow one policy: validate, apply locally, run goal
//! linkage, then push to the remote. A failed push is surfaced to the
//! caller but the local write stands; the next remote snapshot converges
//! both sides.

use std::sync::Arc;

use chrono::NaiveTime;
use stride_shared::{
    streak, validation, Entity, Goal, GoalTimeframe, GoalType, Habit, HabitCategory,
    HabitFrequency, WeatherPrefs, Workout, WorkoutIntensity, WorkoutType,
};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{EngineError, EngineResult};
use crate::identity::IdentityProvider;
use crate::remote::{MemoryRemote, RemoteCollection, SnapshotEvent, SnapshotReceiver};
use crate::services::GoalLinkage;
use crate::store::{LocalStore, MemoryStore, SledStore};
use crate::sync::{CollectionSync, SyncState};

// ============================================================================
// Adapters
// ============================================================================

/// The pluggable edges of the engine: one store and one remote per
/// collection.
pub struct Adapters {
    pub habit_store: Arc<dyn LocalStore<Habit>>,
    pub workout_store: Arc<dyn LocalStore<Workout>>,
    pub goal_store: Arc<dyn LocalStore<Goal>>,
    pub habit_remote: Arc<dyn RemoteCollection<Habit>>,
    pub workout_remote: Arc<dyn RemoteCollection<Workout>>,
    pub goal_remote: Arc<dyn RemoteCollection<Goal>>,
}

impl Adapters {
    /// Everything in memory. Used by tests and available for throwaway
    /// sessions.
    pub fn in_memory() -> Self {
        Self {
            habit_store: Arc::new(MemoryStore::new()),
            workout_store: Arc::new(MemoryStore::new()),
            goal_store: Arc::new(MemoryStore::new()),
            habit_remote: Arc::new(MemoryRemote::new()),
            workout_remote: Arc::new(MemoryRemote::new()),
            goal_remote: Arc::new(MemoryRemote::new()),
        }
    }

    /// Sled-backed stores per the configuration, with loopback remotes.
    /// A networked backend replaces the remotes through this same struct.
    pub fn from_store_config(cfg: &StoreConfig) -> EngineResult<Self> {
        let store = if cfg.ephemeral {
            Arc::new(SledStore::temporary().map_err(EngineError::local_store)?)
        } else {
            Arc::new(SledStore::open(&cfg.path).map_err(EngineError::local_store)?)
        };
        Ok(Self {
            habit_store: store.clone(),
            workout_store: store.clone(),
            goal_store: store,
            habit_remote: Arc::new(MemoryRemote::new()),
            workout_remote: Arc::new(MemoryRemote::new()),
            goal_remote: Arc::new(MemoryRemote::new()),
        })
    }
}

// ============================================================================
// Input payloads
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewHabit {
    pub name: String,
    pub description: Option<String>,
    pub category: HabitCategory,
    pub frequency: HabitFrequency,
    pub target_days_per_week: Option<u8>,
    pub reminder: Option<NaiveTime>,
    pub weather: Option<WeatherPrefs>,
}

/// Partial habit edit; `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct HabitUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<HabitCategory>,
    pub frequency: Option<HabitFrequency>,
    pub target_days_per_week: Option<u8>,
    pub reminder: Option<NaiveTime>,
    pub weather: Option<WeatherPrefs>,
}

#[derive(Debug, Clone)]
pub struct NewWorkout {
    pub name: String,
    pub workout_type: WorkoutType,
    pub duration_secs: u32,
    pub calories: f64,
    pub notes: Option<String>,
    pub distance_km: Option<f64>,
    pub intensity: Option<WorkoutIntensity>,
    pub avg_heart_rate: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub title: String,
    pub goal_type: GoalType,
    pub target_value: f64,
    pub linked_habit_id: Option<String>,
    pub timeframe: GoalTimeframe,
}

/// Partial goal edit; `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub target_value: Option<f64>,
    /// Direct progress entry, for goal types linkage never drives
    /// (weight being the one in practice).
    pub current_value: Option<f64>,
    pub linked_habit_id: Option<String>,
    pub timeframe: Option<GoalTimeframe>,
}

/// Read-only streak summary for one habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completions: u32,
    pub completed_this_week: u32,
}

// ============================================================================
// Tracker
// ============================================================================

pub struct Tracker {
    identity: Arc<IdentityProvider>,
    clock: Arc<dyn Clock>,
    habits: Arc<CollectionSync<Habit>>,
    workouts: Arc<CollectionSync<Workout>>,
    goals: Arc<CollectionSync<Goal>>,
    linkage: GoalLinkage,
    identity_task: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<JoinHandle<()>>>,
}

impl Tracker {
    pub fn new(adapters: Adapters, identity: Arc<IdentityProvider>, clock: Arc<dyn Clock>) -> Self {
        let habits = Arc::new(CollectionSync::new(
            adapters.habit_store,
            adapters.habit_remote,
        ));
        let workouts = Arc::new(CollectionSync::new(
            adapters.workout_store,
            adapters.workout_remote,
        ));
        let goals = Arc::new(CollectionSync::new(adapters.goal_store, adapters.goal_remote));
        let linkage = GoalLinkage::new(goals.clone(), clock.clone());
        Self {
            identity,
            clock,
            habits,
            workouts,
            goals,
            linkage,
            identity_task: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Wire up from configuration with the system clock.
    pub fn from_store_config(
        cfg: &StoreConfig,
        identity: Arc<IdentityProvider>,
    ) -> EngineResult<Self> {
        let adapters = Adapters::from_store_config(cfg)?;
        Ok(Self::new(adapters, identity, Arc::new(SystemClock)))
    }

    /// Begin following identity changes. The current identity (if any) is
    /// activated immediately; every later sign-in or sign-out tears down
    /// and rebuilds the remote subscriptions.
    pub async fn start(self: &Arc<Self>) {
        let tracker = Arc::clone(self);
        let mut identity_rx = self.identity.watch();
        let handle = tokio::spawn(async move {
            loop {
                let user = identity_rx.borrow_and_update().clone();
                tracker.activate(user).await;
                if identity_rx.changed().await.is_err() {
                    break;
                }
            }
        });
        *self.identity_task.lock().await = Some(handle);
    }

    /// Stop all background tasks. Local data stays on disk.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.identity_task.lock().await.take() {
            handle.abort();
        }
        for handle in self.subscriptions.lock().await.drain(..) {
            handle.abort();
        }
        info!("tracker shut down");
    }

    async fn activate(self: &Arc<Self>, user: Option<String>) {
        let mut subs = self.subscriptions.lock().await;
        for handle in subs.drain(..) {
            handle.abort();
        }
        self.habits.reset().await;
        self.workouts.reset().await;
        self.goals.reset().await;

        let Some(user) = user else {
            info!("no identity; collections cleared");
            return;
        };
        info!(user = %user, "activating collections");

        for result in [
            self.habits.load_local().await,
            self.workouts.load_local().await,
            self.goals.load_local().await,
        ] {
            if let Err(err) = result {
                warn!(error = %err, "local cache unavailable at activation");
            }
        }

        // Habit snapshots additionally feed the goal linkage engine with
        // the completion toggles that arrived from the other side.
        match self.habits.subscribe_remote(&user).await {
            Ok(mut rx) => {
                let tracker = Arc::clone(self);
                let user_id = user.clone();
                subs.push(tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        match event {
                            SnapshotEvent::Snapshot(docs) => {
                                let changes = tracker.habits.apply_snapshot(docs).await;
                                for change in &changes {
                                    if let Err(err) =
                                        tracker.linkage.on_habit_reconciled(&user_id, change).await
                                    {
                                        warn!(error = %err, "goal linkage failed on reconciled habit");
                                    }
                                }
                            }
                            SnapshotEvent::Error(message) => {
                                tracker.habits.on_subscription_error(&message).await;
                            }
                        }
                    }
                }));
            }
            Err(err) => self.habits.on_subscription_error(&err.to_string()).await,
        }

        match self.workouts.subscribe_remote(&user).await {
            Ok(rx) => subs.push(spawn_consumer(self.workouts.clone(), rx)),
            Err(err) => self.workouts.on_subscription_error(&err.to_string()).await,
        }
        match self.goals.subscribe_remote(&user).await {
            Ok(rx) => subs.push(spawn_consumer(self.goals.clone(), rx)),
            Err(err) => self.goals.on_subscription_error(&err.to_string()).await,
        }
    }

    /// Lifecycle of each collection, in habit/workout/goal order.
    pub async fn sync_states(&self) -> [SyncState; 3] {
        [
            self.habits.state().await,
            self.workouts.state().await,
            self.goals.state().await,
        ]
    }

    fn require_user(&self) -> EngineResult<String> {
        self.identity.current().ok_or(EngineError::NotAuthenticated)
    }

    // ========================================================================
    // Habits
    // ========================================================================

    pub async fn create_habit(&self, new: NewHabit) -> EngineResult<Habit> {
        let user = self.require_user()?;
        validation::validate_name(&new.name).map_err(EngineError::Validation)?;

        let mut habit = Habit::new(new.name, new.category, new.frequency, self.clock.today());
        habit.description = new.description;
        habit.reminder = new.reminder;
        habit.weather = new.weather;
        if let Some(days) = new.target_days_per_week {
            validation::validate_target_days(days).map_err(EngineError::Validation)?;
            habit.target_days_per_week = days;
        }

        self.habits.insert_local(habit.clone()).await?;
        self.habits.push_remote(&user, &habit).await?;
        Ok(habit)
    }

    pub async fn update_habit(&self, habit_id: &str, update: HabitUpdate) -> EngineResult<Habit> {
        let user = self.require_user()?;
        if let Some(name) = &update.name {
            validation::validate_name(name).map_err(EngineError::Validation)?;
        }
        if let Some(days) = update.target_days_per_week {
            validation::validate_target_days(days).map_err(EngineError::Validation)?;
        }

        let habit = self
            .habits
            .mutate_local(habit_id, |h| {
                if let Some(name) = update.name {
                    h.name = name;
                }
                if let Some(description) = update.description {
                    h.description = Some(description);
                }
                if let Some(category) = update.category {
                    h.category = category;
                }
                if let Some(frequency) = update.frequency {
                    h.frequency = frequency;
                }
                if let Some(days) = update.target_days_per_week {
                    h.target_days_per_week = days;
                }
                if let Some(reminder) = update.reminder {
                    h.reminder = Some(reminder);
                }
                if let Some(weather) = update.weather {
                    h.weather = Some(weather);
                }
            })
            .await?;
        self.habits.push_remote(&user, &habit).await?;
        Ok(habit)
    }

    /// Archiving is a normal field edit: the habit keeps syncing and its
    /// history stays intact.
    pub async fn archive_habit(&self, habit_id: &str) -> EngineResult<Habit> {
        let user = self.require_user()?;
        let habit = self
            .habits
            .mutate_local(habit_id, |h| h.archived = true)
            .await?;
        self.habits.push_remote(&user, &habit).await?;
        Ok(habit)
    }

    /// Hard delete. Goals linked to this habit keep their counters; the
    /// dangling link simply stops receiving events.
    pub async fn delete_habit(&self, habit_id: &str) -> EngineResult<()> {
        let user = self.require_user()?;
        self.habits.remove_local(habit_id).await?;
        self.habits.delete_remote(&user, habit_id).await
    }

    /// Toggle today's completion for a habit and run goal linkage.
    ///
    /// The local toggle and the linkage updates always apply. Failures
    /// from the remote push and from linkage are both checked, reported
    /// in the order they occurred.
    pub async fn toggle_completion(&self, habit_id: &str) -> EngineResult<Habit> {
        let user = self.require_user()?;
        let today = self.clock.today();

        let mut completed_now = false;
        let habit = self
            .habits
            .mutate_local(habit_id, |h| {
                completed_now = h.toggle_completion(today);
            })
            .await?;

        let push = self.habits.push_remote(&user, &habit).await;
        let linkage = self
            .linkage
            .on_habit_toggled(&user, &habit, completed_now)
            .await;
        push?;
        linkage?;
        Ok(habit)
    }

    pub async fn habit_stats(&self, habit_id: &str) -> EngineResult<HabitStats> {
        let habit = self
            .habits
            .get(habit_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("habits {habit_id}")))?;
        let today = self.clock.today();
        Ok(HabitStats {
            current_streak: streak::current_streak(&habit.completions, today),
            longest_streak: streak::longest_streak(&habit.completions),
            total_completions: habit.completions.len() as u32,
            completed_this_week: habit.completions_this_week(today) as u32,
        })
    }

    pub async fn habits(&self) -> Vec<Habit> {
        self.habits.view().await
    }

    pub fn watch_habits(&self) -> watch::Receiver<Vec<Habit>> {
        self.habits.watch_view()
    }

    // ========================================================================
    // Workouts
    // ========================================================================

    pub async fn add_workout(&self, new: NewWorkout) -> EngineResult<Workout> {
        let user = self.require_user()?;
        validation::validate_name(&new.name).map_err(EngineError::Validation)?;
        validation::validate_duration_secs(new.duration_secs).map_err(EngineError::Validation)?;
        validation::validate_calories(new.calories).map_err(EngineError::Validation)?;
        if let Some(km) = new.distance_km {
            validation::validate_distance_km(km).map_err(EngineError::Validation)?;
        }

        let mut workout = Workout::new(
            new.name,
            new.workout_type,
            new.duration_secs,
            new.calories,
            chrono::Utc::now(),
        );
        workout.notes = new.notes;
        workout.distance_km = new.distance_km;
        workout.intensity = new.intensity;
        workout.avg_heart_rate = new.avg_heart_rate;

        self.workouts.insert_local(workout.clone()).await?;
        let push = self.workouts.push_remote(&user, &workout).await;
        let linkage = self.linkage.on_workout_added(&user, &workout).await;
        push?;
        linkage?;
        Ok(workout)
    }

    /// Deleting a workout does not rewind the goals it advanced.
    pub async fn delete_workout(&self, workout_id: &str) -> EngineResult<()> {
        let user = self.require_user()?;
        self.workouts.remove_local(workout_id).await?;
        self.workouts.delete_remote(&user, workout_id).await
    }

    pub async fn workouts(&self) -> Vec<Workout> {
        self.workouts.view().await
    }

    pub fn watch_workouts(&self) -> watch::Receiver<Vec<Workout>> {
        self.workouts.watch_view()
    }

    // ========================================================================
    // Goals
    // ========================================================================

    pub async fn create_goal(&self, new: NewGoal) -> EngineResult<Goal> {
        let user = self.require_user()?;
        validation::validate_name(&new.title).map_err(EngineError::Validation)?;
        validation::validate_goal_target(new.target_value).map_err(EngineError::Validation)?;

        let mut goal = Goal::new(
            user.clone(),
            new.title,
            new.goal_type,
            new.target_value,
            new.timeframe,
            self.clock.today(),
        );
        goal.linked_habit_id = new.linked_habit_id;

        // Streak goals are derived, so a newly linked one starts at the
        // habit's current streak rather than zero.
        if goal.goal_type == GoalType::Streak {
            if let Some(habit_id) = &goal.linked_habit_id {
                if let Some(habit) = self.habits.get(habit_id).await {
                    goal.current_value =
                        f64::from(streak::current_streak(&habit.completions, self.clock.today()));
                }
            }
        }

        self.goals.insert_local(goal.clone()).await?;
        self.goals.push_remote(&user, &goal).await?;
        Ok(goal)
    }

    pub async fn update_goal(&self, goal_id: &str, update: GoalUpdate) -> EngineResult<Goal> {
        let user = self.require_user()?;
        if let Some(title) = &update.title {
            validation::validate_name(title).map_err(EngineError::Validation)?;
        }
        if let Some(target) = update.target_value {
            validation::validate_goal_target(target).map_err(EngineError::Validation)?;
        }

        let goal = self
            .goals
            .mutate_local(goal_id, |g| {
                if let Some(title) = update.title {
                    g.title = title;
                }
                if let Some(target) = update.target_value {
                    g.target_value = target;
                }
                if let Some(current) = update.current_value {
                    g.current_value = current.max(0.0);
                }
                if let Some(habit_id) = update.linked_habit_id {
                    g.linked_habit_id = Some(habit_id);
                }
                if let Some(timeframe) = update.timeframe {
                    g.timeframe = timeframe;
                }
            })
            .await?;
        self.goals.push_remote(&user, &goal).await?;
        Ok(goal)
    }

    pub async fn archive_goal(&self, goal_id: &str) -> EngineResult<Goal> {
        let user = self.require_user()?;
        let goal = self
            .goals
            .mutate_local(goal_id, |g| g.archived = true)
            .await?;
        self.goals.push_remote(&user, &goal).await?;
        Ok(goal)
    }

    pub async fn delete_goal(&self, goal_id: &str) -> EngineResult<()> {
        let user = self.require_user()?;
        self.goals.remove_local(goal_id).await?;
        self.goals.delete_remote(&user, goal_id).await
    }

    /// Build (without saving) a goal suggestion for a habit.
    pub async fn suggest_goal(&self, habit_id: &str) -> EngineResult<Goal> {
        let user = self.require_user()?;
        let habit = self
            .habits
            .get(habit_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("habits {habit_id}")))?;
        Ok(crate::services::suggestions::suggest_goal_for(
            &user,
            &habit,
            self.clock.today(),
        ))
    }

    pub async fn goals(&self) -> Vec<Goal> {
        self.goals.view().await
    }

    pub fn watch_goals(&self) -> watch::Receiver<Vec<Goal>> {
        self.goals.watch_view()
    }
}

fn spawn_consumer<E: Entity>(
    collection: Arc<CollectionSync<E>>,
    mut rx: SnapshotReceiver<E>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SnapshotEvent::Snapshot(docs) => {
                    collection.apply_snapshot(docs).await;
                }
                SnapshotEvent::Error(message) => {
                    collection.on_subscription_error(&message).await;
                }
            }
        }
    })
}
