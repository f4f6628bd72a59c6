//! Shared integration-test support.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::NaiveDate;
use stride_engine::remote::MemoryRemote;
use stride_engine::store::MemoryStore;
use stride_engine::{Adapters, FixedClock, IdentityProvider, NewHabit, SyncState, Tracker};
use stride_shared::{Goal, Habit, HabitCategory, HabitFrequency, Workout};
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

pub const USER: &str = "test-user";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// The fixed "today" every integration test runs against (a Saturday).
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 29).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A minimal daily-habit creation payload.
pub fn new_habit(name: &str) -> NewHabit {
    NewHabit {
        name: name.into(),
        description: None,
        category: HabitCategory::Fitness,
        frequency: HabitFrequency::Daily,
        target_days_per_week: None,
        reminder: None,
        weather: None,
    }
}

/// A running tracker over memory adapters, with handles kept so tests can
/// play the part of the backend and of other devices.
pub struct TestContext {
    pub tracker: Arc<Tracker>,
    pub identity: Arc<IdentityProvider>,
    pub clock: Arc<FixedClock>,
    pub habit_store: Arc<MemoryStore<Habit>>,
    pub goal_store: Arc<MemoryStore<Goal>>,
    pub habit_remote: Arc<MemoryRemote<Habit>>,
    pub workout_remote: Arc<MemoryRemote<Workout>>,
    pub goal_remote: Arc<MemoryRemote<Goal>>,
}

/// Build and start a tracker that is already signed in as [`USER`].
pub async fn signed_in_context() -> TestContext {
    init_tracing();

    let habit_store = Arc::new(MemoryStore::new());
    let workout_store: Arc<MemoryStore<Workout>> = Arc::new(MemoryStore::new());
    let goal_store = Arc::new(MemoryStore::new());
    let habit_remote = Arc::new(MemoryRemote::new());
    let workout_remote = Arc::new(MemoryRemote::new());
    let goal_remote = Arc::new(MemoryRemote::new());

    let adapters = Adapters {
        habit_store: habit_store.clone(),
        workout_store,
        goal_store: goal_store.clone(),
        habit_remote: habit_remote.clone(),
        workout_remote: workout_remote.clone(),
        goal_remote: goal_remote.clone(),
    };

    let identity = Arc::new(IdentityProvider::new(Some(USER.to_string())));
    let clock = Arc::new(FixedClock::new(today()));
    let tracker = Arc::new(Tracker::new(adapters, identity.clone(), clock.clone()));
    tracker.start().await;
    wait_for_initial_sync(&tracker).await;

    TestContext {
        tracker,
        identity,
        clock,
        habit_store,
        goal_store,
        habit_remote,
        workout_remote,
        goal_remote,
    }
}

/// Block until every collection has applied its first remote snapshot, so
/// tests do not race the activation triggered by [`Tracker::start`].
pub async fn wait_for_initial_sync(tracker: &Tracker) {
    timeout(Duration::from_secs(2), async {
        loop {
            let states = tracker.sync_states().await;
            if states.iter().all(|s| *s == SyncState::Reconciled) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("initial sync did not complete in time");
}

/// Wait until a collection view satisfies the predicate, or fail the test.
pub async fn wait_for_view<E: Clone>(
    rx: &mut watch::Receiver<Vec<E>>,
    pred: impl Fn(&[E]) -> bool,
) {
    timeout(Duration::from_secs(2), async {
        loop {
            if pred(&rx.borrow()) {
                return;
            }
            rx.changed().await.expect("view channel closed");
        }
    })
    .await
    .expect("view did not reach the expected state in time");
}
