//! Goal linkage engine
//!
//! Couples habit-completion and workout events to the goals they drive.
//! Counter-style goals (habit completions, workout count, distance,
//! duration) are event-sourced: they only ever move by the delta of a
//! discrete event and are never recomputed from history, so an undo
//! decrements exactly what the original completion incremented, clamped
//! at a floor of zero. Streak-type goals are the one exception: their
//! value is derived from the linked habit's completion set on every
//! toggle, regardless of the goal's own event history.

use std::sync::Arc;

use stride_shared::{streak, Goal, GoalType, Habit, Workout};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::sync::{Change, CollectionSync};

/// Reacts to completion and workout events by updating dependent goals.
pub struct GoalLinkage {
    goals: Arc<CollectionSync<Goal>>,
    clock: Arc<dyn Clock>,
}

impl GoalLinkage {
    pub fn new(goals: Arc<CollectionSync<Goal>>, clock: Arc<dyn Clock>) -> Self {
        Self { goals, clock }
    }

    /// React to one habit completion toggle.
    ///
    /// `completed_now` is `true` for a new completion and `false` for an
    /// undo. Active habit-completion goals linked to this habit, or linked
    /// to no habit at all (general goals apply to every habit's
    /// completions), move by exactly one. Streak goals linked to this
    /// habit are recomputed outright.
    pub async fn on_habit_toggled(
        &self,
        user_id: &str,
        habit: &Habit,
        completed_now: bool,
    ) -> EngineResult<()> {
        let today = self.clock.today();
        let delta = if completed_now { 1.0 } else { -1.0 };
        let mut first_store_failure = None;

        for goal in self.goals.view().await {
            if goal.archived {
                continue;
            }
            match goal.goal_type {
                GoalType::HabitCompletions => {
                    let applies = goal
                        .linked_habit_id
                        .as_deref()
                        .map_or(true, |id| id == habit.id);
                    // A completed counter goal stops accumulating, but an
                    // undo must still reverse the increment that
                    // completed it.
                    if !applies || (completed_now && goal.is_completed()) {
                        continue;
                    }
                    debug!(
                        goal = %goal.id,
                        habit = %habit.id,
                        delta,
                        "habit toggle drives completion goal"
                    );
                    self.persist(user_id, &goal.id, &mut first_store_failure, |g| {
                        g.add_progress(delta)
                    })
                    .await;
                }
                GoalType::Streak => {
                    if goal.linked_habit_id.as_deref() != Some(habit.id.as_str()) {
                        continue;
                    }
                    let current = f64::from(streak::current_streak(&habit.completions, today));
                    if (goal.current_value - current).abs() < f64::EPSILON {
                        continue;
                    }
                    debug!(goal = %goal.id, habit = %habit.id, current, "streak goal recomputed");
                    self.persist(user_id, &goal.id, &mut first_store_failure, |g| {
                        g.current_value = current
                    })
                    .await;
                }
                _ => {}
            }
        }

        match first_store_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// React to a newly logged workout: count goals move by one,
    /// accumulator goals by the workout's own numbers. No habit linkage
    /// is involved; applicability comes from the goal type alone.
    pub async fn on_workout_added(&self, user_id: &str, workout: &Workout) -> EngineResult<()> {
        let mut first_store_failure = None;

        for goal in self.goals.view().await {
            if goal.archived || goal.is_completed() {
                continue;
            }
            let delta = match goal.goal_type {
                GoalType::WorkoutCount => 1.0,
                GoalType::Distance => match workout.distance_km {
                    Some(km) if km > 0.0 => km,
                    _ => continue,
                },
                GoalType::Duration => f64::from(workout.duration_secs),
                _ => continue,
            };
            debug!(goal = %goal.id, workout = %workout.id, delta, "workout drives goal");
            self.persist(user_id, &goal.id, &mut first_store_failure, |g| {
                g.add_progress(delta)
            })
            .await;
        }

        match first_store_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// React to a habit edit applied by reconciliation.
    ///
    /// A remote overwrite may add or remove any number of completion days
    /// at once; each one is treated as a toggle event. A habit appearing
    /// in or vanishing from the collection is not a toggle: the goals it
    /// already drove sync as their own documents.
    pub async fn on_habit_reconciled(
        &self,
        user_id: &str,
        change: &Change<Habit>,
    ) -> EngineResult<()> {
        let Change::Updated { before, after } = change else {
            return Ok(());
        };

        let added = after.completions.difference(&before.completions).count();
        let removed = before.completions.difference(&after.completions).count();
        if added == 0 && removed == 0 {
            return Ok(());
        }
        debug!(
            habit = %after.id,
            added,
            removed,
            "completion toggles arrived via reconciliation"
        );

        for _ in 0..added {
            self.on_habit_toggled(user_id, after, true).await?;
        }
        for _ in 0..removed {
            self.on_habit_toggled(user_id, after, false).await?;
        }
        Ok(())
    }

    /// Apply one goal mutation: write through locally, push best-effort.
    ///
    /// Push failures are only logged here; the next snapshot converges
    /// them. Store failures abandon that one goal's update and are
    /// surfaced once to the caller.
    async fn persist<F>(
        &self,
        user_id: &str,
        goal_id: &str,
        first_store_failure: &mut Option<EngineError>,
        mutate: F,
    ) where
        F: FnOnce(&mut Goal),
    {
        match self.goals.mutate_local(goal_id, mutate).await {
            Ok(updated) => {
                let _ = self.goals.push_remote(user_id, &updated).await;
            }
            Err(err) => {
                warn!(goal = goal_id, error = %err, "goal update abandoned");
                if first_store_failure.is_none() {
                    *first_store_failure = Some(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stride_shared::{GoalTimeframe, HabitCategory, HabitFrequency, WorkoutType};

    use crate::clock::FixedClock;
    use crate::remote::MemoryRemote;
    use crate::store::MemoryStore;

    const USER: &str = "user-1";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        day(2026, 8, 29)
    }

    fn setup() -> (Arc<CollectionSync<Goal>>, GoalLinkage) {
        let goals = Arc::new(CollectionSync::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryRemote::new()),
        ));
        let linkage = GoalLinkage::new(goals.clone(), Arc::new(FixedClock::new(today())));
        (goals, linkage)
    }

    fn habit() -> Habit {
        Habit::new(
            "Meditate",
            HabitCategory::Mindfulness,
            HabitFrequency::Daily,
            day(2026, 8, 1),
        )
    }

    fn completion_goal(linked: Option<&Habit>, target: f64) -> Goal {
        let mut goal = Goal::new(
            USER,
            "Keep at it",
            GoalType::HabitCompletions,
            target,
            GoalTimeframe::Monthly,
            day(2026, 8, 1),
        );
        goal.linked_habit_id = linked.map(|h| h.id.clone());
        goal
    }

    #[tokio::test]
    async fn test_completion_increments_linked_goal() {
        let (goals, linkage) = setup();
        let h = habit();
        goals
            .insert_local(completion_goal(Some(&h), 10.0))
            .await
            .unwrap();

        linkage.on_habit_toggled(USER, &h, true).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 1.0);
    }

    #[tokio::test]
    async fn test_unlinked_goal_applies_to_any_habit() {
        let (goals, linkage) = setup();
        goals.insert_local(completion_goal(None, 10.0)).await.unwrap();

        linkage.on_habit_toggled(USER, &habit(), true).await.unwrap();
        linkage.on_habit_toggled(USER, &habit(), true).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 2.0);
    }

    #[tokio::test]
    async fn test_goal_linked_to_other_habit_is_untouched() {
        let (goals, linkage) = setup();
        let other = habit();
        goals
            .insert_local(completion_goal(Some(&other), 10.0))
            .await
            .unwrap();

        linkage.on_habit_toggled(USER, &habit(), true).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 0.0);
    }

    #[tokio::test]
    async fn test_undo_decrements_with_zero_floor() {
        let (goals, linkage) = setup();
        let h = habit();
        goals
            .insert_local(completion_goal(Some(&h), 10.0))
            .await
            .unwrap();

        linkage.on_habit_toggled(USER, &h, true).await.unwrap();
        linkage.on_habit_toggled(USER, &h, false).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 0.0);

        // second undo in a row is a no-op at the floor
        linkage.on_habit_toggled(USER, &h, false).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 0.0);
    }

    #[tokio::test]
    async fn test_completed_counter_goal_stops_moving() {
        let (goals, linkage) = setup();
        let h = habit();
        let mut goal = completion_goal(Some(&h), 2.0);
        goal.current_value = 2.0;
        goals.insert_local(goal).await.unwrap();

        linkage.on_habit_toggled(USER, &h, true).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 2.0);
    }

    #[tokio::test]
    async fn test_undo_reverses_the_completing_increment() {
        let (goals, linkage) = setup();
        let h = habit();
        goals
            .insert_local(completion_goal(Some(&h), 1.0))
            .await
            .unwrap();

        linkage.on_habit_toggled(USER, &h, true).await.unwrap();
        assert!(goals.view().await[0].is_completed());

        // The goal sits exactly at its target; the undo still applies
        linkage.on_habit_toggled(USER, &h, false).await.unwrap();
        let goal = &goals.view().await[0];
        assert_eq!(goal.current_value, 0.0);
        assert!(!goal.is_completed());
    }

    #[tokio::test]
    async fn test_streak_goal_is_derived_not_counted() {
        let (goals, linkage) = setup();
        let mut h = habit();
        h.completions.insert(day(2026, 8, 28));
        h.completions.insert(day(2026, 8, 29));

        let mut goal = Goal::new(
            USER,
            "Two week streak",
            GoalType::Streak,
            14.0,
            GoalTimeframe::Monthly,
            day(2026, 8, 1),
        );
        goal.linked_habit_id = Some(h.id.clone());
        // A stale value from past events is overwritten, not incremented
        goal.current_value = 9.0;
        goals.insert_local(goal).await.unwrap();

        linkage.on_habit_toggled(USER, &h, true).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 2.0);
    }

    #[tokio::test]
    async fn test_streak_goal_recomputes_even_when_completed() {
        let (goals, linkage) = setup();
        let mut h = habit();
        h.completions.insert(day(2026, 8, 28));
        h.completions.insert(day(2026, 8, 29));

        let mut goal = Goal::new(
            USER,
            "Two day streak",
            GoalType::Streak,
            2.0,
            GoalTimeframe::Monthly,
            day(2026, 8, 1),
        );
        goal.linked_habit_id = Some(h.id.clone());
        goal.current_value = 2.0;
        goals.insert_local(goal).await.unwrap();

        // Undo today's completion: yesterday alone sustains a streak of 1
        h.completions.remove(&day(2026, 8, 29));
        linkage.on_habit_toggled(USER, &h, false).await.unwrap();
        let goal = &goals.view().await[0];
        assert_eq!(goal.current_value, 1.0);
        assert!(!goal.is_completed());
    }

    #[tokio::test]
    async fn test_workout_drives_count_and_accumulator_goals() {
        let (goals, linkage) = setup();
        let count = Goal::new(
            USER,
            "Ten workouts",
            GoalType::WorkoutCount,
            10.0,
            GoalTimeframe::Monthly,
            day(2026, 8, 1),
        );
        let distance = Goal::new(
            USER,
            "100 km",
            GoalType::Distance,
            100.0,
            GoalTimeframe::Monthly,
            day(2026, 8, 1),
        );
        let duration = Goal::new(
            USER,
            "Ten hours",
            GoalType::Duration,
            36_000.0,
            GoalTimeframe::Monthly,
            day(2026, 8, 1),
        );
        goals.insert_local(count).await.unwrap();
        goals.insert_local(distance).await.unwrap();
        goals.insert_local(duration).await.unwrap();

        let mut workout = Workout::new(
            "Morning run",
            WorkoutType::Running,
            1800,
            300.0,
            "2026-08-29T07:00:00Z".parse().unwrap(),
        );
        workout.distance_km = Some(5.5);
        linkage.on_workout_added(USER, &workout).await.unwrap();

        let view = goals.view().await;
        let by_type = |t: GoalType| view.iter().find(|g| g.goal_type == t).unwrap();
        assert_eq!(by_type(GoalType::Distance).current_value, 5.5);
        assert_eq!(by_type(GoalType::Duration).current_value, 1800.0);
        assert_eq!(by_type(GoalType::WorkoutCount).current_value, 1.0);
    }

    #[tokio::test]
    async fn test_workout_without_distance_skips_distance_goals() {
        let (goals, linkage) = setup();
        let distance = Goal::new(
            USER,
            "100 km",
            GoalType::Distance,
            100.0,
            GoalTimeframe::Monthly,
            day(2026, 8, 1),
        );
        goals.insert_local(distance).await.unwrap();

        let workout = Workout::new(
            "Lifting",
            WorkoutType::Strength,
            2400,
            250.0,
            "2026-08-29T18:00:00Z".parse().unwrap(),
        );
        linkage.on_workout_added(USER, &workout).await.unwrap();
        assert_eq!(goals.view().await[0].current_value, 0.0);
    }

    #[tokio::test]
    async fn test_reconciled_habit_edit_replays_toggles() {
        let (goals, linkage) = setup();
        let mut before = habit();
        before.completions.insert(day(2026, 8, 27));
        goals
            .insert_local(completion_goal(Some(&before), 10.0))
            .await
            .unwrap();

        // Remote overwrite adds two days and removes one
        let mut after = before.clone();
        after.completions.remove(&day(2026, 8, 27));
        after.completions.insert(day(2026, 8, 28));
        after.completions.insert(day(2026, 8, 29));

        let change = Change::Updated {
            before: before.clone(),
            after: after.clone(),
        };
        linkage.on_habit_reconciled(USER, &change).await.unwrap();

        // +2 for added days, -1 for the removed day
        assert_eq!(goals.view().await[0].current_value, 1.0);
    }

    #[tokio::test]
    async fn test_reconciled_habit_insert_is_not_a_toggle() {
        let (goals, linkage) = setup();
        let mut h = habit();
        h.completions.insert(day(2026, 8, 29));
        goals
            .insert_local(completion_goal(Some(&h), 10.0))
            .await
            .unwrap();

        linkage
            .on_habit_reconciled(USER, &Change::Added(h))
            .await
            .unwrap();
        assert_eq!(goals.view().await[0].current_value, 0.0);
    }
}
