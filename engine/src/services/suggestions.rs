//! Suggested goals derived from a habit's cadence.

use chrono::NaiveDate;
use stride_shared::{Goal, GoalTimeframe, GoalType, Habit};

/// Build a monthly completion goal sized to the habit's cadence.
///
/// The target is four weeks' worth of scheduled days, so a daily habit
/// suggests 28 completions and a weekday habit 20. The returned goal is
/// not persisted; the caller decides whether to keep it.
pub fn suggest_goal_for(user_id: &str, habit: &Habit, today: NaiveDate) -> Goal {
    let per_week = habit.frequency.target_per_week(habit.target_days_per_week);
    let mut goal = Goal::new(
        user_id,
        format!("{} this month", habit.name),
        GoalType::HabitCompletions,
        f64::from(per_week) * 4.0,
        GoalTimeframe::Monthly,
        today,
    );
    goal.linked_habit_id = Some(habit.id.clone());
    goal
}
