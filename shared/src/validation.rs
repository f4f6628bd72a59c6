//! Input validation functions
//!
//! Validation runs before any store interaction; a rejected input never
//! reaches the local store or the remote collection.

/// Validate a user-visible name (habit, workout, or goal title)
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if trimmed.len() > 200 {
        return Err("Name too long".to_string());
    }
    Ok(())
}

/// Validate a custom frequency weekly target (1-7 days)
pub fn validate_target_days(days: u8) -> Result<(), String> {
    if !(1..=7).contains(&days) {
        return Err("Target days per week must be between 1 and 7".to_string());
    }
    Ok(())
}

/// Validate a goal target value
pub fn validate_goal_target(target: f64) -> Result<(), String> {
    if target.is_nan() || target.is_infinite() {
        return Err("Goal target must be a valid number".to_string());
    }
    if target <= 0.0 {
        return Err("Goal target must be positive".to_string());
    }
    Ok(())
}

/// Validate a workout duration in seconds (at most 24 hours)
pub fn validate_duration_secs(duration_secs: u32) -> Result<(), String> {
    if duration_secs == 0 {
        return Err("Duration must be positive".to_string());
    }
    if duration_secs > 24 * 60 * 60 {
        return Err("Duration unreasonably long".to_string());
    }
    Ok(())
}

/// Validate a calorie value
pub fn validate_calories(calories: f64) -> Result<(), String> {
    if calories.is_nan() || calories.is_infinite() {
        return Err("Calories must be a valid number".to_string());
    }
    if calories < 0.0 {
        return Err("Calories cannot be negative".to_string());
    }
    if calories > 50000.0 {
        return Err("Calorie value unreasonably high".to_string());
    }
    Ok(())
}

/// Validate an optional workout distance in kilometers
pub fn validate_distance_km(distance_km: f64) -> Result<(), String> {
    if distance_km.is_nan() || distance_km.is_infinite() {
        return Err("Distance must be a valid number".to_string());
    }
    if distance_km < 0.0 {
        return Err("Distance cannot be negative".to_string());
    }
    if distance_km > 1000.0 {
        return Err("Distance unreasonably long".to_string());
    }
    Ok(())
}
