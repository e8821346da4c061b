//! Difficulty calculation for hex suffix patterns

/// Expected number of salts to try before hitting a suffix of `suffix_len`
/// hex digits. Address nibbles are uniform, so this is `16^len`.
pub fn calculate_difficulty(suffix_len: usize) -> f64 {
    16f64.powi(suffix_len as i32)
}

/// Format difficulty as human-readable string
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.0}", difficulty)
    }
}

/// Estimate time to 50% probability of finding a match
pub fn estimate_time_50pct(difficulty: f64, salts_per_second: f64) -> f64 {
    // For large difficulty, ln(0.5) / ln(1 - 1/difficulty) ~ difficulty * ln(2)
    if salts_per_second <= 0.0 {
        return f64::INFINITY;
    }
    (difficulty * std::f64::consts::LN_2) / salts_per_second
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() {
        "never".to_string()
    } else if seconds <= 0.0 {
        "now".to_string()
    } else if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else if seconds < 86400.0 {
        format!("{:.1}h", seconds / 3600.0)
    } else if seconds < 86400.0 * 365.0 {
        format!("{:.1}d", seconds / 86400.0)
    } else {
        format!("{:.1}y", seconds / (86400.0 * 365.0))
    }
}
