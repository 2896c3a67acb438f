//! Per-term formulas shared by live scoring and timeline replay. Each term is
//! rounded on its own; totals are plain integer sums.

/// `round(5 + 5·√count)`, or 0 without active recommendations.
pub fn recommendation_points(count: u32) -> i64 {
    if count == 0 {
        return 0;
    }
    (5.0 + 5.0 * f64::from(count).sqrt()).round() as i64
}

/// Largest magnitude a single rank boost may reach. Keeps sums of boosts over
/// long replays far from `i64` overflow.
pub const RANK_BOOST_CEILING: i64 = 1 << 40;

/// `round(base · 2^(days/7))`: doubles for every week without duty, capped at
/// [`RANK_BOOST_CEILING`].
pub fn rank_boost(base: i64, days_since_duty: i64) -> i64 {
    let multiplier = 2f64.powf(days_since_duty as f64 / 7.0);
    let ceiling = RANK_BOOST_CEILING as f64;
    (base as f64 * multiplier).round().clamp(-ceiling, ceiling) as i64
}

/// Linear penalty that reaches zero at the window boundary. Returned as a
/// non-negative amount to subtract.
pub fn recency_penalty(window_days: i64, days_since_duty: i64) -> i64 {
    (window_days - days_since_duty).max(0)
}

/// Flat penalty once the member's duty count is above the group average.
pub fn above_average_penalty(penalty: i64, duty_count: u32, group_average: f64) -> i64 {
    if f64::from(duty_count) > group_average {
        penalty
    } else {
        0
    }
}

/// First-time boost applies only to members who never served and already
/// have positive merit.
pub fn first_time_boost(boost: i64, duty_count: u32, merit_so_far: i64) -> i64 {
    if duty_count == 0 && merit_so_far > 0 {
        boost
    } else {
        0
    }
}
