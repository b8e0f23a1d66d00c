/// Tokens awarded by one daily check-in.
pub const DAILY_REWARD_AMOUNT: f64 = 10.0;

/// Minimum gap between two check-ins (24 hours).
pub const CHECK_IN_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;

/// Whether a check-in at `now` is allowed.
///
/// Strictly greater-than: exactly `cooldown_ms` after the last check-in is
/// still inside the cooldown.
pub fn can_check_in(last_check_in: Option<i64>, now: i64, cooldown_ms: i64) -> bool {
    match last_check_in {
        None => true,
        Some(last) => now.saturating_sub(last) > cooldown_ms,
    }
}

/// Earliest millisecond at which the next check-in becomes eligible.
pub fn next_check_in_at(last_check_in: Option<i64>, cooldown_ms: i64) -> Option<i64> {
    last_check_in.map(|last| last.saturating_add(cooldown_ms).saturating_add(1))
}

/// Milliseconds left before check-in opens again, zero when eligible.
pub fn remaining_cooldown(last_check_in: Option<i64>, now: i64, cooldown_ms: i64) -> i64 {
    next_check_in_at(last_check_in, cooldown_ms)
        .map(|at| (at - now).max(0))
        .unwrap_or(0)
}
