use std::collections::HashMap;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use teloxide::prelude::*;

static RATE_LIMITS: Lazy<Mutex<HashMap<i64, Instant>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn check_rate_limit(
    limits: &mut HashMap<i64, Instant>,
    user_id: i64,
    window: Duration,
    now: Instant,
) -> bool {
    if let Some(last) = limits.get(&user_id) {
        if now.duration_since(*last) < window {
            return true;
        }
    }

    limits.insert(user_id, now);
    false
}

/// Records the attempt unless the user is still inside `window`.
pub fn is_rate_limited(user_id: i64, window: Duration) -> bool {
    if window.is_zero() {
        return false;
    }
    check_rate_limit(&mut RATE_LIMITS.lock(), user_id, window, Instant::now())
}

pub fn message_user_id(message: &Message) -> i64 {
    message
        .from
        .as_ref()
        .and_then(|user| i64::try_from(user.id.0).ok())
        .unwrap_or_default()
}
