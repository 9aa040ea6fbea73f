use chrono::{DateTime, Duration, Utc};

/// Default session TTL: 24h after last activity.
pub const SESSION_TTL: Duration = Duration::hours(24);

pub fn expires_at_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now + ttl
}

pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}
