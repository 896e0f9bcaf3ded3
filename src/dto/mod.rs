use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Health check payloads.
pub mod health;
/// Question generation payloads.
pub mod question;
/// Quiz result and leaderboard payloads.
pub mod result;
/// Game session payloads.
pub mod session;
/// Realtime chat frames.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Parse an RFC 3339 timestamp supplied by a client.
pub fn parse_timestamp(value: &str) -> Option<SystemTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .ok()
        .map(SystemTime::from)
}
