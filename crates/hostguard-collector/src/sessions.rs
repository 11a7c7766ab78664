//! Parsing of session-listing replies.
//!
//! The listing is tabular text meant for humans, produced by a
//! locale-configured remote host, so nothing about it is stable: the header
//! language varies, the session-name column may be blank, and a flaky
//! transport can garble individual lines. Parsing is therefore total — a
//! malformed line is logged and skipped, never an error for the batch.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One interactive session on a remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Host the session lives on.
    pub host: String,
    /// Session identifier as printed by the listing.
    pub session_id: String,
    /// Logged-in account name.
    pub username: String,
    /// Session name column; empty for disconnected sessions.
    pub session_name: String,
    /// Raw state column (`Active`, `Disc`, locale variants).
    pub state: String,
    /// Raw idle-time column (`.`, `59`, `1+02:30`).
    pub idle: String,
    /// Logon time, when the tail of the line parsed as `D/M/YYYY H:MM`.
    pub logon_time: Option<NaiveDateTime>,
    /// True when the state column reads as an active session.
    pub is_active: bool,
}

/// Parses a session listing into records, skipping anything it cannot read.
///
/// Layout detection: a numeric second column means the session-name column
/// is blank (disconnected session) and everything shifts left by one.
pub fn parse_session_listing(host: &str, output: &str) -> Vec<SessionRecord> {
    let mut sessions = Vec::new();

    for raw_line in output.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_header(line) {
            continue;
        }

        // The current session is marked with a leading '>'.
        let line = line.trim_start_matches('>').trim();
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            tracing::warn!(host, line = raw_line, "skipping malformed session line");
            continue;
        }

        let username = parts[0];
        let (session_name, session_id, state, idle, tail) =
            if parts[1].parse::<u32>().is_ok() {
                ("", parts[1], parts[2], parts[3], &parts[4..])
            } else {
                (parts[1], parts[2], parts[3], parts[4], &parts[5..])
            };

        sessions.push(SessionRecord {
            host: host.to_string(),
            session_id: session_id.to_string(),
            username: username.to_string(),
            session_name: session_name.to_string(),
            state: state.to_string(),
            idle: idle.to_string(),
            logon_time: parse_logon_time(tail),
            is_active: is_active_state(state),
        });
    }

    sessions
}

/// Header lines in the locales the fleet runs.
fn is_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("username") || lower.contains("utilisateur")
}

fn is_active_state(state: &str) -> bool {
    state.eq_ignore_ascii_case("active") || state.eq_ignore_ascii_case("actif")
}

/// Finds a `D/M/YYYY H:MM` pair in the line tail.
///
/// An unparsable or absent date yields `None` without affecting the rest of
/// the record.
fn parse_logon_time(tail: &[&str]) -> Option<NaiveDateTime> {
    for window in tail.windows(2) {
        let (date, time) = (window[0], window[1]);
        if !date.contains('/') || !time.contains(':') {
            continue;
        }
        if let Ok(parsed) =
            NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%-d/%-m/%Y %-H:%M")
        {
            return Some(parsed);
        }
    }
    None
}
