// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for Go-style duration strings.
//!
//! `LDAPServer` timeouts and probe intervals are written the way Kubernetes users
//! write them elsewhere ("30s", "5m", "1h30m") and are parsed into
//! `std::time::Duration` here.

use anyhow::{bail, Context, Result};
use std::time::Duration;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

/// Smallest accepted duration (1 second)
const MIN_DURATION_SECS: u64 = 1;

/// Largest accepted duration (24 hours)
const MAX_DURATION_SECS: u64 = 86_400;

/// Parse a Go-style duration string into a Rust `Duration`.
///
/// Supported units:
/// - `s` (seconds): "30s"
/// - `m` (minutes): "5m"
/// - `h` (hours): "1h"
///
/// Units can be combined from largest to smallest, e.g. "1h30m" or "2m15s".
///
/// # Examples
///
/// ```
/// use ldapy::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
///
/// assert!(parse_duration("").is_err());
/// assert!(parse_duration("10").is_err());  // Missing unit
/// assert!(parse_duration("10d").is_err()); // Unsupported unit
/// ```
///
/// # Errors
///
/// Returns an error if:
/// - The format is invalid (missing unit, non-numeric value, units out of order)
/// - The duration is below 1s or above 24h
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();
    if trimmed.is_empty() {
        bail!("Duration string cannot be empty");
    }

    let mut rest = trimmed;
    let mut seconds: u64 = 0;
    let mut last_unit_rank = u8::MAX;

    while !rest.is_empty() {
        let split_pos = rest
            .chars()
            .position(|c| !c.is_ascii_digit())
            .context("Duration must end with a unit (s, m, or h)")?;
        if split_pos == 0 {
            bail!("Duration '{duration_str}' has a unit without a value");
        }

        let (value_str, tail) = rest.split_at(split_pos);
        let value: u64 = value_str
            .parse()
            .context("Duration value must be a positive integer")?;

        let unit_len = tail
            .chars()
            .position(|c| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, remaining) = tail.split_at(unit_len);

        let (multiplier, rank) = match unit {
            "h" => (SECONDS_PER_HOUR, 2),
            "m" => (SECONDS_PER_MINUTE, 1),
            "s" => (1, 0),
            _ => bail!(
                "Unsupported duration unit '{unit}'. Use 's' (seconds), 'm' (minutes), or 'h' (hours)"
            ),
        };

        if rank >= last_unit_rank {
            bail!("Duration '{duration_str}' must list units from largest to smallest, each once");
        }
        last_unit_rank = rank;

        let part = value
            .checked_mul(multiplier)
            .context("Duration value too large (overflow)")?;
        seconds = seconds
            .checked_add(part)
            .context("Duration value too large (overflow)")?;

        rest = remaining;
    }

    if seconds < MIN_DURATION_SECS {
        bail!("Duration '{duration_str}' is below minimum of {MIN_DURATION_SECS}s");
    }

    if seconds > MAX_DURATION_SECS {
        bail!("Duration '{duration_str}' exceeds maximum of 24h");
    }

    Ok(Duration::from_secs(seconds))
}

/// Parse an optional duration field, falling back to `default_secs` when unset.
///
/// # Errors
///
/// Returns an error if the field is set but cannot be parsed.
pub fn parse_duration_or(value: Option<&str>, default_secs: u64) -> Result<Duration> {
    match value {
        Some(s) => parse_duration(s),
        None => Ok(Duration::from_secs(default_secs)),
    }
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
