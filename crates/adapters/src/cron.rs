// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timezone-aware cron next-fire computation for `schedule` nodes.
//!
//! The source this system is modeled on has a known defect here: its
//! "next fire" computation always returns "next hour" regardless of
//! the configured cron expression. This is called out in the
//! specification as a correctness requirement, not a detail to
//! preserve — a real 5/6-field cron parser honoring the configured
//! timezone is required.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidExpression { expr: String, message: String },
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("cron expression '{0}' has no upcoming fire time")]
    NoUpcomingFire(String),
}

/// Compute the next time `expr` fires strictly after `after`, in the
/// named IANA timezone (defaulting to UTC when `timezone` is `None`).
pub fn next_fire_after(expr: &str, timezone: Option<&str>, after: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    let cron = Cron::new(expr).parse().map_err(|e| CronError::InvalidExpression {
        expr: expr.to_string(),
        message: e.to_string(),
    })?;

    let tz: Tz = match timezone {
        Some(name) => name.parse().map_err(|_| CronError::UnknownTimezone(name.to_string()))?,
        None => Tz::UTC,
    };

    let after_in_tz = after.with_timezone(&tz);
    let next = cron
        .find_next_occurrence(&after_in_tz, false)
        .map_err(|_| CronError::NoUpcomingFire(expr.to_string()))?;
    Ok(next.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
