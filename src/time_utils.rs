// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timestamp formatting and elapsed-time helpers.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Instant;

/// RFC 3339 with millisecond precision and a `Z` suffix.
///
/// Store timestamps carry sub-second precision, so two updates within the
/// same second still render differently.
pub fn format_timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whole milliseconds since `started`, saturating.
pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
