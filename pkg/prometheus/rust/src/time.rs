// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Time and step parsing for tool arguments.
//!
//! Times are accepted either as RFC 3339 timestamps or as signed Unix epoch
//! milliseconds. Steps use the Go duration grammar understood by Prometheus
//! users (`15s`, `1m`, `1h30m`, `1.5s`).

use std::time::Duration;

use chrono::{DateTime, Utc};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0},
    combinator::{opt, value},
    sequence::preceded,
};

use crate::error::ToolError;

const NANOS_PER_MILLI: i64 = 1_000_000;
const MILLIS_PER_SECOND: i64 = 1_000;

/// Fraction digits beyond this are below nanosecond resolution for every unit.
const MAX_FRACTION_DIGITS: usize = 19;

/// Resolves a caller-supplied time to a UTC instant.
///
/// RFC 3339 wins whenever the input satisfies it; otherwise the whole string
/// must be a base-10 integer of milliseconds since the Unix epoch.
pub fn resolve(raw: &str) -> Result<DateTime<Utc>, ToolError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    raw.parse::<i64>()
        .ok()
        .and_then(from_epoch_millis)
        .ok_or_else(|| ToolError::InvalidTimeFormat(raw.to_string()))
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    let secs = millis.div_euclid(MILLIS_PER_SECOND);
    let nanos = u32::try_from(millis.rem_euclid(MILLIS_PER_SECOND) * NANOS_PER_MILLI).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

/// Parses a query step such as `15s`, `1m` or `1h30m`.
///
/// A bare `0` is the only unit-less value accepted. Zero steps are returned
/// as-is so the backend decides whether they are acceptable.
pub fn parse_step(raw: &str) -> Result<Duration, ToolError> {
    let invalid = |reason: String| ToolError::InvalidDuration {
        input: raw.to_string(),
        reason,
    };

    if raw.starts_with('-') {
        return Err(invalid("step must not be negative".into()));
    }
    let unsigned = raw.strip_prefix('+').unwrap_or(raw);
    if unsigned == "0" {
        return Ok(Duration::ZERO);
    }
    if unsigned.is_empty() {
        return Err(invalid("empty duration".into()));
    }

    let mut rest = unsigned;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (after_number, (whole, fraction)) =
            number(rest).map_err(|_| invalid(format!("expected a number at {rest:?}")))?;
        if whole.is_empty() && fraction.is_none_or(str::is_empty) {
            return Err(invalid(format!("expected a number at {rest:?}")));
        }

        let (after_unit, unit) = opt(unit_nanos)
            .parse(after_number)
            .map_err(|_| invalid(format!("expected a unit at {after_number:?}")))?;
        let Some(unit) = unit else {
            return Err(if after_number.is_empty() {
                invalid("missing unit (use one of ns, us, ms, s, m, h)".into())
            } else {
                invalid(format!("unknown unit at {after_number:?}"))
            });
        };

        let term = term_nanos(whole, fraction.unwrap_or(""), unit)
            .ok_or_else(|| invalid("duration overflows".into()))?;
        total = total
            .checked_add(term)
            .ok_or_else(|| invalid("duration overflows".into()))?;
        rest = after_unit;
    }

    // Same ceiling as Go's time.Duration.
    let nanos = u64::try_from(total)
        .ok()
        .filter(|n| i64::try_from(*n).is_ok())
        .ok_or_else(|| invalid("duration overflows".into()))?;
    Ok(Duration::from_nanos(nanos))
}

/// `<digits>[.<digits>]`, either side may be empty.
fn number(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    let (input, whole) = digit0(input)?;
    let (input, fraction) = opt(preceded(char('.'), digit0)).parse(input)?;
    Ok((input, (whole, fraction)))
}

/// Unit suffix, resolved to its length in nanoseconds. `ms` must be tried
/// before `m`.
fn unit_nanos(input: &str) -> IResult<&str, u128> {
    alt((
        value(1, tag("ns")),
        value(1_000, tag("us")),
        value(1_000, tag("µs")),
        value(1_000, tag("μs")),
        value(1_000_000, tag("ms")),
        value(1_000_000_000, tag("s")),
        value(60 * 1_000_000_000, tag("m")),
        value(3_600 * 1_000_000_000, tag("h")),
    ))
    .parse(input)
}

fn term_nanos(whole: &str, fraction: &str, unit: u128) -> Option<u128> {
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit)?;

    let fraction = fraction.get(..MAX_FRACTION_DIGITS).unwrap_or(fraction);
    if !fraction.is_empty() {
        let numerator: u128 = fraction.parse().ok()?;
        let exponent = u32::try_from(fraction.len()).ok()?;
        let scale = 10u128.checked_pow(exponent)?;
        nanos = nanos.checked_add(numerator.checked_mul(unit)? / scale)?;
    }
    Some(nanos)
}
