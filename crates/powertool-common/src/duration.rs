//! Parsing of Go-style duration strings (`30s`, `5m`, `1h30m`, `1.5s`)
//!
//! Job resources carry their profiling window in the format users already
//! write for other Kubernetes tooling. Negative values are rejected.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Errors returned by [`parse_duration`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    /// The input was empty
    #[error("empty duration")]
    Empty,

    /// A numeric component could not be parsed
    #[error("invalid duration {0:?}")]
    Invalid(String),

    /// A number had no unit suffix
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// The unit suffix is not one of ns, us, ms, s, m, h
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// The unrecognized unit
        unit: String,
        /// The full input
        input: String,
    },

    /// The value was negative
    #[error("negative duration {0:?}")]
    Negative(String),

    /// The value does not fit in a `Duration`
    #[error("duration {0:?} overflows")]
    Overflow(String),
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a duration string such as `"300ms"`, `"2h45m"` or `"1.5s"`.
///
/// A bare `"0"` is accepted. Every other component needs a unit.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, body) = match input.as_bytes()[0] {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    if body == "0" {
        return Ok(Duration::ZERO);
    }
    if body.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut total: u128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_end);
        if number.is_empty() || number == "." {
            return Err(DurationError::Invalid(input.to_string()));
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        total = total
            .checked_add(component_nanos(number, scale, input)?)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
        rest = tail;
    }

    if negative && total > 0 {
        return Err(DurationError::Negative(input.to_string()));
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| DurationError::Overflow(input.to_string()))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

fn component_nanos(number: &str, scale: u128, input: &str) -> Result<u128, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let overflow = || DurationError::Overflow(input.to_string());

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if frac.contains('.') {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

    // Digits past nanosecond precision cannot contribute.
    let frac = &frac[..frac.len().min(18)];
    if !frac.is_empty() {
        let digits: u128 = frac.parse().map_err(|_| invalid())?;
        let divisor = 10u128.pow(frac.len() as u32);
        nanos = nanos
            .checked_add(digits * scale / divisor)
            .ok_or_else(overflow)?;
    }
    Ok(nanos)
}
