//! Human-friendly duration strings: `1h`, `10s`, `1h30m`, `1.5s`, `2d`.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::{Error, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        "h" => 3_600 * NANOS_PER_SEC,
        "d" => 86_400 * NANOS_PER_SEC,
        _ => return None,
    })
}

/// Parse a duration made of one or more `<number><unit>` terms.
///
/// Units are `ns`, `us`, `ms`, `s`, `m`, `h` and `d`; numbers may carry a
/// fraction. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    let invalid = |reason: &str| Error::Config(format!("invalid duration {:?}: {}", input, reason));

    if s.is_empty() {
        return Err(invalid("empty"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| invalid("missing unit"))?;
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        if number.is_empty() || number == "." {
            return Err(invalid("expected a number"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| invalid(&format!("unknown unit {:?}", unit)))?;

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("bad number"))?
        };
        let mut value = whole
            .checked_mul(scale)
            .ok_or_else(|| invalid("overflow"))?;

        if !frac.is_empty() {
            let frac = &frac[..frac.len().min(18)];
            let digits: u128 = frac.parse().map_err(|_| invalid("bad number"))?;
            value += digits * scale / 10u128.pow(frac.len() as u32);
        }

        total = total.checked_add(value).ok_or_else(|| invalid("overflow"))?;
        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid("overflow"))?;
    Ok(Duration::from_nanos(nanos))
}

/// Serde adapter for duration strings.
pub(crate) fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Serde adapter for optional duration strings.
pub(crate) fn deserialize_opt<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_duration(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
