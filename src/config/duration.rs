// src/config/duration.rs

use std::time::Duration;

const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Parse a human-readable duration such as `"500ms"`, `"2s"`, `"1m30s"` or
/// `"1.5s"`.
///
/// Supported units are `ms`, `s`, `m` and `h`. A bare `"0"` is accepted as
/// zero; any other number needs a unit.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: u64 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;
        if num_len == 0 {
            return Err(format!("expected a number at '{rest}' in duration '{s}'"));
        }

        let (num_part, tail) = rest.split_at(num_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit_part, next) = tail.split_at(unit_len);

        let unit_nanos = match unit_part.trim().to_lowercase().as_str() {
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 60 * 60 * NANOS_PER_SEC,
            other => {
                return Err(format!(
                    "unsupported duration unit '{other}'; expected ms, s, m, or h"
                ));
            }
        };

        let nanos = if num_part.contains('.') {
            let value: f64 = num_part
                .parse()
                .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
            (value * unit_nanos as f64).round() as u64
        } else {
            let value: u64 = num_part
                .parse()
                .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
            value
                .checked_mul(unit_nanos)
                .ok_or_else(|| format!("duration '{s}' overflows"))?
        };

        total_nanos = total_nanos
            .checked_add(nanos)
            .ok_or_else(|| format!("duration '{s}' overflows"))?;
        rest = next;
    }

    Ok(Duration::from_nanos(total_nanos))
}
