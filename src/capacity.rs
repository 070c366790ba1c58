//! Parsing of human-entered capacity strings such as `"100MB"` or `"5000"`.
//!
//! Capacities are best effort: anything that can't be understood resolves to 0, which callers treat as "unset".

const KIB: u64 = 1024;

/// Scale factor for a (lowercased) unit token, using binary multiples.
fn unit_scale(unit: &str) -> Option<u64> {
    match unit {
        "" | "b" => Some(1),
        "k" | "kb" => Some(KIB),
        "m" | "mb" => Some(KIB.pow(2)),
        "g" | "gb" => Some(KIB.pow(3)),
        "t" | "tb" => Some(KIB.pow(4)),
        _ => None,
    }
}

/// Resolves a size or count string into a number.
///
/// `None`, blank strings, unknown units, negative or overflowing values and malformed prefixes all resolve to 0.
pub fn resolve_capacity(input: Option<&str>) -> u64 {
    let Some(trimmed) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return 0;
    };

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let Some(scale) = unit_scale(unit.trim().to_ascii_lowercase().as_str()) else {
        return 0;
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(scale).unwrap_or(0);
    }

    // Fractional prefixes only make sense with a unit, e.g. "1.5GB".
    match number.parse::<f64>() {
        Ok(fraction) if scale > 1 && fraction.is_finite() => {
            let scaled = (fraction * scale as f64).trunc();
            if scaled >= 0.0 && scaled < u64::MAX as f64 {
                scaled as u64
            } else {
                0
            }
        }
        _ => 0,
    }
}
