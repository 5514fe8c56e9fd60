//! Extracts the scalar objective value from a job's log (spec.md §4.3).
//!
//! Finds the *last* occurrence of `result_pattern`, takes the
//! whitespace-delimited token immediately following it, and parses it as a
//! real. Returns `None` ("not found") if the pattern is absent, the
//! trailing token fails to parse, or the pattern occurs with no trailing
//! whitespace-terminated token at all (the Open Question in spec.md §9 is
//! resolved in favor of "not found" in that last case).

/// Parse the last occurrence of `result_pattern` in `log` into a real.
pub fn parse_result(log: &str, result_pattern: &str) -> Option<f64> {
    let pos = log.rfind(result_pattern)?;
    let after = &log[pos + result_pattern.len()..];
    let token = after.split_whitespace().next()?;
    token.parse::<f64>().ok()
}
