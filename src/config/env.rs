//! Environment-variable parsing helpers.
//!
//! All config overrides read variables through these so the truthy/falsey
//! parsing lives in one place. Lookups are injected so tests never touch
//! the real process environment.

/// Reads process environment variables.
pub(crate) fn process_env(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok()
}

/// `Some(true)` for `1`, `true`, `yes`, `on`; `Some(false)` for `0`, `false`,
/// `no`, `off` (case-insensitive, trimmed). Anything else is `None`.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Valid positive (> 0) integer, otherwise `None`.
pub(crate) fn parse_positive_u64(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|value| *value > 0)
}

/// Trimmed, lowercased, non-empty value.
pub(crate) fn normalize(raw: &str) -> Option<String> {
    let value = raw.trim().to_ascii_lowercase();
    (!value.is_empty()).then_some(value)
}
