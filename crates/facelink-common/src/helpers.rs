//! Small helpers shared by the binaries.

/// Reads a boolean toggle from the environment.
///
/// Accepts `1`, `true`, `yes` and `on` (case-insensitive); any other value is
/// `false`. Returns `default` when the variable is unset.
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_bool(&value),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
