//! Configuration utility functions
//!
//! Helpers for reading `INTERCUT_*` overrides from the environment. Values
//! that fail to parse fall back to the default.

/// Get a string value from an environment variable or use the default
pub fn get_env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

/// Get a boolean value from an environment variable or use the default
pub fn get_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => val.eq_ignore_ascii_case("true") || val == "1",
        Err(_) => default,
    }
}

/// Get a u8 value from an environment variable or use the default
pub fn get_env_u8(key: &str, default: u8) -> u8 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}
