//! Environment variable utilities.
//!
//! A generic `env_get<T>` for parsing env vars with a default, plus a
//! boolean helper. Used by [`crate::config`] and [`crate::logging`].

use std::str::FromStr;

/// Get an environment variable parsed as `T`, or `default` if unset/unparsable.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get an environment variable as a boolean.
///
/// Accepts `"1"`, `"true"`, `"yes"`, `"on"` (case-insensitive) as true;
/// everything else (including unset) is false.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_default() {
        assert_eq!(env_get::<u32>("AIO_TEST_DOES_NOT_EXIST_XYZ", 7), 7);
    }

    #[test]
    fn bool_accepts_common_spellings() {
        std::env::set_var("AIO_TEST_BOOL", "yes");
        assert!(env_get_bool("AIO_TEST_BOOL", false));
        std::env::remove_var("AIO_TEST_BOOL");
        assert!(!env_get_bool("AIO_TEST_BOOL", false));
    }
}
