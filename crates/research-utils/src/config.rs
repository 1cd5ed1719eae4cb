//! Environment configuration helpers

use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;

/// Load a `.env` file from the current directory or its parents
///
/// A missing file is not an error; returns the path that was loaded.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Loaded .env file");
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load .env file");
            None
        }
    }
}

/// Read a variable, treating unset and blank the same
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable
///
/// Unset or blank gives `Ok(None)`; a value that does not parse is an error
/// naming the variable.
pub fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_var(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid value '{raw}' for {key}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_blank_is_unset() {
        unsafe {
            std::env::set_var("RESEARCH_UTILS_TEST_BLANK", "   ");
        }
        assert_eq!(env_var("RESEARCH_UTILS_TEST_BLANK"), None);
        assert_eq!(env_var("RESEARCH_UTILS_TEST_NEVER_SET"), None);
    }

    #[test]
    fn test_env_parse() {
        unsafe {
            std::env::set_var("RESEARCH_UTILS_TEST_NUM", " 42 ");
            std::env::set_var("RESEARCH_UTILS_TEST_BAD", "forty-two");
        }
        assert_eq!(env_parse::<u64>("RESEARCH_UTILS_TEST_NUM").unwrap(), Some(42));
        assert_eq!(env_parse::<u64>("RESEARCH_UTILS_TEST_MISSING").unwrap(), None);

        let err = env_parse::<u64>("RESEARCH_UTILS_TEST_BAD").unwrap_err();
        assert!(err.to_string().contains("RESEARCH_UTILS_TEST_BAD"));
    }
}
