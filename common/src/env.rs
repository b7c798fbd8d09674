//! Environment variable helpers.
//!
//! Everything that needs a credential goes through [`get_env_var`] so a
//! missing value turns into an [`AgentError::MissingConfig`] for the one
//! operation that needed it instead of a panic at start-up.

use std::env;
use std::path::Path;

use crate::error::{AgentError, Result};

/// Load variables from `.env` in the working directory.
///
/// Returns `false` when there is no `.env` file; variables already present
/// in the process environment are never overwritten.
pub fn load_environment() -> bool {
    load_environment_from(Path::new(".env"))
}

pub fn load_environment_from(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    dotenv::from_path(path).is_ok()
}

/// Check that every variable in `required` is set and non-empty.
pub fn verify_environment(required: &[&str]) -> Result<()> {
    for var in required {
        get_env_var(var)?;
    }
    Ok(())
}

pub fn get_env_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AgentError::MissingConfig(format!(
            "Environment variable {} not set",
            name
        ))),
    }
}

pub fn get_env_var_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_variable_is_a_config_error() {
        let err = get_env_var("COMMON_ENV_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, AgentError::MissingConfig(_)));
        assert!(err.to_string().contains("COMMON_ENV_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn verify_reports_first_missing_variable() {
        env::set_var("COMMON_ENV_TEST_PRESENT", "yes");
        let err = verify_environment(&["COMMON_ENV_TEST_PRESENT", "COMMON_ENV_TEST_ABSENT"])
            .unwrap_err();
        assert!(err.to_string().contains("COMMON_ENV_TEST_ABSENT"));
        assert!(verify_environment(&["COMMON_ENV_TEST_PRESENT"]).is_ok());
    }

    #[test]
    fn blank_values_count_as_missing() {
        env::set_var("COMMON_ENV_TEST_BLANK", "   ");
        assert!(get_env_var("COMMON_ENV_TEST_BLANK").is_err());
        assert!(get_env_var_opt("COMMON_ENV_TEST_BLANK").is_none());
    }

    #[test]
    fn loads_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "COMMON_ENV_TEST_FROM_FILE=loaded").unwrap();

        assert!(load_environment_from(&path));
        assert_eq!(get_env_var("COMMON_ENV_TEST_FROM_FILE").unwrap(), "loaded");
        assert!(!load_environment_from(&dir.path().join("missing.env")));
    }
}
