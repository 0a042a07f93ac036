//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use std::path::PathBuf;

/// Environment variable naming the JSON store file
pub const STORE_PATH_VAR: &str = "NESTSCHEMA_STORE_PATH";

/// Environment variable toggling the unchanged-save skip
pub const SKIP_UNCHANGED_VAR: &str = "NESTSCHEMA_SKIP_UNCHANGED";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the JSON file holding the solutions
    /// Example: ./data/solutions.json
    pub store_path: Option<PathBuf>,

    /// Skip saves whose change fingerprint matches the last saved one
    /// Defaults to true
    pub skip_unchanged_saves: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Self {
        Self {
            store_path: std::env::var(STORE_PATH_VAR)
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            skip_unchanged_saves: parse_flag(
                std::env::var(SKIP_UNCHANGED_VAR).ok().as_deref(),
                true,
            ),
        }
    }

    /// Check if a store file is configured
    pub fn has_store_path(&self) -> bool {
        self.store_path.is_some()
    }

    /// Command-line value first, then the configured one
    pub fn resolve_store_path(&self, cli_value: Option<PathBuf>) -> Option<PathBuf> {
        cli_value.or_else(|| self.store_path.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Reads a boolean flag; unset or unrecognised values fall back to `default`
pub fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Config Struct Tests (no env var dependencies - thread safe)
    // ========================================================================

    #[test]
    fn test_config_with_store_path() {
        let config = Config {
            store_path: Some(PathBuf::from("/tmp/solutions.json")),
            skip_unchanged_saves: true,
        };

        assert!(config.has_store_path());
        assert_eq!(
            config.store_path,
            Some(PathBuf::from("/tmp/solutions.json"))
        );
    }

    #[test]
    fn test_config_without_store_path() {
        let config = Config {
            store_path: None,
            skip_unchanged_saves: false,
        };

        assert!(!config.has_store_path());
        assert!(!config.skip_unchanged_saves);
    }

    #[test]
    fn test_resolve_store_path_prefers_cli() {
        let config = Config {
            store_path: Some(PathBuf::from("env.json")),
            skip_unchanged_saves: true,
        };

        assert_eq!(
            config.resolve_store_path(Some(PathBuf::from("cli.json"))),
            Some(PathBuf::from("cli.json"))
        );
        assert_eq!(
            config.resolve_store_path(None),
            Some(PathBuf::from("env.json"))
        );
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(None, false));
        assert!(parse_flag(Some("TRUE"), false));
        assert!(parse_flag(Some(" yes "), false));
        assert!(!parse_flag(Some("0"), true));
        assert!(!parse_flag(Some("off"), true));
        assert!(parse_flag(Some("maybe"), true));
    }

    #[test]
    fn test_config_from_env_never_keeps_blank_path() {
        // Actual values depend on environment; only invariants are checked
        let config = Config::from_env();
        assert_eq!(config.has_store_path(), config.store_path.is_some());
        if let Some(path) = &config.store_path {
            assert!(!path.as_os_str().to_string_lossy().trim().is_empty());
        }
        assert_eq!(
            config.resolve_store_path(Some(PathBuf::from("cli.json"))),
            Some(PathBuf::from("cli.json"))
        );
    }

    #[test]
    fn test_config_debug() {
        let config = Config {
            store_path: Some(PathBuf::from("data.json")),
            skip_unchanged_saves: true,
        };

        let debug_str = format!("{:?}", config);

        assert!(debug_str.contains("Config"));
        assert!(debug_str.contains("store_path"));
        assert!(debug_str.contains("data.json"));
    }
}
