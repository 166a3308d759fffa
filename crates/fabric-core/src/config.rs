//! Typed, validated startup configuration (§4.8).
//!
//! Built once from CLI flags with no environment-variable overrides: the tool is
//! driven entirely by a supervisor passing explicit flags, and growing an
//! env-var surface alongside that would just be two configuration paths to keep
//! in sync.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Resolved, validated configuration for one process invocation.
#[derive(Debug, Clone)]
pub struct FabricConfig {
    /// Fabric radix; must be >= 2.
    pub n: u32,
    /// Path to the route-command file.
    pub routes_path: PathBuf,
    /// Where to write the final committed-state JSON, if requested.
    pub json_path: Option<PathBuf>,
    /// Path to a previous-state JSON snapshot, if provided.
    pub previous_state_path: Option<PathBuf>,
    /// Path to a locks JSON file, if provided.
    pub locks_path: Option<PathBuf>,
    /// Fail a commit outright if its stability cost is nonzero.
    pub strict_stability: bool,
    /// Advisory; accepted for caller compatibility, no semantic effect (§6).
    pub incremental: bool,
    /// Number of times `-v`/`--verbose` was given; raises the diagnostic log level.
    pub verbosity: u8,
}

impl FabricConfig {
    /// Validates `n`, that `routes_path` is at least present on disk, and that
    /// any optional JSON paths are both readable and well-formed JSON, before
    /// anything else touches the filesystem.
    pub fn validate(
        n: u32,
        routes_path: PathBuf,
        json_path: Option<PathBuf>,
        previous_state_path: Option<PathBuf>,
        locks_path: Option<PathBuf>,
        strict_stability: bool,
        incremental: bool,
        verbosity: u8,
    ) -> Result<Self, ConfigError> {
        if n < 2 {
            return Err(ConfigError::RadixTooSmall(n));
        }

        check_readable(&routes_path, |path, source| ConfigError::RoutesFileUnreadable {
            path,
            source,
        })?;
        if let Some(path) = &previous_state_path {
            check_json_well_formed(
                path,
                |path, source| ConfigError::PreviousStateUnreadable { path, source },
                |path, source| ConfigError::MalformedJson { path, source },
            )?;
        }
        if let Some(path) = &locks_path {
            check_json_well_formed(
                path,
                |path, source| ConfigError::LocksFileUnreadable { path, source },
                |path, source| ConfigError::MalformedJson { path, source },
            )?;
        }

        Ok(Self {
            n,
            routes_path,
            json_path,
            previous_state_path,
            locks_path,
            strict_stability,
            incremental,
            verbosity,
        })
    }

    /// `N^2`: the number of ports per side.
    #[must_use]
    pub fn max_ports(&self) -> u32 {
        self.n * self.n
    }
}

fn check_readable(
    path: &Path,
    to_error: impl FnOnce(String, std::io::Error) -> ConfigError,
) -> Result<(), ConfigError> {
    std::fs::metadata(path).map(|_| ()).map_err(|source| {
        to_error(path.display().to_string(), source)
    })
}

/// Reads `path` and checks it parses as JSON at all (the shape of what it
/// should contain is validated later, by whichever reader actually consumes
/// it). `to_io_error` covers the file being unreadable; `to_parse_error`
/// covers its contents not being JSON.
fn check_json_well_formed(
    path: &Path,
    to_io_error: impl FnOnce(String, std::io::Error) -> ConfigError,
    to_parse_error: impl FnOnce(String, serde_json::Error) -> ConfigError,
) -> Result<(), ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| to_io_error(path.display().to_string(), source))?;
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|_| ())
        .map_err(|source| to_parse_error(path.display().to_string(), source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_below_two_is_rejected() {
        let err = FabricConfig::validate(1, PathBuf::from("/dev/null"), None, None, None, false, false, 0)
            .unwrap_err();
        assert!(matches!(err, ConfigError::RadixTooSmall(1)));
    }

    #[test]
    fn missing_routes_file_is_rejected() {
        let err = FabricConfig::validate(
            10,
            PathBuf::from("/nonexistent/path/to/routes.txt"),
            None,
            None,
            None,
            false,
            false,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::RoutesFileUnreadable { .. }));
    }

    #[test]
    fn valid_config_with_no_optional_paths_passes() {
        let cfg = FabricConfig::validate(10, PathBuf::from("/dev/null"), None, None, None, false, false, 0)
            .expect("valid configuration");
        assert_eq!(cfg.max_ports(), 100);
    }

    #[test]
    fn malformed_previous_state_json_is_rejected_during_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous.json");
        std::fs::write(&path, "not json at all").unwrap();

        let err = FabricConfig::validate(
            10,
            PathBuf::from("/dev/null"),
            None,
            Some(path),
            None,
            false,
            false,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedJson { .. }));
    }

    #[test]
    fn malformed_locks_json_is_rejected_during_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks.json");
        std::fs::write(&path, "[{\"input\":1,}]").unwrap();

        let err = FabricConfig::validate(10, PathBuf::from("/dev/null"), None, None, Some(path), false, false, 0)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedJson { .. }));
    }

    #[test]
    fn well_formed_optional_json_paths_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        let previous_path = dir.path().join("previous.json");
        std::fs::write(&previous_path, r#"{"s3_port_spine": [-1]}"#).unwrap();
        let locks_path = dir.path().join("locks.json");
        std::fs::write(&locks_path, "[]").unwrap();

        let cfg = FabricConfig::validate(
            10,
            PathBuf::from("/dev/null"),
            None,
            Some(previous_path),
            Some(locks_path),
            false,
            false,
            0,
        )
        .expect("well-formed JSON on both optional paths should validate");
        assert_eq!(cfg.max_ports(), 100);
    }
}
