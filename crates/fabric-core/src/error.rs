//! Error types for configuration, parsing, and the repack pipeline.
//!
//! Every fallible operation in this crate returns a typed error rather than
//! panicking, so the CLI's top-level handler can map failures onto the exit codes
//! from the external-interface contract without guessing at string contents.

use thiserror::Error;

use crate::capacity::CapacityReport;
use crate::locks::LockConflict;

/// Errors raised while assembling or validating a [`crate::config::FabricConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested radix is below the minimum of 2.
    #[error("radix must be >= 2, got {0}")]
    RadixTooSmall(u32),
    /// The routes file could not be opened or read.
    #[error("failed to read routes file {path}: {source}")]
    RoutesFileUnreadable {
        /// Path that was passed on the command line.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The previous-state JSON file could not be opened or read.
    #[error("failed to read previous-state file {path}: {source}")]
    PreviousStateUnreadable {
        /// Path that was passed on the command line.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The locks JSON file could not be opened or read.
    #[error("failed to read locks file {path}: {source}")]
    LocksFileUnreadable {
        /// Path that was passed on the command line.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A JSON input file did not parse as JSON at all.
    #[error("malformed JSON in {path}: {source}")]
    MalformedJson {
        /// Path that was passed on the command line.
        path: String,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

/// One parse failure on a single line of the routes file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct RouteParseError {
    /// 1-based line number within the routes file.
    pub line: usize,
    /// Human-readable description of what went wrong.
    pub message: String,
}

/// Why a single route request could not be staged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The requesting input is outside `1..=MAX_PORTS`.
    #[error("input {input} is out of range (1..={max})")]
    InputOutOfRange {
        /// Offending raw input id.
        input: u32,
        /// `MAX_PORTS` for the active radix.
        max: u32,
    },
    /// The request named no output ports at all.
    #[error("route request for input {0} named no output ports")]
    EmptyTargetList(u32),
    /// A named output port is outside `1..=MAX_PORTS`.
    #[error("port {port} is out of range (1..={max})")]
    PortOutOfRange {
        /// Offending raw port number.
        port: u32,
        /// `MAX_PORTS` for the active radix.
        max: u32,
    },
    /// A named output port already belongs to a different input.
    #[error("port {port} is already owned by input {owner}")]
    PortAlreadyOwned {
        /// Offending port.
        port: u32,
        /// Current owner.
        owner: u32,
    },
}

/// Outcome of a repack attempt, beyond plain success.
#[derive(Debug, Clone, Error)]
pub enum RepackError {
    /// The capacity pre-check rejected the desired state before search began.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(CapacityReport),
    /// Locks could not be satisfied simultaneously, or referenced out-of-range values.
    #[error("{} lock conflict(s)", .0.len())]
    LockConflict(Vec<LockConflict>),
    /// The solver exhausted its search space without finding any valid assignment.
    #[error("search exhausted: no valid assignment exists ({0})")]
    Unsat(CapacityReport),
    /// A valid assignment exists, but its stability cost is nonzero under
    /// `--strict-stability`.
    #[error("strict-stability violation: {0} demand(s) would change spine")]
    StrictStabilityViolation(u32),
}

/// A fatal defect: the committed state failed its own invariants after a commit
/// that the solver reported as successful. This can only indicate a solver bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violation: {0}")]
pub struct InvariantViolation(pub String);

/// Outcome of a command-applier request, in the order the applier checks for it:
/// request validation, then repack (recoverable, already rolled back on failure),
/// then a fatal invariant violation.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The request itself was invalid before any repack was attempted.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// Repack failed; the desired state has already been rolled back.
    #[error(transparent)]
    Repack(#[from] RepackError),
    /// The committed state failed its own invariants after a successful search.
    #[error(transparent)]
    Fatal(#[from] InvariantViolation),
}
