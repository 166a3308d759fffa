//! fabric-core: the global repacker for a symmetric three-stage Clos fabric.
//!
//! Given a desired input-to-output port mapping, this crate derives the demand
//! set, checks it against block capacity and any pinned locks, searches for a
//! spine assignment that satisfies every demand while biasing toward the
//! previous commit's choices, and commits the result after re-verifying every
//! invariant from scratch. [`applier::FabricContext`] is the entry point: it
//! owns all mutable fabric state for one process invocation and exposes
//! `apply_route` / `apply_clear` as the only ways to change it.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Identifier newtypes (ports, inputs, blocks, spines).
pub mod ident;
/// Error types for configuration, parsing, and the repack pipeline.
pub mod error;
/// Pure data tables: desired state, committed state, previous state, counters.
pub mod state;
/// Derives the demand set from the desired state.
pub mod demand;
/// Cheap necessary-condition feasibility pre-check on block occupancy.
pub mod capacity;
/// User-pinned lock store and its feasibility validator.
pub mod locks;
/// MRV backtracking search over spine assignments.
pub mod solver;
/// Installs a solver result and re-verifies invariants.
pub mod commit;
/// Transactional command applier: the crate's main entry point.
pub mod applier;
/// Per-commit and cumulative statistics.
pub mod metrics;
/// Typed, validated startup configuration.
pub mod config;
/// The route-command grammar.
pub mod route_parser;
/// The output JSON report and the lenient previous-state/locks readers.
pub mod json;

pub use applier::{FabricContext, RepackReport};
pub use config::FabricConfig;
pub use error::{ApplyError, ConfigError, InvariantViolation, RepackError, RequestError, RouteParseError};
pub use ident::{BlockId, InputId, PortId, SpineId};
pub use route_parser::{parse_routes, parse_routes_ordered, Command};
pub use state::{CommittedState, CumulativeCounters, DesiredState, PreviousState};
