//! CLI entry point driving the fabric repacker (§4.10, §6): parses arguments,
//! reads the route file and optional JSON inputs, applies every command in
//! order, and emits the stdout wire protocol plus the final JSON report.
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
    clippy::dbg_macro
)]
#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::print_stdout
)]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fabric_core::{
    json, parse_routes_ordered, ApplyError, Command, FabricConfig, FabricContext, InputId,
    PortId, RepackReport, RepackError,
};
use tracing::{error, info, warn};

/// Realizes a desired input-to-output port mapping on a symmetric three-stage
/// Clos fabric, repacking from scratch after every command.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text file of route commands.
    routes_path: PathBuf,
    /// Fabric radix; must be >= 2.
    #[arg(long, default_value_t = 10)]
    size: u32,
    /// Write the final committed state as a JSON blob here.
    #[arg(long)]
    json: Option<PathBuf>,
    /// Read the prior port-spine array from here.
    #[arg(long = "previous-state")]
    previous_state: Option<PathBuf>,
    /// Read locks from here.
    #[arg(long)]
    locks: Option<PathBuf>,
    /// Fail a commit if any demand's spine differs from its previous spine.
    #[arg(long)]
    strict_stability: bool,
    /// Advisory; accepted for caller compatibility, no semantic effect.
    #[arg(long)]
    incremental: bool,
    /// Raise the diagnostic-logging level; repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "fatal error");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let config = FabricConfig::validate(
        args.size,
        args.routes_path.clone(),
        args.json.clone(),
        args.previous_state.clone(),
        args.locks.clone(),
        args.strict_stability,
        args.incremental,
        args.verbose,
    );
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "configuration invalid");
            return Ok(ExitCode::from(1));
        }
    };

    if config.incremental {
        info!("--incremental accepted; the solver always repacks globally");
    }

    let previous = match &config.previous_state_path {
        Some(path) => match fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|t| {
            json::parse_previous_state(&t).map_err(anyhow::Error::from)
        }) {
            Ok(previous) => previous,
            Err(err) => {
                error!(%err, "could not read previous-state file");
                return Ok(ExitCode::from(1));
            }
        },
        None => fabric_core::PreviousState::default(),
    };

    let (locks, range_conflicts) = match &config.locks_path {
        Some(path) => {
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    error!(%err, "could not read locks file");
                    return Ok(ExitCode::from(1));
                }
            };
            let (raw, malformed) = match json::parse_locks(&text) {
                Ok(pair) => pair,
                Err(err) => {
                    error!(%err, "malformed locks JSON");
                    return Ok(ExitCode::from(1));
                }
            };
            let (locks, mut conflicts) = fabric_core::locks::load_locks(&raw, config.n);
            conflicts.extend(malformed);
            (locks, conflicts)
        }
        None => fabric_core::locks::load_locks(&[], config.n),
    };

    let routes_text = match fs::read_to_string(&config.routes_path) {
        Ok(text) => text,
        Err(err) => {
            error!(%err, "could not read routes file");
            return Ok(ExitCode::from(1));
        }
    };

    let mut ctx = FabricContext::new(config.n, config.strict_stability, previous, locks);
    let mut last_report: Option<RepackReport> = None;

    for (line, event) in parse_routes_ordered(&routes_text) {
        let command = match event {
            Ok(command) => command,
            Err(parse_err) => {
                println!("FAIL: {parse_err}");
                continue;
            }
        };

        match command {
            Command::Route { input, outputs } => {
                print_route_request(input, &outputs);
                match ctx.apply_route(input, &outputs, progress_printer) {
                    Ok(report) => {
                        print_repack_ok(&report);
                        last_report = Some(report);
                    }
                    Err(err) => {
                        if handle_apply_error(&err, line) {
                            return Ok(ExitCode::from(1));
                        }
                    }
                }
            }
            Command::Clear { input } => {
                println!(">> CLEAR {input}");
                match ctx.apply_clear(input, progress_printer) {
                    Ok(report) => {
                        print_repack_ok(&report);
                        last_report = Some(report);
                    }
                    Err(err) => {
                        if handle_apply_error(&err, line) {
                            return Ok(ExitCode::from(1));
                        }
                    }
                }
            }
        }
    }

    print_summary(&ctx, last_report.as_ref());

    if let Some(json_path) = &config.json_path {
        let report = json::build_report(&ctx, last_report.as_ref(), &range_conflicts);
        let body = serde_json::to_string_pretty(&report)?;
        if let Err(err) = fs::write(json_path, body) {
            error!(%err, path = %json_path.display(), "failed to write JSON report");
            return Ok(ExitCode::from(2));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_route_request(input: InputId, outputs: &[PortId]) {
    let joined = outputs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".");
    println!(">> ROUTE {input}.{joined}");
}

fn progress_printer(p: fabric_core::solver::Progress) {
    let best = p
        .best_cost
        .map_or_else(|| "none".to_string(), |c| c.to_string());
    println!(
        "PROGRESS: attempts={} elapsed={:.1}s depth={}/{} best_cost={best}",
        p.attempts,
        p.elapsed.as_secs_f64(),
        p.depth,
        p.total
    );
}

fn print_repack_ok(report: &RepackReport) {
    println!(
        "REPACK OK: stability_changes={} solve_ms={:.2}",
        report.metrics.stability_changes, report.solve_ms
    );
    println!(
        "STATS: routes_active={} routes_preserved={} routes_new={} routes_removed={}",
        report.metrics.routes_active,
        report.metrics.routes_preserved,
        report.metrics.routes_new,
        report.metrics.routes_removed
    );
}

/// Prints the appropriate `FAIL:` / `VALIDATION FAIL:` lines for a failed
/// command. Returns `true` if processing must stop (a fatal invariant
/// violation), `false` if the run should continue with the next command.
fn handle_apply_error(err: &ApplyError, line: usize) -> bool {
    match err {
        ApplyError::Request(e) => {
            println!("FAIL: line {line}: {e}");
            false
        }
        ApplyError::Repack(RepackError::CapacityExceeded(report))
        | ApplyError::Repack(RepackError::Unsat(report)) => {
            println!("FAIL: line {line}: {err}");
            for violation in report.violations() {
                println!("UNSAT DETAILS: {violation}");
            }
            println!("ROLLBACK: restored pre-command desired state");
            false
        }
        ApplyError::Repack(RepackError::LockConflict(conflicts)) => {
            println!("FAIL: line {line}: {err}");
            for c in conflicts {
                println!(
                    "UNSAT DETAILS: lock conflict input={} egress_block={} spine={} reason={}",
                    c.input,
                    c.egress_block,
                    c.spine,
                    c.reason.as_str()
                );
            }
            println!("ROLLBACK: restored pre-command desired state");
            false
        }
        ApplyError::Repack(RepackError::StrictStabilityViolation(changes)) => {
            println!("FAIL: line {line}: {changes} demand(s) would change spine under --strict-stability");
            println!("ROLLBACK: restored pre-command desired state");
            false
        }
        ApplyError::Fatal(violation) => {
            println!("VALIDATION FAIL: {violation}");
            warn!(%violation, "aborting: committed state failed its own invariants");
            true
        }
    }
}

fn print_summary(ctx: &FabricContext, last: Option<&RepackReport>) {
    println!("=== Fabric Summary ===");
    println!("repack_count={}", ctx.counters.repack_count);
    println!(
        "reroutes_demands={} reroutes_outputs={}",
        ctx.counters.reroutes_demands, ctx.counters.reroutes_outputs
    );
    if let Some(report) = last {
        println!(
            "routes_active={} stability_changes={}",
            report.metrics.routes_active, report.metrics.stability_changes
        );
    }
}
