//! The route-command grammar (§6): one or more comma-separated commands per
//! line, `#` starting a line comment, decimal 1-based port/input ids.
//!
//! ```text
//! 1.11.12.13   # route: assign outputs 11, 12, 13 to input 1
//! !7           # clear: disconnect everything owned by input 7
//! ```

use crate::error::RouteParseError;
use crate::ident::{InputId, PortId};

/// One parsed route-file command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Assign `outputs` to `input`.
    Route {
        /// The input requesting these outputs.
        input: InputId,
        /// Output ports to assign, in file order.
        outputs: Vec<PortId>,
    },
    /// Disconnect every output currently owned by `input`.
    Clear {
        /// The input to clear.
        input: InputId,
    },
}

/// Parses an entire route file, preserving the original token order: every
/// token becomes either a successfully parsed command or a parse error, tagged
/// with its 1-based source line. A malformed token contributes no command but
/// does not stop parsing of subsequent tokens or lines (§7: "reported, skipped").
#[must_use]
pub fn parse_routes_ordered(contents: &str) -> Vec<(usize, Result<Command, RouteParseError>)> {
    let mut events = Vec::new();

    for (offset, raw_line) in contents.lines().enumerate() {
        let line_no = offset + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        for token in line.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let event = parse_token(token)
                .map_err(|message| RouteParseError { line: line_no, message });
            events.push((line_no, event));
        }
    }

    events
}

/// Convenience split of [`parse_routes_ordered`] into parsed commands and parse
/// errors, each in file order but no longer interleaved with one another.
#[must_use]
pub fn parse_routes(contents: &str) -> (Vec<(usize, Command)>, Vec<RouteParseError>) {
    let mut commands = Vec::new();
    let mut errors = Vec::new();
    for (line, event) in parse_routes_ordered(contents) {
        match event {
            Ok(command) => commands.push((line, command)),
            Err(err) => errors.push(err),
        }
    }
    (commands, errors)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_token(token: &str) -> Result<Command, String> {
    if let Some(rest) = token.strip_prefix('!') {
        let raw = rest
            .parse::<u32>()
            .map_err(|_| format!("invalid clear command {token:?}: expected !<input>"))?;
        let input = InputId::new(raw).ok_or_else(|| format!("input id {raw} must be >= 1"))?;
        return Ok(Command::Clear { input });
    }

    let mut parts = token.split('.');
    let input_part = parts
        .next()
        .ok_or_else(|| format!("malformed route command {token:?}"))?;
    let raw_input = input_part
        .parse::<u32>()
        .map_err(|_| format!("invalid input id in {token:?}"))?;
    let input = InputId::new(raw_input).ok_or_else(|| format!("input id {raw_input} must be >= 1"))?;

    let mut outputs = Vec::new();
    for part in parts {
        let raw_port = part
            .parse::<u32>()
            .map_err(|_| format!("invalid output port in {token:?}"))?;
        let port = PortId::new(raw_port).ok_or_else(|| format!("port id {raw_port} must be >= 1"))?;
        outputs.push(port);
    }
    if outputs.is_empty() {
        return Err(format!(
            "route command {token:?} named no output ports"
        ));
    }

    Ok(Command::Route { input, outputs })
}
