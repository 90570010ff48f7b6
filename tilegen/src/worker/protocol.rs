//! Worker output line protocol.
//!
//! Workers print one record per line on stdout:
//!
//! ```text
//! TILE_OK <zoom> <x> <y>
//! TILE_ERR <zoom> <x> <y> <reason>
//! DONE total=<N> ok=<K> err=<M>
//! ```
//!
//! Anything else is a diagnostic line. Workers in every environment must emit
//! these records byte for byte; this is the only coupling between the
//! orchestrator and a worker.

use std::fmt;

use tracing::warn;

use crate::coord::TileCoord;

const TILE_OK: &str = "TILE_OK";
const TILE_ERR: &str = "TILE_ERR";
const DONE: &str = "DONE";

/// One parsed line of worker output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolLine {
    /// Tile fetched and written.
    TileOk(TileCoord),
    /// Tile failed after the worker's local retries.
    TileErr { tile: TileCoord, reason: String },
    /// Final summary line.
    Done { total: u64, ok: u64, err: u64 },
    /// Any other line, kept verbatim.
    Other(String),
}

impl ProtocolLine {
    /// Parses one line of output. Trailing `\r`/`\n` are ignored.
    ///
    /// Lines that start with a record keyword but are malformed are returned
    /// as [`ProtocolLine::Other`] so they can never corrupt run state.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
        let mut fields = line.splitn(5, ' ');

        let parsed = match fields.next() {
            Some(TILE_OK) => {
                let rest: Vec<&str> = fields.collect();
                match rest.as_slice() {
                    [z, x, y] => parse_tile(z, x, y).map(ProtocolLine::TileOk),
                    _ => None,
                }
            }
            Some(TILE_ERR) => {
                let rest: Vec<&str> = fields.collect();
                match rest.as_slice() {
                    [z, x, y, reason] if !reason.trim().is_empty() => {
                        parse_tile(z, x, y).map(|tile| ProtocolLine::TileErr {
                            tile,
                            reason: reason.trim().to_string(),
                        })
                    }
                    _ => None,
                }
            }
            Some(DONE) => parse_done(line),
            _ => return ProtocolLine::Other(line.to_string()),
        };

        parsed.unwrap_or_else(|| {
            warn!(line = line, "Malformed worker protocol line treated as diagnostic");
            ProtocolLine::Other(line.to_string())
        })
    }
}

impl fmt::Display for ProtocolLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolLine::TileOk(t) => write!(f, "{} {} {} {}", TILE_OK, t.zoom, t.x, t.y),
            ProtocolLine::TileErr { tile: t, reason } => {
                write!(f, "{} {} {} {} {}", TILE_ERR, t.zoom, t.x, t.y, reason)
            }
            ProtocolLine::Done { total, ok, err } => {
                write!(f, "{} total={} ok={} err={}", DONE, total, ok, err)
            }
            ProtocolLine::Other(line) => f.write_str(line),
        }
    }
}

fn parse_tile(z: &str, x: &str, y: &str) -> Option<TileCoord> {
    let zoom = z.parse().ok()?;
    let x = x.parse().ok()?;
    let y = y.parse().ok()?;
    TileCoord::new(zoom, x, y).ok()
}

fn parse_done(line: &str) -> Option<ProtocolLine> {
    let mut parts = line.split(' ');
    parts.next()?;
    let total = parts.next()?.strip_prefix("total=")?.parse().ok()?;
    let ok = parts.next()?.strip_prefix("ok=")?.parse().ok()?;
    let err = parts.next()?.strip_prefix("err=")?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ProtocolLine::Done { total, ok, err })
}
