//! The map stage: access-log lines in, `key\t1` records out.
//!
//! Lines look like
//!
//! ```text
//! host session user <user agent ...> date time method path [protocol] status bytes
//! ```
//!
//! The user agent spans a variable number of tokens, so the fields after it
//! are located from the end of the line.

use std::io::{BufRead, Write};

use tracing::{debug, info};

use crate::{RequestKey, Result, COLUMN_SEPARATOR};

/// Lines with fewer whitespace-separated tokens than this are dropped.
pub const MIN_TOKENS: usize = 10;

/// Tokens after the user agent when the line has no protocol token.
const TAIL_TOKENS: usize = 6;

/////////////////////////////////////////////////////////////////////////////
// Tokenizing
/////////////////////////////////////////////////////////////////////////////

/// One tokenized access-log line. Fields borrow from the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry<'a> {
    pub host: &'a str,
    pub session: &'a str,
    pub user: &'a str,
    pub agent: Vec<&'a str>,
    pub date: &'a str,
    pub time: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub protocol: Option<&'a str>,
    pub status: &'a str,
    pub bytes: &'a str,
}

impl<'a> AccessLogEntry<'a> {
    /// Tokenize `line`, or return the token count if it is below
    /// [`MIN_TOKENS`].
    pub fn parse(line: &'a str) -> Result<Self, usize> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let n = tokens.len();
        if n < MIN_TOKENS {
            return Err(n);
        }

        // A protocol token follows a request path, which starts with '/'.
        let protocol = tokens[n - 3].starts_with("HTTP/") && tokens[n - 4].starts_with('/');
        let tail = if protocol { TAIL_TOKENS + 1 } else { TAIL_TOKENS };
        let t = &tokens[n - tail..];

        Ok(Self {
            host: tokens[0],
            session: tokens[1],
            user: tokens[2],
            agent: tokens[3..n - tail].to_vec(),
            date: t[0],
            time: t[1],
            method: t[2],
            path: t[3],
            protocol: protocol.then_some(t[4]),
            status: t[tail - 2],
            bytes: t[tail - 1],
        })
    }

    pub fn agent(&self) -> String {
        self.agent.join(" ")
    }

    pub fn request(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn key(&self) -> RequestKey {
        RequestKey {
            user: self.user.to_string(),
            session: self.session.to_string(),
            agent: self.agent(),
            date: self.date.to_string(),
            request: self.request(),
            status: self.status.to_string(),
        }
    }
}

/// Extract the request key from a raw line, or `None` if the line is
/// malformed.
pub fn map_line(line: &str) -> Option<RequestKey> {
    AccessLogEntry::parse(line).ok().map(|entry| entry.key())
}

/// Render the intermediate record for one request.
pub fn intermediate_line(key: &RequestKey) -> String {
    format!("{}{}1", key.encode(), COLUMN_SEPARATOR)
}

/////////////////////////////////////////////////////////////////////////////
// Streaming
/////////////////////////////////////////////////////////////////////////////

/// Counters for one run of the emitter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitStats {
    pub lines_read: u64,
    pub records_emitted: u64,
    /// Lines with too few tokens.
    pub short_lines: u64,
    /// Lines that were not valid UTF-8.
    pub undecodable_lines: u64,
}

impl EmitStats {
    pub fn dropped(&self) -> u64 {
        self.short_lines + self.undecodable_lines
    }

    pub fn merge(&mut self, other: &EmitStats) {
        self.lines_read += other.lines_read;
        self.records_emitted += other.records_emitted;
        self.short_lines += other.short_lines;
        self.undecodable_lines += other.undecodable_lines;
    }

    /// Counter name/value pairs in Hadoop streaming's reporter format.
    pub fn counters(&self) -> [(&'static str, u64); 3] {
        [
            ("records_emitted", self.records_emitted),
            ("short_lines", self.short_lines),
            ("undecodable_lines", self.undecodable_lines),
        ]
    }
}

/// Maps raw lines to keys while counting what it had to drop.
#[derive(Debug, Default)]
pub struct Emitter {
    stats: EmitStats,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one raw line. Trailing `\r` and `\n` are ignored.
    pub fn map(&mut self, raw: &[u8]) -> Option<RequestKey> {
        self.stats.lines_read += 1;
        let Ok(line) = std::str::from_utf8(raw) else {
            self.stats.undecodable_lines += 1;
            debug!(line = self.stats.lines_read, "dropping line that is not UTF-8");
            return None;
        };
        match AccessLogEntry::parse(line.trim_end_matches(['\r', '\n'])) {
            Ok(entry) => {
                self.stats.records_emitted += 1;
                Some(entry.key())
            }
            Err(tokens) => {
                self.stats.short_lines += 1;
                debug!(line = self.stats.lines_read, tokens, "dropping short line");
                None
            }
        }
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }
}

/// Run the emitter over `input` until it is exhausted, writing one
/// intermediate record per valid line to `output`.
pub fn emit<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<EmitStats> {
    let mut emitter = Emitter::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if let Some(key) = emitter.map(&buf) {
            writeln!(output, "{}", intermediate_line(&key))?;
        }
    }
    output.flush()?;

    let stats = emitter.stats();
    info!(
        lines = stats.lines_read,
        emitted = stats.records_emitted,
        dropped = stats.dropped(),
        "map finished"
    );
    Ok(stats)
}
