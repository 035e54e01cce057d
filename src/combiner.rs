//! The reduce stage: folds runs of identical keys into one row each.
//!
//! # Precondition
//!
//! Every occurrence of a key must be adjacent in the input. The shuffle
//! provides this by sorting on the key; the combiner only ever holds the run
//! it is currently folding, so a key that shows up again after its run was
//! closed becomes a second, separate row. [`OrderCheck::Ascending`] turns
//! that silent split into an error for inputs that are known to be sorted.

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use tracing::{info, warn};

use crate::{Error, RequestKey, Result, COLUMN_SEPARATOR};

/// A key and its running or final count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate<K> {
    pub key: K,
    pub count: i64,
}

impl<K> Aggregate<K> {
    pub fn new(key: K, count: i64) -> Self {
        Self { key, count }
    }
}

/// How much the combiner trusts the ordering of its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderCheck {
    /// Assume identical keys are adjacent.
    #[default]
    Off,
    /// Require each new key to sort strictly after the key it closes.
    Ascending,
}

#[derive(Debug)]
enum State<K> {
    Empty,
    Accumulating(Aggregate<K>),
    Flushed,
}

/// Sort-merge accumulator over a key-grouped stream.
///
/// Moves from empty to accumulating on the first record and to flushed on
/// [`Combiner::flush`]. Only aggregates with a positive count are released.
#[derive(Debug)]
pub struct Combiner<K> {
    state: State<K>,
    order: OrderCheck,
    suppressed: u64,
}

impl<K> Default for Combiner<K> {
    fn default() -> Self {
        Self::new(OrderCheck::Off)
    }
}

impl<K> Combiner<K> {
    pub fn new(order: OrderCheck) -> Self {
        Self {
            state: State::Empty,
            order,
            suppressed: 0,
        }
    }

    /// Number of closed aggregates withheld because their count was not
    /// positive.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Close the current run and release its aggregate, if any.
    ///
    /// Further calls to [`Combiner::observe`] fail.
    pub fn flush(&mut self) -> Option<Aggregate<K>> {
        match std::mem::replace(&mut self.state, State::Flushed) {
            State::Accumulating(aggregate) => release(&mut self.suppressed, aggregate),
            State::Empty | State::Flushed => None,
        }
    }
}

impl<K: Ord + fmt::Display> Combiner<K> {
    /// Fold one record into the current run.
    ///
    /// Returns the previous run's aggregate when `key` starts a new run.
    pub fn observe(&mut self, key: K, count: i64) -> Result<Option<Aggregate<K>>> {
        match &mut self.state {
            State::Flushed => Err(Error::CombinerFlushed),
            State::Empty => {
                self.state = State::Accumulating(Aggregate::new(key, count));
                Ok(None)
            }
            State::Accumulating(current) if current.key == key => {
                current.count = current
                    .count
                    .checked_add(count)
                    .ok_or_else(|| Error::CountOverflow {
                        key: key.to_string(),
                    })?;
                Ok(None)
            }
            State::Accumulating(current) => {
                if self.order == OrderCheck::Ascending && key < current.key {
                    return Err(Error::OutOfOrder {
                        previous: current.key.to_string(),
                        key: key.to_string(),
                    });
                }
                let closed = std::mem::replace(current, Aggregate::new(key, count));
                Ok(release(&mut self.suppressed, closed))
            }
        }
    }
}

fn release<K>(suppressed: &mut u64, aggregate: Aggregate<K>) -> Option<Aggregate<K>> {
    if aggregate.count > 0 {
        Some(aggregate)
    } else {
        *suppressed += 1;
        None
    }
}

/////////////////////////////////////////////////////////////////////////////
// Streaming
/////////////////////////////////////////////////////////////////////////////

/// Counters for one run of the combiner.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CombineStats {
    pub records_read: u64,
    pub rows_written: u64,
    /// Keys whose total was zero or negative.
    pub suppressed: u64,
}

impl CombineStats {
    pub fn merge(&mut self, other: &CombineStats) {
        self.records_read += other.records_read;
        self.rows_written += other.rows_written;
        self.suppressed += other.suppressed;
    }

    pub fn counters(&self) -> [(&'static str, u64); 3] {
        [
            ("records_read", self.records_read),
            ("rows_written", self.rows_written),
            ("suppressed_totals", self.suppressed),
        ]
    }
}

/// A decoded key together with the text it arrived as.
///
/// Grouping and ordering use the text, byte for byte, the same way the
/// shuffle compared it. Pipe-encoded and tab-delimited input are each sorted
/// on their own text, so neither form is re-encoded before comparing.
#[derive(Debug, Clone)]
pub struct RecordKey {
    raw: String,
    key: RequestKey,
}

impl RecordKey {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(Self {
            key: RequestKey::decode(raw)?,
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }
}

impl PartialEq for RecordKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for RecordKey {}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split an intermediate record into its key and count.
///
/// The count follows the last tab; everything before it is the key.
pub fn parse_record(line: &str, line_no: u64) -> Result<(RecordKey, i64)> {
    let (key, count) = line
        .rsplit_once(COLUMN_SEPARATOR)
        .ok_or(Error::MissingCount { line: line_no })?;
    let count = count
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidCount {
            line: line_no,
            value: count.to_string(),
        })?;
    Ok((RecordKey::parse(key)?, count))
}

/// Combine key-grouped intermediate records from `lines` into rows on
/// `output`.
///
/// Blank lines are skipped; any other unparseable line stops the run.
pub fn combine<I, W>(lines: I, mut output: W, order: OrderCheck) -> Result<CombineStats>
where
    I: IntoIterator<Item = io::Result<String>>,
    W: Write,
{
    let mut combiner = Combiner::new(order);
    let mut stats = CombineStats::default();

    for (i, line) in lines.into_iter().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.records_read += 1;
        let (key, count) = parse_record(&line, i as u64 + 1)?;
        if count < 0 {
            warn!(line = i + 1, count, "negative count");
        }
        if let Some(aggregate) = combiner.observe(key, count)? {
            writeln!(output, "{}", aggregate.key.key().to_row(aggregate.count))?;
            stats.rows_written += 1;
        }
    }
    if let Some(aggregate) = combiner.flush() {
        writeln!(output, "{}", aggregate.key.key().to_row(aggregate.count))?;
        stats.rows_written += 1;
    }
    output.flush()?;

    stats.suppressed = combiner.suppressed();
    info!(
        records = stats.records_read,
        rows = stats.rows_written,
        suppressed = stats.suppressed,
        "reduce finished"
    );
    Ok(stats)
}
