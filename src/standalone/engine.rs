use anyhow::{ensure, Context, Result};
use dashmap::DashMap;
use glob::glob;
use itertools::Itertools;
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::combiner::{combine, CombineStats, OrderCheck};
use crate::emitter::{intermediate_line, EmitStats, Emitter};
use crate::standalone::Job;
use crate::*;

// types related to this engine
type PartitionIndex = u32;
type Partitions = DashMap<PartitionIndex, Vec<String>>;

/// What a standalone run did.
#[derive(Debug, Default)]
pub struct JobReport {
    pub map: EmitStats,
    pub reduce: CombineStats,
    /// One file per non-empty partition, in partition order.
    pub outputs: Vec<PathBuf>,
}

/// The key part of an intermediate record, which is what the shuffle
/// partitions and sorts on.
fn key_text(line: &str) -> &str {
    line.split_once(COLUMN_SEPARATOR).map_or(line, |(key, _)| key)
}

pub fn perform_map(job: &Job) -> Result<(Partitions, EmitStats)> {
    ensure!(job.reducers > 0, "At least one reduce partition is required");

    let partitions = Partitions::new();
    let mut stats = EmitStats::default();
    let mut matched = 0;
    // Every file matched by the input glob is mapped in turn.
    for pathspec in glob(&job.input)?.flatten() {
        matched += 1;
        let file = File::open(&pathspec)
            .with_context(|| format!("Failed to open {}", pathspec.display()))?;
        let mut reader = BufReader::new(file);
        let mut emitter = Emitter::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            // Each record goes to the partition its key hashes to.
            if let Some(key) = emitter.map(&buf) {
                let line = intermediate_line(&key);
                let partition = ihash(key_text(&line).as_bytes()) % job.reducers;
                #[allow(clippy::unwrap_or_default)]
                partitions
                    .entry(partition)
                    .or_insert(Vec::new())
                    .push(line);
            }
        }
        let file_stats = emitter.stats();
        debug!(
            file = %pathspec.display(),
            emitted = file_stats.records_emitted,
            dropped = file_stats.dropped(),
            "mapped input file"
        );
        stats.merge(&file_stats);
    }
    if matched == 0 {
        warn!(input = %job.input, "no input files matched");
    }

    Ok((partitions, stats))
}

pub fn perform_reduce(job: &Job, partitions: Partitions) -> Result<(CombineStats, Vec<PathBuf>)> {
    let output_dir = Path::new(&job.output);
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let order = if job.check_order {
        OrderCheck::Ascending
    } else {
        OrderCheck::Off
    };

    let mut stats = CombineStats::default();
    let mut outputs = Vec::new();
    // Sort each partition by key, standing in for the cluster's shuffle, then
    // combine it into its own part file.
    for (partition, lines) in partitions.into_iter().sorted_by_key(|(p, _)| *p) {
        let out_pathspec = output_dir.join(format!("part-{partition:05}"));
        let out_file = File::create(&out_pathspec)
            .with_context(|| format!("Failed to create {}", out_pathspec.display()))?;
        let sorted = lines
            .into_iter()
            .sorted_by(|a, b| key_text(a).cmp(key_text(b)))
            .map(Ok);
        let part_stats = combine(sorted, BufWriter::new(out_file), order)
            .with_context(|| format!("Failed to reduce partition {partition}"))?;
        stats.merge(&part_stats);
        outputs.push(out_pathspec);
    }

    Ok((stats, outputs))
}

pub fn run_job(job: &Job) -> Result<JobReport> {
    // The map logic carries out mapping and also partitioning, which stands
    // in for the cluster's shuffle.
    let (partitions, map) = perform_map(job)?;
    let (reduce, outputs) = perform_reduce(job, partitions)?;
    info!(
        lines = map.lines_read,
        dropped = map.dropped(),
        rows = reduce.rows_written,
        partitions = outputs.len(),
        "job finished"
    );
    Ok(JobReport {
        map,
        reduce,
        outputs,
    })
}
