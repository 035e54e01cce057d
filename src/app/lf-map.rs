use std::io::{self, BufWriter};

use anyhow::{Context, Result};
use clap::Parser;
use logflow::cmd::map::Args;
use logflow::{emitter, utils};

fn main() -> Result<()> {
    utils::init_tracing();
    let args = Args::parse();

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    let stats = emitter::emit(stdin, stdout).context("Map failed")?;

    if args.hadoop_counters {
        utils::report_counters(&stats.counters())?;
    }
    Ok(())
}
