use std::io::{self, BufRead, BufWriter};

use anyhow::{Context, Result};
use clap::Parser;
use logflow::cmd::reduce::Args;
use logflow::{combiner, utils};

fn main() -> Result<()> {
    utils::init_tracing();
    let args = Args::parse();

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    let stats = combiner::combine(stdin.lines(), stdout, args.order_check())
        .context("Reduce failed")?;

    if args.hadoop_counters {
        utils::report_counters(&stats.counters())?;
    }
    Ok(())
}
