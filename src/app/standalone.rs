use anyhow::Result;
use clap::Parser;
use logflow::standalone::{engine::run_job, Args, Job};
use logflow::utils;

fn parse_args() -> Job {
    let args = Args::parse();
    Job::from(args.command)
}

fn main() -> Result<()> {
    utils::init_tracing();
    let job = parse_args();
    let report = run_job(&job)?;
    for path in &report.outputs {
        println!("{}", path.display());
    }
    Ok(())
}
