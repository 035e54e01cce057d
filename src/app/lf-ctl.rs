use anyhow::Result;
use clap::Parser;
use logflow::cmd::ctl::{Args, Commands};
use logflow::job_flow::JobFlowConfig;
use logflow::utils;
use tracing::info;

fn main() -> Result<()> {
    utils::init_tracing();
    let args = Args::parse();

    match args.command {
        Commands::Plan {
            config,
            job_flow_id,
        } => {
            let job: JobFlowConfig = utils::read_json(&config)?;
            let plan = job.plan(job_flow_id.as_deref())?;
            info!(
                steps = plan.add_job_flow_steps.steps.len(),
                "planned job flow"
            );
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Sql { statement } => println!("{}", statement.sql()),
    }

    Ok(())
}
