use clap::{Parser, Subcommand};

pub mod engine;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the map, shuffle and reduce stages locally
    Run {
        /// Glob spec for the input files
        #[arg(short, long)]
        input: String,

        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of reduce partitions
        #[arg(short, long, default_value_t = 4)]
        reducers: u32,

        /// Fail if a partition is not grouped by key when it reaches the
        /// combiner
        #[arg(long)]
        check_order: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Job {
    pub input: String,
    pub output: String,
    pub reducers: u32,
    pub check_order: bool,
}

impl From<Commands> for Job {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Run {
                input,
                output,
                reducers,
                check_order,
            } => Job {
                input,
                output,
                reducers,
                check_order,
            },
        }
    }
}
