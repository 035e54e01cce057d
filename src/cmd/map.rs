use clap::Parser;

/// Map access-log lines from stdin to `key\t1` records on stdout
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Report record counts as Hadoop streaming counters on stderr
    #[clap(long)]
    pub hadoop_counters: bool,
}
