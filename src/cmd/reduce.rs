use clap::Parser;

use crate::combiner::OrderCheck;

/// Combine key-sorted `key\tcount` records from stdin into one row per key
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Fail if a key arrives after a key that sorts after it
    #[clap(long)]
    pub check_order: bool,
    /// Report record counts as Hadoop streaming counters on stderr
    #[clap(long)]
    pub hadoop_counters: bool,
}

impl Args {
    pub fn order_check(&self) -> OrderCheck {
        if self.check_order {
            OrderCheck::Ascending
        } else {
            OrderCheck::Off
        }
    }
}
