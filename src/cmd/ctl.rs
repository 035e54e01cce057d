use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::warehouse::{self, ExampleQuery};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the cluster requests that would submit a job
    ///
    /// The job file describes buckets, instances and one entry per
    /// input prefix to process.
    Plan {
        /// JSON job file
        #[arg(short, long)]
        config: PathBuf,

        /// Id of an existing job flow to add the steps to
        #[arg(short, long)]
        job_flow_id: Option<String>,
    },
    /// Print warehouse SQL
    Sql {
        #[clap(subcommand)]
        statement: Statement,
    },
}

#[derive(Subcommand, Debug)]
pub enum Statement {
    /// Create the table combined rows are loaded into
    CreateTable,
    /// Load combined rows from S3
    Copy {
        #[arg(short, long)]
        bucket: String,
        #[arg(short, long)]
        prefix: String,
        /// ARN of the IAM role the warehouse assumes to read the bucket
        #[arg(short, long)]
        iam_role: String,
    },
    /// Count distinct users
    UserCount,
    /// Total requests per day
    RequestsByDate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Most requested product pages
    TopProductViews {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
}

impl Statement {
    pub fn sql(&self) -> String {
        match self {
            Statement::CreateTable => warehouse::create_table_statement(),
            Statement::Copy {
                bucket,
                prefix,
                iam_role,
            } => warehouse::copy_statement(bucket, prefix, iam_role),
            Statement::UserCount => ExampleQuery::UserCount.sql(),
            Statement::RequestsByDate { from, to } => ExampleQuery::RequestsByDate {
                from: from.clone(),
                to: to.clone(),
            }
            .sql(),
            Statement::TopProductViews { from, to, limit } => ExampleQuery::TopProductViews {
                from: from.clone(),
                to: to.clone(),
                limit: *limit,
            }
            .sql(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_renders_sql() {
        let copy = Statement::Copy {
            bucket: "b".into(),
            prefix: "p".into(),
            iam_role: "arn:aws:iam::1:role/load".into(),
        };
        assert!(copy.sql().starts_with("COPY FACT_DAILY_REQUESTS\nFROM 's3://b/p'"));
        assert!(Statement::CreateTable.sql().starts_with("CREATE TABLE"));
        assert_eq!(Statement::UserCount.sql(), ExampleQuery::UserCount.sql());
        let by_date = Statement::RequestsByDate {
            from: "2015-10-01".into(),
            to: "2015-10-07".into(),
        };
        assert!(by_date.sql().contains("GROUP BY END_DATE"));
    }
}
