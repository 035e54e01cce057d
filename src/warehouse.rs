//! SQL for the warehouse table that combined rows are loaded into.
//!
//! The column order of [`TABLE`] matches the row layout written by the
//! combiner, so its output can be bulk-loaded with [`copy_statement`] as is.

use std::fmt::Write as _;

pub const TABLE: &str = "FACT_DAILY_REQUESTS";

/// Column name and type, in combined-row order.
pub const COLUMNS: [(&str, &str); 7] = [
    ("USERNAME", "VARCHAR(30) NOT NULL DISTKEY"),
    ("SESSION_ID", "VARCHAR(10)"),
    ("USER_AGENT", "VARCHAR(256) NOT NULL"),
    ("END_DATE", "DATE NOT NULL"),
    ("REQUEST", "VARCHAR(128) NOT NULL"),
    ("RESPONSE_CODE", "INTEGER NOT NULL"),
    ("REQUEST_COUNT", "INTEGER NOT NULL"),
];

pub const SORT_KEYS: [&str; 3] = ["END_DATE", "REQUEST", "RESPONSE_CODE"];

/// Matches the date token written by the map stage, e.g. `01/Jan/2015`.
pub const DATE_FORMAT: &str = "DD/MON/YYYY";

/// Quote a string literal, doubling embedded quotes.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn create_table_statement() -> String {
    let mut sql = format!("CREATE TABLE {TABLE}(\n");
    for (i, (name, ty)) in COLUMNS.iter().enumerate() {
        let sep = if i + 1 < COLUMNS.len() { "," } else { "" };
        let _ = writeln!(sql, "   {name} {ty}{sep}");
    }
    let _ = write!(sql, ")\nINTERLEAVED SORTKEY({})", SORT_KEYS.join(","));
    sql
}

/// Load every combined row under `s3://bucket/prefix`.
///
/// Access is granted through `iam_role`, an IAM role ARN attached to the
/// cluster.
pub fn copy_statement(bucket: &str, prefix: &str, iam_role: &str) -> String {
    let source = format!(
        "s3://{}/{}",
        bucket.trim_matches('/'),
        prefix.trim_start_matches('/')
    );
    format!(
        "COPY {TABLE}\nFROM {}\nDATEFORMAT AS {}\nDELIMITER '\\t'\nIAM_ROLE {}",
        quote(&source),
        quote(DATE_FORMAT),
        quote(iam_role)
    )
}

/// Reports over the loaded table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExampleQuery {
    UserCount,
    RequestsByDate { from: String, to: String },
    TopProductViews { from: String, to: String, limit: u32 },
}

impl ExampleQuery {
    pub fn sql(&self) -> String {
        match self {
            ExampleQuery::UserCount => format!("SELECT COUNT(DISTINCT USERNAME) FROM {TABLE}"),
            ExampleQuery::RequestsByDate { from, to } => format!(
                "SELECT END_DATE, SUM(REQUEST_COUNT)\n\
                 FROM {TABLE}\n\
                 WHERE END_DATE BETWEEN {} AND {}\n\
                 GROUP BY END_DATE\n\
                 ORDER BY END_DATE ASC",
                quote(from),
                quote(to)
            ),
            ExampleQuery::TopProductViews { from, to, limit } => format!(
                "SELECT REQUEST, SUM(REQUEST_COUNT) AS TOTAL\n\
                 FROM {TABLE}\n\
                 WHERE REQUEST ILIKE 'GET /products/%'\n\
                 AND END_DATE BETWEEN {} AND {}\n\
                 GROUP BY REQUEST\n\
                 ORDER BY TOTAL DESC\n\
                 LIMIT {limit}",
                quote(from),
                quote(to)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_lists_columns_in_row_order() {
        let sql = create_table_statement();
        assert!(sql.starts_with(
            "CREATE TABLE FACT_DAILY_REQUESTS(\n   USERNAME VARCHAR(30) NOT NULL DISTKEY,\n"
        ));
        assert!(sql.contains("   REQUEST_COUNT INTEGER NOT NULL\n)"));
        assert!(sql.ends_with("INTERLEAVED SORTKEY(END_DATE,REQUEST,RESPONSE_CODE)"));
        let user = sql.find("USERNAME").unwrap();
        let count = sql.find("REQUEST_COUNT").unwrap();
        assert!(user < count);
    }

    #[test]
    fn copy_reads_tab_delimited_rows() {
        let sql = copy_statement("job-result-bucket", "/output/1/", "arn:aws:iam::1:role/load");
        assert_eq!(
            sql,
            "COPY FACT_DAILY_REQUESTS\n\
             FROM 's3://job-result-bucket/output/1/'\n\
             DATEFORMAT AS 'DD/MON/YYYY'\n\
             DELIMITER '\\t'\n\
             IAM_ROLE 'arn:aws:iam::1:role/load'"
        );
    }

    #[test]
    fn query_literals_are_quoted() {
        let sql = ExampleQuery::RequestsByDate {
            from: "2015-10-01".into(),
            to: "2015-10-07' OR '1'='1".into(),
        }
        .sql();
        assert!(sql.contains("BETWEEN '2015-10-01' AND '2015-10-07'' OR ''1''=''1'"));
    }

    #[test]
    fn top_product_views_honours_the_limit() {
        let sql = ExampleQuery::TopProductViews {
            from: "2015-10-01".into(),
            to: "2015-10-07".into(),
            limit: 10,
        }
        .sql();
        assert!(sql.contains("ILIKE 'GET /products/%'"));
        assert!(sql.ends_with("LIMIT 10"));
        assert_eq!(
            ExampleQuery::UserCount.sql(),
            "SELECT COUNT(DISTINCT USERNAME) FROM FACT_DAILY_REQUESTS"
        );
    }
}
