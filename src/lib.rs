//! Hadoop-streaming stages for counting requests in access logs.
//!
//! The [`emitter`] turns raw access-log lines into `key\t1` records, an
//! external sort groups identical keys together, and the [`combiner`] folds
//! each run of identical keys into a single tab-delimited row that can be
//! bulk-loaded into the warehouse table described in [`warehouse`]. The
//! [`standalone`] runner plays the part of the cluster shuffle locally, and
//! [`job_flow`] builds the requests that submit the same stages to a cluster.

use std::fmt;
use std::hash::Hasher;

pub mod cmd;
pub mod combiner;
pub mod emitter;
pub mod error;
pub mod job_flow;
pub mod standalone;
pub mod utils;
pub mod warehouse;

pub use error::{Error, Result};

/////////////////////////////////////////////////////////////////////////////
// Request keys
/////////////////////////////////////////////////////////////////////////////

/// Number of fields in a [`RequestKey`].
pub const KEY_FIELDS: usize = 6;

/// Separates key fields in intermediate records.
pub const FIELD_SEPARATOR: char = '|';

/// Separates the key from the count, and every column of a combined row.
pub const COLUMN_SEPARATOR: char = '\t';

const ESCAPE: char = '\\';

/// The aggregation bucket of one request: who asked for what, when, and how
/// it was answered.
///
/// Field order matches the columns of the warehouse table.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct RequestKey {
    pub user: String,
    pub session: String,
    pub agent: String,
    pub date: String,
    pub request: String,
    pub status: String,
}

impl RequestKey {
    /// The fields in column order.
    pub fn fields(&self) -> [&str; KEY_FIELDS] {
        [
            &self.user,
            &self.session,
            &self.agent,
            &self.date,
            &self.request,
            &self.status,
        ]
    }

    /// Serialize as `|`-joined fields.
    ///
    /// A `|` or `\` inside a field is prefixed with `\`, so the encoding is
    /// unambiguous and [`RequestKey::decode`] restores the exact fields.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, field) in self.fields().into_iter().enumerate() {
            if i > 0 {
                out.push(FIELD_SEPARATOR);
            }
            for c in field.chars() {
                if c == FIELD_SEPARATOR || c == ESCAPE {
                    out.push(ESCAPE);
                }
                out.push(c);
            }
        }
        out
    }

    /// Parse a key.
    ///
    /// A key containing a tab is taken to be the leading columns of a
    /// combined row and is split on tabs verbatim, so combined output can be
    /// fed back in unchanged. Anything else is read as the escaped `|` form
    /// produced by [`RequestKey::encode`].
    pub fn decode(encoded: &str) -> Result<Self> {
        let fields: Vec<String> = if encoded.contains(COLUMN_SEPARATOR) {
            encoded.split(COLUMN_SEPARATOR).map(String::from).collect()
        } else {
            split_escaped(encoded)
        };

        let found = fields.len();
        let Ok([user, session, agent, date, request, status]) =
            <[String; KEY_FIELDS]>::try_from(fields)
        else {
            return Err(Error::MalformedKey {
                key: encoded.to_string(),
                expected: KEY_FIELDS,
                found,
            });
        };
        Ok(Self {
            user,
            session,
            agent,
            date,
            request,
            status,
        })
    }

    /// Render a combined row: every field, then `count`, tab-delimited.
    pub fn to_row(&self, count: i64) -> String {
        let mut row = self.fields().join("\t");
        row.push(COLUMN_SEPARATOR);
        row.push_str(&count.to_string());
        row
    }
}

fn split_escaped(encoded: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(KEY_FIELDS);
    let mut current = String::new();
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => current.push(chars.next().unwrap_or(ESCAPE)),
            FIELD_SEPARATOR => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Hashes an intermediate key. Compute a reduce partition for a given key
/// by calculating `ihash(key) % n_reduce`.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    let value = hasher.finish() & 0x7fffffff;
    // The mask keeps the value within 31 bits.
    value as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fields: [&str; KEY_FIELDS]) -> RequestKey {
        let [user, session, agent, date, request, status] = fields.map(String::from);
        RequestKey {
            user,
            session,
            agent,
            date,
            request,
            status,
        }
    }

    #[test]
    fn encodes_fields_pipe_joined() {
        let k = key(["u1", "s1", "a b c", "01/Jan/2015", "GET /x", "200"]);
        assert_eq!(k.encode(), "u1|s1|a b c|01/Jan/2015|GET /x|200");
    }

    #[test]
    fn pipes_inside_fields_survive_a_round_trip() {
        let k = key(["u1", "s1", "curl|7.1 \\o/", "01/Jan/2015", "GET /a|b", "200"]);
        let encoded = k.encode();
        assert_eq!(encoded, "u1|s1|curl\\|7.1 \\\\o/|01/Jan/2015|GET /a\\|b|200");
        assert_eq!(RequestKey::decode(&encoded).unwrap(), k);
    }

    #[test]
    fn decodes_tab_delimited_keys() {
        let k = RequestKey::decode("u1\ts1\ta\td\tr\t200").unwrap();
        assert_eq!(k, key(["u1", "s1", "a", "d", "r", "200"]));
    }

    #[test]
    fn row_keys_are_split_verbatim() {
        let k = RequestKey::decode("u1\ts1\tcurl|7.1 \\o/\td\tGET /a|b\t200").unwrap();
        assert_eq!(k, key(["u1", "s1", "curl|7.1 \\o/", "d", "GET /a|b", "200"]));
    }

    #[test]
    fn rejects_keys_with_the_wrong_number_of_fields() {
        let err = RequestKey::decode("u1|s1|a").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedKey {
                expected: 6,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn renders_rows_tab_delimited() {
        let k = key(["u1", "s1", "a|b", "d", "GET /", "404"]);
        assert_eq!(k.to_row(3), "u1\ts1\ta|b\td\tGET /\t404\t3");
    }

    #[test]
    fn ihash_stays_within_31_bits() {
        for key in ["", "u1|s1", "a much longer key with spaces"] {
            assert!(ihash(key.as_bytes()) <= 0x7fffffff);
        }
        assert_eq!(ihash(b"same"), ihash(b"same"));
    }
}
