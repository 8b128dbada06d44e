//! SQL text generation for device table queries.
//!
//! Statements take the shape
//!
//! ```text
//! SELECT <columns|*> FROM [<last-N preamble> ]<d><device><d>
//!     [ WHERE ...][ <last-N postamble>][ ORDER BY ...]
//! ```
//!
//! where `<d>` is the dialect's table delimiter. Filters are joined with
//! `AND` in a fixed column order so identical specs always produce identical
//! text.

use super::query::{Field, Filter, QuerySpec};
use crate::{PacketError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};

/// Placeholder replaced by the packet count in last-N templates.
pub const LAST_N_PLACEHOLDER: &str = "@LAST_NUMBER_OF_PACKETS@";

/// Database-specific pieces of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlDialect {
    /// Quotes the numeric table name.
    pub table_delimiter: String,
    /// Inserted before the table name in last-N mode, e.g. `TOP @LAST_NUMBER_OF_PACKETS@`.
    pub last_n_preamble: Option<String>,
    /// Appended after the WHERE clause in last-N mode.
    pub last_n_postamble: Option<String>,
}

impl Default for SqlDialect {
    fn default() -> Self {
        Self { table_delimiter: "`".to_string(), last_n_preamble: None, last_n_postamble: None }
    }
}

impl SqlDialect {
    /// Backtick-quoted tables, no last-N support.
    pub fn mysql() -> Self {
        Self::default()
    }

    /// Double-quoted tables with `TOP n` for last-N queries.
    pub fn sql_server() -> Self {
        Self {
            table_delimiter: "\"".to_string(),
            last_n_preamble: Some(format!("TOP {LAST_N_PLACEHOLDER}")),
            last_n_postamble: None,
        }
    }

    /// Reject delimiters that could change the statement's structure.
    pub fn validate(&self) -> Result<()> {
        let delimiter = &self.table_delimiter;
        if delimiter.is_empty()
            || delimiter
                .chars()
                .any(|c| c.is_alphanumeric() || c.is_whitespace() || c == ';' || c == '\'')
        {
            return Err(PacketError::Config {
                details: format!("invalid table delimiter {delimiter:?}"),
            });
        }
        Ok(())
    }

    fn supports_last_n(&self) -> bool {
        self.last_n_preamble.is_some() || self.last_n_postamble.is_some()
    }
}

/// Build the SQL statement for `spec`.
///
/// ```rust
/// use ssds_packets::sql::{Field, Filter, QuerySpec, SortOrder, SqlDialect, build};
///
/// let spec = QuerySpec::for_device(55)
///     .timestamp_seconds(Filter::Range(1000, 2000))
///     .order_by(Field::SequenceNumber, SortOrder::Desc);
/// assert_eq!(
///     build(&spec, &SqlDialect::default()).unwrap(),
///     "SELECT * FROM `55` WHERE timestampSeconds >= 1000 AND timestampSeconds <= 2000 \
///      ORDER BY sequenceNumber DESC"
/// );
/// ```
pub fn build(spec: &QuerySpec, dialect: &SqlDialect) -> Result<String> {
    validate(spec, dialect)?;

    let columns = if spec.selects_all() {
        "*".to_string()
    } else {
        spec.columns().iter().map(|field| field.column_name()).collect::<Vec<_>>().join(", ")
    };

    let mut sql = format!("SELECT {columns} FROM ");
    let last_n = spec.last_n.map(|count| count.to_string());

    if let (Some(count), Some(preamble)) = (&last_n, &dialect.last_n_preamble) {
        sql.push_str(&preamble.replace(LAST_N_PLACEHOLDER, count));
        sql.push(' ');
    }

    let delimiter = &dialect.table_delimiter;
    let _ = write!(sql, "{delimiter}{}{delimiter}", spec.device_id());

    let clauses = where_clauses(spec);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if let (Some(count), Some(postamble)) = (&last_n, &dialect.last_n_postamble) {
        sql.push(' ');
        sql.push_str(&postamble.replace(LAST_N_PLACEHOLDER, count));
    }

    let keys = spec.sort_keys();
    if !keys.is_empty() {
        let ordering: Vec<String> =
            keys.iter().map(|key| format!("{} {}", key.field, key.order.keyword())).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&ordering.join(", "));
    }

    Ok(sql)
}

fn validate(spec: &QuerySpec, dialect: &SqlDialect) -> Result<()> {
    if spec.device_id() <= 0 {
        return Err(PacketError::invalid_query(format!(
            "device id must be positive, got {}",
            spec.device_id()
        )));
    }
    if let Filter::Equals(version) | Filter::Range(version, _) = spec.packet_version
        && version < 1
    {
        return Err(PacketError::invalid_query(format!(
            "packet version must be at least 1, got {version}"
        )));
    }
    for (field, filter) in [(Field::Latitude, spec.latitude), (Field::Longitude, spec.longitude)] {
        if !finite(filter) {
            return Err(PacketError::invalid_query(format!("{field} filter must be finite")));
        }
    }
    if !finite(spec.depth.map(f64::from)) {
        return Err(PacketError::invalid_query("depth filter must be finite"));
    }
    if spec.last_n.is_some() && !dialect.supports_last_n() {
        return Err(PacketError::invalid_query(
            "last-N query needs a dialect with last-N templates",
        ));
    }
    dialect.validate()
}

fn finite(filter: Filter<f64>) -> bool {
    match filter {
        Filter::Unset => true,
        Filter::Equals(value) => value.is_finite(),
        Filter::Range(low, high) => low.is_finite() && high.is_finite(),
    }
}

fn where_clauses(spec: &QuerySpec) -> Vec<String> {
    let mut clauses = Vec::new();
    push_filter(&mut clauses, Field::SsdsPacketVersion, &spec.packet_version);
    push_filter(&mut clauses, Field::ParentId, &spec.parent_id);
    push_filter(&mut clauses, Field::PacketType, &spec.packet_type);
    push_filter(&mut clauses, Field::PacketSubType, &spec.packet_sub_type);
    push_filter(&mut clauses, Field::DataDescriptionId, &spec.data_description_id);
    push_filter(&mut clauses, Field::DataDescriptionVersion, &spec.data_description_version);
    push_filter(&mut clauses, Field::TimestampSeconds, &spec.timestamp_seconds);
    push_filter(&mut clauses, Field::TimestampNanoseconds, &spec.timestamp_nanoseconds);
    push_filter(&mut clauses, Field::SequenceNumber, &spec.sequence_number);
    push_filter(&mut clauses, Field::Latitude, &spec.latitude);
    push_filter(&mut clauses, Field::Longitude, &spec.longitude);
    push_filter(&mut clauses, Field::Depth, &spec.depth);
    clauses
}

fn push_filter<T: Display>(clauses: &mut Vec<String>, field: Field, filter: &Filter<T>) {
    match filter {
        Filter::Unset => {}
        Filter::Equals(value) => clauses.push(format!("{field} = {value}")),
        Filter::Range(low, high) => clauses.push(format!("{field} >= {low} AND {field} <= {high}")),
    }
}
