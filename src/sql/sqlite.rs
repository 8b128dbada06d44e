//! [`PageProvider`] over a SQLite database file.

use super::cursor::{Page, PageProvider};
use super::query::{ColumnKind, Field};
use crate::{MAX_PRIMARY_LEN, MAX_SECONDARY_LEN, PacketError, Result};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Reads device tables from a SQLite database.
///
/// A connection is opened per page and closed before the page is returned.
#[derive(Debug, Clone)]
pub struct SqlitePageProvider {
    path: PathBuf,
}

impl SqlitePageProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self, sql: &str) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        Connection::open_with_flags(&self.path, flags)
            .map_err(|e| PacketError::query_failed(sql, e))
    }
}

impl PageProvider for SqlitePageProvider {
    fn fetch_page(&self, sql: &str, columns: &[Field], offset: u64, limit: usize) -> Result<Page> {
        let connection = self.connect(sql)?;
        let mut statement =
            connection.prepare(sql).map_err(|e| PacketError::query_failed(sql, e))?;
        let mut rows = statement.query([]).map_err(|e| PacketError::query_failed(sql, e))?;

        for _ in 0..offset {
            if rows.next().map_err(|e| PacketError::query_failed(sql, e))?.is_none() {
                return Ok(Page::default());
            }
        }

        let mut page = Page { rows: Vec::with_capacity(limit), scanned: 0 };
        while page.scanned < limit {
            let Some(row) = rows.next().map_err(|e| PacketError::query_failed(sql, e))? else {
                break;
            };
            page.scanned += 1;
            match serialize_row(row, columns) {
                Ok(bytes) => page.rows.push(bytes),
                Err(e) => {
                    warn!("Skipping row {} of {}: {}", offset + page.scanned as u64 - 1, sql, e)
                }
            }
        }
        trace!(
            "Fetched {} of {} rows at offset {} from {}",
            page.rows.len(),
            page.scanned,
            offset,
            self.path.display()
        );
        Ok(page)
    }
}

/// Concatenate a row's columns: `Int` as big-endian `i32`, `Long` as
/// big-endian `i64`, `Bytes` raw.
///
/// Columns are looked up by name. NULL numbers read as zero and NULL buffers
/// as empty; REAL values are truncated toward zero.
///
/// A buffer preceded by its length column is written at exactly that length,
/// so the bytes that follow stay aligned. A blob shorter than its length, or a
/// length outside the buffer limit, fails the row.
fn serialize_row(row: &Row<'_>, columns: &[Field]) -> rusqlite::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut primary_len = None;
    let mut secondary_len = None;
    for &field in columns {
        let index = row.as_ref().column_index(field.column_name())?;
        let value = row.get_ref(index)?;
        match field.kind() {
            ColumnKind::Int => {
                let value = integer(index, field, value)?;
                let value = i32::try_from(value)
                    .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(index, value))?;
                match field {
                    Field::BufferLen => primary_len = Some(value),
                    Field::BufferTwoLen => secondary_len = Some(value),
                    _ => {}
                }
                out.extend_from_slice(&value.to_be_bytes());
            }
            ColumnKind::Long => {
                out.extend_from_slice(&integer(index, field, value)?.to_be_bytes())
            }
            ColumnKind::Bytes => {
                let bytes = match value {
                    ValueRef::Blob(bytes) | ValueRef::Text(bytes) => bytes,
                    ValueRef::Null => &[][..],
                    other => return Err(wrong_type(index, field, other.data_type())),
                };
                let (declared, max) = match field {
                    Field::BufferTwoBytes => (secondary_len.take(), MAX_SECONDARY_LEN),
                    _ => (primary_len.take(), MAX_PRIMARY_LEN),
                };
                out.extend_from_slice(declared_prefix(index, bytes, declared, max)?);
            }
        }
    }
    Ok(out)
}

fn declared_prefix(
    index: usize,
    bytes: &[u8],
    declared: Option<i32>,
    max: usize,
) -> rusqlite::Result<&[u8]> {
    let Some(declared) = declared else {
        return Ok(bytes);
    };
    match usize::try_from(declared) {
        Ok(len) if len <= max && len <= bytes.len() => Ok(&bytes[..len]),
        _ => Err(rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Blob,
            format!("length column declares {declared} bytes for a {} byte blob", bytes.len())
                .into(),
        )),
    }
}

fn integer(index: usize, field: Field, value: ValueRef<'_>) -> rusqlite::Result<i64> {
    match value {
        ValueRef::Integer(value) => Ok(value),
        ValueRef::Real(value) => Ok(value as i64),
        ValueRef::Null => Ok(0),
        other => Err(wrong_type(index, field, other.data_type())),
    }
}

fn wrong_type(index: usize, field: Field, found: Type) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(index, field.column_name().to_string(), found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_device_table, insert_packet, sample_packet};

    fn database_with(device_id: i64, count: i64) -> (tempfile::TempDir, SqlitePageProvider) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packets.db");
        let connection = Connection::open(&path).unwrap();
        create_device_table(&connection, device_id).unwrap();
        for seq in 0..count {
            insert_packet(&connection, device_id, &sample_packet(device_id, 100, seq)).unwrap();
        }
        (dir, SqlitePageProvider::new(path))
    }

    #[test]
    fn serializes_columns_by_kind() {
        let (_dir, provider) = database_with(55, 1);
        let columns =
            [Field::SsdsPacketVersion, Field::SequenceNumber, Field::BufferLen, Field::BufferBytes];
        let page = provider.fetch_page("SELECT * FROM `55`", &columns, 0, 10).unwrap();

        assert_eq!(page.scanned, 1);
        let mut expected = Vec::new();
        expected.extend_from_slice(&3i32.to_be_bytes());
        expected.extend_from_slice(&0i64.to_be_bytes());
        expected.extend_from_slice(&12i32.to_be_bytes());
        expected.extend_from_slice(b"hello sensor");
        assert_eq!(page.rows, vec![expected]);
    }

    #[test]
    fn offset_skips_scanned_rows() {
        let (_dir, provider) = database_with(55, 5);
        let sql = "SELECT * FROM `55` ORDER BY sequenceNumber ASC";
        let page = provider.fetch_page(sql, &[Field::SequenceNumber], 3, 10).unwrap();
        assert_eq!(page.scanned, 2);
        assert_eq!(page.rows, vec![3i64.to_be_bytes().to_vec(), 4i64.to_be_bytes().to_vec()]);

        let page = provider.fetch_page(sql, &[Field::SequenceNumber], 9, 10).unwrap();
        assert_eq!(page, Page::default());
    }

    #[test]
    fn bad_rows_are_skipped_but_counted() {
        let (dir, provider) = database_with(55, 3);
        let connection = Connection::open(dir.path().join("packets.db")).unwrap();
        connection
            .execute("UPDATE `55` SET bufferLen = 'oops' WHERE sequenceNumber = 1", [])
            .unwrap();

        let sql = "SELECT * FROM `55` ORDER BY sequenceNumber ASC";
        let columns = [Field::SequenceNumber, Field::BufferLen];
        let page = provider.fetch_page(sql, &columns, 0, 10).unwrap();
        assert_eq!(page.scanned, 3);
        assert_eq!(page.rows.len(), 2);
    }

    #[test]
    fn stale_length_bounds_the_blob() {
        let (dir, provider) = database_with(55, 1);
        let connection = Connection::open(dir.path().join("packets.db")).unwrap();
        connection.execute("UPDATE `55` SET bufferLen = 3", []).unwrap();

        let columns =
            [Field::BufferLen, Field::BufferBytes, Field::BufferTwoLen, Field::BufferTwoBytes];
        let page = provider.fetch_page("SELECT * FROM `55`", &columns, 0, 1).unwrap();
        let mut expected = 3i32.to_be_bytes().to_vec();
        expected.extend_from_slice(b"hel");
        expected.extend_from_slice(&4i32.to_be_bytes());
        expected.extend_from_slice(b"meta");
        assert_eq!(page.rows, vec![expected]);

        let page = provider.fetch_page("SELECT * FROM `55`", &[Field::BufferBytes], 0, 1).unwrap();
        assert_eq!(page.rows, vec![b"hello sensor".to_vec()]);
    }

    #[test]
    fn blob_shorter_than_its_length_skips_the_row() {
        let (dir, provider) = database_with(55, 3);
        let connection = Connection::open(dir.path().join("packets.db")).unwrap();
        connection.execute("UPDATE `55` SET bufferLen = 40 WHERE sequenceNumber = 1", []).unwrap();
        connection
            .execute("UPDATE `55` SET bufferTwoLen = -1 WHERE sequenceNumber = 2", [])
            .unwrap();

        let sql = "SELECT * FROM `55` ORDER BY sequenceNumber ASC";
        let page = provider.fetch_page(sql, &Field::ALL, 0, 10).unwrap();
        assert_eq!(page.scanned, 3);
        assert_eq!(page.rows.len(), 1);
    }

    #[test]
    fn reals_and_nulls_become_integers() {
        let (dir, provider) = database_with(55, 1);
        let connection = Connection::open(dir.path().join("packets.db")).unwrap();
        connection.execute("UPDATE `55` SET latitude = 36.8, longitude = NULL", []).unwrap();

        let columns = [Field::Latitude, Field::Longitude];
        let page = provider.fetch_page("SELECT * FROM `55`", &columns, 0, 1).unwrap();
        let mut expected = 36i64.to_be_bytes().to_vec();
        expected.extend_from_slice(&0i64.to_be_bytes());
        assert_eq!(page.rows, vec![expected]);
    }

    #[test]
    fn missing_table_is_a_query_error() {
        let (_dir, provider) = database_with(55, 1);
        let err = provider.fetch_page("SELECT * FROM `56`", &Field::ALL, 0, 1).unwrap_err();
        assert!(matches!(err, PacketError::Query { .. }));
        assert!(err.is_retryable());
    }
}
