//! Relational packet access.
//!
//! Each device has its own table named by its numeric id. A [`QuerySpec`]
//! describes which rows to read, [`build`] renders it as SQL for a
//! [`SqlDialect`], and a [`PagedCursor`] walks the results a page at a time
//! through a [`PageProvider`]. [`PacketTableReader`] ties these together and
//! yields [`Packet`](crate::Packet)s.

mod builder;
mod cursor;
mod query;
mod sqlite;
mod table;

pub use builder::{LAST_N_PLACEHOLDER, SqlDialect, build};
pub use cursor::{DEFAULT_PAGE_SIZE, Page, PageProvider, PagedCursor};
pub use query::{ColumnKind, DEFAULT_ORDERING, Field, Filter, QuerySpec, SortKey, SortOrder};
pub use sqlite::SqlitePageProvider;
pub use table::PacketTableReader;
