//! Typed description of a device table query.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A column of a device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    SsdsPacketVersion,
    #[serde(rename = "parentID")]
    ParentId,
    PacketType,
    PacketSubType,
    #[serde(rename = "dataDescriptionID")]
    DataDescriptionId,
    DataDescriptionVersion,
    TimestampSeconds,
    TimestampNanoseconds,
    SequenceNumber,
    BufferLen,
    BufferBytes,
    BufferTwoLen,
    BufferTwoBytes,
    Latitude,
    Longitude,
    Depth,
}

/// How a column is serialized into a row's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Big-endian `i32`.
    Int,
    /// Big-endian `i64`.
    Long,
    /// Raw bytes; the matching length column precedes them.
    Bytes,
}

impl Field {
    /// Every column, in default projection order.
    pub const ALL: [Field; 16] = [
        Field::SsdsPacketVersion,
        Field::ParentId,
        Field::PacketType,
        Field::PacketSubType,
        Field::DataDescriptionId,
        Field::DataDescriptionVersion,
        Field::TimestampSeconds,
        Field::TimestampNanoseconds,
        Field::SequenceNumber,
        Field::BufferLen,
        Field::BufferBytes,
        Field::BufferTwoLen,
        Field::BufferTwoBytes,
        Field::Latitude,
        Field::Longitude,
        Field::Depth,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Field::SsdsPacketVersion => "ssdsPacketVersion",
            Field::ParentId => "parentID",
            Field::PacketType => "packetType",
            Field::PacketSubType => "packetSubType",
            Field::DataDescriptionId => "dataDescriptionID",
            Field::DataDescriptionVersion => "dataDescriptionVersion",
            Field::TimestampSeconds => "timestampSeconds",
            Field::TimestampNanoseconds => "timestampNanoseconds",
            Field::SequenceNumber => "sequenceNumber",
            Field::BufferLen => "bufferLen",
            Field::BufferBytes => "bufferBytes",
            Field::BufferTwoLen => "bufferTwoLen",
            Field::BufferTwoBytes => "bufferTwoBytes",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Depth => "depth",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Field::SsdsPacketVersion
            | Field::PacketType
            | Field::BufferLen
            | Field::BufferTwoLen => ColumnKind::Int,
            Field::BufferBytes | Field::BufferTwoBytes => ColumnKind::Bytes,
            _ => ColumnKind::Long,
        }
    }

    /// Look up a column by its table name.
    pub fn from_column_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.column_name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// A filter on one column.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter<T> {
    #[default]
    Unset,
    Equals(T),
    /// Inclusive on both ends.
    Range(T, T),
}

impl<T> Filter<T> {
    pub fn is_set(&self) -> bool {
        !matches!(self, Filter::Unset)
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> Filter<U> {
        match self {
            Filter::Unset => Filter::Unset,
            Filter::Equals(value) => Filter::Equals(f(value)),
            Filter::Range(low, high) => Filter::Range(f(low), f(high)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A column and the direction to sort it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: Field,
    pub order: SortOrder,
}

/// Ordering used until the first explicit sort key is added.
pub const DEFAULT_ORDERING: [SortKey; 2] = [
    SortKey { field: Field::TimestampSeconds, order: SortOrder::Asc },
    SortKey { field: Field::TimestampNanoseconds, order: SortOrder::Asc },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Ordering {
    Default,
    Explicit(Vec<SortKey>),
}

/// A query against one device's table.
///
/// ```rust
/// use ssds_packets::sql::{Field, Filter, QuerySpec, SortOrder};
///
/// let spec = QuerySpec::for_device(55)
///     .timestamp_seconds(Filter::Range(1000, 2000))
///     .order_by(Field::SequenceNumber, SortOrder::Desc);
/// assert_eq!(spec.device_id(), 55);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    device_id: i64,
    #[serde(default)]
    pub packet_version: Filter<i32>,
    #[serde(default)]
    pub parent_id: Filter<i64>,
    #[serde(default)]
    pub packet_type: Filter<i32>,
    #[serde(default)]
    pub packet_sub_type: Filter<i64>,
    #[serde(default)]
    pub data_description_id: Filter<i64>,
    #[serde(default)]
    pub data_description_version: Filter<i64>,
    #[serde(default)]
    pub timestamp_seconds: Filter<i64>,
    #[serde(default)]
    pub timestamp_nanoseconds: Filter<i64>,
    #[serde(default)]
    pub sequence_number: Filter<i64>,
    #[serde(default)]
    pub latitude: Filter<f64>,
    #[serde(default)]
    pub longitude: Filter<f64>,
    #[serde(default)]
    pub depth: Filter<f32>,
    #[serde(default)]
    pub last_n: Option<u32>,
    #[serde(default = "default_ordering")]
    ordering: Ordering,
    #[serde(default)]
    projection: Vec<Field>,
}

fn default_ordering() -> Ordering {
    Ordering::Default
}

macro_rules! filter_setter {
    ($(#[$doc:meta])* $name:ident: $ty:ty) => {
        $(#[$doc])*
        pub fn $name(mut self, filter: Filter<$ty>) -> Self {
            self.$name = filter;
            self
        }
    };
}

impl QuerySpec {
    pub fn for_device(device_id: i64) -> Self {
        Self {
            device_id,
            packet_version: Filter::Unset,
            parent_id: Filter::Unset,
            packet_type: Filter::Unset,
            packet_sub_type: Filter::Unset,
            data_description_id: Filter::Unset,
            data_description_version: Filter::Unset,
            timestamp_seconds: Filter::Unset,
            timestamp_nanoseconds: Filter::Unset,
            sequence_number: Filter::Unset,
            latitude: Filter::Unset,
            longitude: Filter::Unset,
            depth: Filter::Unset,
            last_n: None,
            ordering: Ordering::Default,
            projection: Vec::new(),
        }
    }

    pub fn device_id(&self) -> i64 {
        self.device_id
    }

    filter_setter!(packet_version: i32);
    filter_setter!(parent_id: i64);
    filter_setter!(packet_type: i32);
    filter_setter!(packet_sub_type: i64);
    filter_setter!(data_description_id: i64);
    filter_setter!(data_description_version: i64);
    filter_setter!(
        /// Filter on whole seconds since the epoch.
        timestamp_seconds: i64
    );
    filter_setter!(
        /// Filter on the sub-second part of the timestamp, in nanoseconds.
        timestamp_nanoseconds: i64
    );
    filter_setter!(sequence_number: i64);
    filter_setter!(latitude: f64);
    filter_setter!(longitude: f64);
    filter_setter!(depth: f32);

    /// Restrict to timestamps between two epoch-millisecond instants,
    /// widening to whole seconds.
    pub fn between_millis(self, start: i64, end: i64) -> Self {
        self.timestamp_seconds(Filter::Range(start.div_euclid(1000), end.div_euclid(1000)))
    }

    /// Only the newest `count` packets, using the dialect's last-N templates.
    pub fn last(mut self, count: u32) -> Self {
        self.last_n = Some(count);
        self
    }

    /// Add a sort key. The first explicit key replaces the default ordering.
    pub fn order_by(mut self, field: Field, order: SortOrder) -> Self {
        let key = SortKey { field, order };
        match self.ordering {
            Ordering::Default => self.ordering = Ordering::Explicit(vec![key]),
            Ordering::Explicit(ref mut keys) => keys.push(key),
        }
        self
    }

    /// Restore the default ordering.
    pub fn clear_order_by(mut self) -> Self {
        self.ordering = Ordering::Default;
        self
    }

    /// Emit no ORDER BY clause at all.
    pub fn unordered(mut self) -> Self {
        self.ordering = Ordering::Explicit(Vec::new());
        self
    }

    /// Effective sort keys, in order.
    pub fn sort_keys(&self) -> &[SortKey] {
        match &self.ordering {
            Ordering::Default => &DEFAULT_ORDERING[..],
            Ordering::Explicit(keys) => keys.as_slice(),
        }
    }

    /// Add a column to the projection. Duplicates are ignored.
    pub fn select(mut self, field: Field) -> Self {
        if !self.projection.contains(&field) {
            self.projection.push(field);
        }
        self
    }

    /// Return to selecting every column.
    pub fn select_all(mut self) -> Self {
        self.projection.clear();
        self
    }

    /// Whether the projection is the default (`*`).
    pub fn selects_all(&self) -> bool {
        self.projection.is_empty()
    }

    /// Columns each row will contain, in order.
    pub fn columns(&self) -> &[Field] {
        if self.projection.is_empty() { &Field::ALL[..] } else { self.projection.as_slice() }
    }
}
