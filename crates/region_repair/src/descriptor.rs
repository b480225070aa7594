//! Region descriptors and the metadata row-key scheme.
//!
//! Every region of every table is described by one row in the metadata
//! table. The row key is `<table>,<start_key>,<region_id>` with the region
//! id rendered as a fixed-width decimal, so rows sort by table, then by
//! start key, then by creation time. Scan windows are built with the same
//! construction, which is what makes range scans over the metadata table
//! line up with region boundaries.

use serde::{Deserialize, Serialize};

use crate::error::{RepairError, Result};

/// Column family the catalog keeps descriptor state under.
pub const CATALOG_FAMILY: &str = "info";

/// Byte separating the row-key parts. Not a legal table-name byte, so the
/// first delimiter in a row key always ends the table name.
pub const ROW_KEY_DELIMITER: u8 = b',';

/// Width of the rendered region id. Region id zero rendered at this width
/// sorts before every real region id, which is what scan bounds rely on.
const REGION_ID_WIDTH: usize = 20;

/// Table schema carried inside every region descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: Vec<u8>,
    pub families: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl TableSchema {
    pub fn new(name: Vec<u8>, families: Vec<String>) -> Self {
        Self {
            name,
            families,
            disabled: false,
        }
    }

    pub fn has_family(&self, family: &str) -> bool {
        self.families.iter().any(|f| f == family)
    }

    pub fn name_string(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// One region of a table. Key ranges are lexicographic and end-exclusive;
/// an empty end key means the range is unbounded above, an empty start key
/// unbounded below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    pub table: TableSchema,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub region_id: u64,
    pub offline: bool,
}

impl RegionDescriptor {
    /// New online region with a creation-time region id.
    pub fn new(table: TableSchema, start_key: Vec<u8>, end_key: Vec<u8>) -> Self {
        Self {
            table,
            start_key,
            end_key,
            region_id: now_unix_ms(),
            offline: false,
        }
    }

    /// The metadata row key this descriptor lives under.
    pub fn row_key(&self) -> Vec<u8> {
        region_row_key(&self.table.name, &self.start_key, self.region_id)
    }

    /// True when this region spans exactly `[start, end)` of `table`.
    pub fn is_exact_range(&self, table: &[u8], start: &[u8], end: &[u8]) -> bool {
        self.table.name == table && self.start_key == start && self.end_key == end
    }

    pub fn display_name(&self) -> String {
        format_row_key(&self.row_key())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(RepairError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// One decoded metadata row.
#[derive(Debug, Clone)]
pub struct MetadataRow {
    pub row_key: Vec<u8>,
    pub descriptor: RegionDescriptor,
    /// Encoded descriptor exactly as stored. Archived verbatim on removal.
    pub descriptor_bytes: Vec<u8>,
    pub last_write_unix_ms: u64,
}

/// Checks a table name: non-empty, bytes from `[0-9a-zA-Z_.-]`, and the
/// first byte may not be `.` or `-`.
pub fn check_legal_table_name(name: &[u8]) -> Result<()> {
    let shown = || String::from_utf8_lossy(name).into_owned();
    if name.is_empty() {
        return Err(RepairError::IllegalTableName("(empty)".to_string()));
    }
    if name[0] == b'.' || name[0] == b'-' {
        return Err(RepairError::IllegalTableName(shown()));
    }
    for &b in name {
        match b {
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'.' | b'-' => {}
            _ => return Err(RepairError::IllegalTableName(shown())),
        }
    }
    Ok(())
}

/// Builds the metadata row key for a region. Passing region id zero yields
/// the lower bound of all rows for `(table, start_key)`; key bytes are
/// assumed to sort above the delimiter, as the store's key conventions
/// guarantee.
pub fn region_row_key(table: &[u8], start_key: &[u8], region_id: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.len() + start_key.len() + REGION_ID_WIDTH + 2);
    out.extend_from_slice(table);
    out.push(ROW_KEY_DELIMITER);
    out.extend_from_slice(start_key);
    out.push(ROW_KEY_DELIMITER);
    out.extend_from_slice(format!("{region_id:0width$}", width = REGION_ID_WIDTH).as_bytes());
    out
}

/// Splits a row key back into `(table, start_key, region_id)`.
///
/// The table ends at the first delimiter and the region id starts after the
/// last one; the id is all digits, so a delimiter inside the start key
/// cannot be mistaken for the final one.
pub fn parse_region_row_key(row_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>, u64)> {
    let malformed = |reason: &str| RepairError::Decode {
        row: format_row_key(row_key),
        reason: reason.to_string(),
    };
    let first = row_key
        .iter()
        .position(|&b| b == ROW_KEY_DELIMITER)
        .ok_or_else(|| malformed("no delimiter after table name"))?;
    let last = row_key
        .iter()
        .rposition(|&b| b == ROW_KEY_DELIMITER)
        .ok_or_else(|| malformed("no delimiter before region id"))?;
    if last <= first {
        return Err(malformed("missing start-key segment"));
    }
    let suffix = &row_key[last + 1..];
    if suffix.len() != REGION_ID_WIDTH || !suffix.iter().all(|b| b.is_ascii_digit()) {
        return Err(malformed("region id segment is not a fixed-width decimal"));
    }
    let id_text = std::str::from_utf8(suffix).map_err(|_| malformed("region id is not ascii"))?;
    let region_id = id_text
        .parse::<u64>()
        .map_err(|_| malformed("region id out of range"))?;
    Ok((
        row_key[..first].to_vec(),
        row_key[first + 1..last].to_vec(),
        region_id,
    ))
}

/// Row-key bounds covering every region of `table` and nothing else.
pub fn table_span(table: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut end = table.to_vec();
    end.push(ROW_KEY_DELIMITER + 1);
    (region_row_key(table, b"", 0), end)
}

pub(crate) fn now_unix_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Renders a key for humans: as-is when printable, hex otherwise.
pub fn format_key(key: &[u8]) -> String {
    if key.is_empty() {
        return String::new();
    }
    match std::str::from_utf8(key) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => text.to_string(),
        _ => format!("0x{}", hex_encode(key)),
    }
}

/// Renders a key range like `[a, m)`, with unbounded edges spelled out.
pub fn format_range(start: &[u8], end: &[u8]) -> String {
    match (start.is_empty(), end.is_empty()) {
        (true, true) => "all_keys".to_string(),
        (true, false) => format!("[start_of_table, {})", format_key(end)),
        (false, true) => format!("[{}, end_of_table)", format_key(start)),
        (false, false) => format!("[{}, {})", format_key(start), format_key(end)),
    }
}

pub fn format_row_key(row_key: &[u8]) -> String {
    match std::str::from_utf8(row_key) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => text.to_string(),
        _ => format!("0x{}", hex_encode(row_key)),
    }
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
