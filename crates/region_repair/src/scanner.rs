//! Ordered, early-terminating scan over one table's metadata rows.
//!
//! The window bounds are built with the zero-id row-key construction, so
//! they interleave correctly with real rows: the start bound sorts before
//! every region starting at the window's start key, and the end bound
//! sorts before every region starting at or past the end key. The scan
//! stops for good at the first row at or past the end bound; rows past it
//! are never fetched, let alone decoded.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::catalog::{MetaTable, RawMetaRow};
use crate::descriptor::{
    format_row_key, region_row_key, table_span, MetadataRow, RegionDescriptor,
};
use crate::error::{RepairError, Result};

pub struct MetadataRangeScanner {
    meta: Arc<dyn MetaTable>,
    window_start: Vec<u8>,
    window_end: Vec<u8>,
    cursor: Vec<u8>,
    batch: VecDeque<RawMetaRow>,
    /// Source returned a short page; nothing more to pull.
    exhausted: bool,
    /// Window end seen or source drained; `next_row` only returns `None`.
    done: bool,
    page: usize,
}

impl MetadataRangeScanner {
    /// Scanner over the regions of `table` whose start key falls in
    /// `[start_key, end_key)`. An empty `end_key` extends the window to
    /// the end of the table's rows.
    pub fn for_range(
        meta: Arc<dyn MetaTable>,
        table: &[u8],
        start_key: &[u8],
        end_key: &[u8],
        page: usize,
    ) -> Self {
        let window_start = region_row_key(table, start_key, 0);
        let window_end = if end_key.is_empty() {
            table_span(table).1
        } else {
            region_row_key(table, end_key, 0)
        };
        Self::with_bounds(meta, window_start, window_end, page)
    }

    /// Scanner over every region of `table`.
    pub fn for_table(meta: Arc<dyn MetaTable>, table: &[u8], page: usize) -> Self {
        let (window_start, window_end) = table_span(table);
        Self::with_bounds(meta, window_start, window_end, page)
    }

    fn with_bounds(
        meta: Arc<dyn MetaTable>,
        window_start: Vec<u8>,
        window_end: Vec<u8>,
        page: usize,
    ) -> Self {
        Self {
            meta,
            cursor: window_start.clone(),
            window_start,
            window_end,
            batch: VecDeque::new(),
            exhausted: false,
            done: false,
            page: page.max(1),
        }
    }

    /// Next in-window row, decoded. A row that cannot be decoded fails the
    /// whole scan; repair math on a partial picture is worse than none.
    pub async fn next_row(&mut self) -> Result<Option<MetadataRow>> {
        loop {
            if self.done {
                return Ok(None);
            }
            let raw = match self.batch.pop_front() {
                Some(raw) => raw,
                None => {
                    if self.exhausted {
                        self.done = true;
                        return Ok(None);
                    }
                    let rows = self.meta.scan_page(&self.cursor, self.page).await?;
                    if rows.len() < self.page {
                        self.exhausted = true;
                    }
                    match rows.last() {
                        Some(last) => {
                            self.cursor = last.row_key.clone();
                            self.cursor.push(0x00);
                        }
                        None => {
                            self.done = true;
                            return Ok(None);
                        }
                    }
                    self.batch = rows.into();
                    continue;
                }
            };

            // A coarse source may hand back rows from before the window;
            // they are dropped without decoding.
            if raw.row_key.as_slice() < self.window_start.as_slice() {
                continue;
            }
            if raw.row_key.as_slice() >= self.window_end.as_slice() {
                self.done = true;
                self.batch.clear();
                return Ok(None);
            }

            let descriptor =
                RegionDescriptor::decode(&raw.value).map_err(|err| RepairError::Decode {
                    row: format_row_key(&raw.row_key),
                    reason: err.to_string(),
                })?;
            return Ok(Some(MetadataRow {
                row_key: raw.row_key,
                descriptor,
                descriptor_bytes: raw.value,
                last_write_unix_ms: raw.last_write_unix_ms,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::catalog::MemoryCluster;
    use crate::descriptor::{TableSchema, CATALOG_FAMILY};

    fn schema(name: &str) -> TableSchema {
        TableSchema::new(name.as_bytes().to_vec(), vec![CATALOG_FAMILY.to_string()])
    }

    fn region(table: &str, start: &str, end: &str, id: u64) -> RegionDescriptor {
        RegionDescriptor {
            table: schema(table),
            start_key: start.as_bytes().to_vec(),
            end_key: end.as_bytes().to_vec(),
            region_id: id,
            offline: false,
        }
    }

    async fn drain(scanner: &mut MetadataRangeScanner) -> Vec<Vec<u8>> {
        let mut starts = Vec::new();
        while let Some(row) = scanner.next_row().await.expect("scan") {
            starts.push(row.descriptor.start_key.clone());
        }
        starts
    }

    /// Counts upstream page pulls.
    struct CountingMeta {
        inner: Arc<MemoryCluster>,
        pulls: Mutex<usize>,
    }

    #[async_trait]
    impl MetaTable for CountingMeta {
        async fn scan_page(&self, from: &[u8], limit: usize) -> Result<Vec<RawMetaRow>> {
            *self.pulls.lock().unwrap() += 1;
            self.inner.scan_page(from, limit).await
        }

        async fn get(&self, row_key: &[u8]) -> Result<Option<RawMetaRow>> {
            self.inner.get(row_key).await
        }

        async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()> {
            self.inner.put(row_key, descriptor_bytes).await
        }

        async fn delete(&self, row_key: &[u8]) -> Result<()> {
            self.inner.delete(row_key).await
        }
    }

    /// Ignores `from` and always scans from the first row, emulating a
    /// source that starts coarser than the requested window.
    struct CoarseMeta {
        inner: Arc<MemoryCluster>,
    }

    #[async_trait]
    impl MetaTable for CoarseMeta {
        async fn scan_page(&self, _from: &[u8], limit: usize) -> Result<Vec<RawMetaRow>> {
            self.inner.scan_page(b"", limit).await
        }

        async fn get(&self, row_key: &[u8]) -> Result<Option<RawMetaRow>> {
            self.inner.get(row_key).await
        }

        async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()> {
            self.inner.put(row_key, descriptor_bytes).await
        }

        async fn delete(&self, row_key: &[u8]) -> Result<()> {
            self.inner.delete(row_key).await
        }
    }

    #[tokio::test]
    async fn yields_only_window_rows_in_order() {
        let cluster = MemoryCluster::new();
        for desc in [
            region("aaa", "x", "y", 1),
            region("orders", "a", "e", 2),
            region("orders", "e", "m", 3),
            region("orders", "m", "t", 4),
            region("orders", "t", "z", 5),
            region("zzz", "a", "b", 6),
        ] {
            cluster.put_region(&desc).expect("seed");
        }

        let mut scanner =
            MetadataRangeScanner::for_range(cluster.clone(), b"orders", b"e", b"t", 2);
        assert_eq!(drain(&mut scanner).await, vec![b"e".to_vec(), b"m".to_vec()]);
    }

    #[tokio::test]
    async fn stops_pulling_after_window_end() {
        let cluster = MemoryCluster::new();
        for (i, start) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
            cluster
                .put_region(&region("orders", start, "x", i as u64 + 1))
                .expect("seed");
        }
        let meta = Arc::new(CountingMeta {
            inner: cluster,
            pulls: Mutex::new(0),
        });

        let mut scanner = MetadataRangeScanner::for_range(meta.clone(), b"orders", b"a", b"c", 1);
        assert_eq!(drain(&mut scanner).await, vec![b"a".to_vec(), b"b".to_vec()]);
        // One pull per yielded row plus the pull that hit the end bound.
        assert_eq!(*meta.pulls.lock().unwrap(), 3);

        assert!(scanner.next_row().await.expect("idempotent end").is_none());
        assert_eq!(*meta.pulls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn corrupt_in_window_row_fails_the_scan() {
        let cluster = MemoryCluster::new();
        cluster
            .put_region(&region("orders", "a", "m", 1))
            .expect("seed");
        cluster
            .put(&region_row_key(b"orders", b"m", 2), b"not a descriptor")
            .await
            .expect("seed corrupt");

        let mut scanner = MetadataRangeScanner::for_table(cluster.clone(), b"orders", 16);
        assert!(scanner.next_row().await.expect("first is fine").is_some());
        let err = scanner.next_row().await.expect_err("corrupt row");
        assert!(matches!(err, RepairError::Decode { .. }));
    }

    #[tokio::test]
    async fn rows_below_the_window_are_skipped_without_decoding() {
        let cluster = MemoryCluster::new();
        // Corrupt row below the window start; a scan that tried to decode
        // it would fail.
        cluster
            .put(&region_row_key(b"orders", b"a", 1), b"garbage")
            .await
            .expect("seed corrupt");
        cluster
            .put_region(&region("orders", "e", "m", 2))
            .expect("seed");
        cluster
            .put_region(&region("orders", "m", "t", 3))
            .expect("seed");

        let meta = Arc::new(CoarseMeta { inner: cluster });
        let mut scanner = MetadataRangeScanner::for_range(meta, b"orders", b"e", b"t", 64);
        assert_eq!(drain(&mut scanner).await, vec![b"e".to_vec(), b"m".to_vec()]);
    }

    #[tokio::test]
    async fn empty_end_key_reaches_the_end_of_the_table() {
        let cluster = MemoryCluster::new();
        cluster
            .put_region(&region("orders", "e", "m", 1))
            .expect("seed");
        cluster
            .put_region(&region("orders", "m", "", 2))
            .expect("seed");
        cluster
            .put_region(&region("post", "a", "b", 3))
            .expect("seed");

        let mut scanner =
            MetadataRangeScanner::for_range(cluster.clone(), b"orders", b"e", b"", 64);
        assert_eq!(drain(&mut scanner).await, vec![b"e".to_vec(), b"m".to_vec()]);
    }

    #[tokio::test]
    async fn table_span_includes_unbounded_start_region() {
        let cluster = MemoryCluster::new();
        cluster
            .put_region(&region("before", "a", "b", 1))
            .expect("seed");
        cluster.put_region(&region("orders", "", "m", 2)).expect("seed");
        cluster.put_region(&region("orders", "m", "", 3)).expect("seed");
        cluster.put_region(&region("post", "a", "b", 4)).expect("seed");

        let mut scanner = MetadataRangeScanner::for_table(cluster.clone(), b"orders", 64);
        assert_eq!(drain(&mut scanner).await, vec![b"".to_vec(), b"m".to_vec()]);
    }
}
