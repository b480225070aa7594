//! Catalog access behind trait seams.
//!
//! The repair procedures only ever talk to [`MetaTable`], [`ClusterAdmin`],
//! [`ArchiveTable`] and [`StoragePathProbe`]. Two backends live here:
//! [`LocalCluster`] opens a store data directory with fjall and mutates the
//! catalog partitions in place, and [`MemoryCluster`] keeps everything in
//! maps for tests.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};

use crate::descriptor::{
    check_legal_table_name, format_row_key, hex_encode, now_unix_ms, RegionDescriptor,
    TableSchema, CATALOG_FAMILY, ROW_KEY_DELIMITER,
};
use crate::error::{RepairError, Result};

const META_PARTITION: &str = "region_meta";
const SCHEMA_PARTITION: &str = "table_schemas";
const ASSIGN_PARTITION: &str = "region_assign";

/// One raw metadata cell as stored: row key, encoded descriptor bytes and
/// the time the row was last written.
#[derive(Debug, Clone)]
pub struct RawMetaRow {
    pub row_key: Vec<u8>,
    pub value: Vec<u8>,
    pub last_write_unix_ms: u64,
}

/// Administrative surface of the cluster.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Create `regions` pre-split regions for a new table between `low_key`
    /// and `high_key`. The lowest and highest regions are unbounded.
    async fn create_table(
        &self,
        schema: &TableSchema,
        low_key: &[u8],
        high_key: &[u8],
        regions: usize,
    ) -> Result<()>;

    async fn disable_table(&self, name: &[u8]) -> Result<()>;

    /// Drop a disabled table, its metadata rows and its stored data.
    async fn delete_table(&self, name: &[u8]) -> Result<()>;

    async fn list_tables(&self) -> Result<Vec<TableSchema>>;

    /// Ask the cluster to stop serving the region stored under `row_key`.
    /// Closing a region nobody serves is not an error.
    async fn close_region(&self, row_key: &[u8]) -> Result<()>;
}

/// Row-level access to the metadata table. Scans are ordered by row key.
#[async_trait]
pub trait MetaTable: Send + Sync {
    /// Up to `limit` rows with row key `>= from`, ascending.
    async fn scan_page(&self, from: &[u8], limit: usize) -> Result<Vec<RawMetaRow>>;

    async fn get(&self, row_key: &[u8]) -> Result<Option<RawMetaRow>>;

    /// Write a row; the stored timestamp is the write time.
    async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()>;

    async fn delete(&self, row_key: &[u8]) -> Result<()>;
}

/// Access to one archive table.
#[async_trait]
pub trait ArchiveTable: Send + Sync {
    /// Read a row. This doubles as the reachability probe: implementations
    /// fail with `Configuration` when the table or its catalog family is
    /// missing, even for a row that does not exist.
    async fn get(&self, row_key: &[u8]) -> Result<Option<Vec<u8>>>;

    async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()>;
}

/// Filesystem checks for table storage directories.
pub trait StoragePathProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn is_directory(&self, path: &Path) -> bool;
}

/// Probe backed by the local filesystem.
pub struct LocalFsProbe;

impl StoragePathProbe for LocalFsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Client-side patience for a cluster that may be slow to respond. The
/// repair tools retry at a fixed pause rather than backing off, and the
/// attempt budget is large because metadata moves can take a while.
#[derive(Debug, Clone, Copy)]
pub struct ClientTuning {
    /// Fixed pause between attempts.
    pub retry_pause: Duration,
    /// Attempts before a failure surfaces as `Transient`.
    pub retries: u32,
    /// Rows fetched per metadata scan page.
    pub scan_batch: usize,
}

impl Default for ClientTuning {
    fn default() -> Self {
        Self {
            retry_pause: Duration::from_millis(500),
            retries: 100,
            scan_batch: 64,
        }
    }
}

/// Runs `op` until it succeeds or the attempt budget is spent. The final
/// failure is wrapped in `Transient` with the attempt count.
pub async fn with_retries<T, F, Fut>(tuning: &ClientTuning, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = tuning.retries.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt < attempts {
                    if attempt == 1 {
                        tracing::warn!(what, error = %err, "call failed, will retry");
                    } else {
                        tracing::debug!(what, attempt, error = %err, "call failed, will retry");
                    }
                    tokio::time::sleep(tuning.retry_pause).await;
                }
                last = Some(err);
            }
        }
    }
    Err(RepairError::Transient {
        attempts,
        last: last.map(|e| e.to_string()).unwrap_or_default(),
    })
}

/// Full boundary list for a pre-split table: an unbounded low edge, `low`,
/// evenly interpolated interior keys, `high`, and an unbounded high edge.
/// `regions` counts the ranges between consecutive boundaries.
fn region_boundaries(low: &[u8], high: &[u8], regions: usize) -> Result<Vec<Vec<u8>>> {
    if regions < 3 {
        return Err(RepairError::Configuration(format!(
            "pre-split needs at least 3 regions, got {regions}"
        )));
    }
    if low >= high {
        return Err(RepairError::Configuration(
            "low split key must sort before high split key".to_string(),
        ));
    }
    let width = low.len().max(high.len());
    if width > 16 {
        return Err(RepairError::Configuration(
            "split keys longer than 16 bytes are not supported".to_string(),
        ));
    }
    let lo = key_value(low, width);
    let hi = key_value(high, width);
    let interior = regions - 3;
    let step = (hi - lo) / (interior as u128 + 1);
    if step == 0 && interior > 0 {
        return Err(RepairError::Configuration(format!(
            "key range {} too narrow for {} interior splits",
            crate::descriptor::format_range(low, high),
            interior
        )));
    }

    let mut bounds = Vec::with_capacity(regions + 1);
    bounds.push(Vec::new());
    bounds.push(low.to_vec());
    for i in 1..=interior {
        bounds.push(value_key(lo + step * i as u128, width));
    }
    bounds.push(high.to_vec());
    bounds.push(Vec::new());
    Ok(bounds)
}

/// Key bytes as a big-endian integer, right-padded with zero bytes.
fn key_value(key: &[u8], width: usize) -> u128 {
    let mut value = 0u128;
    for i in 0..width {
        value = (value << 8) | u128::from(key.get(i).copied().unwrap_or(0));
    }
    value
}

fn value_key(value: u128, width: usize) -> Vec<u8> {
    let mut out = vec![0u8; width];
    let mut v = value;
    for slot in out.iter_mut().rev() {
        *slot = (v & 0xff) as u8;
        v >>= 8;
    }
    out
}

fn encode_meta_value(timestamp_ms: u64, descriptor_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + descriptor_bytes.len());
    out.extend_from_slice(&timestamp_ms.to_be_bytes());
    out.extend_from_slice(descriptor_bytes);
    out
}

fn decode_meta_value(row_key: &[u8], framed: &[u8]) -> Result<RawMetaRow> {
    if framed.len() < 8 {
        return Err(RepairError::Decode {
            row: format_row_key(row_key),
            reason: "value shorter than its timestamp frame".to_string(),
        });
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&framed[..8]);
    Ok(RawMetaRow {
        row_key: row_key.to_vec(),
        value: framed[8..].to_vec(),
        last_write_unix_ms: u64::from_be_bytes(ts),
    })
}

fn archive_partition_name(table: &[u8]) -> String {
    // fjall's partition-name alphabet is narrower than legal table names,
    // so the table name is hex-encoded.
    format!("t_{}", hex_encode(table))
}

/// Direct catalog access to a store data directory.
///
/// This is the offline-surgery backend: it opens the store's keyspace and
/// mutates the same partitions the serving nodes read. Run it against a
/// stopped node, or accept that a live node races the surgery.
pub struct LocalCluster {
    keyspace: Keyspace,
    meta: PartitionHandle,
    schemas: PartitionHandle,
    assignments: PartitionHandle,
    data_dir: PathBuf,
}

impl LocalCluster {
    pub async fn open(data_dir: impl Into<PathBuf>, tuning: &ClientTuning) -> Result<Self> {
        let data_dir = data_dir.into();
        // Another process holding the keyspace lock shows up as an open
        // failure; wait it out within the retry budget.
        let keyspace = with_retries(tuning, "open store keyspace", || {
            let path = data_dir.clone();
            async move { Ok(fjall::Config::new(&path).open()?) }
        })
        .await?;
        let meta = keyspace.open_partition(META_PARTITION, PartitionCreateOptions::default())?;
        let schemas =
            keyspace.open_partition(SCHEMA_PARTITION, PartitionCreateOptions::default())?;
        let assignments =
            keyspace.open_partition(ASSIGN_PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            meta,
            schemas,
            assignments,
            data_dir,
        })
    }

    /// Root directory holding one storage directory per table.
    pub fn tables_root(&self) -> PathBuf {
        self.data_dir.join("tables")
    }

    /// Handle on one archive table. Construction is cheap; existence and
    /// schema are checked on every read and write.
    pub fn archive(&self, table: &[u8]) -> LocalArchive {
        LocalArchive {
            keyspace: self.keyspace.clone(),
            schemas: self.schemas.clone(),
            table: table.to_vec(),
        }
    }

    /// Marks the region as held by `node`. Serving nodes write these
    /// entries; the repair tools only remove them.
    pub fn assign_region(&self, row_key: &[u8], node: &[u8]) -> Result<()> {
        self.assignments.insert(row_key, node)?;
        Ok(())
    }

    /// Assignment marker for the region, if any node holds it.
    pub fn assignment(&self, row_key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.assignments.get(row_key)?.map(|v| v.to_vec()))
    }

    /// Flush everything to disk. Call once before the process exits.
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn read_schema(&self, name: &[u8]) -> Result<Option<TableSchema>> {
        match self.schemas.get(name)? {
            None => Ok(None),
            Some(raw) => {
                let schema =
                    serde_json::from_slice(&raw).map_err(|err| RepairError::Decode {
                        row: format_row_key(name),
                        reason: err.to_string(),
                    })?;
                Ok(Some(schema))
            }
        }
    }

    fn write_schema(&self, schema: &TableSchema) -> Result<()> {
        let raw = serde_json::to_vec(schema).map_err(RepairError::Encode)?;
        self.schemas.insert(schema.name.as_slice(), raw)?;
        Ok(())
    }

    fn table_prefix(name: &[u8]) -> Vec<u8> {
        let mut prefix = name.to_vec();
        prefix.push(ROW_KEY_DELIMITER);
        prefix
    }
}

#[async_trait]
impl MetaTable for LocalCluster {
    async fn scan_page(&self, from: &[u8], limit: usize) -> Result<Vec<RawMetaRow>> {
        let mut rows = Vec::new();
        for item in self.meta.range(from.to_vec()..).take(limit) {
            let (key, framed) = item?;
            rows.push(decode_meta_value(&key, &framed)?);
        }
        Ok(rows)
    }

    async fn get(&self, row_key: &[u8]) -> Result<Option<RawMetaRow>> {
        match self.meta.get(row_key)? {
            None => Ok(None),
            Some(framed) => Ok(Some(decode_meta_value(row_key, &framed)?)),
        }
    }

    async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()> {
        self.meta
            .insert(row_key, encode_meta_value(now_unix_ms(), descriptor_bytes))?;
        Ok(())
    }

    async fn delete(&self, row_key: &[u8]) -> Result<()> {
        self.meta.remove(row_key)?;
        Ok(())
    }
}

#[async_trait]
impl ClusterAdmin for LocalCluster {
    async fn create_table(
        &self,
        schema: &TableSchema,
        low_key: &[u8],
        high_key: &[u8],
        regions: usize,
    ) -> Result<()> {
        check_legal_table_name(&schema.name)?;
        if self.read_schema(&schema.name)?.is_some() {
            return Err(RepairError::Configuration(format!(
                "table {} already exists",
                schema.name_string()
            )));
        }
        let bounds = region_boundaries(low_key, high_key, regions)?;

        let schema_raw = serde_json::to_vec(schema).map_err(RepairError::Encode)?;
        let mut batch = self.keyspace.batch();
        batch.insert(&self.schemas, schema.name.clone(), schema_raw);
        for pair in bounds.windows(2) {
            let desc = RegionDescriptor::new(schema.clone(), pair[0].clone(), pair[1].clone());
            batch.insert(
                &self.meta,
                desc.row_key(),
                encode_meta_value(now_unix_ms(), &desc.encode()?),
            );
        }
        batch.commit()?;

        std::fs::create_dir_all(self.tables_root().join(schema.name_string()))?;
        tracing::info!(table = %schema.name_string(), regions, "created table");
        Ok(())
    }

    async fn disable_table(&self, name: &[u8]) -> Result<()> {
        let mut schema = self
            .read_schema(name)?
            .ok_or_else(|| RepairError::UnknownTable(format_row_key(name)))?;
        schema.disabled = true;
        self.write_schema(&schema)?;
        tracing::info!(table = %schema.name_string(), "disabled table");
        Ok(())
    }

    async fn delete_table(&self, name: &[u8]) -> Result<()> {
        let schema = self
            .read_schema(name)?
            .ok_or_else(|| RepairError::UnknownTable(format_row_key(name)))?;
        if !schema.disabled {
            return Err(RepairError::Configuration(format!(
                "table {} must be disabled before delete",
                schema.name_string()
            )));
        }

        // Collect the doomed keys first, then remove in one batch.
        let prefix = Self::table_prefix(name);
        let mut doomed = Vec::new();
        for item in self.meta.prefix(prefix.clone()) {
            let (key, _) = item?;
            doomed.push(key.to_vec());
        }
        let mut stale_assignments = Vec::new();
        for item in self.assignments.prefix(prefix) {
            let (key, _) = item?;
            stale_assignments.push(key.to_vec());
        }

        let mut batch = self.keyspace.batch();
        for key in &doomed {
            batch.remove(&self.meta, key.clone());
        }
        for key in &stale_assignments {
            batch.remove(&self.assignments, key.clone());
        }
        batch.remove(&self.schemas, name.to_vec());
        batch.commit()?;

        let archive = self
            .keyspace
            .open_partition(&archive_partition_name(name), PartitionCreateOptions::default())?;
        self.keyspace.delete_partition(archive)?;

        let dir = self.tables_root().join(schema.name_string());
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        tracing::info!(table = %schema.name_string(), regions = doomed.len(), "deleted table");
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<TableSchema>> {
        let mut tables = Vec::new();
        for item in self.schemas.iter() {
            let (key, raw) = item?;
            let schema = serde_json::from_slice(&raw).map_err(|err| RepairError::Decode {
                row: format_row_key(&key),
                reason: err.to_string(),
            })?;
            tables.push(schema);
        }
        Ok(tables)
    }

    async fn close_region(&self, row_key: &[u8]) -> Result<()> {
        self.assignments.remove(row_key)?;
        tracing::debug!(region = %format_row_key(row_key), "dropped assignment");
        Ok(())
    }
}

/// Archive accessor bound to one table. The backing partition is only
/// created once a validated write happens.
pub struct LocalArchive {
    keyspace: Keyspace,
    schemas: PartitionHandle,
    table: Vec<u8>,
}

impl LocalArchive {
    fn check_reachable(&self) -> Result<()> {
        let raw = self.schemas.get(&self.table)?.ok_or_else(|| {
            RepairError::Configuration(format!(
                "archive table {} does not exist",
                format_row_key(&self.table)
            ))
        })?;
        let schema: TableSchema =
            serde_json::from_slice(&raw).map_err(|err| RepairError::Decode {
                row: format_row_key(&self.table),
                reason: err.to_string(),
            })?;
        if !schema.has_family(CATALOG_FAMILY) {
            return Err(RepairError::Configuration(format!(
                "archive table {} lacks the {CATALOG_FAMILY} family",
                schema.name_string()
            )));
        }
        Ok(())
    }

    fn partition(&self) -> Result<PartitionHandle> {
        Ok(self.keyspace.open_partition(
            &archive_partition_name(&self.table),
            PartitionCreateOptions::default(),
        )?)
    }
}

#[async_trait]
impl ArchiveTable for LocalArchive {
    async fn get(&self, row_key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_reachable()?;
        Ok(self.partition()?.get(row_key)?.map(|v| v.to_vec()))
    }

    async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()> {
        self.check_reachable()?;
        self.partition()?.insert(row_key, descriptor_bytes)?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    meta: BTreeMap<Vec<u8>, (u64, Vec<u8>)>,
    schemas: BTreeMap<Vec<u8>, TableSchema>,
    archives: BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>,
}

/// In-memory catalog with the same surface as the fjall backend. Unit
/// tests drive the repair procedures against it and inspect what happened.
#[derive(Default)]
pub struct MemoryCluster {
    state: RwLock<MemoryState>,
    closed: Mutex<Vec<Vec<u8>>>,
    close_errors: Mutex<HashMap<Vec<u8>, String>>,
}

impl MemoryCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a table without creating any regions.
    pub fn add_table(&self, schema: TableSchema) {
        let mut state = self.state.write().unwrap();
        state.schemas.insert(schema.name.clone(), schema);
    }

    /// Seed one metadata row from a descriptor.
    pub fn put_region(&self, desc: &RegionDescriptor) -> Result<()> {
        let bytes = desc.encode()?;
        let mut state = self.state.write().unwrap();
        state.meta.insert(desc.row_key(), (now_unix_ms(), bytes));
        Ok(())
    }

    /// Row keys passed to `close_region`, in call order.
    pub fn closed_regions(&self) -> Vec<Vec<u8>> {
        self.closed.lock().unwrap().clone()
    }

    /// Make the next `close_region` calls for `row_key` fail.
    pub fn fail_close(&self, row_key: &[u8], message: &str) {
        self.close_errors
            .lock()
            .unwrap()
            .insert(row_key.to_vec(), message.to_string());
    }

    pub fn archive(self: &Arc<Self>, table: &[u8]) -> MemoryArchive {
        MemoryArchive {
            cluster: Arc::clone(self),
            table: table.to_vec(),
        }
    }

    fn check_archive_reachable(state: &MemoryState, table: &[u8]) -> Result<()> {
        let schema = state.schemas.get(table).ok_or_else(|| {
            RepairError::Configuration(format!(
                "archive table {} does not exist",
                format_row_key(table)
            ))
        })?;
        if !schema.has_family(CATALOG_FAMILY) {
            return Err(RepairError::Configuration(format!(
                "archive table {} lacks the {CATALOG_FAMILY} family",
                schema.name_string()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MetaTable for MemoryCluster {
    async fn scan_page(&self, from: &[u8], limit: usize) -> Result<Vec<RawMetaRow>> {
        let state = self.state.read().unwrap();
        Ok(state
            .meta
            .range(from.to_vec()..)
            .take(limit)
            .map(|(key, (ts, value))| RawMetaRow {
                row_key: key.clone(),
                value: value.clone(),
                last_write_unix_ms: *ts,
            })
            .collect())
    }

    async fn get(&self, row_key: &[u8]) -> Result<Option<RawMetaRow>> {
        let state = self.state.read().unwrap();
        Ok(state.meta.get(row_key).map(|(ts, value)| RawMetaRow {
            row_key: row_key.to_vec(),
            value: value.clone(),
            last_write_unix_ms: *ts,
        }))
    }

    async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state
            .meta
            .insert(row_key.to_vec(), (now_unix_ms(), descriptor_bytes.to_vec()));
        Ok(())
    }

    async fn delete(&self, row_key: &[u8]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.meta.remove(row_key);
        Ok(())
    }
}

#[async_trait]
impl ClusterAdmin for MemoryCluster {
    async fn create_table(
        &self,
        schema: &TableSchema,
        low_key: &[u8],
        high_key: &[u8],
        regions: usize,
    ) -> Result<()> {
        check_legal_table_name(&schema.name)?;
        let bounds = region_boundaries(low_key, high_key, regions)?;
        let mut state = self.state.write().unwrap();
        if state.schemas.contains_key(&schema.name) {
            return Err(RepairError::Configuration(format!(
                "table {} already exists",
                schema.name_string()
            )));
        }
        state.schemas.insert(schema.name.clone(), schema.clone());
        for pair in bounds.windows(2) {
            let desc = RegionDescriptor::new(schema.clone(), pair[0].clone(), pair[1].clone());
            let bytes = desc.encode()?;
            state.meta.insert(desc.row_key(), (now_unix_ms(), bytes));
        }
        Ok(())
    }

    async fn disable_table(&self, name: &[u8]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        match state.schemas.get_mut(name) {
            Some(schema) => {
                schema.disabled = true;
                Ok(())
            }
            None => Err(RepairError::UnknownTable(format_row_key(name))),
        }
    }

    async fn delete_table(&self, name: &[u8]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let schema = state
            .schemas
            .get(name)
            .ok_or_else(|| RepairError::UnknownTable(format_row_key(name)))?;
        if !schema.disabled {
            return Err(RepairError::Configuration(format!(
                "table {} must be disabled before delete",
                schema.name_string()
            )));
        }
        let mut prefix = name.to_vec();
        prefix.push(ROW_KEY_DELIMITER);
        let doomed: Vec<Vec<u8>> = state
            .meta
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            state.meta.remove(&key);
        }
        state.schemas.remove(name);
        state.archives.remove(name);
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<TableSchema>> {
        let state = self.state.read().unwrap();
        Ok(state.schemas.values().cloned().collect())
    }

    async fn close_region(&self, row_key: &[u8]) -> Result<()> {
        if let Some(message) = self.close_errors.lock().unwrap().get(row_key) {
            return Err(RepairError::Transient {
                attempts: 1,
                last: message.clone(),
            });
        }
        self.closed.lock().unwrap().push(row_key.to_vec());
        Ok(())
    }
}

pub struct MemoryArchive {
    cluster: Arc<MemoryCluster>,
    table: Vec<u8>,
}

#[async_trait]
impl ArchiveTable for MemoryArchive {
    async fn get(&self, row_key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.cluster.state.read().unwrap();
        MemoryCluster::check_archive_reachable(&state, &self.table)?;
        Ok(state
            .archives
            .get(&self.table)
            .and_then(|rows| rows.get(row_key))
            .cloned())
    }

    async fn put(&self, row_key: &[u8], descriptor_bytes: &[u8]) -> Result<()> {
        let mut state = self.cluster.state.write().unwrap();
        MemoryCluster::check_archive_reachable(&state, &self.table)?;
        state
            .archives
            .entry(self.table.clone())
            .or_default()
            .insert(row_key.to_vec(), descriptor_bytes.to_vec());
        Ok(())
    }
}
