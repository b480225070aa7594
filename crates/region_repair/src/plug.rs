//! Hole plugging: synthesize one region descriptor to cover a gap left in
//! a table's key space, usually after an excision.

use std::sync::Arc;

use crate::catalog::{ClientTuning, MetaTable};
use crate::descriptor::{check_legal_table_name, format_range, format_row_key, RegionDescriptor};
use crate::error::{RepairError, Result};
use crate::scanner::MetadataRangeScanner;

/// Request to fill a key-space hole with one new region. The keys must be
/// actual region boundaries; the tool cannot tell a hole from the middle
/// of a live region.
#[derive(Debug, Clone)]
pub struct PlugRequest {
    pub table: Vec<u8>,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
}

pub struct PlugProcedure {
    meta: Arc<dyn MetaTable>,
    request: PlugRequest,
    scan_batch: usize,
}

impl PlugProcedure {
    pub fn new(meta: Arc<dyn MetaTable>, request: PlugRequest, tuning: &ClientTuning) -> Self {
        Self {
            meta,
            request,
            scan_batch: tuning.scan_batch,
        }
    }

    /// Inserts the hole-plugging region and returns its descriptor.
    ///
    /// Fails with `Conflict` when any region of the table, online or not,
    /// already starts at the hole's start key. The check and the insert
    /// are two separate steps; a region appearing in between goes
    /// unnoticed.
    pub async fn run(&self) -> Result<RegionDescriptor> {
        let req = &self.request;
        check_legal_table_name(&req.table)?;
        tracing::info!(
            table = %format_row_key(&req.table),
            range = %format_range(&req.start_key, &req.end_key),
            "plugging hole"
        );

        let mut scanner = MetadataRangeScanner::for_range(
            self.meta.clone(),
            &req.table,
            &req.start_key,
            &req.end_key,
            self.scan_batch,
        );
        while let Some(row) = scanner.next_row().await? {
            let desc = &row.descriptor;
            if desc.table.name == req.table && desc.start_key == req.start_key {
                return Err(RepairError::Conflict(desc.display_name()));
            }
        }

        // Any region of the table can donate the schema for the new one.
        let mut siblings =
            MetadataRangeScanner::for_table(self.meta.clone(), &req.table, self.scan_batch);
        let Some(template) = siblings.next_row().await? else {
            return Err(RepairError::Configuration(format!(
                "table {} has no regions to copy a schema from",
                format_row_key(&req.table)
            )));
        };

        let hole = RegionDescriptor::new(
            template.descriptor.table,
            req.start_key.clone(),
            req.end_key.clone(),
        );
        self.meta.put(&hole.row_key(), &hole.encode()?).await?;
        tracing::info!(region = %hole.display_name(), "added hole-plugging region");
        Ok(hole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCluster;
    use crate::descriptor::{TableSchema, CATALOG_FAMILY};

    fn orders_schema() -> TableSchema {
        TableSchema::new(
            b"orders".to_vec(),
            vec![CATALOG_FAMILY.to_string(), "payload".to_string()],
        )
    }

    fn region(start: &str, end: &str, id: u64, offline: bool) -> RegionDescriptor {
        RegionDescriptor {
            table: orders_schema(),
            start_key: start.as_bytes().to_vec(),
            end_key: end.as_bytes().to_vec(),
            region_id: id,
            offline,
        }
    }

    fn procedure(cluster: &Arc<MemoryCluster>, start: &str, end: &str) -> PlugProcedure {
        PlugProcedure::new(
            cluster.clone(),
            PlugRequest {
                table: b"orders".to_vec(),
                start_key: start.as_bytes().to_vec(),
                end_key: end.as_bytes().to_vec(),
            },
            &ClientTuning::default(),
        )
    }

    #[tokio::test]
    async fn plugs_hole_with_sibling_schema() {
        let cluster = MemoryCluster::new();
        cluster.put_region(&region("m", "z", 1, false)).expect("seed");

        let hole = procedure(&cluster, "a", "m").run().await.expect("plug");
        assert_eq!(hole.start_key, b"a");
        assert_eq!(hole.end_key, b"m");
        assert!(!hole.offline);
        assert_eq!(hole.table, orders_schema());

        let row = cluster
            .get(&hole.row_key())
            .await
            .expect("get")
            .expect("row present");
        let stored = RegionDescriptor::decode(&row.value).expect("decode");
        assert_eq!(stored, hole);
    }

    #[tokio::test]
    async fn occupied_start_key_is_a_conflict() {
        let cluster = MemoryCluster::new();
        cluster.put_region(&region("a", "m", 1, false)).expect("seed");

        let err = procedure(&cluster, "a", "m").run().await.expect_err("conflict");
        assert!(matches!(err, RepairError::Conflict(_)));
        assert!(err.to_string().contains("already a region in the gap"));
    }

    #[tokio::test]
    async fn offline_occupant_still_conflicts() {
        let cluster = MemoryCluster::new();
        cluster.put_region(&region("a", "m", 1, true)).expect("seed");

        let err = procedure(&cluster, "a", "m").run().await.expect_err("conflict");
        assert!(matches!(err, RepairError::Conflict(_)));
    }

    #[tokio::test]
    async fn second_plug_conflicts_with_the_first() {
        let cluster = MemoryCluster::new();
        cluster.put_region(&region("z", "", 1, false)).expect("seed");

        procedure(&cluster, "a", "m").run().await.expect("first plug");
        let err = procedure(&cluster, "a", "m")
            .run()
            .await
            .expect_err("second plug");
        assert!(matches!(err, RepairError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_the_start_key_collides() {
        let cluster = MemoryCluster::new();
        // A region starting inside the hole, but not at its start, does
        // not block the plug.
        cluster.put_region(&region("e", "m", 1, false)).expect("seed");

        let hole = procedure(&cluster, "a", "z").run().await.expect("plug");
        assert_eq!(hole.start_key, b"a");
        assert_eq!(hole.end_key, b"z");
    }

    #[tokio::test]
    async fn empty_table_is_a_configuration_error() {
        let cluster = MemoryCluster::new();
        let err = procedure(&cluster, "a", "m").run().await.expect_err("no schema");
        assert!(matches!(err, RepairError::Configuration(_)));
    }
}
