//! Bulk creation and teardown of pre-split load-test tables.

use crate::catalog::ClusterAdmin;
use crate::descriptor::{format_row_key, TableSchema};
use crate::error::Result;

/// Tunables for table seeding. The delimiter joins prefix and index both
/// when building names and when matching them for a drop, so the two
/// sides cannot drift apart.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub delimiter: String,
    pub tables: usize,
    pub regions: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            delimiter: "_".to_string(),
            tables: 10,
            regions: 10,
        }
    }
}

/// Lowest and highest pre-split keys; interior boundaries interpolate
/// evenly between them.
const SEED_LOW_KEY: &[u8] = b"0000000000";
const SEED_HIGH_KEY: &[u8] = b"zzzzzzzzzz";

/// Column family every seeded table carries.
const SEED_FAMILY: &str = "family";

/// Creates `cfg.tables` pre-split tables named `<prefix><delimiter><index>`
/// and returns the names in creation order.
pub async fn create_tables(
    admin: &dyn ClusterAdmin,
    cfg: &SeedConfig,
    prefix: &str,
) -> Result<Vec<Vec<u8>>> {
    let mut created = Vec::with_capacity(cfg.tables);
    for index in 0..cfg.tables {
        let name = format!("{prefix}{}{index}", cfg.delimiter).into_bytes();
        let schema = TableSchema::new(name.clone(), vec![SEED_FAMILY.to_string()]);
        tracing::info!(
            table = %format_row_key(&name),
            nth = index + 1,
            total = cfg.tables,
            "creating table"
        );
        admin
            .create_table(&schema, SEED_LOW_KEY, SEED_HIGH_KEY, cfg.regions)
            .await?;
        created.push(name);
    }
    Ok(created)
}

/// Disables and deletes every table whose name starts with
/// `<prefix><delimiter>`. Returns the dropped names.
pub async fn drop_tables(
    admin: &dyn ClusterAdmin,
    cfg: &SeedConfig,
    prefix: &str,
) -> Result<Vec<Vec<u8>>> {
    let marker = format!("{prefix}{}", cfg.delimiter).into_bytes();
    let mut dropped = Vec::new();
    for schema in admin.list_tables().await? {
        if !schema.name.starts_with(&marker) {
            continue;
        }
        admin.disable_table(&schema.name).await?;
        admin.delete_table(&schema.name).await?;
        tracing::info!(table = %schema.name_string(), "dropped table");
        dropped.push(schema.name);
    }
    Ok(dropped)
}
