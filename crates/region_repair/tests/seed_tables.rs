//! Seeding and dropping load-test tables against a real store directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use region_repair::bulk::{self, SeedConfig};
use region_repair::catalog::{ClientTuning, ClusterAdmin, LocalCluster};
use region_repair::descriptor::{RegionDescriptor, TableSchema};
use region_repair::scanner::MetadataRangeScanner;

fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "region_repair_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .subsec_nanos()
    ))
}

fn quick_tuning() -> ClientTuning {
    ClientTuning {
        retry_pause: Duration::from_millis(1),
        retries: 3,
        scan_batch: 8,
    }
}

async fn table_regions(cluster: &Arc<LocalCluster>, table: &[u8]) -> Vec<RegionDescriptor> {
    let mut scanner = MetadataRangeScanner::for_table(cluster.clone(), table, 16);
    let mut regions = Vec::new();
    while let Some(row) = scanner.next_row().await.expect("scan") {
        regions.push(row.descriptor);
    }
    regions
}

#[tokio::test]
async fn seeded_tables_are_pre_split_and_droppable() {
    let dir = temp_dir("seed");
    let tuning = quick_tuning();
    let cluster = Arc::new(LocalCluster::open(&dir, &tuning).await.expect("open"));

    let cfg = SeedConfig {
        delimiter: "_".to_string(),
        tables: 3,
        regions: 4,
    };
    let created = bulk::create_tables(cluster.as_ref(), &cfg, "load")
        .await
        .expect("create");
    assert_eq!(
        created,
        vec![b"load_0".to_vec(), b"load_1".to_vec(), b"load_2".to_vec()]
    );

    let tables = cluster.list_tables().await.expect("list");
    assert_eq!(tables.len(), 3);
    for name in &created {
        let regions = table_regions(&cluster, name).await;
        assert_eq!(regions.len(), 4);
        assert!(regions[0].start_key.is_empty());
        assert_eq!(regions[1].start_key, b"0000000000");
        assert_eq!(regions[3].start_key, b"zzzzzzzzzz");
        assert!(regions[3].end_key.is_empty());
        for pair in regions.windows(2) {
            assert_eq!(pair[0].end_key, pair[1].start_key, "regions must abut");
        }
        let name_text = String::from_utf8_lossy(name).into_owned();
        assert!(cluster.tables_root().join(name_text).is_dir());
    }

    let dropped = bulk::drop_tables(cluster.as_ref(), &cfg, "load")
        .await
        .expect("drop");
    assert_eq!(dropped.len(), 3);
    assert!(cluster.list_tables().await.expect("list").is_empty());
    for name in &created {
        assert!(table_regions(&cluster, name).await.is_empty());
        let name_text = String::from_utf8_lossy(name).into_owned();
        assert!(!cluster.tables_root().join(name_text).exists());
    }

    cluster.flush().expect("flush");
    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[tokio::test]
async fn drop_leaves_other_tables_alone() {
    let dir = temp_dir("scoped_drop");
    let tuning = quick_tuning();
    let cluster = Arc::new(LocalCluster::open(&dir, &tuning).await.expect("open"));

    let cfg = SeedConfig {
        delimiter: "_".to_string(),
        tables: 2,
        regions: 3,
    };
    bulk::create_tables(cluster.as_ref(), &cfg, "load")
        .await
        .expect("create");
    let bystander = TableSchema::new(b"inventory".to_vec(), vec!["family".to_string()]);
    cluster
        .create_table(&bystander, b"a", b"z", 3)
        .await
        .expect("bystander");

    let dropped = bulk::drop_tables(cluster.as_ref(), &cfg, "load")
        .await
        .expect("drop");
    assert_eq!(dropped, vec![b"load_0".to_vec(), b"load_1".to_vec()]);

    let remaining = cluster.list_tables().await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, b"inventory");
    assert_eq!(table_regions(&cluster, b"inventory").await.len(), 3);
    assert!(cluster.tables_root().join("inventory").is_dir());

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[tokio::test]
async fn seeded_layout_survives_reopen() {
    let dir = temp_dir("reopen");
    let tuning = quick_tuning();
    {
        let cluster = Arc::new(LocalCluster::open(&dir, &tuning).await.expect("open"));
        let cfg = SeedConfig {
            delimiter: "_".to_string(),
            tables: 1,
            regions: 5,
        };
        bulk::create_tables(cluster.as_ref(), &cfg, "load")
            .await
            .expect("create");
        cluster.flush().expect("flush");
    }
    {
        let cluster = Arc::new(LocalCluster::open(&dir, &tuning).await.expect("reopen"));
        let regions = table_regions(&cluster, b"load_0").await;
        assert_eq!(regions.len(), 5);
        let tables = cluster.list_tables().await.expect("list");
        assert_eq!(tables.len(), 1);
        assert!(!tables[0].disabled);
    }
    std::fs::remove_dir_all(&dir).expect("cleanup");
}
