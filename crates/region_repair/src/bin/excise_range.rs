//! Remove every region overlapping a key range from a table's metadata.
//!
//! Removal converges across repeated runs: a pass that newly offlined
//! anything stops there so the cluster can observe the flags and
//! unassign; rerun the tool until it reports convergence.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use region_repair::catalog::{ClientTuning, LocalCluster, LocalFsProbe};
use region_repair::descriptor::format_range;
use region_repair::excise::{ExciseProcedure, ExciseRequest};

#[derive(Parser)]
#[command(name = "excise_range")]
#[command(about = "Remove every region overlapping a key range, archiving the descriptors")]
struct Args {
    /// Store data directory to operate on.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    /// Table owning the range.
    table: String,
    /// Start row of the range, inclusive.
    start_row: String,
    /// End row of the range, exclusive.
    end_row: String,
    /// Table that receives the removed descriptors.
    archive_table: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let tuning = ClientTuning::default();
    let cluster = Arc::new(
        LocalCluster::open(&args.data_dir, &tuning)
            .await
            .with_context(|| format!("open store at {}", args.data_dir.display()))?,
    );

    let request = ExciseRequest {
        table: args.table.clone().into_bytes(),
        start_key: args.start_row.clone().into_bytes(),
        end_key: args.end_row.clone().into_bytes(),
        archive_table: args.archive_table.clone().into_bytes(),
        storage_root: cluster.tables_root(),
    };
    let procedure = ExciseProcedure::new(
        cluster.clone(),
        cluster.clone(),
        Arc::new(cluster.archive(args.archive_table.as_bytes())),
        Arc::new(LocalFsProbe),
        request,
        &tuning,
    );

    procedure
        .check_preconditions()
        .await
        .context("precondition check failed")?;
    let report = procedure.run_pass().await?;
    cluster.flush()?;

    let range = format_range(args.start_row.as_bytes(), args.end_row.as_bytes());
    if report.converged() {
        println!(
            "converged: {} of {} is clear, {} region(s) removed this pass",
            range,
            args.table,
            report.removed.len()
        );
    } else {
        println!(
            "not converged: offlined {} region(s), {} pending; rerun once the cluster has caught up",
            report.offlined.len(),
            report.pending.len()
        );
    }
    for (key, err) in &report.failed {
        println!("failed to remove {}: {err}", String::from_utf8_lossy(key));
    }
    if !report.failed.is_empty() {
        anyhow::bail!("{} region removal(s) failed", report.failed.len());
    }
    Ok(())
}

fn init_tracing() {
    let use_ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(use_ansi)
        .init();
}
