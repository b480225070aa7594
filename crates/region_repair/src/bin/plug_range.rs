//! Plug a hole in a table's region metadata with one synthesized region.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use region_repair::catalog::{ClientTuning, LocalCluster};
use region_repair::plug::{PlugProcedure, PlugRequest};

#[derive(Parser)]
#[command(name = "plug_range")]
#[command(about = "Insert a region descriptor covering a hole in a table's key space")]
#[command(
    after_help = "START_ROW and END_ROW must be actual region boundary keys; \
the tool cannot tell a hole from the middle of a live region."
)]
struct Args {
    /// Store data directory to operate on.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    /// Table with the hole.
    table: String,
    /// Start row of the hole.
    start_row: String,
    /// End row of the hole.
    end_row: String,
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

    let procedure = PlugProcedure::new(
        cluster.clone(),
        PlugRequest {
            table: args.table.clone().into_bytes(),
            start_key: args.start_row.into_bytes(),
            end_key: args.end_row.into_bytes(),
        },
        &tuning,
    );
    let hole = procedure.run().await?;
    cluster.flush()?;

    println!("plugged {} with {}", args.table, hole.display_name());
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
