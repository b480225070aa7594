//! Create batches of pre-split load-test tables, or drop them again.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use region_repair::bulk::{self, SeedConfig};
use region_repair::catalog::{ClientTuning, LocalCluster};

#[derive(Parser)]
#[command(name = "seed_tables")]
#[command(about = "Create batches of pre-split tables for load tests, or drop them")]
struct Args {
    /// Store data directory to operate on.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    /// Drop matching tables instead of creating.
    #[arg(long)]
    drop: bool,
    /// Tables to create.
    #[arg(long, default_value_t = 10)]
    tables: usize,
    /// Pre-split regions per table.
    #[arg(long, default_value_t = 10)]
    regions: usize,
    /// Verbose logging.
    #[arg(long)]
    debug: bool,
    /// Table name prefix.
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let Some(prefix) = args.prefix else {
        Args::command().print_help()?;
        println!();
        std::process::exit(1);
    };

    let tuning = ClientTuning::default();
    let cluster = LocalCluster::open(&args.data_dir, &tuning)
        .await
        .with_context(|| format!("open store at {}", args.data_dir.display()))?;

    let cfg = SeedConfig {
        tables: args.tables,
        regions: args.regions,
        ..SeedConfig::default()
    };
    if args.drop {
        let dropped = bulk::drop_tables(&cluster, &cfg, &prefix).await?;
        cluster.flush()?;
        println!("dropped {} table(s)", dropped.len());
    } else {
        let created = bulk::create_tables(&cluster, &cfg, &prefix).await?;
        cluster.flush()?;
        println!(
            "created {} table(s) with {} regions each",
            created.len(),
            cfg.regions
        );
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let use_ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_ansi(use_ansi)
        .init();
}
