use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tcgcsv_client::{decode_envelope, TcgCsvClient, TcgGroup};
use tracing::{info, warn};

use optcg_prices::config::{parse_set_codes, SyncConfig, CONFIG_KEYS};
use optcg_prices::models::{RawPrice, RawProduct};
use optcg_prices::pipeline::registry::group_set_code;
use optcg_prices::pipeline::sink::write_json_atomic;
use optcg_prices::pipeline::snapshot::save_groups;
use optcg_prices::pipeline::{
    sync_sets, CatalogRegistry, CatalogSource, GroupRegistry, JsonFileSink, RecordingSource,
    SetStatus, SnapshotSource, StaticRegistry, TcgCsvSource,
};
use optcg_prices::reconcile::assemble::assemble;
use optcg_prices::reconcile::{reconcile_group, ReconcileOptions};
use optcg_prices::tracing::{init_tracing, DEFAULT_FILTER};
use optcg_prices::util::env;

#[derive(Parser, Debug)]
#[command(name = "optcg", version, about = "One Piece card price reconciliation")]
struct Cli {
    /// Include file/line locations in log output
    #[arg(long, short, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Fetch, reconcile and write one JSON file per set
    Sync {
        /// Set codes, comma separated (overrides SET_CODES; default: every known set)
        #[arg(long, value_delimiter = ',')]
        sets: Vec<String>,
        /// Output directory (overrides OUT_DIR)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Catalog category id (overrides TCG_CATEGORY_ID)
        #[arg(long)]
        category: Option<i64>,
        /// Sets processed at once (overrides SYNC_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Emit metadata-only records for products without a price row
        #[arg(long, action = ArgAction::SetTrue)]
        include_unpriced: bool,
        /// Read listings from a local snapshot instead of the network
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
        /// Save every fetched listing under this directory
        #[arg(long)]
        save_snapshots: Option<PathBuf>,
    },
    /// Reconcile one group from local product/price files
    Reconcile {
        #[arg(long)]
        products: PathBuf,
        #[arg(long)]
        prices: PathBuf,
        #[arg(long)]
        group_id: i64,
        #[arg(long)]
        set_code: String,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, action = ArgAction::SetTrue)]
        include_unpriced: bool,
    },
    /// List catalog groups and the set code each maps to
    Groups {
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env::bootstrap_cli("optcg");
    init_tracing(DEFAULT_FILTER, cli.verbose)?;

    match cli.command {
        Commands::Sync {
            sets,
            out_dir,
            category,
            concurrency,
            include_unpriced,
            snapshot_dir,
            save_snapshots,
        } => {
            env::preflight_check("optcg sync", &[], &CONFIG_KEYS)?;
            let mut cfg = SyncConfig::from_env()?;
            if !sets.is_empty() {
                cfg.set_codes = parse_set_codes(&sets.join(","));
            }
            if let Some(dir) = out_dir {
                cfg.out_dir = dir;
            }
            if let Some(id) = category {
                cfg.category_id = id;
            }
            if let Some(n) = concurrency {
                cfg.concurrency = n.max(1);
            }
            cfg.include_unpriced |= include_unpriced;
            run_sync(cfg, snapshot_dir, save_snapshots).await?;
        }
        Commands::Reconcile {
            products,
            prices,
            group_id,
            set_code,
            out,
            include_unpriced,
        } => {
            let products: Vec<RawProduct> = read_listing(&products)?;
            let prices: Vec<RawPrice> = read_listing(&prices)?;
            let opts = ReconcileOptions { include_unpriced };
            let result = assemble(
                &set_code,
                group_id,
                reconcile_group(group_id, &products, &prices, &opts),
            );
            match out {
                Some(path) => {
                    write_json_atomic(&path, &result.cards)?;
                    info!(path = %path.display(), records = result.len(), "reconcile: written");
                }
                None => println!("{}", serde_json::to_string_pretty(&result.cards)?),
            }
        }
        Commands::Groups {
            category,
            snapshot_dir,
        } => {
            let mut cfg = SyncConfig::from_env()?;
            if let Some(id) = category {
                cfg.category_id = id;
            }
            let groups = load_groups(&cfg, snapshot_dir.as_deref()).await?;
            for g in &groups {
                println!(
                    "{:>6}  {:<8}  {}{}",
                    g.group_id,
                    group_set_code(g).unwrap_or_else(|| "-".into()),
                    g.name,
                    if g.is_supplemental { " (supplemental)" } else { "" }
                );
            }
        }
    }
    Ok(())
}

fn read_listing<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let body =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    decode_envelope(&body).with_context(|| format!("decode {}", path.display()))
}

async fn load_groups(cfg: &SyncConfig, snapshot_dir: Option<&Path>) -> Result<Vec<TcgGroup>> {
    match snapshot_dir {
        Some(dir) => SnapshotSource::new(dir).groups().await,
        None => {
            let client = TcgCsvClient::new(cfg.client_config())?;
            TcgCsvSource::new(client).groups().await
        }
    }
}

async fn run_sync(
    cfg: SyncConfig,
    snapshot_dir: Option<PathBuf>,
    save_snapshots: Option<PathBuf>,
) -> Result<()> {
    let mut source: Box<dyn CatalogSource> = match &snapshot_dir {
        Some(dir) => Box::new(SnapshotSource::new(dir)),
        None => Box::new(TcgCsvSource::new(TcgCsvClient::new(cfg.client_config())?)),
    };

    let registry: Box<dyn GroupRegistry> = match load_groups(&cfg, snapshot_dir.as_deref()).await
    {
        Ok(groups) => {
            if let Some(dir) = &save_snapshots {
                save_groups(dir, &groups)?;
            }
            let registry = CatalogRegistry::from_groups(groups).with_overrides(&cfg.set_groups);
            info!(
                sets = registry.set_codes().len(),
                unmapped = registry.unmapped.len(),
                "sync: catalog groups loaded"
            );
            Box::new(registry)
        }
        Err(e) if !cfg.set_groups.is_empty() => {
            warn!(
                error = %format!("{e:#}"),
                "sync: group listing unavailable; using SET_GROUPS only"
            );
            Box::new(StaticRegistry::new(cfg.set_groups.clone()))
        }
        Err(e) => return Err(e.context("group listing unavailable and SET_GROUPS is empty")),
    };

    if let Some(dir) = save_snapshots {
        source = Box::new(RecordingSource::new(source, dir));
    }

    let sink = JsonFileSink::new(&cfg.out_dir);
    let summary = sync_sets(
        &cfg.set_codes,
        registry.as_ref(),
        source.as_ref(),
        &sink,
        &cfg.reconcile_options(),
        cfg.concurrency,
    )
    .await?;

    for outcome in &summary.outcomes {
        match &outcome.status {
            SetStatus::Written { path, records } => {
                println!(
                    "{:<8} ok      {:>5} records  {}",
                    outcome.set_code,
                    records,
                    path.display()
                )
            }
            SetStatus::Failed(err) => println!("{:<8} FAILED  {}", outcome.set_code, err),
        }
    }
    if summary.all_failed() {
        bail!("every requested set failed");
    }
    Ok(())
}
