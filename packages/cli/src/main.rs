#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `amcr`: loads AMCR fieldwork events for an area as GeoJSON layers.
//!
//! Uses `indicatif-log-bridge` (via [`amcr_cli_utils::init_logger`]) so
//! log lines and progress bars never fight for the terminal.

use std::path::{Path, PathBuf};

use amcr_archive::export::write_collections;
use amcr_archive::query::Wgs84Extent;
use amcr_archive::{ArchiveConfig, HttpArchiveApi, TranslationCache, load};
use amcr_archive_models::{BoundingBox, FilterCategory, FilterCriteria, LoadStatus};
use amcr_cli_utils::{IndicatifProgress, MultiProgress};
use amcr_codelists::{CodelistStore, refresh_dynamic_vocabulary};
use clap::{Parser, Subcommand};

/// Extent used when the search is not limited to a viewport.
const CZECH_REPUBLIC: [f64; 4] = [12.09, 48.55, 18.86, 51.06];

#[derive(Parser)]
#[command(name = "amcr", about = "AMCR Digiarchiv fieldwork event loader")]
struct Cli {
    /// Directory holding `heslar.csv` and `vedouci.csv`
    #[arg(long, global = true, default_value = "codelists")]
    codelists: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load fieldwork events and write polygon, line and point layers
    Load {
        /// WGS-84 extent as `min_lon,min_lat,max_lon,max_lat`
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,
        /// Search the whole archive instead of the extent
        #[arg(long)]
        whole_archive: bool,
        /// Drop spatial units documented as negative findings
        #[arg(long)]
        positive_only: bool,
        /// Raw API filter as `key=code` (e.g. `f_kraj=CZ010`); repeatable
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        /// Codelist filter as `category=label` (e.g. `kraj=Praha`); repeatable
        #[arg(long = "category", value_parser = parse_key_value)]
        categories: Vec<(String, String)>,
        /// Output directory for the GeoJSON files
        #[arg(long, default_value = "amcr_output")]
        out: PathBuf,
    },
    /// Download the lead investigator list and reload it
    UpdateLeaders,
    /// List the labels and codes of one codelist category
    Codelist {
        /// Category (`kraj`, `okres`, `katastr`, `organizace`, `vedouci`,
        /// `obdobi`, `areal`, `typ_akce`)
        category: FilterCategory,
    },
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{v}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [x1, y1, x2, y2] => Ok(BoundingBox::new(*x1, *y1, *x2, *y2)),
        _ => Err(format!("expected 4 comma-separated numbers, got {}", values.len())),
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(format!("expected key=value, got '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Builds the filter criteria, resolving codelist labels to codes.
fn build_filters(
    store: &CodelistStore,
    whole_archive: bool,
    positive_only: bool,
    filters: &[(String, String)],
    categories: &[(String, String)],
) -> Result<FilterCriteria, String> {
    let mut builder = FilterCriteria::builder()
        .restrict_to_viewport(!whole_archive)
        .positive_findings_only(positive_only);

    for (key, code) in filters {
        builder = builder.select(key, [code.as_str()]);
    }
    for (category, label) in categories {
        let category: FilterCategory = category
            .parse()
            .map_err(|_| format!("unknown codelist category '{category}'"))?;
        let code = store.resolve(category, label);
        log::debug!("{category}: '{label}' -> '{code}'");
        builder = builder.select_category(category, [code]);
    }

    Ok(builder.build())
}

async fn run_load(
    multi: &MultiProgress,
    bbox: Option<BoundingBox>,
    filters: &FilterCriteria,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let extent = match bbox {
        Some(bbox) => bbox,
        None if !filters.restrict_to_viewport() => {
            let [x1, y1, x2, y2] = CZECH_REPUBLIC;
            BoundingBox::new(x1, y1, x2, y2)
        }
        None => return Err("--bbox is required unless --whole-archive is given".into()),
    };

    let config = ArchiveConfig::from_env()?;
    let api = HttpArchiveApi::new(&config)?;
    let translations = TranslationCache::new();
    let progress = IndicatifProgress::load_bar(multi, "Searching fieldwork events...");

    let report = load(
        &api,
        &config,
        &translations,
        extent,
        &Wgs84Extent,
        filters,
        &progress,
    )
    .await?;

    let diagnostics = &report.diagnostics;
    if let Some(reason) = &diagnostics.pagination_interrupted {
        log::warn!("Paging stopped early, results are partial: {reason}");
    }
    if diagnostics.events_truncated {
        log::warn!("Record limit of {} reached", config.paging.max_records);
    }
    if diagnostics.failed_batches > 0 {
        log::warn!("{} geometry batches failed", diagnostics.failed_batches);
    }
    if diagnostics.skipped_geometries > 0 {
        log::info!("{} spatial units skipped", diagnostics.skipped_geometries);
    }

    println!("{}", report.status);
    if let LoadStatus::Rendered { .. } = report.status {
        for (path, count) in write_collections(out, &report.features)? {
            println!("  {count:>6}  {}", path.display());
        }
    }

    Ok(())
}

async fn run_update_leaders(
    multi: &MultiProgress,
    store: &CodelistStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ArchiveConfig::from_env()?;
    let api = HttpArchiveApi::new(&config)?;
    let progress = IndicatifProgress::spinner(multi, "Downloading lead investigators...");

    let outcome = refresh_dynamic_vocabulary(&api, &config, store.dir()).await;
    progress.finish(outcome.message.clone());
    if !outcome.success {
        return Err(outcome.message.into());
    }

    let count = store.reload_dynamic()?;
    println!("{} Lead investigators loaded: {count}", outcome.message);
    Ok(())
}

fn print_codelist(store: &CodelistStore, category: FilterCategory) {
    let entries = store.lookup(category).snapshot();
    if entries.is_empty() {
        println!(
            "No entries for '{category}' in {}",
            store.dir().display()
        );
        return;
    }

    println!("{:<50} CODE", "LABEL");
    println!("{}", "-".repeat(70));
    for (label, code) in &entries {
        println!("{label:<50} {}", code.as_deref().unwrap_or("-"));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = amcr_cli_utils::init_logger();
    let cli = Cli::parse();
    let store = CodelistStore::open(&cli.codelists);

    match cli.command {
        Commands::Load {
            bbox,
            whole_archive,
            positive_only,
            filters,
            categories,
            out,
        } => {
            let criteria =
                build_filters(&store, whole_archive, positive_only, &filters, &categories)?;
            run_load(&multi, bbox, &criteria, &out).await?;
        }
        Commands::UpdateLeaders => run_update_leaders(&multi, &store).await?,
        Commands::Codelist { category } => print_codelist(&store, category),
    }

    Ok(())
}
