//! Command implementations for the weave-netcdf CLI
//!
//! Sets up logging and configuration, dispatches to the library and prints
//! coloured summaries.

use crate::cache::{ConversionCache, scan_cache};
use crate::cli::{Args, Commands, ConvertArgs, ExportArgs, PathArgs, SourceArgs};
use crate::combine::CombinedDataset;
use crate::config::{CacheConfig, DiscoveryConfig};
use crate::discovery::list_source_files;
use crate::models::CacheSummary;
use crate::progress::{NoProgress, ProgressObserver, ProgressReporter};
use crate::readers::ReaderRegistry;
use anyhow::{Context, Result, bail};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Run the command selected on the command line
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let config = load_configuration(&args)?;
    let registry = ReaderRegistry::weave_l2();

    match &args.command {
        Some(Commands::Convert(convert)) => run_convert(&args, &config, &registry, convert).await,
        Some(Commands::Open(convert)) => run_open(&args, &config, &registry, convert).await,
        Some(Commands::Export(export)) => run_export(&args, &config, &registry, export).await,
        Some(Commands::Path(path)) => run_path(&config, &registry, path),
        Some(Commands::Scan) => run_scan(&args, &config, &registry),
        Some(Commands::Readers) => {
            run_readers(&registry);
            Ok(())
        }
        None => bail!("No command given, see --help"),
    }
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("weave_netcdf={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Cache settings from the environment, overridden by flags
fn load_configuration(args: &Args) -> Result<CacheConfig> {
    let mut config = CacheConfig::resolve(args.cache_root.as_deref())
        .context("Failed to resolve the cache root")?
        .with_progress(!args.no_progress && !args.quiet);
    if let Some(concurrency) = args.concurrency {
        config = config.with_max_concurrent_files(concurrency);
    }
    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

fn progress_observer(config: &CacheConfig) -> Box<dyn ProgressObserver> {
    if config.progress {
        Box::new(ProgressReporter::default())
    } else {
        Box::new(NoProgress)
    }
}

/// Explicit files, or files discovered under the survey root
fn resolve_sources(sources: &SourceArgs) -> Result<Vec<PathBuf>> {
    if !sources.files.is_empty() {
        return Ok(sources.files.clone());
    }

    let discovery = DiscoveryConfig::resolve(sources.survey_root.as_deref())
        .context("No source files given and no survey root to discover them in")?;
    let query = sources.query();
    let files = list_source_files(&discovery.survey_root, &query)
        .with_context(|| format!("Failed to list files under {}", discovery.survey_root.display()))?;
    if files.is_empty() {
        bail!(
            "No files match {}",
            query.pattern(&discovery.survey_root)
        );
    }
    info!("Discovered {} source files", files.len());
    Ok(files)
}

async fn run_convert(
    args: &Args,
    config: &CacheConfig,
    registry: &ReaderRegistry,
    convert: &ConvertArgs,
) -> Result<()> {
    let start = Instant::now();
    let reader = registry.get(&convert.reader)?;
    let sources = resolve_sources(&convert.sources)?;
    let cache = ConversionCache::new(config.clone());
    let progress = progress_observer(config);

    if convert.keep_going {
        let report = cache
            .ensure_cached_collect(reader, &sources, progress.as_ref())
            .await;
        if !args.quiet {
            println!("\n{}", "Conversion Summary".bright_green().bold());
            println!("  {} {}", "Artifacts ready:".bright_cyan(), report.outcomes.len());
            println!("  {} {}", "Converted:".bright_cyan(), report.converted());
            println!("  {} {}", "Already cached:".bright_cyan(), report.hits());
            println!(
                "  {} {:.2} s",
                "Time elapsed:".bright_cyan(),
                report.elapsed_ms as f64 / 1000.0
            );
            for failure in &report.failures {
                println!(
                    "  {} {}: {}",
                    "Failed:".bright_red(),
                    failure.source.display(),
                    failure.error
                );
            }
        }
        if !report.is_complete() {
            bail!("{} of {} files failed", report.failures.len(), sources.len());
        }
        return Ok(());
    }

    let paths = cache
        .ensure_cached_many(reader, &sources, progress.as_ref())
        .await
        .context("Conversion stopped")?;

    if !args.quiet {
        println!("\n{}", "Conversion Summary".bright_green().bold());
        println!("  {} {}", "Artifacts ready:".bright_cyan(), paths.len());
        println!("  {} {}", "Cache root:".bright_cyan(), cache.root().display());
        println!(
            "  {} {:.2} s",
            "Time elapsed:".bright_cyan(),
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

async fn load_combined(
    config: &CacheConfig,
    registry: &ReaderRegistry,
    reader: &str,
    sources: &SourceArgs,
) -> Result<CombinedDataset> {
    let reader = registry.get(reader)?;
    let sources = resolve_sources(sources)?;
    let cache = ConversionCache::new(config.clone());
    let progress = progress_observer(config);
    let combined = cache
        .load(reader, &sources, progress.as_ref())
        .await
        .context("Failed to load the combined dataset")?;
    Ok(combined)
}

async fn run_open(
    args: &Args,
    config: &CacheConfig,
    registry: &ReaderRegistry,
    convert: &ConvertArgs,
) -> Result<()> {
    let combined = load_combined(config, registry, &convert.reader, &convert.sources).await?;
    if !args.quiet {
        describe(&combined);
    }
    Ok(())
}

fn describe(combined: &CombinedDataset) {
    println!("\n{}", "Combined Dataset".bright_green().bold());
    println!("  {} {}", "Files:".bright_cyan(), combined.len());
    println!(
        "  {} {:.2} s",
        "Opened in:".bright_cyan(),
        combined.open_elapsed().as_secs_f64()
    );

    println!("  {}", "Dimensions:".bright_cyan());
    for (name, size) in combined.dims() {
        println!("    {:<24} {}", name, size);
    }

    println!("  {}", "Coordinates:".bright_cyan());
    for name in combined.coord_names() {
        println!("    {}", name);
    }

    println!("  {}", "Variables:".bright_cyan());
    for variable in combined.variables() {
        println!(
            "    {:<24} {:<8} ({}) [{}]{}",
            variable.name,
            variable.dtype.to_string(),
            variable.dims.join(", "),
            variable.unit.as_deref().unwrap_or("-"),
            if variable.files.len() < combined.len() {
                format!(" in {} of {} files", variable.files.len(), combined.len())
                    .yellow()
                    .to_string()
            } else {
                String::new()
            }
        );
    }
}

async fn run_export(
    args: &Args,
    config: &CacheConfig,
    registry: &ReaderRegistry,
    export: &ExportArgs,
) -> Result<()> {
    let combined = load_combined(config, registry, &export.reader, &export.sources).await?;
    let rows = combined
        .export_parquet(&export.vars, &export.output)
        .await
        .with_context(|| format!("Failed to export to {}", export.output.display()))?;

    if !args.quiet {
        println!("\n{}", "Export Summary".bright_green().bold());
        println!("  {} {}", "Output:".bright_cyan(), export.output.display());
        println!("  {} {}", "Rows:".bright_cyan(), rows);
        println!("  {} {}", "Variables:".bright_cyan(), export.vars.join(", "));
    }
    Ok(())
}

fn run_path(config: &CacheConfig, registry: &ReaderRegistry, path: &PathArgs) -> Result<()> {
    let reader = registry.get(&path.reader)?;
    let cache = ConversionCache::new(config.clone());
    println!("{}", cache.canonical_path(reader.as_ref(), &path.file).display());
    Ok(())
}

fn run_scan(args: &Args, config: &CacheConfig, registry: &ReaderRegistry) -> Result<()> {
    let tables: Vec<String> = registry.iter().map(|r| r.table_name()).collect();
    let summary = scan_cache(&config.cache_root, &tables)
        .with_context(|| format!("Failed to scan {}", config.cache_root.display()))?;
    if !args.quiet {
        print_cache_summary(&summary);
    }
    Ok(())
}

fn print_cache_summary(summary: &CacheSummary) {
    println!("\n{}", "Cache Summary".bright_green().bold());
    println!("  {} {}", "Root:".bright_cyan(), summary.root.display());
    println!("  {} {}", "Artifacts:".bright_cyan(), summary.artifact_count());
    println!(
        "  {} {}",
        "Total size:".bright_cyan(),
        format_size(summary.total_bytes)
    );
    for (table, stats) in &summary.tables {
        println!(
            "    {:<16} {:>8} files {:>12}",
            table,
            stats.artifacts,
            format_size(stats.bytes)
        );
    }
    if summary.unrecognised > 0 {
        println!("  {} {}", "Unrecognised:".yellow(), summary.unrecognised);
    }
    for partial in &summary.partial_files {
        println!("  {} {}", "Partial write:".yellow(), partial.display());
    }
}

fn run_readers(registry: &ReaderRegistry) {
    println!("{}", "Available readers".bright_green().bold());
    for reader in registry.iter() {
        println!(
            "  {:<20} {}",
            reader.name().bright_cyan(),
            reader.table_name()
        );
    }
}

/// Format a byte count in human-readable units
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
