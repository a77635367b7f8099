use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sheaf_client::{MarketplaceClientFactory, ProfileStore};
use sheaf_core::artifacts::MERGED_CATALOG_FILE;
use sheaf_core::progress::TracingReporter;
use sheaf_core::traits::{CatalogClient, CatalogClientFactory};
use sheaf_core::{
    aggregate, ArtifactWriter, ExtractConfig, HarvestReport, HarvestService, HttpConfig,
    PartitionRegistry, QueryKind, RealmClass, Record,
};

#[derive(Parser)]
#[command(name = "sheaf", version, about = "Harvest the marketplace catalog across isolated access realms")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full harvest pass over every registered partition
    Harvest {
        /// Partition registry TOML; the built-in registry is used when omitted
        #[arg(long, env = "SHEAF_REGISTRY")]
        registry: Option<PathBuf>,
        /// Credential profiles TOML
        #[arg(long, env = "SHEAF_CREDENTIALS")]
        credentials: Option<PathBuf>,
        /// Directory the artifacts are written into
        #[arg(long, default_value = "harvest_out")]
        out: PathBuf,
        /// Number of partitions extracted in parallel
        #[arg(long)]
        concurrency: Option<usize>,
        /// Cancel the run after this many seconds, keeping partial results
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Issue one query against a single partition and print the records
    Probe {
        /// Partition name, as listed by `sheaf partitions`
        partition: String,
        /// Restrict the probe to one category
        #[arg(long)]
        category: Option<String>,
        #[arg(long, env = "SHEAF_REGISTRY")]
        registry: Option<PathBuf>,
        #[arg(long, env = "SHEAF_CREDENTIALS")]
        credentials: Option<PathBuf>,
    },
    /// Re-emit a previously harvested catalog in another format
    Export {
        /// Directory holding the harvest artifacts
        #[arg(long, default_value = "harvest_out")]
        from: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Keep only records available in this realm class
        /// (COMMERCIAL, GOVERNMENT, DEFENSE, or REGIONAL_VARIANT)
        #[arg(long)]
        realm: Option<RealmClass>,
        /// Maximum number of records to emit
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the resolved partition registry without contacting anything
    Partitions {
        #[arg(long, env = "SHEAF_REGISTRY")]
        registry: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Jsonl,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Command::Harvest {
            registry,
            credentials,
            out,
            concurrency,
            timeout_secs,
        } => {
            run_harvest(
                registry.as_deref(),
                credentials.as_deref(),
                &out,
                concurrency,
                timeout_secs,
            )
            .await
        }
        Command::Probe {
            partition,
            category,
            registry,
            credentials,
        } => run_probe(&partition, category, registry.as_deref(), credentials.as_deref()).await,
        Command::Export {
            from,
            format,
            realm,
            limit,
        } => run_export(&from, format, realm, limit),
        Command::Partitions { registry } => run_partitions(registry.as_deref()),
    }
}

async fn run_harvest(
    registry_path: Option<&Path>,
    credentials_path: Option<&Path>,
    out: &Path,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let registry = load_registry(registry_path)?;
    let profiles = load_profiles(credentials_path)?;
    let principal = invoking_principal();
    info!(
        "Harvesting {} partition(s) as '{}'",
        registry.len(),
        principal
    );

    let http = HttpConfig::default();
    let mut extract = ExtractConfig::default();
    if let Some(n) = concurrency {
        extract.concurrency = n;
    }

    let factory = MarketplaceClientFactory::new(profiles, http.clone());
    let service = HarvestService::with_config(factory, http, extract);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; remaining queries will be skipped");
                cancel.cancel();
            }
        });
    }
    if let Some(secs) = timeout_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!("Run timeout of {}s reached; cancelling remaining partitions", secs);
            cancel.cancel();
        });
    }

    let run = service
        .run_with_progress(&registry, &cancel, &TracingReporter)
        .await;
    let merge = aggregate(&run.partition_results);
    let report = HarvestReport::build(principal, run.status, run.partition_results, merge);

    let paths = ArtifactWriter::new(out)
        .write_all(&report)
        .context("failed to write harvest artifacts")?;

    println!("{}", report.render_text());
    info!(
        "Artifacts written: {} and {}",
        paths.report_json.display(),
        paths.merged_catalog.display()
    );

    if report.totals.partitions_accessible == 0 {
        bail!(
            "no partition was reachable; see {} for details",
            paths.report_text.display()
        );
    }
    Ok(())
}

async fn run_probe(
    name: &str,
    category: Option<String>,
    registry_path: Option<&Path>,
    credentials_path: Option<&Path>,
) -> Result<()> {
    let registry = load_registry(registry_path)?;
    let partition = registry.find(name).with_context(|| {
        format!("unknown partition '{}'; run `sheaf partitions` to list them", name)
    })?;
    let profiles = load_profiles(credentials_path)?;

    let factory = MarketplaceClientFactory::new(profiles, HttpConfig::default());
    let client = factory
        .create(partition)
        .with_context(|| format!("failed to build a client for '{}'", partition.name))?;

    let kind = match category {
        Some(category) => QueryKind::CategoryFiltered(category),
        None => QueryKind::StructuredSearch,
    };
    info!("Probing {} with the {} query", partition.name, kind);
    let result = client.query(&kind).await;

    println!(
        "\n{} [{}] {}: {} ({} record(s))\n",
        partition.name,
        partition.realm_class,
        kind,
        result.status,
        result.records.len()
    );
    for (i, record) in result.records.iter().enumerate() {
        println!("{:>4}. {} ({})", i + 1, record.name, record.record_id);
        if !record.category.is_empty() {
            println!("      category:  {}", record.category);
        }
        if !record.publisher_id.is_empty() {
            println!("      publisher: {}", record.publisher_id);
        }
    }

    if !result.is_accessible() {
        bail!(
            "probe failed with {}: {}",
            result.status,
            result.detail.as_deref().unwrap_or("no detail")
        );
    }
    Ok(())
}

fn run_export(
    from: &Path,
    format: ExportFormat,
    realm: Option<RealmClass>,
    limit: Option<usize>,
) -> Result<()> {
    let path = from.join(MERGED_CATALOG_FILE);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}; run `sheaf harvest` first", path.display()))?;
    let catalog: BTreeMap<String, Record> =
        serde_json::from_str(&text).context("malformed merged catalog artifact")?;

    let records = filter_records(&catalog, realm, limit);
    if records.is_empty() {
        eprintln!("No records matched the export filter.");
        return Ok(());
    }

    match format {
        ExportFormat::Json => export_json(&records)?,
        ExportFormat::Jsonl => export_jsonl(&records)?,
        ExportFormat::Csv => export_csv(&records),
    }
    info!("Exported {} record(s)", records.len());
    Ok(())
}

fn export_json(records: &[&Record]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    println!("{}", json);
    Ok(())
}

fn export_jsonl(records: &[&Record]) -> Result<()> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

fn export_csv(records: &[&Record]) {
    println!("record_id,name,category,publisher_id,availability");
    for record in records {
        println!(
            "{},{},{},{},{}",
            escape_csv(&record.record_id),
            escape_csv(&record.name),
            escape_csv(&record.category),
            escape_csv(&record.publisher_id),
            escape_csv(&availability_column(record)),
        );
    }
}

fn run_partitions(registry_path: Option<&Path>) -> Result<()> {
    let registry = load_registry(registry_path)?;
    println!("\n{} partition(s) registered:\n", registry.len());
    for partition in registry.partitions() {
        println!(
            "  {:<16} {:<18} {:<52} profile={} scope={}",
            partition.name,
            partition.realm_class,
            partition.region_endpoint,
            partition.credential_ref,
            partition.scope_id.as_deref().unwrap_or("-"),
        );
    }
    println!();
    Ok(())
}

fn load_registry(path: Option<&Path>) -> Result<PartitionRegistry> {
    match path {
        Some(path) => PartitionRegistry::load(path)
            .with_context(|| format!("failed to load registry {}", path.display())),
        None => Ok(PartitionRegistry::builtin()),
    }
}

fn load_profiles(path: Option<&Path>) -> Result<ProfileStore> {
    match path {
        Some(path) => ProfileStore::load(path)
            .with_context(|| format!("failed to load credentials {}", path.display())),
        None => {
            warn!("No credentials file supplied; partitions will report ACCESS_DENIED");
            Ok(ProfileStore::default())
        }
    }
}

/// Identity recorded in the report for audit. `SHEAF_PRINCIPAL` overrides the
/// login name for service invocations.
fn invoking_principal() -> String {
    std::env::var("SHEAF_PRINCIPAL")
        .or_else(|_| std::env::var("USER"))
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn filter_records(
    catalog: &BTreeMap<String, Record>,
    realm: Option<RealmClass>,
    limit: Option<usize>,
) -> Vec<&Record> {
    catalog
        .values()
        .filter(|record| realm.map_or(true, |realm| record.availability.contains(&realm)))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

fn availability_column(record: &Record) -> String {
    record
        .availability
        .iter()
        .map(|realm| realm.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
