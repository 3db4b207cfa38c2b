//! Flagload CLI - expand survey CSV rows and publish them to ArcGIS
//!
//! # Main Commands
//!
//! ```bash
//! flagload upload data/input.csv        # Expand, build features, upload in batches
//! flagload expand data/input.csv        # Expand count rows to flag rows (JSON)
//! flagload layer-info                   # Show the target item and layer
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! flagload parse data/input.csv         # Just parse CSV to JSON
//! flagload features data/input.csv      # Features that would be uploaded (JSON)
//! ```

use clap::{Parser, Subcommand};
use flagload::logging::init_logging;
use flagload::models::{
    DEFAULT_CITY_COLUMN, DEFAULT_COUNT_PREFIX, DEFAULT_DATE_COLUMN, DEFAULT_LAT_COLUMN,
    DEFAULT_LONG_COLUMN, DEFAULT_MAX_COUNT, DEFAULT_REGION_COLUMN,
};
use flagload::upload::AbortReason;
use flagload::{
    build_features, expand_file, format_delimiter, parse_csv_file_auto, publish, ArcGisClient,
    ArcGisConfig, CountFields, ExpandSummary, FailurePolicy, InputColumns, PipelineOptions,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flagload")]
#[command(
    about = "Expand survey count rows into flag rows and publish them to ArcGIS",
    long_about = None
)]
struct Cli {
    /// Prefix of the count column names
    #[arg(long, global = true, default_value = DEFAULT_COUNT_PREFIX)]
    count_prefix: String,

    /// Number of count columns
    #[arg(long, global = true, default_value = "10")]
    count_fields: usize,

    /// Largest accepted count in a single cell
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_COUNT)]
    max_count: usize,

    /// Date column (dd.mm.yyyy)
    #[arg(long, global = true, default_value = DEFAULT_DATE_COLUMN)]
    date_column: String,

    /// Region column
    #[arg(long, global = true, default_value = DEFAULT_REGION_COLUMN)]
    region_column: String,

    /// City column
    #[arg(long, global = true, default_value = DEFAULT_CITY_COLUMN)]
    city_column: String,

    /// Longitude column
    #[arg(long, global = true, default_value = DEFAULT_LONG_COLUMN)]
    long_column: String,

    /// Latitude column
    #[arg(long, global = true, default_value = DEFAULT_LAT_COLUMN)]
    lat_column: String,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Expand count rows into flag rows
    Expand {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail on the first record with an unreadable count
        #[arg(long)]
        strict: bool,

        /// Expand records in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Build the features that would be uploaded
    Features {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail on the first record with an unreadable count
        #[arg(long)]
        strict: bool,
    },

    /// Expand, build features and upload them to the feature layer
    Upload {
        /// Input CSV file
        input: PathBuf,

        /// Features per request
        #[arg(short, long, default_value = "200")]
        batch_size: usize,

        /// Fail on the first record with an unreadable count
        #[arg(long)]
        strict: bool,
    },

    /// Show the configured item and layer
    LayerInfo,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base = PipelineOptions {
        count_fields: CountFields::numbered(&cli.count_prefix, cli.count_fields),
        columns: InputColumns {
            date: cli.date_column,
            region: cli.region_column,
            city: cli.city_column,
            longitude: cli.long_column,
            latitude: cli.lat_column,
        },
        max_count: cli.max_count,
        ..PipelineOptions::default()
    };

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Expand {
            input,
            output,
            strict,
            parallel,
        } => {
            let options = PipelineOptions {
                failure_policy: policy(strict),
                parallel,
                ..base
            };
            cmd_expand(&input, output.as_deref(), &options)
        }

        Commands::Features {
            input,
            output,
            strict,
        } => {
            let options = PipelineOptions {
                failure_policy: policy(strict),
                ..base
            };
            cmd_features(&input, output.as_deref(), &options)
        }

        Commands::Upload {
            input,
            batch_size,
            strict,
        } => {
            let options = PipelineOptions {
                failure_policy: policy(strict),
                batch_size,
                ..base
            };
            cmd_upload(&input, &options).await
        }

        Commands::LayerInfo => cmd_layer_info().await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn policy(strict: bool) -> FailurePolicy {
    if strict {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Skip
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_expand(
    input: &Path,
    output: Option<&Path>,
    options: &PipelineOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let summary = expand_file(input, options)?;
    print_expand_summary(&summary);

    let json = serde_json::to_string_pretty(&summary.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_features(
    input: &Path,
    output: Option<&Path>,
    options: &PipelineOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let summary = expand_file(input, options)?;
    print_expand_summary(&summary);

    let set = build_features(&summary, options)?;
    eprintln!("\n🗺️  Features: {}", set.features.len());
    print_skipped_features(&set.skipped);

    let json = serde_json::to_string_pretty(&set.features)?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_upload(
    input: &Path,
    options: &PipelineOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ArcGisClient::new(ArcGisConfig::from_env()?)?;

    eprintln!("📄 Processing: {}", input.display());
    let summary = expand_file(input, options)?;
    print_expand_summary(&summary);

    let set = build_features(&summary, options)?;
    eprintln!("\n🗺️  Features: {}", set.features.len());
    print_skipped_features(&set.skipped);

    let layer = client.resolve_layer().await?;
    eprintln!("\n📡 Layer URL: {}", layer.url());

    let report = publish(&layer, &set, options).await?;

    eprintln!("\n📊 Upload:");
    for batch in &report.batches {
        eprintln!(
            "   Batch {}: added {}, failed {}",
            batch.index, batch.added, batch.failed
        );
        for err in &batch.sample_errors {
            eprintln!("     - {}", serde_json::to_string(err)?);
        }
    }
    eprintln!("   ✅ Added: {}", report.added());
    if report.failed() > 0 {
        eprintln!("   ❌ Failed: {}", report.failed());
    }

    match report.aborted {
        Some(AbortReason::RequestError { batch, error }) => {
            eprintln!("\n❌ Service rejected batch {}", batch);
            if let Some(code) = error.code {
                eprintln!("   code: {}", code);
            }
            eprintln!("   message: {}", error.message);
            if !error.details.is_empty() {
                eprintln!("   details: {}", error.details.join("; "));
            }
            std::process::exit(1);
        }
        Some(AbortReason::EmptyResults { batch }) => {
            eprintln!("\n❌ No addResults in response to batch {}", batch);
            std::process::exit(1);
        }
        None => {}
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

async fn cmd_layer_info() -> Result<(), Box<dyn std::error::Error>> {
    let client = ArcGisClient::new(ArcGisConfig::from_env()?)?;

    if let Some(item) = client.item().await? {
        println!("Item title: {}", item.title);
        println!("Item type: {}", item.item_type);
        println!("Item owner: {}", item.owner);
    }

    let layer = client.resolve_layer().await?;
    let info = client.layer_info(&layer).await?;

    println!("Layer URL: {}", layer.url());
    println!("Layer name: {}", info.name);
    println!("Geometry type: {}", info.geometry_type.as_deref().unwrap_or("-"));
    println!("Capabilities: {}", info.capabilities.as_deref().unwrap_or("-"));

    Ok(())
}

fn print_expand_summary(summary: &ExpandSummary) {
    eprintln!("   Encoding: {}", summary.csv_info.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(summary.csv_info.delimiter));
    eprintln!("   Input rows: {}", summary.csv_info.row_count);
    eprintln!("\n⚙️  Expanded rows: {}", summary.records.len());

    if !summary.skipped.is_empty() {
        eprintln!("   ⚠️  Skipped {} input rows:", summary.skipped.len());
        for skipped in summary.skipped.iter().take(5) {
            eprintln!("     - row {}: {}", skipped.row, skipped.reason);
        }
    }
}

fn print_skipped_features(skipped: &[flagload::features::SkippedFeature]) {
    if skipped.is_empty() {
        return;
    }
    eprintln!("   ⚠️  Skipped {} records:", skipped.len());
    for s in skipped.iter().take(5) {
        eprintln!("     - record #{}: {}", s.index, s.reason);
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
