use anyhow::Result;
use clap::Parser;
use rivulet::Normalize;
use rivulet_logging::LogConfig;
use rivulet_protocol::config::{DestinationCapabilities, LoaderFileFormat, NormalizeConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rivulet-normalize", about = "Normalize extracted items into load packages")]
struct Args {
    /// Input volume with extracted-items files
    #[arg(long, env = "RIVULET_NORMALIZE_VOLUME")]
    normalize_volume: std::path::PathBuf,

    /// Output volume for load packages
    #[arg(long, env = "RIVULET_LOAD_VOLUME")]
    load_volume: std::path::PathBuf,

    /// Volume holding persisted schemas
    #[arg(long, env = "RIVULET_SCHEMA_VOLUME")]
    schema_volume: std::path::PathBuf,

    /// Number of normalization workers
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Preferred loader file format (jsonl, parquet)
    #[arg(long, default_value = "jsonl")]
    file_format: String,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    rivulet_logging::init_logging(LogConfig {
        app_name: "rivulet-normalize",
        verbose: args.verbose,
    })?;

    let preferred: LoaderFileFormat = args.file_format.parse()?;
    let config = NormalizeConfig {
        normalize_volume: args.normalize_volume,
        load_volume: args.load_volume,
        schema_volume: args.schema_volume,
        destination_capabilities: DestinationCapabilities {
            preferred_loader_file_format: preferred,
            supported_loader_file_formats: LoaderFileFormat::all(),
        },
        worker_count: args.workers,
    };

    let normalize = Normalize::new(config)?;
    let run = normalize.run()?;
    info!(pending = run.pending, "Normalize run complete");
    Ok(())
}
