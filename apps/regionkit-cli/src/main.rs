use anyhow::Context;
use clap::{Parser, Subcommand};
use regionkit_common::{LocalCoord, RegionCoord};
use regionkit_format::{AggregateError, Compression, RegionConfig, RegionFile};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "regionkit", about = "Inspect and rewrite region files")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Load engine settings from a JSON file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// List the occupied slots of a region file
    Inspect {
        file: PathBuf,
    },
    /// Print one slot's payload as JSON
    Dump {
        file: PathBuf,
        /// Local x coordinate (0..32)
        #[arg(long)]
        x: i32,
        /// Local z coordinate (0..32)
        #[arg(long)]
        z: i32,
    },
    /// Read a region file and report every failure
    Verify {
        file: PathBuf,
    },
    /// Read a region file and write it back out, optionally recompressed
    Rewrite {
        input: PathBuf,
        output: PathBuf,
        /// Recompress every payload (gzip, zlib, none)
        #[arg(long)]
        compression: Option<Compression>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => RegionConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RegionConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("regionkit v{}", env!("CARGO_PKG_VERSION"));
            println!("format: {}", regionkit_format::crate_info());
            println!("nbt: {}", regionkit_nbt::crate_info());
            println!("config: {}", serde_json::to_string(&config)?);
        }
        Commands::Inspect { file } => {
            let (region, failed) = load(&file, config)?;
            if let Some(coord) = region_coord(&file) {
                println!("region ({}, {})", coord.x, coord.z);
            }
            println!("index\tx\tz\tsector\tsectors\ttimestamp\tcompression\tlength");
            for (local, slot) in region.occupied() {
                let (compression, length) = match &slot.payload {
                    Some(p) => (p.compression().to_string(), p.declared_length().to_string()),
                    None => ("-".to_string(), "-".to_string()),
                };
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    local.index(),
                    local.x(),
                    local.z(),
                    slot.location.location(),
                    slot.location.sectors(),
                    slot.timestamp.raw(),
                    compression,
                    length
                );
            }
            println!("{} occupied slots", region.len());
            if let Some(err) = failed {
                tracing::warn!(failures = err.len(), "region read incomplete");
            }
        }
        Commands::Dump { file, x, z } => {
            let local = LocalCoord::new(x, z)?;
            let (region, _) = load(&file, config)?;
            let payload = region
                .payload(local)
                .with_context(|| format!("no payload at slot {local}"))?;
            if let Some(coord) = region_coord(&file) {
                let chunk = coord.chunk(local);
                tracing::info!(x = chunk.x, z = chunk.z, "world chunk");
            }
            println!("{}", serde_json::to_string_pretty(payload.root())?);
        }
        Commands::Verify { file } => {
            let (region, failed) = load(&file, config)?;
            match failed {
                None => println!("ok: {} occupied slots", region.len()),
                Some(err) => {
                    for failure in err.failures() {
                        println!("{failure}");
                    }
                    anyhow::bail!(
                        "{} of {} steps failed ({} bytes read)",
                        err.len(),
                        err.attempted(),
                        err.bytes_processed()
                    );
                }
            }
        }
        Commands::Rewrite {
            input,
            output,
            compression,
        } => {
            let mut region = RegionFile::open(&input, config)
                .with_context(|| format!("reading {}", input.display()))?;
            if let Some(compression) = compression {
                for index in 0..regionkit_common::SLOT_COUNT {
                    let local = LocalCoord::from_index(index)?;
                    if let Some(payload) = region.payload_mut(local) {
                        payload.set_compression(compression);
                    }
                }
            }
            let written = region
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "wrote {} slots, {} bytes to {}",
                region.len(),
                written,
                output.display()
            );
        }
    }

    Ok(())
}

/// Read a region, keeping whatever decoded when some steps fail.
fn load(path: &Path, config: RegionConfig) -> anyhow::Result<(RegionFile, Option<AggregateError>)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut region = RegionFile::with_config(config);
    let failed = region.read_from(BufReader::new(file)).err();
    Ok((region, failed))
}

fn region_coord(path: &Path) -> Option<RegionCoord> {
    RegionCoord::from_file_name(path.file_name()?.to_str()?)
}
