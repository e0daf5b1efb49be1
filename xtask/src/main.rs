use anyhow::Result;
use clap::{Parser, Subcommand};
use regionkit_common::{LocalCoord, RegionCoord};
use regionkit_format::nbt::{Compound, List, NamedTag, Tag, TagKind};
use regionkit_format::{ChunkPayload, Compression, RegionFile, SlotTimestamp};
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for regionkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Write a sample region file for manual testing
    Fixture {
        /// Output directory; the file is named after the region coordinate
        #[arg(short, long, default_value = "target/fixtures")]
        out: PathBuf,
        /// Number of chunks to fill, in slot order
        #[arg(short, long, default_value = "64")]
        chunks: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            run_fmt()?;
            run_clippy()?;
            run_tests()?;
            run_doc()?;
        }
        Commands::Fmt => run_fmt()?,
        Commands::Clippy => run_clippy()?,
        Commands::Test => run_tests()?,
        Commands::Doc => run_doc()?,
        Commands::Fixture { out, chunks } => write_fixture(out, chunks)?,
    }

    Ok(())
}

fn cargo(label: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {label}");
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {label} failed");
    }
    Ok(())
}

fn run_fmt() -> Result<()> {
    cargo("fmt --check", &["fmt", "--all", "--", "--check"])
}

fn run_clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn run_tests() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn run_doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

/// Fill the first `chunks` slots of region (0, 0), cycling through every
/// compression so readers see all three tags.
fn write_fixture(out: PathBuf, chunks: usize) -> Result<()> {
    let coord = RegionCoord::new(0, 0);
    let codecs = [Compression::Zlib, Compression::Gzip, Compression::None];

    let mut region = RegionFile::new();
    for index in 0..chunks.min(regionkit_common::SLOT_COUNT) {
        let local = LocalCoord::from_index(index)?;
        let chunk = coord.chunk(local);
        let payload = ChunkPayload::new(codecs[index % codecs.len()], sample_chunk(chunk.x, chunk.z)?);
        region.set_payload(local, payload)?;
        region.set_timestamp(local, SlotTimestamp::new(1_600_000_000 + index as u32));
    }

    std::fs::create_dir_all(&out)?;
    let path = out.join(coord.file_name());
    let written = region.save(&path)?;
    println!(
        "==> Wrote {} chunks, {} bytes to {}",
        region.len(),
        written,
        path.display()
    );
    Ok(())
}

fn sample_chunk(x: i32, z: i32) -> Result<NamedTag> {
    let mut sections = List::new(TagKind::Compound);
    for y in 0..4i8 {
        let mut section = Compound::new();
        section.insert("Y", Tag::Byte(y));
        section.insert("BlockLight", Tag::ByteArray(vec![0; 2048]));
        section.insert("BlockStates", Tag::LongArray(vec![i64::from(y); 256]));
        sections.push(Tag::Compound(section))?;
    }

    let mut level = Compound::new();
    level.insert("xPos", x);
    level.insert("zPos", z);
    level.insert("Status", "full");
    level.insert("InhabitedTime", 0i64);
    level.insert("Sections", sections);

    let mut root = Compound::new();
    root.insert("DataVersion", 1976);
    root.insert("Level", level);
    Ok(NamedTag::new("", root))
}
