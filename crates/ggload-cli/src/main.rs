//! ggload CLI - inspect GGUF files and dump dequantized tensors.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use ggload_gguf::{dequant, GgufContent, ReaderConfig, TensorInfo};
use memmap2::Mmap;

#[derive(Parser)]
#[command(name = "ggload")]
#[command(author, version, about = "Inspect GGUF model files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header, metadata and tensor table of a GGUF file
    Inspect {
        /// Path to the GGUF file
        file: PathBuf,

        /// Reader configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip the tensor table
        #[arg(long)]
        no_tensors: bool,
    },

    /// Decode one tensor to f32 and print a preview
    Dump {
        /// Path to the GGUF file
        file: PathBuf,

        /// Tensor name
        tensor: String,

        /// Number of values to print
        #[arg(short = 'n', long, default_value = "16")]
        limit: usize,

        /// Reader configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            file,
            config,
            no_tensors,
        } => run_inspect(&file, config.as_deref(), no_tensors),
        Commands::Dump {
            file,
            tensor,
            limit,
            config,
        } => run_dump(&file, &tensor, limit, config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReaderConfig> {
    match path {
        Some(path) => ReaderConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ReaderConfig::default()),
    }
}

fn map_file(path: &Path) -> anyhow::Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // SAFETY: the mapping is read-only and lives only for this command.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map {}", path.display()))?;
    Ok(mmap)
}

fn run_inspect(path: &Path, config: Option<&Path>, no_tensors: bool) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let mmap = map_file(path)?;
    let content = GgufContent::parse_with_config(&mmap, &config)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let header = content.header();
    println!("File:        {}", path.display());
    println!("Version:     {}", header.version);
    println!("Tensors:     {}", header.tensor_count);
    println!("Metadata:    {}", header.metadata_count);
    println!("Alignment:   {}", content.alignment());
    println!("Data offset: {}", content.tensor_data_offset());
    if let Some(arch) = content.architecture() {
        println!("Arch:        {}", arch);
    }

    println!();
    println!("Metadata:");
    for entry in content.metadata() {
        println!("  {:<48} {}", entry.key, entry.value);
    }

    if no_tensors {
        return Ok(());
    }

    println!();
    println!(
        "{:<48} {:>8} {:<20} {:>12} {:>12}  decode",
        "Tensor", "Type", "Shape", "Elements", "Bytes"
    );
    for info in content.tensor_infos() {
        println!("{}", tensor_row(info));
    }

    Ok(())
}

fn tensor_row(info: &TensorInfo) -> String {
    let elements = info
        .n_elements_checked()
        .map_or_else(|e| e.to_string(), |n| n.to_string());
    let bytes = info
        .byte_size_checked()
        .map_or_else(|_| "-".to_string(), |n| n.to_string());
    let decode = if dequant::is_supported(info.dtype) {
        "yes"
    } else {
        "no"
    };
    format!(
        "{:<48} {:>8} {:<20} {:>12} {:>12}  {}",
        info.name,
        info.dtype,
        format_shape(&info.dimensions),
        elements,
        bytes,
        decode
    )
}

fn format_shape(dims: &[u64]) -> String {
    let dims: Vec<String> = dims.iter().map(u64::to_string).collect();
    format!("[{}]", dims.join(", "))
}

fn run_dump(path: &Path, name: &str, limit: usize, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let mmap = map_file(path)?;
    let content = GgufContent::parse_with_config(&mmap, &config)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let info = content
        .tensor_info(name)
        .ok_or_else(|| anyhow::anyhow!("Tensor {:?} not found in {}", name, path.display()))?;
    let values = content
        .tensor_f32_by_name(name, &mmap)
        .with_context(|| format!("Failed to decode tensor {:?}", name))?
        .ok_or_else(|| anyhow::anyhow!("Tensor {:?} not found", name))?;

    tracing::info!(
        tensor = name,
        dtype = %info.dtype,
        n_elements = values.len(),
        "Decoded tensor"
    );

    println!("{} {} {}", info.name, info.dtype, format_shape(&info.dimensions));
    for (i, value) in values.iter().take(limit).enumerate() {
        println!("  [{i}] {value}");
    }
    if values.len() > limit {
        println!("  ... {} more", values.len() - limit);
    }

    if let Some(stats) = Stats::compute(&values) {
        println!(
            "min = {}, max = {}, mean = {}",
            stats.min, stats.max, stats.mean
        );
    }

    Ok(())
}

/// Summary statistics over a decoded tensor.
#[derive(Debug, PartialEq)]
struct Stats {
    min: f32,
    max: f32,
    mean: f64,
}

impl Stats {
    fn compute(values: &[f32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max, sum) = values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v as f64),
        );
        Some(Self {
            min,
            max,
            mean: sum / values.len() as f64,
        })
    }
}
