use std::io::Write;
use std::path::{Path, PathBuf};

use acs_script::config::{InterpreterConfig, LoggerConfig};
use acs_script::format::{disassemble, BytecodeImage, Listing};
use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use serde::{Deserialize, Serialize};

/// Summary written next to the disassembly.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSummary {
    source: PathBuf,
    size: usize,
    script_count: usize,
    open_scripts: Vec<i32>,
    string_count: usize,
}

impl ImageSummary {
    fn new(source: &Path, image: &BytecodeImage) -> Self {
        Self {
            source: source.to_path_buf(),
            size: image.len(),
            script_count: image.entrypoints().len(),
            open_scripts: image.entrypoints().iter().filter(|e| e.is_open).map(|e| e.number).collect(),
            string_count: image.strings().len(),
        }
    }
}

/// Dump a compiled ACS lump as YAML
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, required = true)]
    input: PathBuf,

    /// Directory for disassembly.yaml and summary.yaml; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only list the string table
    #[arg(long)]
    strings_only: bool,

    /// Interpreter config file; only its logger section is used
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_logger(config: Option<&Path>) -> Result<()> {
    let logger = match config {
        Some(path) => InterpreterConfig::from_json_file(path)?.logger_config.unwrap_or_default(),
        None => LoggerConfig::default(),
    };
    env_logger::Builder::new()
        .filter_level(logger.level_filter)
        .parse_default_env()
        .init();
    Ok(())
}

fn load(path: &Path) -> Result<BytecodeImage> {
    let bytes = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
    BytecodeImage::parse(&bytes).with_context(|| format!("parse {:?}", path))
}

fn write_listing(listing: &Listing, summary: &ImageSummary, output: Option<&Path>, strings_only: bool) -> Result<()> {
    let Some(output) = output else {
        let mut stdout = std::io::stdout().lock();
        if strings_only {
            serde_yaml::to_writer(&mut stdout, &listing.strings)?;
        } else {
            serde_yaml::to_writer(&mut stdout, listing)?;
        }
        stdout.flush()?;
        return Ok(());
    };

    if !output.exists() {
        std::fs::create_dir_all(output).with_context(|| format!("create {:?}", output))?;
    }

    let disassembly_path = output.join(if strings_only { "strings.yaml" } else { "disassembly.yaml" });
    let mut writer = std::fs::File::create(&disassembly_path)?;
    if strings_only {
        serde_yaml::to_writer(&mut writer, &listing.strings)?;
    } else {
        serde_yaml::to_writer(&mut writer, listing)?;
    }

    let mut writer = std::fs::File::create(output.join("summary.yaml"))?;
    serde_yaml::to_writer(&mut writer, summary)?;

    log::info!("wrote {:?}", disassembly_path);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.config.as_deref())?;

    let image = load(&args.input)?;
    let listing = disassemble(&image);
    let summary = ImageSummary::new(&args.input, &image);
    log::info!(
        "{:?}: {} script(s), {} string(s)",
        args.input,
        summary.script_count,
        summary.string_count
    );

    write_listing(&listing, &summary, args.output.as_deref(), args.strings_only)
}
