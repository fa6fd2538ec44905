//! crikit CLI - Command-line tool for CRI container extraction.
//!
//! This is the main entry point for the crikit command-line application.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crikit::prelude::*;

/// crikit - CRI container extraction tool
#[derive(Parser)]
#[command(name = "crikit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract all waveforms referenced by an ACB cue database
    AcbExtract {
        /// Path to the ACB file
        #[arg(short, long, env = "INPUT_ACB")]
        acb: PathBuf,

        /// Output directory (defaults to a folder next to the ACB)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Prefix extracted cue names with the cue id
        #[arg(long)]
        include_cue_id: bool,
    },

    /// List resolved cues of an ACB cue database
    AcbList {
        /// Path to the ACB file
        #[arg(short, long, env = "INPUT_ACB")]
        acb: PathBuf,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract all entries of an AWB (AFS2) waveform bank
    AwbExtract {
        /// Path to the AWB file
        #[arg(short, long)]
        awb: PathBuf,

        /// Output directory (defaults to a folder next to the AWB)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List entries of an AWB (AFS2) waveform bank
    AwbList {
        /// Path to the AWB file
        #[arg(short, long)]
        awb: PathBuf,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract all files from a CPK archive
    CpkExtract {
        /// Path to the CPK file
        #[arg(short, long, env = "INPUT_CPK")]
        cpk: PathBuf,

        /// Output directory (defaults to a folder next to the CPK)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List contents of a CPK archive
    CpkList {
        /// Path to the CPK file
        #[arg(short, long, env = "INPUT_CPK")]
        cpk: PathBuf,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Demultiplex a USM container into elementary streams
    UsmDemux {
        /// Path to the USM file
        #[arg(short, long)]
        usm: PathBuf,

        /// Output directory (defaults to the USM's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip audio streams
        #[arg(long)]
        no_audio: bool,

        /// Skip video streams
        #[arg(long)]
        no_video: bool,
    },

    /// Dump a @UTF table as text
    UtfDump {
        /// Input file containing the table
        #[arg(short, long)]
        input: PathBuf,

        /// Table offset within the file (decimal or 0x-prefixed hex)
        #[arg(long, default_value = "0")]
        offset: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::AcbExtract {
            acb,
            output,
            include_cue_id,
        } => cmd_acb_extract(&acb, output.as_deref(), include_cue_id),
        Commands::AcbList { acb, json } => cmd_acb_list(&acb, json),
        Commands::AwbExtract { awb, output } => cmd_awb_extract(&awb, output.as_deref()),
        Commands::AwbList { awb, json } => cmd_awb_list(&awb, json),
        Commands::CpkExtract { cpk, output } => cmd_cpk_extract(&cpk, output.as_deref()),
        Commands::CpkList { cpk, json } => cmd_cpk_list(&cpk, json),
        Commands::UsmDemux {
            usm,
            output,
            no_audio,
            no_video,
        } => cmd_usm_demux(&usm, output.as_deref(), no_audio, no_video),
        Commands::UtfDump { input, offset } => cmd_utf_dump(&input, &offset),
    }
}

#[derive(Serialize)]
struct CueListEntry<'a> {
    cue_id: u32,
    name: Option<&'a str>,
    waveform_id: u16,
    encode_type: u8,
    streaming: bool,
    identified: bool,
}

#[derive(Serialize)]
struct AwbListEntry {
    cue_id: u16,
    offset: u64,
    length: u64,
}

#[derive(Serialize)]
struct CpkListEntry<'a> {
    directory: &'a str,
    name: &'a str,
    offset: u64,
    size: u64,
    extract_size: u64,
}

fn cmd_acb_extract(
    acb_path: &std::path::Path,
    output: Option<&std::path::Path>,
    include_cue_id: bool,
) -> Result<()> {
    println!("Opening ACB: {}", acb_path.display());

    let start = Instant::now();
    let acb = AcbFile::open(acb_path, include_cue_id).context("Failed to open ACB file")?;

    let identified = acb
        .db
        .cues
        .iter()
        .filter(|c| c.is_waveform_identified)
        .count();
    println!(
        "Resolved {}/{} cues in {:?}",
        identified,
        acb.db.cues.len(),
        start.elapsed()
    );

    let spinner = ProgressBar::new_spinner().with_message("Extracting waveforms...");
    let written = acb.extract_all(output).context("Extraction failed")?;
    spinner.finish_and_clear();

    println!("Extracted {} files in {:?}", written.len(), start.elapsed());
    Ok(())
}

fn cmd_acb_list(acb_path: &std::path::Path, json: bool) -> Result<()> {
    let data = fs::read(acb_path).context("Failed to read ACB file")?;
    let db = AcbDatabase::parse(&data, false).context("Failed to parse ACB")?;

    let entries: Vec<CueListEntry<'_>> = db
        .cues
        .iter()
        .map(|c| CueListEntry {
            cue_id: c.cue_id,
            name: c.cue_name.as_deref(),
            waveform_id: c.waveform_id,
            encode_type: c.encode_type,
            streaming: c.is_streaming,
            identified: c.is_waveform_identified,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!(
            "{} ({} cues)",
            db.name.as_deref().unwrap_or("<unnamed>"),
            entries.len()
        );
        for e in &entries {
            if e.identified {
                println!(
                    "  {:>6}  {:<40}  waveform {:>5}  {}",
                    e.cue_id,
                    e.name.unwrap_or("<unnamed>"),
                    e.waveform_id,
                    if e.streaming { "stream" } else { "memory" },
                );
            } else {
                println!("  {:>6}  <unresolved>", e.cue_id);
            }
        }
    }

    Ok(())
}

fn cmd_awb_extract(awb_path: &std::path::Path, output: Option<&std::path::Path>) -> Result<()> {
    println!("Opening AWB: {}", awb_path.display());

    let start = Instant::now();
    let written =
        crikit::awb::extract_file(awb_path, output).context("Failed to extract AWB")?;

    println!("Extracted {} files in {:?}", written.len(), start.elapsed());
    Ok(())
}

fn cmd_awb_list(awb_path: &std::path::Path, json: bool) -> Result<()> {
    let data = fs::read(awb_path).context("Failed to read AWB file")?;
    let archive = Afs2Archive::parse(&data, 0).context("Failed to parse AWB")?;

    let entries: Vec<AwbListEntry> = archive
        .files
        .values()
        .map(|e| AwbListEntry {
            cue_id: e.cue_id,
            offset: e.aligned_offset,
            length: e.length,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!(
            "{} entries, alignment {}",
            archive.file_count, archive.byte_alignment
        );
        for e in &entries {
            println!("  {:05}  0x{:08X}  {} bytes", e.cue_id, e.offset, e.length);
        }
    }

    Ok(())
}

fn cmd_cpk_extract(cpk_path: &std::path::Path, output: Option<&std::path::Path>) -> Result<()> {
    println!("Opening CPK: {}", cpk_path.display());

    let start = Instant::now();
    let data = fs::read(cpk_path).context("Failed to read CPK file")?;
    let archive = CpkArchive::parse(&data, 0).context("Failed to parse CPK")?;

    let files = archive.files();
    println!("Loaded {} entries in {:?}", files.len(), start.elapsed());

    let dest = match output {
        Some(dir) => dir.to_path_buf(),
        None => {
            let name = cpk_path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            cpk_path
                .parent()
                .unwrap_or_else(|| std::path::Path::new(""))
                .join(format!("{}{name}", crikit::cpk::EXTRACTION_FOLDER_FORMAT))
        }
    };

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .expect("static template"),
    );

    for file in files {
        bar.set_message(file.name.clone());
        archive
            .extract_one(&data, file, &dest)
            .with_context(|| format!("Failed to extract {}/{}", file.directory, file.name))?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!("Extracted to {} in {:?}", dest.display(), start.elapsed());
    Ok(())
}

fn cmd_cpk_list(cpk_path: &std::path::Path, json: bool) -> Result<()> {
    let data = fs::read(cpk_path).context("Failed to read CPK file")?;
    let archive = CpkArchive::parse(&data, 0).context("Failed to parse CPK")?;

    let files = archive.files();
    let entries: Vec<CpkListEntry<'_>> = files
        .iter()
        .map(|f| CpkListEntry {
            directory: &f.directory,
            name: &f.name,
            offset: f.offset,
            size: f.size,
            extract_size: f.extract_size,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{} ({} files)", archive.volume_name, entries.len());
        for e in &entries {
            println!(
                "  {:<50}  0x{:08X}  {} bytes",
                format!("{}/{}", e.directory, e.name),
                e.offset,
                e.size
            );
        }
    }

    Ok(())
}

fn cmd_usm_demux(
    usm_path: &std::path::Path,
    output: Option<&std::path::Path>,
    no_audio: bool,
    no_video: bool,
) -> Result<()> {
    println!("Demultiplexing: {}", usm_path.display());

    let options = DemuxOptions {
        extract_audio: !no_audio,
        extract_video: !no_video,
        add_header: false,
    };

    let start = Instant::now();
    let files = demux_usm(usm_path, &options, output).context("Demultiplexing failed")?;

    for file in &files {
        println!("  {}", file.display());
    }
    println!("Produced {} streams in {:?}", files.len(), start.elapsed());
    Ok(())
}

fn cmd_utf_dump(input: &std::path::Path, offset: &str) -> Result<()> {
    let offset = parse_offset(offset)?;
    let data = fs::read(input).context("Failed to read input file")?;

    let mut cache = None;
    let table = crikit::utf::UtfTable::parse_with_cache(&data, offset, &mut cache)
        .context("Failed to parse UTF table")?;

    let text = dump_table(&table, &data, &mut cache).context("Failed to dump table")?;
    print!("{text}");
    Ok(())
}

fn parse_offset(text: &str) -> Result<usize> {
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16)
    } else {
        text.parse()
    };

    value.with_context(|| format!("invalid offset: {text}"))
}
