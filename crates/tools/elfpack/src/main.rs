//! elfpack: embed data into ELF64 files.
//!
//! Usage:
//!   elfpack inspect <file> [--json]   - Print the parsed header, sections and segments
//!   elfpack embed <file> [options]    - Insert a prefix after the file header
//!   elfpack check <file>              - Verify parse/serialize reproduces the file
//!
//! All ELF work happens in `elfpack-elf`; this binary only reads and writes
//! files and reports.

mod cli;
mod config;
mod report;
mod verbose;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use elfpack_elf::ElfImage;

use crate::cli::{CheckArgs, EmbedArgs, InspectArgs};
use crate::config::Config;
use crate::verbose::{Timer, dprintln, vprintln};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    if let Some(source) = &config.source {
        vprintln!("Using configuration from {}", source.display());
    }

    match cli.command {
        cli::Command::Inspect(ref args) => cmd_inspect(args),
        cli::Command::Embed(ref args) => cmd_embed(args, &config),
        cli::Command::Check(ref args) => cmd_check(args),
    }
}

/// Read and parse an ELF64 file.
fn load_image(path: &Path) -> Result<(Vec<u8>, ElfImage)> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let image = {
        let _t = Timer::start("parse", data.len());
        ElfImage::parse(&data).with_context(|| format!("parsing {}", path.display()))?
    };
    print_layout(&image);
    Ok((data, image))
}

/// Print region sizes in verbose mode.
fn print_layout(image: &ElfImage) {
    let header = image.header();
    vprintln!(
        "  header trailer: {} bytes, program headers: {} x {} at {:#x}",
        image.header_trailer().len(),
        header.e_phnum,
        header.e_phentsize,
        header.e_phoff,
    );
    vprintln!(
        "  inter-table: {} bytes, section headers: {} x {} at {:#x}, trailer: {} bytes",
        image.inter_table().len(),
        header.e_shnum,
        header.e_shentsize,
        header.e_shoff,
        image.trailer().len(),
    );
}

/// `elfpack inspect`: print the parsed image.
fn cmd_inspect(args: &InspectArgs) -> Result<()> {
    let (_, image) = load_image(&args.input)?;

    if args.json {
        let report = report::ImageReport::from(&image);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{image}");
    }
    Ok(())
}

/// `elfpack embed`: insert a prefix and write the result.
fn cmd_embed(args: &EmbedArgs, config: &Config) -> Result<()> {
    let (data, mut image) = load_image(&args.input)?;

    let prefix = match &args.prefix {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let byte = args.fill.unwrap_or(config.fill_byte);
            let len = args.fill_len.unwrap_or(config.fill_len);
            vec![byte; len]
        }
    };

    let old_entry = image.header().e_entry;
    image
        .embed(&prefix)
        .with_context(|| format!("embedding {} bytes into {}", prefix.len(), args.input.display()))?;
    vprintln!(
        "  entry: {:#x} -> {:#x}",
        old_entry,
        image.header().e_entry
    );

    let out = {
        let _t = Timer::start("serialize", image.serialized_len());
        image.dump().context("serializing embedded image")?
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.output_path(&args.input));
    std::fs::write(&output, &out).with_context(|| format!("writing {}", output.display()))?;

    dprintln!(
        "Embedded {} bytes into {} ({} -> {} bytes), wrote {}",
        prefix.len(),
        args.input.display(),
        data.len(),
        out.len(),
        output.display(),
    );
    Ok(())
}

/// `elfpack check`: verify the file survives a parse/serialize round trip.
fn cmd_check(args: &CheckArgs) -> Result<()> {
    let (data, image) = load_image(&args.input)?;
    let out = image.serialize().context("serializing image")?;

    if out != data {
        let first_diff = out
            .iter()
            .zip(&data)
            .position(|(a, b)| a != b)
            .unwrap_or(out.len().min(data.len()));
        bail!(
            "{}: round trip differs at offset {first_diff:#x} ({} bytes in, {} bytes out)",
            args.input.display(),
            data.len(),
            out.len(),
        );
    }

    dprintln!("{}: round trip OK ({} bytes)", args.input.display(), data.len());
    Ok(())
}
