//! Command-line interface definitions for elfpack.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Embed data after the ELF64 file header and fix up every offset.
#[derive(Parser)]
#[command(name = "elfpack", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./elfpack.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print errors only.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print region layout and timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Print the parsed header, sections and segments.
    Inspect(InspectArgs),
    /// Insert a prefix after the file header and write the result.
    Embed(EmbedArgs),
    /// Verify that parsing and re-serializing reproduces the file exactly.
    Check(CheckArgs),
}

/// Arguments for the `inspect` subcommand.
#[derive(Parser)]
pub struct InspectArgs {
    /// ELF64 file to read.
    pub input: PathBuf,

    /// Emit a JSON report instead of the text summary.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `embed` subcommand.
#[derive(Parser)]
pub struct EmbedArgs {
    /// ELF64 file to read.
    pub input: PathBuf,

    /// File whose contents are embedded.
    #[arg(long, conflicts_with_all = ["fill", "fill_len"])]
    pub prefix: Option<PathBuf>,

    /// Byte the generated prefix is filled with (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_byte)]
    pub fill: Option<u8>,

    /// Length of the generated prefix.
    #[arg(long)]
    pub fill_len: Option<usize>,

    /// Output path (default: input path plus the configured suffix).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `check` subcommand.
#[derive(Parser)]
pub struct CheckArgs {
    /// ELF64 file to read.
    pub input: PathBuf,
}

/// Parse a byte given as decimal (`65`) or hex (`0x41`).
pub fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid byte '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_byte_forms() {
        assert_eq!(parse_byte("65"), Ok(65));
        assert_eq!(parse_byte("0x41"), Ok(0x41));
        assert_eq!(parse_byte("0XfF"), Ok(0xff));
        assert!(parse_byte("256").is_err());
        assert!(parse_byte("0x100").is_err());
        assert!(parse_byte("A").is_err());
    }

    #[test]
    fn embed_defaults() {
        let cli = Cli::try_parse_from(["elfpack", "embed", "a.out"]).unwrap();
        let Command::Embed(args) = cli.command else {
            panic!("expected embed");
        };
        assert_eq!(args.input, PathBuf::from("a.out"));
        assert!(args.prefix.is_none() && args.fill.is_none() && args.output.is_none());
    }

    #[test]
    fn prefix_conflicts_with_fill() {
        assert!(
            Cli::try_parse_from(["elfpack", "embed", "a.out", "--prefix", "p", "--fill", "1"])
                .is_err()
        );
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["elfpack", "-q", "-v", "check", "a.out"]).is_err());
    }
}
