//! Configuration loading from `elfpack.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE: &str = "elfpack.toml";

/// Suffix appended to the input path when no output path is given.
const DEFAULT_OUTPUT_SUFFIX: &str = ".packed";

/// Byte the default prefix is filled with (`'A'`).
const DEFAULT_FILL_BYTE: u8 = 0x41;

/// Length of the default prefix.
const DEFAULT_FILL_LEN: usize = 64;

/// On-disk layout of `elfpack.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    output_suffix: Option<String>,
    embed: Option<EmbedSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct EmbedSection {
    /// Byte the generated prefix is filled with.
    fill_byte: Option<u8>,
    /// Length of the generated prefix.
    fill_len: Option<usize>,
}

/// Resolved elfpack configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Suffix appended to the input path to name the output.
    pub output_suffix: String,
    /// Byte the generated prefix is filled with.
    pub fill_byte: u8,
    /// Length of the generated prefix.
    pub fill_len: usize,
    /// File the configuration was read from, if any.
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            fill_byte: DEFAULT_FILL_BYTE,
            fill_len: DEFAULT_FILL_LEN,
            source: None,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `elfpack.toml` in the current
    /// directory is used if present, and built-in defaults if not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = std::env::current_dir()
                    .context("Failed to get current directory")?
                    .join(CONFIG_FILE);
                if !candidate.exists() {
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config =
            Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        config.source = Some(path);
        Ok(config)
    }

    /// Parse configuration from TOML text, filling unset keys with defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let defaults = Self::default();
        let embed = file.embed.unwrap_or_default();

        Ok(Self {
            output_suffix: file.output_suffix.unwrap_or(defaults.output_suffix),
            fill_byte: embed.fill_byte.unwrap_or(defaults.fill_byte),
            fill_len: embed.fill_len.unwrap_or(defaults.fill_len),
            source: None,
        })
    }

    /// Output path for `input`: the input path with the configured suffix appended.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let mut name = input.as_os_str().to_owned();
        name.push(&self.output_suffix);
        PathBuf::from(name)
    }
}
