//! Leveled console output for elfpack.
//!
//! Three output levels controlled by CLI flags:
//! - **Quiet** (`-q`): errors only
//! - **Default** (no flag): one summary line per command
//! - **Verbose** (`-v`): region layout, per-table counts and timings

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// Output verbosity level.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Verbosity {
    Quiet = 0,
    Default = 1,
    Verbose = 2,
}

impl Verbosity {
    /// Pick a level from the `-q` / `-v` flags. Quiet wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Default
        }
    }
}

/// Global verbosity level, set once at startup.
static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Default as u8);

/// Initialize the verbosity level for the current process.
pub fn init(quiet: bool, verbose: bool) {
    VERBOSITY.store(Verbosity::from_flags(quiet, verbose) as u8, Ordering::Relaxed);
}

/// Returns the current verbosity level.
pub fn verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Default,
    }
}

/// Print a message only when verbose mode is enabled.
///
/// ```ignore
/// vprintln!("  {} segments", image.segments().len());
/// ```
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::verbosity() == $crate::verbose::Verbosity::Verbose {
            println!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// Print a message at default verbosity and above (suppressed in quiet mode).
///
/// ```ignore
/// dprintln!("Embedded {} bytes into {}", len, path.display());
/// ```
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::verbosity() > $crate::verbose::Verbosity::Quiet {
            println!($($arg)*);
        }
    };
}

pub(crate) use dprintln;

/// RAII timer that prints the elapsed time and byte count on drop in verbose mode.
///
/// ```ignore
/// let _t = Timer::start("parse", data.len());
/// ```
pub struct Timer {
    label: &'static str,
    bytes: usize,
    start: Instant,
}

impl Timer {
    /// Begin timing a labeled operation over `bytes` bytes.
    pub fn start(label: &'static str, bytes: usize) -> Self {
        Self {
            label,
            bytes,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if verbosity() == Verbosity::Verbose {
            println!("  {} ({} bytes): {:.1?}", self.label, self.bytes, self.start.elapsed());
        }
    }
}
