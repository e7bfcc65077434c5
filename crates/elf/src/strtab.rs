//! NUL-terminated string reading and writing.
//!
//! Section names live in a string table section as concatenated
//! NUL-terminated byte strings, referenced by offset from each section header.

use alloc::string::String;
use alloc::vec::Vec;

use crate::header::ElfError;

/// Read the NUL-terminated string starting at `offset` in `buffer`.
///
/// Bytes that are not valid UTF-8 are replaced with `U+FFFD`.
///
/// # Errors
///
/// Returns [`ElfError::OutOfBounds`] if `offset` is past the end of `buffer`
/// or no NUL terminator follows it.
pub fn read_c_string(buffer: &[u8], offset: usize) -> Result<String, ElfError> {
    let out_of_bounds = || ElfError::OutOfBounds {
        offset: offset as u64,
        len: buffer.len() as u64,
    };
    let remaining = buffer.get(offset..).ok_or_else(out_of_bounds)?;
    let nul_pos = remaining
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(out_of_bounds)?;
    Ok(String::from_utf8_lossy(&remaining[..nul_pos]).into_owned())
}

/// Append `text` followed by a NUL byte to `buffer`.
///
/// Returns the offset at which `text` starts.
pub fn write_c_string(buffer: &mut Vec<u8>, text: &str) -> usize {
    let offset = buffer.len();
    buffer.extend_from_slice(text.as_bytes());
    buffer.push(0);
    offset
}

/// A zero-copy wrapper around a NUL-terminated string table section.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Creates a new string table from the raw section data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Looks up a NUL-terminated string at the given byte offset.
    ///
    /// Returns `None` if the offset is out of bounds, the string is not
    /// terminated within the table, or it contains invalid UTF-8.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&'a str> {
        let start = usize::try_from(offset).ok()?;
        let remaining = self.data.get(start..)?;
        let nul_pos = remaining.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&remaining[..nul_pos]).ok()
    }

    /// Returns the raw table bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}
