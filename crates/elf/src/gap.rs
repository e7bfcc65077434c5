//! Opaque byte spans between the regions the model understands.
//!
//! Anything between the end of the file header and the program header table,
//! or between the two header tables, is carried verbatim so that serializing
//! a parsed image reproduces the input exactly.

use alloc::vec::Vec;

use crate::header::{ElfError, LayoutIssue, to_index};

/// An unmodeled byte span, re-emitted verbatim at its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gap {
    bytes: Vec<u8>,
}

impl Gap {
    /// Capture `data[start..end]`.
    ///
    /// `start == end` yields an empty gap. `region` names the region that
    /// begins at `end`, for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::UnsupportedLayout`] if `end < start` (the next
    /// region overlaps the previous one), or [`ElfError::Truncated`] if `end`
    /// is past the end of `data`.
    pub fn capture(
        data: &[u8],
        start: u64,
        end: u64,
        region: &'static str,
    ) -> Result<Self, ElfError> {
        if end < start {
            return Err(ElfError::UnsupportedLayout(LayoutIssue::RegionOrder {
                region,
                start: end,
                previous_end: start,
            }));
        }
        let from = to_index(start, data.len())?;
        let to = to_index(end, data.len())?;
        let bytes = data
            .get(from..to)
            .ok_or_else(|| ElfError::truncated(from, to - from, data.len()))?;
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Insert `prefix` before the current contents.
    pub fn prepend(&mut self, prefix: &[u8]) {
        self.bytes.splice(0..0, prefix.iter().copied());
    }

    /// The captured bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the gap in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the gap is absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
