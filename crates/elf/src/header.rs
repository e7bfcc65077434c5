//! ELF64 file header parsing and serialization.
//!
//! Parses the fixed 64-byte ELF64 file header from raw byte slices using
//! checked field extraction via `from_le_bytes()`, and re-emits it in the
//! exact same layout.

use core::fmt;

/// ELF type: shared object (PIE).
pub const ET_DYN: u16 = 3;

/// Size of an ELF64 file header (64 bytes).
pub const ELF64_EHDR_SIZE: usize = 64;

/// Size of an ELF64 program header entry (56 bytes).
pub const ELF64_PHDR_SIZE: usize = 56;

/// Size of an ELF64 section header entry (64 bytes).
pub const ELF64_SHDR_SIZE: usize = 64;

/// Read `N` bytes from `data` at byte offset `off`.
///
/// # Errors
///
/// Returns [`ElfError::Truncated`] if `off + N` runs past the end of `data`.
pub(crate) fn read_array<const N: usize>(data: &[u8], off: usize) -> Result<[u8; N], ElfError> {
    off.checked_add(N)
        .and_then(|end| data.get(off..end))
        .and_then(<[u8]>::first_chunk::<N>)
        .copied()
        .ok_or_else(|| ElfError::truncated(off, N, data.len()))
}

/// Read a little-endian `u16` from `data` at byte offset `off`.
pub(crate) fn le_u16(data: &[u8], off: usize) -> Result<u16, ElfError> {
    read_array(data, off).map(u16::from_le_bytes)
}

/// Read a little-endian `u32` from `data` at byte offset `off`.
pub(crate) fn le_u32(data: &[u8], off: usize) -> Result<u32, ElfError> {
    read_array(data, off).map(u32::from_le_bytes)
}

/// Read a little-endian `u64` from `data` at byte offset `off`.
pub(crate) fn le_u64(data: &[u8], off: usize) -> Result<u64, ElfError> {
    read_array(data, off).map(u64::from_le_bytes)
}

/// Convert a file offset from the image into a buffer index.
pub(crate) fn to_index(value: u64, available: usize) -> Result<usize, ElfError> {
    usize::try_from(value).map_err(|_| ElfError::Truncated {
        offset: value,
        needed: 0,
        available: available as u64,
    })
}

/// Borrow the raw bytes of a header table of `count` entries of `entry_size` bytes.
///
/// # Errors
///
/// Returns [`ElfError::UnsupportedLayout`] if `entry_size` is smaller than
/// `canonical`, or [`ElfError::Truncated`] if the table runs past the end of `data`.
pub(crate) fn table_bytes(
    data: &[u8],
    offset: u64,
    entry_size: usize,
    count: usize,
    canonical: usize,
    table: Table,
) -> Result<&[u8], ElfError> {
    if count == 0 {
        return Ok(&[]);
    }
    if entry_size < canonical {
        return Err(ElfError::UnsupportedLayout(LayoutIssue::EntryTooSmall {
            table,
            expected: canonical,
            actual: entry_size,
        }));
    }
    let start = to_index(offset, data.len())?;
    // Both factors come from u16 header fields.
    let size = entry_size * count;
    start
        .checked_add(size)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| ElfError::truncated(start, size, data.len()))
}

/// Which header table an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// The program header table (segments).
    Program,
    /// The section header table.
    Section,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program => write!(f, "program header table"),
            Self::Section => write!(f, "section header table"),
        }
    }
}

/// The reason a file layout cannot be represented by [`crate::ElfImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutIssue {
    /// The declared entry size is smaller than the canonical ELF64 entry.
    EntryTooSmall {
        /// Table whose entry size is wrong.
        table: Table,
        /// Canonical entry size.
        expected: usize,
        /// Entry size declared in the file header.
        actual: usize,
    },
    /// An entry no longer matches the table stride declared in the header.
    EntrySizeMismatch {
        /// Table containing the entry.
        table: Table,
        /// Index of the offending entry.
        index: usize,
        /// Stride declared in the file header.
        expected: usize,
        /// Encoded size of the entry.
        actual: usize,
    },
    /// Two known regions overlap or appear out of order.
    RegionOrder {
        /// Name of the region that starts too early.
        region: &'static str,
        /// Where the region starts.
        start: u64,
        /// Where the preceding region ends.
        previous_end: u64,
    },
}

impl fmt::Display for LayoutIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryTooSmall {
                table,
                expected,
                actual,
            } => write!(
                f,
                "{table} entry size {actual} is smaller than the canonical {expected}"
            ),
            Self::EntrySizeMismatch {
                table,
                index,
                expected,
                actual,
            } => write!(
                f,
                "{table} entry {index} encodes to {actual} bytes, header declares {expected}"
            ),
            Self::RegionOrder {
                region,
                start,
                previous_end,
            } => write!(
                f,
                "{region} starts at {start:#x}, before the previous region ends at {previous_end:#x}"
            ),
        }
    }
}

/// Errors that can occur when parsing, embedding into, or serializing an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The input data is too short for a structurally required region.
    Truncated {
        /// Where the region starts.
        offset: u64,
        /// Bytes the region needs.
        needed: u64,
        /// Bytes actually available from `offset`.
        available: u64,
    },
    /// A string scan or offset computation ran past the end of the buffer.
    OutOfBounds {
        /// Offset the scan started at.
        offset: u64,
        /// Length of the buffer.
        len: u64,
    },
    /// No section matches the declared string table index with type `SHT_STRTAB`.
    MissingStringTable {
        /// The header's `e_shstrndx`.
        index: u16,
    },
    /// The layout cannot be represented by the model.
    UnsupportedLayout(LayoutIssue),
    /// Shifting a field during embed overflowed its numeric range.
    OffsetOverflow {
        /// Name of the field being shifted.
        field: &'static str,
        /// Value before the shift.
        value: u64,
        /// Requested shift.
        shift: u64,
    },
}

impl ElfError {
    pub(crate) fn truncated(offset: usize, needed: usize, len: usize) -> Self {
        Self::Truncated {
            offset: offset as u64,
            needed: needed as u64,
            available: len.saturating_sub(offset) as u64,
        }
    }
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "input data truncated: need {needed} bytes at {offset:#x}, {available} available"
            ),
            Self::OutOfBounds { offset, len } => {
                write!(f, "read at {offset:#x} runs past the end of a {len}-byte buffer")
            }
            Self::MissingStringTable { index } => {
                write!(f, "section {index} is not a string table (SHT_STRTAB)")
            }
            Self::UnsupportedLayout(issue) => write!(f, "unsupported layout: {issue}"),
            Self::OffsetOverflow {
                field,
                value,
                shift,
            } => write!(f, "shifting {field} ({value:#x}) by {shift:#x} overflows"),
        }
    }
}

impl core::error::Error for ElfError {}

/// Parsed ELF64 file header.
///
/// Every field of the on-disk header is kept, so [`FileHeader::serialize`]
/// reproduces the original 64 bytes exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Identification bytes (magic, class, encoding, OS/ABI, padding).
    pub e_ident: [u8; 16],
    /// Object file type.
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Object file format version.
    pub e_version: u32,
    /// Virtual address of the entry point.
    pub e_entry: u64,
    /// Offset of the program header table in the file.
    pub e_phoff: u64,
    /// Offset of the section header table in the file.
    pub e_shoff: u64,
    /// Processor-specific flags.
    pub e_flags: u32,
    /// Size of the ELF header in bytes.
    pub e_ehsize: u16,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header string table index.
    pub e_shstrndx: u16,
}

impl FileHeader {
    /// Parse an ELF64 file header from the first 64 bytes of `data`.
    ///
    /// Only the field layout is decoded; magic, class and encoding are carried
    /// in `e_ident` without validation.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] if `data` is shorter than 64 bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < ELF64_EHDR_SIZE {
            return Err(ElfError::truncated(0, ELF64_EHDR_SIZE, data.len()));
        }

        Ok(Self {
            e_ident: read_array(data, 0)?,
            e_type: le_u16(data, 16)?,
            e_machine: le_u16(data, 18)?,
            e_version: le_u32(data, 20)?,
            e_entry: le_u64(data, 24)?,
            e_phoff: le_u64(data, 32)?,
            e_shoff: le_u64(data, 40)?,
            e_flags: le_u32(data, 48)?,
            e_ehsize: le_u16(data, 52)?,
            e_phentsize: le_u16(data, 54)?,
            e_phnum: le_u16(data, 56)?,
            e_shentsize: le_u16(data, 58)?,
            e_shnum: le_u16(data, 60)?,
            e_shstrndx: le_u16(data, 62)?,
        })
    }

    /// Encode the header back into its 64-byte on-disk form.
    #[must_use]
    pub fn serialize(&self) -> [u8; ELF64_EHDR_SIZE] {
        let mut b = [0u8; ELF64_EHDR_SIZE];
        b[0..16].copy_from_slice(&self.e_ident);
        b[16..18].copy_from_slice(&self.e_type.to_le_bytes());
        b[18..20].copy_from_slice(&self.e_machine.to_le_bytes());
        b[20..24].copy_from_slice(&self.e_version.to_le_bytes());
        b[24..32].copy_from_slice(&self.e_entry.to_le_bytes());
        b[32..40].copy_from_slice(&self.e_phoff.to_le_bytes());
        b[40..48].copy_from_slice(&self.e_shoff.to_le_bytes());
        b[48..52].copy_from_slice(&self.e_flags.to_le_bytes());
        b[52..54].copy_from_slice(&self.e_ehsize.to_le_bytes());
        b[54..56].copy_from_slice(&self.e_phentsize.to_le_bytes());
        b[56..58].copy_from_slice(&self.e_phnum.to_le_bytes());
        b[58..60].copy_from_slice(&self.e_shentsize.to_le_bytes());
        b[60..62].copy_from_slice(&self.e_shnum.to_le_bytes());
        b[62..64].copy_from_slice(&self.e_shstrndx.to_le_bytes());
        b
    }

    /// Returns `true` if the file is a shared object (`ET_DYN`), i.e. PIE.
    #[must_use]
    pub fn is_position_independent(&self) -> bool {
        self.e_type == ET_DYN
    }

    /// Total size in bytes of the program header table.
    #[must_use]
    pub fn program_table_size(&self) -> u64 {
        u64::from(self.e_phnum) * u64::from(self.e_phentsize)
    }

    /// Total size in bytes of the section header table.
    #[must_use]
    pub fn section_table_size(&self) -> u64 {
        u64::from(self.e_shnum) * u64::from(self.e_shentsize)
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{entry: {:#x}, shoff: {:#x}, shsize: {:#x}, phoff: {:#x}, phsize: {:#x}, type: {:#x}}}",
            self.e_entry,
            self.e_shoff,
            self.section_table_size(),
            self.e_phoff,
            self.program_table_size(),
            self.e_type,
        )
    }
}
