//! ELF64 program header table parsing and serialization.
//!
//! Provides [`Segment`] for one program header entry, and table-level
//! [`parse_table`] / [`serialize_table`] that preserve entry order and any
//! bytes an oversized entry carries beyond the canonical 56.

use alloc::vec::Vec;
use core::fmt;

use crate::header::{
    ELF64_PHDR_SIZE, ElfError, LayoutIssue, Table, le_u32, le_u64, table_bytes,
};

/// Program header type: loadable segment.
pub const PT_LOAD: u32 = 1;

/// Segment flag: executable.
pub const PF_X: u32 = 0x1;

/// Segment flag: writable.
pub const PF_W: u32 = 0x2;

/// Segment flag: readable.
pub const PF_R: u32 = 0x4;

/// One ELF64 program header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment type.
    pub p_type: u32,
    /// Segment flags (`PF_R`, `PF_W`, `PF_X`).
    pub p_flags: u32,
    /// Offset of the segment data in the file.
    pub p_offset: u64,
    /// Virtual address of the segment.
    pub p_vaddr: u64,
    /// Physical address of the segment.
    pub p_paddr: u64,
    /// Size of the segment data in the file.
    pub p_filesz: u64,
    /// Size of the segment in memory.
    pub p_memsz: u64,
    /// Required alignment.
    pub p_align: u64,
    /// Entry bytes beyond the canonical 56, kept verbatim.
    pub tail: Vec<u8>,
}

impl Segment {
    /// Parse one program header from `entry`, which holds exactly one
    /// table stride of at least 56 bytes.
    pub(crate) fn parse(entry: &[u8]) -> Result<Self, ElfError> {
        Ok(Self {
            p_type: le_u32(entry, 0)?,
            p_flags: le_u32(entry, 4)?,
            p_offset: le_u64(entry, 8)?,
            p_vaddr: le_u64(entry, 16)?,
            p_paddr: le_u64(entry, 24)?,
            p_filesz: le_u64(entry, 32)?,
            p_memsz: le_u64(entry, 40)?,
            p_align: le_u64(entry, 48)?,
            tail: entry.get(ELF64_PHDR_SIZE..).unwrap_or_default().to_vec(),
        })
    }

    /// Append the encoded entry (canonical fields followed by the tail) to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.p_type.to_le_bytes());
        out.extend_from_slice(&self.p_flags.to_le_bytes());
        out.extend_from_slice(&self.p_offset.to_le_bytes());
        out.extend_from_slice(&self.p_vaddr.to_le_bytes());
        out.extend_from_slice(&self.p_paddr.to_le_bytes());
        out.extend_from_slice(&self.p_filesz.to_le_bytes());
        out.extend_from_slice(&self.p_memsz.to_le_bytes());
        out.extend_from_slice(&self.p_align.to_le_bytes());
        out.extend_from_slice(&self.tail);
    }

    /// Size of this entry once encoded.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        ELF64_PHDR_SIZE + self.tail.len()
    }

    /// Returns `true` for `PT_LOAD` segments.
    #[must_use]
    pub fn is_load(&self) -> bool {
        self.p_type == PT_LOAD
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{offset: {:#x}, vaddr: {:#x}, paddr: {:#x}, filesz: {:#x}, memsz: {:#x}, type: {:#x}}}",
            self.p_offset, self.p_vaddr, self.p_paddr, self.p_filesz, self.p_memsz, self.p_type,
        )
    }
}

/// Parse `count` program headers of `entry_size` bytes starting at `offset`.
///
/// # Errors
///
/// Returns [`ElfError::UnsupportedLayout`] if `entry_size` is below 56, or
/// [`ElfError::Truncated`] if the table runs past the end of `data`.
pub fn parse_table(
    data: &[u8],
    offset: u64,
    entry_size: u16,
    count: u16,
) -> Result<Vec<Segment>, ElfError> {
    let entry_size = usize::from(entry_size);
    let bytes = table_bytes(
        data,
        offset,
        entry_size,
        usize::from(count),
        ELF64_PHDR_SIZE,
        Table::Program,
    )?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    bytes.chunks_exact(entry_size).map(Segment::parse).collect()
}

/// Append every segment to `out` in order.
///
/// # Errors
///
/// Returns [`ElfError::UnsupportedLayout`] if a segment does not encode to
/// exactly `entry_size` bytes, since the table stride would no longer match
/// the header.
pub fn serialize_table(
    segments: &[Segment],
    entry_size: u16,
    out: &mut Vec<u8>,
) -> Result<(), ElfError> {
    let expected = usize::from(entry_size);
    for (index, segment) in segments.iter().enumerate() {
        if segment.encoded_len() != expected {
            return Err(ElfError::UnsupportedLayout(LayoutIssue::EntrySizeMismatch {
                table: Table::Program,
                index,
                expected,
                actual: segment.encoded_len(),
            }));
        }
        segment.write_to(out);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::{append_phdr, make_elf_header, set_u16};

    #[test]
    fn no_segments_yields_empty_table() {
        let buf = make_elf_header();
        let segments = parse_table(&buf, 64, 56, 0).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn parse_fields_in_order() {
        let mut buf = make_elf_header();
        append_phdr(&mut buf, PT_LOAD, PF_R | PF_X, 0x78, 0x40_0000, 0x10, 0x110);

        let segments = parse_table(&buf, 64, 56, 1).unwrap();
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        assert_eq!(seg.p_type, PT_LOAD);
        assert_eq!(seg.p_flags, PF_R | PF_X);
        assert_eq!(seg.p_offset, 0x78);
        assert_eq!(seg.p_vaddr, 0x40_0000);
        assert_eq!(seg.p_paddr, 0x40_0000);
        assert_eq!(seg.p_filesz, 0x10);
        assert_eq!(seg.p_memsz, 0x110);
        assert_eq!(seg.p_align, 0x1000);
        assert!(seg.tail.is_empty());
        assert!(seg.is_load());
    }

    #[test]
    fn order_is_preserved() {
        let mut buf = make_elf_header();
        let pt_note = 4;
        append_phdr(&mut buf, PT_LOAD, PF_R, 0x100, 0x40_0000, 4, 4);
        append_phdr(&mut buf, pt_note, 0, 0, 0, 0, 0);
        append_phdr(&mut buf, PT_LOAD, PF_R | PF_W, 0x104, 0x60_0000, 4, 0x1000);

        let segments = parse_table(&buf, 64, 56, 3).unwrap();
        let types: Vec<_> = segments.iter().map(|s| s.p_type).collect();
        assert_eq!(types, [PT_LOAD, pt_note, PT_LOAD]);
        assert_eq!(segments[2].p_vaddr, 0x60_0000);
    }

    #[test]
    fn round_trip_canonical_table() {
        let mut buf = make_elf_header();
        append_phdr(&mut buf, PT_LOAD, PF_R, 0x100, 0x40_0000, 4, 4);
        append_phdr(&mut buf, PT_LOAD, PF_R | PF_W, 0x104, 0x60_0000, 4, 0x1000);

        let segments = parse_table(&buf, 64, 56, 2).unwrap();
        let mut out = Vec::new();
        serialize_table(&segments, 56, &mut out).unwrap();
        assert_eq!(out, buf[64..]);
    }

    #[test]
    fn oversized_entries_keep_their_tail() {
        let mut buf = make_elf_header();
        set_u16(&mut buf, 54, 64);
        for i in 0..2u8 {
            let start = buf.len();
            append_phdr(&mut buf, PT_LOAD, PF_R, 0x100, 0x40_0000, 4, 4);
            buf.extend_from_slice(&[0xe0 + i; 8]);
            assert_eq!(buf.len() - start, 64);
        }

        let segments = parse_table(&buf, 64, 64, 2).unwrap();
        assert_eq!(segments[0].tail, [0xe0; 8]);
        assert_eq!(segments[1].tail, [0xe1; 8]);
        assert_eq!(segments[1].p_offset, 0x100);

        let mut out = Vec::new();
        serialize_table(&segments, 64, &mut out).unwrap();
        assert_eq!(out, buf[64..]);
    }

    #[test]
    fn reject_undersized_entries() {
        let mut buf = make_elf_header();
        append_phdr(&mut buf, PT_LOAD, PF_R, 0, 0, 0, 0);
        assert_eq!(
            parse_table(&buf, 64, 32, 1),
            Err(ElfError::UnsupportedLayout(LayoutIssue::EntryTooSmall {
                table: Table::Program,
                expected: 56,
                actual: 32,
            }))
        );
    }

    #[test]
    fn reject_table_out_of_bounds() {
        let buf = make_elf_header();
        assert_eq!(
            parse_table(&buf, 64, 56, 1),
            Err(ElfError::Truncated {
                offset: 64,
                needed: 56,
                available: 0
            })
        );
        assert!(matches!(
            parse_table(&buf, u64::MAX, 56, 1),
            Err(ElfError::Truncated { .. })
        ));
    }

    #[test]
    fn serialize_rejects_stride_mismatch() {
        let mut buf = make_elf_header();
        append_phdr(&mut buf, PT_LOAD, PF_R, 0, 0, 0, 0);
        let mut segments = parse_table(&buf, 64, 56, 1).unwrap();
        segments[0].tail.push(0);

        let mut out = Vec::new();
        assert_eq!(
            serialize_table(&segments, 56, &mut out),
            Err(ElfError::UnsupportedLayout(LayoutIssue::EntrySizeMismatch {
                table: Table::Program,
                index: 0,
                expected: 56,
                actual: 57,
            }))
        );
    }

    #[test]
    fn display_summary() {
        let mut buf = make_elf_header();
        append_phdr(&mut buf, PT_LOAD, PF_R, 0x78, 0x40_0000, 0x10, 0x20);
        let segments = parse_table(&buf, 64, 56, 1).unwrap();
        let text = format!("{}", segments[0]);
        assert!(text.contains("offset: 0x78"));
        assert!(text.contains("memsz: 0x20"));
    }
}
