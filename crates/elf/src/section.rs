//! ELF64 section header table parsing, name resolution, and serialization.
//!
//! Section names are not stored in the headers themselves: each header holds
//! an offset into the section-name string table, located through the file
//! header's `e_shstrndx`. Names are resolved once, after the whole table has
//! been parsed.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::header::{
    ELF64_SHDR_SIZE, ElfError, LayoutIssue, Table, le_u32, le_u64, table_bytes,
};
use crate::strtab::{StringTable, read_c_string};

/// Section type: inactive header.
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined contents.
pub const SHT_PROGBITS: u32 = 1;

/// Section type: symbol table.
pub const SHT_SYMTAB: u32 = 2;

/// Section type: string table.
pub const SHT_STRTAB: u32 = 3;

/// Section type: occupies no space in the file (`.bss`).
pub const SHT_NOBITS: u32 = 8;

/// Section flag: writable data.
pub const SHF_WRITE: u64 = 0x1;

/// Section flag: occupies memory during execution.
pub const SHF_ALLOC: u64 = 0x2;

/// Section flag: executable machine instructions.
pub const SHF_EXECINSTR: u64 = 0x4;

/// One ELF64 section header entry, with its resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Offset into the section header string table for this section's name.
    pub sh_name: u32,
    /// Section type (`SHT_PROGBITS`, `SHT_STRTAB`, etc.).
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u64,
    /// Virtual address of the section in memory (0 for non-loaded sections).
    pub sh_addr: u64,
    /// File offset of the section data (0 for sections without file backing).
    pub sh_offset: u64,
    /// Size of the section data in bytes.
    pub sh_size: u64,
    /// Associated section index.
    pub sh_link: u32,
    /// Extra info (interpretation depends on section type).
    pub sh_info: u32,
    /// Required alignment of the section.
    pub sh_addralign: u64,
    /// Size of each entry, for sections with fixed-size entries.
    pub sh_entsize: u64,
    /// Entry bytes beyond the canonical 64, kept verbatim.
    pub tail: Vec<u8>,
    /// Name read from the string table. Derived; never serialized.
    pub name: String,
}

impl Section {
    /// Parse one section header from `entry`, which holds exactly one
    /// table stride of at least 64 bytes. The name is left empty.
    pub(crate) fn parse(entry: &[u8]) -> Result<Self, ElfError> {
        Ok(Self {
            sh_name: le_u32(entry, 0)?,
            sh_type: le_u32(entry, 4)?,
            sh_flags: le_u64(entry, 8)?,
            sh_addr: le_u64(entry, 16)?,
            sh_offset: le_u64(entry, 24)?,
            sh_size: le_u64(entry, 32)?,
            sh_link: le_u32(entry, 40)?,
            sh_info: le_u32(entry, 44)?,
            sh_addralign: le_u64(entry, 48)?,
            sh_entsize: le_u64(entry, 56)?,
            tail: entry.get(ELF64_SHDR_SIZE..).unwrap_or_default().to_vec(),
            name: String::new(),
        })
    }

    /// Append the encoded entry (canonical fields followed by the tail) to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.sh_name.to_le_bytes());
        out.extend_from_slice(&self.sh_type.to_le_bytes());
        out.extend_from_slice(&self.sh_flags.to_le_bytes());
        out.extend_from_slice(&self.sh_addr.to_le_bytes());
        out.extend_from_slice(&self.sh_offset.to_le_bytes());
        out.extend_from_slice(&self.sh_size.to_le_bytes());
        out.extend_from_slice(&self.sh_link.to_le_bytes());
        out.extend_from_slice(&self.sh_info.to_le_bytes());
        out.extend_from_slice(&self.sh_addralign.to_le_bytes());
        out.extend_from_slice(&self.sh_entsize.to_le_bytes());
        out.extend_from_slice(&self.tail);
    }

    /// Size of this entry once encoded.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        ELF64_SHDR_SIZE + self.tail.len()
    }

    /// Returns `true` if the section has contents in the file.
    #[must_use]
    pub fn has_file_backing(&self) -> bool {
        self.sh_offset != 0
    }

    /// Returns the raw contents of the section in `data`, if in bounds.
    ///
    /// `SHT_NOBITS` sections have no contents and yield an empty slice.
    #[must_use]
    pub fn data<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        if self.sh_type == SHT_NOBITS {
            return Some(&[]);
        }
        let start = usize::try_from(self.sh_offset).ok()?;
        let size = usize::try_from(self.sh_size).ok()?;
        data.get(start..start.checked_add(size)?)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {{name_offset: {:#x}, type: {:#x}, offset: {:#x}, addr: {:#x}, size: {:#x}}}",
            self.name, self.sh_name, self.sh_type, self.sh_offset, self.sh_addr, self.sh_size,
        )
    }
}

/// Parse `count` section headers of `entry_size` bytes starting at `offset`.
///
/// Names are left empty; call [`resolve_names`] once the table is complete.
///
/// # Errors
///
/// Returns [`ElfError::UnsupportedLayout`] if `entry_size` is below 64, or
/// [`ElfError::Truncated`] if the table runs past the end of `data`.
pub fn parse_table(
    data: &[u8],
    offset: u64,
    entry_size: u16,
    count: u16,
) -> Result<Vec<Section>, ElfError> {
    let entry_size = usize::from(entry_size);
    let bytes = table_bytes(
        data,
        offset,
        entry_size,
        usize::from(count),
        ELF64_SHDR_SIZE,
        Table::Section,
    )?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    bytes.chunks_exact(entry_size).map(Section::parse).collect()
}

/// Find the section-name string table: the section at index `shstrndx`, if
/// and only if its type is `SHT_STRTAB`.
///
/// # Errors
///
/// Returns [`ElfError::MissingStringTable`] if no section matches.
pub fn find_string_table(sections: &[Section], shstrndx: u16) -> Result<&Section, ElfError> {
    sections
        .iter()
        .enumerate()
        .find(|(i, s)| *i == usize::from(shstrndx) && s.sh_type == SHT_STRTAB)
        .map(|(_, s)| s)
        .ok_or(ElfError::MissingStringTable { index: shstrndx })
}

/// Fill in every section's `name` from the string table at index `shstrndx`.
///
/// Each name is read from `strtab.sh_offset + section.sh_name` in `data`.
/// A table with no sections has nothing to resolve and succeeds.
///
/// # Errors
///
/// Returns [`ElfError::MissingStringTable`] if `shstrndx` does not name a
/// `SHT_STRTAB` section, or [`ElfError::OutOfBounds`] if a name runs past
/// the end of `data`.
pub fn resolve_names(data: &[u8], sections: &mut [Section], shstrndx: u16) -> Result<(), ElfError> {
    if sections.is_empty() {
        return Ok(());
    }
    let base = find_string_table(sections, shstrndx)?.sh_offset;
    let len = data.len() as u64;

    let names = sections
        .iter()
        .map(|section| {
            let offset = base
                .checked_add(u64::from(section.sh_name))
                .ok_or(ElfError::OutOfBounds { offset: base, len })?;
            let index = usize::try_from(offset).map_err(|_| ElfError::OutOfBounds { offset, len })?;
            read_c_string(data, index)
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (section, name) in sections.iter_mut().zip(names) {
        section.name = name;
    }
    Ok(())
}

/// Returns a borrowed view of the section-name string table's contents.
#[must_use]
pub fn string_table<'a>(
    data: &'a [u8],
    sections: &[Section],
    shstrndx: u16,
) -> Option<StringTable<'a>> {
    let shdr = find_string_table(sections, shstrndx).ok()?;
    shdr.data(data).map(StringTable::new)
}

/// Append every section header to `out` in order.
///
/// # Errors
///
/// Returns [`ElfError::UnsupportedLayout`] if a section does not encode to
/// exactly `entry_size` bytes.
pub fn serialize_table(
    sections: &[Section],
    entry_size: u16,
    out: &mut Vec<u8>,
) -> Result<(), ElfError> {
    let expected = usize::from(entry_size);
    for (index, section) in sections.iter().enumerate() {
        if section.encoded_len() != expected {
            return Err(ElfError::UnsupportedLayout(LayoutIssue::EntrySizeMismatch {
                table: Table::Section,
                index,
                expected,
                actual: section.encoded_len(),
            }));
        }
        section.write_to(out);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::tests::{append_section, make_elf_header, set_u16, set_u64};

    /// Section header string table: "\0.text\0.bss\0.shstrtab\0".
    pub(crate) const SHSTRTAB: &[u8] = b"\0.text\0.bss\0.shstrtab\0";

    /// Build a test ELF with sections NULL, .text, .bss, .shstrtab laid out as:
    ///
    ///   offset 64:  .text data (16 bytes)
    ///   offset 80:  .shstrtab data (22 bytes)
    ///   offset 104: section headers (4 * 64 bytes), 8-byte aligned
    pub(crate) fn make_elf_with_sections() -> Vec<u8> {
        let mut buf = make_elf_header();
        // No program headers: the table is absent.
        set_u64(&mut buf, 32, 0);

        let text_off = 64u64;
        let shstrtab_off = text_off + 16;
        let shdr_start = 104u64;

        buf.extend_from_slice(&[0x90; 16]);
        buf.extend_from_slice(SHSTRTAB);
        buf.resize(104, 0);

        set_u64(&mut buf, 40, shdr_start);
        set_u16(&mut buf, 62, 3);

        append_section(&mut buf, 0, SHT_NULL, 0, 0, 0, 0, 0, 0);
        append_section(
            &mut buf,
            1,
            SHT_PROGBITS,
            SHF_ALLOC | SHF_EXECINSTR,
            0x40_1000,
            text_off,
            16,
            0,
            16,
        );
        append_section(
            &mut buf,
            7,
            SHT_NOBITS,
            SHF_ALLOC | SHF_WRITE,
            0x40_2000,
            0,
            0x100,
            0,
            8,
        );
        append_section(
            &mut buf,
            12,
            SHT_STRTAB,
            0,
            0,
            shstrtab_off,
            SHSTRTAB.len() as u64,
            0,
            1,
        );
        buf
    }

    fn parse_all(buf: &[u8]) -> Vec<Section> {
        parse_table(buf, 104, 64, 4).expect("valid section table")
    }

    #[test]
    fn no_sections_yields_empty_table() {
        let buf = make_elf_header();
        assert!(parse_table(&buf, 0, 64, 0).unwrap().is_empty());
    }

    #[test]
    fn section_fields() {
        let buf = make_elf_with_sections();
        let sections = parse_all(&buf);

        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].sh_type, SHT_NULL);
        assert_eq!(sections[1].sh_type, SHT_PROGBITS);
        assert_eq!(sections[1].sh_flags, SHF_ALLOC | SHF_EXECINSTR);
        assert_eq!(sections[1].sh_addr, 0x40_1000);
        assert_eq!(sections[1].sh_offset, 64);
        assert_eq!(sections[1].sh_size, 16);
        assert_eq!(sections[1].sh_addralign, 16);
        assert_eq!(sections[2].sh_type, SHT_NOBITS);
        assert!(!sections[2].has_file_backing());
        assert_eq!(sections[3].sh_type, SHT_STRTAB);
        assert!(sections.iter().all(|s| s.name.is_empty()));
    }

    #[test]
    fn resolve_section_names() {
        let buf = make_elf_with_sections();
        let mut sections = parse_all(&buf);
        resolve_names(&buf, &mut sections, 3).unwrap();

        let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["", ".text", ".bss", ".shstrtab"]);
    }

    #[test]
    fn string_table_must_have_strtab_type() {
        let buf = make_elf_with_sections();
        let mut sections = parse_all(&buf);
        // Index 1 is .text (SHT_PROGBITS), not a string table.
        assert_eq!(
            resolve_names(&buf, &mut sections, 1),
            Err(ElfError::MissingStringTable { index: 1 })
        );
        assert!(sections.iter().all(|s| s.name.is_empty()));
    }

    #[test]
    fn string_table_index_out_of_range() {
        let buf = make_elf_with_sections();
        let mut sections = parse_all(&buf);
        assert_eq!(
            resolve_names(&buf, &mut sections, 9),
            Err(ElfError::MissingStringTable { index: 9 })
        );
    }

    #[test]
    fn resolve_with_no_sections_is_noop() {
        let buf = make_elf_header();
        let mut sections = Vec::new();
        assert_eq!(resolve_names(&buf, &mut sections, 0), Ok(()));
    }

    #[test]
    fn name_past_end_is_out_of_bounds() {
        let buf = make_elf_with_sections();
        let mut sections = parse_all(&buf);
        sections[1].sh_name = 0x1_0000;
        assert_eq!(
            resolve_names(&buf, &mut sections, 3),
            Err(ElfError::OutOfBounds {
                offset: 80 + 0x1_0000,
                len: buf.len() as u64
            })
        );
    }

    #[test]
    fn name_offset_overflow_is_out_of_bounds() {
        let buf = make_elf_with_sections();
        let mut sections = parse_all(&buf);
        sections[3].sh_offset = u64::MAX;
        assert!(matches!(
            resolve_names(&buf, &mut sections, 3),
            Err(ElfError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn section_data_bounds_check() {
        let buf = make_elf_with_sections();
        let sections = parse_all(&buf);
        assert_eq!(sections[1].data(&buf), Some(&[0x90; 16][..]));
        assert_eq!(sections[2].data(&buf), Some(&[][..]));
        assert_eq!(sections[3].data(&buf), Some(SHSTRTAB));

        let mut oversized = sections[1].clone();
        oversized.sh_size = 1 << 20;
        assert_eq!(oversized.data(&buf), None);
    }

    #[test]
    fn borrowed_string_table() {
        let buf = make_elf_with_sections();
        let sections = parse_all(&buf);
        let strtab = string_table(&buf, &sections, 3).expect("shstrtab");
        assert_eq!(strtab.get(7), Some(".bss"));
        assert!(string_table(&buf, &sections, 2).is_none());
    }

    #[test]
    fn round_trip_section_table() {
        let buf = make_elf_with_sections();
        let mut sections = parse_all(&buf);
        resolve_names(&buf, &mut sections, 3).unwrap();

        let mut out = Vec::new();
        serialize_table(&sections, 64, &mut out).unwrap();
        assert_eq!(out, buf[104..]);
    }

    #[test]
    fn reject_undersized_entries() {
        let buf = make_elf_with_sections();
        assert_eq!(
            parse_table(&buf, 104, 40, 4),
            Err(ElfError::UnsupportedLayout(LayoutIssue::EntryTooSmall {
                table: Table::Section,
                expected: 64,
                actual: 40,
            }))
        );
    }

    #[test]
    fn reject_table_out_of_bounds() {
        let buf = make_elf_with_sections();
        assert!(matches!(
            parse_table(&buf, 104, 64, 5),
            Err(ElfError::Truncated { offset: 104, needed: 320, .. })
        ));
    }

    #[test]
    fn display_uses_resolved_name() {
        let buf = make_elf_with_sections();
        let mut sections = parse_all(&buf);
        resolve_names(&buf, &mut sections, 3).unwrap();
        let text = format!("{}", sections[1]);
        assert!(text.starts_with(".text:"));
        assert!(text.contains("addr: 0x401000"));
    }
}
