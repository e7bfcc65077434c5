//! Machine-readable summary of a parsed image for `inspect --json`.

use elfpack_elf::{ElfImage, ImageState, Section, Segment};
use serde::Serialize;

/// Top-level JSON report.
#[derive(Debug, Serialize)]
pub struct ImageReport {
    /// Lifecycle state: `parsed` or `embedded`.
    pub state: &'static str,
    /// Object file type (`e_type`).
    pub e_type: u16,
    /// Target machine (`e_machine`).
    pub e_machine: u16,
    /// Whether the file is `ET_DYN`.
    pub position_independent: bool,
    /// Entry point address.
    pub entry: u64,
    /// Program header table offset.
    pub phoff: u64,
    /// Section header table offset.
    pub shoff: u64,
    /// Serialized size in bytes.
    pub size: usize,
    /// Sizes of the opaque regions.
    pub gaps: GapReport,
    /// Program headers in file order.
    pub segments: Vec<SegmentReport>,
    /// Section headers in file order.
    pub sections: Vec<SectionReport>,
}

/// Sizes of the opaque regions.
#[derive(Debug, Serialize)]
pub struct GapReport {
    /// Bytes between the file header and the program header table.
    pub header_trailer: usize,
    /// Bytes between the two header tables.
    pub inter_table: usize,
    /// Bytes after the section header table.
    pub trailer: usize,
}

/// One program header.
#[derive(Debug, Serialize)]
pub struct SegmentReport {
    /// Segment type.
    pub p_type: u32,
    /// `PF_*` flags.
    pub flags: u32,
    /// File offset.
    pub offset: u64,
    /// Virtual address.
    pub vaddr: u64,
    /// Physical address.
    pub paddr: u64,
    /// Size in the file.
    pub filesz: u64,
    /// Size in memory.
    pub memsz: u64,
    /// Required alignment.
    pub align: u64,
}

/// One section header with its resolved name.
#[derive(Debug, Serialize)]
pub struct SectionReport {
    /// Name from the section-name string table.
    pub name: String,
    /// Section type.
    pub sh_type: u32,
    /// `SHF_*` flags.
    pub flags: u64,
    /// Virtual address, 0 if not loaded.
    pub addr: u64,
    /// File offset, 0 if not backed by the file.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
}

impl From<&Segment> for SegmentReport {
    fn from(s: &Segment) -> Self {
        Self {
            p_type: s.p_type,
            flags: s.p_flags,
            offset: s.p_offset,
            vaddr: s.p_vaddr,
            paddr: s.p_paddr,
            filesz: s.p_filesz,
            memsz: s.p_memsz,
            align: s.p_align,
        }
    }
}

impl From<&Section> for SectionReport {
    fn from(s: &Section) -> Self {
        Self {
            name: s.name.clone(),
            sh_type: s.sh_type,
            flags: s.sh_flags,
            addr: s.sh_addr,
            offset: s.sh_offset,
            size: s.sh_size,
        }
    }
}

impl From<&ElfImage> for ImageReport {
    fn from(image: &ElfImage) -> Self {
        let header = image.header();
        Self {
            state: match image.state() {
                ImageState::Parsed => "parsed",
                ImageState::Embedded => "embedded",
            },
            e_type: header.e_type,
            e_machine: header.e_machine,
            position_independent: header.is_position_independent(),
            entry: header.e_entry,
            phoff: header.e_phoff,
            shoff: header.e_shoff,
            size: image.serialized_len(),
            gaps: GapReport {
                header_trailer: image.header_trailer().len(),
                inter_table: image.inter_table().len(),
                trailer: image.trailer().len(),
            },
            segments: image.segments().iter().map(SegmentReport::from).collect(),
            sections: image.sections().iter().map(SectionReport::from).collect(),
        }
    }
}
