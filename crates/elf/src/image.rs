//! Whole-file ELF64 model: parse, embed, serialize.
//!
//! An [`ElfImage`] splits a file into six consecutive regions:
//!
//! ```text
//! | file header | header trailer | program headers | inter-table | section headers | trailer |
//! ```
//!
//! The three header regions are modeled field by field; the three others are
//! carried as opaque [`Gap`]s. Serializing writes the regions back in the same
//! order, so an unmodified image reproduces its input byte for byte.

use alloc::vec::Vec;
use core::fmt;

use crate::gap::Gap;
use crate::header::{ELF64_EHDR_SIZE, ElfError, FileHeader};
use crate::section::{self, Section};
use crate::segment::{self, Segment};

/// Where an image is in its lifecycle.
///
/// There is no unparsed state: an [`ElfImage`] only exists after a successful
/// parse, and [`ElfImage::dump`] consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// Freshly parsed; serializing reproduces the input.
    Parsed,
    /// At least one prefix has been embedded.
    Embedded,
}

/// A parsed ELF64 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfImage {
    header: FileHeader,
    segments: Vec<Segment>,
    sections: Vec<Section>,
    header_trailer: Gap,
    inter_table: Gap,
    trailer: Gap,
    state: ImageState,
}

/// End of a region of `size` bytes starting at `start`.
fn region_end(start: u64, size: u64, len: usize) -> Result<u64, ElfError> {
    start.checked_add(size).ok_or(ElfError::Truncated {
        offset: start,
        needed: size,
        available: (len as u64).saturating_sub(start),
    })
}

/// Shift `value` by `shift`.
fn shift_field(field: &'static str, value: u64, shift: u64) -> Result<u64, ElfError> {
    value
        .checked_add(shift)
        .ok_or(ElfError::OffsetOverflow {
            field,
            value,
            shift,
        })
}

/// Shift `value` by `shift` unless it is zero, which marks an absent location.
fn shift_present(field: &'static str, value: u64, shift: u64) -> Result<u64, ElfError> {
    if value == 0 {
        Ok(0)
    } else {
        shift_field(field, value, shift)
    }
}

impl ElfImage {
    /// Parse a whole ELF64 file.
    ///
    /// The program header table must start at or after the 64-byte file
    /// header, and the section header table at or after the end of the
    /// program header table. A table with no entries is absent and takes no
    /// space, whatever its header offset says.
    ///
    /// # Errors
    ///
    /// - [`ElfError::Truncated`] if the header or a table runs past the end of `data`.
    /// - [`ElfError::UnsupportedLayout`] if the regions are out of order or an
    ///   entry size is below the canonical size.
    /// - [`ElfError::MissingStringTable`] / [`ElfError::OutOfBounds`] if section
    ///   names cannot be resolved.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        let header = FileHeader::parse(data)?;
        let ehdr_end = ELF64_EHDR_SIZE as u64;

        let ph_start = if header.e_phnum == 0 {
            ehdr_end
        } else {
            header.e_phoff
        };
        let header_trailer = Gap::capture(data, ehdr_end, ph_start, "program header table")?;
        let segments = segment::parse_table(data, ph_start, header.e_phentsize, header.e_phnum)?;
        let ph_end = region_end(ph_start, header.program_table_size(), data.len())?;

        let sh_start = if header.e_shnum == 0 {
            ph_end
        } else {
            header.e_shoff
        };
        let inter_table = Gap::capture(data, ph_end, sh_start, "section header table")?;
        let mut sections =
            section::parse_table(data, sh_start, header.e_shentsize, header.e_shnum)?;
        section::resolve_names(data, &mut sections, header.e_shstrndx)?;
        let sh_end = region_end(sh_start, header.section_table_size(), data.len())?;

        let trailer = Gap::capture(data, sh_end, data.len() as u64, "end of file")?;

        Ok(Self {
            header,
            segments,
            sections,
            header_trailer,
            inter_table,
            trailer,
            state: ImageState::Parsed,
        })
    }

    /// Insert `prefix` right after the file header and shift every dependent
    /// offset so the file stays structurally consistent.
    ///
    /// With `shift = prefix.len()`:
    /// - `e_entry`, `e_phoff` and `e_shoff` are shifted;
    /// - each section's nonzero `sh_offset` and nonzero `sh_addr` are shifted;
    /// - each segment's nonzero `p_offset` is shifted;
    /// - `prefix` is placed in front of the header-trailer gap.
    ///
    /// Zero section and segment offsets and addresses mean "not applicable"
    /// and are never moved.
    /// Calls compound: embedding twice shifts twice.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::OffsetOverflow`] if any shifted field would exceed
    /// `u64::MAX`. The image is unchanged when an error is returned.
    pub fn embed(&mut self, prefix: &[u8]) -> Result<(), ElfError> {
        let shift = prefix.len() as u64;

        let entry = shift_field("e_entry", self.header.e_entry, shift)?;
        let phoff = shift_field("e_phoff", self.header.e_phoff, shift)?;
        let shoff = shift_field("e_shoff", self.header.e_shoff, shift)?;

        let segment_offsets = self
            .segments
            .iter()
            .map(|s| shift_present("p_offset", s.p_offset, shift))
            .collect::<Result<Vec<_>, _>>()?;

        let section_locations = self
            .sections
            .iter()
            .map(|s| {
                Ok((
                    shift_present("sh_offset", s.sh_offset, shift)?,
                    shift_present("sh_addr", s.sh_addr, shift)?,
                ))
            })
            .collect::<Result<Vec<_>, ElfError>>()?;

        // Every sum fits; commit.
        self.header.e_entry = entry;
        self.header.e_phoff = phoff;
        self.header.e_shoff = shoff;
        for (segment, offset) in self.segments.iter_mut().zip(segment_offsets) {
            segment.p_offset = offset;
        }
        for (section, (offset, addr)) in self.sections.iter_mut().zip(section_locations) {
            section.sh_offset = offset;
            section.sh_addr = addr;
        }
        self.header_trailer.prepend(prefix);
        self.state = ImageState::Embedded;
        Ok(())
    }

    /// Encode the image back into a file.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::UnsupportedLayout`] if an entry no longer matches
    /// the stride declared in the file header.
    pub fn serialize(&self) -> Result<Vec<u8>, ElfError> {
        let mut out = Vec::with_capacity(self.serialized_len());
        out.extend_from_slice(&self.header.serialize());
        out.extend_from_slice(self.header_trailer.as_bytes());
        segment::serialize_table(&self.segments, self.header.e_phentsize, &mut out)?;
        out.extend_from_slice(self.inter_table.as_bytes());
        section::serialize_table(&self.sections, self.header.e_shentsize, &mut out)?;
        out.extend_from_slice(self.trailer.as_bytes());
        Ok(out)
    }

    /// Encode the image and consume it.
    ///
    /// # Errors
    ///
    /// See [`ElfImage::serialize`].
    pub fn dump(self) -> Result<Vec<u8>, ElfError> {
        self.serialize()
    }

    /// Number of bytes [`ElfImage::serialize`] produces.
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        ELF64_EHDR_SIZE
            + self.header_trailer.len()
            + self.segments.iter().map(Segment::encoded_len).sum::<usize>()
            + self.inter_table.len()
            + self.sections.iter().map(Section::encoded_len).sum::<usize>()
            + self.trailer.len()
    }

    /// Returns the file header.
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns the program headers, in file order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the section headers, in file order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns the bytes between the file header and the program header table.
    #[must_use]
    pub fn header_trailer(&self) -> &Gap {
        &self.header_trailer
    }

    /// Returns the bytes between the program and section header tables.
    #[must_use]
    pub fn inter_table(&self) -> &Gap {
        &self.inter_table
    }

    /// Returns the bytes after the section header table.
    #[must_use]
    pub fn trailer(&self) -> &Gap {
        &self.trailer
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Finds the first section with the given resolved name.
    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns the section-name string table section, if the image has sections.
    #[must_use]
    pub fn string_table_section(&self) -> Option<&Section> {
        section::find_string_table(&self.sections, self.header.e_shstrndx).ok()
    }
}

impl fmt::Display for ElfImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for section in &self.sections {
            writeln!(f, "{section}")?;
        }
        for segment in &self.segments {
            writeln!(f, "{segment}")?;
        }
        Ok(())
    }
}
