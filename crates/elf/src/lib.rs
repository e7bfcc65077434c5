//! ELF64 layout engine for elfpack.
//!
//! Parses the file header, program header table and section header table of
//! an ELF64 file into owned structures, resolves section names, and writes
//! everything back byte for byte. Bytes the model does not interpret are
//! carried as opaque gaps. [`ElfImage::embed`] inserts a blob right after the
//! file header and shifts every dependent offset.
//!
//! No unsafe code. Requires `alloc`.
//!
//! # Usage
//!
//! ```
//! use elfpack_elf::ElfImage;
//!
//! fn pack(data: &[u8], blob: &[u8]) -> Result<Vec<u8>, elfpack_elf::ElfError> {
//!     let mut image = ElfImage::parse(data)?;
//!     image.embed(blob)?;
//!     image.dump()
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod gap;
pub mod header;
pub mod image;
pub mod section;
pub mod segment;
pub mod strtab;

pub use gap::Gap;
pub use header::{
    ELF64_EHDR_SIZE, ELF64_PHDR_SIZE, ELF64_SHDR_SIZE, ET_DYN, ElfError, FileHeader, LayoutIssue,
    Table,
};
pub use image::{ElfImage, ImageState};
pub use section::{
    SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_NOBITS, SHT_NULL, SHT_PROGBITS, SHT_STRTAB,
    SHT_SYMTAB, Section,
};
pub use segment::{PF_R, PF_W, PF_X, PT_LOAD, Segment};
pub use strtab::{StringTable, read_c_string, write_c_string};

/// Parse a whole ELF64 file. Alias for [`ElfImage::parse`].
///
/// # Errors
///
/// See [`ElfImage::parse`].
pub fn load(data: &[u8]) -> Result<ElfImage, ElfError> {
    ElfImage::parse(data)
}
