// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! ELF inspection for symbol resolution.
//!
//! A DSO is opened once, mapped read-only shared, and the byte ranges of its
//! string and symbol tables recorded. All header and record access goes
//! through a bounds-checked byte view; nothing in this module does raw
//! pointer arithmetic over the mapping. The mapping is intentionally leaked:
//! the cache that owns the image lives until process exit and the stored
//! ranges must never be invalidated.

use memmap2::Mmap;
use std::fs::File;
use std::ops::Range;
use thiserror::Error;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
pub(crate) const SHT_SYMTAB: u32 = 2;
pub(crate) const SHT_STRTAB: u32 = 3;

/// The link through which a main program with a relative `argv[0]` is still
/// reachable by path.
const SELF_EXE: &str = "/proc/self/exe";

#[derive(Debug, Error)]
pub(crate) enum ElfError {
    #[error("cannot open: {0}")]
    Open(#[from] std::io::Error),
    #[error("not an ELF image")]
    BadMagic,
    #[error("unsupported ELF class {0}")]
    UnsupportedClass(u8),
    #[error("unsupported data encoding {0}")]
    UnsupportedEncoding(u8),
    #[error("image truncated")]
    Truncated,
    #[error("no string table section")]
    MissingStringTable,
    #[error("no symbol table section")]
    MissingSymbolTable,
    #[error("symbol table entry size {actual}, expected {expected}")]
    BadSymtabEntsize { actual: u64, expected: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    fn from_ident(byte: u8) -> Result<Self, ElfError> {
        match byte {
            ELFCLASS32 => Ok(Self::Elf32),
            ELFCLASS64 => Ok(Self::Elf64),
            other => Err(ElfError::UnsupportedClass(other)),
        }
    }

    /// Size of one symbol record for this class.
    fn sym_entsize(self) -> u64 {
        match self {
            Self::Elf32 => 16,
            Self::Elf64 => 24,
        }
    }
}

/// Bounds-checked little-endian reads over a byte range.
struct View<'a>(&'a [u8]);

impl<'a> View<'a> {
    fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], ElfError> {
        let end = offset.checked_add(len).ok_or(ElfError::Truncated)?;
        self.0.get(offset..end).ok_or(ElfError::Truncated)
    }

    fn u16_at(&self, offset: usize) -> Result<u16, ElfError> {
        let b = self.bytes(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32_at(&self, offset: usize) -> Result<u32, ElfError> {
        let b = self.bytes(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64_at(&self, offset: usize) -> Result<u64, ElfError> {
        let b = self.bytes(offset, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// A class-sized word: `Elf32_Word` or `Elf64_Xword`.
    fn word_at(&self, class: ElfClass, offset: usize) -> Result<u64, ElfError> {
        match class {
            ElfClass::Elf32 => Ok(u64::from(self.u32_at(offset)?)),
            ElfClass::Elf64 => self.u64_at(offset),
        }
    }
}

/// One symbol record, reduced to what resolution needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SymbolRecord {
    pub(crate) name_offset: usize,
    pub(crate) value: u64,
}

/// A cached, immortal view of one shared object's image.
pub(crate) struct DsoImage {
    /// Held open for the life of the process.
    _file: File,
    data: &'static [u8],
    class: ElfClass,
    strtab: Range<usize>,
    symtab: Range<usize>,
}

impl DsoImage {
    /// Opens and maps `path`, locating its string and symbol tables.
    ///
    /// The main program frequently appears under a relative `argv[0]`; when
    /// the open fails and the path is not absolute, `/proc/self/exe` is
    /// tried instead. Of the string-table sections the *last* one in header
    /// order wins; the symbol table's entry size must equal the class's
    /// symbol-record size.
    pub(crate) fn open(path: &str) -> Result<Self, ElfError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if !path.starts_with('/') => File::open(SELF_EXE).map_err(|_| err)?,
            Err(err) => return Err(err.into()),
        };
        // SAFETY: the mapping is read-only shared and is never unmapped, so
        // the 'static slice below stays valid for the life of the process.
        // Concurrent modification of the underlying file is outside the
        // tracer's contract (the loader has the same exposure).
        let map = unsafe { Mmap::map(&file)? };
        let data: &'static [u8] = Box::leak(Box::new(map));

        let view = View(data);
        if view.bytes(0, 4)? != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        let class = ElfClass::from_ident(*data.get(EI_CLASS).ok_or(ElfError::Truncated)?)?;
        let encoding = *data.get(EI_DATA).ok_or(ElfError::Truncated)?;
        if encoding != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding(encoding));
        }

        let (shoff, shentsize, shnum) = match class {
            ElfClass::Elf32 => (
                u64::from(view.u32_at(32)?),
                view.u16_at(46)?,
                view.u16_at(48)?,
            ),
            ElfClass::Elf64 => (view.u64_at(40)?, view.u16_at(58)?, view.u16_at(60)?),
        };

        let mut strtab = None;
        let mut symtab = None;
        for index in 0..shnum {
            let header = shoff
                .checked_add(u64::from(index) * u64::from(shentsize))
                .and_then(|offset| usize::try_from(offset).ok())
                .ok_or(ElfError::Truncated)?;
            // The whole header record must be inside the mapping before any
            // field of it is read.
            view.bytes(header, usize::from(shentsize))?;
            let sh_type = view.u32_at(header + 4)?;
            match sh_type {
                SHT_STRTAB => strtab = Some(Self::section_range(&view, class, header)?),
                SHT_SYMTAB if symtab.is_none() => {
                    let entsize = match class {
                        ElfClass::Elf32 => view.word_at(class, header + 36)?,
                        ElfClass::Elf64 => view.word_at(class, header + 56)?,
                    };
                    if entsize != class.sym_entsize() {
                        return Err(ElfError::BadSymtabEntsize {
                            actual: entsize,
                            expected: class.sym_entsize(),
                        });
                    }
                    symtab = Some(Self::section_range(&view, class, header)?);
                }
                _ => {}
            }
        }

        Ok(Self {
            _file: file,
            data,
            class,
            strtab: strtab.ok_or(ElfError::MissingStringTable)?,
            symtab: symtab.ok_or(ElfError::MissingSymbolTable)?,
        })
    }

    fn section_range(
        view: &View<'_>,
        class: ElfClass,
        header: usize,
    ) -> Result<Range<usize>, ElfError> {
        let (offset, size) = match class {
            ElfClass::Elf32 => (
                view.word_at(class, header + 16)?,
                view.word_at(class, header + 20)?,
            ),
            ElfClass::Elf64 => (
                view.word_at(class, header + 24)?,
                view.word_at(class, header + 32)?,
            ),
        };
        let start = usize::try_from(offset).map_err(|_| ElfError::Truncated)?;
        let end = offset
            .checked_add(size)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or(ElfError::Truncated)?;
        // The whole range must lie inside the mapping.
        view.bytes(start, end - start)?;
        Ok(start..end)
    }

    /// The NUL-terminated name at `offset` in the string table, or None when
    /// the offset falls outside it.
    pub(crate) fn name_at(&self, offset: usize) -> Option<&'static [u8]> {
        let strtab = &self.data[self.strtab.clone()];
        let tail = strtab.get(offset..)?;
        let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(&tail[..len])
    }

    /// Iterates the symbol records of the cached symbol table.
    pub(crate) fn symbols(&self) -> impl Iterator<Item = SymbolRecord> + '_ {
        let table = &self.data[self.symtab.clone()];
        let entsize = self.class.sym_entsize() as usize;
        let class = self.class;
        (0..table.len() / entsize).map(move |index| {
            let record = &table[index * entsize..(index + 1) * entsize];
            let view = View(record);
            // Offsets within a record are fixed per class; the record slice
            // is exactly entsize bytes, so these reads cannot fail.
            let name_offset = view.u32_at(0).unwrap_or(0) as usize;
            let value = match class {
                ElfClass::Elf32 => view.u32_at(4).map(u64::from).unwrap_or(0),
                ElfClass::Elf64 => view.u64_at(8).unwrap_or(0),
            };
            SymbolRecord { name_offset, value }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Hand-assembled minimal ELF images. Layout: ELF header, section
    /// headers, then section payloads; offsets are computed as the builder
    /// appends.
    pub(crate) struct ImageBuilder {
        class: ElfClass,
        sections: Vec<(u32, Vec<u8>, u64)>, // (sh_type, payload, sh_entsize)
    }

    impl ImageBuilder {
        pub(crate) fn new(class: ElfClass) -> Self {
            Self {
                class,
                sections: Vec::new(),
            }
        }

        pub(crate) fn section(mut self, sh_type: u32, payload: Vec<u8>, entsize: u64) -> Self {
            self.sections.push((sh_type, payload, entsize));
            self
        }

        pub(crate) fn build(self) -> Vec<u8> {
            let (ehsize, shentsize): (usize, usize) = match self.class {
                ElfClass::Elf32 => (52, 40),
                ElfClass::Elf64 => (64, 64),
            };
            let shoff = ehsize;
            let shnum = self.sections.len();
            let mut payload_offset = ehsize + shnum * shentsize;

            let mut image = vec![0u8; ehsize];
            image[0..4].copy_from_slice(ELF_MAGIC);
            image[EI_CLASS] = match self.class {
                ElfClass::Elf32 => ELFCLASS32,
                ElfClass::Elf64 => ELFCLASS64,
            };
            image[EI_DATA] = ELFDATA2LSB;
            match self.class {
                ElfClass::Elf32 => {
                    image[32..36].copy_from_slice(&(shoff as u32).to_le_bytes());
                    image[46..48].copy_from_slice(&(shentsize as u16).to_le_bytes());
                    image[48..50].copy_from_slice(&(shnum as u16).to_le_bytes());
                }
                ElfClass::Elf64 => {
                    image[40..48].copy_from_slice(&(shoff as u64).to_le_bytes());
                    image[58..60].copy_from_slice(&(shentsize as u16).to_le_bytes());
                    image[60..62].copy_from_slice(&(shnum as u16).to_le_bytes());
                }
            }

            let mut payloads = Vec::new();
            for (sh_type, payload, entsize) in &self.sections {
                let mut header = vec![0u8; shentsize];
                header[4..8].copy_from_slice(&sh_type.to_le_bytes());
                match self.class {
                    ElfClass::Elf32 => {
                        header[16..20].copy_from_slice(&(payload_offset as u32).to_le_bytes());
                        header[20..24].copy_from_slice(&(payload.len() as u32).to_le_bytes());
                        header[36..40].copy_from_slice(&(*entsize as u32).to_le_bytes());
                    }
                    ElfClass::Elf64 => {
                        header[24..32].copy_from_slice(&(payload_offset as u64).to_le_bytes());
                        header[32..40].copy_from_slice(&(payload.len() as u64).to_le_bytes());
                        header[56..64].copy_from_slice(&entsize.to_le_bytes());
                    }
                }
                image.extend_from_slice(&header);
                payloads.extend_from_slice(payload);
                payload_offset += payload.len();
            }
            image.extend_from_slice(&payloads);
            image
        }
    }

    pub(crate) fn sym32(name_offset: u32, value: u32) -> Vec<u8> {
        let mut record = vec![0u8; 16];
        record[0..4].copy_from_slice(&name_offset.to_le_bytes());
        record[4..8].copy_from_slice(&value.to_le_bytes());
        record
    }

    pub(crate) fn sym64(name_offset: u32, value: u64) -> Vec<u8> {
        let mut record = vec![0u8; 24];
        record[0..4].copy_from_slice(&name_offset.to_le_bytes());
        record[8..16].copy_from_slice(&value.to_le_bytes());
        record
    }

    pub(crate) fn write_image(image: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(image).unwrap();
        file.flush().unwrap();
        file
    }

    pub(crate) fn strtab(names: &[&str]) -> Vec<u8> {
        let mut table = vec![0u8];
        for name in names {
            table.extend_from_slice(name.as_bytes());
            table.push(0);
        }
        table
    }

    #[test]
    fn test_open_32bit_image() {
        let image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, [sym32(1, 0x100), sym32(6, 0x200)].concat(), 16)
            .section(SHT_STRTAB, strtab(&["main", "foo"]), 0)
            .build();
        let file = write_image(&image);
        let dso = DsoImage::open(file.path().to_str().unwrap()).unwrap();
        assert_eq!(dso.class, ElfClass::Elf32);
        let symbols: Vec<_> = dso.symbols().collect();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].value, 0x100);
        assert_eq!(dso.name_at(symbols[0].name_offset), Some(&b"main"[..]));
        assert_eq!(dso.name_at(symbols[1].name_offset), Some(&b"foo"[..]));
    }

    #[test]
    fn test_open_64bit_image() {
        let image = ImageBuilder::new(ElfClass::Elf64)
            .section(SHT_SYMTAB, sym64(1, 0x4000), 24)
            .section(SHT_STRTAB, strtab(&["bar"]), 0)
            .build();
        let file = write_image(&image);
        let dso = DsoImage::open(file.path().to_str().unwrap()).unwrap();
        assert_eq!(dso.class, ElfClass::Elf64);
        let symbols: Vec<_> = dso.symbols().collect();
        assert_eq!(symbols[0].value, 0x4000);
        assert_eq!(dso.name_at(symbols[0].name_offset), Some(&b"bar"[..]));
    }

    #[test]
    fn test_last_string_table_wins() {
        // Two STRTAB sections; symbol names index the second one.
        let image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_STRTAB, strtab(&["stale"]), 0)
            .section(SHT_SYMTAB, sym32(1, 0x10), 16)
            .section(SHT_STRTAB, strtab(&["fresh"]), 0)
            .build();
        let file = write_image(&image);
        let dso = DsoImage::open(file.path().to_str().unwrap()).unwrap();
        assert_eq!(dso.name_at(1), Some(&b"fresh"[..]));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, sym32(0, 0), 16)
            .section(SHT_STRTAB, strtab(&[]), 0)
            .build();
        image[0] = b'X';
        let file = write_image(&image);
        assert!(matches!(
            DsoImage::open(file.path().to_str().unwrap()),
            Err(ElfError::BadMagic)
        ));
    }

    #[test]
    fn test_rejects_big_endian() {
        let mut image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, sym32(0, 0), 16)
            .section(SHT_STRTAB, strtab(&[]), 0)
            .build();
        image[EI_DATA] = 2;
        let file = write_image(&image);
        assert!(matches!(
            DsoImage::open(file.path().to_str().unwrap()),
            Err(ElfError::UnsupportedEncoding(2))
        ));
    }

    #[test]
    fn test_rejects_unknown_class() {
        let mut image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, sym32(0, 0), 16)
            .section(SHT_STRTAB, strtab(&[]), 0)
            .build();
        image[EI_CLASS] = 9;
        let file = write_image(&image);
        assert!(matches!(
            DsoImage::open(file.path().to_str().unwrap()),
            Err(ElfError::UnsupportedClass(9))
        ));
    }

    #[test]
    fn test_requires_both_tables() {
        let image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_STRTAB, strtab(&[]), 0)
            .build();
        let file = write_image(&image);
        assert!(matches!(
            DsoImage::open(file.path().to_str().unwrap()),
            Err(ElfError::MissingSymbolTable)
        ));

        let image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, sym32(0, 0), 16)
            .build();
        let file = write_image(&image);
        assert!(matches!(
            DsoImage::open(file.path().to_str().unwrap()),
            Err(ElfError::MissingStringTable)
        ));
    }

    #[test]
    fn test_rejects_wrong_symtab_entsize() {
        let image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, sym32(0, 0), 24)
            .section(SHT_STRTAB, strtab(&[]), 0)
            .build();
        let file = write_image(&image);
        assert!(matches!(
            DsoImage::open(file.path().to_str().unwrap()),
            Err(ElfError::BadSymtabEntsize {
                actual: 24,
                expected: 16
            })
        ));
    }

    #[test]
    fn test_rejects_truncated_section() {
        // Section header claims more payload than the file holds.
        let mut image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, sym32(0, 0), 16)
            .section(SHT_STRTAB, strtab(&["x"]), 0)
            .build();
        image.truncate(image.len() - 2);
        let file = write_image(&image);
        assert!(matches!(
            DsoImage::open(file.path().to_str().unwrap()),
            Err(ElfError::Truncated)
        ));
    }

    #[test]
    fn test_name_at_bounds() {
        let image = ImageBuilder::new(ElfClass::Elf32)
            .section(SHT_SYMTAB, sym32(1, 0), 16)
            .section(SHT_STRTAB, strtab(&["f"]), 0)
            .build();
        let file = write_image(&image);
        let dso = DsoImage::open(file.path().to_str().unwrap()).unwrap();
        assert_eq!(dso.name_at(1), Some(&b"f"[..]));
        assert_eq!(dso.name_at(100), None);
    }
}
