// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Instruction-pointer resolution.
//!
//! The dynamic loader is asked first (`dladdr`); when it can name the
//! defining object but not the symbol, the object's own symbol table is
//! searched for the nearest symbol at or below the address, through a cache
//! of opened images keyed by the loader's filename pointer identity.

use crate::symbols::elf::DsoImage;
use crate::tracer::filters::{FunctionFilter, LibraryFilter};
use std::ffi::CStr;
use std::mem;
use std::ptr;
use std::str;
use std::sync::atomic::AtomicPtr;
use std::sync::atomic::Ordering::SeqCst;

/// Outcome of resolving one instruction pointer. `Report` carries whatever
/// could be learned; `Suppressed` means a filter rejected the event and it
/// must not count toward depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Report {
        dso: Option<&'static str>,
        name: Option<&'static str>,
    },
    Suppressed,
}

struct DsoNode {
    /// `dli_fname` pointer identity, not string content. The loader hands
    /// out a stable pointer per object for the process lifetime.
    key: usize,
    image: Option<&'static DsoImage>,
    next: *mut DsoNode,
}

/// Monotonically growing cache of opened images. Entries are leaked boxes
/// published through an atomic head pointer; nothing is ever evicted or
/// unmapped. Like the rest of the tracer this is not thread-safe: two
/// threads racing on insertion can duplicate an entry, which wastes a
/// mapping but stays correct for lookups.
pub(crate) struct DsoCache {
    head: AtomicPtr<DsoNode>,
}

impl DsoCache {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn lookup(&self, key: usize) -> Option<&'static DsoImage> {
        let mut node = self.head.load(SeqCst);
        while !node.is_null() {
            // SAFETY: nodes are leaked on insert and never freed or moved.
            let entry = unsafe { &*node };
            if entry.key == key {
                return entry.image;
            }
            node = entry.next;
        }
        None
    }

    fn insert(&self, key: usize, image: &'static DsoImage) {
        let node = Box::into_raw(Box::new(DsoNode {
            key,
            image: Some(image),
            next: self.head.load(SeqCst),
        }));
        self.head.store(node, SeqCst);
    }
}

/// Borrows a NUL-terminated string owned by the dynamic loader. The loader
/// keeps these alive for the process lifetime (objects are never unloaded
/// under the tracer's contract), hence the 'static.
unsafe fn loader_str(ptr: *const libc::c_char) -> Option<&'static str> {
    if ptr.is_null() {
        return None;
    }
    str::from_utf8(CStr::from_ptr(ptr).to_bytes()).ok()
}

/// The address a symbol value must be compared against. Symbol tables of
/// shared objects hold load-base-relative offsets while the main
/// executable's holds absolute addresses; the only distinction available is
/// whether the recorded value exceeds the load base. A known-fragile
/// heuristic, so it lives in exactly one place.
fn comparison_address(pc: usize, load_base: usize, symbol_value: u64) -> u64 {
    if symbol_value > load_base as u64 {
        pc as u64
    } else {
        (pc as u64).wrapping_sub(load_base as u64)
    }
}

/// Nearest symbol defined at or below `pc`, by the per-symbol address
/// convention of [`comparison_address`]. Skips `$`-prefixed names (ARM
/// mapping symbols) and records whose name offset falls outside the string
/// table.
fn nearest_symbol(image: &'static DsoImage, load_base: usize, pc: usize) -> Option<&'static str> {
    let mut best: Option<(u64, &'static str)> = None;
    for symbol in image.symbols() {
        let target = comparison_address(pc, load_base, symbol.value);
        if symbol.value > target {
            continue;
        }
        let Some(bytes) = image.name_at(symbol.name_offset) else {
            continue;
        };
        if bytes.first() == Some(&b'$') {
            continue;
        }
        let Ok(name) = str::from_utf8(bytes) else {
            continue;
        };
        if best.map_or(true, |(value, _)| symbol.value > value) {
            best = Some((symbol.value, name));
        }
    }
    best.map(|(_, name)| name)
}

/// Resolves `pc` to a reportable event, applying the library and function
/// filters along the way.
pub(crate) fn resolve(
    pc: usize,
    libs: &LibraryFilter,
    funs: &FunctionFilter,
    cache: &DsoCache,
) -> Resolution {
    let mut info: libc::Dl_info = unsafe { mem::zeroed() };
    // SAFETY: dladdr takes any address and a valid out-pointer.
    let known = unsafe { libc::dladdr(pc as *const libc::c_void, &mut info) } != 0;
    let fname = if known {
        unsafe { loader_str(info.dli_fname) }
    } else {
        None
    };
    let Some(fname) = fname else {
        // Loader query failed: no object, no name. Only a whitelist
        // suppresses an unresolvable event.
        return if funs.admits(None) {
            Resolution::Report {
                dso: None,
                name: None,
            }
        } else {
            Resolution::Suppressed
        };
    };

    let Some(dso) = libs.admit(fname) else {
        return Resolution::Suppressed;
    };

    if let Some(name) = unsafe { loader_str(info.dli_sname) } {
        return if funs.admits(Some(name)) {
            Resolution::Report {
                dso: Some(dso),
                name: Some(name),
            }
        } else {
            Resolution::Suppressed
        };
    }

    let key = info.dli_fname as usize;
    let image = match cache.lookup(key) {
        Some(image) => Some(image),
        None => match DsoImage::open(fname) {
            Ok(image) => {
                let image: &'static DsoImage = Box::leak(Box::new(image));
                cache.insert(key, image);
                Some(image)
            }
            // A failed open is not cached; the next event for this object
            // retries.
            Err(_) => None,
        },
    };
    let name = image.and_then(|image| nearest_symbol(image, info.dli_fbase as usize, pc));

    if funs.admits(name) {
        Resolution::Report {
            dso: Some(dso),
            name,
        }
    } else {
        Resolution::Suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::elf::tests::{strtab, sym32, sym64, write_image, ImageBuilder};
    use crate::symbols::elf::{ElfClass, SHT_STRTAB, SHT_SYMTAB};

    fn leak_image(image: Vec<u8>) -> &'static DsoImage {
        let file = write_image(&image);
        let dso = DsoImage::open(file.path().to_str().unwrap()).unwrap();
        Box::leak(Box::new(dso))
    }

    #[test]
    fn test_offset_convention_for_shared_objects() {
        // Values below the load base are offsets: pc - base is the target.
        let image = leak_image(
            ImageBuilder::new(ElfClass::Elf64)
                .section(
                    SHT_SYMTAB,
                    [sym64(1, 0x100), sym64(5, 0x200), sym64(9, 0x300)].concat(),
                    24,
                )
                .section(SHT_STRTAB, strtab(&["aaa", "bbb", "ccc"]), 0)
                .build(),
        );
        let base = 0x7f00_0000_0000usize;
        assert_eq!(nearest_symbol(image, base, base + 0x250), Some("bbb"));
        assert_eq!(nearest_symbol(image, base, base + 0x300), Some("ccc"));
        assert_eq!(nearest_symbol(image, base, base + 0x0ff), None);
    }

    #[test]
    fn test_absolute_convention_for_main_executable() {
        // Values above the load base are absolute: pc itself is the target.
        let image = leak_image(
            ImageBuilder::new(ElfClass::Elf32)
                .section(
                    SHT_SYMTAB,
                    [sym32(1, 0x0804_8100), sym32(6, 0x0804_8200)].concat(),
                    16,
                )
                .section(SHT_STRTAB, strtab(&["entry", "work"]), 0)
                .build(),
        );
        let base = 0x1000usize;
        assert_eq!(nearest_symbol(image, base, 0x0804_8150), Some("entry"));
        assert_eq!(nearest_symbol(image, base, 0x0804_8201), Some("work"));
    }

    #[test]
    fn test_mapping_symbols_skipped() {
        let image = leak_image(
            ImageBuilder::new(ElfClass::Elf64)
                .section(SHT_SYMTAB, [sym64(1, 0x100), sym64(4, 0x180)].concat(), 24)
                .section(SHT_STRTAB, strtab(&["fn", "$t"]), 0)
                .build(),
        );
        // `$t` is nearer but must be ignored.
        assert_eq!(nearest_symbol(image, 0x10_0000, 0x10_0190), Some("fn"));
    }

    #[test]
    fn test_out_of_range_name_offset_skipped() {
        let image = leak_image(
            ImageBuilder::new(ElfClass::Elf64)
                .section(
                    SHT_SYMTAB,
                    [sym64(500, 0x180), sym64(1, 0x100)].concat(),
                    24,
                )
                .section(SHT_STRTAB, strtab(&["ok"]), 0)
                .build(),
        );
        assert_eq!(nearest_symbol(image, 0x10_0000, 0x10_0190), Some("ok"));
    }

    #[test]
    fn test_cache_pointer_identity() {
        let cache = DsoCache::new();
        let image = leak_image(
            ImageBuilder::new(ElfClass::Elf64)
                .section(SHT_SYMTAB, sym64(1, 0x100), 24)
                .section(SHT_STRTAB, strtab(&["x"]), 0)
                .build(),
        );
        assert!(cache.lookup(0x1234).is_none());
        cache.insert(0x1234, image);
        assert!(cache.lookup(0x1234).is_some());
        assert!(cache.lookup(0x5678).is_none());
    }

    #[test]
    fn test_resolve_own_code_reports() {
        // An address inside this test binary: the loader names the object,
        // and with no filters the event is reported one way or another.
        let cache = DsoCache::new();
        let pc = test_resolve_own_code_reports as usize;
        match resolve(
            pc,
            &LibraryFilter::ReportAll,
            &FunctionFilter::ReportAll,
            &cache,
        ) {
            Resolution::Report { dso, .. } => assert!(dso.is_some()),
            Resolution::Suppressed => panic!("unfiltered resolution must report"),
        }
    }

    #[test]
    fn test_resolve_unknown_pc_under_whitelist_suppresses() {
        // An address no loader object covers resolves to nothing; a
        // whitelist suppresses it, report-all admits it without a name.
        let cache = DsoCache::new();
        let pc = 0x10usize;
        assert_eq!(
            resolve(
                pc,
                &LibraryFilter::ReportAll,
                &FunctionFilter::Include("anything".to_string()),
                &cache,
            ),
            Resolution::Suppressed
        );
        match resolve(
            pc,
            &LibraryFilter::ReportAll,
            &FunctionFilter::ReportAll,
            &cache,
        ) {
            Resolution::Report { name, .. } => assert!(name.is_none()),
            Resolution::Suppressed => panic!("report-all must admit unresolvable events"),
        }
    }
}
