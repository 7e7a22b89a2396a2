//! Read-only mapping of the target library image and probe resolution.

use std::fs::File;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::AttackError;

pub const PAGE_LEN: usize = 1 << 12;

/// Rounds `len` up to the next page boundary.
pub fn page_align(len: usize) -> usize {
    (len + (PAGE_LEN - 1)) & !(PAGE_LEN - 1)
}

/// The victim library image, mapped read-only.
///
/// Sharing physical pages with the copy the oracle executes from is an
/// environmental precondition of the attack, not something this type can
/// enforce.
pub struct TargetImage {
    map: Mmap,
    file_len: usize,
}

impl TargetImage {
    /// Maps the whole image. The mapped length is the file size rounded up
    /// to a page boundary, so a partial last page is mapped rather than cut
    /// off. Missing, unreadable and empty files are fatal here, before any
    /// measurement starts.
    pub fn open(path: &Path) -> Result<TargetImage, AttackError> {
        let file = File::open(path).map_err(|source| AttackError::Target {
            path: path.into(),
            source,
        })?;
        let file_len = file
            .metadata()
            .map_err(|source| AttackError::Target {
                path: path.into(),
                source,
            })?
            .len() as usize;
        if file_len == 0 {
            return Err(AttackError::EmptyTarget(path.into()));
        }
        let map = unsafe { MmapOptions::new().len(page_align(file_len)).map(&file) }.map_err(
            |source| AttackError::Target {
                path: path.into(),
                source,
            },
        )?;
        Ok(TargetImage { map, file_len })
    }

    pub fn len(&self) -> usize {
        self.file_len
    }

    pub fn is_empty(&self) -> bool {
        self.file_len == 0
    }

    /// Address of the probe at `offset`, which must fall inside the file.
    pub fn probe(&self, offset: usize) -> Result<*const u8, AttackError> {
        if offset >= self.file_len {
            return Err(AttackError::ProbeOutOfRange {
                offset,
                len: self.file_len,
            });
        }
        Ok(unsafe { self.map.as_ptr().add(offset) })
    }

    /// Resolves the four table probes.
    pub fn probes(&self, offsets: &[usize; 4]) -> Result<[*const u8; 4], AttackError> {
        Ok([
            self.probe(offsets[0])?,
            self.probe(offsets[1])?,
            self.probe(offsets[2])?,
            self.probe(offsets[3])?,
        ])
    }
}
