//! Read-only access to the named parts of a zip-style container.
//!
//! Office files are zip archives of XML parts. [`PartReader`] hides the
//! archive library behind a list of names plus by-name reads, so strategies
//! work with plain `(name, bytes)` pairs.

use std::io::{Cursor, Read, Seek};

use zip::ZipArchive;

use crate::error::{PreviewError, Result};
use crate::natural;

/// One named inner part of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub trait PartReader {
    /// Every entry name, in container order.
    fn names(&self) -> Vec<String>;

    /// Raw bytes of the entry called `name`.
    fn read(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Parts directly inside `folder` whose names end in `extension`, in
    /// natural order of their names.
    ///
    /// Fails with [`PreviewError::NoSlidePartsFound`] when nothing at all lives
    /// under `folder`.
    fn parts_in(&mut self, folder: &str, extension: &str) -> Result<Vec<Part>> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        let names = self.names();

        if !names.iter().any(|name| name.starts_with(&prefix)) {
            return Err(PreviewError::NoSlidePartsFound);
        }

        let mut selected: Vec<String> = names
            .into_iter()
            .filter(|name| {
                name.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('/') && rest.ends_with(extension))
            })
            .collect();
        natural::sort_natural(&mut selected, |name| name.as_str());

        let mut parts = Vec::with_capacity(selected.len());
        for name in selected {
            let bytes = self.read(&name)?;
            parts.push(Part { name, bytes });
        }
        Ok(parts)
    }
}

/// Upper bound on buffer space reserved up front from an entry's declared
/// size; larger entries grow while reading.
const MAX_PREALLOC: u64 = 16 << 20;

fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// [`PartReader`] over a zip archive.
pub struct ZipPartReader<R> {
    archive: ZipArchive<R>,
}

impl<'a> ZipPartReader<Cursor<&'a [u8]>> {
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ZipPartReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)
            .map_err(|e| PreviewError::InvalidContainer(e.to_string()))?;
        Ok(Self { archive })
    }
}

impl<R: Read + Seek> PartReader for ZipPartReader<R> {
    fn names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| PreviewError::InvalidContainer(format!("{}: {}", name, e)))?;
        let mut bytes = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut bytes)
            .map_err(|e| PreviewError::InvalidContainer(format!("{}: {}", name, e)))?;
        Ok(bytes)
    }
}
