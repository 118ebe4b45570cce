use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use zip::ZipArchive;

use crate::error::ScanError;
use crate::java::parse_compilation_unit;
use crate::source::{Candidate, ClassSource, RootNamespace, TypeDecl};

#[derive(Debug, Clone)]
struct MappedBytes(Arc<Mmap>);

impl AsRef<[u8]> for MappedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Cloning shares both the mapping and the parsed central directory.
type MappedArchive = ZipArchive<Cursor<MappedBytes>>;

/// A `-sources.jar` (or any zip) holding `.java` entries.
///
/// Each `enumerate` maps the archive and parses its directory once; the loads of
/// that scan reuse it.
#[derive(Debug)]
pub struct SourceArchive {
    path: PathBuf,
    annotation: String,
    opened: Mutex<Option<MappedArchive>>,
}

impl SourceArchive {
    pub fn new(path: impl Into<PathBuf>, annotation: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            annotation: annotation.into(),
            opened: Mutex::new(None),
        }
    }

    pub fn is_archive(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
    }

    fn open(&self) -> Result<MappedArchive, ScanError> {
        let file = File::open(&self.path).map_err(|source| ScanError::Read {
            path: self.path.clone(),
            source,
        })?;
        // SAFETY: The file is opened read-only. The mapping stays valid after the
        // handle closes; the archive must not be rewritten in place during a scan.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| ScanError::Read {
            path: self.path.clone(),
            source,
        })?;
        ZipArchive::new(Cursor::new(MappedBytes(Arc::new(mmap)))).map_err(|source| {
            ScanError::Archive {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// The archive opened by the last `enumerate`, or a fresh one.
    fn archive(&self) -> Result<MappedArchive, ScanError> {
        let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(archive) = opened.as_ref() {
            return Ok(archive.clone());
        }
        let archive = self.open()?;
        *opened = Some(archive.clone());
        Ok(archive)
    }
}

impl ClassSource for SourceArchive {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn enumerate(&self, root: &RootNamespace) -> Result<Vec<Candidate>, ScanError> {
        let prefix = if root.as_str().is_empty() {
            String::new()
        } else {
            format!("{}/", root.to_path())
        };

        let archive = self.open()?;
        let mut entries: Vec<Candidate> = archive
            .file_names()
            .filter(|name| name.ends_with(".java") && name.starts_with(&prefix))
            .map(Candidate::new)
            .collect();
        entries.sort();

        *self.opened.lock().unwrap_or_else(PoisonError::into_inner) = Some(archive);
        Ok(entries)
    }

    fn load(&self, candidate: &Candidate) -> Result<Vec<TypeDecl>, ScanError> {
        let origin = format!("{}!/{}", self.path.display(), candidate.name);
        let mut archive = self.archive()?;
        let mut entry = archive
            .by_name(&candidate.name)
            .map_err(|source| ScanError::Archive {
                path: self.path.clone(),
                source,
            })?;
        let mut source = String::new();
        entry
            .read_to_string(&mut source)
            .map_err(|source| ScanError::Read {
                path: PathBuf::from(&origin),
                source,
            })?;

        let unit = parse_compilation_unit(&origin, &source, &self.annotation)?;
        Ok(unit.types)
    }
}
