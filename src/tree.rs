use ignore::WalkBuilder;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::error::ScanError;
use crate::java::parse_compilation_unit;
use crate::source::{Candidate, ClassSource, RootNamespace, TypeDecl};

/// A directory of `.java` sources laid out by package, e.g. `src/main/java`.
#[derive(Debug, Clone)]
pub struct SourceTree {
    base: PathBuf,
    annotation: String,
}

impl SourceTree {
    pub fn new(base: impl Into<PathBuf>, annotation: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            annotation: annotation.into(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl ClassSource for SourceTree {
    fn describe(&self) -> String {
        self.base.display().to_string()
    }

    fn enumerate(&self, root: &RootNamespace) -> Result<Vec<Candidate>, ScanError> {
        let dir = self.base.join(root.to_path());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = scan_java_files(&dir)?;
        files.sort();
        Ok(files
            .into_iter()
            .filter_map(|p| match p.into_os_string().into_string() {
                Ok(name) => Some(Candidate::new(name)),
                Err(raw) => {
                    warn!(
                        "Skipping {}: path is not valid UTF-8",
                        Path::new(&raw).display()
                    );
                    None
                }
            })
            .collect())
    }

    fn load(&self, candidate: &Candidate) -> Result<Vec<TypeDecl>, ScanError> {
        let path = Path::new(&candidate.name);
        let source = std::fs::read_to_string(path).map_err(|source| ScanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let unit = parse_compilation_unit(&candidate.name, &source, &self.annotation)?;
        Ok(unit.types)
    }
}

pub fn scan_java_files(base_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| match entry {
            Ok(entry) => {
                let path = entry.path();
                let is_file = entry.file_type().is_some_and(|t| t.is_file());
                if is_file && path.extension().is_some_and(|e| e == "java") {
                    let _ = tx.send(Ok(path.to_path_buf()));
                }
                ignore::WalkState::Continue
            }
            Err(err) => {
                let _ = tx.send(Err(err.to_string()));
                ignore::WalkState::Quit
            }
        })
    });

    drop(tx);
    rx.iter()
        .map(|r| {
            r.map_err(|reason| ScanError::Unresolvable {
                origin: base_path.display().to_string(),
                reason,
            })
        })
        .collect()
}
