//! Class sources enumerate candidates under a root namespace and load them into
//! declared types with their directly declared fields.

use crate::error::ScanError;
use crate::metadata::PropertyMetadata;

/// A dotted package prefix such as `com.acme`. The empty root matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootNamespace(String);

impl RootNamespace {
    pub fn new(root: &str) -> Self {
        Self(root.trim().trim_matches('.').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `qualified` (a package or class name) lies at or beneath this root.
    pub fn contains(&self, qualified: &str) -> bool {
        if self.0.is_empty() {
            return true;
        }
        match qualified.strip_prefix(self.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('$'),
            None => false,
        }
    }

    /// The root as a relative path, `com.acme` -> `com/acme`.
    pub fn to_path(&self) -> String {
        self.0.replace('.', "/")
    }
}

/// Something a source can load: a file, an archive entry, or a registered class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    pub name: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    /// Present when the field carries the metadata declaration.
    pub declaration: Option<PropertyMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    /// Binary name, `package.Outer$Inner`.
    pub class_name: String,
    pub fields: Vec<FieldDecl>,
}

pub trait ClassSource: Send + Sync {
    /// Human-readable location, used in logs and reports.
    fn describe(&self) -> String;

    fn enumerate(&self, root: &RootNamespace) -> Result<Vec<Candidate>, ScanError>;

    fn load(&self, candidate: &Candidate) -> Result<Vec<TypeDecl>, ScanError>;
}
