use log::debug;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ScanError;
use crate::metadata::PropertyMetadata;
use crate::source::{ClassSource, RootNamespace, TypeDecl};

/// One annotated field found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub class_name: String,
    pub field: String,
    pub metadata: PropertyMetadata,
}

/// Walks a class source under a root namespace and reports annotated fields.
///
/// Read-only: a scan never mutates the source, so repeated scans of an unchanged
/// codebase return identical discoveries.
#[derive(Clone)]
pub struct Scanner {
    source: Arc<dyn ClassSource>,
    root: RootNamespace,
    budget: Option<Duration>,
}

impl Scanner {
    pub fn new(source: Arc<dyn ClassSource>, root: RootNamespace) -> Self {
        Self {
            source,
            root,
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub fn root(&self) -> &RootNamespace {
        &self.root
    }

    pub fn source(&self) -> &dyn ClassSource {
        self.source.as_ref()
    }

    /// Runs one scan. Any candidate that fails to load aborts the whole scan.
    pub fn scan(&self) -> Result<Vec<Discovery>, ScanError> {
        let started = Instant::now();
        let candidates = self.source.enumerate(&self.root)?;
        debug!(
            "Enumerated {} candidates under `{}` in {}",
            candidates.len(),
            self.root.as_str(),
            self.source.describe()
        );

        let loaded: Vec<Vec<TypeDecl>> = candidates
            .par_iter()
            .map(|candidate| {
                self.check_budget(started)?;
                self.source.load(candidate)
            })
            .collect::<Result<_, _>>()?;
        self.check_budget(started)?;

        let mut discoveries = Vec::new();
        for ty in loaded.into_iter().flatten() {
            if !self.root.contains(&ty.class_name) {
                continue;
            }
            for field in ty.fields {
                if let Some(metadata) = field.declaration {
                    discoveries.push(Discovery {
                        class_name: ty.class_name.clone(),
                        field: field.name,
                        metadata,
                    });
                }
            }
        }

        debug!(
            "Found {} annotated fields in {} ms",
            discoveries.len(),
            started.elapsed().as_millis()
        );
        Ok(discoveries)
    }

    fn check_budget(&self, started: Instant) -> Result<(), ScanError> {
        match self.budget {
            Some(limit) if started.elapsed() > limit => Err(ScanError::BudgetExceeded {
                root: self.root.as_str().to_string(),
                limit,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InjectValue;
    use crate::properties::PropertySource;
    use crate::registry::DeclarationRegistry;
    use crate::source::{Candidate, FieldDecl};

    struct FailingSource;

    impl ClassSource for FailingSource {
        fn describe(&self) -> String {
            "failing".to_string()
        }

        fn enumerate(&self, _root: &RootNamespace) -> Result<Vec<Candidate>, ScanError> {
            Ok(vec![Candidate::new("a.Good"), Candidate::new("a.Missing")])
        }

        fn load(&self, candidate: &Candidate) -> Result<Vec<TypeDecl>, ScanError> {
            if candidate.name == "a.Missing" {
                return Err(ScanError::Unresolvable {
                    origin: candidate.name.clone(),
                    reason: "class definition not found".to_string(),
                });
            }
            Ok(vec![TypeDecl {
                class_name: candidate.name.clone(),
                fields: vec![FieldDecl {
                    name: "x".to_string(),
                    declaration: Some(InjectValue::new("k").into_metadata()),
                }],
            }])
        }
    }

    #[test]
    fn scan_keeps_only_annotated_fields_in_order() {
        let registry = DeclarationRegistry::new(PropertySource::new());
        registry.register("com.acme.A", "first", InjectValue::new("one")).unwrap();
        registry.register("com.acme.A", "second", InjectValue::new("two")).unwrap();
        registry.register("com.acme.B", "only", InjectValue::new("three")).unwrap();
        registry.register("org.other.C", "skipped", InjectValue::new("four")).unwrap();

        let scanner = Scanner::new(Arc::new(registry), RootNamespace::new("com.acme"));
        let found = scanner.scan().unwrap();
        let summary: Vec<(&str, &str, &str)> = found
            .iter()
            .map(|d| (d.class_name.as_str(), d.field.as_str(), d.metadata.expression.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("com.acme.A", "first", "one"),
                ("com.acme.A", "second", "two"),
                ("com.acme.B", "only", "three"),
            ]
        );
    }

    #[test]
    fn one_failed_load_aborts_the_scan() {
        let scanner = Scanner::new(Arc::new(FailingSource), RootNamespace::new("a"));
        let err = scanner.scan().unwrap_err();
        assert!(matches!(err, ScanError::Unresolvable { ref origin, .. } if origin == "a.Missing"));
    }

    #[test]
    fn zero_budget_is_exceeded() {
        let registry = DeclarationRegistry::new(PropertySource::new());
        registry.register("a.A", "x", InjectValue::new("k")).unwrap();
        let scanner = Scanner::new(Arc::new(registry), RootNamespace::new("a"))
            .with_budget(Some(Duration::ZERO));
        assert!(matches!(
            scanner.scan(),
            Err(ScanError::BudgetExceeded { .. })
        ));
    }
}
