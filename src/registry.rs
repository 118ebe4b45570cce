//! In-process declaration registry.
//!
//! Rust code has no classpath to reflect over, so declarations register here
//! explicitly. Registering also injects: [`DeclarationRegistry::inject`] records the
//! declaration and resolves its expression against the registry's property source.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use crate::error::{InjectError, ScanError};
use crate::metadata::InjectValue;
use crate::placeholder;
use crate::properties::PropertySource;
use crate::source::{Candidate, ClassSource, FieldDecl, RootNamespace, TypeDecl};

#[derive(Debug)]
pub struct DeclarationRegistry {
    properties: PropertySource,
    types: RwLock<BTreeMap<String, Vec<FieldDecl>>>,
}

impl DeclarationRegistry {
    pub fn new(properties: PropertySource) -> Self {
        Self {
            properties,
            types: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn properties(&self) -> &PropertySource {
        &self.properties
    }

    /// Records `declaration` on `class_name.field` and returns the injected value.
    ///
    /// The declaration is recorded even when resolution fails, since it exists in
    /// the code either way. A blank expression is rejected and not recorded.
    pub fn inject(
        &self,
        class_name: &str,
        field: &str,
        declaration: InjectValue,
    ) -> Result<String, InjectError> {
        let expression = declaration.binding().expression().to_string();
        self.register(class_name, field, declaration)?;
        placeholder::resolve(&expression, &self.properties)
    }

    /// Like [`inject`](Self::inject), parsing the value into `T`.
    pub fn inject_as<T: FromStr>(
        &self,
        class_name: &str,
        field: &str,
        declaration: InjectValue,
    ) -> Result<T, InjectError> {
        let expression = declaration.binding().expression().to_string();
        let value = self.inject(class_name, field, declaration)?;
        value.parse::<T>().map_err(|_| InjectError::Parse {
            expression,
            value,
            target: std::any::type_name::<T>(),
        })
    }

    /// Records a declaration without injecting. Re-registering a field replaces it
    /// in place, keeping declaration order.
    pub fn register(
        &self,
        class_name: &str,
        field: &str,
        declaration: InjectValue,
    ) -> Result<(), InjectError> {
        if declaration.binding().expression().trim().is_empty() {
            return Err(InjectError::MissingExpression {
                class: class_name.to_string(),
                field: field.to_string(),
            });
        }

        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        let fields = types.entry(class_name.to_string()).or_default();
        let decl = FieldDecl {
            name: field.to_string(),
            declaration: Some(declaration.into_metadata()),
        };
        match fields.iter_mut().find(|f| f.name == field) {
            Some(existing) => *existing = decl,
            None => fields.push(decl),
        }
        Ok(())
    }

    /// Drops every declaration of `class_name`.
    pub fn unregister(&self, class_name: &str) -> bool {
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        types.remove(class_name).is_some()
    }

    pub fn len(&self) -> usize {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClassSource for DeclarationRegistry {
    fn describe(&self) -> String {
        "declaration registry".to_string()
    }

    fn enumerate(&self, root: &RootNamespace) -> Result<Vec<Candidate>, ScanError> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        Ok(types
            .keys()
            .filter(|name| root.contains(name))
            .map(Candidate::new)
            .collect())
    }

    fn load(&self, candidate: &Candidate) -> Result<Vec<TypeDecl>, ScanError> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        let fields = types
            .get(&candidate.name)
            .ok_or_else(|| ScanError::Unresolvable {
                origin: candidate.name.clone(),
                reason: "type is no longer registered".to_string(),
            })?;
        Ok(vec![TypeDecl {
            class_name: candidate.name.clone(),
            fields: fields.clone(),
        }])
    }
}
