//! The `InjectValue` declaration and the metadata it carries.
//!
//! A declaration is two things composed together: a [`ConfigBinding`] naming the
//! property expression to inject, and a [`PropertyMetadata`] record describing it.
//! Building a declaration has no side effects; it stays inert until a registry
//! injects it or a scanner reads it.

use serde::{Deserialize, Serialize};

/// The injection half of a declaration: the expression resolved against a property source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBinding {
    expression: String,
}

impl ConfigBinding {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Descriptive attributes of an injected property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub expression: String,
    pub display_name: String,
    pub expire_date: String,
    pub description: String,
    pub used_by: Vec<String>,
    pub referenced_by: Vec<String>,
    pub referenced_from: Vec<String>,
}

impl PropertyMetadata {
    /// Flattens the metadata into the record shape emitted in reports.
    ///
    /// `referenced_by` is the later name for `used_by`, so both feed the consumer list.
    pub fn to_record(&self) -> PropertyRecord {
        let mut consumers = self.used_by.clone();
        consumers.extend(self.referenced_by.iter().cloned());
        PropertyRecord {
            property: self.expression.clone(),
            name: self.display_name.clone(),
            expiration_date: self.expire_date.clone(),
            property_description: self.description.clone(),
            property_being_used_by: consumers,
            property_referenced_from: self.referenced_from.clone(),
        }
    }
}

/// One aggregate entry. Every key is always serialized, defaults included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub property: String,
    pub name: String,
    pub expiration_date: String,
    pub property_description: String,
    pub property_being_used_by: Vec<String>,
    pub property_referenced_from: Vec<String>,
}

/// A field-level declaration: a binding plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectValue {
    binding: ConfigBinding,
    metadata: PropertyMetadata,
}

impl InjectValue {
    /// Starts a declaration for `expression`, which is both the injected key and
    /// the `property` reported for the field.
    pub fn new(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        Self {
            binding: ConfigBinding::new(expression.clone()),
            metadata: PropertyMetadata {
                expression,
                ..PropertyMetadata::default()
            },
        }
    }

    pub fn name(mut self, display_name: impl Into<String>) -> Self {
        self.metadata.display_name = display_name.into();
        self
    }

    pub fn expire_date(mut self, expire_date: impl Into<String>) -> Self {
        self.metadata.expire_date = expire_date.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn used_by<I, S>(mut self, consumers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.used_by = consumers.into_iter().map(Into::into).collect();
        self
    }

    pub fn referenced_by<I, S>(mut self, consumers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.referenced_by = consumers.into_iter().map(Into::into).collect();
        self
    }

    pub fn referenced_from<I, S>(mut self, producers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.referenced_from = producers.into_iter().map(Into::into).collect();
        self
    }

    pub fn binding(&self) -> &ConfigBinding {
        &self.binding
    }

    pub fn metadata(&self) -> &PropertyMetadata {
        &self.metadata
    }

    pub fn into_metadata(self) -> PropertyMetadata {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_only_given_attributes() {
        let decl = InjectValue::new("${payment.api.key}")
            .name("Payment Key")
            .used_by(["InvoiceService"]);

        assert_eq!(decl.binding().expression(), "${payment.api.key}");
        let meta = decl.metadata();
        assert_eq!(meta.expression, "${payment.api.key}");
        assert_eq!(meta.display_name, "Payment Key");
        assert_eq!(meta.expire_date, "");
        assert_eq!(meta.description, "");
        assert_eq!(meta.used_by, vec!["InvoiceService".to_string()]);
        assert!(meta.referenced_from.is_empty());
    }

    #[test]
    fn record_serializes_every_key_with_defaults() {
        let record = InjectValue::new("payment.api.key").into_metadata().to_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "property": "payment.api.key",
                "name": "",
                "expirationDate": "",
                "propertyDescription": "",
                "propertyBeingUsedBy": [],
                "propertyReferencedFrom": [],
            })
        );
    }

    #[test]
    fn referenced_by_extends_consumers() {
        let record = InjectValue::new("k")
            .used_by(["A"])
            .referenced_by(["B"])
            .referenced_from(["Producer"])
            .into_metadata()
            .to_record();
        assert_eq!(record.property_being_used_by, vec!["A", "B"]);
        assert_eq!(record.property_referenced_from, vec!["Producer"]);
    }
}
