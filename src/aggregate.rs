//! Folding scan discoveries into the per-class aggregate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::metadata::PropertyRecord;
use crate::scanner::Discovery;

/// What happens when a class has more than one annotated field.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// The last-declared annotated field overwrites earlier ones.
    #[default]
    LastWins,
    /// Every annotated field is kept, in declaration order.
    CollectAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClassUsage {
    Single(PropertyRecord),
    Many(Vec<PropertyRecord>),
}

impl ClassUsage {
    pub fn records(&self) -> &[PropertyRecord] {
        match self {
            Self::Single(record) => std::slice::from_ref(record),
            Self::Many(records) => records,
        }
    }
}

/// Class name -> metadata for one scan. Keys are sorted, so equal scans serialize equally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Aggregate {
    classes: BTreeMap<String, ClassUsage>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Number of records across all classes.
    pub fn record_count(&self) -> usize {
        self.classes.values().map(|u| u.records().len()).sum()
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassUsage> {
        self.classes.get(class_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassUsage)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// SHA-256 of the canonical JSON form.
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let json = self.to_json()?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: AggregationPolicy,
}

impl Aggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    pub fn aggregate(&self, discoveries: impl IntoIterator<Item = Discovery>) -> Aggregate {
        let mut classes: BTreeMap<String, ClassUsage> = BTreeMap::new();

        for discovery in discoveries {
            let record = discovery.metadata.to_record();
            match self.policy {
                AggregationPolicy::LastWins => {
                    classes.insert(discovery.class_name, ClassUsage::Single(record));
                }
                AggregationPolicy::CollectAll => {
                    let usage = classes
                        .entry(discovery.class_name)
                        .or_insert_with(|| ClassUsage::Many(Vec::new()));
                    if let ClassUsage::Many(records) = usage {
                        records.push(record);
                    }
                }
            }
        }

        Aggregate { classes }
    }
}
