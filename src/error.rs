use std::path::PathBuf;
use std::time::Duration;

/// Failures that abort a scan cycle.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to load type from {origin}: {reason}")]
    Unresolvable { origin: String, reason: String },

    #[error("@{annotation} on {class}.{field} has no property expression")]
    MissingExpression {
        annotation: String,
        class: String,
        field: String,
    },

    #[error("scan of `{root}` exceeded its {limit:?} budget")]
    BudgetExceeded { root: String, limit: Duration },

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A discovered candidate could not be loaded.
    Discovery,
    Unexpected,
}

impl ScanError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Read { .. } | Self::Archive { .. } | Self::Unresolvable { .. } => {
                FailureKind::Discovery
            }
            Self::MissingExpression { .. } | Self::BudgetExceeded { .. } | Self::Internal(_) => {
                FailureKind::Unexpected
            }
        }
    }
}

/// Failures resolving a declaration's expression to a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    #[error("could not resolve placeholder '{key}' in value \"{expression}\"")]
    Unresolved { key: String, expression: String },

    #[error("circular placeholder reference '{key}' in property definitions")]
    Circular { key: String },

    #[error("declaration on {class}.{field} has no property expression")]
    MissingExpression { class: String, field: String },

    #[error("unsupported expression \"{0}\"")]
    Unsupported(String),

    #[error("value \"{value}\" for \"{expression}\" is not a valid {target}")]
    Parse {
        expression: String,
        value: String,
        target: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_split_discovery_from_unexpected() {
        let read = ScanError::Read {
            path: PathBuf::from("A.java"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(read.kind(), FailureKind::Discovery);

        let missing = ScanError::MissingExpression {
            annotation: "InjectValue".to_string(),
            class: "a.B".to_string(),
            field: "key".to_string(),
        };
        assert_eq!(missing.kind(), FailureKind::Unexpected);
        assert_eq!(
            missing.to_string(),
            "@InjectValue on a.B.key has no property expression"
        );
    }
}
