//! One scan + aggregate pass, reported through the log.

use log::{error, info};

use crate::aggregate::{Aggregate, Aggregator};
use crate::error::FailureKind;
use crate::scanner::Scanner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Nothing annotated under the root; nothing was logged.
    Empty,
    Reported(Aggregate),
    Failed(FailureKind),
}

#[derive(Clone)]
pub struct Reporter {
    scanner: Scanner,
    aggregator: Aggregator,
}

impl Reporter {
    pub fn new(scanner: Scanner, aggregator: Aggregator) -> Self {
        Self {
            scanner,
            aggregator,
        }
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Scans, aggregates, and logs. Failures are logged once and contained here.
    pub fn run_once(&self) -> ReportOutcome {
        let discoveries = match self.scanner.scan() {
            Ok(discoveries) => discoveries,
            Err(e) => {
                let kind = e.kind();
                error!(
                    "Error occurred while scanning and logging value annotations: {:#}",
                    anyhow::Error::from(e)
                );
                return ReportOutcome::Failed(kind);
            }
        };

        let aggregate = self.aggregator.aggregate(discoveries);
        if aggregate.is_empty() {
            return ReportOutcome::Empty;
        }

        match aggregate.to_json() {
            Ok(json) => {
                info!("@InjectValue contents: {json}");
                ReportOutcome::Reported(aggregate)
            }
            Err(e) => {
                error!("Error occurred while serializing value annotations: {e}");
                ReportOutcome::Failed(FailureKind::Unexpected)
            }
        }
    }
}
