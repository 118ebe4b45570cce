use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::aggregate::AggregationPolicy;

#[derive(Debug, Clone, Parser)]
#[command(name = "inject-value-scanner")]
#[command(about = "Collect @InjectValue property metadata from a codebase and report it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Properties file [default: first of $INJECT_VALUE_CONFIG, ./application.properties,
    /// ./src/main/resources/application.properties]
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Root package to scan (overrides project.root.package)
    #[arg(long, value_name = "PACKAGE", global = true)]
    pub root: Option<String>,

    /// Source directory or -sources.jar (overrides inject-value.scan.source)
    #[arg(long, value_name = "PATH", global = true)]
    pub source: Option<PathBuf>,

    /// Scan this binary's own registered declarations instead of Java sources
    #[arg(long, global = true)]
    pub registry: bool,

    #[arg(long, value_enum, global = true)]
    pub policy: Option<AggregationPolicy>,

    /// Annotation simple name to match
    #[arg(long, value_name = "NAME", global = true)]
    pub annotation: Option<String>,

    /// Property override, may be repeated
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run one scan and print the aggregate
    Scan {
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Log the aggregate on a cron schedule until interrupted
    Run {
        /// Cron expression, seconds first (overrides inject-value.scan.cron)
        #[arg(long, value_name = "EXPR")]
        cron: Option<String>,
    },
    /// Inject every discovered declaration against the configured properties
    Resolve,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
