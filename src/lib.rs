//! # inject-value-scanner
//!
//! Collects `@InjectValue` property declarations from a codebase and reports them
//! as a class-name to metadata map, once or on a cron schedule.
//!
//! ## Architecture
//!
//! - **metadata**: The `InjectValue` declaration, its binding and metadata record
//! - **properties**: Layered property source (`.properties` file, environment, overrides)
//! - **placeholder**: `${key:default}` resolution against a property source
//! - **source**: Root namespace and the `ClassSource` seam scans read from
//! - **java**: Java compilation unit parsing using tree-sitter
//! - **tree**: Source directory discovery
//! - **archive**: `-sources.jar` reading
//! - **registry**: In-process declarations registered by injection
//! - **scanner**: Parallel discovery of annotated fields under a root
//! - **aggregate**: Folding discoveries into the per-class report map
//! - **reporter**: One scan, aggregate, and log pass
//! - **schedule**: Cron-driven reporting with overlap protection
//! - **config**: Settings resolution
//! - **error**: Scan and injection errors

pub mod aggregate;
pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod java;
pub mod metadata;
pub mod placeholder;
pub mod properties;
pub mod registry;
pub mod reporter;
pub mod scanner;
pub mod schedule;
pub mod source;
pub mod tree;
