//! Settings resolution.
//!
//! The scanner's own settings are `InjectValue` declarations injected through the
//! registry, so `--registry` scans report them like any other property.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::AggregationPolicy;
use crate::archive::SourceArchive;
use crate::cli::Cli;
use crate::java::DEFAULT_ANNOTATION;
use crate::metadata::InjectValue;
use crate::properties::PropertySource;
use crate::registry::DeclarationRegistry;
use crate::schedule::{CronSchedule, DEFAULT_CRON};
use crate::source::{ClassSource, RootNamespace};
use crate::tree::SourceTree;

pub const ROOT_PACKAGE_KEY: &str = "project.root.package";
pub const SOURCE_KEY: &str = "inject-value.scan.source";
pub const CRON_KEY: &str = "inject-value.scan.cron";
pub const ENABLED_KEY: &str = "inject-value.scan.enabled";
pub const POLICY_KEY: &str = "inject-value.scan.policy";
pub const ANNOTATION_KEY: &str = "inject-value.scan.annotation";
pub const BUDGET_KEY: &str = "inject-value.scan.budget-secs";

pub const CONFIG_ENV: &str = "INJECT_VALUE_CONFIG";
pub const DEFAULT_SOURCE: &str = "src/main/java";

/// Root namespace of this crate's own registered declarations.
pub const SELF_NAMESPACE: &str = "inject_value_scanner";
const SETTINGS_CLASS: &str = "inject_value_scanner.config.Settings";

#[derive(Debug, Clone)]
pub struct Settings {
    pub root: RootNamespace,
    pub source: PathBuf,
    pub cron: CronSchedule,
    pub enabled: bool,
    pub policy: AggregationPolicy,
    pub annotation: String,
    pub budget: Option<Duration>,
}

pub fn resolve_properties_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(p) = cli.config.clone() {
        return Some(p);
    }

    if let Ok(p) = env::var(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }

    let candidates = [
        PathBuf::from("application.properties"),
        Path::new("src").join("main").join("resources").join("application.properties"),
    ];
    if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
        return Some(found);
    }

    dirs::config_dir()
        .map(|d| d.join("inject-value-scanner").join("application.properties"))
        .filter(|p| p.is_file())
}

/// Properties file (if any), then environment, then CLI flags as overrides.
pub fn load_properties(cli: &Cli) -> Result<PropertySource> {
    let mut props = match resolve_properties_path(cli) {
        Some(path) => PropertySource::load(&path)?,
        None => PropertySource::new(),
    }
    .with_system_env();

    for raw in &cli.overrides {
        let (key, value) = raw
            .split_once('=')
            .with_context(|| format!("Override must be KEY=VALUE: {raw}"))?;
        props.set(key.trim(), value.trim());
    }

    if cli.registry {
        props.set(
            ROOT_PACKAGE_KEY,
            cli.root.clone().unwrap_or_else(|| SELF_NAMESPACE.to_string()),
        );
    } else if let Some(root) = cli.root.clone() {
        props.set(ROOT_PACKAGE_KEY, root);
    }
    if let Some(source) = cli.source.as_ref() {
        props.set(SOURCE_KEY, source.to_string_lossy());
    }
    if let Some(annotation) = cli.annotation.clone() {
        props.set(ANNOTATION_KEY, annotation);
    }
    if let Some(policy) = cli.policy {
        let name = policy
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        props.set(POLICY_KEY, name);
    }

    Ok(props)
}

pub fn resolve_settings(registry: &DeclarationRegistry) -> Result<Settings> {
    let root = registry
        .inject(
            SETTINGS_CLASS,
            "root",
            InjectValue::new(format!("${{{ROOT_PACKAGE_KEY}}}"))
                .name("Root package")
                .description("Namespace the scanner recurses under")
                .used_by(["Scanner"]),
        )
        .with_context(|| {
            format!(
                "Root package is not configured (set {ROOT_PACKAGE_KEY}, PROJECT_ROOT_PACKAGE, or --root)"
            )
        })?;

    let source = registry.inject(
        SETTINGS_CLASS,
        "source",
        InjectValue::new(format!("${{{SOURCE_KEY}:{DEFAULT_SOURCE}}}"))
            .name("Scan source")
            .description("Java source directory or sources archive")
            .used_by(["SourceTree", "SourceArchive"]),
    )?;

    let cron = registry.inject(
        SETTINGS_CLASS,
        "cron",
        InjectValue::new(format!("${{{CRON_KEY}:{DEFAULT_CRON}}}"))
            .name("Report schedule")
            .description("Cron expression, seconds first; '-' disables")
            .used_by(["ReportScheduler"]),
    )?;
    let cron = CronSchedule::parse(&cron)?;

    let enabled: bool = registry.inject_as(
        SETTINGS_CLASS,
        "enabled",
        InjectValue::new(format!("${{{ENABLED_KEY}:true}}"))
            .name("Reporting enabled")
            .used_by(["ReportScheduler"]),
    )?;

    let policy = registry.inject(
        SETTINGS_CLASS,
        "policy",
        InjectValue::new(format!("${{{POLICY_KEY}:last-wins}}"))
            .name("Aggregation policy")
            .description("last-wins or collect-all")
            .used_by(["Aggregator"]),
    )?;
    let policy = AggregationPolicy::from_str(&policy, true)
        .map_err(|e| anyhow::anyhow!("Invalid {POLICY_KEY} '{policy}': {e}"))?;

    let annotation = registry.inject(
        SETTINGS_CLASS,
        "annotation",
        InjectValue::new(format!("${{{ANNOTATION_KEY}:{DEFAULT_ANNOTATION}}}"))
            .name("Annotation name")
            .used_by(["SourceTree", "SourceArchive"]),
    )?;

    let budget = registry.inject(
        SETTINGS_CLASS,
        "budget",
        InjectValue::new(format!("${{{BUDGET_KEY}:}}"))
            .name("Scan budget")
            .description("Seconds a single scan may take; empty for no limit")
            .used_by(["Scanner"]),
    )?;
    let budget = match budget.trim() {
        "" => None,
        secs => Some(Duration::from_secs(
            secs.parse()
                .with_context(|| format!("Invalid {BUDGET_KEY} '{secs}'"))?,
        )),
    };

    Ok(Settings {
        root: RootNamespace::new(&root),
        source: PathBuf::from(source),
        cron,
        enabled,
        policy,
        annotation,
        budget,
    })
}

/// Chooses the class source: the registry itself, a sources archive, or a directory.
pub fn build_source(
    cli: &Cli,
    settings: &Settings,
    registry: &Arc<DeclarationRegistry>,
) -> Arc<dyn ClassSource> {
    if cli.registry {
        return Arc::clone(registry) as Arc<dyn ClassSource>;
    }
    if SourceArchive::is_archive(&settings.source) {
        return Arc::new(SourceArchive::new(&settings.source, &settings.annotation));
    }
    Arc::new(SourceTree::new(&settings.source, &settings.annotation))
}
