use anyhow::{Context, Result};
use clap::Parser;
use inject_value_scanner::aggregate::{Aggregate, Aggregator};
use inject_value_scanner::cli::{Cli, Commands, LogLevel, OutputFormat};
use inject_value_scanner::config::{build_source, load_properties, resolve_settings, Settings};
use inject_value_scanner::placeholder;
use inject_value_scanner::registry::DeclarationRegistry;
use inject_value_scanner::reporter::Reporter;
use inject_value_scanner::scanner::Scanner;
use inject_value_scanner::schedule::{CronSchedule, ReportScheduler};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let properties = load_properties(&cli)?;
    if let Some(origin) = properties.origin() {
        debug!("Loaded properties from {}", origin.display());
    }
    let registry = Arc::new(DeclarationRegistry::new(properties));
    let settings = resolve_settings(&registry)?;
    let scanner = Scanner::new(build_source(&cli, &settings, &registry), settings.root.clone())
        .with_budget(settings.budget);
    let aggregator = Aggregator::new(settings.policy);

    match cli.command.clone() {
        Commands::Scan { format } => {
            let report = scan(&scanner, &aggregator, &settings)?;
            write_scan_output(&report, format)?;
        }
        Commands::Run { cron } => {
            let schedule = match cron {
                Some(expr) => CronSchedule::parse(&expr)?,
                None => settings.cron.clone(),
            };
            run(Reporter::new(scanner, aggregator), schedule, settings.enabled)?;
        }
        Commands::Resolve => {
            let resolved = resolve(&scanner, &registry)?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
    }

    Ok(())
}

fn init_logging(level: LogLevel) {
    let level = match level {
        LogLevel::None => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    env_logger::Builder::from_env(env)
        .format_module_path(false)
        .format_target(false)
        .init();
}

#[derive(Debug, Serialize)]
struct ScanReport {
    root: String,
    source: String,
    classes: usize,
    fields: usize,
    fingerprint: String,
    duration_ms: u64,
    aggregate: Aggregate,
}

fn scan(scanner: &Scanner, aggregator: &Aggregator, settings: &Settings) -> Result<ScanReport> {
    let start = Instant::now();
    let discoveries = scanner
        .scan()
        .with_context(|| format!("Scan of `{}` failed", settings.root.as_str()))?;
    let aggregate = aggregator.aggregate(discoveries);

    Ok(ScanReport {
        root: settings.root.as_str().to_string(),
        source: scanner.source().describe(),
        classes: aggregate.len(),
        fields: aggregate.record_count(),
        fingerprint: aggregate.fingerprint()?,
        duration_ms: start.elapsed().as_millis() as u64,
        aggregate,
    })
}

fn write_scan_output(report: &ScanReport, format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("root: {}\n", report.root));
            out.push_str(&format!("source: {}\n", report.source));
            out.push_str(&format!("classes: {}\n", report.classes));
            out.push_str(&format!("fields: {}\n", report.fields));
            out.push_str(&format!("duration_ms: {}\n", report.duration_ms));
            for (class_name, usage) in report.aggregate.iter() {
                for record in usage.records() {
                    out.push_str(&format!(
                        "- {class_name}: {} (name: {:?}, used by: {})\n",
                        record.property,
                        record.name,
                        record.property_being_used_by.join(", ")
                    ));
                }
            }
            out
        }
    };

    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn run(reporter: Reporter, schedule: CronSchedule, enabled: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };
        ReportScheduler::new(Arc::new(reporter), schedule)
            .enabled(enabled)
            .run(shutdown)
            .await;
    });

    info!("@InjectValue reporter stopped");
    Ok(())
}

#[derive(Debug, Serialize)]
struct ResolvedField {
    class: String,
    field: String,
    property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn resolve(scanner: &Scanner, registry: &DeclarationRegistry) -> Result<Vec<ResolvedField>> {
    let discoveries = scanner
        .scan()
        .with_context(|| format!("Scan of `{}` failed", scanner.root().as_str()))?;

    Ok(discoveries
        .into_iter()
        .map(|d| {
            let resolved = placeholder::resolve(&d.metadata.expression, registry.properties());
            let (value, error) = match resolved {
                Ok(v) => (Some(v), None),
                Err(e) => (None, Some(e.to_string())),
            };
            ResolvedField {
                class: d.class_name,
                field: d.field,
                property: d.metadata.expression,
                value,
                error,
            }
        })
        .collect())
}
