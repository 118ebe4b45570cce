use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

const BIN: &str = env!("CARGO_BIN_EXE_inject-value-scanner");

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "inject_value_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn write_jar(path: &Path, entries: &[(&str, &str)]) -> anyhow::Result<()> {
    use std::io::Write;
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

fn run(cwd: &Path, args: &[&str]) -> anyhow::Result<Output> {
    Ok(Command::new(BIN)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .env_remove("INJECT_VALUE_CONFIG")
        .env_remove("PROJECT_ROOT_PACKAGE")
        .args(args)
        .output()?)
}

fn run_json(cwd: &Path, args: &[&str]) -> anyhow::Result<Value> {
    let out = run(cwd, args)?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}

const BILLING: &str = r#"
package com.acme.billing;

public class Billing {
    @InjectValue(value = "payment.api.key", name = "Payment Key", usedBy = {"InvoiceService"})
    private String apiKey;

    private String notAnnotated;
}
"#;

const MAILER: &str = r#"
package com.acme.mail;

class Mailer {
    @InjectValue("${mail.host:localhost}")
    String host;

    @InjectValue(value = "${mail.port}", description = "SMTP port")
    int port;
}
"#;

const OUTSIDE: &str = r#"
package org.other;

class Outside {
    @InjectValue("${never.reported}")
    String value;
}
"#;

fn project(name: &str) -> anyhow::Result<PathBuf> {
    let base = temp_dir(name);
    let java = base.join("src/main/java");
    write_file(&java.join("com/acme/billing/Billing.java"), BILLING)?;
    write_file(&java.join("com/acme/mail/Mailer.java"), MAILER)?;
    write_file(&java.join("org/other/Outside.java"), OUTSIDE)?;
    Ok(base)
}

#[test]
fn scan_reports_annotated_fields_under_root() -> anyhow::Result<()> {
    let base = project("scan")?;
    let report = run_json(&base, &["--root", "com.acme", "--log-level", "none", "scan"])?;

    assert_eq!(report["root"], "com.acme");
    assert_eq!(report["classes"], 2);
    assert_eq!(report["fields"], 2);
    assert_eq!(report["fingerprint"].as_str().map(str::len), Some(64));

    let aggregate = &report["aggregate"];
    assert_eq!(
        aggregate["com.acme.billing.Billing"],
        json!({
            "property": "payment.api.key",
            "name": "Payment Key",
            "expirationDate": "",
            "propertyDescription": "",
            "propertyBeingUsedBy": ["InvoiceService"],
            "propertyReferencedFrom": [],
        })
    );
    assert_eq!(aggregate["com.acme.mail.Mailer"]["property"], "${mail.port}");
    assert!(aggregate.get("org.other.Outside").is_none());

    let again = run_json(&base, &["--root", "com.acme", "--log-level", "none", "scan"])?;
    assert_eq!(report["fingerprint"], again["fingerprint"]);

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn collect_all_keeps_every_field() -> anyhow::Result<()> {
    let base = project("collect_all")?;
    let report = run_json(
        &base,
        &["--root", "com.acme.mail", "--policy", "collect-all", "scan"],
    )?;

    let mailer = report["aggregate"]["com.acme.mail.Mailer"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let properties: Vec<&str> = mailer
        .iter()
        .filter_map(|r| r["property"].as_str())
        .collect();
    assert_eq!(properties, vec!["${mail.host:localhost}", "${mail.port}"]);
    assert_eq!(mailer[1]["propertyDescription"], "SMTP port");

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn root_comes_from_application_properties() -> anyhow::Result<()> {
    let base = project("properties")?;
    write_file(
        &base.join("application.properties"),
        "project.root.package = org.other\n",
    )?;

    let report = run_json(&base, &["scan"])?;
    assert_eq!(report["classes"], 1);
    assert!(report["aggregate"]["org.other.Outside"].is_object());

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn empty_root_gives_empty_aggregate() -> anyhow::Result<()> {
    let base = project("empty")?;
    let report = run_json(&base, &["--root", "net.nothing", "scan"])?;
    assert_eq!(report["classes"], 0);
    assert_eq!(report["aggregate"], json!({}));

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn unparsable_source_fails_the_scan() -> anyhow::Result<()> {
    let base = project("broken")?;
    write_file(
        &base.join("src/main/java/com/acme/Broken.java"),
        "package com.acme;\nclass Broken { @InjectValue(\"x\") String \n",
    )?;

    let out = run(&base, &["--root", "com.acme", "scan"])?;
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Broken.java"), "stderr: {stderr}");

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn missing_root_package_is_reported() -> anyhow::Result<()> {
    let base = project("no_root")?;
    let out = run(&base, &["scan"])?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Root package is not configured"), "stderr: {stderr}");

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn scans_sources_archive() -> anyhow::Result<()> {
    let base = temp_dir("archive");
    let jar = base.join("billing-1.0-sources.jar");
    write_jar(
        &jar,
        &[
            ("com/acme/billing/Billing.java", BILLING),
            ("org/other/Outside.java", OUTSIDE),
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
        ],
    )?;

    let jar_arg = jar.to_string_lossy().to_string();
    let report = run_json(&base, &["--root", "com.acme", "--source", &jar_arg, "scan"])?;
    assert_eq!(report["classes"], 1);
    assert_eq!(
        report["aggregate"]["com.acme.billing.Billing"]["name"],
        "Payment Key"
    );

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn resolve_injects_against_properties() -> anyhow::Result<()> {
    let base = project("resolve")?;
    write_file(
        &base.join("application.properties"),
        "project.root.package=com.acme.mail\nmail.port=2525\n",
    )?;

    let resolved = run_json(&base, &["resolve"])?;
    let fields = resolved.as_array().cloned().unwrap_or_default();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0]["field"], "host");
    assert_eq!(fields[0]["value"], "localhost");
    assert_eq!(fields[1]["field"], "port");
    assert_eq!(fields[1]["value"], "2525");

    let resolved = run_json(&base, &["--set", "mail.port=25", "resolve"])?;
    assert_eq!(resolved[1]["value"], "25");

    std::fs::remove_dir_all(base)?;
    Ok(())
}

#[test]
fn registry_scan_reports_own_settings() -> anyhow::Result<()> {
    let base = temp_dir("registry");
    let report = run_json(&base, &["--registry", "--policy", "collect-all", "scan"])?;

    let settings = report["aggregate"]["inject_value_scanner.config.Settings"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(settings.len(), 7);
    assert_eq!(settings[0]["property"], "${project.root.package}");
    assert_eq!(settings[0]["propertyBeingUsedBy"], json!(["Scanner"]));

    std::fs::remove_dir_all(base)?;
    Ok(())
}
