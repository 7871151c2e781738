use anyhow::Context;
use clap::{Arg, Command};
use colored::Colorize;
use std::path::PathBuf;

mod classify;
mod error;
mod merge;
mod registry;
mod reporter;
mod resources;
mod update_center;

use merge::OrphanPolicy;
use registry::PluginRegistry;
use reporter::Reporter;
use update_center::UpdateCenterClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("resources")
                .short('r')
                .long("resources")
                .value_name("DIR")
                .default_value("resources")
                .help("Directory containing issues.yaml, csp-scanner.yaml and plugin-notes.yaml"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the report to a file (CSV format by default)"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .default_value("table")
                .help("Output format: table (console), json, csv. When used with -o, affects the output file format"),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .action(clap::ArgAction::SetTrue)
                .help("Offline mode - use only cached update center data"),
        )
        .arg(
            Arg::new("update-center-url")
                .long("update-center-url")
                .value_name("URL")
                .default_value(update_center::DEFAULT_URL)
                .help("Update center endpoint to fetch plugin metadata from"),
        )
        .arg(
            Arg::new("orphans")
                .long("orphans")
                .value_name("POLICY")
                .default_value("skip")
                .help("What to do with records for plugins unknown to the update center: skip, retain"),
        )
        .arg(
            Arg::new("refresh")
                .long("refresh")
                .action(clap::ArgAction::SetTrue)
                .help("Re-download the update center data and exit"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::SetTrue)
                .help("Verbose output"),
        )
        .get_matches();

    println!(
        "{} {}",
        "🛡️  Jenkins Plugin CSP Report".bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );

    let verbose = matches.get_flag("verbose");
    let offline = matches.get_flag("offline");
    let refresh = matches.get_flag("refresh");
    let resources_dir = PathBuf::from(
        matches
            .get_one::<String>("resources")
            .map(String::as_str)
            .unwrap_or("resources"),
    );
    let output_file = matches.get_one::<String>("output").map(PathBuf::from);
    let format_raw = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("table");
    let update_center_url = matches
        .get_one::<String>("update-center-url")
        .map(String::as_str)
        .unwrap_or(update_center::DEFAULT_URL)
        .to_string();
    let orphan_policy = match matches
        .get_one::<String>("orphans")
        .map(String::as_str)
        .unwrap_or("skip")
    {
        "retain" => OrphanPolicy::Retain,
        "skip" => OrphanPolicy::Skip,
        other => anyhow::bail!("Unknown orphan policy '{other}' (expected: skip, retain)"),
    };

    // When -o is specified and format is still the default "table", switch
    // to CSV for file output
    let format = if output_file.is_some() && format_raw == "table" {
        "csv"
    } else {
        format_raw
    };

    let client = UpdateCenterClient::new(update_center_url)?;

    if refresh {
        let payload = client.refresh().await?;
        println!(
            "{}",
            format!(
                "✅ Update center cache refreshed ({} plugins)",
                payload.plugins.len()
            )
            .bright_green()
            .bold()
        );
        return Ok(());
    }

    let resources = resources::load(&resources_dir).with_context(|| {
        format!(
            "Failed to load resource files from {}",
            resources_dir.display()
        )
    })?;

    if verbose {
        println!(
            "📚 Loaded {} issue entries, {} scanner entries, {} notes",
            resources.issues.len(),
            resources.scanner.len(),
            resources.notes.len()
        );
    }

    let payload = client.load(offline, verbose).await?;
    let registry = PluginRegistry::from_update_center(&payload);

    if verbose {
        println!("📦 {} plugins in the update center", registry.len());
    }

    let outcome = merge::merge(&registry, &resources, orphan_policy, chrono::Utc::now());
    for warning in &outcome.warnings {
        eprintln!("{}", format!("⚠️  {warning}").yellow());
    }

    let reporter = Reporter::new(format.to_string());
    reporter.generate_report(&outcome.verdicts, output_file)?;

    Ok(())
}
