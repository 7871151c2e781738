use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use crate::classify::{
    issue_details, issue_status, notes, scanner_details, scanner_status, IssueStatus,
    ScannerStatus,
};
use crate::merge::PluginVerdict;

pub struct Reporter {
    format: String,
}

impl Reporter {
    pub const fn new(format: String) -> Self {
        Self { format }
    }

    pub fn generate_report(
        &self,
        verdicts: &[PluginVerdict],
        output_file: Option<PathBuf>,
    ) -> Result<()> {
        let report_content = match self.format.as_str() {
            "json" => Self::generate_json_report(verdicts)?,
            "csv" => Self::generate_csv_report(verdicts),
            _ => Self::generate_table_report(verdicts),
        };

        if let Some(output_path) = output_file {
            fs::write(&output_path, &report_content)?;
            println!("📄 Report saved to: {}", output_path.display());
        } else {
            println!("{report_content}");
        }

        Self::print_summary(verdicts);

        Ok(())
    }

    fn generate_table_report(verdicts: &[PluginVerdict]) -> String {
        let mut output = String::new();

        if verdicts.is_empty() {
            output.push_str(&format!(
                "\n{}\n",
                "ℹ️  No plugins found in the update center data.".dimmed()
            ));
            return output;
        }

        let terminal_width = term_size::dimensions().map_or(120, |(w, _)| w.max(80));

        output.push_str(&format!(
            "\n{}\n",
            "🛡️  Jenkins Plugin CSP Compatibility".bright_cyan().bold()
        ));
        output.push_str(&format!("{}\n\n", "─".repeat(terminal_width).dimmed()));

        let plugin_width = 30;
        let popularity_width = 12;
        let issues_width = 8;
        let scanner_width = 9;
        let spacing = 4;
        let notes_width = terminal_width
            .saturating_sub(plugin_width + popularity_width + issues_width + scanner_width + spacing)
            .max(20);

        output.push_str(&format!(
            "{:<plugin_width$} {:<popularity_width$} {:<issues_width$} {:<scanner_width$} {}\n",
            "Plugin".bold(),
            "Popularity".bold(),
            "Issues".bold(),
            "Scanner".bold(),
            "Notes".bold(),
        ));
        output.push_str(&format!("{}\n", "─".repeat(terminal_width).dimmed()));

        for verdict in verdicts {
            let issues = issue_status(verdict);
            let scanner = scanner_status(verdict);

            // Pad the plain text first so the ANSI escapes added below do
            // not count toward the column width.
            let issues_plain = format!("{:<issues_width$}", issues.to_string());
            let scanner_plain = format!("{:<scanner_width$}", scanner.to_string());

            let issues_cell = match issues {
                IssueStatus::NotTracked => issues_plain.dimmed(),
                IssueStatus::Clean => issues_plain.bright_green(),
                IssueStatus::Open(_) => issues_plain.bright_red().bold(),
            };
            let scanner_cell = match scanner {
                ScannerStatus::NotScanned => scanner_plain.dimmed(),
                ScannerStatus::Clean => scanner_plain.bright_green(),
                ScannerStatus::Outstanding(_) => scanner_plain.bright_yellow().bold(),
            };

            let notes_cell = Self::truncate_cell(&notes(verdict).replace('\n', "; "), notes_width);
            let plugin_cell = Self::truncate_cell(&verdict.id, plugin_width);

            output.push_str(&format!(
                "{:<plugin_width$} {:<popularity_width$} {} {} {}\n",
                plugin_cell, verdict.popularity, issues_cell, scanner_cell, notes_cell,
            ));
        }

        output.push_str(&format!("\n{}\n", "─".repeat(terminal_width).dimmed()));

        output
    }

    fn truncate_cell(text: &str, width: usize) -> String {
        // Cut on char boundaries; notes are free text and may contain
        // multi-byte characters.
        if width > 3 && text.chars().count() > width - 3 {
            let cut: String = text.chars().take(width - 3).collect();
            format!("{cut}...")
        } else {
            text.to_string()
        }
    }

    fn generate_json_report(verdicts: &[PluginVerdict]) -> Result<String> {
        let mut entries = Vec::with_capacity(verdicts.len());

        for verdict in verdicts {
            let mut entry = serde_json::Map::new();
            entry.insert("id".into(), verdict.id.clone().into());
            entry.insert("displayName".into(), verdict.title.clone().into());
            entry.insert("popularity".into(), verdict.popularity.into());
            entry.insert(
                "date".into(),
                verdict.release_date.clone().unwrap_or_default().into(),
            );
            entry.insert("notes".into(), notes(verdict).into());
            entry.insert(
                "scm".into(),
                verdict.scm.clone().unwrap_or_default().into(),
            );

            // Counts and details only appear for plugins present in the
            // corresponding source file, so "never tracked" stays
            // distinguishable from "tracked and clean".
            if let Some(count) = issue_status(verdict).count() {
                entry.insert("issues".into(), count.into());
            }
            if let Some(count) = scanner_status(verdict).count() {
                entry.insert("scanner".into(), count.into());
            }
            let issue_details = issue_details(verdict);
            if !issue_details.is_empty() {
                entry.insert("issueDetails".into(), serde_json::to_value(issue_details)?);
            }
            let scanner_details = scanner_details(verdict);
            if !scanner_details.is_empty() {
                entry.insert(
                    "scannerDetails".into(),
                    serde_json::to_value(scanner_details)?,
                );
            }
            if verdict.orphaned {
                entry.insert("orphaned".into(), true.into());
            }

            entries.push(serde_json::Value::Object(entry));
        }

        let report = serde_json::json!({
            "generated": Utc::now(),
            "summary": {
                "total_plugins": verdicts.len(),
                "tracked_in_issues": verdicts.iter()
                    .filter(|v| issue_status(v).count().is_some()).count(),
                "scanned": verdicts.iter()
                    .filter(|v| scanner_status(v).count().is_some()).count(),
                "unresolved_issues": verdicts.iter()
                    .filter_map(|v| issue_status(v).count()).sum::<usize>(),
                "outstanding_scanner_findings": verdicts.iter()
                    .filter_map(|v| scanner_status(v).count()).sum::<usize>(),
                "with_notes": verdicts.iter().filter(|v| !notes(v).is_empty()).count(),
            },
            "plugins": entries,
        });

        Ok(serde_json::to_string_pretty(&report)?)
    }

    fn generate_csv_report(verdicts: &[PluginVerdict]) -> String {
        let mut output = String::new();

        output.push_str("Plugin,Display Name,Popularity,Release Date,Issues,Scanner,Notes,SCM\n");

        for verdict in verdicts {
            let issues = issue_status(verdict)
                .count()
                .map_or("-".to_string(), |n| n.to_string());
            let scanner = scanner_status(verdict)
                .count()
                .map_or("-".to_string(), |n| n.to_string());

            output.push_str(&format!(
                "{},\"{}\",{},{},{},{},\"{}\",{}\n",
                verdict.id.replace(',', ";"),
                verdict.title.replace('"', "'"),
                verdict.popularity,
                verdict.release_date.clone().unwrap_or_default(),
                issues,
                scanner,
                notes(verdict).replace('\n', "; ").replace('"', "'"),
                verdict.scm.clone().unwrap_or_default().replace(',', ";"),
            ));
        }

        output
    }

    fn print_summary(verdicts: &[PluginVerdict]) {
        let tracked = verdicts
            .iter()
            .filter(|v| issue_status(v).count().is_some())
            .count();
        let scanned = verdicts
            .iter()
            .filter(|v| scanner_status(v).count().is_some())
            .count();
        let unresolved: usize = verdicts.iter().filter_map(|v| issue_status(v).count()).sum();
        let outstanding: usize = verdicts
            .iter()
            .filter_map(|v| scanner_status(v).count())
            .sum();
        let noted = verdicts.iter().filter(|v| !notes(v).is_empty()).count();

        println!("\n📊 Summary:");
        println!(
            "   • Total plugins: {}",
            verdicts.len().to_string().bright_white().bold()
        );
        println!("   • Tracked in issues file: {tracked}");
        println!("   • Covered by scanner: {scanned}");
        if unresolved > 0 {
            println!(
                "   • Unresolved issues: {}",
                unresolved.to_string().bright_red().bold()
            );
        }
        if outstanding > 0 {
            println!(
                "   • Outstanding scanner findings: {}",
                outstanding.to_string().bright_yellow().bold()
            );
        }
        println!("   • Plugins with notes: {noted}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{IssueFinding, IssueRef};

    fn verdict(id: &str, popularity: u64) -> PluginVerdict {
        PluginVerdict {
            id: id.to_string(),
            title: format!("{id} plugin"),
            version: "1.0".into(),
            popularity,
            release_date: Some("2026-01-01T00:00:00.00Z".into()),
            scm: Some(format!("https://github.com/jenkinsci/{id}-plugin")),
            deprecated: false,
            adopt_this_plugin: false,
            security_warnings: vec![],
            unmaintained: None,
            note: None,
            issues: None,
            scanner: None,
            orphaned: false,
        }
    }

    #[test]
    fn json_report_omits_counts_for_untracked_plugins() {
        let verdicts = vec![verdict("untracked", 10)];
        let report = Reporter::generate_json_report(&verdicts).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();

        let entry = &parsed["plugins"][0];
        assert_eq!(entry["id"], "untracked");
        assert!(entry.get("issues").is_none());
        assert!(entry.get("scanner").is_none());
    }

    #[test]
    fn json_report_includes_counts_and_details_when_tracked() {
        let mut tracked = verdict("tracked", 10);
        tracked.issues = Some(vec![IssueFinding {
            reference: IssueRef::Issue("https://issues.jenkins.io/browse/JENKINS-9".into()),
            fix: None,
            release: None,
        }]);

        let report = Reporter::generate_json_report(&[tracked]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();

        let entry = &parsed["plugins"][0];
        assert_eq!(entry["issues"], 1);
        assert_eq!(
            entry["issueDetails"][0]["issue"],
            "https://issues.jenkins.io/browse/JENKINS-9"
        );
        assert_eq!(parsed["summary"]["unresolved_issues"], 1);
    }

    #[test]
    fn csv_report_renders_dashes_for_untracked_columns() {
        let report = Reporter::generate_csv_report(&[verdict("foo", 3)]);
        let line = report.lines().nth(1).unwrap();
        assert!(line.starts_with("foo,"));
        assert!(line.contains(",-,-,"));
    }

    #[test]
    fn table_report_handles_empty_input() {
        let report = Reporter::generate_table_report(&[]);
        assert!(report.contains("No plugins found"));
    }

    #[test]
    fn truncate_cell_respects_char_boundaries() {
        let text = format!("a{}", "é".repeat(80));
        let cell = Reporter::truncate_cell(&text, 20);
        assert_eq!(cell.chars().count(), 20);
        assert!(cell.ends_with("..."));
        assert_eq!(Reporter::truncate_cell("short", 20), "short");
    }

    #[test]
    fn table_report_truncates_multibyte_notes_without_panicking() {
        let mut noted = verdict("noted-plugin", 1);
        noted.note = Some(format!("a{}", "é".repeat(500)));

        let report = Reporter::generate_table_report(&[noted]);
        assert!(report.contains("..."));
    }

    #[test]
    fn colored_status_cells_keep_columns_aligned() {
        colored::control::set_override(true);

        let mut open = verdict("open-plugin", 10);
        open.issues = Some(vec![IssueFinding {
            reference: IssueRef::Issue("https://issues.jenkins.io/browse/JENKINS-11".into()),
            fix: None,
            release: None,
        }]);
        let untracked = verdict("plain-plugin", 5);

        let report = Reporter::generate_table_report(&[open, untracked]);
        colored::control::unset_override();

        let ansi = regex::Regex::new("\x1b\\[[0-9;]*m").unwrap();
        let rows: Vec<String> = report
            .lines()
            .filter(|line| line.contains("-plugin"))
            .map(|line| ansi.replace_all(line, "").into_owned())
            .collect();
        assert_eq!(rows.len(), 2);
        // Status cells are padded before coloring, so the stripped rows
        // line up column for column.
        assert_eq!(rows[0].len(), rows[1].len());
    }
}
