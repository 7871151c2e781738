use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::registry::{repo_name, PluginRecord, PluginRegistry};
use crate::resources::{IssueFinding, Resources, ScannerFinding};

/// What to do with records in issues/scanner data that reference a plugin
/// (or repository) the update center no longer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Record a warning and drop the record (default).
    Skip,
    /// Keep the record as a verdict with no registry metadata.
    Retain,
}

/// The consolidated per-plugin record the classifier and reporter work
/// from. One verdict per known plugin id, always, even when no source has
/// anything to say about it.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginVerdict {
    pub id: String,
    pub title: String,
    pub version: String,
    pub popularity: u64,
    pub release_date: Option<String>,
    pub scm: Option<String>,
    pub deprecated: bool,
    pub adopt_this_plugin: bool,
    pub security_warnings: Vec<String>,
    pub unmaintained: Option<String>,
    pub note: Option<String>,
    /// None: the plugin has never been tracked in issues.yaml.
    /// Some(empty): tracked, no known issues.
    pub issues: Option<Vec<IssueFinding>>,
    /// None: the plugin's repository never appeared in scanner output.
    pub scanner: Option<Vec<ScannerFinding>>,
    /// Set when the record was retained despite missing registry metadata.
    pub orphaned: bool,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub verdicts: Vec<PluginVerdict>,
    /// Non-fatal lookup warnings, one per skipped orphan record.
    pub warnings: Vec<String>,
}

/// Join the three resource files and the registry into one verdict per
/// plugin. Finding order within a verdict preserves source-file order, and
/// the output is sorted by popularity (descending, plugin id as tiebreak)
/// so identical inputs always produce identical reports.
pub fn merge(
    registry: &PluginRegistry,
    resources: &Resources,
    policy: OrphanPolicy,
    now: DateTime<Utc>,
) -> MergeOutcome {
    // First entry wins on duplicate ids/repos, as with a linear scan of
    // the source file.
    let mut issues_by_id: HashMap<&str, &Vec<IssueFinding>> = HashMap::new();
    for entry in &resources.issues {
        issues_by_id
            .entry(entry.id.as_str())
            .or_insert(&entry.findings);
    }
    let mut scanner_by_repo: HashMap<&str, &Vec<ScannerFinding>> = HashMap::new();
    for entry in &resources.scanner {
        scanner_by_repo
            .entry(entry.repo.as_str())
            .or_insert(&entry.findings);
    }

    let mut verdicts = Vec::with_capacity(registry.len());
    let mut warnings = Vec::new();

    for record in registry.records() {
        let issues = issues_by_id.get(record.id.as_str()).map(|f| (*f).clone());
        let scanner = record
            .scm
            .as_deref()
            .and_then(repo_name)
            .and_then(|repo| scanner_by_repo.get(repo.as_str()))
            .map(|f| (*f).clone());

        verdicts.push(verdict_for(record, resources, issues, scanner, now));
    }

    // Issues entries for plugins the update center no longer lists.
    for entry in &resources.issues {
        if registry.contains(&entry.id) {
            continue;
        }
        match policy {
            OrphanPolicy::Skip => warnings.push(format!(
                "issues.yaml entry '{}' does not match any known plugin, skipping",
                entry.id
            )),
            OrphanPolicy::Retain => {
                verdicts.push(orphan_verdict(&entry.id, resources, Some(entry.findings.clone()), None));
            }
        }
    }

    // Scanner entries for repositories no known plugin points at.
    for entry in &resources.scanner {
        if registry.repo_is_known(&entry.repo) {
            continue;
        }
        match policy {
            OrphanPolicy::Skip => warnings.push(format!(
                "csp-scanner.yaml entry '{}' does not match any known plugin repository, skipping",
                entry.repo
            )),
            OrphanPolicy::Retain => {
                verdicts.push(orphan_verdict(
                    &entry.repo,
                    resources,
                    None,
                    Some(entry.findings.clone()),
                ));
            }
        }
    }

    verdicts.sort_by(|a, b| {
        b.popularity
            .cmp(&a.popularity)
            .then_with(|| a.id.cmp(&b.id))
    });

    MergeOutcome { verdicts, warnings }
}

fn verdict_for(
    record: &PluginRecord,
    resources: &Resources,
    issues: Option<Vec<IssueFinding>>,
    scanner: Option<Vec<ScannerFinding>>,
    now: DateTime<Utc>,
) -> PluginVerdict {
    PluginVerdict {
        id: record.id.clone(),
        title: record.title.clone(),
        version: record.version.clone(),
        popularity: record.popularity,
        release_date: record.release_timestamp.as_ref().map(|ts| ts.display()),
        scm: record.scm.clone(),
        deprecated: record.deprecated,
        adopt_this_plugin: record.adopt_this_plugin,
        security_warnings: record.security_warnings.clone(),
        unmaintained: record.unmaintained(now),
        note: resources.notes.get(&record.id).cloned(),
        issues,
        scanner,
        orphaned: false,
    }
}

fn orphan_verdict(
    id: &str,
    resources: &Resources,
    issues: Option<Vec<IssueFinding>>,
    scanner: Option<Vec<ScannerFinding>>,
) -> PluginVerdict {
    PluginVerdict {
        id: id.to_string(),
        title: String::new(),
        version: String::new(),
        popularity: 0,
        release_date: None,
        scm: None,
        deprecated: false,
        adopt_this_plugin: false,
        security_warnings: Vec::new(),
        unmaintained: None,
        note: resources.notes.get(id).cloned(),
        issues,
        scanner,
        orphaned: true,
    }
}
