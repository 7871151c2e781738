use serde::Serialize;
use std::fmt;

use crate::merge::PluginVerdict;
use crate::resources::Assessment;

/// Display state of the issues column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStatus {
    /// The plugin has never been tracked in issues.yaml.
    NotTracked,
    /// Tracked and every finding has shipped in a release.
    Clean,
    /// Count of findings still lacking a release.
    Open(usize),
}

impl IssueStatus {
    /// The numeric form used in the machine-readable report; None when the
    /// plugin is not tracked at all.
    pub fn count(self) -> Option<usize> {
        match self {
            IssueStatus::NotTracked => None,
            IssueStatus::Clean => Some(0),
            IssueStatus::Open(n) => Some(n),
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueStatus::NotTracked => write!(f, "-"),
            IssueStatus::Clean => write!(f, "0"),
            IssueStatus::Open(n) => write!(f, "{n}"),
        }
    }
}

/// Display state of the scanner column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerStatus {
    /// The plugin's repository never appeared in scanner output, or the
    /// scanner recorded no findings for it.
    NotScanned,
    /// Every recorded finding was triaged as a false positive.
    Clean,
    /// Count of findings that are confirmed or still awaiting triage.
    Outstanding(usize),
}

impl ScannerStatus {
    pub fn count(self) -> Option<usize> {
        match self {
            ScannerStatus::NotScanned => None,
            ScannerStatus::Clean => Some(0),
            ScannerStatus::Outstanding(n) => Some(n),
        }
    }
}

impl fmt::Display for ScannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerStatus::NotScanned => write!(f, "-"),
            ScannerStatus::Clean => write!(f, "0"),
            ScannerStatus::Outstanding(n) => write!(f, "{n}"),
        }
    }
}

/// An unresolved issue finding, for the detailed report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueDetail {
    pub issue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

/// A non-false-positive scanner finding, for the detailed report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerDetail {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub fn issue_status(verdict: &PluginVerdict) -> IssueStatus {
    let Some(findings) = &verdict.issues else {
        return IssueStatus::NotTracked;
    };

    let open = findings.iter().filter(|f| !f.is_resolved()).count();
    if open == 0 {
        IssueStatus::Clean
    } else {
        IssueStatus::Open(open)
    }
}

pub fn scanner_status(verdict: &PluginVerdict) -> ScannerStatus {
    let Some(findings) = &verdict.scanner else {
        return ScannerStatus::NotScanned;
    };
    if findings.is_empty() {
        return ScannerStatus::NotScanned;
    }

    let outstanding = findings
        .iter()
        .filter(|f| f.assessment != Assessment::FalsePositive)
        .count();
    if outstanding == 0 {
        ScannerStatus::Clean
    } else {
        ScannerStatus::Outstanding(outstanding)
    }
}

/// The notes column: the manual note first, then automated annotations from
/// the update center, then release pointers for resolved issues. Joined
/// with newlines; empty when nothing applies.
pub fn notes(verdict: &PluginVerdict) -> String {
    let mut notes = Vec::new();

    if let Some(note) = &verdict.note {
        if !note.is_empty() {
            notes.push(note.clone());
        }
    }

    if verdict.deprecated {
        notes.push("Deprecated".to_string());
    }

    if verdict.adopt_this_plugin {
        notes.push("Looking for maintainers".to_string());
    }

    for warning in &verdict.security_warnings {
        notes.push(format!("Unresolved {warning}"));
    }

    if let Some(unmaintained) = &verdict.unmaintained {
        notes.push(unmaintained.clone());
    }

    if let Some(findings) = &verdict.issues {
        for finding in findings {
            if let Some(release) = &finding.release {
                notes.push(format!("Fixed in {release}"));
            }
        }
    }

    notes.join("\n")
}

/// Unresolved issue findings with their tracker link and optional fix link.
pub fn issue_details(verdict: &PluginVerdict) -> Vec<IssueDetail> {
    let Some(findings) = &verdict.issues else {
        return Vec::new();
    };

    findings
        .iter()
        .filter(|f| !f.is_resolved())
        .map(|f| IssueDetail {
            issue: f.reference.tracker().to_string(),
            fix: f.fix.clone(),
        })
        .collect()
}

/// Scanner findings still considered real, with their source location.
pub fn scanner_details(verdict: &PluginVerdict) -> Vec<ScannerDetail> {
    let Some(findings) = &verdict.scanner else {
        return Vec::new();
    };

    findings
        .iter()
        .filter(|f| f.assessment != Assessment::FalsePositive)
        .map(|f| ScannerDetail {
            url: f.url.clone(),
            kind: f.kind.clone().unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect()
}
