use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ReportError;

/// The three curated YAML files that feed the report, parsed and validated.
#[derive(Debug, Clone)]
pub struct Resources {
    pub issues: Vec<IssueEntry>,
    pub scanner: Vec<ScannerEntry>,
    pub notes: BTreeMap<String, String>,
}

/// One plugin's entry in issues.yaml. An empty findings list is a valid
/// state meaning "no known issues".
#[derive(Debug, Clone, PartialEq)]
pub struct IssueEntry {
    pub id: String,
    pub findings: Vec<IssueFinding>,
}

/// Tracker reference for an issue finding. Every finding carries at least
/// one of a tracker issue link or a plain URL; this is enforced when the
/// file is loaded, so the rest of the code never sees a reference-less
/// finding.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueRef {
    Url(String),
    Issue(String),
    Both { url: String, issue: String },
}

impl IssueRef {
    /// The link shown in reports. The tracker issue wins when both are set.
    pub fn tracker(&self) -> &str {
        match self {
            IssueRef::Url(url) => url,
            IssueRef::Issue(issue) | IssueRef::Both { issue, .. } => issue,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueFinding {
    pub reference: IssueRef,
    pub fix: Option<String>,
    pub release: Option<String>,
}

impl IssueFinding {
    /// A finding is resolved once the fix has shipped in a release. A fix
    /// link alone means fixed-but-unreleased, which still counts as open.
    pub fn is_resolved(&self) -> bool {
        self.release.is_some()
    }
}

/// One repository's entry in csp-scanner.yaml. The scanner keys its output
/// by GitHub repository name, not plugin id; the registry's scm index maps
/// between the two.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerEntry {
    pub repo: String,
    pub findings: Vec<ScannerFinding>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScannerFinding {
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub assessment: Assessment,
}

/// Human triage state of an automated scanner finding. Unreviewed findings
/// stay TODO and are treated as potentially real until triaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Assessment {
    #[serde(rename = "True Positive")]
    TruePositive,
    #[serde(rename = "False Positive")]
    FalsePositive,
    #[serde(rename = "TODO", alias = "Todo")]
    #[default]
    Todo,
}

#[derive(Debug, Deserialize)]
struct RawIssueEntry {
    id: String,
    #[serde(default)]
    findings: Option<Vec<RawIssueFinding>>,
}

#[derive(Debug, Deserialize)]
struct RawIssueFinding {
    url: Option<String>,
    issue: Option<String>,
    fix: Option<String>,
    release: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawScannerEntry {
    repo: String,
    // The scanner emits `findings:` with no items for clean repos, which
    // YAML parses as null rather than an empty sequence.
    #[serde(default)]
    findings: Option<Vec<ScannerFinding>>,
}

const ISSUES_FILE: &str = "issues.yaml";
const SCANNER_FILE: &str = "csp-scanner.yaml";
const NOTES_FILE: &str = "plugin-notes.yaml";

/// Load and validate all three resource files from a directory.
pub fn load(dir: &Path) -> Result<Resources, ReportError> {
    Ok(Resources {
        issues: load_issues(&dir.join(ISSUES_FILE))?,
        scanner: load_scanner(&dir.join(SCANNER_FILE))?,
        notes: load_yaml(&dir.join(NOTES_FILE))?,
    })
}

fn load_issues(path: &Path) -> Result<Vec<IssueEntry>, ReportError> {
    let raw: Vec<RawIssueEntry> = load_yaml(path)?;

    let mut entries = Vec::with_capacity(raw.len());
    for entry in raw {
        let mut findings = Vec::new();
        for (index, finding) in entry.findings.unwrap_or_default().into_iter().enumerate() {
            let reference = match (finding.url, finding.issue) {
                (Some(url), Some(issue)) => IssueRef::Both { url, issue },
                (Some(url), None) => IssueRef::Url(url),
                (None, Some(issue)) => IssueRef::Issue(issue),
                (None, None) => {
                    return Err(ReportError::Validation {
                        file: path.to_path_buf(),
                        plugin: entry.id,
                        index,
                    });
                }
            };
            findings.push(IssueFinding {
                reference,
                fix: finding.fix,
                release: finding.release,
            });
        }
        entries.push(IssueEntry {
            id: entry.id,
            findings,
        });
    }

    Ok(entries)
}

fn load_scanner(path: &Path) -> Result<Vec<ScannerEntry>, ReportError> {
    let raw: Vec<RawScannerEntry> = load_yaml(path)?;

    Ok(raw
        .into_iter()
        .map(|entry| ScannerEntry {
            repo: entry.repo,
            findings: entry.findings.unwrap_or_default(),
        })
        .collect())
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReportError> {
    let content = fs::read_to_string(path).map_err(|source| ReportError::Io {
        file: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ReportError::Parse {
        file: path.to_path_buf(),
        source,
    })
}
