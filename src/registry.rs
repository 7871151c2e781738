use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use crate::update_center::{ReleaseTimestamp, UpdateCenter};

/// A plugin is considered unmaintained once its last release is this old.
const UNMAINTAINED_AFTER_DAYS: i64 = 5 * 365;

/// Everything the report needs to know about one plugin, distilled from the
/// update center at load time. Read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginRecord {
    pub id: String,
    pub title: String,
    pub version: String,
    pub popularity: u64,
    pub release_timestamp: Option<ReleaseTimestamp>,
    pub scm: Option<String>,
    pub deprecated: bool,
    pub adopt_this_plugin: bool,
    /// Active security warning ids for the plugin's current version.
    pub security_warnings: Vec<String>,
}

impl PluginRecord {
    /// Maintenance annotation for the notes column, or None while the
    /// plugin still sees releases.
    pub fn unmaintained(&self, now: DateTime<Utc>) -> Option<String> {
        let Some(raw) = &self.release_timestamp else {
            return Some("Unmaintained (no release date)".to_string());
        };

        let Some(release_date) = raw.parse() else {
            return Some("Unmaintained (invalid release date)".to_string());
        };

        if release_date < now - Duration::days(UNMAINTAINED_AFTER_DAYS) {
            return Some(format!(
                "Unmaintained (last release {})",
                release_date.format("%Y-%m")
            ));
        }

        None
    }
}

/// The canonical set of known plugins, keyed by plugin id, plus an index
/// from GitHub repository name to plugin ids for joining scanner data.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    records: BTreeMap<String, PluginRecord>,
    repo_index: HashMap<String, Vec<String>>,
}

impl PluginRegistry {
    pub fn from_update_center(update_center: &UpdateCenter) -> Self {
        let mut records = BTreeMap::new();
        let mut repo_index: HashMap<String, Vec<String>> = HashMap::new();

        for (id, metadata) in &update_center.plugins {
            let deprecated = metadata.labels.iter().any(|label| label == "deprecated")
                || update_center.deprecations.contains_key(id);
            let adopt_this_plugin = metadata
                .labels
                .iter()
                .any(|label| label == "adopt-this-plugin");

            let security_warnings =
                active_security_warnings(id, &metadata.version, update_center);

            if let Some(repo) = metadata.scm.as_deref().and_then(repo_name) {
                repo_index.entry(repo).or_default().push(id.clone());
            }

            records.insert(
                id.clone(),
                PluginRecord {
                    id: id.clone(),
                    title: metadata.title.clone(),
                    version: metadata.version.clone(),
                    popularity: metadata.popularity,
                    release_timestamp: metadata.release_timestamp.clone(),
                    scm: metadata.scm.clone(),
                    deprecated,
                    adopt_this_plugin,
                    security_warnings,
                },
            );
        }

        for ids in repo_index.values_mut() {
            ids.sort();
        }

        Self {
            records,
            repo_index,
        }
    }

    pub fn get(&self, id: &str) -> Option<&PluginRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Records in stable plugin-id order.
    pub fn records(&self) -> impl Iterator<Item = &PluginRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any known plugin lives in the given repository.
    pub fn repo_is_known(&self, repo: &str) -> bool {
        self.repo_index.contains_key(repo)
    }
}

/// Extract the repository name from an scm URL, e.g. "mailer-plugin" from
/// "https://github.com/jenkinsci/mailer-plugin.git".
pub fn repo_name(scm: &str) -> Option<String> {
    let trimmed = scm.trim_end_matches('/').trim_end_matches(".git");
    let name = trimmed.rsplit('/').next()?;
    if name.is_empty() || !trimmed.contains('/') {
        return None;
    }
    Some(name.to_string())
}

/// Security warning ids whose version pattern matches the plugin's current
/// version in full. Patterns are anchored so a prefix match never counts;
/// invalid patterns in the feed are skipped.
fn active_security_warnings(id: &str, version: &str, update_center: &UpdateCenter) -> Vec<String> {
    let mut active = Vec::new();

    for warning in &update_center.warnings {
        if warning.name.as_deref() != Some(id) {
            continue;
        }

        for version_info in &warning.versions {
            let Some(pattern) = &version_info.pattern else {
                continue;
            };
            let Ok(re) = Regex::new(&format!("^(?:{pattern})$")) else {
                continue;
            };
            if re.is_match(version) {
                let warning_id = warning.id.clone().unwrap_or_else(|| "UNKNOWN".to_string());
                if !active.contains(&warning_id) {
                    active.push(warning_id);
                }
            }
        }
    }

    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update_center::{PluginMetadata, SecurityWarning, WarningVersion};
    use chrono::TimeZone;

    fn metadata(version: &str, labels: &[&str], scm: Option<&str>) -> PluginMetadata {
        PluginMetadata {
            title: "Test".into(),
            version: version.into(),
            popularity: 100,
            release_timestamp: Some(ReleaseTimestamp::Iso("2026-01-01T00:00:00Z".into())),
            scm: scm.map(String::from),
            labels: labels.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn update_center_with(
        plugins: Vec<(&str, PluginMetadata)>,
        deprecations: Vec<&str>,
        warnings: Vec<SecurityWarning>,
    ) -> UpdateCenter {
        UpdateCenter {
            plugins: plugins
                .into_iter()
                .map(|(id, m)| (id.to_string(), m))
                .collect(),
            deprecations: deprecations
                .into_iter()
                .map(|id| (id.to_string(), serde_json::Value::Null))
                .collect(),
            warnings,
        }
    }

    #[test]
    fn repo_name_strips_git_suffix_and_trailing_slash() {
        assert_eq!(
            repo_name("https://github.com/jenkinsci/mailer-plugin"),
            Some("mailer-plugin".into())
        );
        assert_eq!(
            repo_name("https://github.com/jenkinsci/mailer-plugin.git"),
            Some("mailer-plugin".into())
        );
        assert_eq!(
            repo_name("https://github.com/jenkinsci/mailer-plugin/"),
            Some("mailer-plugin".into())
        );
        assert_eq!(repo_name(""), None);
    }

    #[test]
    fn deprecated_via_label_or_deprecations_table() {
        let uc = update_center_with(
            vec![
                ("by-label", metadata("1.0", &["deprecated"], None)),
                ("by-table", metadata("1.0", &[], None)),
                ("neither", metadata("1.0", &[], None)),
            ],
            vec!["by-table"],
            vec![],
        );
        let registry = PluginRegistry::from_update_center(&uc);

        assert!(registry.get("by-label").unwrap().deprecated);
        assert!(registry.get("by-table").unwrap().deprecated);
        assert!(!registry.get("neither").unwrap().deprecated);
    }

    #[test]
    fn security_warning_requires_full_version_match() {
        let warning = SecurityWarning {
            id: Some("SECURITY-1234".into()),
            name: Some("foo".into()),
            versions: vec![WarningVersion {
                pattern: Some(r"1\.[0-9]+".into()),
            }],
        };
        let uc = update_center_with(
            vec![
                ("foo", metadata("1.5", &[], None)),
                ("bar", metadata("1.5", &[], None)),
            ],
            vec![],
            vec![warning],
        );
        let registry = PluginRegistry::from_update_center(&uc);

        assert_eq!(
            registry.get("foo").unwrap().security_warnings,
            vec!["SECURITY-1234".to_string()]
        );
        // Warning is scoped to "foo", not "bar".
        assert!(registry.get("bar").unwrap().security_warnings.is_empty());
    }

    #[test]
    fn security_warning_pattern_does_not_prefix_match() {
        let warning = SecurityWarning {
            id: Some("SECURITY-9".into()),
            name: Some("foo".into()),
            versions: vec![WarningVersion {
                pattern: Some(r"1\.5".into()),
            }],
        };
        let uc = update_center_with(
            vec![("foo", metadata("1.50", &[], None))],
            vec![],
            vec![warning],
        );
        let registry = PluginRegistry::from_update_center(&uc);

        assert!(registry.get("foo").unwrap().security_warnings.is_empty());
    }

    #[test]
    fn invalid_warning_pattern_is_skipped() {
        let warning = SecurityWarning {
            id: Some("SECURITY-2".into()),
            name: Some("foo".into()),
            versions: vec![WarningVersion {
                pattern: Some("[unclosed".into()),
            }],
        };
        let uc = update_center_with(
            vec![("foo", metadata("1.0", &[], None))],
            vec![],
            vec![warning],
        );
        let registry = PluginRegistry::from_update_center(&uc);

        assert!(registry.get("foo").unwrap().security_warnings.is_empty());
    }

    #[test]
    fn repo_index_tracks_scm_urls() {
        let uc = update_center_with(
            vec![(
                "mailer",
                metadata(
                    "1.0",
                    &[],
                    Some("https://github.com/jenkinsci/mailer-plugin"),
                ),
            )],
            vec![],
            vec![],
        );
        let registry = PluginRegistry::from_update_center(&uc);

        assert!(registry.repo_is_known("mailer-plugin"));
        assert!(!registry.repo_is_known("other-plugin"));
    }

    #[test]
    fn unmaintained_thresholds() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();

        let mut record = PluginRecord {
            id: "foo".into(),
            title: "Foo".into(),
            version: "1.0".into(),
            popularity: 0,
            release_timestamp: Some(ReleaseTimestamp::Iso("2026-01-01T00:00:00Z".into())),
            scm: None,
            deprecated: false,
            adopt_this_plugin: false,
            security_warnings: vec![],
        };
        assert_eq!(record.unmaintained(now), None);

        record.release_timestamp = Some(ReleaseTimestamp::Iso("2018-03-01T00:00:00Z".into()));
        assert_eq!(
            record.unmaintained(now).as_deref(),
            Some("Unmaintained (last release 2018-03)")
        );

        record.release_timestamp = None;
        assert_eq!(
            record.unmaintained(now).as_deref(),
            Some("Unmaintained (no release date)")
        );

        record.release_timestamp = Some(ReleaseTimestamp::Iso("garbage".into()));
        assert_eq!(
            record.unmaintained(now).as_deref(),
            Some("Unmaintained (invalid release date)")
        );
    }
}
