use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use futures::stream::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tokio::time::{timeout, Duration};

pub const DEFAULT_URL: &str =
    "https://mirrors.updates.jenkins.io/current/update-center.actual.json";

/// The slice of the Jenkins update center the report needs: the plugin
/// catalog plus the deprecation and security-warning side tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCenter {
    #[serde(default)]
    pub plugins: HashMap<String, PluginMetadata>,
    #[serde(default)]
    pub deprecations: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<SecurityWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub popularity: u64,
    #[serde(default, rename = "releaseTimestamp")]
    pub release_timestamp: Option<ReleaseTimestamp>,
    #[serde(default)]
    pub scm: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// The feed has published release timestamps both as ISO 8601 strings and
/// as Unix milliseconds over the years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReleaseTimestamp {
    Iso(String),
    Millis(i64),
}

impl ReleaseTimestamp {
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            ReleaseTimestamp::Iso(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(
                        raw.trim_end_matches('Z'),
                        "%Y-%m-%dT%H:%M:%S%.f",
                    )
                    .ok()
                    .map(|naive| naive.and_utc())
                }),
            ReleaseTimestamp::Millis(millis) => DateTime::from_timestamp_millis(*millis),
        }
    }

    /// The raw value as shown in the report's date column.
    pub fn display(&self) -> String {
        match self {
            ReleaseTimestamp::Iso(raw) => raw.clone(),
            ReleaseTimestamp::Millis(millis) => millis.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityWarning {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub versions: Vec<WarningVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningVersion {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedUpdateCenter {
    fetched_at: DateTime<Utc>,
    payload: UpdateCenter,
}

pub struct UpdateCenterClient {
    client: Client,
    cache_dir: PathBuf,
    url: String,
}

impl UpdateCenterClient {
    pub fn new(url: String) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cspls");

        fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

        let client = Client::builder()
            .user_agent("cspls/0.1.0 (csp-compatibility-report)")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            cache_dir,
            url,
        })
    }

    /// Load the update center, preferring a fresh cache (< 1h old) over the
    /// network. In offline mode only the cache is consulted; a stale cache
    /// is still used when a refresh attempt fails.
    #[allow(clippy::future_not_send)]
    pub async fn load(&self, offline: bool, verbose: bool) -> Result<UpdateCenter> {
        let cached = self.load_cache()?;

        if offline {
            return cached
                .map(|cache| cache.payload)
                .context("Offline mode requested but no cached update center data found");
        }

        if let Some(cache) = cached {
            let age = Utc::now().signed_duration_since(cache.fetched_at);
            if age.num_hours() < 1 {
                if verbose {
                    println!(
                        "📥 Using cached update center data ({}m old)",
                        age.num_minutes()
                    );
                }
                return Ok(cache.payload);
            }
            if verbose {
                println!("🔄 Cached update center data is {}h old", age.num_hours());
            }

            return match self.download().await {
                Ok(payload) => Ok(payload),
                Err(err) => {
                    eprintln!(
                        "{}",
                        format!("⚠️  Update center download failed ({err:#}), using stale cache")
                            .yellow()
                    );
                    Ok(cache.payload)
                }
            };
        }

        self.download().await
    }

    /// Force a fresh download, bypassing any cache.
    #[allow(clippy::future_not_send)]
    pub async fn refresh(&self) -> Result<UpdateCenter> {
        self.download().await
    }

    #[allow(clippy::future_not_send)]
    async fn download(&self) -> Result<UpdateCenter> {
        print!("{} ", "🌐 Downloading update center data...".bright_blue());

        let response = timeout(Duration::from_secs(120), self.client.get(&self.url).send())
            .await
            .context("Update center download timeout")?
            .context("Failed to download update center data")?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Update center download failed with status: {}",
                response.status()
            ));
        }

        let content_length = response.content_length().unwrap_or(3_000_000);

        let pb = ProgressBar::new(content_length);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("\r📥 [{bar:20.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;
            body.extend_from_slice(&chunk);
            pb.set_position(body.len() as u64);
        }

        pb.finish_and_clear();

        let payload: UpdateCenter =
            serde_json::from_slice(&body).context("Failed to parse update center JSON")?;

        println!("✅ {} plugins", payload.plugins.len());

        self.save_cache(&payload)?;

        Ok(payload)
    }

    fn cache_path(&self) -> PathBuf {
        self.cache_dir.join("update-center.json")
    }

    fn save_cache(&self, payload: &UpdateCenter) -> Result<()> {
        let cache = CachedUpdateCenter {
            fetched_at: Utc::now(),
            payload: payload.clone(),
        };
        let json = serde_json::to_string(&cache)?;
        fs::write(self.cache_path(), json)?;
        Ok(())
    }

    fn load_cache(&self) -> Result<Option<CachedUpdateCenter>> {
        let path = self.cache_path();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file {}", path.display()))?;
        match serde_json::from_str(&json) {
            Ok(cache) => Ok(Some(cache)),
            // A cache written by an older version just forces a re-download.
            Err(_) => Ok(None),
        }
    }
}
