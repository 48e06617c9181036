//! casedesk.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::policy::AssignmentPolicy;

/// Top-level configuration. Every section and field is optional in the TOML
/// file; missing values take the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CasedeskConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub assignment: AssignmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the embedded store database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached aggregates (entry count, not bytes).
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// TTL for cached listing pages, in seconds.
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,
    /// TTL for cached workload stats, in seconds.
    #[serde(default = "default_stats_ttl_secs")]
    pub stats_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Policy used when the caller does not pick one explicitly.
    #[serde(default = "default_policy")]
    pub policy: AssignmentPolicy,
    /// Maximum number of unassigned items pulled per run.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Result cap for the in-flight item scan that derives workload.
    /// Hitting the cap marks the snapshot truncated and aborts the run.
    #[serde(default = "default_workload_scan_cap")]
    pub workload_scan_cap: u32,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/casedesk/casedesk.redb")
}

fn default_cache_max_entries() -> usize {
    1024
}

fn default_listing_ttl_secs() -> u64 {
    30
}

fn default_stats_ttl_secs() -> u64 {
    15
}

fn default_policy() -> AssignmentPolicy {
    AssignmentPolicy::LoadBalanced
}

fn default_page_size() -> u32 {
    200
}

fn default_workload_scan_cap() -> u32 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            listing_ttl_secs: default_listing_ttl_secs(),
            stats_ttl_secs: default_stats_ttl_secs(),
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            page_size: default_page_size(),
            workload_scan_cap: default_workload_scan_cap(),
        }
    }
}

impl CasedeskConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CasedeskConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: CasedeskConfig = toml::from_str("").unwrap();
        assert_eq!(config.cache.max_entries, 1024);
        assert_eq!(config.assignment.page_size, 200);
        assert_eq!(config.assignment.policy, AssignmentPolicy::LoadBalanced);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let toml_str = r#"
[assignment]
policy = "round_robin"
page_size = 50
"#;
        let config: CasedeskConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.assignment.policy, AssignmentPolicy::RoundRobin);
        assert_eq!(config.assignment.page_size, 50);
        assert_eq!(config.assignment.workload_scan_cap, 5000);
        assert_eq!(config.cache.listing_ttl_secs, 30);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = CasedeskConfig::default();
        let rendered = config.to_toml_string().unwrap();
        let reparsed: CasedeskConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.cache.max_entries, config.cache.max_entries);
        assert_eq!(reparsed.assignment.policy, config.assignment.policy);
    }
}
