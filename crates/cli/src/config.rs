//! YAML configuration for a cleanup run.

use reaper_core::{ReaperError, ReaperResult, RetryPolicy, Scope};
use reaper_engine::{FilterRules, RunConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry knobs as they appear in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter_fraction: policy.jitter_fraction,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_fraction: self.jitter_fraction,
        }
    }
}

/// Top-level run configuration. Destructive behavior is opt-in: dry-run is
/// the default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub accounts: Vec<String>,
    pub regions: Vec<String>,
    /// Enabled resource kinds; `["all"]` enables the whole catalog.
    pub resource_kinds: Vec<String>,
    pub filters: FilterRules,
    pub quarantine_ttl_hours: u64,
    pub dry_run: bool,
    pub json_logs: bool,
    pub per_kind_concurrency: usize,
    pub service_cap: usize,
    pub retry: RetryConfig,
    /// Inventory file served by the built-in adapters.
    pub inventory: Option<PathBuf>,
    /// State snapshot, reloaded before the run and flushed after.
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: vec!["default".into()],
            regions: vec!["us-east-1".into()],
            resource_kinds: vec!["all".into()],
            filters: FilterRules::default(),
            quarantine_ttl_hours: 0,
            dry_run: true,
            json_logs: false,
            per_kind_concurrency: 8,
            service_cap: 32,
            retry: RetryConfig::default(),
            inventory: None,
            state_file: None,
        }
    }
}

impl Config {
    /// Loads from a YAML file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> ReaperResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReaperError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Config = serde_yaml::from_str(&text)
            .map_err(|e| ReaperError::Config(format!("invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ReaperResult<()> {
        if self.accounts.is_empty() || self.regions.is_empty() {
            return Err(ReaperError::Config(
                "at least one account and one region are required".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ReaperError::Config("retry.max_attempts must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_fraction) {
            return Err(ReaperError::Config(
                "retry.jitter_fraction must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }

    /// Cartesian product of accounts and regions.
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes = Vec::with_capacity(self.accounts.len() * self.regions.len());
        for account in &self.accounts {
            for region in &self.regions {
                scopes.push(Scope::new(account.clone(), region.clone()));
            }
        }
        scopes
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            scopes: self.scopes(),
            quarantine_ttl: Duration::from_secs(self.quarantine_ttl_hours * 3600),
            dry_run: self.dry_run,
            per_kind_concurrency: self.per_kind_concurrency,
            service_cap: self.service_cap,
            retry: self.retry.policy(),
        }
    }
}
