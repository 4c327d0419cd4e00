//! Configuration entry point: file, environment expansion and overrides.

use anyhow::{Context, Result};
use tracing::info;

use super::MonitorConfig;
use crate::error::MonitorError;

/// Expand a `${VAR}` value from the environment.
///
/// Values that are not a single `${VAR}` reference are returned unchanged.
/// An unset variable expands to the empty string.
pub fn expand_env(value: &str) -> String {
    match value
        .trim()
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => value.to_string(),
    }
}

impl MonitorConfig {
    /// Expand `${VAR}` references, then apply `RPC_URL`, `SLACK_WEBHOOK_URL`
    /// and `STATE_FILE` overrides.
    pub fn resolve_env(mut self) -> Self {
        self.rpc_url = expand_env(&self.rpc_url);
        self.slack_webhook_url = expand_env(&self.slack_webhook_url);
        self.state_file = expand_env(&self.state_file);
        self.bold_token = expand_env(&self.bold_token);
        for asset in &mut self.assets {
            asset.price_feed = expand_env(&asset.price_feed);
        }

        if let Ok(url) = std::env::var("RPC_URL") {
            self.rpc_url = url;
        }
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            self.slack_webhook_url = url;
        }
        if let Ok(path) = std::env::var("STATE_FILE") {
            self.state_file = path;
        }
        self
    }

    /// Reject parameters the poll loop cannot run with.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.poll.interval_secs == 0 {
            return Err(MonitorError::Config("poll.interval_secs must be positive".to_string()));
        }
        if self.poll.blocks_per_day == 0 {
            return Err(MonitorError::Config("poll.blocks_per_day must be positive".to_string()));
        }
        Ok(())
    }
}

/// Load from `MONITOR_CONFIG` if set, otherwise defaults; then resolve the
/// environment.
pub fn load_config() -> Result<MonitorConfig> {
    let config = match std::env::var("MONITOR_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading monitor config file");
            MonitorConfig::from_file(&path)
                .with_context(|| format!("Failed to load config from {path}"))?
        }
        Err(_) => MonitorConfig::default(),
    };

    let config = config.resolve_env();
    config.validate()?;
    if config.rpc_url.is_empty() {
        anyhow::bail!("RPC url is not configured (set RPC_URL)");
    }
    if config.slack_webhook_url.is_empty() {
        anyhow::bail!("Slack webhook is not configured (set SLACK_WEBHOOK_URL)");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_expansion() {
        std::env::set_var("MONITOR_TEST_EXPAND", "test_value");
        assert_eq!(expand_env("${MONITOR_TEST_EXPAND}"), "test_value");
        assert_eq!(expand_env("literal"), "literal");
        assert_eq!(expand_env("${MONITOR_TEST_NONEXISTENT}"), "");
        assert_eq!(expand_env("prefix-${MONITOR_TEST_EXPAND}"), "prefix-${MONITOR_TEST_EXPAND}");
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = MonitorConfig::default();
        assert!(config.validate().is_ok());

        config.poll.interval_secs = 0;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));

        let config: MonitorConfig = toml::from_str("[poll]\ninterval_secs = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_resolve_expands_placeholders() {
        std::env::set_var("MONITOR_TEST_STATE", "/tmp/monitor-state.json");
        let config = MonitorConfig {
            state_file: "${MONITOR_TEST_STATE}".to_string(),
            ..Default::default()
        };
        let resolved = config.resolve_env();
        if std::env::var("STATE_FILE").is_err() {
            assert_eq!(resolved.state_file, "/tmp/monitor-state.json");
        }
    }
}
