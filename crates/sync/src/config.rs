use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fieldboard_core::queue::DEFAULT_MAX_ATTEMPTS;

/// Sync daemon configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the layout persistence and ACL API.
    pub api_url: String,
    /// Directory holding the local JSON store.
    pub storage_dir: PathBuf,
    /// Attempts before a queue entry becomes terminal.
    pub max_attempts: u32,
    /// Backoff base; retry `n` waits `retry_base * 2^n`.
    pub retry_base: Duration,
    /// Upper bound on a single backoff delay.
    pub retry_max: Duration,
    /// Interval between `GET /health` connectivity probes.
    pub health_probe_interval: Duration,
    /// Quiet window after the last card registration before grid packing.
    pub grid_init_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            storage_dir: PathBuf::from("./.fieldboard"),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base: Duration::from_millis(1000),
            retry_max: Duration::from_millis(30_000),
            health_probe_interval: Duration::from_secs(5),
            grid_init_debounce: Duration::from_millis(300),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `LAYOUT_API_URL`        | `http://localhost:3000` |
    /// | `LAYOUT_STORAGE_DIR`    | `./.fieldboard`         |
    /// | `SYNC_MAX_ATTEMPTS`     | `3`                     |
    /// | `SYNC_RETRY_BASE_MS`    | `1000`                  |
    /// | `SYNC_RETRY_MAX_MS`     | `30000`                 |
    /// | `HEALTH_PROBE_SECS`     | `5`                     |
    /// | `GRID_INIT_DEBOUNCE_MS` | `300`                   |
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("LAYOUT_API_URL").unwrap_or(defaults.api_url);
        let storage_dir = std::env::var("LAYOUT_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        let max_attempts = env_or("SYNC_MAX_ATTEMPTS", defaults.max_attempts).max(1);
        let retry_base_ms = env_or("SYNC_RETRY_BASE_MS", 1000u64);
        let retry_max_ms = env_or("SYNC_RETRY_MAX_MS", 30_000u64).max(retry_base_ms);
        let health_probe_secs = env_or("HEALTH_PROBE_SECS", 5u64).max(1);
        let grid_init_debounce_ms = env_or("GRID_INIT_DEBOUNCE_MS", 300u64);

        Self {
            api_url,
            storage_dir,
            max_attempts,
            retry_base: Duration::from_millis(retry_base_ms),
            retry_max: Duration::from_millis(retry_max_ms),
            health_probe_interval: Duration::from_secs(health_probe_secs),
            grid_init_debounce: Duration::from_millis(grid_init_debounce_ms),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = SyncConfig::default();
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_base, Duration::from_secs(1));
        assert_eq!(c.retry_max, Duration::from_secs(30));
        assert_eq!(c.grid_init_debounce, Duration::from_millis(300));
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("FIELDBOARD_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("FIELDBOARD_TEST_GARBAGE", 7u32), 7);
        std::env::set_var("FIELDBOARD_TEST_NUMBER", " 42 ");
        assert_eq!(env_or("FIELDBOARD_TEST_NUMBER", 7u32), 42);
        assert_eq!(env_or("FIELDBOARD_TEST_UNSET_KEY", 9u32), 9);
    }
}
