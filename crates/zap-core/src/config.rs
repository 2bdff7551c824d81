use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::warn;
use zap_resolver::{HttpSettings, DEFAULT_MAX_DESCRIPTORS};

pub const ONLINE_ENV: &str = "ZAP_ONLINE";
pub const DOWNLOADS_ENV: &str = "ZAP_DOWNLOADS";
pub const HTTP_TIMEOUT_ENV: &str = "ZAP_HTTP_TIMEOUT";
pub const CACHE_PATH_ENV: &str = "ZAP_CACHE_PATH";
pub const KEEP_PROXIES_ENV: &str = "ZAP_KEEP_PROXIES";
pub const MAX_TRANSITIVE_ENV: &str = "ZAP_MAX_TRANSITIVE";
pub const LIBRARY_LOADER_ENV: &str = "ZAP_LIBRARY_LOADER";

const MAX_DOWNLOAD_WORKERS: usize = 16;

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn flag_is_enabled(&self, key: &str) -> bool {
        matches!(self.vars.get(key).map(String::as_str), Some("1"))
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn number(&self, key: &str) -> Option<u64> {
        let raw = self.var(key)?;
        match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = raw, "ignoring non-numeric setting");
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Runtime settings captured once from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) network: HttpSettings,
    pub(crate) downloads: Option<usize>,
    pub(crate) cache_path: Option<PathBuf>,
    pub(crate) max_transitive: usize,
    pub(crate) library_loader: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: HttpSettings::default(),
            downloads: None,
            cache_path: None,
            max_transitive: DEFAULT_MAX_DESCRIPTORS,
            library_loader: None,
        }
    }
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let defaults = HttpSettings::default();
        let online = match snapshot.var(ONLINE_ENV) {
            Some(value) => {
                let lowered = value.to_ascii_lowercase();
                !matches!(lowered.as_str(), "0" | "false" | "no" | "off" | "")
            }
            None => true,
        };
        let download_timeout = snapshot
            .number(HTTP_TIMEOUT_ENV)
            .filter(|secs| *secs > 0)
            .map_or(defaults.download_timeout, Duration::from_secs);
        Self {
            network: HttpSettings {
                online,
                keep_proxies: snapshot.flag_is_enabled(KEEP_PROXIES_ENV),
                download_timeout,
            },
            downloads: snapshot
                .number(DOWNLOADS_ENV)
                .and_then(|value| usize::try_from(value).ok()),
            cache_path: snapshot
                .var(CACHE_PATH_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            max_transitive: snapshot
                .number(MAX_TRANSITIVE_ENV)
                .and_then(|value| usize::try_from(value).ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_MAX_DESCRIPTORS),
            library_loader: snapshot
                .var(LIBRARY_LOADER_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn network(&self) -> &HttpSettings {
        &self.network
    }

    #[must_use]
    pub fn with_network(mut self, network: HttpSettings) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub fn downloads(&self) -> Option<usize> {
        self.downloads
    }

    #[must_use]
    pub fn cache_path(&self) -> Option<&PathBuf> {
        self.cache_path.as_ref()
    }

    #[must_use]
    pub fn max_transitive(&self) -> usize {
        self.max_transitive
    }

    /// Manifest file of the host's specialized library loader, when one is advertised.
    #[must_use]
    pub fn library_loader(&self) -> Option<&PathBuf> {
        self.library_loader.as_ref()
    }
}

/// Worker count for `total` download jobs: the requested value or available parallelism,
/// clamped to `1..=16` and never more than the number of jobs.
pub(crate) fn download_concurrency(total: usize, requested: Option<usize>) -> usize {
    let available = thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
        .max(1);
    let max_workers = requested.unwrap_or(available).clamp(1, MAX_DOWNLOAD_WORKERS);
    max_workers.min(total.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[]));
        assert!(config.network.online);
        assert!(!config.network.keep_proxies);
        assert_eq!(config.network.download_timeout, Duration::from_secs(300));
        assert_eq!(config.downloads, None);
        assert_eq!(config.cache_path, None);
        assert_eq!(config.max_transitive, DEFAULT_MAX_DESCRIPTORS);
        assert_eq!(config.library_loader, None);
    }

    #[test]
    fn online_switch_accepts_common_falsy_values() {
        for value in ["0", "false", "NO", "off", ""] {
            let config = Config::from_snapshot(&EnvSnapshot::testing(&[(ONLINE_ENV, value)]));
            assert!(!config.network.online, "{value:?} should disable the network");
        }
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[(ONLINE_ENV, "yes")]));
        assert!(config.network.online);
    }

    #[test]
    fn numeric_settings_fall_back_when_invalid() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[
            (HTTP_TIMEOUT_ENV, "soon"),
            (DOWNLOADS_ENV, "3"),
            (MAX_TRANSITIVE_ENV, "0"),
            (CACHE_PATH_ENV, "/tmp/zap-cache"),
            (KEEP_PROXIES_ENV, "1"),
        ]));
        assert_eq!(config.network.download_timeout, Duration::from_secs(300));
        assert_eq!(config.downloads, Some(3));
        assert_eq!(config.max_transitive, DEFAULT_MAX_DESCRIPTORS);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/zap-cache")));
        assert!(config.network.keep_proxies);
    }

    #[test]
    fn concurrency_is_clamped() {
        assert_eq!(download_concurrency(10, Some(0)), 1);
        assert_eq!(download_concurrency(100, Some(64)), 16);
        assert_eq!(download_concurrency(2, Some(8)), 2);
        assert_eq!(download_concurrency(0, Some(8)), 1);
        assert!(download_concurrency(100, None) >= 1);
    }

    #[test]
    #[serial]
    fn captures_process_environment() {
        let previous = env::var_os(HTTP_TIMEOUT_ENV);
        env::set_var(HTTP_TIMEOUT_ENV, "42");
        let config = Config::from_env();
        match previous {
            Some(value) => env::set_var(HTTP_TIMEOUT_ENV, value),
            None => env::remove_var(HTTP_TIMEOUT_ENV),
        }
        assert_eq!(config.network.download_timeout, Duration::from_secs(42));
    }
}
