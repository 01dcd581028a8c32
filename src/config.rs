use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::crd::DownloadOptions;

/// Name used for the data, cache and log locations
pub const APP_NAME: &str = "k8s-lsp";

/// Environment variable holding the tracing filter directive
pub const LOG_ENV: &str = "K8S_LSP_LOG";

/// Rules directory name below the executable and data directories
pub const RULES_DIR_NAME: &str = "rules";

/// Maximum accepted CRD body size in bytes (10 MiB)
pub const DEFAULT_CRD_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Timeout for a single CRD download in milliseconds
pub const DEFAULT_CRD_TIMEOUT_MS: u64 = 10_000;

/// `initializationOptions` sent by the editor
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InitializationOptions {
    pub rules_dir: Option<PathBuf>,
    pub crds: CrdConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Remote CustomResourceDefinition sources
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CrdConfig {
    pub sources: Vec<String>,
    pub allow_insecure: bool,
    pub max_bytes: u64,
    pub timeout_ms: u64,
}

impl Default for CrdConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            allow_insecure: false,
            max_bytes: DEFAULT_CRD_MAX_BYTES,
            timeout_ms: DEFAULT_CRD_TIMEOUT_MS,
        }
    }
}

impl CrdConfig {
    pub fn download_options(&self, cache_dir: PathBuf) -> DownloadOptions {
        DownloadOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            max_bytes: self.max_bytes,
            cache_dir,
            allow_insecure: self.allow_insecure,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl InitializationOptions {
    /// Decode the raw options; anything malformed falls back to defaults
    pub fn from_value(value: Option<serde_json::Value>) -> Self {
        value
            .and_then(|value| {
                serde_json::from_value(value)
                    .inspect_err(|e| warn!("Ignoring initializationOptions: {}", e))
                    .ok()
            })
            .unwrap_or_default()
    }
}

/// Returns the path to the data directory for k8s-lsp.
/// Uses $XDG_DATA_HOME/k8s-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/k8s-lsp,
/// or ./k8s-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(format!("{}.log", APP_NAME))
}

/// Directory holding downloaded CRDs
pub fn crd_cache_dir() -> PathBuf {
    crd_cache_dir_with(dirs::cache_dir())
}

/// Pick the rules directory: CLI flag, then `initializationOptions.rulesDir`,
/// then `<executable dir>/rules`, then `<data dir>/rules`.
pub fn resolve_rules_dir(cli: Option<&Path>, options: &InitializationOptions) -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    resolve_rules_dir_with(cli, options, exe_dir.as_deref(), &data_dir())
}

fn resolve_rules_dir_with(
    cli: Option<&Path>,
    options: &InitializationOptions,
    exe_dir: Option<&Path>,
    data_dir: &Path,
) -> PathBuf {
    if let Some(dir) = cli.or(options.rules_dir.as_deref()) {
        return dir.to_path_buf();
    }
    exe_dir
        .map(|dir| dir.join(RULES_DIR_NAME))
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(|| data_dir.join(RULES_DIR_NAME))
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join(APP_NAME)
}

fn crd_cache_dir_with(cache_dir: Option<PathBuf>) -> PathBuf {
    cache_dir
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join("crds")
}
