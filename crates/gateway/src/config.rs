use std::path::{Path, PathBuf};

use {
    serde::Deserialize,
    tracing::{debug, warn},
};

use parlor_protocol::sanitize;

/// Config file name, looked up project-local first, then under the user
/// config directory.
const CONFIG_FILENAME: &str = "parlor.toml";

/// Gateway configuration. Every field is defaulted, so a missing or partial
/// config file still yields a runnable server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address to bind.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// The fixed channel set, created at startup and never mutated.
    pub channels: Vec<String>,
    /// Channel every new session starts in.
    pub default_channel: String,
    /// Messages retained in memory per channel (FIFO eviction past this).
    pub retention_cap: usize,
    /// Most recent messages sent to a client on bootstrap or channel switch.
    pub visible_window: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3000,
            channels: vec!["general".into(), "random".into(), "announcements".into()],
            default_channel: "general".into(),
            retention_cap: 300,
            visible_window: 100,
        }
    }
}

impl GatewayConfig {
    /// Hard errors that make the config unservable.
    pub fn validate(&self) -> anyhow::Result<()> {
        let names: Vec<String> = self
            .channels
            .iter()
            .map(|c| sanitize::channel_name(c))
            .filter(|c| !c.is_empty())
            .collect();
        if names.is_empty() {
            anyhow::bail!("config needs at least one channel");
        }
        let default = sanitize::channel_name(&self.default_channel);
        if !names.contains(&default) {
            anyhow::bail!(
                "default_channel '{}' is not in the channel list",
                self.default_channel
            );
        }
        Ok(())
    }

    /// Non-fatal oddities, surfaced at startup and by `parlor doctor`.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.visible_window > self.retention_cap {
            out.push(format!(
                "visible_window ({}) exceeds retention_cap ({}); clients can never see more than what is retained",
                self.visible_window, self.retention_cap
            ));
        }
        if self.retention_cap == 0 {
            out.push("retention_cap is 0; every message is evicted immediately".into());
        }
        out
    }
}

/// Load config from the given path.
pub fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let config = toml::from_str(&raw)?;
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./parlor.toml` (project-local)
/// 2. `~/.config/parlor/parlor.toml` (user-global)
///
/// Returns `GatewayConfig::default()` if no config file is found.
pub fn discover_and_load() -> GatewayConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(config) => return config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    GatewayConfig::default()
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", "parlor") {
        let global = dirs.config_dir().join(CONFIG_FILENAME);
        if global.exists() {
            return Some(global);
        }
    }
    None
}
