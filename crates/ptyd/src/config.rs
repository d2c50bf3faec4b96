//! Process-level configuration (`ptyd.toml` + `PTYD_`-prefixed env overrides).

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub fn default_max_sessions() -> usize {
    10
}

/// `ptyd`'s own process-level knobs. Per-session defaults (command, idle
/// timeout, buffer size, sentinel template) live in
/// `pty_core::types::SessionConfig` and are supplied per `start_session`
/// call, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Optional directory for per-session log mirrors. Must already exist;
    /// startup fails with exit code 2 if it's configured but missing.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            log_dir: None,
        }
    }
}

impl ManagerConfig {
    /// Load from `path` (if given), then apply `PTYD_`-prefixed env
    /// overrides (e.g. `PTYD_MAX_SESSIONS=20`).
    pub fn load(path: Option<&str>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("PTYD_").split("_")).extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let cfg = ManagerConfig::load(None).unwrap();
        assert_eq!(cfg.max_sessions, 10);
        assert!(cfg.log_dir.is_none());
    }
}
