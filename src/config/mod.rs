pub mod model;
pub mod parser;

use std::env;
use std::path::PathBuf;

pub use model::{Config, GeneralConfig, SleepInhibitMode};

/// Find the config file the way `findConfig("idlewarden")` would: prefer
/// `$XDG_CONFIG_HOME/idlewarden/idlewarden.conf`, then each
/// `$XDG_CONFIG_DIRS` entry, then `/etc/idlewarden/idlewarden.conf`.
pub fn resolve_default_config_path() -> Option<PathBuf> {
    let candidates = search_candidates();
    candidates.into_iter().find(|p| p.exists())
}

fn search_candidates() -> Vec<PathBuf> {
    let mut out = Vec::new();

    let xdg_config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = env::var("HOME").unwrap_or_else(|_| "/root".to_string());
            PathBuf::from(home).join(".config")
        });
    out.push(xdg_config_home.join("idlewarden/idlewarden.conf"));

    if let Ok(dirs) = env::var("XDG_CONFIG_DIRS") {
        for dir in dirs.split(':').filter(|s| !s.is_empty()) {
            out.push(PathBuf::from(dir).join("idlewarden/idlewarden.conf"));
        }
    }

    out.push(PathBuf::from("/etc/idlewarden/idlewarden.conf"));
    out
}

/// Load and validate the config at `path`, or from the default search path
/// when `path` is `None`.
pub fn load(path: Option<PathBuf>) -> eyre::Result<Config> {
    let resolved = match path {
        Some(p) => p,
        None => resolve_default_config_path().ok_or_else(|| {
            eyre::eyre!(
                "could not find config in HOME, XDG_CONFIG_HOME, XDG_CONFIG_DIRS or /etc"
            )
        })?,
    };

    parser::parse(&resolved).map_err(|e| eyre::eyre!("config error: {e}"))
}
