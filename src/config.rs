use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Base URL of the answering backend (the service exposing POST /chat)
    pub endpoint: String,
    /// Optional API key (sent as Bearer token)
    pub api_key: Option<String>,
    /// Search index to start the session on ("default", "group1".."group5")
    #[serde(default = "default_index")]
    pub index: String,
    /// Optional per-request deadline in seconds. Unset = wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_index() -> String {
    "default".to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            api_key: None,
            index: default_index(),
            timeout_secs: None,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
    /// Starting search index from the profile
    pub index: String,
    /// Optional per-request deadline in seconds
    pub timeout_secs: Option<u64>,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        endpoint_override: Option<&str>,
        api_key_override: Option<&str>,
        index_override: Option<&str>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        Self {
            endpoint: endpoint_override
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            api_key: api_key_override
                .map(str::to_string)
                .or(base.api_key),
            profile_name,
            index: index_override.map(str::to_string).unwrap_or(base.index),
            timeout_secs: base.timeout_secs,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS, %APPDATA% on Windows
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# Parley configuration
# Run `parley --init` to regenerate this file.

default_profile = "local"

# ── Local backend (default) ───────────────────────────────────────────────────
[profiles.local]
endpoint = "http://localhost:5000"
index    = "default"
# api_key is not needed for a local backend

# ── Hosted backend example ────────────────────────────────────────────────────
# [profiles.prod]
# endpoint     = "https://qa.example.com/api"
# api_key      = "sk-..."
# index        = "group3"
# timeout_secs = 120
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_cli_overrides() {
        let mut file = ConfigFile::default();
        file.profiles.insert(
            "default".to_string(),
            Profile {
                endpoint: "http://from-file:5000".to_string(),
                api_key: Some("file-key".to_string()),
                index: "group1".to_string(),
                timeout_secs: Some(60),
            },
        );

        let r = ResolvedConfig::resolve(&file, None, Some("http://cli:9"), None, Some("group2"));
        assert_eq!(r.endpoint, "http://cli:9");
        assert_eq!(r.api_key.as_deref(), Some("file-key"));
        assert_eq!(r.index, "group2");
        assert_eq!(r.timeout_secs, Some(60));
    }

    #[test]
    fn resolve_falls_back_to_defaults_for_unknown_profile() {
        let file = ConfigFile::default();
        let r = ResolvedConfig::resolve(&file, Some("nope"), None, None, None);
        assert_eq!(r.profile_name, "nope");
        assert_eq!(r.endpoint, "http://localhost:5000");
        assert_eq!(r.index, "default");
    }

    #[test]
    fn default_template_parses() {
        let parsed: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed.default_profile, "local");
        let local = parsed.profiles.get("local").unwrap();
        assert_eq!(local.endpoint, "http://localhost:5000");
        assert!(local.timeout_secs.is_none());
    }
}
