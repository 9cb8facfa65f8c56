//! Configuration management with secure storage
//!
//! Handles:
//! - NFM-T connection settings
//! - Report defaults (LD type, output directory, PM lookback)
//! - Password storage in the OS keyring, never in the TOML file

use anyhow::{Context, Result};
use keyring::Entry;
use otsloss_core::PmWindow;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable consulted for the NFM-T password
pub const PASSWORD_ENV: &str = "OTSLOSS_PASSWORD";

const KEYRING_SERVICE: &str = "otsloss";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub nfmt: NfmtConfig,
    pub report: ReportConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NfmtConfig {
    pub host: String,
    pub username: String,
    pub api_port: u16,
    /// NFM-T ships self-signed certificates
    pub accept_invalid_certs: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// LD type token matched against port labels
    pub amplifier_type: String,
    pub output_dir: PathBuf,
    pub lookback_minutes: i64,
    pub granularity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub store_password: bool,
}

impl Default for NfmtConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            username: "admin".to_string(),
            api_port: 8443,
            accept_invalid_certs: true,
            request_timeout_secs: 60,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            amplifier_type: "RA2P".to_string(),
            output_dir: PathBuf::from("."),
            lookback_minutes: 60,
            granularity: "15mins".to_string(),
        }
    }
}

/// Values given on the command line; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub username: Option<String>,
    pub amplifier_type: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub lookback_minutes: Option<i64>,
}

impl AgentConfig {
    /// Load config from `path`; a missing file yields the defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: AgentConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        Ok(config)
    }

    /// Save config to `path`, creating parent directories
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("otsloss");
        path.push("config.toml");
        Ok(path)
    }

    /// Rejects values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let minutes = self.report.lookback_minutes;
        if !(1..=PmWindow::MAX_LOOKBACK_MINUTES).contains(&minutes) {
            anyhow::bail!(
                "lookback_minutes must be between 1 and {}, got {}",
                PmWindow::MAX_LOOKBACK_MINUTES,
                minutes
            );
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: CliOverrides) {
        if let Some(host) = overrides.host {
            self.nfmt.host = host;
        }
        if let Some(username) = overrides.username {
            self.nfmt.username = username;
        }
        if let Some(amplifier_type) = overrides.amplifier_type {
            self.report.amplifier_type = amplifier_type;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.report.output_dir = output_dir;
        }
        if let Some(minutes) = overrides.lookback_minutes {
            self.report.lookback_minutes = minutes;
        }
    }

    /// Command line, then environment, then the keyring when enabled
    pub fn resolve_password(&self, cli: Option<String>, env: Option<String>) -> Option<String> {
        cli.filter(|password| !password.is_empty())
            .or(env.filter(|password| !password.is_empty()))
            .or_else(|| self.stored_password())
    }

    /// Stores `password` in the keyring and enables keyring lookup
    pub fn remember_password(&mut self, password: &str) -> Result<()> {
        self.password_entry()?
            .set_password(password)
            .context("storing password in the OS keyring")?;
        self.credentials.store_password = true;
        Ok(())
    }

    fn stored_password(&self) -> Option<String> {
        if !self.credentials.store_password {
            return None;
        }
        match self.password_entry().and_then(|entry| Ok(entry.get_password()?)) {
            Ok(password) => Some(password),
            Err(e) => {
                debug!("No keyring password for {}: {}", self.keyring_user(), e);
                None
            }
        }
    }

    fn keyring_user(&self) -> String {
        format!("{}@{}", self.nfmt.username, self.nfmt.host)
    }

    fn password_entry(&self) -> Result<Entry> {
        Ok(Entry::new(KEYRING_SERVICE, &self.keyring_user())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.nfmt.host, "127.0.0.1");
        assert_eq!(config.nfmt.username, "admin");
        assert_eq!(config.nfmt.api_port, 8443);
        assert!(config.nfmt.accept_invalid_certs);
        assert_eq!(config.report.amplifier_type, "RA2P");
        assert_eq!(config.report.lookback_minutes, 60);
        assert!(!config.credentials.store_password);
    }

    #[test]
    fn test_config_file_path() {
        let path = AgentConfig::config_file_path().unwrap();
        assert!(path.to_string_lossy().contains("otsloss"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
            [nfmt]
            host = "10.0.0.5"

            [report]
            amplifier_type = "RA4P"
            "#,
        )
        .unwrap();

        assert_eq!(config.nfmt.host, "10.0.0.5");
        assert_eq!(config.nfmt.username, "admin");
        assert_eq!(config.report.amplifier_type, "RA4P");
        assert_eq!(config.report.granularity, "15mins");
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let missing = AgentConfig::load_from(&path).await.unwrap();
        assert_eq!(missing.nfmt.host, "127.0.0.1");

        let mut config = AgentConfig::default();
        config.nfmt.host = "nfmt.example.net".into();
        config.report.lookback_minutes = 30;
        config.save_to(&path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("password ="));

        let reloaded = AgentConfig::load_from(&path).await.unwrap();
        assert_eq!(reloaded.nfmt.host, "nfmt.example.net");
        assert_eq!(reloaded.report.lookback_minutes, 30);
    }

    #[tokio::test]
    async fn test_out_of_range_lookback_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[report]\nlookback_minutes = -30\n").unwrap();

        let err = AgentConfig::load_from(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("lookback_minutes must be between 1 and 10080"));
    }

    #[test]
    fn test_validate_after_overrides() {
        let mut config = AgentConfig::default();
        assert!(config.validate().is_ok());

        for minutes in [0, PmWindow::MAX_LOOKBACK_MINUTES + 1, i64::MAX] {
            config.apply_overrides(CliOverrides {
                lookback_minutes: Some(minutes),
                ..Default::default()
            });
            assert!(config.validate().is_err(), "{} minutes accepted", minutes);
        }

        config.report.lookback_minutes = PmWindow::MAX_LOOKBACK_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AgentConfig::default();
        config.apply_overrides(CliOverrides {
            host: Some("192.168.0.1".into()),
            amplifier_type: Some("RA4P".into()),
            ..Default::default()
        });

        assert_eq!(config.nfmt.host, "192.168.0.1");
        assert_eq!(config.nfmt.username, "admin");
        assert_eq!(config.report.amplifier_type, "RA4P");
    }

    #[test]
    fn test_password_precedence() {
        let config = AgentConfig::default();
        assert_eq!(
            config.resolve_password(Some("cli".into()), Some("env".into())),
            Some("cli".to_string())
        );
        assert_eq!(
            config.resolve_password(None, Some("env".into())),
            Some("env".to_string())
        );
        assert_eq!(
            config.resolve_password(Some(String::new()), Some("env".into())),
            Some("env".to_string())
        );
        // keyring lookup is off by default
        assert_eq!(config.resolve_password(None, None), None);
    }
}
