use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{RmailError, Result};

/// Application-level configuration, loaded from `<app_dir>/config.toml`.
///
/// Every field has a sensible default so r-mail works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Template directory (default: `<app_dir>/templates`).
    #[serde(default)]
    pub template_dir: Option<PathBuf>,

    /// Encrypted vault file (default: `<app_dir>/secrets.enc`).
    #[serde(default)]
    pub vault_file: Option<PathBuf>,

    /// Bound on SMTP connect/read/write in seconds (default: 30).
    #[serde(default = "default_smtp_timeout_secs")]
    pub smtp_timeout_secs: u64,

    /// Environment variable holding the vault master key.
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_smtp_timeout_secs() -> u64 {
    30
}

fn default_master_key_env() -> String {
    "RMAIL_MASTER_KEY".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_dir: None,
            vault_file: None,
            smtp_timeout_secs: default_smtp_timeout_secs(),
            master_key_env: default_master_key_env(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the app directory.
    pub const FILE_NAME: &'static str = "config.toml";

    /// Load settings from `<app_dir>/config.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let config_path = app_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            RmailError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.master_key_env.trim().is_empty() {
            return Err(RmailError::ConfigError(format!(
                "{}: master_key_env cannot be empty",
                config_path.display()
            )));
        }
        if settings.smtp_timeout_secs == 0 {
            return Err(RmailError::ConfigError(format!(
                "{}: smtp_timeout_secs must be at least 1",
                config_path.display()
            )));
        }

        Ok(settings)
    }
}

/// The resolved configuration object handed to every component.
///
/// Built once at startup; nothing in the crate reads paths or keys from
/// process-wide state behind its back.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory (`~/.r-mail` unless overridden).
    pub app_dir: PathBuf,
    /// Encrypted vault file.
    pub vault_path: PathBuf,
    /// Directory searched for templates.
    pub template_dir: PathBuf,
    /// Sender/domain/receiver/context directory file.
    pub directory_path: PathBuf,
    /// SQLite operation history.
    pub history_path: PathBuf,
    /// Bound on every blocking SMTP operation.
    pub smtp_timeout: Duration,
    /// Environment variable holding the master key.
    pub master_key_env: String,
}

impl AppConfig {
    /// Environment variable that relocates the app directory.
    pub const HOME_ENV: &'static str = "RMAIL_HOME";

    /// Default app directory name under the user's home.
    const DIR_NAME: &'static str = ".r-mail";

    /// Resolve the app directory and load its settings.
    ///
    /// Precedence: `home_override`, then `RMAIL_HOME`, then `~/.r-mail`.
    pub fn resolve(home_override: Option<&Path>) -> Result<Self> {
        let app_dir = match home_override {
            Some(dir) => dir.to_path_buf(),
            None => match std::env::var_os(Self::HOME_ENV).filter(|v| !v.is_empty()) {
                Some(dir) => PathBuf::from(dir),
                None => dirs::home_dir()
                    .ok_or_else(|| {
                        RmailError::ConfigError(
                            "cannot determine home directory — set RMAIL_HOME".into(),
                        )
                    })?
                    .join(Self::DIR_NAME),
            },
        };

        let settings = Settings::load(&app_dir)?;
        Ok(Self::from_settings(app_dir, &settings))
    }

    /// Build the configuration for `app_dir` from already-loaded settings.
    ///
    /// Relative paths in the settings are taken relative to `app_dir`.
    pub fn from_settings(app_dir: PathBuf, settings: &Settings) -> Self {
        let under_app = |p: &Option<PathBuf>, default: &str| match p {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => app_dir.join(path),
            None => app_dir.join(default),
        };

        Self {
            vault_path: under_app(&settings.vault_file, "secrets.enc"),
            template_dir: under_app(&settings.template_dir, "templates"),
            directory_path: app_dir.join(crate::config::Directory::FILE_NAME),
            history_path: app_dir.join("history.db"),
            smtp_timeout: Duration::from_secs(settings.smtp_timeout_secs),
            master_key_env: settings.master_key_env.clone(),
            app_dir,
        }
    }

    /// Override the SMTP timeout (e.g. from `--timeout`).
    pub fn with_smtp_timeout(mut self, timeout: Duration) -> Self {
        self.smtp_timeout = timeout;
        self
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert!(s.template_dir.is_none());
        assert!(s.vault_file.is_none());
        assert_eq!(s.smtp_timeout_secs, 30);
        assert_eq!(s.master_key_env, "RMAIL_MASTER_KEY");
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.smtp_timeout_secs, 30);
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
template_dir = "/srv/mail/templates"
vault_file = "vault/secrets.enc"
smtp_timeout_secs = 5
master_key_env = "WORK_MAIL_KEY"
"#;
        fs::write(tmp.path().join("config.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(
            settings.template_dir,
            Some(PathBuf::from("/srv/mail/templates"))
        );
        assert_eq!(settings.smtp_timeout_secs, 5);
        assert_eq!(settings.master_key_env, "WORK_MAIL_KEY");
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "not valid {{toml").unwrap();

        let result = Settings::load(tmp.path());
        assert!(matches!(result, Err(RmailError::ConfigError(_))));
    }

    #[test]
    fn load_rejects_blank_master_key_env() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "master_key_env = \"\"\n").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_zero_timeout() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "smtp_timeout_secs = 0\n").unwrap();
        let err = Settings::load(tmp.path()).unwrap_err();
        assert!(matches!(err, RmailError::ConfigError(ref m) if m.contains("smtp_timeout_secs")));
    }

    #[test]
    fn app_config_defaults_live_under_app_dir() {
        let app = PathBuf::from("/home/user/.r-mail");
        let config = AppConfig::from_settings(app.clone(), &Settings::default());
        assert_eq!(config.vault_path, app.join("secrets.enc"));
        assert_eq!(config.template_dir, app.join("templates"));
        assert_eq!(config.directory_path, app.join("directory.toml"));
        assert_eq!(config.history_path, app.join("history.db"));
        assert_eq!(config.smtp_timeout, Duration::from_secs(30));
    }

    #[test]
    fn app_config_resolves_relative_and_absolute_paths() {
        let app = PathBuf::from("/home/user/.r-mail");
        let settings = Settings {
            template_dir: Some(PathBuf::from("/srv/templates")),
            vault_file: Some(PathBuf::from("vault/secrets.enc")),
            ..Settings::default()
        };
        let config = AppConfig::from_settings(app.clone(), &settings);
        assert_eq!(config.template_dir, PathBuf::from("/srv/templates"));
        assert_eq!(config.vault_path, app.join("vault/secrets.enc"));
    }

    #[test]
    fn resolve_prefers_explicit_home() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::resolve(Some(tmp.path())).unwrap();
        assert_eq!(config.app_dir, tmp.path());
    }
}
