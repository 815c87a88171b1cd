//! Configuration types and loading
//!
//! The TOML file (chosen by `--config`, then `CONFIG_PATH`, then the default
//! name) supplies every non-secret setting, with serde defaults for omitted
//! keys. Secrets (signing key, GitHub client secret, AWS credentials) never
//! come from the TOML: each is read from its env var, falling back to the
//! matching `*_file` path.

use common::Secret;
use secret_store::SecretsManagerSettings;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var holding the token signing secret
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";
/// Env var holding the GitHub OAuth app client secret
pub const GITHUB_CLIENT_SECRET_ENV: &str = "GITHUB_CLIENT_SECRET";
pub const AWS_ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub store: StoreConfig,
}

/// Deployment mode. Development uses a fixed localhost callback and honors
/// the store endpoint override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub environment: Environment,
    /// Externally visible base URL in production. When absent the callback
    /// URL is derived from each request's Host header.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(skip)]
    pub signing_secret: Option<Secret<String>>,
    /// Path to a file containing the signing secret (alternative to SECRET_KEY)
    #[serde(default)]
    pub signing_secret_file: Option<PathBuf>,
}

/// GitHub OAuth app and API settings
#[derive(Debug, Deserialize)]
pub struct GitHubConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session token lifetimes
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Maximum age of the OAuth `state` token at callback time
    #[serde(default = "default_state_max_age")]
    pub state_max_age_secs: u64,
    /// Maximum age of a bearer session token on authenticated endpoints
    #[serde(default = "default_session_max_age")]
    pub session_max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_max_age_secs: default_state_max_age(),
            session_max_age_secs: default_session_max_age(),
        }
    }
}

/// Which secret store backs session records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    SecretsManager,
    Memory,
}

/// Secret store settings
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub region: Option<String>,
    /// Local emulator endpoint; only used in development
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(skip)]
    pub access_key_id: Option<Secret<String>>,
    #[serde(skip)]
    pub secret_access_key: Option<Secret<String>>,
}

fn default_max_connections() -> usize {
    1000
}

fn default_scope() -> String {
    github_client::DEFAULT_SCOPE.to_string()
}

fn default_oauth_base_url() -> String {
    github_client::DEFAULT_OAUTH_BASE_URL.to_string()
}

fn default_api_base_url() -> String {
    github_client::DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_state_max_age() -> u64 {
    600
}

fn default_session_max_age() -> u64 {
    30 * 24 * 60 * 60
}

impl Config {
    /// Load configuration from a TOML file, then overlay secrets from the
    /// environment.
    ///
    /// Secret resolution order for each secret:
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        for (name, url) in [
            ("oauth_base_url", Some(&config.github.oauth_base_url)),
            ("api_base_url", Some(&config.github.api_base_url)),
            ("public_url", config.server.public_url.as_ref()),
            ("endpoint_url", config.store.endpoint_url.as_ref()),
        ] {
            if let Some(url) = url {
                validate_http_url(name, url)?;
            }
        }

        if config.github.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.session.state_max_age_secs == 0 || config.session.session_max_age_secs == 0 {
            return Err(common::Error::Config(
                "session max ages must be greater than 0".into(),
            ));
        }

        config.server.signing_secret = resolve_secret(
            SECRET_KEY_ENV,
            config.server.signing_secret_file.as_deref(),
        )?;
        if config.server.signing_secret.is_none() {
            return Err(common::Error::MissingSecret(SECRET_KEY_ENV));
        }

        config.github.client_secret = resolve_secret(
            GITHUB_CLIENT_SECRET_ENV,
            config.github.client_secret_file.as_deref(),
        )?;
        if config.github.client_secret.is_none() {
            return Err(common::Error::MissingSecret(GITHUB_CLIENT_SECRET_ENV));
        }

        if config.store.backend == StoreBackend::SecretsManager {
            if config.store.region.is_none() {
                return Err(common::Error::Config(
                    "store.region is required for the secrets_manager backend".into(),
                ));
            }
            config.store.access_key_id = resolve_secret(AWS_ACCESS_KEY_ID_ENV, None)?;
            config.store.secret_access_key = resolve_secret(AWS_SECRET_ACCESS_KEY_ENV, None)?;
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("github-relay.toml")
    }

    /// Store endpoint override, honored only in development mode.
    pub fn effective_endpoint_url(&self) -> Option<&str> {
        match self.server.environment {
            Environment::Development => self.store.endpoint_url.as_deref(),
            Environment::Production => None,
        }
    }

    /// Settings for the Secrets Manager backend.
    pub fn secrets_manager_settings(&self) -> common::Result<SecretsManagerSettings> {
        let region = self.store.region.clone().ok_or_else(|| {
            common::Error::Config("store.region is required for the secrets_manager backend".into())
        })?;
        let access_key_id = self
            .store
            .access_key_id
            .clone()
            .ok_or(common::Error::MissingSecret(AWS_ACCESS_KEY_ID_ENV))?;
        let secret_access_key = self
            .store
            .secret_access_key
            .clone()
            .ok_or(common::Error::MissingSecret(AWS_SECRET_ACCESS_KEY_ENV))?;

        Ok(SecretsManagerSettings {
            region,
            access_key_id,
            secret_access_key,
            endpoint_url: self.effective_endpoint_url().map(str::to_owned),
        })
    }
}

fn validate_http_url(name: &str, url: &str) -> common::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}

/// Resolve a secret: env var takes precedence over file. Blank values count
/// as absent.
fn resolve_secret(env_key: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Some(secret) = Secret::from_env(env_key) {
        return Ok(Some(secret));
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", file.display()))
    })?;
    let value = value.trim().to_owned();
    Ok((!value.is_empty()).then(|| Secret::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    /// Set the required secrets and clear the AWS ones.
    /// SAFETY: Callers must hold ENV_MUTEX.
    unsafe fn baseline_env() {
        unsafe {
            set_env(SECRET_KEY_ENV, "signing-secret");
            set_env(GITHUB_CLIENT_SECRET_ENV, "client-secret");
            remove_env(AWS_ACCESS_KEY_ID_ENV);
            remove_env(AWS_SECRET_ACCESS_KEY_ENV);
        }
    }

    fn memory_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:8080"
environment = "development"

[github]
client_id = "Iv1.client"

[store]
backend = "memory"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_valid_config_applies_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, memory_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.github.scope, "public_repo");
        assert_eq!(config.github.oauth_base_url, "https://github.com");
        assert_eq!(config.github.api_base_url, "https://api.github.com");
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.session.state_max_age_secs, 600);
        assert_eq!(config.session.session_max_age_secs, 2_592_000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(
            config.server.signing_secret.as_ref().unwrap().expose(),
            "signing-secret"
        );
        assert_eq!(
            config.github.client_secret.as_ref().unwrap().expose(),
            "client-secret"
        );
    }

    #[test]
    fn load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn environment_defaults_to_production() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, &memory_toml().replace("environment = \"development\"\n", ""));

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.environment, Environment::Production);
    }

    #[test]
    fn missing_signing_secret_is_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            baseline_env();
            remove_env(SECRET_KEY_ENV);
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, memory_toml());

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("SECRET_KEY"), "got: {err}");
    }

    #[test]
    fn missing_client_secret_is_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            baseline_env();
            remove_env(GITHUB_CLIENT_SECRET_ENV);
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, memory_toml());

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("GITHUB_CLIENT_SECRET"), "got: {err}");
    }

    #[test]
    fn signing_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            baseline_env();
            remove_env(SECRET_KEY_ENV);
        }
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("signing_key");
        std::fs::write(&key_path, "file-secret\n").unwrap();
        let toml_content = memory_toml().replace(
            "environment = \"development\"",
            &format!(
                "environment = \"development\"\nsigning_secret_file = \"{}\"",
                key_path.display()
            ),
        );
        let path = write_config(&dir, &toml_content);

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.server.signing_secret.as_ref().unwrap().expose(),
            "file-secret"
        );
    }

    #[test]
    fn env_secret_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("client_secret");
        std::fs::write(&key_path, "file-value").unwrap();
        let toml_content = memory_toml().replace(
            "client_id = \"Iv1.client\"",
            &format!(
                "client_id = \"Iv1.client\"\nclient_secret_file = \"{}\"",
                key_path.display()
            ),
        );
        let path = write_config(&dir, &toml_content);

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.github.client_secret.as_ref().unwrap().expose(),
            "client-secret",
            "GITHUB_CLIENT_SECRET env var must take precedence over client_secret_file"
        );
    }

    #[test]
    fn nonexistent_secret_file_returns_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            baseline_env();
            remove_env(SECRET_KEY_ENV);
        }
        let dir = tempfile::tempdir().unwrap();
        let toml_content = memory_toml().replace(
            "environment = \"development\"",
            "environment = \"development\"\nsigning_secret_file = \"/nonexistent/signing_key\"",
        );
        let path = write_config(&dir, &toml_content);

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn invalid_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let toml_content = memory_toml().replace(
            "client_id = \"Iv1.client\"",
            "client_id = \"Iv1.client\"\napi_base_url = \"api.github.com\"",
        );
        let path = write_config(&dir, &toml_content);

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("api_base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let toml_content = memory_toml().replace(
            "client_id = \"Iv1.client\"",
            "client_id = \"Iv1.client\"\ntimeout_secs = 0",
        );
        let path = write_config(&dir, &toml_content);

        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");
    }

    #[test]
    fn zero_max_connections_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let toml_content = memory_toml().replace(
            "environment = \"development\"",
            "environment = \"development\"\nmax_connections = 0",
        );
        let path = write_config(&dir, &toml_content);

        assert!(Config::load(&path).is_err(), "max_connections = 0 must be rejected");
    }

    #[test]
    fn secrets_manager_requires_region() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &memory_toml().replace("backend = \"memory\"", "backend = \"secrets_manager\""),
        );

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("store.region"), "got: {err}");
    }

    #[test]
    fn endpoint_override_only_applies_in_development() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            baseline_env();
            set_env(AWS_ACCESS_KEY_ID_ENV, "AKIATEST");
            set_env(AWS_SECRET_ACCESS_KEY_ENV, "aws-secret");
        }
        let dir = tempfile::tempdir().unwrap();
        let store_section = "backend = \"secrets_manager\"\nregion = \"us-east-1\"\nendpoint_url = \"http://localhost:4566\"";

        let dev = write_config(
            &dir,
            &memory_toml().replace("backend = \"memory\"", store_section),
        );
        let config = Config::load(&dev).unwrap();
        let settings = config.secrets_manager_settings().unwrap();
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(settings.access_key_id.expose(), "AKIATEST");

        let prod = write_config(
            &dir,
            &memory_toml()
                .replace("development", "production")
                .replace("backend = \"memory\"", store_section),
        );
        let config = Config::load(&prod).unwrap();
        assert!(config.secrets_manager_settings().unwrap().endpoint_url.is_none());

        unsafe {
            remove_env(AWS_ACCESS_KEY_ID_ENV);
            remove_env(AWS_SECRET_ACCESS_KEY_ENV);
        }
    }

    #[test]
    fn secrets_manager_settings_require_aws_credentials() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { baseline_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &memory_toml().replace(
                "backend = \"memory\"",
                "backend = \"secrets_manager\"\nregion = \"us-east-1\"",
            ),
        );

        let config = Config::load(&path).unwrap();
        let err = config.secrets_manager_settings().unwrap_err().to_string();
        assert!(err.contains("AWS_ACCESS_KEY_ID"), "got: {err}");
    }

    #[test]
    fn resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("github-relay.toml"));
    }
}
