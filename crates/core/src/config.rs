//! Storefront settings.
//!
//! Layers, lowest first: built-in defaults, the TOML file, `STOREFRONT_*`
//! environment variables, then [`ConfigOverrides`] handed in by the caller.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_FILE: &str = "storefront.toml";
const FALLBACK_FILE: &str = "config/storefront.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub seed_on_startup: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Values set by the embedding binary or a test; they win over every other layer.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub seed_on_startup: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://storefront.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                templates_dir: PathBuf::from("templates"),
                static_dir: PathBuf::from("static"),
            },
            catalog: CatalogConfig { seed_on_startup: true },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "logging.format `{other}` is not one of compact|pretty|json"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_file(options.config_path.as_deref()) {
            Some(path) => read_file(&path)?.apply_to(&mut config),
            None if options.require_file => {
                let expected = options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.apply_env()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    /// Address the HTTP server binds to, e.g. `127.0.0.1:8080`.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        let database = &mut self.database;
        set(&mut database.url, env_value("STOREFRONT_DATABASE_URL"));
        set(&mut database.max_connections, env_parsed("STOREFRONT_DATABASE_MAX_CONNECTIONS")?);
        set(&mut database.timeout_secs, env_parsed("STOREFRONT_DATABASE_TIMEOUT_SECS")?);

        let server = &mut self.server;
        set(&mut server.bind_address, env_value("STOREFRONT_SERVER_BIND_ADDRESS"));
        set(&mut server.port, env_parsed("STOREFRONT_SERVER_PORT")?);
        set(
            &mut server.graceful_shutdown_secs,
            env_parsed("STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
        );
        let templates_dir = env_value("STOREFRONT_SERVER_TEMPLATES_DIR").map(PathBuf::from);
        set(&mut server.templates_dir, templates_dir);
        set(&mut server.static_dir, env_value("STOREFRONT_SERVER_STATIC_DIR").map(PathBuf::from));

        set(&mut self.catalog.seed_on_startup, env_parsed("STOREFRONT_CATALOG_SEED_ON_STARTUP")?);

        set(
            &mut self.logging.level,
            env_value("STOREFRONT_LOGGING_LEVEL").or_else(|| env_value("STOREFRONT_LOG_LEVEL")),
        );
        let format =
            env_value("STOREFRONT_LOGGING_FORMAT").or_else(|| env_value("STOREFRONT_LOG_FORMAT"));
        if let Some(format) = format {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        set(&mut self.database.url, overrides.database_url);
        set(&mut self.catalog.seed_on_startup, overrides.seed_on_startup);
        set(&mut self.logging.level, overrides.log_level);
    }

    /// Returns the first failing rule; the message starts with the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let database = &self.database;
        let server = &self.server;
        let url = database.url.trim();
        let level = self.logging.level.trim().to_ascii_lowercase();

        let rules = [
            (
                url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:",
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
            ),
            (database.max_connections > 0, "database.max_connections must be greater than zero"),
            (
                (1..=300).contains(&database.timeout_secs),
                "database.timeout_secs must be in range 1..=300",
            ),
            (!server.bind_address.trim().is_empty(), "server.bind_address must not be empty"),
            (server.port > 0, "server.port must be greater than zero"),
            (
                server.graceful_shutdown_secs > 0,
                "server.graceful_shutdown_secs must be greater than zero",
            ),
            (
                matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error"),
                "logging.level must be one of trace|debug|info|warn|error",
            ),
        ];

        match rules.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(ConfigError::Validation((*message).to_string())),
            None => Ok(()),
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => {
            [DEFAULT_FILE, FALLBACK_FILE].into_iter().map(PathBuf::from).find(|path| path.exists())
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&expand_env_refs(&raw)?)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${NAME}` with the value of that environment variable.
fn expand_env_refs(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &after[..end];
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Blank variables count as unset.
fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    env_value(key)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

/// Shape of the TOML file; every key is optional and only present keys are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    database: DatabaseSection,
    server: ServerSection,
    catalog: CatalogSection,
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseSection {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    templates_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogSection {
    seed_on_startup: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl FileConfig {
    fn apply_to(self, config: &mut AppConfig) {
        let Self { database, server, catalog, logging } = self;

        set(&mut config.database.url, database.url);
        set(&mut config.database.max_connections, database.max_connections);
        set(&mut config.database.timeout_secs, database.timeout_secs);

        set(&mut config.server.bind_address, server.bind_address);
        set(&mut config.server.port, server.port);
        set(&mut config.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        set(&mut config.server.templates_dir, server.templates_dir);
        set(&mut config.server.static_dir, server.static_dir);

        set(&mut config.catalog.seed_on_startup, catalog.seed_on_startup);

        set(&mut config.logging.level, logging.level);
        set(&mut config.logging.format, logging.format);
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    /// Tests in this module read and write process-wide environment variables.
    static ENV: Mutex<()> = Mutex::new(());

    /// Sets `vars` for the duration of `body`, then removes them again.
    fn with_vars<R>(vars: &[(&str, &str)], body: impl FnOnce() -> R) -> R {
        let _guard = ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let result = body();
        for (key, _) in vars {
            env::remove_var(key);
        }
        result
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("storefront.toml");
        std::fs::write(&path, contents).expect("write config");
        path
    }

    fn load_from(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn defaults_apply_when_no_file_is_present() {
        let config = with_vars(&[], || load_from("does-not-exist/storefront.toml".into()))
            .expect("defaults load");

        assert_eq!(config.listen_address(), "127.0.0.1:8080");
        assert_eq!(config.database.url, "sqlite://storefront.db?mode=rwc");
        assert!(config.catalog.seed_on_startup);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_values_expand_environment_references() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            "[database]\nurl = \"sqlite://${SHOP_TEST_DB_NAME}.db\"\n\n[server]\nport = 9090\n",
        );

        let config = with_vars(&[("SHOP_TEST_DB_NAME", "interpolated")], || load_from(path))
            .expect("config load");

        assert_eq!(config.database.url, "sqlite://interpolated.db");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn unset_reference_names_the_variable() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, "[database]\nurl = \"${SHOP_TEST_NEVER_SET}\"\n");

        let error = with_vars(&[], || load_from(path)).expect_err("missing variable");

        assert!(matches!(
            error,
            ConfigError::MissingEnvInterpolation { ref var } if var == "SHOP_TEST_NEVER_SET"
        ));
    }

    #[test]
    fn unclosed_reference_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, "[database]\nurl = \"${SHOP_TEST_DB\"\n");

        let error = with_vars(&[], || load_from(path)).expect_err("unterminated");

        assert!(matches!(error, ConfigError::UnterminatedInterpolation));
    }

    #[test]
    fn short_logging_variables_are_accepted() {
        let config = with_vars(
            &[("STOREFRONT_LOG_LEVEL", "warn"), ("STOREFRONT_LOG_FORMAT", "pretty")],
            || AppConfig::load(LoadOptions::default()),
        )
        .expect("config load");

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn later_layers_win() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 9090
bind_address = "0.0.0.0"

[catalog]
seed_on_startup = false

[logging]
level = "warn"
"#,
        );

        let config = with_vars(
            &[
                ("STOREFRONT_DATABASE_URL", "sqlite://from-env.db"),
                ("STOREFRONT_SERVER_PORT", "7070"),
            ],
            || {
                AppConfig::load(LoadOptions {
                    config_path: Some(path),
                    overrides: ConfigOverrides {
                        database_url: Some("sqlite://from-override.db".to_string()),
                        log_level: Some("debug".to_string()),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
            },
        )
        .expect("config load");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.listen_address(), "0.0.0.0:7070");
        assert!(!config.catalog.seed_on_startup);
    }

    #[test]
    fn non_sqlite_url_fails_validation() {
        let error = with_vars(&[("STOREFRONT_DATABASE_URL", "postgres://localhost/shop")], || {
            AppConfig::load(LoadOptions::default())
        })
        .expect_err("validation failure");

        assert!(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.starts_with("database.url")
            ),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn out_of_range_timeout_fails_validation() {
        let mut config = AppConfig::default();
        config.database.timeout_secs = 301;

        let error = config.validate().expect_err("timeout out of range");
        assert!(error.to_string().contains("database.timeout_secs"));
    }

    #[test]
    fn unparsable_variable_reports_its_key() {
        let error = with_vars(&[("STOREFRONT_CATALOG_SEED_ON_STARTUP", "sometimes")], || {
            AppConfig::load(LoadOptions::default())
        })
        .expect_err("bad boolean");

        assert!(matches!(
            error,
            ConfigError::InvalidEnvOverride { ref key, ref value }
                if key == "STOREFRONT_CATALOG_SEED_ON_STARTUP" && value == "sometimes"
        ));
    }

    #[test]
    fn required_file_must_exist() {
        let error = with_vars(&[], || {
            AppConfig::load(LoadOptions {
                config_path: Some("nowhere/storefront.toml".into()),
                require_file: true,
                ..LoadOptions::default()
            })
        })
        .expect_err("missing file");

        assert!(matches!(
            error,
            ConfigError::MissingConfigFile(ref path) if path.ends_with("nowhere/storefront.toml")
        ));
    }
}
