//! Configuration loading and validation.
//!
//! Sources are layered, later ones winning:
//!
//! 1. Built-in defaults.
//! 2. A config file (TOML, or YAML/JSON going by extension).
//! 3. Environment variables prefixed with `HOARD_`, with `__` separating
//!    nested keys: `HOARD_STORAGE__ENCRYPTION_KEY`, `HOARD_STORAGE__LIMIT`.
//!
//! ```toml
//! [storage]
//! path = "/var/lib/hoard/blobs"
//! encryption_key = "0123456789abcdef0123456789abcdef"
//! limit = 10737418240
//! max_upload_size = 1073741824
//!
//! [catalog]
//! database = "/var/lib/hoard/catalog.sqlite"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use hoard_storage::EncryptionKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Well-known example key. Refused so nobody ships with it.
pub const PLACEHOLDER_KEY: &str = "12345678901234567890123456789012";
pub const ENV_PREFIX: &str = "HOARD_";
const GIB: u64 = 1 << 30;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "hoard")
}

/// `config.toml` in the platform's config directory, if there is one.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn data_dir() -> PathBuf {
    project_dirs().map_or_else(|| PathBuf::from("data"), |dirs| dirs.data_dir().to_path_buf())
}

/// String that never shows up in logs or `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for encrypted blobs.
    pub path: PathBuf,
    /// 32 raw bytes, or 64 hex digits.
    pub encryption_key: Option<Secret>,
    /// Per-user quota in bytes.
    pub limit: u64,
    /// Largest single upload in bytes.
    pub max_upload_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("blobs"),
            encryption_key: None,
            limit: 10 * GIB,
            max_upload_size: GIB,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub database: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { database: data_dir().join("catalog.sqlite") }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` overrides.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "info".to_string() }
    }
}

impl Config {
    /// Layered sources without any validation.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load, validate, and resolve relative paths against the working
    /// directory.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        config.storage.path =
            std::path::absolute(&config.storage.path).or_raise(|| ErrorKind::InvalidValue("storage.path"))?;
        config.catalog.database =
            std::path::absolute(&config.catalog.database).or_raise(|| ErrorKind::InvalidValue("catalog.database"))?;
        tracing::debug!(
            storage = %config.storage.path.display(),
            catalog = %config.catalog.database.display(),
            limit = config.storage.limit,
            max_upload_size = config.storage.max_upload_size,
            "Loaded configuration",
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.encryption_key()?;
        if self.storage.limit == 0 {
            exn::bail!(ErrorKind::InvalidValue("storage.limit"));
        }
        if self.storage.max_upload_size == 0 {
            exn::bail!(ErrorKind::InvalidValue("storage.max_upload_size"));
        }
        Ok(())
    }

    /// Parsed storage key. Fails if unset, malformed, or the placeholder.
    pub fn encryption_key(&self) -> Result<EncryptionKey> {
        let secret = self.storage.encryption_key.as_ref().ok_or_raise(|| ErrorKind::MissingKey)?;
        if secret.expose() == PLACEHOLDER_KEY {
            exn::bail!(ErrorKind::InvalidKey("the example key must be replaced"));
        }
        EncryptionKey::parse(secret.expose())
            .or_raise(|| ErrorKind::InvalidKey("expected 32 bytes or 64 hex characters"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn layers_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "hoard.toml",
                &format!(
                    r#"
                        [storage]
                        path = "/srv/blobs"
                        encryption_key = "{KEY}"
                        limit = 1000

                        [catalog]
                        database = "/srv/catalog.sqlite"
                    "#
                ),
            )?;
            jail.set_env("HOARD_STORAGE__LIMIT", "2000");

            let config = Config::load(Some(Path::new("hoard.toml"))).unwrap();
            assert_eq!(config.storage.path, Path::new("/srv/blobs"));
            assert_eq!(config.storage.limit, 2000);
            assert_eq!(config.storage.max_upload_size, GIB);
            assert_eq!(config.catalog.database, Path::new("/srv/catalog.sqlite"));
            assert!(config.encryption_key().is_ok());
            Ok(())
        });
    }

    #[test]
    fn reads_yaml_by_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("hoard.yaml", &format!("storage:\n  encryption_key: \"{KEY}\"\n  limit: 42\n"))?;
            let config = Config::load(Some(Path::new("hoard.yaml"))).unwrap();
            assert_eq!(config.storage.limit, 42);
            Ok(())
        });
    }

    #[test]
    fn key_from_env_only() {
        Jail::expect_with(|jail| {
            jail.set_env("HOARD_STORAGE__ENCRYPTION_KEY", KEY);
            let config = Config::load(None).unwrap();
            assert!(config.storage.path.is_absolute());
            assert_eq!(config.storage.limit, 10 * GIB);
            Ok(())
        });
    }

    #[test]
    fn missing_key_is_an_error() {
        Jail::expect_with(|_jail| {
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::MissingKey));
            Ok(())
        });
    }

    #[rstest]
    #[case(PLACEHOLDER_KEY)]
    #[case("short")]
    #[case("not-hex-not-hex-not-hex-not-hex-not-hex-not-hex-not-hex-not-hex!")]
    fn rejects_bad_keys(#[case] key: &str) {
        let mut config = Config::default();
        config.storage.encryption_key = Some(Secret::from(key));
        let err = config.encryption_key().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }

    #[test]
    fn accepts_hex_keys() {
        let mut config = Config::default();
        config.storage.encryption_key = Some(Secret::from("ab".repeat(32).as_str()));
        assert!(config.encryption_key().is_ok());
    }

    #[test]
    fn zero_limit_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("HOARD_STORAGE__ENCRYPTION_KEY", KEY);
            jail.set_env("HOARD_STORAGE__LIMIT", "0");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidValue("storage.limit")));
            Ok(())
        });
    }

    #[test]
    fn secrets_stay_out_of_debug_output() {
        let mut config = Config::default();
        config.storage.encryption_key = Some(Secret::from(KEY));
        assert!(!format!("{config:?}").contains(KEY));
    }
}
