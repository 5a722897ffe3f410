use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string. Without it rows live in memory.
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    S3,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub bucket: Option<String>,
    pub region: String,
    /// Custom S3 endpoint (Supabase Storage, MinIO, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub public_base_url: Option<String>,
    pub force_path_style: bool,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SiteConfig {
    /// Public URL of the front-end, used to build share links.
    pub url: String,
}

impl SiteConfig {
    pub fn share_url(&self, lane_id: Uuid) -> String {
        format!("{}/m/{}", self.url.trim_end_matches('/'), lane_id)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub json: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::defaults()?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("MEMORY_LANE").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("database.run_migrations", true)?
            .set_default("storage.backend", "memory")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.force_path_style", true)?
            .set_default("storage.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("auth.jwt_secret", "change-me-in-production")?
            .set_default("site.url", "http://localhost:3000/")?
            .set_default("log.json", false)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }

        if !(self.site.url.starts_with("http://") || self.site.url.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "site.url must be an http(s) URL, got {:?}",
                self.site.url
            )));
        }

        if self.storage.backend == StorageBackend::S3 {
            if self.storage.bucket.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Message(
                    "storage.bucket is required for the s3 backend".to_string(),
                ));
            }
            if self.storage.access_key_id.is_none() || self.storage.secret_access_key.is_none() {
                return Err(ConfigError::Message(
                    "storage.access_key_id and storage.secret_access_key are required for the s3 backend"
                        .to_string(),
                ));
            }
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Message(
                "storage.max_upload_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(overrides: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let mut builder = Settings::defaults()?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize()
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]).unwrap();

        assert_eq!(settings.server.port, 8080);
        assert!(settings.database.url.is_none());
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.storage.max_upload_bytes, 10 * 1024 * 1024);
        assert!(!settings.log.json);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_s3_requires_bucket_and_keys() {
        let settings = load(&[("storage.backend", "s3")]).unwrap();
        assert!(settings.validate().is_err());

        let settings = load(&[
            ("storage.backend", "s3"),
            ("storage.bucket", "images"),
            ("storage.access_key_id", "key"),
            ("storage.secret_access_key", "secret"),
        ])
        .unwrap();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_site_url_must_be_http() {
        let settings = load(&[("site.url", "memory-lane.app")]).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_share_url_joins_cleanly() {
        let id = Uuid::nil();
        let with_slash = SiteConfig {
            url: "https://lanes.example/".to_string(),
        };
        let without_slash = SiteConfig {
            url: "https://lanes.example".to_string(),
        };

        let expected = format!("https://lanes.example/m/{id}");
        assert_eq!(with_slash.share_url(id), expected);
        assert_eq!(without_slash.share_url(id), expected);
    }
}
