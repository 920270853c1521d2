//! Configuration loading and types for flipbook.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different collaborator:
//! the Cognito pools and S3 bucket, the order submission API, the
//! persisted session, storage tuning, and logging.

use serde::Deserialize;
use std::path::Path;

/// Longest lifetime a presigned URL may be given (7 days).
pub const MAX_PRESIGN_TTL_SECONDS: u64 = 604_800;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Cognito and S3 identifiers.
    pub aws: AwsConfig,

    /// Order submission API settings.
    pub api: ApiConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Upload, listing and presign tuning.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cognito user pool, identity pool and S3 bucket identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    /// AWS region shared by both pools and the bucket (e.g. `eu-central-1`).
    #[serde(default = "default_region")]
    pub region: String,

    /// Cognito user pool id (e.g. `eu-central-1_AbCdEf123`).
    pub user_pool_id: String,

    /// App client id of the user pool.
    pub client_id: String,

    /// Cognito identity pool id.
    pub identity_pool_id: String,

    /// Bucket that receives uploads.
    pub bucket: String,

    /// First segment of every upload key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Override for the Cognito user pool endpoint (LocalStack, tests).
    #[serde(default)]
    pub cognito_idp_endpoint: Option<String>,

    /// Override for the Cognito identity endpoint.
    #[serde(default)]
    pub cognito_identity_endpoint: Option<String>,

    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
}

/// Order submission API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL; orders are posted to `{base_url}/orders`.
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
}

/// Where the last authenticated session is kept between runs.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Path of the JSON session file.
    #[serde(default = "default_session_path")]
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

/// Upload, listing and presign tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// `MaxKeys` passed to list-objects.
    #[serde(default = "default_list_max_keys")]
    pub list_max_keys: i32,

    /// Lifetime of preview URLs in seconds.
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_seconds: u64,

    /// Size of the body chunks streamed during uploads; progress is
    /// reported once per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            list_max_keys: default_list_max_keys(),
            presign_ttl_seconds: default_presign_ttl(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Check identifiers and limits that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        let required = [
            ("aws.region", &self.aws.region),
            ("aws.user_pool_id", &self.aws.user_pool_id),
            ("aws.client_id", &self.aws.client_id),
            ("aws.identity_pool_id", &self.aws.identity_pool_id),
            ("aws.bucket", &self.aws.bucket),
            ("api.base_url", &self.api.base_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("configuration value {name} must not be empty");
            }
        }

        let ttl = self.storage.presign_ttl_seconds;
        if ttl == 0 || ttl > MAX_PRESIGN_TTL_SECONDS {
            anyhow::bail!(
                "storage.presign_ttl_seconds must be between 1 and {MAX_PRESIGN_TTL_SECONDS}"
            );
        }
        if self.storage.list_max_keys < 1 {
            anyhow::bail!("storage.list_max_keys must be positive");
        }
        if self.storage.chunk_size == 0 {
            anyhow::bail!("storage.chunk_size must be positive");
        }
        Ok(())
    }

    /// Key of the identity-pool login map: the user pool issuer without
    /// its scheme.
    pub fn login_provider(&self) -> String {
        format!(
            "cognito-idp.{}.amazonaws.com/{}",
            self.aws.region, self.aws.user_pool_id
        )
    }

    /// Endpoint of the Cognito user pool JSON API.
    pub fn cognito_idp_endpoint(&self) -> String {
        self.aws
            .cognito_idp_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.aws.region))
    }

    /// Endpoint of the Cognito identity pool JSON API.
    pub fn cognito_identity_endpoint(&self) -> String {
        self.aws
            .cognito_identity_endpoint
            .clone()
            .unwrap_or_else(|| {
                format!("https://cognito-identity.{}.amazonaws.com/", self.aws.region)
            })
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_key_prefix() -> String {
    "uploads".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_session_path() -> String {
    "./data/session.json".to_string()
}

fn default_list_max_keys() -> i32 {
    10
}

fn default_presign_ttl() -> u64 {
    900
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load, parse and validate configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
aws:
  region: eu-central-1
  user_pool_id: eu-central-1_vJ7tUmKmn
  client_id: abc123
  identity_pool_id: "eu-central-1:0000-1111"
  bucket: photos
api:
  base_url: https://api.example.com/dev
"#;

    #[test]
    fn test_defaults_applied() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.aws.key_prefix, "uploads");
        assert_eq!(config.storage.list_max_keys, 10);
        assert_eq!(config.storage.presign_ttl_seconds, 900);
        assert_eq!(config.session.path, "./data/session.json");
        assert_eq!(config.logging.format, "text");
        assert!(!config.aws.use_path_style);
        config.validate().unwrap();
    }

    #[test]
    fn test_login_provider_key() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(
            config.login_provider(),
            "cognito-idp.eu-central-1.amazonaws.com/eu-central-1_vJ7tUmKmn"
        );
    }

    #[test]
    fn test_default_endpoints_follow_region() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(
            config.cognito_idp_endpoint(),
            "https://cognito-idp.eu-central-1.amazonaws.com/"
        );
        assert_eq!(
            config.cognito_identity_endpoint(),
            "https://cognito-identity.eu-central-1.amazonaws.com/"
        );
    }

    #[test]
    fn test_endpoint_override() {
        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.aws.cognito_idp_endpoint = Some("http://localhost:4566/".to_string());
        assert_eq!(config.cognito_idp_endpoint(), "http://localhost:4566/");
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.aws.bucket = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("aws.bucket"));
    }

    #[test]
    fn test_validate_rejects_long_presign_ttl() {
        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.storage.presign_ttl_seconds = MAX_PRESIGN_TTL_SECONDS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_section_is_error() {
        let yaml = "aws:\n  user_pool_id: x\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flipbook.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.aws.bucket, "photos");
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/flipbook.example.yaml");
        let config = load_config(path).unwrap();
        assert_eq!(config.aws.region, "eu-central-1");
        assert_eq!(config.storage.chunk_size, 65536);
    }
}
