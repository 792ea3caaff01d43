pub mod pixiv;
pub mod convert;

use std::fs::File;
use std::error::Error;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::convert::ConvertConfig;
use crate::config::pixiv::PixivConfig;

/* Config Error */

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    DeserializeError(serde_json::Error)
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::IoError(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        ConfigError::DeserializeError(value)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO Error: {}", e),
            ConfigError::DeserializeError(e) => write!(f, "Deserialize Error: {}", e),
        }
    }
}

impl Error for ConfigError {}

/* Config */

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pixiv: PixivConfig,
    #[serde(default)]
    pub convert: ConvertConfig,
    /// Directory archives and videos are written to, current directory when absent
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_batch_concurrency() -> usize { 2 }

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            pixiv: PixivConfig::default(),
            convert: ConvertConfig::default(),
            output_dir: None,
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl AppConfig {
    pub fn read_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
        let file = File::open(path)?;
        let config: AppConfig = serde_json::from_reader(file)?;
        Ok(config)
    }

    /// Explicit paths must exist; the default path is optional
    pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
        match path {
            Some(path) => AppConfig::read_config(path),
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => AppConfig::read_config(DEFAULT_CONFIG_PATH),
            None => Ok(AppConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ugoira::encoder::EncodeProfile;
    use crate::ugoira::types::{Fidelity, PayloadKind};

    #[test]
    fn empty_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.batch_concurrency, 2);
        assert_eq!(config.pixiv.frame_workers, 4);
        assert_eq!(config.pixiv.payload_kind, PayloadKind::Api);
        assert!(config.pixiv.fallback_to_archive);
        assert_eq!(config.convert.profile, EncodeProfile::Copy);
        assert_eq!(config.convert.ffmpeg, "ffmpeg");
    }

    #[test]
    fn sections_override_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{
            "pixiv": { "php_sessid": "abc", "fidelity": "maximum", "payload_kind": "page", "archive_size": "1920x1080" },
            "convert": { "profile": "vp9_lossless" },
            "output_dir": "out"
        }"#).unwrap();
        assert_eq!(config.pixiv.php_sessid.as_deref(), Some("abc"));
        assert_eq!(config.pixiv.fidelity, Fidelity::Maximum);
        assert_eq!(config.pixiv.payload_kind, PayloadKind::Page);
        assert_eq!(config.pixiv.timeout_secs, 10);
        assert_eq!(config.convert.profile, EncodeProfile::Vp9Lossless);
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
