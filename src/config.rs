// src/config.rs

pub mod file;

use self::file::{get_config_path, load_or_create_external_config};
use crate::{catalog::DriverDescriptor, cli::Cli, constants, error::*};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_redirects: Option<usize>,
}

// 为 NetworkConfig 提供一组稳健的默认值
impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(constants::DEFAULT_CONNECT_TIMEOUT_SECS),
            timeout_secs: Some(constants::DEFAULT_TIMEOUT_SECS),
            max_retries: Some(constants::DEFAULT_RETRIES),
            max_redirects: Some(constants::DEFAULT_MAX_REDIRECTS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 为空时使用 `<user-data>/pos-drivers`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub retention_days: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            retention_days: Some(constants::DEFAULT_RETENTION_DAYS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExternalConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// 追加或覆盖内置目录的驱动条目
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_drivers: Vec<DriverDescriptor>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub download_dir: PathBuf,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub retries: u32,
    pub max_redirects: usize,
    pub retention_days: u64,
    pub extra_drivers: Vec<DriverDescriptor>,
}

fn default_data_dir() -> AppResult<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join(constants::DATA_DIR_NAME))
        .ok_or_else(|| AppError::Other(anyhow!("无法确定用户数据目录")))
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let config_path = match &args.config {
            Some(path) => path.clone(),
            None => get_config_path()?,
        };
        let external_config = load_or_create_external_config(&config_path)?;
        Self::from_external(external_config, args)
    }

    /// 外部配置为基础，命令行参数优先
    pub fn from_external(external: ExternalConfig, args: &Cli) -> AppResult<Self> {
        let data_dir = match args.data_dir.clone().or(external.cache.data_dir) {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        let cache_dir = constants::CACHE_SUBDIR
            .iter()
            .fold(data_dir.clone(), |p, s| p.join(s));
        let download_dir = match &args.output {
            Some(dir) => dir.clone(),
            None => constants::DOWNLOAD_SUBDIR
                .iter()
                .fold(data_dir.clone(), |p, s| p.join(s)),
        };

        Ok(Self {
            data_dir,
            cache_dir,
            download_dir,
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(
                external
                    .network
                    .connect_timeout_secs
                    .unwrap_or(constants::DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            timeout: Duration::from_secs(
                args.timeout
                    .or(external.network.timeout_secs)
                    .unwrap_or(constants::DEFAULT_TIMEOUT_SECS),
            ),
            retries: args
                .retries
                .or(external.network.max_retries)
                .unwrap_or(constants::DEFAULT_RETRIES),
            max_redirects: external
                .network
                .max_redirects
                .unwrap_or(constants::DEFAULT_MAX_REDIRECTS),
            retention_days: args
                .retention_days
                .or(external.cache.retention_days)
                .unwrap_or(constants::DEFAULT_RETENTION_DAYS),
            extra_drivers: external.extra_drivers,
        })
    }
}

#[cfg(feature = "testing")]
impl AppConfig {
    /// 所有目录都位于 `root` 之下的测试配置
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            data_dir: root.to_path_buf(),
            cache_dir: root.join("cache"),
            download_dir: root.join("downloads"),
            ..Self::default()
        }
    }
}

#[cfg(feature = "testing")]
impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = std::env::temp_dir().join("pos-drivers-test");
        Self {
            cache_dir: data_dir.join("cache"),
            download_dir: data_dir.join("downloads"),
            data_dir,
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            retries: 2,
            max_redirects: constants::DEFAULT_MAX_REDIRECTS,
            retention_days: constants::DEFAULT_RETENTION_DAYS,
            extra_drivers: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_external_config() {
        let args = Cli::parse_from([
            "pos-drivers",
            "--list",
            "--data-dir",
            "/srv/pos",
            "--retries",
            "7",
        ]);
        let external: ExternalConfig = serde_json::from_str(
            r#"{ "network": { "max_retries": 1, "timeout_secs": 42 } }"#,
        )
        .unwrap();
        let config = AppConfig::from_external(external, &args).unwrap();

        assert_eq!(config.retries, 7);
        assert_eq!(config.timeout, Duration::from_secs(42));
        assert_eq!(
            config.cache_dir,
            PathBuf::from("/srv/pos/drivers/printers/cache")
        );
        assert_eq!(
            config.download_dir,
            PathBuf::from("/srv/pos/drivers/printers/downloads")
        );
        assert_eq!(config.retention_days, constants::DEFAULT_RETENTION_DAYS);
    }

    #[test]
    fn test_default_external_config_round_trips() {
        let json = serde_json::to_string(&ExternalConfig::default()).unwrap();
        let parsed: ExternalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.network.max_retries, Some(constants::DEFAULT_RETRIES));
        assert!(parsed.extra_drivers.is_empty());
    }
}
