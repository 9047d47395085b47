// src/installer/mod.rs

mod executor;
mod state;

pub use executor::{CommandExecutor, CommandOutput, SystemExecutor};
pub use state::{InstallState, InstallStatus};

use crate::{
    cache::CacheStore,
    catalog::{CommandSpec, DriverCatalog, Platform, ResolvedPackage},
    config::AppConfig,
    downloader::{Downloader, ProgressSink},
    error::*,
    models::{DownloadProgress, DownloadRequest, FailureKind},
};
use log::{info, warn};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// UI 侧的进度接收端，收到 `(driver_id, progress)`，不保证送达
pub trait DriverProgressSink: Send + Sync {
    fn on_driver_progress(&self, driver_id: &str, progress: &DownloadProgress);
}

impl<F> DriverProgressSink for F
where
    F: Fn(&str, &DownloadProgress) + Send + Sync,
{
    fn on_driver_progress(&self, driver_id: &str, progress: &DownloadProgress) {
        self(driver_id, progress)
    }
}

/// 把传输进度同时写入安装状态并转发给 UI
struct ForwardingSink {
    driver_id: String,
    state: InstallState,
    sink: Option<Arc<dyn DriverProgressSink>>,
}

impl ProgressSink for ForwardingSink {
    fn on_progress(&self, progress: &DownloadProgress) {
        self.state.record_progress(&self.driver_id, *progress);
        if let Some(sink) = &self.sink {
            sink.on_driver_progress(&self.driver_id, progress);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDownload {
    pub driver_id: String,
    pub path: PathBuf,
    pub from_cache: bool,
    pub hash: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub driver_id: String,
    pub installer_path: PathBuf,
    pub command: CommandSpec,
    pub output: CommandOutput,
    /// 没有检测命令时为 None
    pub installed: Option<bool>,
}

/// 驱动安装编排: 目录解析 → 缓存查找 → 下载 → 入缓存 → 安装 → 检测
pub struct DriverInstaller {
    catalog: Arc<DriverCatalog>,
    downloader: Downloader,
    cache: CacheStore,
    executor: Arc<dyn CommandExecutor>,
    state: InstallState,
    platform: Platform,
    download_dir: PathBuf,
    timeout: Duration,
    retries: u32,
    use_cache: bool,
    keep_downloads: bool,
    cancel: CancellationToken,
}

impl DriverInstaller {
    pub fn new(
        config: &AppConfig,
        catalog: Arc<DriverCatalog>,
        downloader: Downloader,
        executor: Arc<dyn CommandExecutor>,
        platform: Platform,
    ) -> Self {
        Self {
            catalog,
            downloader,
            cache: CacheStore::new(config.cache_dir.clone()),
            executor,
            state: InstallState::new(),
            platform,
            download_dir: config.download_dir.clone(),
            timeout: config.timeout,
            retries: config.retries,
            use_cache: true,
            keep_downloads: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 跳过缓存查找，总是重新下载（下载结果仍会写入缓存）
    pub fn without_cache_lookup(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// 入缓存后保留下载目录中的安装包（用户指定了输出目录时使用）。
    /// 默认入缓存成功后删除下载目录中的副本，改用缓存中的文件。
    pub fn keep_downloads(mut self) -> Self {
        self.keep_downloads = true;
        self
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn resolve(&self, driver_id: &str) -> AppResult<ResolvedPackage> {
        self.catalog.resolve(driver_id, self.platform)
    }

    pub fn status(&self, driver_id: &str) -> Option<InstallStatus> {
        self.state.status(driver_id)
    }

    fn fail<T>(&self, driver_id: &str, error: AppError) -> AppResult<T> {
        self.state.set(
            driver_id,
            InstallStatus::Failed {
                message: error.to_string(),
            },
        );
        Err(error)
    }

    /// 获取驱动安装包: 优先使用校验通过的缓存，否则下载并写入缓存
    pub async fn download_driver(
        &self,
        driver_id: &str,
        sink: Option<Arc<dyn DriverProgressSink>>,
    ) -> AppResult<DriverDownload> {
        let package = self.resolve(driver_id)?;

        if self.use_cache
            && let Some(hit) = self
                .cache
                .lookup_with_digest(&package.file_name, package.hash.as_deref(), package.algorithm)
                .await
        {
            info!("驱动 '{}' 使用缓存: '{}'", driver_id, hit.path.display());
            self.state.set(driver_id, InstallStatus::Cached);
            return Ok(DriverDownload {
                driver_id: driver_id.to_string(),
                path: hit.path,
                from_cache: true,
                hash: Some(hit.digest),
                verified: package.hash.is_some(),
            });
        }

        let destination = self.download_dir.join(&package.file_name);
        let forwarding = ForwardingSink {
            driver_id: driver_id.to_string(),
            state: self.state.clone(),
            sink,
        };
        let request = DownloadRequest::new(&package.url, &destination)
            .expected_hash(package.hash.clone(), package.algorithm)
            .timeout(self.timeout)
            .retries(self.retries)
            .cancel_token(self.cancel.clone())
            .progress(Arc::new(forwarding));

        let result = self.downloader.download(request).await;
        if result.failure == Some(FailureKind::Cancelled) {
            return self.fail(driver_id, AppError::Cancelled);
        }
        if !result.success {
            let message = result.error.unwrap_or_else(|| "未知错误".to_string());
            return self.fail(
                driver_id,
                AppError::DownloadFailed {
                    driver: driver_id.to_string(),
                    message,
                },
            );
        }
        // 提供了期望摘要却未通过校验，一律按失败处理
        if package.hash.is_some() && !result.verified {
            return self.fail(
                driver_id,
                AppError::DownloadFailed {
                    driver: driver_id.to_string(),
                    message: "安装包未通过摘要校验".to_string(),
                },
            );
        }

        let path = match self.cache.store(&result.file_path, &package.file_name).await {
            Ok(cached) if !self.keep_downloads => {
                if let Err(e) = tokio::fs::remove_file(&result.file_path).await {
                    warn!("删除下载目录中的副本 '{}' 失败: {}", result.file_path.display(), e);
                }
                cached
            }
            Ok(_) => result.file_path,
            Err(e) => {
                warn!("驱动 '{}' 写入缓存失败 (不影响本次安装): {}", driver_id, e);
                result.file_path
            }
        };
        self.state.set(driver_id, InstallStatus::Downloaded);
        Ok(DriverDownload {
            driver_id: driver_id.to_string(),
            path,
            from_cache: false,
            hash: result.hash,
            verified: result.verified,
        })
    }

    pub async fn install_driver(
        &self,
        driver_id: &str,
        sink: Option<Arc<dyn DriverProgressSink>>,
    ) -> AppResult<InstallOutcome> {
        let download = self.download_driver(driver_id, sink).await?;
        self.install_downloaded(&download).await
    }

    /// 用已经取得的安装包执行安装命令，然后重新检测安装状态
    pub async fn install_downloaded(&self, download: &DriverDownload) -> AppResult<InstallOutcome> {
        let driver_id = download.driver_id.as_str();
        let package = self.resolve(driver_id)?;
        let command = package.install.render(&download.path);

        self.state.set(driver_id, InstallStatus::Installing);
        info!("安装驱动 '{}': {}", driver_id, command);
        let output = match self.executor.run(&command).await {
            Ok(output) => output,
            Err(e) => return self.fail(driver_id, e),
        };
        if !output.success() {
            let stderr = output.stderr.trim();
            let message = if stderr.is_empty() {
                format!("退出码 {:?}", output.code)
            } else {
                format!("退出码 {:?}: {}", output.code, stderr)
            };
            return self.fail(
                driver_id,
                AppError::Command {
                    program: command.program.clone(),
                    message,
                },
            );
        }

        self.state.forget_installed_check(driver_id);
        // 安装已经成功，检测命令本身出错只记录警告
        let installed = match self.is_installed(driver_id).await {
            Ok(installed) => installed,
            Err(e) => {
                warn!("驱动 '{}' 安装后检测失败: {}", driver_id, e);
                None
            }
        };
        if installed == Some(false) {
            warn!("驱动 '{}' 安装命令成功，但检测未发现已安装的驱动", driver_id);
        }
        self.state.set(driver_id, InstallStatus::Installed);

        Ok(InstallOutcome {
            driver_id: driver_id.to_string(),
            installer_path: download.path.clone(),
            command,
            output,
            installed,
        })
    }

    /// 运行检测命令判断驱动是否已安装，结果会被记住直到下一次安装
    pub async fn is_installed(&self, driver_id: &str) -> AppResult<Option<bool>> {
        if let Some(known) = self.state.installed_check(driver_id) {
            return Ok(Some(known));
        }
        let package = self.resolve(driver_id)?;
        let Some(check) = package.check else {
            return Ok(None);
        };
        let output = self.executor.run(&check.command).await?;
        let installed = output.success()
            && output
                .stdout
                .to_lowercase()
                .contains(&check.expect.to_lowercase());
        info!("驱动 '{}' 安装检测结果: {}", driver_id, installed);
        self.state.record_installed_check(driver_id, installed);
        Ok(Some(installed))
    }
}
