// src/downloader/mod.rs

mod fetcher;
mod lock;
pub mod progress;
pub mod retry;

pub use fetcher::{FetchRequest, Fetcher, HttpFetcher};
pub use lock::{DestinationGuard, DestinationLocks};
pub use progress::ProgressSink;

use crate::{
    client::HttpClient,
    config::AppConfig,
    error::*,
    hasher,
    models::{DownloadRequest, DownloadResult},
};
use fetcher::remove_partial;
use log::{debug, error, info, warn};
use std::{path::Path, sync::Arc, time::Duration};
use url::Url;

/// 下载编排器: 重试、退避、下载后校验。调用之间不保留任何状态
/// （目标路径锁在释放后即被清理）。
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    backoff_unit: Duration,
    locks: DestinationLocks,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            backoff_unit: Duration::from_secs(1),
            locks: DestinationLocks::new(),
        }
    }

    /// 使用配置中的客户端参数构建基于 HTTP 的下载器
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let fetcher = HttpFetcher::new(HttpClient::new(config)?)
            .with_max_redirects(config.max_redirects);
        Ok(Self::new(Arc::new(fetcher)))
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// 唯一的公开入口。永远不会返回错误，所有失败都体现在结果字段中。
    pub async fn download(&self, request: DownloadRequest) -> DownloadResult {
        let destination = request.destination.clone();
        let _guard = self.locks.acquire(&destination).await;
        info!("开始下载 {} -> '{}'", request.url, destination.display());

        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(e) => {
                let e = AppError::from(e);
                error!("无效的下载地址 '{}': {}", request.url, e);
                return DownloadResult::failed(destination, &e, 0);
            }
        };

        if let Err(e) = ensure_parent_dir(&destination).await {
            error!("无法创建目标目录 '{}': {}", destination.display(), e);
            return DownloadResult::failed(destination, &e, 0);
        }

        let fetch_request = FetchRequest {
            url,
            destination: destination.clone(),
            timeout: request.timeout,
            progress: request.progress.clone(),
            cancel: request.cancel.clone(),
        };

        let total_attempts = request.retries.saturating_add(1);
        let mut attempts = 0;
        let mut last_error = AppError::Other(anyhow::anyhow!("未进行任何下载尝试"));

        for attempt_index in 0..total_attempts {
            if attempt_index > 0 {
                let delay = retry::backoff_delay(attempt_index, self.backoff_unit);
                warn!(
                    "第 {}/{} 次尝试失败: {}，{}ms 后重试",
                    attempt_index,
                    total_attempts,
                    last_error,
                    delay.as_millis()
                );
                remove_partial(&destination).await;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = request.cancel.cancelled() => {
                        last_error = AppError::Cancelled;
                        break;
                    }
                }
            }

            attempts += 1;
            debug!("下载尝试 {}/{}: {}", attempts, total_attempts, request.url);
            match self.attempt(&fetch_request, &request).await {
                Ok((hash, verified)) => {
                    info!(
                        "下载完成: '{}' ({}={}, 已校验={}, 尝试次数={})",
                        destination.display(),
                        request.algorithm,
                        hash,
                        verified,
                        attempts
                    );
                    return DownloadResult::succeeded(destination, hash, verified, attempts);
                }
                Err(AppError::Cancelled) => {
                    last_error = AppError::Cancelled;
                    break;
                }
                Err(e) => last_error = e,
            }
        }

        remove_partial(&destination).await;
        error!(
            "下载 {} 失败 (共尝试 {} 次): {}",
            request.url, attempts, last_error
        );
        DownloadResult::failed(destination, &last_error, attempts)
    }

    /// 一次完整的尝试: 传输 + 摘要计算 + 可选的校验。
    /// 校验失败会删除文件并作为普通的尝试失败返回。
    async fn attempt(
        &self,
        fetch_request: &FetchRequest,
        request: &DownloadRequest,
    ) -> AppResult<(String, bool)> {
        self.fetcher.fetch(fetch_request).await?;

        let actual = match hasher::hash_file(&request.destination, request.algorithm).await {
            Ok(hash) => hash,
            Err(e) => {
                remove_partial(&request.destination).await;
                return Err(e);
            }
        };

        match &request.expected_hash {
            Some(expected) if hasher::digests_match(&actual, expected) => Ok((actual, true)),
            Some(expected) => {
                warn!(
                    "文件 '{}' 摘要不匹配 (期望 {}, 实际 {})",
                    request.destination.display(),
                    expected,
                    actual
                );
                remove_partial(&request.destination).await;
                Err(AppError::Integrity {
                    expected: expected.to_ascii_lowercase(),
                    actual,
                })
            }
            None => Ok((actual, false)),
        }
    }
}

async fn ensure_parent_dir(destination: &Path) -> AppResult<()> {
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
