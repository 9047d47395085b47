// src/downloader/fetcher.rs

use super::progress::{ProgressMeter, ProgressSink};
use crate::{client::HttpClient, constants, error::*};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::{StatusCode, header};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;

/// 单次传输（一个 attempt）的参数
#[derive(Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub destination: PathBuf,
    pub timeout: Duration,
    pub progress: Option<Arc<dyn ProgressSink>>,
    pub cancel: CancellationToken,
}

/// 把一个 URL 的响应体完整写入目标文件。
/// 任何失败返回前都必须已删除目标路径上的残留文件。
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 成功时返回写入的字节数
    async fn fetch(&self, request: &FetchRequest) -> AppResult<u64>;
}

/// 基于 reqwest 的实现，自行跟随重定向。
pub struct HttpFetcher {
    client: HttpClient,
    max_redirects: usize,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            max_redirects: constants::DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    async fn fetch_following_redirects(
        &self,
        request: &FetchRequest,
        started: Instant,
    ) -> AppResult<u64> {
        let mut url = request.url.clone();
        for hop in 0..=self.max_redirects {
            let response = self.client.get(url.clone()).await?;
            let status = response.status();

            if is_redirect(status) {
                remove_partial(&request.destination).await;
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        AppError::Redirect(format!("{} 响应缺少 Location 头 ({})", status.as_u16(), url))
                    })?;
                let next = url.join(location)?;
                info!("重定向 #{}: {} -> {}", hop + 1, url, next);
                url = next;
                continue;
            }

            // 只接受 2xx，其余 3xx (300/304/305) 与错误码一样视为失败
            if !status.is_success() {
                return Err(AppError::HttpStatus {
                    status: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                });
            }

            return self
                .stream_to_file(response, &request.destination, request.progress.as_deref(), started)
                .await;
        }
        Err(AppError::Redirect(format!(
            "重定向次数超过上限 ({})",
            self.max_redirects
        )))
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        destination: &Path,
        progress: Option<&dyn ProgressSink>,
        started: Instant,
    ) -> AppResult<u64> {
        let mut meter = ProgressMeter::new(response.content_length(), started);
        let mut file = fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk).await?;
            let snapshot = meter.advance(chunk.len() as u64, Instant::now());
            if let Some(sink) = progress {
                sink.on_progress(&snapshot);
            }
        }
        file.flush().await?;
        file.sync_all().await?;
        debug!(
            "已写入 {} 字节到 '{}'",
            meter.received(),
            destination.display()
        );
        Ok(meter.received())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> AppResult<u64> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::from_std(started) + request.timeout;
        debug!("开始传输 {} -> '{}'", request.url, request.destination.display());

        // 超时从请求开始计算，覆盖所有重定向和完整的响应体，收到数据不会刷新
        let result = tokio::select! {
            r = self.fetch_following_redirects(request, started) => r,
            _ = tokio::time::sleep_until(deadline) => Err(AppError::Timeout(request.timeout)),
            _ = request.cancel.cancelled() => Err(AppError::Cancelled),
        };

        if let Err(e) = &result {
            warn!("传输 {} 失败: {}", request.url, e);
            remove_partial(&request.destination).await;
        }
        result
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// 删除目标路径上的残留文件，文件不存在不算错误
pub(crate) async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("已删除残留文件 '{}'", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("删除残留文件 '{}' 失败: {}", path.display(), e),
    }
}
