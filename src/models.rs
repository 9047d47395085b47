// src/models.rs

use crate::{
    constants, downloader::progress::ProgressSink, error::AppError, hasher::HashAlgorithm, symbols,
};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// 单次传输过程中的进度快照。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub received_bytes: u64,
    /// 响应未声明长度时等于已接收字节数
    pub total_bytes: u64,
    /// 0..=100，总长度未知时为 0
    pub percentage: f64,
    /// 字节/秒，按距上一次快照的间隔计算
    pub speed: f64,
}

/// 一次下载调用的输入，构造后不再修改。
#[derive(Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub expected_hash: Option<String>,
    pub algorithm: HashAlgorithm,
    pub progress: Option<Arc<dyn ProgressSink>>,
    pub timeout: Duration,
    pub retries: u32,
    pub cancel: CancellationToken,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            expected_hash: None,
            algorithm: HashAlgorithm::default(),
            progress: None,
            timeout: Duration::from_secs(constants::DEFAULT_TIMEOUT_SECS),
            retries: constants::DEFAULT_RETRIES,
            cancel: CancellationToken::new(),
        }
    }

    pub fn expected_hash(mut self, hash: Option<impl Into<String>>, algorithm: HashAlgorithm) -> Self {
        self.expected_hash = hash.map(Into::into);
        self.algorithm = algorithm;
        self
    }

    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

impl fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("url", &self.url)
            .field("destination", &self.destination)
            .field("expected_hash", &self.expected_hash)
            .field("algorithm", &self.algorithm)
            .field("has_progress", &self.progress.is_some())
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

/// 按错误类别对失败进行分类，用于日志和终端报告。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    NetworkError,
    HttpStatusError,
    TimeoutError,
    IntegrityError,
    FilesystemError,
    Cancelled,
    UnexpectedError,
}

impl FailureKind {
    pub fn get_display_info(
        &self,
    ) -> (
        &'static ColoredString,
        fn(ColoredString) -> ColoredString,
        &'static str,
    ) {
        match self {
            FailureKind::NetworkError => (&symbols::ERROR, |s| s.red(), "网络请求失败"),
            FailureKind::HttpStatusError => (&symbols::ERROR, |s| s.red(), "服务器返回错误"),
            FailureKind::TimeoutError => (&symbols::WARN, |s| s.yellow(), "下载超时"),
            FailureKind::IntegrityError => (&symbols::ERROR, |s| s.red(), "校验失败 (摘要不匹配)"),
            FailureKind::FilesystemError => (&symbols::ERROR, |s| s.red(), "本地文件读写错误"),
            FailureKind::Cancelled => (&symbols::WARN, |s| s.yellow(), "用户取消"),
            FailureKind::UnexpectedError => {
                (&symbols::ERROR, |s| s.red(), "发生未预期的程序错误")
            }
        }
    }
}

impl From<&AppError> for FailureKind {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::Network(err)
            | AppError::NetworkMiddleware(reqwest_middleware::Error::Reqwest(err)) => {
                if err.is_timeout() {
                    FailureKind::TimeoutError
                } else if err.is_status() {
                    FailureKind::HttpStatusError
                } else {
                    FailureKind::NetworkError
                }
            }
            AppError::NetworkMiddleware(_) | AppError::Redirect(_) | AppError::Url(_) => {
                FailureKind::NetworkError
            }
            AppError::HttpStatus { .. } => FailureKind::HttpStatusError,
            AppError::Timeout(_) => FailureKind::TimeoutError,
            AppError::Cancelled => FailureKind::Cancelled,
            AppError::Integrity { .. } => FailureKind::IntegrityError,
            AppError::Io(_) | AppError::TempFilePersist(_) | AppError::InvalidFileName(_) => {
                FailureKind::FilesystemError
            }
            _ => FailureKind::UnexpectedError,
        }
    }
}

/// 一次下载调用的最终结果。所有失败都通过字段表达，不会以错误形式抛出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub success: bool,
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// 仅当提供了期望摘要且匹配时为 true
    #[serde(default)]
    pub verified: bool,
    pub attempts: u32,
}

impl DownloadResult {
    pub fn succeeded(file_path: PathBuf, hash: String, verified: bool, attempts: u32) -> Self {
        Self {
            success: true,
            file_path,
            error: None,
            failure: None,
            hash: Some(hash),
            verified,
            attempts,
        }
    }

    pub fn failed(file_path: PathBuf, error: &AppError, attempts: u32) -> Self {
        Self {
            success: false,
            file_path,
            error: Some(error.to_string()),
            failure: Some(FailureKind::from(error)),
            hash: None,
            verified: false,
            attempts,
        }
    }
}
