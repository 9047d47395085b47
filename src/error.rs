// src/error.rs

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("HTTP 错误: {status} {reason}")]
    HttpStatus { status: u16, reason: String },
    #[error("下载超时 (超过 {}ms 未完成)", .0.as_millis())]
    Timeout(Duration),
    #[error("下载已取消")]
    Cancelled,
    #[error("重定向失败: {0}")]
    Redirect(String),
    #[error("文件校验失败 (期望: {expected}, 实际: {actual})")]
    Integrity { expected: String, actual: String },
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("未知的驱动 ID: '{0}'")]
    UnknownDriver(String),
    #[error("驱动 '{driver}' 不支持平台 {platform}")]
    UnsupportedPlatform { driver: String, platform: String },
    #[error("非法的缓存文件名: '{0}'")]
    InvalidFileName(String),
    #[error("命令 '{program}' 执行失败: {message}")]
    Command { program: String, message: String },
    #[error("驱动 '{driver}' 下载失败: {message}")]
    DownloadFailed { driver: String, message: String },
    #[error("{0}")] // 只打印内部信息，不加任何前缀
    UserInputError(String),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;
