// src/lib.rs

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod hasher;
pub mod installer;
pub mod logging;
pub mod models;
pub mod symbols;
pub mod ui;
pub mod utils;
mod workflows;

use crate::{
    catalog::{DriverCatalog, Platform},
    cli::Cli,
    config::AppConfig,
    downloader::Downloader,
    error::{AppError, AppResult},
    installer::{DriverInstaller, SystemExecutor},
};
use log::debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 一次命令行调用的执行上下文
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<DriverCatalog>,
    pub args: Arc<Cli>,
    pub cancellation_token: CancellationToken,
    /// 整个调用共用一个下载器，目标路径锁才能覆盖所有下载
    downloader: Downloader,
}

impl AppContext {
    /// `--platform` 优先，否则使用当前系统
    pub fn platform(&self) -> AppResult<Platform> {
        self.args.platform.or_else(Platform::current).ok_or_else(|| {
            AppError::UserInputError("无法识别当前系统平台，请通过 --platform 指定。".to_string())
        })
    }

    pub fn downloader(&self) -> Downloader {
        self.downloader.clone()
    }

    pub fn installer(&self) -> AppResult<DriverInstaller> {
        let installer = DriverInstaller::new(
            &self.config,
            self.catalog.clone(),
            self.downloader(),
            Arc::new(SystemExecutor),
            self.platform()?,
        )
        .with_cancel_token(self.cancellation_token.clone());
        let installer = if self.args.output.is_some() {
            installer.keep_downloads()
        } else {
            installer
        };
        Ok(if self.args.no_cache {
            installer.without_cache_lookup()
        } else {
            installer
        })
    }
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: CancellationToken) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);

    let config = Arc::new(AppConfig::new(&args)?);
    debug!("加载的应用配置: {:?}", config);

    let catalog = Arc::new(DriverCatalog::builtin().with_extra(config.extra_drivers.clone()));
    let downloader = Downloader::from_config(&config)?;
    let context = AppContext {
        config,
        catalog,
        args: args.clone(),
        cancellation_token,
        downloader,
    };

    if args.list {
        workflows::run_list(&context)?;
    } else if let Some(printer_name) = &args.detect {
        workflows::run_detect(&context, printer_name)?;
    } else if let Some(driver_id) = &args.download {
        workflows::run_download(&context, driver_id).await?;
    } else if let Some(driver_id) = &args.install {
        workflows::run_install(&context, driver_id).await?;
    } else if let Some(url) = &args.url {
        workflows::run_url(&context, url).await?;
    } else if args.cache_info {
        workflows::run_cache_info(&context).await?;
    } else if args.clean_cache {
        workflows::run_clean_cache(&context).await?;
    }

    Ok(())
}
