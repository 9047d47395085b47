// src/logging.rs

use crate::{cli::LogLevel, config::file::get_config_dir, constants};
use std::{
    env,
    fs::{self, File},
    path::{Path, PathBuf},
};

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn log_file_path() -> PathBuf {
    match get_config_dir() {
        Ok(dir) => dir.join(constants::LOG_FILE_NAME),
        Err(_) => {
            eprintln!("警告: 无法定位配置目录，日志改写到临时目录。");
            env::temp_dir()
                .join(clap::crate_name!())
                .join(constants::LOG_FILE_NAME)
        }
    }
}

/// 打开主日志文件，失败时退回临时目录下的备用文件
fn open_log_file(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent()
        && let Err(e) = fs::create_dir_all(dir)
    {
        eprintln!("警告: 创建日志目录 {:?} 失败: {}", dir, e);
    }
    let primary_err = match fern::log_file(path) {
        Ok(file) => return Some(file),
        Err(e) => e,
    };

    let fallback = env::temp_dir().join(format!(
        "{}-{}",
        clap::crate_name!(),
        constants::LOG_FALLBACK_FILE_NAME
    ));
    eprintln!(
        "警告: 日志文件 {:?} 不可写 ({})，改用 {:?}",
        path, primary_err, fallback
    );
    match fern::log_file(&fallback) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("错误: 备用日志文件 {:?} 也无法打开: {}，本次运行不记录日志。", fallback, e);
            None
        }
    }
}

/// 初始化文件日志。日志只写文件，不干扰终端上的进度条。
pub fn init_logger(level: LogLevel) {
    if level == LogLevel::Off {
        return;
    }
    let Some(file) = open_log_file(&log_file_path()) else {
        return;
    };

    let result = fern::Dispatch::new()
        .level(level.into())
        // 依赖库只保留警告以上
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("rustls", log::LevelFilter::Warn)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                message
            ))
        })
        .chain(file)
        .apply();

    if let Err(e) = result {
        eprintln!("警告: 日志系统初始化失败: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_maps_to_filter() {
        assert_eq!(log::LevelFilter::from(LogLevel::Off), log::LevelFilter::Off);
        assert_eq!(log::LevelFilter::from(LogLevel::Debug), log::LevelFilter::Debug);
    }
}
