// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const FILENAME_TRUNCATE_LENGTH: usize = 48;
pub const MAX_FILENAME_BYTES: usize = 200;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DATA_DIR_NAME: &str = clap::crate_name!();
pub const USER_AGENT: &str = concat!(clap::crate_name!(), "/", clap::crate_version!());

/// `<user-data>/drivers/printers/cache`
pub const CACHE_SUBDIR: [&str; 3] = ["drivers", "printers", "cache"];
pub const DOWNLOAD_SUBDIR: [&str; 3] = ["drivers", "printers", "downloads"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETENTION_DAYS: u64 = 30;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

pub const HASH_BUFFER_SIZE: usize = 8192;

/// 安装命令参数中代表已下载安装包路径的占位符
pub const FILE_PLACEHOLDER: &str = "{file}";
