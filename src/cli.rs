// src/cli.rs

use crate::{catalog::Platform, hasher::HashAlgorithm};
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// command 属性
#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about = "POS 小票/标签打印机驱动的下载、缓存与安装工具",
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
#[command(group(
    clap::ArgGroup::new("mode")
        .required(true)
        .args(&["list", "detect", "download", "install", "url", "cache_info", "clean_cache"]),
))]
pub struct Cli {
    // --- 运行模式 (Mode) ---
    /// 列出驱动目录中的所有驱动
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub list: bool,
    /// 根据打印机名称推荐驱动
    #[arg(long, value_name = "PRINTER_NAME", help_heading = "Mode")]
    pub detect: Option<String>,
    /// 下载（或从缓存取出）指定驱动的安装包
    #[arg(long, value_name = "DRIVER_ID", help_heading = "Mode")]
    pub download: Option<String>,
    /// 下载并安装指定驱动
    #[arg(long, value_name = "DRIVER_ID", help_heading = "Mode")]
    pub install: Option<String>,
    /// 直接下载任意链接 (可配合 --hash 校验)
    #[arg(long, help_heading = "Mode")]
    pub url: Option<String>,
    /// 显示缓存目录中的文件
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub cache_info: bool,
    /// 清理超过保留期限的缓存文件 (保留天数为 0 时清空缓存)
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub clean_cache: bool,

    // --- 下载选项 (Options) ---
    /// 目标平台，默认为当前系统
    #[arg(long, value_enum, help_heading = "Options")]
    pub platform: Option<Platform>,
    /// [URL模式] 期望的文件摘要 (十六进制，忽略大小写)
    #[arg(
        long,
        requires = "url",
        conflicts_with_all = ["list", "detect", "download", "install", "cache_info", "clean_cache"],
        help_heading = "Options"
    )]
    pub hash: Option<String>,
    /// [URL模式] 摘要算法: 'sha256' 或 'md5'
    #[arg(long, default_value_t = HashAlgorithm::Sha256, help_heading = "Options")]
    pub algorithm: HashAlgorithm,
    /// 设置安装包保存目录
    #[arg(short, long, value_name = "DIR", help_heading = "Options")]
    pub output: Option<PathBuf>,
    /// 失败后的最大重试次数
    #[arg(long, help_heading = "Options")]
    pub retries: Option<u32>,
    /// 单次下载尝试的总超时 (秒)
    #[arg(long, value_name = "SECS", help_heading = "Options")]
    pub timeout: Option<u64>,
    /// 缓存保留天数
    #[arg(long, value_name = "DAYS", help_heading = "Options")]
    pub retention_days: Option<u64>,
    /// 以 JSON 格式输出结果
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub json: bool,
    /// 跳过所有确认提示
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub yes: bool,
    /// 不使用缓存，总是重新下载
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub no_cache: bool,

    // --- 通用选项 (General) ---
    /// 指定配置文件路径
    #[arg(long, value_name = "FILE", help_heading = "General")]
    pub config: Option<PathBuf>,
    /// 指定数据目录 (缓存与下载目录位于其下)
    #[arg(long, value_name = "DIR", help_heading = "General")]
    pub data_dir: Option<PathBuf>,
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}
