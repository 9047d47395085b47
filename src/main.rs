// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use pos_drivers::{cli::Cli, error::AppError, logging, run_from_cli};
use std::{env, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持。
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| "pos-drivers".to_string());
    let after_help = format!(
        "示例:\n  # 查看支持的驱动\n  {bin} --list\n\n  # 根据打印机名称推荐驱动\n  {bin} --detect \"EPSON TM-T20III Receipt\"\n\n  # 下载并安装驱动\n  {bin} --install epson-tm-t20iii\n\n  # 下载任意安装包并校验摘要\n  {bin} --url \"https://...\" --hash <SHA256>",
        bin = bin_name
    );

    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };

    logging::init_logger(args.log_level);

    // 第一次 Ctrl+C 取消正在进行的下载；若程序仍未退出（例如阻塞在输入提示上），稍后强制退出
    let cancellation_token = CancellationToken::new();
    let token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} 用户中断，正在取消...", "[!]".yellow());
            token.cancel();
            tokio::time::sleep(Duration::from_secs(2)).await;
            std::process::exit(130);
        }
    });

    match run_from_cli(args, cancellation_token).await {
        Ok(()) => {}
        Err(AppError::Cancelled) => {
            eprintln!("\n{} {}", "[!]".yellow(), "操作已取消。".yellow());
            std::process::exit(130);
        }
        Err(e) => {
            log::error!("程序执行出错: {}", e);
            eprintln!("\n{} {}", "[X]".red(), format!("程序执行出错: {}", e).red());
            std::process::exit(1);
        }
    }
}
