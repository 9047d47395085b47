// src/ui.rs

use crate::{
    constants, downloader::ProgressSink, installer::DriverProgressSink, models::DownloadProgress,
    symbols,
};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    io::{self, Write},
    time::Duration,
};

pub fn print_header(title: &str) {
    println!("\n{}", "═".repeat(constants::UI_WIDTH));
    println!(" {}", title.cyan().bold());
    println!("{}", "═".repeat(constants::UI_WIDTH));
}

pub fn print_sub_header(title: &str) {
    println!("\n--- {} ---", title.bold());
}

pub fn box_message(title: &str, content: &[&str], color_func: fn(ColoredString) -> ColoredString) {
    println!("\n┌{}┐", "─".repeat(constants::UI_WIDTH - 2));
    println!("  {}", color_func(title.bold()));
    println!("├{}┤", "─".repeat(constants::UI_WIDTH - 2));
    for line in content {
        println!("  {}", line);
    }
    println!("└{}┘", "─".repeat(constants::UI_WIDTH - 2));
}

pub fn plain(message: &str) {
    println!("{}", message);
}

pub fn info(message: &str) {
    println!("{} {}", *symbols::INFO, message);
}

pub fn success(message: &str) {
    println!("{} {}", *symbols::OK, message.green());
}

pub fn warn(message: &str) {
    eprintln!("{} {}", *symbols::WARN, message.yellow());
}

pub fn prompt(message: &str, default: Option<&str>) -> io::Result<String> {
    let default_str = default.map_or("".to_string(), |d| format!(" (默认: {})", d));
    print!("\n>>> {}{}: ", message, default_str);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();
    if input.is_empty() {
        Ok(default.unwrap_or("").to_string())
    } else {
        Ok(input)
    }
}

pub fn confirm(question: &str, default_yes: bool) -> bool {
    let options = if default_yes { "(Y/n)" } else { "(y/N)" };
    loop {
        match prompt(
            &format!("{} {} (按 {} 取消)", question, options, *symbols::CTRL_C),
            None,
        ) {
            Ok(choice) => {
                let choice = choice.to_lowercase();
                if choice == "y" {
                    return true;
                }
                if choice == "n" {
                    return false;
                }
                if choice.is_empty() {
                    return default_yes;
                }
                println!("{}", "无效输入，请输入 'y' 或 'n'。".red());
            }
            Err(_) => return false,
        }
    }
}

/// 字节数的人类可读形式
pub fn format_bytes(bytes: u64) -> String {
    indicatif::HumanBytes(bytes).to_string()
}

/// 终端进度条，作为下载进度的接收端
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new(label: &str) -> Self {
        let style = ProgressStyle::with_template(
            "{prefix:.bold.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>10}/{total_bytes:10} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix(crate::utils::truncate_text(label, constants::FILENAME_TRUNCATE_LENGTH));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn update(&self, progress: &DownloadProgress) {
        self.bar.set_length(progress.total_bytes);
        self.bar.set_position(progress.received_bytes);
        self.bar
            .set_message(format!("{}/s", format_bytes(progress.speed as u64)));
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&self, progress: &DownloadProgress) {
        self.update(progress);
    }
}

impl DriverProgressSink for TerminalProgress {
    fn on_driver_progress(&self, _driver_id: &str, progress: &DownloadProgress) {
        self.update(progress);
    }
}
