// src/workflows.rs

use crate::{
    AppContext,
    cache::CacheStore,
    catalog::{self, DriverDescriptor},
    error::{AppError, AppResult},
    installer::{DriverInstaller, DriverProgressSink},
    models::{DownloadRequest, FailureKind},
    symbols, ui, utils,
};
use colored::*;
use itertools::Itertools;
use log::{info, warn};
use serde_json::json;
use std::{path::Path, sync::Arc};

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display_path(path: &Path) -> String {
    dunce::simplified(path).display().to_string()
}

fn describe_driver(d: &DriverDescriptor) -> String {
    let platforms = d.packages.platforms().iter().map(|p| p.as_str()).join(", ");
    format!(
        "{:<22} {:<18} {} [{}]",
        d.id.yellow(),
        d.model,
        d.driver_name.dimmed(),
        platforms
    )
}

/// 列出驱动目录 (--list)
pub(crate) fn run_list(context: &AppContext) -> AppResult<()> {
    let drivers: Vec<&DriverDescriptor> = match context.args.platform {
        Some(platform) => context.catalog.for_platform(platform),
        None => context.catalog.all().iter().collect(),
    };
    if context.args.json {
        return print_json(&drivers);
    }

    let title = match context.args.platform {
        Some(platform) => format!("驱动目录 (平台: {})", platform),
        None => "驱动目录".to_string(),
    };
    ui::print_header(&title);
    let groups = drivers.into_iter().into_group_map_by(|d| d.brand);
    for (brand, mut group) in groups.into_iter().sorted_by_key(|(brand, _)| *brand) {
        group.sort_by(|a, b| a.model.cmp(&b.model));
        ui::print_sub_header(brand.display_name());
        for d in group {
            ui::plain(&format!("  {}", describe_driver(d)));
        }
    }
    Ok(())
}

/// 根据打印机名称推荐驱动 (--detect)
pub(crate) fn run_detect(context: &AppContext, printer_name: &str) -> AppResult<()> {
    let brand = catalog::detect_brand(printer_name);
    let suggestions = context.catalog.suggest_for_printer(printer_name);
    info!(
        "打印机 '{}' 识别品牌: {:?}, 候选驱动 {} 个",
        printer_name,
        brand,
        suggestions.len()
    );

    if context.args.json {
        return print_json(&json!({
            "printer": printer_name,
            "brand": brand,
            "drivers": suggestions.iter().map(|d| &d.id).collect::<Vec<_>>(),
        }));
    }

    let Some(brand) = brand else {
        ui::warn(&format!("无法识别打印机 '{}' 的品牌。", printer_name));
        return Ok(());
    };
    ui::print_header(&format!("{} → {}", printer_name, brand.display_name()));
    for (i, d) in suggestions.iter().enumerate() {
        let marker = if i == 0 { "*".green() } else { " ".normal() };
        ui::plain(&format!("{} {}", marker, describe_driver(d)));
    }
    Ok(())
}

/// 尽力清理过期缓存，不影响后续流程
async fn sweep_expired(cache: &CacheStore, retention_days: u64) {
    let report = cache.sweep(retention_days).await;
    if report.removed > 0 {
        info!(
            "已清理 {} 个过期缓存文件，释放 {}",
            report.removed,
            ui::format_bytes(report.freed_bytes)
        );
    }
}

fn progress_for(context: &AppContext, label: &str) -> Option<Arc<ui::TerminalProgress>> {
    (!context.args.json).then(|| Arc::new(ui::TerminalProgress::new(label)))
}

async fn fetch_driver(
    context: &AppContext,
    installer: &DriverInstaller,
    driver_id: &str,
) -> AppResult<crate::installer::DriverDownload> {
    let package = installer.resolve(driver_id)?;
    if !context.args.json {
        ui::print_sub_header(&format!(
            "获取驱动 {} ({})",
            driver_id,
            installer.platform()
        ));
    }
    let progress = progress_for(context, &package.file_name);
    let sink = progress
        .clone()
        .map(|p| p as Arc<dyn DriverProgressSink>);
    let result = installer.download_driver(driver_id, sink).await;
    if let Some(progress) = &progress {
        progress.finish();
    }
    result
}

/// 下载或从缓存取出驱动安装包 (--download)
pub(crate) async fn run_download(context: &AppContext, driver_id: &str) -> AppResult<()> {
    let installer = context.installer()?;
    sweep_expired(installer.cache(), context.config.retention_days).await;

    let download = fetch_driver(context, &installer, driver_id).await?;
    if context.args.json {
        return print_json(&download);
    }

    if download.from_cache {
        ui::plain(&format!("{} 驱动 '{}' 已就绪 (来源: 缓存)", *symbols::CACHED, driver_id));
    } else {
        ui::success(&format!("驱动 '{}' 已就绪 (来源: 网络)", driver_id));
    }
    ui::plain(&format!("    文件: {}", display_path(&download.path)));
    if let Some(hash) = &download.hash {
        let verified = if download.verified {
            "已校验".green()
        } else {
            "未提供期望摘要".yellow()
        };
        ui::plain(&format!("    摘要: {} ({})", hash, verified));
    }
    Ok(())
}

/// 下载并安装驱动 (--install)
pub(crate) async fn run_install(context: &AppContext, driver_id: &str) -> AppResult<()> {
    let installer = context.installer()?;
    let package = installer.resolve(driver_id)?;

    let already_installed = match installer.is_installed(driver_id).await {
        Ok(state) => state,
        Err(e) => {
            warn!("驱动 '{}' 安装检测失败: {}", driver_id, e);
            None
        }
    };
    if !context.args.yes && !context.args.json {
        if already_installed == Some(true)
            && !ui::confirm(&format!("驱动 '{}' 似乎已安装，是否重新安装?", driver_id), false)
        {
            ui::info("已跳过安装。");
            return Ok(());
        }
        let command_line = package.install.to_string();
        ui::box_message("即将执行安装命令", &[command_line.as_str()], |s| s.cyan());
        if !ui::confirm("是否继续?", true) {
            ui::info("已取消安装。");
            return Ok(());
        }
    }

    sweep_expired(installer.cache(), context.config.retention_days).await;
    let download = fetch_driver(context, &installer, driver_id).await?;
    if !context.args.json {
        ui::info(&format!("正在安装 '{}'...", display_path(&download.path)));
    }
    let outcome = installer.install_downloaded(&download).await?;

    if context.args.json {
        return print_json(&json!({
            "driverId": outcome.driver_id,
            "installerPath": outcome.installer_path,
            "command": outcome.command.to_string(),
            "exitCode": outcome.output.code,
            "installed": outcome.installed,
            "status": installer.status(driver_id),
        }));
    }

    match outcome.installed {
        Some(false) => ui::warn(&format!(
            "安装命令已完成，但未检测到驱动 '{}'，可能需要重启或手动确认。",
            driver_id
        )),
        _ => ui::success(&format!("驱动 '{}' 安装完成。", driver_id)),
    }
    Ok(())
}

/// 直接下载任意链接 (--url)
pub(crate) async fn run_url(context: &AppContext, url: &str) -> AppResult<()> {
    let file_name = utils::file_name_from_url(url)?;
    let destination = context.config.download_dir.join(&file_name);

    let mut request = DownloadRequest::new(url, &destination)
        .expected_hash(context.args.hash.clone(), context.args.algorithm)
        .timeout(context.config.timeout)
        .retries(context.config.retries)
        .cancel_token(context.cancellation_token.clone());
    let progress = progress_for(context, &file_name);
    if let Some(progress) = &progress {
        request = request.progress(progress.clone());
    }

    let result = context.downloader().download(request).await;
    if let Some(progress) = &progress {
        progress.finish();
    }

    if context.args.json {
        print_json(&result)?;
    } else if result.success {
        ui::success(&format!("已保存到 '{}'", display_path(&result.file_path)));
        if let Some(hash) = &result.hash {
            let suffix = if result.verified { " (已校验)" } else { "" };
            ui::plain(&format!("    {}: {}{}", context.args.algorithm, hash, suffix));
        }
    } else if let Some(kind) = result.failure {
        let (symbol, color, text) = kind.get_display_info();
        eprintln!(
            "{} {} ({} 次尝试)",
            symbol,
            color(text.into()),
            result.attempts
        );
    }

    match (result.success, result.failure) {
        (true, _) => Ok(()),
        (false, Some(FailureKind::Cancelled)) => Err(AppError::Cancelled),
        (false, _) => Err(AppError::DownloadFailed {
            driver: file_name,
            message: result.error.unwrap_or_default(),
        }),
    }
}

/// 显示缓存内容 (--cache-info)
pub(crate) async fn run_cache_info(context: &AppContext) -> AppResult<()> {
    let cache = CacheStore::new(context.config.cache_dir.clone());
    let entries = cache.entries().await?;
    if context.args.json {
        return print_json(&json!({
            "dir": cache.dir(),
            "retentionDays": context.config.retention_days,
            "files": entries,
        }));
    }

    ui::print_header(&format!("缓存目录: {}", display_path(cache.dir())));
    if entries.is_empty() {
        ui::info("缓存为空。");
        return Ok(());
    }
    for entry in &entries {
        let modified = entry
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        ui::plain(&format!(
            "  {:<48} {:>10}  {}",
            utils::truncate_text(&entry.name, 48),
            ui::format_bytes(entry.size),
            modified
        ));
    }
    let total: u64 = entries.iter().map(|e| e.size).sum();
    ui::plain(&format!(
        "\n共 {} 个文件，{}；保留期限 {} 天。",
        entries.len(),
        ui::format_bytes(total),
        context.config.retention_days
    ));
    Ok(())
}

/// 清理缓存 (--clean-cache)
pub(crate) async fn run_clean_cache(context: &AppContext) -> AppResult<()> {
    let cache = CacheStore::new(context.config.cache_dir.clone());
    let retention_days = context.config.retention_days;

    if retention_days == 0 {
        if !context.args.yes
            && !context.args.json
            && !ui::confirm(&format!("将清空缓存目录 '{}'，是否继续?", display_path(cache.dir())), false)
        {
            ui::info("已取消。");
            return Ok(());
        }
        let removed = cache.clear().await?;
        if context.args.json {
            return print_json(&json!({ "removed": removed }));
        }
        ui::success(&format!("已清空缓存，删除 {} 个文件。", removed));
        return Ok(());
    }

    let report = cache.sweep(retention_days).await;
    if context.args.json {
        return print_json(&report);
    }
    if report.removed == 0 {
        ui::info(&format!("没有超过 {} 天的缓存文件。", retention_days));
    } else {
        ui::success(&format!(
            "已删除 {} 个超过 {} 天的缓存文件，释放 {}。",
            report.removed,
            retention_days,
            ui::format_bytes(report.freed_bytes)
        ));
    }
    println!("{} 缓存目录: {}", *symbols::INFO, display_path(cache.dir()));
    Ok(())
}
