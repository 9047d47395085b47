// src/cache.rs

use crate::{error::*, hasher::{self, HashAlgorithm}};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    fs,
    io,
    path::{Component, Path, PathBuf},
    time::{Duration, SystemTime},
};

const SECS_PER_DAY: u64 = 24 * 60 * 60;
const INCOMING_PREFIX: &str = ".incoming-";

/// 缓存目录中的一个文件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub removed: usize,
    pub freed_bytes: u64,
}

/// 一次缓存命中: 文件路径和实际摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub path: PathBuf,
    pub digest: String,
}

/// 以文件名为键的扁平目录缓存。没有元数据记录，
/// 有效性在查找时通过重新计算摘要确定。
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 缓存键必须是单个普通路径分量，拒绝分隔符和 `..`
    pub fn path_for(&self, file_name: &str) -> AppResult<PathBuf> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => Ok(self.dir.join(part)),
            _ => Err(AppError::InvalidFileName(file_name.to_string())),
        }
    }

    /// 文件存在且（给定期望摘要时）摘要匹配才返回路径；
    /// 摘要不匹配的文件会被删除。
    pub async fn lookup(
        &self,
        file_name: &str,
        expected_hash: Option<&str>,
        algorithm: HashAlgorithm,
    ) -> Option<PathBuf> {
        let path = self.existing_entry(file_name).await?;
        let Some(expected) = expected_hash else {
            debug!("缓存命中 (无校验信息): '{}'", path.display());
            return Some(path);
        };
        self.verify_entry(path, expected, algorithm)
            .await
            .map(|hit| hit.path)
    }

    /// 与 `lookup` 相同，但命中时总是带回重新计算的摘要（小写十六进制）
    pub async fn lookup_with_digest(
        &self,
        file_name: &str,
        expected_hash: Option<&str>,
        algorithm: HashAlgorithm,
    ) -> Option<CacheHit> {
        let path = self.existing_entry(file_name).await?;
        if let Some(expected) = expected_hash {
            return self.verify_entry(path, expected, algorithm).await;
        }
        match hasher::hash_file(&path, algorithm).await {
            Ok(digest) => {
                debug!("缓存命中 (无校验信息): '{}'", path.display());
                Some(CacheHit { path, digest })
            }
            Err(e) => {
                warn!("读取缓存文件 '{}' 失败: {}", path.display(), e);
                None
            }
        }
    }

    async fn existing_entry(&self, file_name: &str) -> Option<PathBuf> {
        let path = match self.path_for(file_name) {
            Ok(path) => path,
            Err(e) => {
                warn!("缓存查找被拒绝: {}", e);
                return None;
            }
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => {
                debug!("缓存未命中: '{}'", file_name);
                None
            }
        }
    }

    async fn verify_entry(
        &self,
        path: PathBuf,
        expected: &str,
        algorithm: HashAlgorithm,
    ) -> Option<CacheHit> {
        match hasher::hash_file(&path, algorithm).await {
            Ok(actual) if hasher::digests_match(&actual, expected) => {
                info!("缓存命中并校验通过: '{}'", path.display());
                Some(CacheHit { path, digest: actual })
            }
            Ok(actual) => {
                warn!(
                    "缓存文件 '{}' 已损坏 (期望 {}, 实际 {})，将删除",
                    path.display(),
                    expected,
                    actual
                );
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("删除损坏的缓存文件失败: {}", e);
                }
                None
            }
            Err(e) => {
                warn!("读取缓存文件 '{}' 失败: {}", path.display(), e);
                None
            }
        }
    }

    /// 把源文件复制进缓存（先写临时文件再原子替换），源文件保持不动。
    pub async fn store(&self, source: &Path, file_name: &str) -> AppResult<PathBuf> {
        let target = self.path_for(file_name)?;
        let dir = self.dir.clone();
        let source = source.to_path_buf();
        let result = tokio::task::spawn_blocking(move || -> AppResult<PathBuf> {
            fs::create_dir_all(&dir)?;
            let mut temp = tempfile::Builder::new()
                .prefix(INCOMING_PREFIX)
                .tempfile_in(&dir)?;
            let mut reader = fs::File::open(&source)?;
            io::copy(&mut reader, temp.as_file_mut())?;
            temp.as_file().sync_all()?;
            temp.persist(&target)?;
            Ok(target)
        })
        .await
        .map_err(|e| AppError::Other(anyhow::anyhow!("缓存写入任务异常退出: {}", e)))?;

        if let Ok(path) = &result {
            info!("已缓存 '{}'", path.display());
        }
        result
    }

    /// 删除修改时间早于保留期的文件。单个文件的错误会被忽略，
    /// 缓存目录不存在不算错误。
    pub async fn sweep(&self, retention_days: u64) -> SweepReport {
        let dir = self.dir.clone();
        let retention = Duration::from_secs(retention_days.saturating_mul(SECS_PER_DAY));
        let report = tokio::task::spawn_blocking(move || sweep_blocking(&dir, retention))
            .await
            .unwrap_or_else(|e| {
                warn!("缓存清理任务异常退出: {}", e);
                SweepReport::default()
            });
        if report.removed > 0 {
            info!(
                "缓存清理完成: 删除 {} 个文件，释放 {} 字节",
                report.removed, report.freed_bytes
            );
        }
        report
    }

    /// 列出缓存中的文件，按文件名排序
    pub async fn entries(&self) -> AppResult<Vec<CachedFile>> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().to_string();
            // 写入中的临时文件不算缓存条目
            if !meta.is_file() || name.starts_with(INCOMING_PREFIX) {
                continue;
            }
            entries.push(CachedFile {
                name,
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Local>::from),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// 删除全部缓存文件，返回删除数量
    pub async fn clear(&self) -> AppResult<usize> {
        let mut removed = 0;
        for entry in self.entries().await? {
            tokio::fs::remove_file(&entry.path).await?;
            removed += 1;
        }
        info!("已清空缓存目录 '{}' ({} 个文件)", self.dir.display(), removed);
        Ok(removed)
    }
}

fn sweep_blocking(dir: &Path, retention: Duration) -> SweepReport {
    let mut report = SweepReport::default();
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("无法读取缓存目录 '{}': {}", dir.display(), e);
            }
            return report;
        }
    };
    let now = SystemTime::now();
    for entry in read_dir.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        // 修改时间在未来时 duration_since 失败，视为新文件
        let is_expired = now
            .duration_since(modified)
            .is_ok_and(|age| age > retention);
        if !is_expired {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("清理过期缓存 '{}'", entry.path().display());
                report.removed += 1;
                report.freed_bytes += meta.len();
            }
            Err(e) => warn!("清理缓存文件 '{}' 失败: {}", entry.path().display(), e),
        }
    }
    report
}
