// src/downloader/lock.rs

use dashmap::DashMap;
use log::debug;
use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

/// 以目标路径为键的异步互斥表，同一路径上的下载串行执行。
/// 只在共享同一张表（同一个 `Downloader` 及其克隆）的调用之间生效。
#[derive(Clone, Default)]
pub struct DestinationLocks {
    locks: Arc<DashMap<PathBuf, Arc<TokioMutex<()>>>>,
}

pub struct DestinationGuard {
    key: PathBuf,
    locks: Arc<DashMap<PathBuf, Arc<TokioMutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, destination: &Path) -> DestinationGuard {
        let key = lock_key(destination);
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone();
        if mutex.try_lock().is_err() {
            debug!("目标路径 '{}' 正在被其他下载占用，等待中", key.display());
        }
        let guard = mutex.lock_owned().await;
        DestinationGuard {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// 当前仍登记在表中的路径数量
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// 同一文件的不同写法（相对路径、`..`、符号链接目录）映射到同一个键
fn lock_key(destination: &Path) -> PathBuf {
    let absolute =
        std::path::absolute(destination).unwrap_or_else(|_| destination.to_path_buf());
    let mut key = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                key.pop();
            }
            other => key.push(other),
        }
    }
    if let (Some(parent), Some(name)) = (key.parent(), key.file_name())
        && let Ok(real_parent) = dunce::canonicalize(parent)
    {
        return real_parent.join(name);
    }
    key
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // 只有表本身持有该锁时才清理条目
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_is_serialised() {
        let locks = DestinationLocks::new();
        let path = Path::new("/tmp/same.bin");

        let first = locks.acquire(path).await;
        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire(Path::new("/tmp/same.bin")).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "第二个下载应当等待第一个释放锁");
        drop(first);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_equivalent_spellings_share_one_lock() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let plain = dir.path().join("same.bin");
        let dotted = dir.path().join("sub").join("..").join(".").join("same.bin");
        let locks = DestinationLocks::new();

        let first = locks.acquire(&plain).await;
        assert_eq!(locks.len(), 1);
        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire(&dotted).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "等价路径应当共用同一把锁");
        assert_eq!(locks.len(), 1);
        drop(first);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_paths_do_not_block() {
        let locks = DestinationLocks::new();
        let _a = locks.acquire(Path::new("/tmp/a.bin")).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(200),
            locks.acquire(Path::new("/tmp/b.bin")),
        )
        .await
        .expect("不同路径不应互相阻塞");
        assert_eq!(locks.len(), 2);
    }
}
