// src/downloader/progress.rs

use crate::models::DownloadProgress;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// 进度事件的接收端。传输循环中同步调用，实现方不应阻塞。
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &DownloadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&DownloadProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &DownloadProgress) {
        self(progress)
    }
}

/// 通过无界通道转发，调用方以流的方式消费进度；接收端关闭后静默丢弃。
impl ProgressSink for UnboundedSender<DownloadProgress> {
    fn on_progress(&self, progress: &DownloadProgress) {
        let _ = self.send(*progress);
    }
}

/// 根据已接收字节数生成进度快照，速率以上一次快照为基准。
/// 第一次快照以请求开始时刻、0 字节为基准。
pub(crate) struct ProgressMeter {
    total: Option<u64>,
    received: u64,
    last_bytes: u64,
    last_instant: Instant,
}

impl ProgressMeter {
    pub(crate) fn new(total: Option<u64>, started: Instant) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            received: 0,
            last_bytes: 0,
            last_instant: started,
        }
    }

    pub(crate) fn received(&self) -> u64 {
        self.received
    }

    pub(crate) fn advance(&mut self, chunk_len: u64, now: Instant) -> DownloadProgress {
        self.received += chunk_len;
        let elapsed = now.saturating_duration_since(self.last_instant).as_secs_f64();
        let delta = self.received - self.last_bytes;
        let speed = if elapsed > 0.0 { delta as f64 / elapsed } else { 0.0 };
        self.last_bytes = self.received;
        self.last_instant = now;

        let (total_bytes, percentage) = match self.total {
            Some(total) => (
                total,
                (self.received as f64 / total as f64 * 100.0).min(100.0),
            ),
            None => (self.received, 0.0),
        };
        DownloadProgress {
            received_bytes: self.received,
            total_bytes,
            percentage,
            speed,
        }
    }
}
