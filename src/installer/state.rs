// src/installer/state.rs

use crate::models::DownloadProgress;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum InstallStatus {
    Downloading { progress: DownloadProgress },
    Cached,
    Downloaded,
    Installing,
    Installed,
    Failed { message: String },
}

/// 安装层持有的可变状态: 每个驱动的当前进度/阶段，以及已安装检测的结果。
#[derive(Clone, Default)]
pub struct InstallState {
    statuses: Arc<DashMap<String, InstallStatus>>,
    installed_checks: Arc<DashMap<String, bool>>,
}

impl InstallState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, driver_id: &str, status: InstallStatus) {
        self.statuses.insert(driver_id.to_string(), status);
    }

    pub fn status(&self, driver_id: &str) -> Option<InstallStatus> {
        self.statuses.get(driver_id).map(|s| s.clone())
    }

    pub fn record_progress(&self, driver_id: &str, progress: DownloadProgress) {
        self.set(driver_id, InstallStatus::Downloading { progress });
    }

    pub fn installed_check(&self, driver_id: &str) -> Option<bool> {
        self.installed_checks.get(driver_id).map(|v| *v)
    }

    pub fn record_installed_check(&self, driver_id: &str, installed: bool) {
        self.installed_checks.insert(driver_id.to_string(), installed);
    }

    pub fn forget_installed_check(&self, driver_id: &str) {
        self.installed_checks.remove(driver_id);
    }
}
