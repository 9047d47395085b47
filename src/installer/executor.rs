// src/installer/executor.rs

use crate::{catalog::CommandSpec, error::*};
use async_trait::async_trait;
use log::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// 被信号终止时为 None
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 安装和检测命令的执行器，测试中可替换为脚本化实现
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> AppResult<CommandOutput>;
}

/// 直接启动进程，不经过 shell
pub struct SystemExecutor;

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, command: &CommandSpec) -> AppResult<CommandOutput> {
        info!("执行命令: {}", command);
        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Command {
                program: command.program.clone(),
                message: e.to_string(),
            })?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("命令 '{}' 退出码: {:?}", command.program, result.code);
        Ok(result)
    }
}
