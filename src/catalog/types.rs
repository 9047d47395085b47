// src/catalog/types.rs

use crate::{constants, error::*, hasher::HashAlgorithm};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Epson,
    Star,
    Bixolon,
    Citizen,
    Xprinter,
    Rongta,
}

impl Brand {
    pub fn display_name(&self) -> &'static str {
        match self {
            Brand::Epson => "EPSON",
            Brand::Star => "Star Micronics",
            Brand::Bixolon => "BIXOLON",
            Brand::Citizen => "CITIZEN",
            Brand::Xprinter => "Xprinter",
            Brand::Rongta => "RONGTA",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterClass {
    Receipt,
    Label,
    Kitchen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Usb,
    Serial,
    Ethernet,
    Wifi,
    Bluetooth,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Macos,
    Linux,
}

impl Platform {
    /// 当前编译目标对应的平台，不支持的系统返回 None
    pub fn current() -> Option<Platform> {
        if cfg!(target_os = "windows") {
            Some(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Some(Platform::Macos)
        } else if cfg!(target_os = "linux") {
            Some(Platform::Linux)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Macos => "macos",
            Platform::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win32" | "win" => Ok(Platform::Windows),
            "macos" | "darwin" | "mac" => Ok(Platform::Macos),
            "linux" => Ok(Platform::Linux),
            other => Err(AppError::UserInputError(format!("不支持的平台 '{}'", other))),
        }
    }
}

/// 每个平台一个可选字段，避免运行时按字符串猜测键名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PlatformTable<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macos: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<T>,
}

impl<T> Default for PlatformTable<T> {
    fn default() -> Self {
        Self {
            windows: None,
            macos: None,
            linux: None,
        }
    }
}

impl<T> PlatformTable<T> {
    pub fn get(&self, platform: Platform) -> Option<&T> {
        match platform {
            Platform::Windows => self.windows.as_ref(),
            Platform::Macos => self.macos.as_ref(),
            Platform::Linux => self.linux.as_ref(),
        }
    }

    pub fn platforms(&self) -> Vec<Platform> {
        [Platform::Windows, Platform::Macos, Platform::Linux]
            .into_iter()
            .filter(|p| self.get(*p).is_some())
            .collect()
    }
}

/// 不经过 shell 的命令描述，参数中的 `{file}` 会被替换为安装包路径
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn render(&self, file: &Path) -> CommandSpec {
        let file = file.to_string_lossy();
        let replace = |s: &String| s.replace(constants::FILE_PLACEHOLDER, &file);
        CommandSpec {
            program: replace(&self.program),
            args: self.args.iter().map(replace).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// 安装检测: 命令成功且输出包含 `expect`（忽略大小写）即视为已安装
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub command: CommandSpec,
    pub expect: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPackage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub algorithm: HashAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub install: CommandSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDescriptor {
    pub id: String,
    pub brand: Brand,
    pub model: String,
    pub class: PrinterClass,
    pub driver_name: String,
    #[serde(default)]
    pub connections: Vec<ConnectionType>,
    #[serde(default)]
    pub packages: PlatformTable<DriverPackage>,
}

impl DriverDescriptor {
    pub fn package_for(&self, platform: Platform) -> AppResult<&DriverPackage> {
        self.packages
            .get(platform)
            .ok_or_else(|| AppError::UnsupportedPlatform {
                driver: self.id.clone(),
                platform: platform.to_string(),
            })
    }
}
