// src/utils.rs

use crate::{constants, error::*};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::{ffi::OsStr, path::Path, sync::LazyLock};
use url::Url;

static ILLEGAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Windows 下不能作为文件名主干的设备名
const RESERVED_STEMS: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn has_reserved_stem(name: &str) -> bool {
    let stem = Path::new(name)
        .file_stem()
        .unwrap_or_else(|| OsStr::new(name))
        .to_string_lossy()
        .to_uppercase();
    RESERVED_STEMS.contains(&stem.as_str())
}

/// 把安装包名清理成在三个平台上都合法的缓存文件名
pub fn sanitize_filename(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }

    let prefixed = if has_reserved_stem(trimmed) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    };
    let replaced = ILLEGAL_CHARS_RE.replace_all(&prefixed, " ");
    let collapsed = WHITESPACE_RE.replace_all(&replaced, " ");
    let cleaned = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        return "unnamed".to_string();
    }
    fit_to_byte_limit(cleaned, constants::MAX_FILENAME_BYTES)
}

/// 超长时截断主干并保留扩展名（安装器靠扩展名识别 .exe/.pkg/.deb）
fn fit_to_byte_limit(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            let ext = format!(".{}", ext.to_string_lossy());
            let stem = stem.to_string_lossy();
            let stem = truncate_at_char_boundary(&stem, max_bytes.saturating_sub(ext.len()));
            format!("{}{}", stem, ext)
        }
        _ => truncate_at_char_boundary(name, max_bytes).to_string(),
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

/// 取 URL 路径的最后一段作为缓存文件名（百分号解码并清理非法字符）
pub fn file_name_from_url(url: &str) -> AppResult<String> {
    let parsed = Url::parse(url)?;
    let last_segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidFileName(format!("无法从 URL '{}' 推断文件名", url)))?;
    let decoded = percent_decode_str(last_segment).decode_utf8_lossy();
    Ok(sanitize_filename(&decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        // 测试非法字符
        assert_eq!(sanitize_filename("a\\b/c:d*e?f\"g<h>i|j"), "a b c d e f g h i j".to_string());

        // 测试首尾空格和点
        assert_eq!(sanitize_filename(" . my file. "), "my file".to_string());

        // 测试 Windows 保留字 (大小写不敏感)
        assert_eq!(sanitize_filename("CON.txt"), "_CON.txt".to_string());
        assert_eq!(sanitize_filename("aux"), "_aux".to_string());

        // 测试空或只有非法字符的输入
        assert_eq!(sanitize_filename(""), "unknown".to_string());
        assert_eq!(sanitize_filename("<>|"), "unnamed".to_string());

        // 测试文件名截断 (确保不破坏UTF-8和扩展名)
        let very_long_name = format!("{}.exe", "驱动".repeat(100));
        let truncated = sanitize_filename(&very_long_name);
        assert!(truncated.len() <= constants::MAX_FILENAME_BYTES);
        assert!(truncated.ends_with(".exe"));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/pos/drivers/APD_610.exe?token=1").unwrap(),
            "APD_610.exe"
        );
        assert_eq!(
            file_name_from_url("https://example.com/d/Star%20CUPS%20Driver.tar.gz").unwrap(),
            "Star CUPS Driver.tar.gz"
        );
        // 解码后的路径分隔符不能逃出缓存目录
        assert_eq!(
            file_name_from_url("https://example.com/d/..%2F..%2Fetc%2Fpasswd").unwrap(),
            "etc passwd"
        );
        assert!(file_name_from_url("https://example.com/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghijkl", 8), "abcde...");
    }
}
