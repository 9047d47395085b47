// src/hasher.rs

use crate::{constants, error::*};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    str::FromStr,
};

/// 摘要算法，目录中每个驱动包各自指定，默认 SHA-256。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    #[default]
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(AppError::UserInputError(format!(
                "不支持的摘要算法 '{}' (可选: md5, sha256)",
                other
            ))),
        }
    }
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> AppResult<String> {
    let mut hasher = D::new();
    let mut buffer = [0; constants::HASH_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// 以流的方式计算文件摘要（小写十六进制）。会阻塞当前线程。
pub fn hash_file_blocking(path: &Path, algorithm: HashAlgorithm) -> AppResult<String> {
    let reader = BufReader::new(File::open(path)?);
    match algorithm {
        HashAlgorithm::Md5 => digest_reader::<Md5, _>(reader),
        HashAlgorithm::Sha256 => digest_reader::<Sha256, _>(reader),
    }
}

/// 在阻塞线程池中计算文件摘要，不占用异步工作线程。
pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> AppResult<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file_blocking(&path, algorithm))
        .await
        .map_err(|e| AppError::Other(anyhow::anyhow!("摘要计算任务异常退出: {}", e)))?
}

pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Md5 => hex::encode(Md5::digest(data)),
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
    }
}

/// 十六进制摘要比较，忽略大小写和首尾空白。
pub fn digests_match(actual: &str, expected: &str) -> bool {
    actual.trim().eq_ignore_ascii_case(expected.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            hash_bytes(b"", HashAlgorithm::Md5),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hash_bytes(b"abc", HashAlgorithm::Md5),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            hash_bytes(b"abc", HashAlgorithm::Sha256),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_file_matches_in_memory_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // 超过一个缓冲区的长度，确保分块读取正确
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha256] {
            assert_eq!(
                hash_file_blocking(file.path(), algorithm).unwrap(),
                hash_bytes(&data, algorithm)
            );
        }
    }

    #[test]
    fn test_hash_missing_file_is_io_error() {
        let result = hash_file_blocking(Path::new("/definitely/not/here.bin"), HashAlgorithm::Sha256);
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn test_digests_match_is_case_insensitive() {
        assert!(digests_match("ABCDEF01", "abcdef01"));
        assert!(digests_match(" abcdef01\n", "ABCDEF01"));
        assert!(!digests_match("abcdef01", "abcdef02"));
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("MD5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!("sha-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha256);
    }
}
