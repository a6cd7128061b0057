// ==========================================
// 样品申请目录系统 - 行业图片存储
// ==========================================
// 键格式: sectors/{sector_id}/{unix_millis}-{清洗后的文件名}
// 类型: 仅接受 image/jpeg, image/png, image/webp
// ==========================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("不支持的文件类型: {0}")]
    UnsupportedContentType(String),

    #[error("非法存储键: {0}")]
    InvalidKey(String),

    #[error("非法地址: {0}")]
    InvalidUrl(String),

    #[error("存储读写失败: {0}")]
    Io(#[from] std::io::Error),
}

/// 检查图片类型
pub fn validate_image_content_type(content_type: &str) -> Result<(), BlobError> {
    let normalized = content_type.trim().to_ascii_lowercase();
    if ALLOWED_IMAGE_TYPES.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(BlobError::UnsupportedContentType(content_type.to_string()))
    }
}

/// 文件名清洗：非 [a-zA-Z0-9._-] 字符替换为 '-'
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// 行业图片存储键
pub fn sector_image_key(sector_id: &str, file_name: &str, at: DateTime<Utc>) -> String {
    format!(
        "sectors/{}/{}-{}",
        sector_id,
        at.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

/// 键只允许相对路径，且不含 "." / ".." 段
fn validate_key(key: &str) -> Result<(), BlobError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ==========================================
// BlobStore Trait - 对象存储
// ==========================================
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 写入对象，返回公开访问地址
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// 从公开地址反解存储键
    fn key_from_public_url(&self, public_url: &str) -> Result<String, BlobError>;
}

// ==========================================
// FsBlobStore - 本地目录存储
// ==========================================
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: Url,
}

impl FsBlobStore {
    /// # 参数
    /// - root: 本地存储根目录
    /// - public_base_url: 对外访问前缀（如 https://cdn.example.com/assets/）
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, BlobError> {
        let mut base = Url::parse(public_base_url)
            .map_err(|e| BlobError::InvalidUrl(format!("{}: {}", public_base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            root: root.into(),
            public_base_url: base,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn public_url_for(&self, key: &str) -> Result<String, BlobError> {
        self.public_base_url
            .join(key)
            .map(|u| u.to_string())
            .map_err(|e| BlobError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError> {
        validate_image_content_type(content_type)?;
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(key, size = bytes.len(), content_type, "图片已写入");
        self.public_url_for(key)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key, "图片不存在，视为已删除");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn key_from_public_url(&self, public_url: &str) -> Result<String, BlobError> {
        let url = Url::parse(public_url)
            .map_err(|e| BlobError::InvalidUrl(format!("{}: {}", public_url, e)))?;
        let base_path = self.public_base_url.path();
        let key = url
            .path()
            .strip_prefix(base_path)
            .unwrap_or_else(|| url.path().trim_start_matches('/'))
            .to_string();
        validate_key(&key)?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my photo (1).png"), "my-photo--1-.png");
        assert_eq!(sanitize_file_name("ok_name-1.webp"), "ok_name-1.webp");
    }

    #[test]
    fn test_sector_image_key_format() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            sector_image_key("S1", "a b.jpg", at),
            "sectors/S1/1700000000123-a-b.jpg"
        );
    }

    #[test]
    fn test_content_type_whitelist() {
        assert!(validate_image_content_type("image/png").is_ok());
        assert!(validate_image_content_type("IMAGE/JPEG").is_ok());
        assert!(validate_image_content_type("image/gif").is_err());
    }

    #[tokio::test]
    async fn test_put_then_delete_via_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "https://cdn.example.com/assets").unwrap();

        let url = store
            .put("sectors/S1/1-logo.png", b"png-bytes", "image/png")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/assets/sectors/S1/1-logo.png");
        assert!(dir.path().join("sectors/S1/1-logo.png").exists());

        let key = store.key_from_public_url(&url).unwrap();
        assert_eq!(key, "sectors/S1/1-logo.png");
        store.delete(&key).await.unwrap();
        assert!(!dir.path().join("sectors/S1/1-logo.png").exists());
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "https://cdn.example.com/").unwrap();
        assert!(matches!(
            store.put("../escape.png", b"x", "image/png").await,
            Err(BlobError::InvalidKey(_))
        ));
    }
}
