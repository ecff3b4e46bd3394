//! 本地快照缓存
//!
//! 整个快照以一个 JSON 数组写在固定名称下，每次保存整体覆盖。
//! 读取失败或内容损坏都视为空列表。

use crate::error::{ClientError, Result};
use crate::record::FileRecord;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 快照文件的固定名称
pub const SNAPSHOT_FILE_NAME: &str = "files.json";

pub trait SnapshotCache: Send + Sync {
    /// 读取快照，缺失或损坏时返回空列表
    fn load(&self) -> Vec<FileRecord>;

    /// 覆盖写入快照
    fn store(&self, records: &[FileRecord]) -> Result<()>;
}

/// 基于文件的快照缓存
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 默认位置: `<data_dir>/dropshelf/files.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dropshelf")
            .join(SNAPSHOT_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotCache for FileCache {
    fn load(&self) -> Vec<FileRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read snapshot {:?}: {}, starting empty", self.path, e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(records) => {
                debug!("Loaded snapshot from {:?}", self.path);
                records
            }
            Err(e) => {
                warn!("Corrupt snapshot {:?}: {}, starting empty", self.path, e);
                Vec::new()
            }
        }
    }

    fn store(&self, records: &[FileRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(records)?;
        // 先写临时文件再重命名，避免写到一半的快照
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved {} record(s) to {:?}", records.len(), self.path);
        Ok(())
    }
}

/// 内存快照缓存，用于临时会话和测试
#[derive(Default)]
pub struct MemoryCache {
    content: Mutex<Option<String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以原始文本预置内容（可以是损坏的 JSON）
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.content.lock().ok().and_then(|c| c.clone())
    }
}

impl SnapshotCache for MemoryCache {
    fn load(&self) -> Vec<FileRecord> {
        self.raw()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(records) => Some(records),
                Err(e) => {
                    warn!("Corrupt in-memory snapshot: {}, starting empty", e);
                    None
                }
            })
            .unwrap_or_default()
    }

    fn store(&self, records: &[FileRecord]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        let mut content = self
            .content
            .lock()
            .map_err(|_| ClientError::Cache("snapshot lock poisoned".to_string()))?;
        *content = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::tests::sample_record;

    #[test]
    fn test_memory_cache_absent_is_empty() {
        assert!(MemoryCache::new().load().is_empty());
    }

    #[test]
    fn test_memory_cache_corrupt_is_empty() {
        assert!(MemoryCache::with_raw("{not json").load().is_empty());
        assert!(MemoryCache::with_raw(r#"{"files": []}"#).load().is_empty());
    }

    #[test]
    fn test_file_cache_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested").join(SNAPSHOT_FILE_NAME));
        assert!(cache.load().is_empty());

        cache
            .store(&[sample_record("a", 1), sample_record("b", 2)])
            .unwrap();
        assert_eq!(cache.load().len(), 2);

        cache.store(&[sample_record("c", 3)]).unwrap();
        let records = cache.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].alias.short, "c");
    }

    #[test]
    fn test_file_cache_corrupt_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE_NAME);
        fs::write(&path, "[{\"name\":").unwrap();
        assert!(FileCache::new(path).load().is_empty());
    }
}
