//! 键值持久化 - 身份信息的存储后端

use crate::error::PersistenceError;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 持久化键值存储
pub trait KvStore: Send + Sync {
    /// 读取键值，不存在时返回 `Ok(None)`
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// 写入键值
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError>;
}

/// 文件存储：每个键一个文件
///
/// 通过 [`FileKvStore::with_path`] 指定的键写到指定文件，其余写到 `<root>/<key>.json`。
#[derive(Debug, Clone)]
pub struct FileKvStore {
    root: PathBuf,
    paths: HashMap<String, PathBuf>,
}

impl FileKvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: HashMap::new(),
        }
    }

    /// 为某个键指定文件路径
    pub fn with_path(mut self, key: &str, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(key.to_string(), path.into());
        self
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.paths
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.root.join(format!("{}.json", key)))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // 写临时文件后原子替换
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, path)
    }
}

impl KvStore for FileKvStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        Self::write_atomic(&self.path_for(key), bytes).map_err(|source| PersistenceError::Io {
            key: key.to_string(),
            source,
        })
    }
}

/// 内存存储（测试和 dry-run 用）
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KvStore for MemoryKvStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.entries().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
