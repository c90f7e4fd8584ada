//! 身份存储 - 通知接收者和管理员列表
//!
//! 第一次 `/start` 的用户成为管理员，其会话成为通知接收者。两者都会持久化，
//! 重启后仍然有效。

use crate::error::PersistenceError;
use crate::store::KvStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 接收者标识的存储键
pub const RECIPIENT_KEY: &str = "chat_id";
/// 管理员列表的存储键
pub const ADMINS_KEY: &str = "admin_list";

/// 会话（通知目标）标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// 发送者标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 身份存储
pub struct IdentityStore {
    store: Arc<dyn KvStore>,
    recipient: Option<ChatId>,
    admins: BTreeSet<UserId>,
    recipient_loaded: bool,
    admins_loaded: bool,
}

impl IdentityStore {
    /// 从持久化存储加载
    ///
    /// 读取失败按「未加载」处理，随后进入首次注册流程。
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let recipient: Option<ChatId> = Self::load_value(store.as_ref(), RECIPIENT_KEY);
        let admins: Option<BTreeSet<UserId>> = Self::load_value(store.as_ref(), ADMINS_KEY);

        debug!(recipient = ?recipient, admins = ?admins, "Identity store loaded");

        Self {
            store,
            recipient_loaded: recipient.is_some(),
            admins_loaded: admins.is_some(),
            recipient,
            admins: admins.unwrap_or_default(),
        }
    }

    fn load_value<T: for<'de> Deserialize<'de>>(store: &dyn KvStore, key: &str) -> Option<T> {
        let bytes = match store.load(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to load identity");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(source) => {
                let e = PersistenceError::Codec {
                    key: key.to_string(),
                    source,
                };
                error!(key = %key, error = %e, "Failed to decode identity");
                None
            }
        }
    }

    fn save_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(value).map_err(|source| PersistenceError::Codec {
            key: key.to_string(),
            source,
        })?;
        self.store.save(key, &bytes)
    }

    /// 接收者或管理员列表任一已加载，即已完成首次注册
    pub fn is_bootstrapped(&self) -> bool {
        self.recipient_loaded || self.admins_loaded
    }

    pub fn recipient(&self) -> Option<ChatId> {
        self.recipient
    }

    pub fn admins(&self) -> &BTreeSet<UserId> {
        &self.admins
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    /// 保存新的接收者，写入成功后才更新内存
    pub fn save_recipient(&mut self, chat: ChatId) -> Result<(), PersistenceError> {
        self.save_value(RECIPIENT_KEY, &chat)?;
        info!(chat_id = %chat, "Recipient saved");
        self.recipient = Some(chat);
        self.recipient_loaded = true;
        Ok(())
    }

    /// 添加管理员（只增不减）
    pub fn add_admin(&mut self, user: UserId) -> Result<(), PersistenceError> {
        let mut admins = self.admins.clone();
        admins.insert(user);
        self.save_value(ADMINS_KEY, &admins)?;
        info!(user_id = %user, "Admin list saved");
        self.admins = admins;
        self.admins_loaded = true;
        Ok(())
    }

    /// 首次注册
    ///
    /// 先写管理员列表：即使接收者写入失败，管理员仍可再次 `/start` 补写接收者。
    pub fn bootstrap(&mut self, user: UserId, chat: ChatId) -> Result<(), PersistenceError> {
        self.add_admin(user)?;
        self.save_recipient(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    #[test]
    fn test_empty_store_is_not_bootstrapped() {
        let identity = IdentityStore::load(Arc::new(MemoryKvStore::new()));
        assert!(!identity.is_bootstrapped());
        assert!(identity.recipient().is_none());
        assert!(identity.admins().is_empty());
    }

    #[test]
    fn test_bootstrap_persists_across_reload() {
        let store = Arc::new(MemoryKvStore::new());
        let mut identity = IdentityStore::load(store.clone());
        identity.bootstrap(UserId(7), ChatId(-100)).unwrap();

        let reloaded = IdentityStore::load(store.clone());
        assert!(reloaded.is_bootstrapped());
        assert_eq!(reloaded.recipient(), Some(ChatId(-100)));
        assert!(reloaded.is_admin(UserId(7)));
        assert!(!reloaded.is_admin(UserId(8)));
        assert_eq!(store.load(RECIPIENT_KEY).unwrap(), Some(b"-100".to_vec()));
        assert_eq!(store.load(ADMINS_KEY).unwrap(), Some(b"[7]".to_vec()));
    }

    #[test]
    fn test_corrupt_value_treated_as_not_loaded() {
        let store = Arc::new(MemoryKvStore::new());
        store.save(RECIPIENT_KEY, b"not json").unwrap();

        let identity = IdentityStore::load(store);
        assert!(!identity.is_bootstrapped());
    }

    #[test]
    fn test_empty_admin_list_still_counts_as_loaded() {
        let store = Arc::new(MemoryKvStore::new());
        store.save(ADMINS_KEY, b"[]").unwrap();

        let identity = IdentityStore::load(store);
        assert!(identity.is_bootstrapped());
        assert!(identity.admins().is_empty());
    }
}
