use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::error;

use super::Message;

pub const CHAT_STORAGE_KEY: &str = "nextstep-chat-history";

/// String key/value storage with local-storage semantics.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create storage dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves half a file behind
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

/// In-process storage, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Chat history persisted as a JSON list under [`CHAT_STORAGE_KEY`].
///
/// Never fails: storage and JSON errors are logged and the caller gets the
/// default greeting (on load) or a no-op (on save/clear).
pub struct ChatStore<S: Storage> {
    storage: S,
}

impl<S: Storage> ChatStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Stored history, or a single greeting if it is absent, malformed or empty.
    pub fn load(&self) -> Vec<Message> {
        match self.try_load() {
            Ok(Some(messages)) if !messages.is_empty() => messages,
            Ok(_) => default_history(),
            Err(e) => {
                error!(error = %e, "Error loading chat history");
                default_history()
            }
        }
    }

    pub fn save(&self, messages: &[Message]) {
        let result = serde_json::to_string(messages)
            .context("failed to serialize chat history")
            .and_then(|json| self.storage.set_item(CHAT_STORAGE_KEY, &json));
        if let Err(e) = result {
            error!(error = %e, "Error saving chat history");
        }
    }

    /// Remove stored history and return the fresh default.
    pub fn clear(&self) -> Vec<Message> {
        if let Err(e) = self.storage.remove_item(CHAT_STORAGE_KEY) {
            error!(error = %e, "Error clearing chat history");
        }
        default_history()
    }

    fn try_load(&self) -> Result<Option<Vec<Message>>> {
        let Some(raw) = self.storage.get_item(CHAT_STORAGE_KEY)? else {
            return Ok(None);
        };
        let messages = serde_json::from_str(&raw).context("stored chat history is not valid")?;
        Ok(Some(messages))
    }
}

pub fn default_history() -> Vec<Message> {
    vec![Message::greeting()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    #[test]
    fn empty_storage_yields_greeting() {
        let store = ChatStore::new(MemoryStorage::new());
        assert_eq!(store.load(), vec![Message::greeting()]);
    }

    #[test]
    fn corrupt_json_yields_exactly_the_greeting() {
        let storage = MemoryStorage::new();
        storage.set_item(CHAT_STORAGE_KEY, "{not json").unwrap();
        let store = ChatStore::new(storage);

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].role, Role::Assistant);
        assert_eq!(loaded[0].content, crate::chat::GREETING);
    }

    #[test]
    fn stored_empty_list_yields_greeting() {
        let storage = MemoryStorage::new();
        storage.set_item(CHAT_STORAGE_KEY, "[]").unwrap();
        assert_eq!(ChatStore::new(storage).load(), default_history());
    }

    #[test]
    fn wrong_shape_yields_greeting() {
        let storage = MemoryStorage::new();
        storage
            .set_item(CHAT_STORAGE_KEY, r#"[{"role":"robot","content":"x"}]"#)
            .unwrap();
        assert_eq!(ChatStore::new(storage).load(), default_history());
    }

    #[test]
    fn save_then_load_keeps_order() {
        let store = ChatStore::new(MemoryStorage::new());
        let history = vec![
            Message::greeting(),
            Message::user("How do I build a resume?"),
            Message::assistant("Start with projects."),
        ];
        store.save(&history);
        assert_eq!(store.load(), history);
    }

    #[test]
    fn clear_removes_stored_key() {
        let store = ChatStore::new(MemoryStorage::new());
        store.save(&[Message::greeting(), Message::user("hi")]);

        assert_eq!(store.clear(), default_history());
        assert!(store.storage().get_item(CHAT_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn file_storage_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("history"));

        assert!(storage.get_item("k").unwrap().is_none());
        storage.set_item("k", "v1").unwrap();
        storage.set_item("k", "v2").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v2"));

        storage.remove_item("k").unwrap();
        storage.remove_item("k").unwrap();
        assert!(storage.get_item("k").unwrap().is_none());
    }
}
