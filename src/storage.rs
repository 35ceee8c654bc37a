use anyhow::Result;
#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Key-value storage capability. Conversations and preferences are written
/// through it in full on every mutation (whole-value overwrite, last writer
/// wins). None of the operations are atomic across a process crash; a crash
/// mid-write can leave a stale or missing value.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    /// All stored keys starting with `prefix`, sorted ascending.
    fn keys(&self, prefix: &str) -> Vec<String>;
}

/// File-backed storage: one file per key under a root directory. Keys are
/// percent-encoded into file names so arbitrary key strings round-trip.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(urlencoding::encode(key).into_owned())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut keys: Vec<String> = entries
            .filter_map(|entry| {
                let name = entry.ok()?.file_name().into_string().ok()?;
                let key = urlencoding::decode(&name).ok()?.into_owned();
                key.starts_with(prefix).then_some(key)
            })
            .collect();
        keys.sort();
        keys
    }
}

/// In-memory storage backend, used by tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().to_path_buf());

        storage.set("model", "gpt-4o-mini").unwrap();
        assert_eq!(storage.get("model").as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn file_storage_encodes_awkward_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().to_path_buf());

        let key = "messages/2024-06-01 12:30:00";
        storage.set(key, "[]").unwrap();
        assert_eq!(storage.get(key).as_deref(), Some("[]"));
        assert_eq!(storage.keys("messages/"), vec![key.to_string()]);
    }

    #[test]
    fn file_storage_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        assert_eq!(storage.get("nope"), None);
    }

    #[test]
    fn file_storage_remove_is_quiet_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().to_path_buf());
        storage.remove("never-set").unwrap();
    }

    #[test]
    fn file_storage_keys_before_first_write() {
        let storage = FileStorage::new(PathBuf::from("/nonexistent/charla-test"));
        assert!(storage.keys("").is_empty());
    }

    #[test]
    fn memory_storage_keys_filter_by_prefix() {
        let mut storage = MemoryStorage::new();
        storage.set("messages/b", "[]").unwrap();
        storage.set("messages/a", "[]").unwrap();
        storage.set("model", "gpt-4o").unwrap();

        assert_eq!(
            storage.keys("messages/"),
            vec!["messages/a".to_string(), "messages/b".to_string()]
        );
    }
}
