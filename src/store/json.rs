use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use crate::error::AppError;

/// A typed JSON document on disk. Missing or unreadable files load as
/// `T::default()`; saves replace the file through a temporary sibling.
pub(crate) struct JsonStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
            _doc: PhantomData,
        }
    }

    pub(crate) fn load(&self) -> T {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read store: {e}");
                return T::default();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "Store is not valid JSON, using empty: {e}");
            T::default()
        })
    }

    pub(crate) fn save(&self, value: &T) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Load, apply `f`, and save when `f` reports a change. Updates through
    /// one store are serialized.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut T) -> (bool, R)) -> Result<R, AppError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load();
        let (changed, out) = f(&mut doc);
        if changed {
            self.save(&doc)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_load_missing_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Vec<String>> = JsonStore::new(dir.path().join("games.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_corrupt_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        std::fs::write(&path, "{not json").unwrap();
        let store: JsonStore<Vec<String>> = JsonStore::new(path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<BTreeMap<String, String>> =
            JsonStore::new(dir.path().join("sub").join("codes.json"));
        let mut doc = BTreeMap::new();
        doc.insert("acct".to_string(), "123456".to_string());
        store.save(&doc).unwrap();
        assert_eq!(store.load(), doc);
        let leftovers = std::fs::read_dir(dir.path().join("sub")).unwrap().count();
        assert_eq!(leftovers, 1, "temporary file should be renamed away");
    }

    #[test]
    fn test_save_keeps_unicode_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        let store: JsonStore<Vec<String>> = JsonStore::new(path.clone());
        store.save(&vec!["星露谷物语".to_string()]).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("星露谷物语"));
    }

    #[test]
    fn test_update_saves_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        let store: JsonStore<Vec<String>> = JsonStore::new(path.clone());

        let len = store.update(|doc| (false, doc.len())).unwrap();
        assert_eq!(len, 0);
        assert!(!path.exists());

        store
            .update(|doc| {
                doc.push("Celeste".to_string());
                (true, ())
            })
            .unwrap();
        assert_eq!(store.load(), vec!["Celeste".to_string()]);
    }
}
