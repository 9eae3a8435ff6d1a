use std::{collections::HashMap, io::ErrorKind, path::PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::{alarm::AlarmConfig, config::Config, error::StoreError, photo::PhotoHandle};

pub const ALARM_KEY: &str = "wake-up-alarm";
pub const PHOTOS_KEY: &str = "wake-up-photos";

/// A small key/value store holding JSON records.
///
/// Implementors only provide raw string access. Every write replaces the
/// whole record, so a reader sees either the old or the new value.
pub trait Store {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    fn load_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        Self: Sized,
    {
        self.get(key)?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    fn save_record<T: Serialize>(&mut self, key: &str, record: &T) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(record).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set(key, raw)
    }

    fn save_alarm(&mut self, config: &AlarmConfig) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.save_record(ALARM_KEY, config)
    }

    fn load_alarm(&self) -> Result<Option<AlarmConfig>, StoreError>
    where
        Self: Sized,
    {
        self.load_record(ALARM_KEY)
    }

    fn clear_alarm(&mut self) -> Result<(), StoreError> {
        self.remove(ALARM_KEY)
    }

    /// The photo cache lives under its own key so photos survive without
    /// an armed alarm.
    fn save_photos(&mut self, photos: &[PhotoHandle]) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.save_record(PHOTOS_KEY, &photos)
    }

    fn load_photos(&self) -> Result<Option<Vec<PhotoHandle>>, StoreError>
    where
        Self: Sized,
    {
        self.load_record(PHOTOS_KEY)
    }
}

impl<T: Store + ?Sized> Store for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Keeps each record in `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store in the per user data directory, if the platform has one.
    #[must_use]
    pub fn in_data_dir() -> Option<Self> {
        Config::data_dir().map(Self::new)
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(io_err)?;
        std::fs::rename(&tmp, &path).map_err(io_err)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(StoreError::Io {
                key: key.to_string(),
                source: err,
            }),
            _ => Ok(()),
        }
    }
}

/// Records kept in memory only. Used when there is nowhere to write to,
/// and by tests, which can also take it offline to simulate disabled storage.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: HashMap<String, String>,
    available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            available: true,
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails every operation.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.check()?;
        self.records.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlarmConfig {
        AlarmConfig {
            time: "06:45".parse().unwrap(),
            photos: vec![
                PhotoHandle::new(Some("a.png".to_string()), "data:image/png;base64,AA".to_string()),
                PhotoHandle::from_content("data:image/png;base64,BB".to_string()),
            ],
        }
    }

    #[test]
    fn file_store_round_trips_alarm_and_photos() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested"));
        assert!(store.load_alarm().unwrap().is_none());
        assert!(store.load_photos().unwrap().is_none());

        let config = config();
        store.save_alarm(&config).unwrap();
        store.save_photos(&config.photos).unwrap();
        assert_eq!(store.load_alarm().unwrap(), Some(config.clone()));
        assert_eq!(store.load_photos().unwrap(), Some(config.photos.clone()));
        assert!(!dir.path().join("nested/wake-up-alarm.json.tmp").exists());

        store.clear_alarm().unwrap();
        assert!(store.load_alarm().unwrap().is_none());
        // clearing the alarm leaves the photo cache alone
        assert_eq!(store.load_photos().unwrap(), Some(config.photos));
        // and clearing twice is fine
        store.clear_alarm().unwrap();
    }

    #[test]
    fn file_store_reads_plain_json_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("wake-up-alarm.json"),
            r#"{"time":"07:00","photos":["data:image/jpeg;base64,/9j/"]}"#,
        )
        .unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let alarm = store.load_alarm().unwrap().unwrap();
        assert_eq!(alarm.time.to_string(), "07:00");
        assert_eq!(alarm.photos[0].data(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn malformed_records_are_reported() {
        let mut store = MemoryStore::new();
        store.set(ALARM_KEY, "{\"time\":\"7\"".to_string()).unwrap();
        assert!(matches!(
            store.load_alarm(),
            Err(StoreError::Malformed { .. })
        ));
        store.set(ALARM_KEY, r#"{"time":"99:00","photos":[]}"#.to_string()).unwrap();
        assert!(matches!(
            store.load_alarm(),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn boxed_stores_keep_working() {
        let config = config();
        let mut store: Box<dyn Store> = Box::new(MemoryStore::new());
        store.save_alarm(&config).unwrap();
        assert_eq!(store.load_alarm().unwrap(), Some(config));
    }

    #[test]
    fn unavailable_memory_store_fails_everything() {
        let config = config();
        let mut store = MemoryStore::unavailable();
        assert!(store.load_alarm().unwrap_err().is_unavailable());
        assert!(store.save_alarm(&config).unwrap_err().is_unavailable());
        assert!(store.clear_alarm().unwrap_err().is_unavailable());

        store.set_available(true);
        store.save_alarm(&config).unwrap();
        assert_eq!(store.load_alarm().unwrap(), Some(config));
    }
}
