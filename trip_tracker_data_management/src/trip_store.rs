use trip_tracker_lib::trip::TripArchive;

use crate::{storage::KeyValueStorage, StorageError};

/// Keeps the whole trip archive in one storage slot. Every save rewrites the slot.
#[derive(Debug, Clone)]
pub struct TripStore<S: KeyValueStorage> {
    storage: S,
    key: String,
}

impl<S: KeyValueStorage> TripStore<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Missing or unreadable archives load as empty.
    pub fn load(&self) -> TripArchive {
        let text = match self.storage.get(&self.key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::debug!("No saved trips under {:?}", self.key);
                return TripArchive::new();
            }
            Err(err) => {
                tracing::warn!("Failed to read saved trips: {err}");
                return TripArchive::new();
            }
        };

        match serde_json::from_str::<TripArchive>(&text) {
            Ok(archive) => {
                tracing::info!("Loaded {} saved trips", archive.len());
                archive
            }
            Err(err) => {
                tracing::warn!("Saved trips could not be parsed, starting empty: {err}");
                TripArchive::new()
            }
        }
    }

    pub fn save(&mut self, archive: &TripArchive) -> Result<(), StorageError> {
        let text = serde_json::to_string(archive)?;
        self.storage.set(&self.key, &text)
    }

    /// Removes the trip `id` and persists the result. Unknown ids are ignored.
    pub fn delete(&mut self, archive: &TripArchive, id: i64) -> TripArchive {
        if archive.get(id).is_none() {
            tracing::debug!("Delete of unknown trip {id} ignored");
            return archive.clone();
        }

        let pruned = archive.without(id);
        if let Err(err) = self.save(&pruned) {
            tracing::error!("Failed to persist deletion of trip {id}: {err}");
        }
        pruned
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
