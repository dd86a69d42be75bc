//! Content store
//!
//! The `ContentStore` is the single source of truth for the kiosk. It owns
//! the record collection, the timer settings, the legacy cover and the last
//! visited view, all persisted through a [`KvBackend`].
//!
//! ## Ordering
//!
//! `order` is one global counter shared by covers and items. After every
//! mutation the orders form the contiguous run `1..=N`:
//!
//! - add assigns `max + 1`
//! - delete reindexes the survivors, keeping their relative order
//! - reorder assigns `N..=1` from the top of the displayed list down
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = ContentStore::open(config)?;
//!
//! let order = store.add_record(ContentRecord::item("M1"))?;
//! store.update_record(order, &patch)?;
//! store.delete_record(order)?;
//! ```

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{
    ContentRecord, CoverData, RecordKind, RecordPatch, StoredCoverData, TimerSettings,
    TimerSettingsPatch, ViewMode,
};
use crate::storage::{
    FileBackend, KvBackend, MemoryBackend, StorageError, StorageResult, KEY_COVER, KEY_PATH,
    KEY_SLIDES, KEY_TIMERS,
};

/// Persistent kiosk content
pub struct ContentStore<B: KvBackend = FileBackend> {
    backend: B,
}

impl ContentStore<FileBackend> {
    /// Open the file-backed store under the configured data directory
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", config.data_dir))?;
        Ok(Self::with_backend(FileBackend::new(config)))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        self.backend.config()
    }
}

impl ContentStore<MemoryBackend> {
    /// A throwaway store that never touches the disk
    pub fn in_memory() -> Self {
        Self::with_backend(MemoryBackend::new())
    }
}

impl<B: KvBackend> ContentStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ==================== Records ====================

    /// All records in stored sequence
    ///
    /// Never fails: missing or unreadable data is an empty collection.
    pub fn load(&self) -> Vec<ContentRecord> {
        self.read_json(KEY_SLIDES).unwrap_or_default()
    }

    /// Replace the whole collection
    pub fn save(&mut self, records: &[ContentRecord]) -> StorageResult<()> {
        self.write_json(KEY_SLIDES, &records)
    }

    /// Records sorted by ascending order (rotation sequence)
    pub fn records_ascending(&self) -> Vec<ContentRecord> {
        let mut records = self.load();
        records.sort_by_key(|r| r.order);
        records
    }

    /// Records sorted by descending order (admin listing, most recent first)
    pub fn records_descending(&self) -> Vec<ContentRecord> {
        let mut records = self.load();
        records.sort_by(|a, b| b.order.cmp(&a.order));
        records
    }

    /// Look up a record by order
    pub fn get(&self, order: u32) -> Option<ContentRecord> {
        self.load().into_iter().find(|r| r.order == order)
    }

    /// Number of records of a kind
    pub fn count(&self, kind: RecordKind) -> usize {
        self.load().iter().filter(|r| r.kind == kind).count()
    }

    /// Whether another record of `kind` fits under its cap
    pub fn can_add(&self, kind: RecordKind) -> bool {
        self.count(kind) < kind.cap()
    }

    /// Append a record, assigning the next order
    ///
    /// Returns the assigned order. Rejected without mutation when the
    /// per-type cap is reached.
    pub fn add_record(&mut self, mut record: ContentRecord) -> StorageResult<u32> {
        let mut records = self.load();

        let kind = record.kind;
        if records.iter().filter(|r| r.kind == kind).count() >= kind.cap() {
            return Err(StorageError::CapacityExceeded {
                kind,
                cap: kind.cap(),
            });
        }

        let max_order = records.iter().map(|r| r.order).max().unwrap_or(0);
        record.order = max_order + 1;
        let order = record.order;
        records.push(record);
        self.save(&records)?;

        debug!(order, %kind, "record added");
        Ok(order)
    }

    /// Merge a patch over the record with `order`
    ///
    /// A missing order is silently ignored; returns whether a record changed.
    pub fn update_record(&mut self, order: u32, patch: &RecordPatch) -> StorageResult<bool> {
        let mut records = self.load();

        let Some(record) = records.iter_mut().find(|r| r.order == order) else {
            debug!(order, "update ignored, no such record");
            return Ok(false);
        };
        record.apply(patch);
        self.save(&records)?;

        debug!(order, "record updated");
        Ok(true)
    }

    /// Remove the record with `order` and close the gap
    ///
    /// Survivors are renumbered `1..=N` in their previous relative order.
    /// Returns the removed record so its image can be cleaned up.
    pub fn delete_record(&mut self, order: u32) -> StorageResult<Option<ContentRecord>> {
        let mut records = self.load();

        let Some(pos) = records.iter().position(|r| r.order == order) else {
            debug!(order, "delete ignored, no such record");
            return Ok(None);
        };
        let removed = records.remove(pos);

        records.sort_by_key(|r| r.order);
        for (index, record) in records.iter_mut().enumerate() {
            record.order = index as u32 + 1;
        }
        self.save(&records)?;

        debug!(order, remaining = records.len(), "record deleted");
        Ok(Some(removed))
    }

    /// Reassign orders from a top-to-bottom display sequence
    ///
    /// `sequence` lists current order values as they appear in the
    /// most-recent-first listing. The first entry receives the highest order.
    /// It must be a permutation of the stored orders.
    pub fn reorder(&mut self, sequence: &[u32]) -> StorageResult<()> {
        let mut records = self.load();
        let count = records.len();

        if sequence.len() != count {
            return Err(StorageError::InvalidReorder {
                details: format!("expected {} entries, got {}", count, sequence.len()),
            });
        }

        let mut positions = Vec::with_capacity(count);
        for record in &records {
            let Some(pos) = sequence.iter().position(|&o| o == record.order) else {
                return Err(StorageError::InvalidReorder {
                    details: format!("order {} is missing from the sequence", record.order),
                });
            };
            positions.push(pos);
        }

        for (record, pos) in records.iter_mut().zip(positions) {
            record.order = (count - pos) as u32;
        }

        // Duplicates in `sequence` would leave a gap somewhere
        let mut assigned: Vec<u32> = records.iter().map(|r| r.order).collect();
        assigned.sort_unstable();
        assigned.dedup();
        if assigned.len() != count {
            return Err(StorageError::InvalidReorder {
                details: "sequence contains duplicate orders".to_string(),
            });
        }

        self.save(&records)?;
        debug!(count, "records reordered");
        Ok(())
    }

    /// Remove the whole record collection
    pub fn clear(&mut self) -> StorageResult<()> {
        self.backend.remove(KEY_SLIDES)
    }

    // ==================== Timer settings ====================

    /// Stored timer values over the defaults
    pub fn load_timer_settings(&self) -> TimerSettings {
        TimerSettings::merged(&self.load_stored_timers())
    }

    /// Raw stored timer values, empty if never saved
    pub fn load_stored_timers(&self) -> TimerSettingsPatch {
        self.read_json(KEY_TIMERS).unwrap_or_default()
    }

    /// Merge partial timer values over the stored ones
    ///
    /// Range validation happens in the timer form, not here.
    pub fn save_timer_settings(&mut self, patch: &TimerSettingsPatch) -> StorageResult<()> {
        let mut stored = self.load_stored_timers();
        stored.merge(patch);
        self.write_json(KEY_TIMERS, &stored)
    }

    // ==================== Legacy cover ====================

    /// The singleton cover merged over its defaults
    pub fn load_cover_data(&self) -> CoverData {
        CoverData::merged(
            self.read_json::<StoredCoverData>(KEY_COVER)
                .unwrap_or_default(),
        )
    }

    pub fn has_cover_data(&self) -> bool {
        matches!(self.backend.get(KEY_COVER), Ok(Some(_)))
    }

    pub fn save_cover_data(&mut self, cover: &CoverData) -> StorageResult<()> {
        self.write_json(KEY_COVER, cover)
    }

    /// Move a legacy singleton cover into the record collection
    ///
    /// Only runs when there is stored cover data and no Cover record yet.
    /// Returns the order of the migrated cover.
    pub fn migrate_legacy_cover(&mut self) -> StorageResult<Option<u32>> {
        if !self.has_cover_data() || self.count(RecordKind::Cover) > 0 {
            return Ok(None);
        }

        let cover = self.load_cover_data();
        let order = self.add_record(cover.into_record())?;
        self.backend.remove(KEY_COVER)?;

        debug!(order, "legacy cover migrated");
        Ok(Some(order))
    }

    // ==================== Home path ====================

    /// Last visited top-level view
    pub fn load_home_path(&self) -> ViewMode {
        self.read_json(KEY_PATH).unwrap_or_default()
    }

    pub fn save_home_path(&mut self, mode: ViewMode) -> StorageResult<()> {
        self.write_json(KEY_PATH, &mode)
    }

    // ==================== Encoding ====================

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.backend.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "failed to read stored value");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "ignoring unparsable stored value");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> StorageResult<()> {
        let text = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, &text)
    }
}
