use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shield_core::entity::display_value;
use shield_core::{Entity, Record, Repository, Result, StorageError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Bookkeeping kept next to every stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

impl Default for RecordMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }
}

impl RecordMetadata {
    fn touched(&self) -> Self {
        Self {
            created_at: self.created_at,
            updated_at: Utc::now(),
            version: self.version + 1,
        }
    }
}

/// On-disk layout of `<base>/<model>/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id_attribute: String,
    attributes: Map<String, Value>,
    metadata: RecordMetadata,
}

impl StoredRecord {
    fn into_record(self, model: &str) -> Record {
        Record::new(model)
            .with_id_attribute(self.id_attribute)
            .with_attributes(self.attributes)
    }
}

/// Records as pretty-printed JSON files, one directory per model.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base_path = base_path.as_ref().to_path_buf();
        debug!("Creating JsonFileStore with base path: {:?}", base_path);
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn model_dir(&self, model: &str) -> std::result::Result<PathBuf, StorageError> {
        check_segment(model)?;
        Ok(self.base_path.join(model))
    }

    fn record_path(&self, record: &Record) -> std::result::Result<PathBuf, StorageError> {
        let key = display_value(record.primary_key().as_ref());
        check_segment(&key)?;
        Ok(self.model_dir(record.model_name())?.join(format!("{}.json", key)))
    }

    async fn load(&self, path: &Path) -> std::result::Result<Option<StoredRecord>, StorageError> {
        match fs::read_to_string(path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Creation time, last update and version of a persisted record.
    pub async fn metadata(&self, record: &Record) -> Result<RecordMetadata> {
        let path = self.record_path(record)?;
        let stored = self.load(&path).await?.ok_or_else(|| not_found(record))?;
        Ok(stored.metadata)
    }

    async fn write(&self, record: &Record) -> std::result::Result<Record, StorageError> {
        let mut record = record.clone();
        if record.is_new() {
            let id = Uuid::new_v4().to_string();
            debug!(model = %record.model_name(), %id, "Assigning id to new record");
            record.insert(record.id_attribute().to_string(), id);
        }

        let path = self.record_path(&record)?;
        let metadata = match self.load(&path).await? {
            Some(existing) => existing.metadata.touched(),
            None => RecordMetadata::default(),
        };
        let stored = StoredRecord {
            id_attribute: record.id_attribute().to_string(),
            attributes: record.attributes().clone(),
            metadata,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&path, serde_json::to_string_pretty(&stored)?).await?;
        debug!(path = ?path, version = stored.metadata.version, "Record written");
        Ok(record)
    }

    async fn scan(&self, filter: &Record) -> std::result::Result<Vec<Record>, StorageError> {
        let model = filter.model_name();
        let dir = self.model_dir(model)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            if let Some(stored) = self.load(&path).await? {
                let record = stored.into_record(model);
                if record.matches(filter) {
                    records.push(record);
                }
            }
        }
        debug!(model, found = records.len(), "Scanned model directory");
        Ok(records)
    }
}

fn not_found(record: &Record) -> StorageError {
    StorageError::NotFound(format!(
        "{} {}",
        record.model_name(),
        display_value(record.primary_key().as_ref())
    ))
}

/// Model names and keys become path segments.
fn check_segment(segment: &str) -> std::result::Result<(), StorageError> {
    let unsafe_segment = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);
    if unsafe_segment {
        return Err(StorageError::InvalidData(format!(
            "`{}` cannot be used as a file name",
            segment
        )));
    }
    Ok(())
}

#[async_trait]
impl Repository for JsonFileStore {
    type Entity = Record;
    type Options = ();

    async fn fetch(&self, entity: &Record, _options: &()) -> Result<Record> {
        let path = self.record_path(entity)?;
        let stored = self.load(&path).await?.ok_or_else(|| not_found(entity))?;
        Ok(stored.into_record(entity.model_name()))
    }

    async fn fetch_all(&self, filter: &Record, _options: &()) -> Result<Vec<Record>> {
        Ok(self.scan(filter).await?)
    }

    async fn save(&self, entity: &Record, _options: &()) -> Result<Record> {
        Ok(self.write(entity).await?)
    }

    async fn destroy(&self, entity: &Record, _options: &()) -> Result<()> {
        let path = self.record_path(entity)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = ?path, "Record removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(entity).into()),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }
}
