//! On-disk (or any other) persistence of built schemas

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ModelSchema;
use crate::error::{ModelError, ModelResult};

/// Distinguishes temporary files of concurrent writers within one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Storage for serialized schemas, keyed by model name
pub trait SchemaCacheStore: Send + Sync {
    /// Stored bytes for `model`, `None` when nothing is stored
    fn load(&self, model: &str) -> ModelResult<Option<Vec<u8>>>;

    /// Replace the stored bytes for `model`; readers never see a partial entry
    fn save(&self, model: &str, bytes: &[u8]) -> ModelResult<()>;

    /// Time since the entry for `model` was written
    fn age(&self, model: &str) -> ModelResult<Option<Duration>>;
}

/// What is written for each model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub written_at: DateTime<Utc>,
    pub schema: ModelSchema,
}

impl CacheEnvelope {
    pub fn new(schema: ModelSchema) -> Self {
        Self {
            written_at: Utc::now(),
            schema,
        }
    }

    pub fn to_bytes(&self) -> ModelResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ModelResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// One JSON file per model under a directory
#[derive(Debug, Clone)]
pub struct FileSchemaCache {
    dir: PathBuf,
}

impl FileSchemaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(model)))
    }
}

fn file_stem(model: &str) -> String {
    model
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

impl SchemaCacheStore for FileSchemaCache {
    fn load(&self, model: &str) -> ModelResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(model)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, model: &str, bytes: &[u8]) -> ModelResult<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(model);
        let temp = self
            .dir
            .join(format!(
                ".{}.{}.{}.tmp",
                file_stem(model),
                std::process::id(),
                TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
            ));

        let mut file = fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &target).map_err(|e| {
            let _ = fs::remove_file(&temp);
            ModelError::Cache(format!("Failed to move schema cache into place for '{}': {}", model, e))
        })
    }

    fn age(&self, model: &str) -> ModelResult<Option<Duration>> {
        let metadata = match fs::metadata(self.path_for(model)) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = metadata.modified()?;
        // a clock that went backwards counts as freshly written
        Ok(Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        ))
    }
}
