use std::path::PathBuf;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

/// The four flat relations backing the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    JobApplications,
    StageTransitions,
    Notes,
    Communications,
}

impl Relation {
    pub fn file_name(&self) -> &'static str {
        match self {
            Relation::JobApplications => "job-applications.json",
            Relation::StageTransitions => "stage-transitions.json",
            Relation::Notes => "notes.json",
            Relation::Communications => "communications.json",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A relation as read from disk. Rows that do not fit `T` are kept verbatim in
/// `unparsed` so a whole-relation write puts them back untouched.
#[derive(Debug, Clone)]
pub struct Table<T> {
    pub rows: Vec<T>,
    pub unparsed: Vec<Value>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            unparsed: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    /// Drops unparsed rows whose `field` equals `id`.
    pub fn discard_unparsed(&mut self, field: &str, id: &str) {
        self.unparsed
            .retain(|row| row.get(field).and_then(Value::as_str) != Some(id));
    }
}

/// Flat-file record store. Each relation is one pretty-printed JSON array and
/// every write replaces the whole array.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_of(&self, relation: Relation) -> PathBuf {
        self.dir.join(relation.file_name())
    }

    /// Reads every row of `relation`. A missing or unreadable relation yields an
    /// empty sequence; the failure is logged and never returned. Rows that do
    /// not fit `T` are logged and skipped.
    pub async fn read_all<T: DeserializeOwned>(&self, relation: Relation) -> Vec<T> {
        self.read_table(relation).await.rows
    }

    /// Like `read_all`, but keeps the rows that did not fit `T` so a later
    /// `write_table` preserves them.
    pub async fn read_table<T: DeserializeOwned>(&self, relation: Relation) -> Table<T> {
        let path = self.path_of(relation);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Relation file {} missing, treating as empty", path.display());
                return Table::default();
            }
            Err(e) => {
                error!("Error reading {}: {e}", path.display());
                return Table::default();
            }
        };

        let values: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                error!("Error parsing {}: {e}", path.display());
                return Table::default();
            }
        };

        let mut table = Table::default();
        for (index, value) in values.into_iter().enumerate() {
            match T::deserialize(&value) {
                Ok(row) => table.rows.push(row),
                Err(e) => {
                    warn!("Skipping row {index} of {}: {e}", path.display());
                    table.unparsed.push(value);
                }
            }
        }
        table
    }

    /// Writes the parsed rows followed by the unparsed ones.
    pub async fn write_table<T: Serialize>(
        &self,
        relation: Relation,
        table: &Table<T>,
    ) -> Result<(), StoreError> {
        let mut values = table
            .rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        values.extend(table.unparsed.iter().cloned());
        self.write_all(relation, &values).await
    }

    /// Replaces `relation` with `rows`. The new content is written to a sibling
    /// temp file and renamed into place.
    pub async fn write_all<T: Serialize>(
        &self,
        relation: Relation,
        rows: &[T],
    ) -> Result<(), StoreError> {
        let path = self.path_of(relation);
        let body = serde_json::to_string_pretty(rows)?;

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, body.as_bytes()).await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        result.map_err(|source| {
            error!("Error writing {}: {source}", path.display());
            StoreError::Io {
                path: path.clone(),
                source,
            }
        })
    }
}

/// Opens the record store rooted at `dir`.
pub fn open_store(dir: &str) -> RecordStore {
    info!("Using flat-file record store at {dir}");
    RecordStore::new(dir)
}
