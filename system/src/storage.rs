use crate::document::WhiteboardDocument;
use crate::error::PersistenceError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Backing store for the full document collection. Every write replaces everything.
pub trait DocumentStorage {
    fn read_all(&mut self) -> Result<Vec<WhiteboardDocument>, PersistenceError>;

    fn write_all(&mut self, documents: &[WhiteboardDocument]) -> Result<(), PersistenceError>;
}

/// Pretty-printed JSON array in a single file.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentStorage for JsonFileStorage {
    fn read_all(&mut self) -> Result<Vec<WhiteboardDocument>, PersistenceError> {
        if !self.path.exists() {
            log::info!("Creating empty board file {}", self.path.display());
            self.write_all(&[])?;
            return Ok(Vec::new());
        }
        let data = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn write_all(&mut self, documents: &[WhiteboardDocument]) -> Result<(), PersistenceError> {
        let data = serde_json::to_vec_pretty(documents)?;
        let temp_path = self.temp_path();

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Keeps the last written collection in memory. Can be told to fail reads and writes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: Vec<WhiteboardDocument>,
    failing: bool,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<WhiteboardDocument>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn documents(&self) -> &[WhiteboardDocument] {
        &self.documents
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DocumentStorage for MemoryStorage {
    fn read_all(&mut self) -> Result<Vec<WhiteboardDocument>, PersistenceError> {
        if self.failing {
            return Err(PersistenceError::Unavailable);
        }
        Ok(self.documents.clone())
    }

    fn write_all(&mut self, documents: &[WhiteboardDocument]) -> Result<(), PersistenceError> {
        if self.failing {
            return Err(PersistenceError::Unavailable);
        }
        self.documents = documents.to_vec();
        self.writes += 1;
        Ok(())
    }
}
