//! Run checkpoints keyed by thread id

use crate::error::CheckpointError;
use crate::record::{file_stem, RunState};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub trait Checkpointer: Send + Sync {
    fn load(&self, thread_id: &str) -> Result<Option<RunState>, CheckpointError>;

    fn save(&self, thread_id: &str, state: &RunState) -> Result<(), CheckpointError>;
}

/// Process-local checkpoints; lost on exit
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    states: Mutex<HashMap<String, RunState>>,
}

impl Checkpointer for MemoryCheckpointer {
    fn load(&self, thread_id: &str) -> Result<Option<RunState>, CheckpointError> {
        Ok(self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned())
    }

    fn save(&self, thread_id: &str, state: &RunState) -> Result<(), CheckpointError> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per thread under `dir`
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf, CheckpointError> {
        let stem = file_stem(thread_id).ok_or(CheckpointError::EmptyThreadId)?;
        Ok(self.dir.join(format!("{}.json", stem)))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Checkpointer for FileCheckpointer {
    fn load(&self, thread_id: &str) -> Result<Option<RunState>, CheckpointError> {
        let path = self.path_for(thread_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, thread_id: &str, state: &RunState) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let path = self.path_for(thread_id)?;
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&path, json).map_err(|e| io_error(&path, e))
    }
}
