//! Persisted position within a preset.

use crate::error::CursorError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::{fs, io};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCursor {
    pub preset_id: String,
    pub step_index: usize,
    /// Grid layout of the current step, cached for the renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_layout_id: Option<String>,
}

/// Storage for the single active [`SessionCursor`].
pub trait CursorStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionCursor>, CursorError>;
    fn save(&self, cursor: &SessionCursor) -> Result<(), CursorError>;
    fn clear(&self) -> Result<(), CursorError>;
}

/// Cursor kept in a JSON file. A missing file means "no cursor".
#[derive(Clone, Debug)]
pub struct JsonCursorStore {
    path: PathBuf,
}

impl JsonCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CursorStore for JsonCursorStore {
    fn load(&self) -> Result<Option<SessionCursor>, CursorError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, cursor: &SessionCursor) -> Result<(), CursorError> {
        let json = serde_json::to_string_pretty(cursor)?;
        // write-then-rename so a crash never leaves a truncated cursor
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CursorError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process cursor store; clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryCursorStore {
    slot: Arc<Mutex<Option<SessionCursor>>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: SessionCursor) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(cursor))),
        }
    }

    /// Current contents without going through the trait.
    pub fn get(&self) -> Option<SessionCursor> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SessionCursor>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Result<Option<SessionCursor>, CursorError> {
        Ok(self.lock().clone())
    }

    fn save(&self, cursor: &SessionCursor) -> Result<(), CursorError> {
        *self.lock() = Some(cursor.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CursorError> {
        *self.lock() = None;
        Ok(())
    }
}
