//! Durable sled-backed teacher-view cache.

use crate::error::StorageError;
use crate::projection::TeacherScheduleView;
use crate::types::TeacherId;
use sled::{Db, Tree};

const TREE_TEACHER_VIEWS: &str = "teacher_views";

/// Cache of projected teacher schedules
///
/// Reads are public; only the projector writes. A view is stored as one
/// serde_json value, so replacing it is a single atomic insert.
#[derive(Clone)]
pub struct TeacherViewStore {
    views: Tree,
}

impl TeacherViewStore {
    pub fn new(db: &Db) -> Result<Self, StorageError> {
        let views = db.open_tree(TREE_TEACHER_VIEWS).map_err(to_storage_io)?;
        Ok(Self { views })
    }

    pub fn get(&self, teacher_id: &str) -> Result<Option<TeacherScheduleView>, StorageError> {
        let Some(raw) = self
            .views
            .get(teacher_id.as_bytes())
            .map_err(to_storage_io)?
        else {
            return Ok(None);
        };
        let parsed = serde_json::from_slice(&raw).map_err(to_storage_data)?;
        Ok(Some(parsed))
    }

    /// Teacher ids with a cached view, in key order
    pub fn teacher_ids(&self) -> Result<Vec<TeacherId>, StorageError> {
        let mut out = Vec::new();
        for result in self.views.iter() {
            let (key, _) = result.map_err(to_storage_io)?;
            out.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(out)
    }

    pub(crate) fn put(&self, view: &TeacherScheduleView) -> Result<(), StorageError> {
        let value = serde_json::to_vec(view).map_err(to_storage_data)?;
        self.views
            .insert(view.teacher_id.as_bytes(), value)
            .map_err(to_storage_io)?;
        Ok(())
    }
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::Unavailable(format!("teacher view store: {}", err))
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::Corrupt(format!("teacher view encoding: {}", err))
}
