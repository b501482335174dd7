//! Persistence layer for the Routine Store

use crate::error::StorageError;
use crate::routine::{
    group_token, occupancy_key, CellKey, ChangeSet, CommitOutcome, RoutineSlotEntry, RoutineStore,
    SectionRef,
};
use crate::types::{DayIndex, SlotIndex, SpanId};
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::debug;

const TREE_ENTRIES: &str = "routine_entries";
const TREE_CELLS: &str = "routine_cells";
const TREE_SPANS: &str = "routine_spans";
const TREE_TEACHER_SLOTS: &str = "routine_teacher_slots";
const TREE_ROOM_SLOTS: &str = "routine_room_slots";

type TxResult<T> = Result<T, ConflictableTransactionError<StorageError>>;

/// Sled-based implementation of RoutineStore
///
/// Trees:
/// - `routine_entries`: entry key -> bincode `RoutineSlotEntry`
/// - `routine_cells`: cell key -> lab-group tokens occupying the cell
/// - `routine_spans`: span id -> entry keys of its members
/// - `routine_teacher_slots` / `routine_room_slots`: `id:day:slot` -> entry key
#[derive(Clone)]
pub struct SledRoutineStore {
    db: Db,
    entries: Tree,
    cells: Tree,
    spans: Tree,
    teacher_slots: Tree,
    room_slots: Tree,
}

impl SledRoutineStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::Unavailable(format!("Failed to open sled database: {}", e))
        })?;
        Self::from_db(db)
    }

    /// Build the store on an already opened database
    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        Ok(Self {
            entries: db.open_tree(TREE_ENTRIES)?,
            cells: db.open_tree(TREE_CELLS)?,
            spans: db.open_tree(TREE_SPANS)?,
            teacher_slots: db.open_tree(TREE_TEACHER_SLOTS)?,
            room_slots: db.open_tree(TREE_ROOM_SLOTS)?,
            db,
        })
    }

    /// Get the underlying sled database (shared with the teacher-view cache)
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::Unavailable(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    fn get_by_encoded(&self, key: &[u8]) -> Result<Option<RoutineSlotEntry>, StorageError> {
        match self.entries.get(key)? {
            Some(value) => Ok(Some(decode_entry(&value)?)),
            None => Ok(None),
        }
    }

    fn entry_via_index(
        &self,
        index: &Tree,
        index_key: &str,
    ) -> Result<Option<RoutineSlotEntry>, StorageError> {
        match index.get(index_key.as_bytes())? {
            Some(entry_key) => self.get_by_encoded(&entry_key),
            None => Ok(None),
        }
    }

    fn scan_entries(&self, prefix: &str) -> Result<Vec<RoutineSlotEntry>, StorageError> {
        let mut out = Vec::new();
        for item in self.entries.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            out.push(decode_entry(&value)?);
        }
        Ok(out)
    }
}

impl RoutineStore for SledRoutineStore {
    fn get(&self, key: &CellKey) -> Result<Option<RoutineSlotEntry>, StorageError> {
        self.get_by_encoded(key.encode().as_bytes())
    }

    fn cell_entries(&self, key: &CellKey) -> Result<Vec<RoutineSlotEntry>, StorageError> {
        self.scan_entries(&format!("{}:", key.cell_encode()))
    }

    fn teacher_entry_at(
        &self,
        teacher_id: &str,
        day: DayIndex,
        slot: SlotIndex,
    ) -> Result<Option<RoutineSlotEntry>, StorageError> {
        self.entry_via_index(&self.teacher_slots, &occupancy_key(teacher_id, day, slot))
    }

    fn room_entry_at(
        &self,
        room_id: &str,
        day: DayIndex,
        slot: SlotIndex,
    ) -> Result<Option<RoutineSlotEntry>, StorageError> {
        self.entry_via_index(&self.room_slots, &occupancy_key(room_id, day, slot))
    }

    fn span_entries(&self, span_id: &SpanId) -> Result<Vec<RoutineSlotEntry>, StorageError> {
        let Some(raw) = self.spans.get(span_id.as_str().as_bytes())? else {
            return Ok(Vec::new());
        };
        let keys = decode_keys(&raw)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.get_by_encoded(key.as_bytes())? {
                out.push(entry);
            }
        }
        out.sort_by_key(|e| e.slot_index);
        Ok(out)
    }

    fn section_entries(&self, section: &SectionRef) -> Result<Vec<RoutineSlotEntry>, StorageError> {
        self.scan_entries(&section.key_prefix())
    }

    fn teacher_entries(&self, teacher_id: &str) -> Result<Vec<RoutineSlotEntry>, StorageError> {
        let prefix = format!("{}:", teacher_id);
        let mut out = Vec::new();
        for item in self.teacher_slots.scan_prefix(prefix.as_bytes()) {
            let (_, entry_key) = item?;
            if let Some(entry) = self.get_by_encoded(&entry_key)? {
                out.push(entry);
            }
        }
        Ok(out)
    }

    fn list_all(&self) -> Result<Vec<RoutineSlotEntry>, StorageError> {
        let mut out = Vec::new();
        for item in self.entries.iter() {
            let (_, value) = item?;
            out.push(decode_entry(&value)?);
        }
        Ok(out)
    }

    fn commit(&self, change: &ChangeSet) -> Result<CommitOutcome, StorageError> {
        if change.is_empty() {
            return Ok(CommitOutcome::default());
        }

        let trees = (
            &self.entries,
            &self.cells,
            &self.spans,
            &self.teacher_slots,
            &self.room_slots,
        );
        let result = trees.transaction(|(entries, cells, spans, teachers, rooms)| {
            let tx = TxTrees {
                entries,
                cells,
                spans,
                teachers,
                rooms,
            };
            let mut removed = Vec::new();
            for key in &change.removals {
                if let Some(entry) = tx.remove_entry(key)? {
                    removed.push(entry);
                }
            }
            for entry in &change.inserts {
                tx.insert_entry(entry)?;
            }
            Ok(removed)
        });

        match result {
            Ok(removed) => {
                debug!(
                    removed = removed.len(),
                    inserted = change.inserts.len(),
                    "Committed routine change set"
                );
                Ok(CommitOutcome {
                    removed,
                    inserted: change.inserts.len(),
                })
            }
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(StorageError::Unavailable(format!(
                "Failed to commit routine change: {}",
                err
            ))),
        }
    }
}

/// Transactional views of every routine tree
struct TxTrees<'a> {
    entries: &'a TransactionalTree,
    cells: &'a TransactionalTree,
    spans: &'a TransactionalTree,
    teachers: &'a TransactionalTree,
    rooms: &'a TransactionalTree,
}

impl TxTrees<'_> {
    fn remove_entry(&self, key: &CellKey) -> TxResult<Option<RoutineSlotEntry>> {
        let encoded = key.encode();
        let Some(raw) = self.entries.remove(encoded.as_bytes())? else {
            return Ok(None);
        };
        let entry = decode_entry(&raw).map_err(ConflictableTransactionError::Abort)?;

        let cell_key = key.cell_encode();
        let mut groups = self.read_list(self.cells, &cell_key)?;
        groups.retain(|g| g != group_token(key.lab_group.as_deref()));
        self.write_list(self.cells, &cell_key, &groups)?;

        for teacher in &entry.teacher_ids {
            let slot_key = occupancy_key(teacher, entry.day_index, entry.slot_index);
            self.teachers.remove(slot_key.as_bytes())?;
        }
        let room_key = occupancy_key(&entry.room_id, entry.day_index, entry.slot_index);
        self.rooms.remove(room_key.as_bytes())?;

        if let Some(span) = &entry.span_id {
            let mut members = self.read_list(self.spans, span.as_str())?;
            members.retain(|m| m != &encoded);
            self.write_list(self.spans, span.as_str(), &members)?;
        }

        Ok(Some(entry))
    }

    fn insert_entry(&self, entry: &RoutineSlotEntry) -> TxResult<()> {
        let key = entry.key();
        let encoded = key.encode();
        if self.entries.get(encoded.as_bytes())?.is_some() {
            return Err(constraint(format!("cell {} is already occupied", key)));
        }

        let cell_key = key.cell_encode();
        let mut groups = self.read_list(self.cells, &cell_key)?;
        let token = group_token(entry.lab_group.as_deref()).to_string();
        let collides = if entry.lab_group.is_none() {
            !groups.is_empty()
        } else {
            groups.iter().any(|g| g.is_empty())
        };
        if collides {
            return Err(constraint(format!(
                "cell {} mixes whole-section and lab-group classes",
                key
            )));
        }

        for teacher in &entry.teacher_ids {
            let slot_key = occupancy_key(teacher, entry.day_index, entry.slot_index);
            if self.teachers.get(slot_key.as_bytes())?.is_some() {
                return Err(constraint(format!(
                    "teacher {} is already booked at {}",
                    teacher, slot_key
                )));
            }
            self.teachers.insert(slot_key.as_bytes(), encoded.as_bytes())?;
        }
        let room_key = occupancy_key(&entry.room_id, entry.day_index, entry.slot_index);
        if self.rooms.get(room_key.as_bytes())?.is_some() {
            return Err(constraint(format!(
                "room {} is already booked at {}",
                entry.room_id, room_key
            )));
        }
        self.rooms.insert(room_key.as_bytes(), encoded.as_bytes())?;

        groups.push(token);
        self.write_list(self.cells, &cell_key, &groups)?;

        if let Some(span) = &entry.span_id {
            let mut members = self.read_list(self.spans, span.as_str())?;
            members.push(encoded.clone());
            self.write_list(self.spans, span.as_str(), &members)?;
        }

        let value = bincode::serialize(entry).map_err(|e| {
            ConflictableTransactionError::Abort(StorageError::Corrupt(format!(
                "Failed to serialize routine entry: {}",
                e
            )))
        })?;
        self.entries.insert(encoded.as_bytes(), value)?;
        Ok(())
    }

    fn read_list(&self, tree: &TransactionalTree, key: &str) -> TxResult<Vec<String>> {
        match tree.get(key.as_bytes())? {
            Some(raw) => decode_keys(&raw).map_err(ConflictableTransactionError::Abort),
            None => Ok(Vec::new()),
        }
    }

    fn write_list(&self, tree: &TransactionalTree, key: &str, values: &[String]) -> TxResult<()> {
        if values.is_empty() {
            tree.remove(key.as_bytes())?;
            return Ok(());
        }
        let raw = bincode::serialize(values).map_err(|e| {
            ConflictableTransactionError::Abort(StorageError::Corrupt(format!(
                "Failed to serialize key list: {}",
                e
            )))
        })?;
        tree.insert(key.as_bytes(), raw)?;
        Ok(())
    }
}

fn constraint(message: String) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(StorageError::Constraint(message))
}

fn decode_entry(raw: &[u8]) -> Result<RoutineSlotEntry, StorageError> {
    bincode::deserialize(raw)
        .map_err(|e| StorageError::Corrupt(format!("Failed to deserialize routine entry: {}", e)))
}

fn decode_keys(raw: &[u8]) -> Result<Vec<String>, StorageError> {
    bincode::deserialize(raw)
        .map_err(|e| StorageError::Corrupt(format!("Failed to deserialize key list: {}", e)))
}
