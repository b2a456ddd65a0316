use crate::error::{ReconcileError, Result};
use crate::quality::{Grade, QualityScore};
use crate::resolver::ColumnMapping;
use crate::schema::DatasetType;
use crate::table::NormalizedTable;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One accepted upload, immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSlot {
    pub table: NormalizedTable,
    pub mapping: ColumnMapping,
    pub quality: QualityScore,
    pub ingested_at: DateTime<Utc>,
}

impl DatasetSlot {
    pub fn new(table: NormalizedTable, mapping: ColumnMapping, quality: QualityScore) -> Self {
        Self {
            table,
            mapping,
            quality,
            ingested_at: Utc::now(),
        }
    }

    pub fn dataset(&self) -> DatasetType {
        self.table.dataset
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    slots: BTreeMap<DatasetType, Arc<DatasetSlot>>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            slots: BTreeMap::new(),
        }
    }

    pub fn slot(&self, dataset: DatasetType) -> Option<&Arc<DatasetSlot>> {
        self.slots.get(&dataset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub quality_score: f64,
    pub grade: Grade,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub loaded_types: Vec<DatasetType>,
    pub missing_types: Vec<DatasetType>,
    pub ready_for_full_synthesis: bool,
    pub ready_for_minimum_synthesis: bool,
    pub loaded: BTreeMap<DatasetType, SlotSummary>,
}

/// Point-in-time copy of a session's slots. Later uploads do not affect it.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    slots: BTreeMap<DatasetType, Arc<DatasetSlot>>,
}

impl SessionSnapshot {
    pub fn slot(&self, dataset: DatasetType) -> Option<&DatasetSlot> {
        self.slots.get(&dataset).map(Arc::as_ref)
    }

    pub fn table(&self, dataset: DatasetType) -> Option<&NormalizedTable> {
        self.slot(dataset).map(|s| &s.table)
    }

    pub fn loaded_types(&self) -> impl Iterator<Item = DatasetType> + '_ {
        self.slots.keys().copied()
    }
}

/// Random v4 uuid, not yet registered in any store.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Process-wide registry of upload sessions.
///
/// The map is guarded by a read-write lock and each session by its own mutex,
/// so uploads into different sessions never wait on each other. Each call holds
/// a session's mutex for its whole duration; concurrent writes to the same slot
/// resolve last-write-wins.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh session under a random v4 uuid.
    pub fn create_session(&self) -> String {
        let id = new_session_id();
        self.ensure_session(&id);
        id
    }

    pub fn ensure_session(&self, session_id: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().get(session_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write();
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!("Creating session {}", session_id);
            Arc::new(Mutex::new(Session::new(session_id.to_string())))
        }))
    }

    fn session(&self, session_id: &str) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ReconcileError::SessionNotFound(session_id.to_string()))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Stores `slot` under its dataset type, replacing any earlier upload of that type.
    pub fn put(&self, session_id: &str, slot: DatasetSlot) -> Option<Arc<DatasetSlot>> {
        let session = self.ensure_session(session_id);
        let mut session = session.lock();
        let dataset = slot.dataset();
        let previous = session.slots.insert(dataset, Arc::new(slot));
        debug!(
            "Session {}: {} slot {}",
            session_id,
            dataset,
            if previous.is_some() { "replaced" } else { "filled" }
        );
        previous
    }

    pub fn status(&self, session_id: &str) -> Result<SessionStatus> {
        let session = self.session(session_id)?;
        let session = session.lock();

        let loaded: BTreeMap<DatasetType, SlotSummary> = session
            .slots
            .iter()
            .map(|(dataset, slot)| {
                (
                    *dataset,
                    SlotSummary {
                        rows: slot.table.row_count(),
                        columns: slot.table.columns.clone(),
                        quality_score: slot.quality.score,
                        grade: slot.quality.grade,
                        ingested_at: slot.ingested_at,
                    },
                )
            })
            .collect();
        let missing_types: Vec<DatasetType> = DatasetType::ALL
            .into_iter()
            .filter(|t| !loaded.contains_key(t))
            .collect();

        Ok(SessionStatus {
            session_id: session.id.clone(),
            loaded_types: loaded.keys().copied().collect(),
            ready_for_full_synthesis: missing_types.is_empty(),
            ready_for_minimum_synthesis: DatasetType::MINIMUM
                .iter()
                .all(|t| loaded.contains_key(t)),
            missing_types,
            loaded,
        })
    }

    pub fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
        let session = self.session(session_id)?;
        let session = session.lock();
        Ok(SessionSnapshot {
            session_id: session.id.clone(),
            slots: session.slots.clone(),
        })
    }

    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        match self.sessions.write().remove(session_id) {
            Some(_) => {
                debug!("Deleted session {}", session_id);
                Ok(())
            }
            None => Err(ReconcileError::SessionNotFound(session_id.to_string())),
        }
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::AnomalyCounts;
    use std::thread;

    fn slot(dataset: DatasetType, rows: usize) -> DatasetSlot {
        DatasetSlot::new(
            NormalizedTable {
                dataset,
                columns: vec!["c".into()],
                source_columns: vec!["c".into()],
                rows: vec![vec![]; rows],
            },
            ColumnMapping::default(),
            QualityScore::from_counts(1, 1, AnomalyCounts::default()),
        )
    }

    #[test]
    fn test_status_tracks_loaded_types() {
        let store = SessionStore::new();
        store.put("s1", slot(DatasetType::Sales, 3));

        let status = store.status("s1").unwrap();
        assert_eq!(status.loaded_types, vec![DatasetType::Sales]);
        assert_eq!(status.missing_types.len(), 5);
        assert!(!status.ready_for_minimum_synthesis);
        assert_eq!(status.loaded[&DatasetType::Sales].rows, 3);

        store.put("s1", slot(DatasetType::Purchases, 1));
        assert!(store.status("s1").unwrap().ready_for_minimum_synthesis);

        for dataset in DatasetType::ALL {
            store.put("s1", slot(dataset, 1));
        }
        let status = store.status("s1").unwrap();
        assert!(status.ready_for_full_synthesis);
        assert!(status.missing_types.is_empty());
    }

    #[test]
    fn test_reupload_replaces_slot() {
        let store = SessionStore::new();
        assert!(store.put("s1", slot(DatasetType::Payroll, 2)).is_none());
        let previous = store.put("s1", slot(DatasetType::Payroll, 7)).unwrap();
        assert_eq!(previous.table.row_count(), 2);
        assert_eq!(store.status("s1").unwrap().loaded[&DatasetType::Payroll].rows, 7);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_uploads() {
        let store = SessionStore::new();
        store.put("s1", slot(DatasetType::Sales, 2));
        let snapshot = store.snapshot("s1").unwrap();
        store.put("s1", slot(DatasetType::Sales, 9));
        assert_eq!(snapshot.table(DatasetType::Sales).unwrap().row_count(), 2);
        assert!(snapshot.table(DatasetType::Inventory).is_none());
    }

    #[test]
    fn test_unknown_and_deleted_sessions() {
        let store = SessionStore::new();
        let id = store.create_session();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert!(store.status(&id).unwrap().loaded_types.is_empty());

        store.delete_session(&id).unwrap();
        assert!(matches!(store.status(&id), Err(ReconcileError::SessionNotFound(_))));
        assert!(matches!(store.delete_session(&id), Err(ReconcileError::SessionNotFound(_))));
        assert!(store.snapshot("nope").is_err());
    }

    #[test]
    fn test_concurrent_sessions() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let id = format!("session-{}", i);
                    for dataset in DatasetType::ALL {
                        store.put(&id, slot(dataset, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.session_ids().len(), 8);
        for i in 0..8 {
            let status = store.status(&format!("session-{}", i)).unwrap();
            assert!(status.ready_for_full_synthesis);
            assert_eq!(status.loaded[&DatasetType::Sales].rows, i);
        }
    }
}
