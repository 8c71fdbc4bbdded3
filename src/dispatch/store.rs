//! Aggregate stores
//!
//! `IncidentStore` and `UnitStore` are the CRUD seams the control-point layer
//! and the correlator share. Each call is atomic on its own; sequences of
//! calls are made atomic by the correlator's gate, so an alternative backend
//! only has to keep single calls consistent.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::dispatch::model::{Incident, Unit};
use crate::utils::{DispatchError, EntityKind, Result};

pub trait IncidentStore: Send + Sync {
    /// Insert `incident`, assigning a fresh id when it has none.
    fn create(&self, incident: Incident) -> Incident;
    fn get(&self, id: &str) -> Option<Incident>;
    /// Replace an existing incident; `NotFound` if it is absent.
    fn update(&self, incident: Incident) -> Result<Incident>;
    fn delete(&self, id: &str) -> bool;
    fn list(&self) -> Vec<Incident>;
}

pub trait UnitStore: Send + Sync {
    fn create(&self, unit: Unit) -> Unit;
    fn get(&self, id: &str) -> Option<Unit>;
    fn update(&self, unit: Unit) -> Result<Unit>;
    fn delete(&self, id: &str) -> bool;
    fn list(&self) -> Vec<Unit>;
}

/// A record keyed by its string id.
pub trait Record: Clone + Send + Sync {
    const KIND: EntityKind;

    fn key(&self) -> &str;
    fn set_key(&mut self, key: String);
}

impl Record for Incident {
    const KIND: EntityKind = EntityKind::Incident;

    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }
}

impl Record for Unit {
    const KIND: EntityKind = EntityKind::Unit;

    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }
}

/// Volatile, process-local store.
#[derive(Debug)]
pub struct MemoryStore<T> {
    records: RwLock<HashMap<String, T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, T>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, T>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, mut record: T) -> T {
        if record.key().is_empty() {
            record.set_key(Uuid::new_v4().to_string());
        }
        self.write().insert(record.key().to_string(), record.clone());
        record
    }

    fn fetch(&self, id: &str) -> Option<T> {
        self.read().get(id).cloned()
    }

    fn replace(&self, record: T) -> Result<T> {
        let mut records = self.write();
        match records.get_mut(record.key()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(DispatchError::NotFound {
                kind: T::KIND,
                id: record.key().to_string(),
            }),
        }
    }

    fn remove(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    /// All records ordered by id.
    fn all(&self) -> Vec<T> {
        let mut records: Vec<T> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        records
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl IncidentStore for MemoryStore<Incident> {
    fn create(&self, incident: Incident) -> Incident {
        self.insert(incident)
    }

    fn get(&self, id: &str) -> Option<Incident> {
        self.fetch(id)
    }

    fn update(&self, incident: Incident) -> Result<Incident> {
        self.replace(incident)
    }

    fn delete(&self, id: &str) -> bool {
        self.remove(id)
    }

    fn list(&self) -> Vec<Incident> {
        self.all()
    }
}

impl UnitStore for MemoryStore<Unit> {
    fn create(&self, unit: Unit) -> Unit {
        self.insert(unit)
    }

    fn get(&self, id: &str) -> Option<Unit> {
        self.fetch(id)
    }

    fn update(&self, unit: Unit) -> Result<Unit> {
        self.replace(unit)
    }

    fn delete(&self, id: &str) -> bool {
        self.remove(id)
    }

    fn list(&self) -> Vec<Unit> {
        self.all()
    }
}
