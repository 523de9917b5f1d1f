//! In-memory backend.
//!
//! Ordered maps keyed by id, with hash indexes on the columns the schema marks
//! as indexed. Serves as the baseline the on-disk engines are compared with.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use storebench_core::entity::{INT_FIELD, STRING_FIELD};
use storebench_core::scenario;
use storebench_core::{
    BackendAdapter, EntityKind, EntityStore, RunContext, SetupContext, SimpleEntity, TestType,
};

use crate::error::Error;

/// Adapter name.
pub const NAME: &str = "memory";

/// One entity shape.
#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, SimpleEntity>,
    by_string: Option<HashMap<String, BTreeSet<i64>>>,
    by_int: Option<HashMap<i32, BTreeSet<i64>>>,
}

impl Table {
    fn new(kind: EntityKind) -> Self {
        let schema = kind.schema();
        Self {
            rows: BTreeMap::new(),
            by_string: schema.is_indexed(STRING_FIELD).then(HashMap::new),
            by_int: schema.is_indexed(INT_FIELD).then(HashMap::new),
        }
    }

    fn put(&mut self, entity: &SimpleEntity) {
        if let Some(old) = self.rows.insert(entity.id, entity.clone()) {
            self.unindex(&old);
        }
        if let Some(index) = &mut self.by_string {
            index
                .entry(entity.simple_string.clone())
                .or_default()
                .insert(entity.id);
        }
        if let Some(index) = &mut self.by_int {
            index.entry(entity.simple_int).or_default().insert(entity.id);
        }
    }

    fn remove(&mut self, id: i64) {
        if let Some(old) = self.rows.remove(&id) {
            self.unindex(&old);
        }
    }

    fn unindex(&mut self, old: &SimpleEntity) {
        if let Some(index) = &mut self.by_string {
            if let Some(ids) = index.get_mut(&old.simple_string) {
                ids.remove(&old.id);
                if ids.is_empty() {
                    index.remove(&old.simple_string);
                }
            }
        }
        if let Some(index) = &mut self.by_int {
            if let Some(ids) = index.get_mut(&old.simple_int) {
                ids.remove(&old.id);
                if ids.is_empty() {
                    index.remove(&old.simple_int);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.rows.clear();
        if let Some(index) = &mut self.by_string {
            index.clear();
        }
        if let Some(index) = &mut self.by_int {
            index.clear();
        }
    }

    fn collect(&self, ids: Option<&BTreeSet<i64>>) -> Vec<SimpleEntity> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.rows.get(id).cloned())
            .collect()
    }

    fn find_by_string(&self, value: &str) -> Vec<SimpleEntity> {
        match &self.by_string {
            Some(index) => self.collect(index.get(value)),
            None => self
                .rows
                .values()
                .filter(|e| e.simple_string == value)
                .cloned()
                .collect(),
        }
    }

    fn find_by_int(&self, value: i32) -> Vec<SimpleEntity> {
        match &self.by_int {
            Some(index) => self.collect(index.get(&value)),
            None => self
                .rows
                .values()
                .filter(|e| e.simple_int == value)
                .cloned()
                .collect(),
        }
    }
}

/// Heap-only backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Option<HashMap<EntityKind, Table>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&mut self, kind: EntityKind) -> Result<&mut Table, Error> {
        self.tables
            .as_mut()
            .and_then(|tables| tables.get_mut(&kind))
            .ok_or(Error::NotOpen(NAME))
    }
}

impl BackendAdapter for MemoryBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<String> {
        Some(format!("in-memory maps {}", env!("CARGO_PKG_VERSION")))
    }

    fn set_up(&mut self, _ctx: &SetupContext) -> storebench_core::Result<()> {
        let tables = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, Table::new(kind)))
            .collect();
        self.tables = Some(tables);
        Ok(())
    }

    fn run(&mut self, test: &TestType, ctx: &mut RunContext) -> storebench_core::Result<()> {
        scenario::execute(self, test, ctx)
    }

    fn tear_down(&mut self) -> storebench_core::Result<()> {
        self.tables = None;
        Ok(())
    }
}

impl EntityStore for MemoryBackend {
    fn count(&mut self, kind: EntityKind) -> storebench_core::Result<usize> {
        Ok(self.table(kind)?.rows.len())
    }

    fn insert(
        &mut self,
        kind: EntityKind,
        entities: &[SimpleEntity],
    ) -> storebench_core::Result<()> {
        let table = self.table(kind)?;
        for entity in entities {
            table.put(entity);
        }
        Ok(())
    }

    fn update(
        &mut self,
        kind: EntityKind,
        entities: &[SimpleEntity],
    ) -> storebench_core::Result<()> {
        let table = self.table(kind)?;
        for entity in entities {
            table.put(entity);
        }
        Ok(())
    }

    fn load_all(&mut self, kind: EntityKind) -> storebench_core::Result<Vec<SimpleEntity>> {
        Ok(self.table(kind)?.rows.values().cloned().collect())
    }

    fn get(&mut self, kind: EntityKind, id: i64) -> storebench_core::Result<Option<SimpleEntity>> {
        Ok(self.table(kind)?.rows.get(&id).cloned())
    }

    fn find_by_string(
        &mut self,
        kind: EntityKind,
        value: &str,
    ) -> storebench_core::Result<Vec<SimpleEntity>> {
        Ok(self.table(kind)?.find_by_string(value))
    }

    fn find_by_int(
        &mut self,
        kind: EntityKind,
        value: i32,
    ) -> storebench_core::Result<Vec<SimpleEntity>> {
        Ok(self.table(kind)?.find_by_int(value))
    }

    fn delete(&mut self, kind: EntityKind, ids: &[i64]) -> storebench_core::Result<()> {
        let table = self.table(kind)?;
        for &id in ids {
            table.remove(id);
        }
        Ok(())
    }

    fn delete_all(&mut self, kind: EntityKind) -> storebench_core::Result<()> {
        self.table(kind)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: i64, s: &str, n: i32) -> SimpleEntity {
        SimpleEntity {
            id,
            simple_string: s.to_string(),
            simple_int: n,
            ..Default::default()
        }
    }

    fn open() -> MemoryBackend {
        let mut backend = MemoryBackend::new();
        backend.set_up(&SetupContext::new("/unused", 0)).unwrap();
        backend
    }

    #[test]
    fn test_requires_setup() {
        let mut backend = MemoryBackend::new();
        assert!(backend.count(EntityKind::Simple).is_err());
    }

    #[test]
    fn test_index_follows_updates() {
        let mut backend = open();
        let kind = EntityKind::Indexed;
        backend
            .insert(kind, &[entity(1, "abc", 7), entity(2, "abc", 8)])
            .unwrap();
        assert_eq!(backend.find_by_string(kind, "abc").unwrap().len(), 2);

        backend.update(kind, &[entity(1, "xyz", 8)]).unwrap();
        assert_eq!(backend.find_by_string(kind, "abc").unwrap().len(), 1);
        assert_eq!(backend.find_by_string(kind, "xyz").unwrap()[0].id, 1);
        assert_eq!(backend.find_by_int(kind, 8).unwrap().len(), 2);
        assert!(backend.find_by_int(kind, 7).unwrap().is_empty());

        backend.delete(kind, &[2]).unwrap();
        assert!(backend.find_by_string(kind, "abc").unwrap().is_empty());
        assert_eq!(backend.count(kind).unwrap(), 1);
    }

    #[test]
    fn test_string_match_is_case_sensitive() {
        let mut backend = open();
        backend
            .insert(EntityKind::Simple, &[entity(1, "Abc", 1)])
            .unwrap();
        assert!(backend
            .find_by_string(EntityKind::Simple, "abc")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_tear_down_drops_data() {
        let mut backend = open();
        backend.insert(EntityKind::Simple, &[entity(1, "a", 1)]).unwrap();
        backend.tear_down().unwrap();
        backend.set_up(&SetupContext::new("/unused", 1)).unwrap();
        assert_eq!(backend.count(EntityKind::Simple).unwrap(), 0);
    }
}
