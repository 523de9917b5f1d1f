//! sled backend.
//!
//! Each entity shape is a tree keyed by the big-endian id, holding rkyv
//! encoded records. Indexed shapes keep one extra tree per indexed column
//! whose keys are `value ++ id`, so an equality lookup is a prefix scan.

use std::collections::HashMap;
use std::path::PathBuf;

use rkyv::{Archive, Deserialize, Serialize};
use sled::{Batch, Db, Tree};
use storebench_core::entity::{INT_FIELD, STRING_FIELD};
use storebench_core::scenario;
use storebench_core::{
    BackendAdapter, EntityKind, EntityStore, RunContext, SetupContext, SimpleEntity, TestType,
};

use crate::error::{Error, Result};
use crate::workdir;

/// Adapter name.
pub const NAME: &str = "sled";

/// Version of the embedded engine this adapter is built against.
const SLED_VERSION: &str = "0.34";

/// Stored form of an entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredEntity {
    pub id: i64,
    pub simple_boolean: bool,
    pub simple_byte: i8,
    pub simple_short: i16,
    pub simple_int: i32,
    pub simple_long: i64,
    pub simple_float: f32,
    pub simple_double: f64,
    pub simple_string: String,
    pub simple_byte_array: Vec<u8>,
}

impl From<&SimpleEntity> for StoredEntity {
    fn from(e: &SimpleEntity) -> Self {
        Self {
            id: e.id,
            simple_boolean: e.simple_boolean,
            simple_byte: e.simple_byte,
            simple_short: e.simple_short,
            simple_int: e.simple_int,
            simple_long: e.simple_long,
            simple_float: e.simple_float,
            simple_double: e.simple_double,
            simple_string: e.simple_string.clone(),
            simple_byte_array: e.simple_byte_array.clone(),
        }
    }
}

impl From<StoredEntity> for SimpleEntity {
    fn from(e: StoredEntity) -> Self {
        Self {
            id: e.id,
            simple_boolean: e.simple_boolean,
            simple_byte: e.simple_byte,
            simple_short: e.simple_short,
            simple_int: e.simple_int,
            simple_long: e.simple_long,
            simple_float: e.simple_float,
            simple_double: e.simple_double,
            simple_string: e.simple_string,
            simple_byte_array: e.simple_byte_array,
        }
    }
}

impl StoredEntity {
    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    ///
    /// sled hands out values without alignment guarantees, so the bytes are
    /// copied into an aligned buffer first.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Primary key encoding.
pub fn id_key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_id(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
    Ok(i64::from_be_bytes(raw))
}

/// Index key prefix for a string value: length, then the bytes.
pub fn string_prefix(value: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + value.len() + 8);
    key.extend_from_slice(&(value.len() as u32).to_be_bytes());
    key.extend_from_slice(value.as_bytes());
    key
}

/// Index key prefix for an integer value, order-preserving for negatives.
pub fn int_prefix(value: i32) -> Vec<u8> {
    ((value as u32) ^ 0x8000_0000).to_be_bytes().to_vec()
}

fn index_key(mut prefix: Vec<u8>, id: i64) -> Vec<u8> {
    prefix.extend_from_slice(&id_key(id));
    prefix
}

/// Trees of one entity shape.
struct SledTable {
    rows: Tree,
    by_string: Option<Tree>,
    by_int: Option<Tree>,
}

impl SledTable {
    fn open(db: &Db, kind: EntityKind) -> Result<Self> {
        let schema = kind.schema();
        let index_tree = |field: &str| -> Result<Option<Tree>> {
            if schema.is_indexed(field) {
                Ok(Some(db.open_tree(format!("{}/{}", schema.name, field))?))
            } else {
                Ok(None)
            }
        };
        Ok(Self {
            rows: db.open_tree(schema.name)?,
            by_string: index_tree(STRING_FIELD)?,
            by_int: index_tree(INT_FIELD)?,
        })
    }

    fn is_indexed(&self) -> bool {
        self.by_string.is_some() || self.by_int.is_some()
    }

    fn decode(bytes: &[u8]) -> Result<SimpleEntity> {
        Ok(StoredEntity::from_bytes(bytes)?.into())
    }

    fn get(&self, id: i64) -> Result<Option<SimpleEntity>> {
        self.rows
            .get(id_key(id))?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    fn write(&self, entities: &[SimpleEntity], replace: bool) -> Result<()> {
        let mut rows = Batch::default();
        let mut strings = Batch::default();
        let mut ints = Batch::default();
        let indexed = self.is_indexed();

        for entity in entities {
            if replace && indexed {
                if let Some(old) = self.get(entity.id)? {
                    self.unindex(&old, &mut strings, &mut ints);
                }
            }
            let bytes = StoredEntity::from(entity).to_bytes()?;
            rows.insert(id_key(entity.id).to_vec(), bytes);
            if indexed {
                let string_key = index_key(string_prefix(&entity.simple_string), entity.id);
                strings.insert(string_key, Vec::<u8>::new());
                ints.insert(index_key(int_prefix(entity.simple_int), entity.id), Vec::<u8>::new());
            }
        }

        self.rows.apply_batch(rows)?;
        if let Some(tree) = &self.by_string {
            tree.apply_batch(strings)?;
        }
        if let Some(tree) = &self.by_int {
            tree.apply_batch(ints)?;
        }
        Ok(())
    }

    fn unindex(&self, old: &SimpleEntity, strings: &mut Batch, ints: &mut Batch) {
        strings.remove(index_key(string_prefix(&old.simple_string), old.id));
        ints.remove(index_key(int_prefix(old.simple_int), old.id));
    }

    fn delete(&self, ids: &[i64]) -> Result<()> {
        let mut rows = Batch::default();
        let mut strings = Batch::default();
        let mut ints = Batch::default();
        let indexed = self.is_indexed();

        for &id in ids {
            if indexed {
                if let Some(old) = self.get(id)? {
                    self.unindex(&old, &mut strings, &mut ints);
                }
            }
            rows.remove(id_key(id).to_vec());
        }

        self.rows.apply_batch(rows)?;
        if let Some(tree) = &self.by_string {
            tree.apply_batch(strings)?;
        }
        if let Some(tree) = &self.by_int {
            tree.apply_batch(ints)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.rows.clear()?;
        for tree in [&self.by_string, &self.by_int].into_iter().flatten() {
            tree.clear()?;
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<SimpleEntity>> {
        self.rows
            .iter()
            .values()
            .map(|value| Self::decode(&value?))
            .collect()
    }

    /// Resolve an index prefix scan to entities.
    fn lookup(&self, index: &Tree, prefix: &[u8]) -> Result<Vec<SimpleEntity>> {
        let mut found = Vec::new();
        for key in index.scan_prefix(prefix).keys() {
            let key = key?;
            let id = decode_id(&key[prefix.len()..])?;
            if let Some(entity) = self.get(id)? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    fn scan(&self, matches: impl Fn(&SimpleEntity) -> bool) -> Result<Vec<SimpleEntity>> {
        let mut found = Vec::new();
        for value in self.rows.iter().values() {
            let entity = Self::decode(&value?)?;
            if matches(&entity) {
                found.push(entity);
            }
        }
        Ok(found)
    }

    fn find_by_string(&self, value: &str) -> Result<Vec<SimpleEntity>> {
        match &self.by_string {
            Some(index) => self.lookup(index, &string_prefix(value)),
            None => self.scan(|e| e.simple_string == value),
        }
    }

    fn find_by_int(&self, value: i32) -> Result<Vec<SimpleEntity>> {
        match &self.by_int {
            Some(index) => self.lookup(index, &int_prefix(value)),
            None => self.scan(|e| e.simple_int == value),
        }
    }
}

/// Open database with its trees.
struct SledSession {
    db: Db,
    dir: PathBuf,
    tables: HashMap<EntityKind, SledTable>,
}

/// Embedded sled adapter.
#[derive(Default)]
pub struct SledBackend {
    session: Option<SledSession>,
}

impl SledBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: EntityKind) -> Result<&SledTable> {
        self.session
            .as_ref()
            .and_then(|s| s.tables.get(&kind))
            .ok_or(Error::NotOpen(NAME))
    }

    fn open(&mut self, ctx: &SetupContext) -> Result<()> {
        let dir = ctx.backend_dir(NAME);
        workdir::remove(&dir)?;

        let (db, tables) = workdir::or_discard(&dir, || {
            let db = sled::Config::new()
                .path(&dir)
                .mode(sled::Mode::HighThroughput)
                .open()?;
            let mut tables = HashMap::new();
            for kind in EntityKind::ALL {
                tables.insert(kind, SledTable::open(&db, kind)?);
            }
            Ok((db, tables))
        })?;
        tracing::debug!(
            path = %dir.display(),
            trees = db.tree_names().len(),
            "sled database opened"
        );

        self.session = Some(SledSession { db, dir, tables });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let SledSession { db, dir, tables } = session;
        drop(tables);
        let flushed = db.flush();
        drop(db);
        workdir::or_discard(&dir, || flushed.map(|_| ()).map_err(Error::from))?;
        workdir::remove(&dir)
    }
}

impl BackendAdapter for SledBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<String> {
        Some(format!("sled {}", SLED_VERSION))
    }

    fn set_up(&mut self, ctx: &SetupContext) -> storebench_core::Result<()> {
        Ok(self.open(ctx)?)
    }

    fn run(&mut self, test: &TestType, ctx: &mut RunContext) -> storebench_core::Result<()> {
        scenario::execute(self, test, ctx)
    }

    fn tear_down(&mut self) -> storebench_core::Result<()> {
        Ok(self.close()?)
    }
}

impl EntityStore for SledBackend {
    fn count(&mut self, kind: EntityKind) -> storebench_core::Result<usize> {
        Ok(self.table(kind)?.rows.len())
    }

    fn insert(
        &mut self,
        kind: EntityKind,
        entities: &[SimpleEntity],
    ) -> storebench_core::Result<()> {
        Ok(self.table(kind)?.write(entities, false)?)
    }

    fn update(
        &mut self,
        kind: EntityKind,
        entities: &[SimpleEntity],
    ) -> storebench_core::Result<()> {
        Ok(self.table(kind)?.write(entities, true)?)
    }

    fn load_all(&mut self, kind: EntityKind) -> storebench_core::Result<Vec<SimpleEntity>> {
        Ok(self.table(kind)?.load_all()?)
    }

    fn get(&mut self, kind: EntityKind, id: i64) -> storebench_core::Result<Option<SimpleEntity>> {
        Ok(self.table(kind)?.get(id)?)
    }

    fn find_by_string(
        &mut self,
        kind: EntityKind,
        value: &str,
    ) -> storebench_core::Result<Vec<SimpleEntity>> {
        Ok(self.table(kind)?.find_by_string(value)?)
    }

    fn find_by_int(
        &mut self,
        kind: EntityKind,
        value: i32,
    ) -> storebench_core::Result<Vec<SimpleEntity>> {
        Ok(self.table(kind)?.find_by_int(value)?)
    }

    fn delete(&mut self, kind: EntityKind, ids: &[i64]) -> storebench_core::Result<()> {
        Ok(self.table(kind)?.delete(ids)?)
    }

    fn delete_all(&mut self, kind: EntityKind) -> storebench_core::Result<()> {
        Ok(self.table(kind)?.clear()?)
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
            simple_byte_array: vec![1, 2, 3],
            ..Default::default()
        }
    }

    #[test]
    fn test_stored_entity_encoding() {
        let original = entity(42, "hello", -5);
        let bytes = StoredEntity::from(&original).to_bytes().unwrap();
        let decoded: SimpleEntity = StoredEntity::from_bytes(&bytes).unwrap().into();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_int_prefix_preserves_order() {
        assert!(int_prefix(-1) < int_prefix(0));
        assert!(int_prefix(0) < int_prefix(999));
        assert!(int_prefix(i32::MIN) < int_prefix(-1));
    }

    #[test]
    fn test_string_prefix_does_not_match_longer_values() {
        let short = index_key(string_prefix("ab"), 1);
        assert!(!short.starts_with(&string_prefix("abc")));
        assert!(!index_key(string_prefix("abc"), 1).starts_with(&string_prefix("ab")));
    }

    #[test]
    fn test_index_lookup_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SetupContext::new(dir.path(), 0);
        let mut backend = SledBackend::new();
        backend.set_up(&ctx).unwrap();

        let kind = EntityKind::Indexed;
        backend
            .insert(kind, &[entity(1, "abc", 7), entity(2, "abc", -7)])
            .unwrap();
        assert_eq!(backend.find_by_string(kind, "abc").unwrap().len(), 2);
        assert_eq!(backend.find_by_int(kind, -7).unwrap()[0].id, 2);

        backend.update(kind, &[entity(1, "xyz", -7)]).unwrap();
        assert_eq!(backend.find_by_string(kind, "abc").unwrap().len(), 1);
        assert_eq!(backend.find_by_int(kind, -7).unwrap().len(), 2);
        assert!(backend.find_by_int(kind, 7).unwrap().is_empty());

        backend.delete(kind, &[1, 2]).unwrap();
        assert_eq!(backend.count(kind).unwrap(), 0);
        assert!(backend.find_by_int(kind, -7).unwrap().is_empty());

        backend.tear_down().unwrap();
        assert!(!ctx.backend_dir(NAME).exists());
    }

    #[test]
    fn test_unindexed_shape_scans() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = SledBackend::new();
        backend.set_up(&SetupContext::new(dir.path(), 0)).unwrap();

        let kind = EntityKind::Simple;
        backend.insert(kind, &[entity(1, "a", 1), entity(2, "b", 1)]).unwrap();
        assert_eq!(backend.find_by_int(kind, 1).unwrap().len(), 2);
        assert_eq!(backend.find_by_string(kind, "b").unwrap()[0].id, 2);
        assert_eq!(backend.load_all(kind).unwrap().len(), 2);
        backend.delete_all(kind).unwrap();
        assert_eq!(backend.count(kind).unwrap(), 0);
        backend.tear_down().unwrap();
    }
}
