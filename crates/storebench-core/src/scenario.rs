//! Canonical per-test-type behavior.
//!
//! Each scenario is written once against [`EntityStore`], so every backend
//! receives the same entities, the same probes and the same phase sequence.
//! Preparation (building entities, populating data for query tests) and
//! verification happen outside of timed phases.

use std::hint::black_box;

use crate::backend::{EntityStore, RunContext};
use crate::catalog::{TestKind, TestType};
use crate::entity::{EntityKind, SimpleEntity};
use crate::error::{Error, Result};

/// Phase labels used by the scenarios.
pub mod phases {
    pub const INSERT: &str = "insert";
    pub const UPDATE: &str = "update";
    pub const LOAD: &str = "load";
    pub const ACCESS: &str = "access";
    pub const DELETE: &str = "delete";
    pub const QUERY: &str = "query";
    pub const LOAD_INDEXED: &str = "load indexed";
    pub const DELETE_INDEXED: &str = "delete indexed";
}

/// Execute `test` against `store`, recording phases in `ctx`.
pub fn execute<S>(store: &mut S, test: &TestType, ctx: &mut RunContext) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    if ctx.test() != test.kind {
        return Err(Error::Config(format!(
            "run context prepared for {} cannot run {}",
            ctx.test(),
            test.short_name
        )));
    }

    let kind = test.kind.entity_kind();
    let scalars_only = test.kind.scalars_only();

    let existing = store.count(EntityKind::Simple)? + store.count(EntityKind::Indexed)?;
    tracing::info!(test = test.short_name, objects = existing, "current data in store");

    match test.kind {
        TestKind::CreateUpdate | TestKind::CreateUpdateScalars | TestKind::CreateUpdateIndexed => {
            create_update(store, ctx, kind, scalars_only).map(|_| ())
        }
        TestKind::Crud | TestKind::CrudScalars | TestKind::CrudIndexed => {
            crud(store, ctx, kind, scalars_only)
        }
        TestKind::QueryString | TestKind::QueryStringIndexed => query_by_string(store, ctx, kind),
        TestKind::QueryInteger | TestKind::QueryIntegerIndexed => query_by_int(store, ctx, kind),
        TestKind::QueryId => query_by_id(store, ctx, false),
        TestKind::QueryIdRandom => query_by_id(store, ctx, true),
        TestKind::DeleteAll => delete_all(store, ctx),
    }
}

/// Fold every field of every entity into a checksum.
pub fn access_all(entities: &[SimpleEntity]) -> u64 {
    entities
        .iter()
        .fold(0u64, |acc, e| acc.wrapping_add(e.access()))
}

fn create_update<S>(
    store: &mut S,
    ctx: &mut RunContext,
    kind: EntityKind,
    scalars_only: bool,
) -> Result<Vec<SimpleEntity>>
where
    S: EntityStore + ?Sized,
{
    let count = ctx.entity_count();
    let mut entities = ctx.factory_mut().create_batch(count, scalars_only);

    ctx.phase(phases::INSERT, || store.insert(kind, &entities))?;
    tracing::info!(entity = %kind, count, "test data inserted");

    ctx.factory_mut().randomize_all(&mut entities, scalars_only);
    ctx.phase(phases::UPDATE, || store.update(kind, &entities))?;

    Ok(entities)
}

fn crud<S>(store: &mut S, ctx: &mut RunContext, kind: EntityKind, scalars_only: bool) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    let expected = create_update(store, ctx, kind, scalars_only)?;

    let reloaded = ctx.phase(phases::LOAD, || store.load_all(kind))?;
    let checksum = ctx.phase(phases::ACCESS, || Ok(access_all(&reloaded)))?;
    black_box(checksum);

    verify_same_entities(&expected, &reloaded)?;

    let ids: Vec<i64> = reloaded.iter().map(|e| e.id).collect();
    ctx.phase(phases::DELETE, || store.delete(kind, &ids))?;

    verify_empty(store, kind)
}

/// Insert `entity_count` fresh entities without timing.
fn populate<S>(store: &mut S, ctx: &mut RunContext, kind: EntityKind) -> Result<Vec<SimpleEntity>>
where
    S: EntityStore + ?Sized,
{
    let count = ctx.entity_count();
    let entities = ctx.factory_mut().create_batch(count, false);
    store.insert(kind, &entities)?;
    tracing::info!(entity = %kind, count, "test data inserted");
    Ok(entities)
}

/// Entity whose values are used as query probe.
///
/// Always the entity at the first value of the index sequence, so the probe is
/// identical for every backend.
fn probe<'a>(ctx: &RunContext, entities: &'a [SimpleEntity]) -> Result<&'a SimpleEntity> {
    let last = entities
        .len()
        .checked_sub(1)
        .ok_or_else(|| Error::Verification("no entities to probe".to_string()))?;
    let index = ctx.generator().generate_indices(1, last)?[0];
    Ok(&entities[index])
}

fn query_by_string<S>(store: &mut S, ctx: &mut RunContext, kind: EntityKind) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    let entities = populate(store, ctx, kind)?;
    let probe = probe(ctx, &entities)?;
    let value = probe.simple_string.as_str();

    let found = ctx.phase(phases::QUERY, || {
        let result = store.find_by_string(kind, value)?;
        black_box(access_all(&result));
        Ok(result)
    })?;
    tracing::info!(found = found.len(), "entities found");

    if found.iter().any(|e| e.simple_string != value) {
        return Err(Error::Verification(
            "string query returned non-matching entities".to_string(),
        ));
    }
    verify_contains(&found, probe.id)
}

fn query_by_int<S>(store: &mut S, ctx: &mut RunContext, kind: EntityKind) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    let entities = populate(store, ctx, kind)?;
    let probe = probe(ctx, &entities)?;
    let value = probe.simple_int;

    let found = ctx.phase(phases::QUERY, || {
        let result = store.find_by_int(kind, value)?;
        black_box(access_all(&result));
        Ok(result)
    })?;
    tracing::info!(found = found.len(), "entities found");

    let expected = entities.iter().filter(|e| e.simple_int == value).count();
    if found.len() != expected || found.iter().any(|e| e.simple_int != value) {
        return Err(Error::Verification(format!(
            "integer query for {} returned {} entities, expected {}",
            value,
            found.len(),
            expected
        )));
    }
    verify_contains(&found, probe.id)
}

fn query_by_id<S>(store: &mut S, ctx: &mut RunContext, random: bool) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    let kind = EntityKind::Simple;
    let entities = populate(store, ctx, kind)?;

    let ids: Vec<i64> = if random {
        ctx.generator()
            .generate_indices(entities.len(), entities.len() - 1)?
            .into_iter()
            .map(|i| entities[i].id)
            .collect()
    } else {
        entities.iter().map(|e| e.id).collect()
    };

    let checksum = ctx.phase(phases::QUERY, || {
        let mut checksum = 0u64;
        for &id in &ids {
            let entity = store
                .get(kind, id)?
                .ok_or_else(|| Error::Verification(format!("entity {} not found", id)))?;
            checksum = checksum.wrapping_add(entity.access());
        }
        Ok(checksum)
    })?;
    black_box(checksum);
    Ok(())
}

fn delete_all<S>(store: &mut S, ctx: &mut RunContext) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    for kind in EntityKind::ALL {
        populate(store, ctx, kind)?;
    }

    for (kind, load, delete) in [
        (EntityKind::Simple, phases::LOAD, phases::DELETE),
        (EntityKind::Indexed, phases::LOAD_INDEXED, phases::DELETE_INDEXED),
    ] {
        let loaded = ctx.phase(load, || store.load_all(kind))?;
        if loaded.len() != ctx.entity_count() {
            return Err(Error::Verification(format!(
                "loaded {} {} entities, expected {}",
                loaded.len(),
                kind,
                ctx.entity_count()
            )));
        }
        ctx.phase(delete, || store.delete_all(kind))?;
        verify_empty(store, kind)?;
    }
    Ok(())
}

fn verify_same_entities(expected: &[SimpleEntity], actual: &[SimpleEntity]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(Error::Verification(format!(
            "loaded {} entities, expected {}",
            actual.len(),
            expected.len()
        )));
    }

    let mut actual: Vec<&SimpleEntity> = actual.iter().collect();
    actual.sort_by_key(|e| e.id);
    for (want, got) in expected.iter().zip(actual) {
        if want != got {
            return Err(Error::Verification(format!(
                "entity {} differs from what was written",
                want.id
            )));
        }
    }
    Ok(())
}

fn verify_contains(found: &[SimpleEntity], id: i64) -> Result<()> {
    if found.iter().any(|e| e.id == id) {
        Ok(())
    } else {
        Err(Error::Verification(format!(
            "query did not return probe entity {}",
            id
        )))
    }
}

fn verify_empty<S>(store: &mut S, kind: EntityKind) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    let remaining = store.count(kind)?;
    if remaining != 0 {
        return Err(Error::Verification(format!(
            "{} {} entities remain after delete",
            remaining, kind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TestCatalog;
    use crate::generator::WorkloadGenerator;
    use std::collections::BTreeMap;

    /// Minimal store keeping both shapes in ordered maps.
    #[derive(Default)]
    struct MapStore {
        tables: BTreeMap<EntityKind, BTreeMap<i64, SimpleEntity>>,
    }

    impl MapStore {
        fn table(&mut self, kind: EntityKind) -> &mut BTreeMap<i64, SimpleEntity> {
            self.tables.entry(kind).or_default()
        }
    }

    impl EntityStore for MapStore {
        fn count(&mut self, kind: EntityKind) -> Result<usize> {
            Ok(self.table(kind).len())
        }

        fn insert(&mut self, kind: EntityKind, entities: &[SimpleEntity]) -> Result<()> {
            let table = self.table(kind);
            for e in entities {
                table.insert(e.id, e.clone());
            }
            Ok(())
        }

        fn update(&mut self, kind: EntityKind, entities: &[SimpleEntity]) -> Result<()> {
            self.insert(kind, entities)
        }

        fn load_all(&mut self, kind: EntityKind) -> Result<Vec<SimpleEntity>> {
            Ok(self.table(kind).values().cloned().collect())
        }

        fn get(&mut self, kind: EntityKind, id: i64) -> Result<Option<SimpleEntity>> {
            Ok(self.table(kind).get(&id).cloned())
        }

        fn find_by_string(&mut self, kind: EntityKind, value: &str) -> Result<Vec<SimpleEntity>> {
            Ok(self
                .table(kind)
                .values()
                .filter(|e| e.simple_string == value)
                .cloned()
                .collect())
        }

        fn find_by_int(&mut self, kind: EntityKind, value: i32) -> Result<Vec<SimpleEntity>> {
            Ok(self
                .table(kind)
                .values()
                .filter(|e| e.simple_int == value)
                .cloned()
                .collect())
        }

        fn delete(&mut self, kind: EntityKind, ids: &[i64]) -> Result<()> {
            let table = self.table(kind);
            for id in ids {
                table.remove(id);
            }
            Ok(())
        }

        fn delete_all(&mut self, kind: EntityKind) -> Result<()> {
            self.table(kind).clear();
            Ok(())
        }
    }

    fn run(kind: TestKind, count: usize) -> (MapStore, Vec<String>) {
        let mut store = MapStore::default();
        let mut ctx = RunContext::new(kind, count, WorkloadGenerator::default());
        execute(&mut store, TestCatalog::by_identity(kind), &mut ctx).unwrap();
        let (phases, _) = ctx.finish();
        (store, phases.into_iter().map(|p| p.label).collect())
    }

    #[test]
    fn test_every_test_type_runs() {
        for test in TestCatalog::all() {
            let mut store = MapStore::default();
            let mut ctx = RunContext::new(test.kind, 20, WorkloadGenerator::default());
            execute(&mut store, test, &mut ctx)
                .unwrap_or_else(|e| panic!("{} failed: {}", test.short_name, e));
            assert!(ctx.ensure_closed().is_ok());
            assert!(!ctx.clock().records().is_empty());
        }
    }

    #[test]
    fn test_crud_phase_sequence() {
        let (store, phases) = run(TestKind::Crud, 10);
        assert_eq!(phases, vec!["insert", "update", "load", "access", "delete"]);
        assert!(store.tables[&EntityKind::Simple].is_empty());
    }

    #[test]
    fn test_create_update_leaves_data() {
        let (mut store, phases) = run(TestKind::CreateUpdateIndexed, 15);
        assert_eq!(phases, vec!["insert", "update"]);
        assert_eq!(store.count(EntityKind::Indexed).unwrap(), 15);
        assert_eq!(store.count(EntityKind::Simple).unwrap(), 0);
    }

    #[test]
    fn test_scalars_variant_stores_no_strings() {
        let (mut store, _) = run(TestKind::CreateUpdateScalars, 5);
        let loaded = store.load_all(EntityKind::Simple).unwrap();
        assert!(loaded.iter().all(|e| e.simple_string.is_empty()));
    }

    #[test]
    fn test_query_and_delete_all_phases() {
        assert_eq!(run(TestKind::QueryString, 10).1, vec!["query"]);
        assert_eq!(run(TestKind::QueryIdRandom, 10).1, vec!["query"]);
        assert_eq!(
            run(TestKind::DeleteAll, 10).1,
            vec!["load", "delete", "load indexed", "delete indexed"]
        );
    }

    #[test]
    fn test_single_entity_probe() {
        let (_, phases) = run(TestKind::QueryInteger, 1);
        assert_eq!(phases, vec!["query"]);
    }

    /// Store that silently drops updates.
    #[derive(Default)]
    struct LossyStore(MapStore);

    impl EntityStore for LossyStore {
        fn count(&mut self, kind: EntityKind) -> Result<usize> {
            self.0.count(kind)
        }
        fn insert(&mut self, kind: EntityKind, entities: &[SimpleEntity]) -> Result<()> {
            self.0.insert(kind, entities)
        }
        fn update(&mut self, _kind: EntityKind, _entities: &[SimpleEntity]) -> Result<()> {
            Ok(())
        }
        fn load_all(&mut self, kind: EntityKind) -> Result<Vec<SimpleEntity>> {
            self.0.load_all(kind)
        }
        fn get(&mut self, kind: EntityKind, id: i64) -> Result<Option<SimpleEntity>> {
            self.0.get(kind, id)
        }
        fn find_by_string(&mut self, kind: EntityKind, value: &str) -> Result<Vec<SimpleEntity>> {
            self.0.find_by_string(kind, value)
        }
        fn find_by_int(&mut self, kind: EntityKind, value: i32) -> Result<Vec<SimpleEntity>> {
            self.0.find_by_int(kind, value)
        }
        fn delete(&mut self, kind: EntityKind, ids: &[i64]) -> Result<()> {
            self.0.delete(kind, ids)
        }
        fn delete_all(&mut self, kind: EntityKind) -> Result<()> {
            self.0.delete_all(kind)
        }
    }

    #[test]
    fn test_mismatched_context_is_rejected() {
        let mut store = MapStore::default();
        let mut ctx = RunContext::new(TestKind::QueryId, 10, WorkloadGenerator::default());
        let err = execute(&mut store, TestCatalog::by_identity(TestKind::Crud), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(store.tables.is_empty());
        assert!(ctx.clock().records().is_empty());
    }

    #[test]
    fn test_lost_update_fails_verification() {
        let mut store = LossyStore::default();
        let mut ctx = RunContext::new(TestKind::Crud, 10, WorkloadGenerator::default());
        let err = execute(&mut store, TestCatalog::by_identity(TestKind::Crud), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::Verification(_)));
    }
}
