//! Entity shapes exercised by the benchmarks.
//!
//! Both shapes share one field set. The indexed shape additionally marks the
//! string and integer fields for secondary-index lookup, which lets the same
//! operations measure the cost and benefit of indexing.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::generator::{check_length_bounds, random_string, Lcg48, WorkloadGenerator};
use crate::generator::{DEFAULT_MAX_LENGTH, DEFAULT_MIN_LENGTH};

/// Primary key column.
pub const ID_FIELD: &str = "id";

/// String column probed by the query-by-string tests.
pub const STRING_FIELD: &str = "simple_string";

/// Integer column probed by the query-by-integer tests.
pub const INT_FIELD: &str = "simple_int";

/// Integer values are drawn from `[0, INT_FIELD_BOUND)` so equality queries
/// match more than one row at realistic entity counts.
pub const INT_FIELD_BOUND: i32 = 1000;

/// Default minimum byte array length (inclusive).
pub const DEFAULT_MIN_BYTES: usize = 5;

/// Default maximum byte array length (exclusive).
pub const DEFAULT_MAX_BYTES: usize = 100;

/// Column types of the entity shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Boolean value.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
}

/// A column definition within an entity shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Column name.
    pub name: &'static str,
    /// Column data type.
    pub field_type: FieldType,
    /// Whether the column carries a secondary index.
    pub indexed: bool,
}

impl FieldDef {
    /// Create an unindexed column.
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            indexed: false,
        }
    }

    /// Mark the column for secondary-index lookup.
    pub const fn with_index(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Static description of one entity shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    /// Shape this schema describes.
    pub kind: EntityKind,
    /// Table, tree or collection name.
    pub name: &'static str,
    /// Primary key column.
    pub primary_key: &'static str,
    /// Non-key columns in declaration order.
    pub fields: &'static [FieldDef],
}

impl EntitySchema {
    /// Look up a column by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Columns carrying a secondary index.
    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.indexed)
    }

    /// Whether the named column carries a secondary index.
    pub fn is_indexed(&self, name: &str) -> bool {
        self.field(name).map(|f| f.indexed).unwrap_or(false)
    }
}

const SIMPLE_FIELDS: [FieldDef; 9] = [
    FieldDef::new("simple_boolean", FieldType::Bool),
    FieldDef::new("simple_byte", FieldType::Int8),
    FieldDef::new("simple_short", FieldType::Int16),
    FieldDef::new(INT_FIELD, FieldType::Int32),
    FieldDef::new("simple_long", FieldType::Int64),
    FieldDef::new("simple_float", FieldType::Float32),
    FieldDef::new("simple_double", FieldType::Float64),
    FieldDef::new(STRING_FIELD, FieldType::String),
    FieldDef::new("simple_byte_array", FieldType::Bytes),
];

const INDEXED_FIELDS: [FieldDef; 9] = [
    FieldDef::new("simple_boolean", FieldType::Bool),
    FieldDef::new("simple_byte", FieldType::Int8),
    FieldDef::new("simple_short", FieldType::Int16),
    FieldDef::new(INT_FIELD, FieldType::Int32).with_index(),
    FieldDef::new("simple_long", FieldType::Int64),
    FieldDef::new("simple_float", FieldType::Float32),
    FieldDef::new("simple_double", FieldType::Float64),
    FieldDef::new(STRING_FIELD, FieldType::String).with_index(),
    FieldDef::new("simple_byte_array", FieldType::Bytes),
];

static SIMPLE_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Simple,
    name: "simple_entity",
    primary_key: ID_FIELD,
    fields: &SIMPLE_FIELDS,
};

static INDEXED_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Indexed,
    name: "simple_entity_indexed",
    primary_key: ID_FIELD,
    fields: &INDEXED_FIELDS,
};

/// The two entity shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Plain entity without secondary indexes.
    Simple,
    /// Same fields; string and integer columns are indexed.
    Indexed,
}

impl EntityKind {
    /// Both shapes in declaration order.
    pub const ALL: [EntityKind; 2] = [EntityKind::Simple, EntityKind::Indexed];

    /// Schema of this shape.
    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            EntityKind::Simple => &SIMPLE_SCHEMA,
            EntityKind::Indexed => &INDEXED_SCHEMA,
        }
    }

    /// Storage name of this shape.
    pub fn name(&self) -> &'static str {
        self.schema().name
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Record stored by every backend, for both shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimpleEntity {
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

impl SimpleEntity {
    /// Read every field and fold it into a checksum.
    ///
    /// Used by the access phase so reads cannot be optimized away.
    pub fn access(&self) -> u64 {
        let mut sum = self.id as u64;
        sum = sum.wrapping_add(self.simple_boolean as u64);
        sum = sum.wrapping_add(self.simple_byte as u64);
        sum = sum.wrapping_add(self.simple_short as u64);
        sum = sum.wrapping_add(self.simple_int as u64);
        sum = sum.wrapping_add(self.simple_long as u64);
        sum = sum.wrapping_add(self.simple_float.to_bits() as u64);
        sum = sum.wrapping_add(self.simple_double.to_bits());
        sum = sum.wrapping_add(self.simple_string.len() as u64);
        sum.wrapping_add(self.simple_byte_array.len() as u64)
    }

    fn digest_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&self.id.to_le_bytes());
        hasher.update(&[self.simple_boolean as u8]);
        hasher.update(&self.simple_byte.to_le_bytes());
        hasher.update(&self.simple_short.to_le_bytes());
        hasher.update(&self.simple_int.to_le_bytes());
        hasher.update(&self.simple_long.to_le_bytes());
        hasher.update(&self.simple_float.to_le_bytes());
        hasher.update(&self.simple_double.to_le_bytes());
        hasher.update(&(self.simple_string.len() as u64).to_le_bytes());
        hasher.update(self.simple_string.as_bytes());
        hasher.update(&(self.simple_byte_array.len() as u64).to_le_bytes());
        hasher.update(&self.simple_byte_array);
    }
}

/// Builds and re-randomizes entities from one seeded stream.
///
/// Fields are drawn in a fixed order: boolean, byte, short, int, long, double,
/// float, then string and byte array unless only scalars are requested. Every
/// entity the factory hands out is folded into a running blake3 digest, so two
/// factories that produced the same data report the same fingerprint.
#[derive(Debug, Clone)]
pub struct EntityFactory {
    rng: Lcg48,
    string_length: (usize, usize),
    byte_array_length: (usize, usize),
    hasher: blake3::Hasher,
    produced: u64,
}

impl EntityFactory {
    /// Create a factory positioned at the start of the generator's stream.
    pub fn new(generator: &WorkloadGenerator) -> Self {
        Self {
            rng: generator.stream(),
            string_length: (DEFAULT_MIN_LENGTH, DEFAULT_MAX_LENGTH),
            byte_array_length: (DEFAULT_MIN_BYTES, DEFAULT_MAX_BYTES),
            hasher: blake3::Hasher::new(),
            produced: 0,
        }
    }

    /// Set the string length range `[min, max)`.
    pub fn with_string_lengths(mut self, min: usize, max: usize) -> Result<Self> {
        check_length_bounds(min, max)?;
        self.string_length = (min, max);
        Ok(self)
    }

    /// Set the byte array length range `[min, max)`.
    pub fn with_byte_array_lengths(mut self, min: usize, max: usize) -> Result<Self> {
        check_length_bounds(min, max)?;
        self.byte_array_length = (min, max);
        Ok(self)
    }

    /// Create one entity with the given id.
    pub fn create(&mut self, id: i64, scalars_only: bool) -> SimpleEntity {
        let mut entity = SimpleEntity {
            id,
            ..Default::default()
        };
        self.fill(&mut entity, scalars_only);
        entity
    }

    /// Create `count` entities with ids `1..=count`.
    pub fn create_batch(&mut self, count: usize, scalars_only: bool) -> Vec<SimpleEntity> {
        (1..=count as i64)
            .map(|id| self.create(id, scalars_only))
            .collect()
    }

    /// Re-randomize a whole batch in order.
    pub fn randomize_all(&mut self, entities: &mut [SimpleEntity], scalars_only: bool) {
        for entity in entities {
            self.fill(entity, scalars_only);
        }
    }

    /// Number of entity states produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Hex digest of every entity state produced so far.
    pub fn fingerprint(&self) -> String {
        hex::encode(self.hasher.finalize().as_bytes())
    }

    fn fill(&mut self, entity: &mut SimpleEntity, scalars_only: bool) {
        let rng = &mut self.rng;
        entity.simple_boolean = rng.next_boolean();
        entity.simple_byte = rng.next_int() as i8;
        entity.simple_short = rng.next_int() as i16;
        entity.simple_int = rng.next_int_bounded(INT_FIELD_BOUND);
        entity.simple_long = rng.next_long();
        entity.simple_double = rng.next_double();
        entity.simple_float = rng.next_float();

        if !scalars_only {
            let (min, max) = self.string_length;
            entity.simple_string = random_string(rng, min, max);

            let (min, max) = self.byte_array_length;
            let len = min + rng.next_int_bounded((max - min) as i32) as usize;
            let mut bytes = vec![0u8; len];
            rand::RngCore::fill_bytes(rng, &mut bytes);
            entity.simple_byte_array = bytes;
        }

        entity.digest_into(&mut self.hasher);
        self.produced += 1;
    }
}
