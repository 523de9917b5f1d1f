//! SQLite backend.
//!
//! One table per entity shape, created from the shape's schema, with
//! `CREATE INDEX` for indexed columns. Batch writes run inside a single
//! transaction through cached prepared statements.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};
use storebench_core::entity::{EntitySchema, FieldType};
use storebench_core::scenario;
use storebench_core::{
    BackendAdapter, EntityKind, EntityStore, RunContext, SetupContext, SimpleEntity, TestType,
};

use crate::error::{Error, Result};
use crate::workdir;

/// Adapter name.
pub const NAME: &str = "sqlite";

/// Database file inside the adapter's directory.
const DB_FILE: &str = "storebench.db";

fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Bool
        | FieldType::Int8
        | FieldType::Int16
        | FieldType::Int32
        | FieldType::Int64 => "INTEGER",
        FieldType::Float32 | FieldType::Float64 => "REAL",
        FieldType::String => "TEXT",
        FieldType::Bytes => "BLOB",
    }
}

/// DDL for one entity shape, table first then its indexes.
pub fn schema_ddl(schema: &EntitySchema) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY", schema.primary_key)];
    columns.extend(
        schema
            .fields
            .iter()
            .map(|f| format!("{} {} NOT NULL", f.name, column_type(f.field_type))),
    );

    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {} ({});\n",
        schema.name,
        columns.join(", ")
    );
    for field in schema.indexed_fields() {
        ddl.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column});\n",
            table = schema.name,
            column = field.name
        ));
    }
    ddl
}

/// Prepared SQL text for one entity shape.
#[derive(Debug)]
struct Statements {
    insert: String,
    update: String,
    select_all: String,
    select_by_id: String,
    select_by_string: String,
    select_by_int: String,
    delete_by_id: String,
    delete_all: String,
    count: String,
}

impl Statements {
    fn new(schema: &EntitySchema) -> Self {
        let table = schema.name;
        let names: Vec<&str> = std::iter::once(schema.primary_key)
            .chain(schema.fields.iter().map(|f| f.name))
            .collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        let assignments: Vec<String> = names
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, name)| format!("{} = ?{}", name, i + 1))
            .collect();
        let columns = names.join(", ");
        let select = format!("SELECT {} FROM {}", columns, table);

        Self {
            insert: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns,
                placeholders.join(", ")
            ),
            update: format!(
                "UPDATE {} SET {} WHERE {} = ?1",
                table,
                assignments.join(", "),
                schema.primary_key
            ),
            select_all: format!("{} ORDER BY {}", select, schema.primary_key),
            select_by_id: format!("{} WHERE {} = ?1", select, schema.primary_key),
            select_by_string: format!("{} WHERE simple_string = ?1", select),
            select_by_int: format!("{} WHERE simple_int = ?1", select),
            delete_by_id: format!("DELETE FROM {} WHERE {} = ?1", table, schema.primary_key),
            delete_all: format!("DELETE FROM {}", table),
            count: format!("SELECT COUNT(*) FROM {}", table),
        }
    }
}

fn row_to_entity(row: &Row<'_>) -> rusqlite::Result<SimpleEntity> {
    Ok(SimpleEntity {
        id: row.get(0)?,
        simple_boolean: row.get(1)?,
        simple_byte: row.get(2)?,
        simple_short: row.get(3)?,
        simple_int: row.get(4)?,
        simple_long: row.get(5)?,
        simple_float: row.get(6)?,
        simple_double: row.get(7)?,
        simple_string: row.get(8)?,
        simple_byte_array: row.get(9)?,
    })
}

/// Open connection plus the SQL of both shapes.
struct Session {
    conn: Connection,
    dir: PathBuf,
    simple: Statements,
    indexed: Statements,
}

impl Session {
    fn statements(&self, kind: EntityKind) -> &Statements {
        match kind {
            EntityKind::Simple => &self.simple,
            EntityKind::Indexed => &self.indexed,
        }
    }

    fn write(&mut self, kind: EntityKind, entities: &[SimpleEntity], update: bool) -> Result<()> {
        let sql = if update {
            self.statements(kind).update.clone()
        } else {
            self.statements(kind).insert.clone()
        };
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for e in entities {
                stmt.execute(params![
                    e.id,
                    e.simple_boolean,
                    e.simple_byte,
                    e.simple_short,
                    e.simple_int,
                    e.simple_long,
                    e.simple_float,
                    e.simple_double,
                    e.simple_string,
                    e.simple_byte_array
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<SimpleEntity>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, row_to_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count(&self, kind: EntityKind) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&self.statements(kind).count, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn get(&self, kind: EntityKind, id: i64) -> Result<Option<SimpleEntity>> {
        let mut stmt = self.conn.prepare_cached(&self.statements(kind).select_by_id)?;
        Ok(stmt.query_row([id], row_to_entity).optional()?)
    }

    fn delete(&mut self, kind: EntityKind, ids: &[i64]) -> Result<()> {
        let sql = self.statements(kind).delete_by_id.clone();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for id in ids {
                stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_all(&self, kind: EntityKind) -> Result<()> {
        self.conn.execute(&self.statements(kind).delete_all, [])?;
        Ok(())
    }
}

/// File-backed SQLite adapter.
#[derive(Default)]
pub struct SqliteBackend {
    session: Option<Session>,
    version: Option<String>,
}

impl SqliteBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(Error::NotOpen(NAME))
    }

    fn open(&mut self, ctx: &SetupContext) -> Result<()> {
        let dir = ctx.backend_dir(NAME);
        workdir::remove(&dir)?;
        std::fs::create_dir_all(&dir)?;

        let (conn, version) = workdir::or_discard(&dir, || connect(&dir.join(DB_FILE)))?;
        self.version = Some(format!("SQLite {}", version));
        self.session = Some(Session {
            conn,
            dir,
            simple: Statements::new(EntityKind::Simple.schema()),
            indexed: Statements::new(EntityKind::Indexed.schema()),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let dir = session.dir;
        workdir::or_discard(&dir, || session.conn.close().map_err(|(_, e)| Error::from(e)))?;
        workdir::remove(&dir)
    }
}

/// Open the database file, apply pragmas and create every table.
fn connect(path: &Path) -> Result<(Connection, String)> {
    let conn = Connection::open(path)?;
    let journal: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    for kind in EntityKind::ALL {
        conn.execute_batch(&schema_ddl(kind.schema()))?;
    }

    let version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
    tracing::debug!(
        path = %path.display(),
        version = %version,
        journal = %journal,
        "sqlite database opened"
    );
    Ok((conn, version))
}

impl BackendAdapter for SqliteBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
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

impl EntityStore for SqliteBackend {
    fn count(&mut self, kind: EntityKind) -> storebench_core::Result<usize> {
        Ok(self.session()?.count(kind)?)
    }

    fn insert(
        &mut self,
        kind: EntityKind,
        entities: &[SimpleEntity],
    ) -> storebench_core::Result<()> {
        Ok(self.session()?.write(kind, entities, false)?)
    }

    fn update(
        &mut self,
        kind: EntityKind,
        entities: &[SimpleEntity],
    ) -> storebench_core::Result<()> {
        Ok(self.session()?.write(kind, entities, true)?)
    }

    fn load_all(&mut self, kind: EntityKind) -> storebench_core::Result<Vec<SimpleEntity>> {
        let session = self.session()?;
        Ok(session.query(&session.statements(kind).select_all, params![])?)
    }

    fn get(&mut self, kind: EntityKind, id: i64) -> storebench_core::Result<Option<SimpleEntity>> {
        Ok(self.session()?.get(kind, id)?)
    }

    fn find_by_string(
        &mut self,
        kind: EntityKind,
        value: &str,
    ) -> storebench_core::Result<Vec<SimpleEntity>> {
        let session = self.session()?;
        Ok(session.query(&session.statements(kind).select_by_string, [value])?)
    }

    fn find_by_int(
        &mut self,
        kind: EntityKind,
        value: i32,
    ) -> storebench_core::Result<Vec<SimpleEntity>> {
        let session = self.session()?;
        Ok(session.query(&session.statements(kind).select_by_int, [value])?)
    }

    fn delete(&mut self, kind: EntityKind, ids: &[i64]) -> storebench_core::Result<()> {
        Ok(self.session()?.delete(kind, ids)?)
    }

    fn delete_all(&mut self, kind: EntityKind) -> storebench_core::Result<()> {
        Ok(self.session()?.delete_all(kind)?)
    }
}
