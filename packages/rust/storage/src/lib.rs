//! libSQL storage layer for the knowledge store.
//!
//! The [`Storage`] struct wraps a local libSQL database holding two tables:
//! `doc_functions` (scraped API creation methods) and `harvested_steps`
//! (classified build steps).
//!
//! **Access rules:**
//! - Each sub-pipeline opens its own read-write handle via [`Storage::open`]
//!   or [`Storage::create`]; there is exactly one writer at a time.
//! - Verification uses [`Storage::open_readonly`].

mod migrations;

use std::path::{Path, PathBuf};

use cadkb_shared::{CadKbError, DocFunctionRecord, HarvestedStep, Result};
use libsql::{Connection, Database, params};
use serde_json::{Map, Value};

/// Sidecar files SQLite may leave next to a database file.
const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// The two knowledge tables, for row counting without string SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTable {
    DocFunctions,
    HarvestedSteps,
}

impl StoreTable {
    pub fn name(self) -> &'static str {
        match self {
            Self::DocFunctions => "doc_functions",
            Self::HarvestedSteps => "harvested_steps",
        }
    }
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    path: PathBuf,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CadKbError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            path: path.to_path_buf(),
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open the store at `path`, deleting any existing file first when
    /// `overwrite` is set.
    pub async fn create(path: &Path, overwrite: bool) -> Result<Self> {
        if overwrite {
            remove_store_files(path)?;
        }
        Self::open(path).await
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CadKbError::Storage(format!(
                "no knowledge store at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            path: path.to_path_buf(),
            readonly: true,
        })
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    CadKbError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CadKbError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // doc_functions
    // -----------------------------------------------------------------------

    /// Insert documented functions, ignoring rows whose `function_key`
    /// already exists. Returns the number of rows attempted.
    pub async fn insert_doc_functions(&self, records: &[DocFunctionRecord]) -> Result<usize> {
        self.check_writable()?;
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction().await.map_err(db_err)?;
        for record in records {
            let tokens_json = to_json(&record.tokens)?;
            tx.execute(
                "INSERT OR IGNORE INTO doc_functions
                 (function_key, factory, method, action_label, doc_url, tokens_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.function_key.as_str(),
                    record.factory.as_str(),
                    record.method.as_str(),
                    record.action_label.as_str(),
                    record.doc_url.as_str(),
                    tokens_json.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        Ok(records.len())
    }

    /// Delete every documented function. Returns the number of rows removed.
    pub async fn clear_doc_functions(&self) -> Result<u64> {
        self.check_writable()?;
        let removed = self
            .conn
            .execute("DELETE FROM doc_functions", params![])
            .await
            .map_err(db_err)?;
        tracing::info!(removed, "cleared doc_functions");
        Ok(removed)
    }

    /// List all documented functions ordered by key.
    pub async fn list_doc_functions(&self) -> Result<Vec<DocFunctionRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT function_key, factory, method, action_label, doc_url, tokens_json
                 FROM doc_functions ORDER BY function_key",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_doc_function(&row)?);
        }
        Ok(results)
    }

    /// Look up one documented function by its normalized key.
    pub async fn get_doc_function(&self, function_key: &str) -> Result<Option<DocFunctionRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT function_key, factory, method, action_label, doc_url, tokens_json
                 FROM doc_functions WHERE function_key = ?1",
                params![function_key],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_doc_function(&row)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // harvested_steps
    // -----------------------------------------------------------------------

    /// Append harvested steps in one transaction.
    ///
    /// Fails on a `step_id` collision; callers clear the table first when
    /// re-harvesting.
    pub async fn insert_harvested_steps(&self, steps: &[HarvestedStep]) -> Result<usize> {
        self.check_writable()?;
        if steps.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction().await.map_err(db_err)?;
        for step in steps {
            let params_json = to_json(&step.params)?;
            let produces_json = to_json(&step.produces)?;
            let references_json = to_json(&step.references)?;
            tx.execute(
                "INSERT INTO harvested_steps
                 (step_id, action_label, description, params_json, produces_json,
                  references_json, code_lang, generated_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    step.step_id,
                    step.action_label.as_str(),
                    step.description.as_str(),
                    params_json.as_str(),
                    produces_json.as_str(),
                    references_json.as_str(),
                    step.code_lang.as_deref(),
                    step.generated_code.as_deref(),
                ],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        Ok(steps.len())
    }

    /// Delete every harvested step. Returns the number of rows removed.
    pub async fn clear_harvested_steps(&self) -> Result<u64> {
        self.check_writable()?;
        let removed = self
            .conn
            .execute("DELETE FROM harvested_steps", params![])
            .await
            .map_err(db_err)?;
        tracing::info!(removed, "cleared harvested_steps");
        Ok(removed)
    }

    /// List all harvested steps in execution order.
    pub async fn list_harvested_steps(&self) -> Result<Vec<HarvestedStep>> {
        let mut rows = self
            .conn
            .query(
                "SELECT step_id, action_label, description, params_json, produces_json,
                        references_json, code_lang, generated_code
                 FROM harvested_steps ORDER BY step_id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_harvested_step(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------------

    /// Number of rows in one of the knowledge tables.
    pub async fn count_rows(&self, table: StoreTable) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let mut rows = self.conn.query(&sql, params![]).await.map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as u64),
            None => Ok(0),
        }
    }

    /// Row count of every user table in the store, ordered by table name.
    pub async fn table_counts(&self) -> Result<Vec<(String, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut names = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            names.push(row.get::<String>(0).map_err(db_err)?);
        }

        let mut counts = Vec::with_capacity(names.len());
        for name in names {
            let sql = format!("SELECT COUNT(*) FROM \"{}\"", name.replace('"', "\"\""));
            let mut rows = self.conn.query(&sql, params![]).await.map_err(db_err)?;
            let count = match rows.next().await.map_err(db_err)? {
                Some(row) => row.get::<i64>(0).map_err(db_err)? as u64,
                None => 0,
            };
            counts.push((name, count));
        }
        Ok(counts)
    }
}

/// Remove a store file and its sidecars, if present.
fn remove_store_files(path: &Path) -> Result<()> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in SIDECAR_SUFFIXES {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        targets.push(PathBuf::from(sidecar));
    }

    for target in targets {
        if target.exists() {
            std::fs::remove_file(&target).map_err(|e| CadKbError::io(&target, e))?;
            tracing::info!(path = %target.display(), "removed existing store file");
        }
    }
    Ok(())
}

fn db_err(e: libsql::Error) -> CadKbError {
    CadKbError::Storage(e.to_string())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CadKbError::Storage(format!("JSON encode: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| CadKbError::parse(format!("invalid JSON in {column}: {e}")))
}

/// Convert a database row to a [`DocFunctionRecord`].
fn row_to_doc_function(row: &libsql::Row) -> Result<DocFunctionRecord> {
    let tokens_json: String = row.get(5).map_err(db_err)?;
    Ok(DocFunctionRecord {
        function_key: row.get::<String>(0).map_err(db_err)?,
        factory: row.get::<String>(1).map_err(db_err)?,
        method: row.get::<String>(2).map_err(db_err)?,
        action_label: row.get::<String>(3).map_err(db_err)?,
        doc_url: row.get::<String>(4).unwrap_or_default(),
        tokens: from_json("tokens_json", &tokens_json)?,
    })
}

/// Convert a database row to a [`HarvestedStep`].
fn row_to_harvested_step(row: &libsql::Row) -> Result<HarvestedStep> {
    let params_json: String = row.get(3).map_err(db_err)?;
    let produces_json: Option<String> = row.get(4).ok();
    let references_json: Option<String> = row.get(5).ok();

    Ok(HarvestedStep {
        step_id: row.get::<u32>(0).map_err(db_err)?,
        action_label: row.get::<String>(1).map_err(db_err)?,
        description: row.get::<String>(2).map_err(db_err)?,
        params: from_json::<Map<String, Value>>("params_json", &params_json)?,
        produces: match produces_json {
            Some(raw) => from_json("produces_json", &raw)?,
            None => Vec::new(),
        },
        references: match references_json {
            Some(raw) => from_json("references_json", &raw)?,
            None => Vec::new(),
        },
        code_lang: row.get::<String>(6).ok(),
        generated_code: row.get::<String>(7).ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadkb_shared::{DocTriple, NOTE_ACTION};
    use serde_json::json;
    use uuid::Uuid;

    fn temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("cadkb_test_{}.db", Uuid::now_v7()))
    }

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        Storage::open(&temp_db_path()).await.expect("open test db")
    }

    fn record(factory: &str, method: &str) -> DocFunctionRecord {
        DocFunctionRecord::from(&DocTriple::new(
            factory,
            method,
            "http://docs.example.com/online/interfaces/page.htm",
        ))
    }

    fn step(step_id: u32, action: &str) -> HarvestedStep {
        let mut params = Map::new();
        params.insert("offset_mm".into(), json!(25.0));
        HarvestedStep {
            step_id,
            action_label: action.into(),
            description: format!("line for step {step_id}"),
            params,
            produces: vec!["Plane.1".into()],
            references: vec!["xy plane".into()],
            code_lang: None,
            generated_code: None,
        }
    }

    #[tokio::test]
    async fn corrupt_json_column_is_a_parse_error() {
        let storage = test_storage().await;
        storage.insert_harvested_steps(&[step(1, "create_plane_offset")]).await.unwrap();
        storage
            .conn
            .execute(
                "UPDATE harvested_steps SET params_json = 'not json' WHERE step_id = 1",
                params![],
            )
            .await
            .unwrap();

        let err = storage.list_harvested_steps().await.unwrap_err();
        assert!(matches!(err, CadKbError::Parse { .. }));
        assert!(err.to_string().contains("params_json"));
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = temp_db_path();
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn doc_functions_ignore_duplicates() {
        let storage = test_storage().await;
        let batch = vec![
            record("HybridShapeFactory", "AddNewPlaneOffset"),
            record("HybridShapeFactory", "AddNewPointCoord"),
        ];

        let attempted = storage.insert_doc_functions(&batch).await.expect("insert");
        assert_eq!(attempted, 2);
        let attempted = storage.insert_doc_functions(&batch).await.expect("insert again");
        assert_eq!(attempted, 2);

        assert_eq!(storage.count_rows(StoreTable::DocFunctions).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn first_seen_doc_url_wins() {
        let storage = test_storage().await;
        let first = record("Part", "AddNewLine");
        let mut second = first.clone();
        second.doc_url = "http://docs.example.com/online/interfaces/other.htm".into();

        storage.insert_doc_functions(&[first.clone()]).await.unwrap();
        storage.insert_doc_functions(&[second]).await.unwrap();

        let stored = storage
            .get_doc_function("part.addnewline")
            .await
            .unwrap()
            .expect("row present");
        assert_eq!(stored.doc_url, first.doc_url);
        assert_eq!(stored.tokens, first.tokens);
    }

    #[tokio::test]
    async fn clear_doc_functions_empties_table() {
        let storage = test_storage().await;
        storage
            .insert_doc_functions(&[record("Part", "AddNewLine")])
            .await
            .unwrap();
        assert_eq!(storage.clear_doc_functions().await.unwrap(), 1);
        assert!(storage.list_doc_functions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn harvested_steps_roundtrip_in_order() {
        let storage = test_storage().await;
        let steps = vec![step(1, "create_plane_offset"), step(2, NOTE_ACTION)];
        storage.insert_harvested_steps(&steps).await.expect("insert");

        let stored = storage.list_harvested_steps().await.expect("list");
        assert_eq!(stored, steps);
        assert!(stored[1].code_lang.is_none());
    }

    #[tokio::test]
    async fn duplicate_step_ids_are_rejected() {
        let storage = test_storage().await;
        storage.insert_harvested_steps(&[step(1, "join")]).await.unwrap();
        let err = storage
            .insert_harvested_steps(&[step(1, "join")])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(storage.count_rows(StoreTable::HarvestedSteps).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_with_overwrite_starts_empty() {
        let tmp = temp_db_path();
        let storage = Storage::create(&tmp, false).await.unwrap();
        storage.insert_harvested_steps(&[step(1, "join")]).await.unwrap();
        drop(storage);

        let kept = Storage::create(&tmp, false).await.unwrap();
        assert_eq!(kept.count_rows(StoreTable::HarvestedSteps).await.unwrap(), 1);
        drop(kept);

        let fresh = Storage::create(&tmp, true).await.unwrap();
        assert_eq!(fresh.count_rows(StoreTable::HarvestedSteps).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn table_counts_lists_knowledge_tables() {
        let storage = test_storage().await;
        storage
            .insert_doc_functions(&[record("Part", "AddNewLine")])
            .await
            .unwrap();

        let counts = storage.table_counts().await.unwrap();
        let doc = counts.iter().find(|(name, _)| name == "doc_functions");
        let steps = counts.iter().find(|(name, _)| name == "harvested_steps");
        assert_eq!(doc.map(|(_, c)| *c), Some(1));
        assert_eq!(steps.map(|(_, c)| *c), Some(0));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = temp_db_path();
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_doc_functions(&[record("Part", "AddNewLine")])
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro.clear_doc_functions().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
        assert_eq!(ro.count_rows(StoreTable::DocFunctions).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let result = Storage::open_readonly(&temp_db_path()).await;
        assert!(result.is_err());
    }
}
