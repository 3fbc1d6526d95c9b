//! SQLite-backed resource store.
//!
//! Uses rusqlite with a single connection behind a `Mutex`. Blocking calls are
//! moved off the async runtime with `spawn_blocking`. WAL mode is enabled for
//! file databases.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::migrations;
use super::{ManagedResource, NamespacedName, ResourceStatus, ResourceStore, StoreError};
use crate::conditions::Condition;

/// Thread-safe store handle. Cloning is cheap (inner `Arc`).
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        migrations::run_all(&conn)?;

        log::info!("Resource store opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_conn(f))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Creates an empty resource.
    pub async fn create(&self, key: &NamespacedName) -> Result<ManagedResource, StoreError> {
        let key = key.clone();
        self.run_blocking(move |conn| {
            let now = Utc::now().to_rfc3339();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO managed_resources
                 (namespace, name, resource_version, conditions, created_at, updated_at)
                 VALUES (?1, ?2, 1, '[]', ?3, ?3)",
                params![key.namespace, key.name, now],
            )?;
            if inserted == 0 {
                return Err(StoreError::AlreadyExists { key });
            }
            Ok(ManagedResource::new(key))
        })
        .await
    }

    /// Returns the resource, creating it if missing.
    pub async fn ensure(&self, key: &NamespacedName) -> Result<ManagedResource, StoreError> {
        match self.create(key).await {
            Err(StoreError::AlreadyExists { .. }) => self.get(key).await,
            other => other,
        }
    }

    /// Lists all stored resources ordered by namespace and name.
    pub async fn list(&self) -> Result<Vec<ManagedResource>, StoreError> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT namespace, name, resource_version, conditions
                 FROM managed_resources ORDER BY namespace, name",
            )?;
            let rows = stmt
                .query_map([], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_resource).collect()
        })
        .await
    }
}

type ResourceRow = (String, String, i64, String);

fn read_row(row: &rusqlite::Row<'_>) -> Result<ResourceRow, rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_resource(row: ResourceRow) -> Result<ManagedResource, StoreError> {
    let (namespace, name, version, conditions) = row;
    let conditions: Vec<Condition> = serde_json::from_str(&conditions)?;
    Ok(ManagedResource {
        key: NamespacedName { namespace, name },
        resource_version: version as u64,
        status: ResourceStatus { conditions },
    })
}

fn find(conn: &Connection, key: &NamespacedName) -> Result<Option<ManagedResource>, StoreError> {
    conn.query_row(
        "SELECT namespace, name, resource_version, conditions
         FROM managed_resources WHERE namespace = ?1 AND name = ?2",
        params![key.namespace, key.name],
        read_row,
    )
    .optional()?
    .map(into_resource)
    .transpose()
}

#[async_trait]
impl ResourceStore for SqliteStore {
    async fn get(&self, key: &NamespacedName) -> Result<ManagedResource, StoreError> {
        let key = key.clone();
        self.run_blocking(move |conn| {
            find(conn, &key)?.ok_or(StoreError::NotFound { key })
        })
        .await
    }

    async fn update(&self, resource: ManagedResource) -> Result<ManagedResource, StoreError> {
        self.run_blocking(move |conn| {
            let conditions = serde_json::to_string(&resource.status.conditions)?;
            let changed = conn.execute(
                "UPDATE managed_resources
                 SET conditions = ?1, resource_version = resource_version + 1, updated_at = ?2
                 WHERE namespace = ?3 AND name = ?4 AND resource_version = ?5",
                params![
                    conditions,
                    Utc::now().to_rfc3339(),
                    resource.key.namespace,
                    resource.key.name,
                    resource.resource_version as i64,
                ],
            )?;

            if changed == 0 {
                return match find(conn, &resource.key)? {
                    None => Err(StoreError::NotFound { key: resource.key }),
                    Some(stored) => Err(StoreError::Conflict {
                        key: resource.key,
                        expected: resource.resource_version,
                        actual: stored.resource_version,
                    }),
                };
            }

            Ok(ManagedResource {
                resource_version: resource.resource_version + 1,
                ..resource
            })
        })
        .await
    }
}

/// Returns the canonical database path: `~/.driftwatch/data/driftwatch.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".driftwatch").join("data").join("driftwatch.db"))
}
