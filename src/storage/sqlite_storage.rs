//! SQLite storage through sqlx
//!
//! Observation times are stored as INTEGER microseconds since the epoch so
//! that range and window predicates compare numerically.

use super::{AppendSummary, Database, Entity, ObservationQuery, Page, Property};
use crate::error::{RecError, Result};
use crate::observations::{
    dedup::{should_persist, window_start},
    Observation, ObservedValue, SensorObservation,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS entity (
        node_id        INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_id      TEXT NOT NULL,
        entity_type    TEXT NOT NULL,
        entity_context TEXT NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS entity_entity_type_entity_id_unique_indx ON entity (entity_type, entity_id)",
    r#"
    CREATE TABLE IF NOT EXISTS relation (
        parent INTEGER NOT NULL,
        child  INTEGER NOT NULL,
        PRIMARY KEY (parent, child)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS relation_child_parent_indx ON relation (child, parent)",
    r#"
    CREATE TABLE IF NOT EXISTS observations (
        observation_id   INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id        TEXT NOT NULL,
        sensor_id        TEXT NOT NULL,
        observation_time INTEGER NOT NULL,
        value            REAL NULL,
        value_string     TEXT NULL,
        value_boolean    INTEGER NULL,
        quantity_kind    TEXT NOT NULL
    )
    "#,
    // NULLs compare equal here, a NULL value never matches a stored number
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS observations_unique_indx ON observations (
        device_id, sensor_id, observation_time, quantity_kind,
        IFNULL(value, 'null'), IFNULL(value_string, char(0)), IFNULL(value_boolean, -1)
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS observations_series_time_indx ON observations (device_id, sensor_id, quantity_kind, observation_time DESC)",
    "CREATE INDEX IF NOT EXISTS observations_sensor_time_indx ON observations (sensor_id, observation_time)",
];

/// How long a writer waits for the database write lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

type ObservationTuple = (i64, Option<f64>, Option<String>, Option<bool>, String, String);
type EntityTuple = (i64, String, String, String);

/// sqlx-backed store
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open a pool for `database_url` (`sqlite://path.db`, `sqlite::memory:`).
    ///
    /// In-memory databases are bound to one connection that never expires,
    /// since each connection would otherwise see its own empty database.
    /// File databases run in WAL mode so readers never block the writer.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Opening SQLite database {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RecError::config(format!("invalid database url '{database_url}': {e}")))?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let (options, pool_options) = if in_memory {
            let pool_options = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            (options, pool_options)
        } else {
            let pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
            (options.journal_mode(SqliteJournalMode::Wal), pool_options)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| RecError::database(format!("failed to open {database_url}: {e}")))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a write transaction that holds the write lock from its first
    /// statement. A deferred transaction that reads first cannot upgrade
    /// while another connection writes, and fails with `database is locked`.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

/// LIMIT/OFFSET operand. Values past `i64::MAX` would wrap negative, which
/// SQLite reads as "no limit" and "no offset".
fn sql_bound(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| RecError::database(format!("observation time {micros} is out of range")))
}

async fn node_id(
    conn: &mut SqliteConnection,
    entity_id: &str,
    entity_type: &str,
) -> Result<Option<i64>> {
    let node_id = sqlx::query_scalar::<_, i64>(
        "SELECT node_id FROM entity WHERE entity_id = ?1 AND entity_type = ?2",
    )
    .bind(entity_id)
    .bind(entity_type)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(node_id)
}

async fn parent_of(conn: &mut SqliteConnection, node_id: i64) -> Result<Option<Property>> {
    let parent = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT entity.entity_id, entity.entity_type
        FROM relation JOIN entity ON relation.parent = entity.node_id
        WHERE relation.child = ?1
        LIMIT 1
        "#,
    )
    .bind(node_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(parent.map(|(id, entity_type)| Property { id, entity_type }))
}

async fn entity_from_row(conn: &mut SqliteConnection, row: EntityTuple) -> Result<Entity> {
    let (node_id, id, entity_type, context) = row;
    Ok(Entity {
        context,
        id,
        entity_type,
        is_part_of: parent_of(conn, node_id).await?,
    })
}

/// Most recent value of the candidate's series inside its dedup window
async fn find_last_in_window(
    conn: &mut SqliteConnection,
    device_id: &str,
    candidate: &Observation,
) -> Result<Option<ObservedValue>> {
    let row = sqlx::query_as::<_, (Option<f64>, Option<String>, Option<bool>)>(
        r#"
        SELECT value, value_string, value_boolean
        FROM observations
        WHERE device_id = ?1
          AND sensor_id = ?2
          AND quantity_kind = ?3
          AND observation_time > ?4
        ORDER BY observation_time DESC, observation_id DESC
        LIMIT 1
        "#,
    )
    .bind(device_id)
    .bind(&candidate.sensor_id)
    .bind(&candidate.quantity_kind)
    .bind(to_micros(window_start(candidate.observation_time)))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(value, value_string, value_boolean)| ObservedValue {
        value,
        value_string,
        value_boolean,
    }))
}

async fn insert_observation(
    conn: &mut SqliteConnection,
    device_id: &str,
    o: &Observation,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO observations (device_id, sensor_id, observation_time, value, value_string, value_boolean, quantity_kind)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(device_id)
    .bind(&o.sensor_id)
    .bind(to_micros(o.observation_time))
    .bind(o.value)
    .bind(o.value_string.as_deref())
    .bind(o.value_boolean)
    .bind(&o.quantity_kind)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        RecError::database(format!(
            "failed to insert {} for {}/{}: {e}",
            o.quantity_kind, device_id, o.sensor_id
        ))
    })?;
    Ok(())
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn init(&self) -> Result<()> {
        debug!("Initializing database schema");

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| RecError::database(format!("failed to create schema: {e}")))?;
        }

        for index_sql in INDEXES {
            if let Err(e) = sqlx::query(index_sql).execute(&self.pool).await {
                warn!("Failed to create index: {} - {}", index_sql, e);
            }
        }

        info!("Database schema initialized successfully");
        Ok(())
    }

    async fn add_entity(&self, entity: &Entity) -> Result<()> {
        let mut tx = self.begin_write().await?;

        sqlx::query(
            "INSERT INTO entity (entity_id, entity_type, entity_context) VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
        )
        .bind(&entity.id)
        .bind(&entity.entity_type)
        .bind(&entity.context)
        .execute(&mut *tx)
        .await?;

        if let Some(parent) = &entity.is_part_of {
            let child = node_id(&mut tx, &entity.id, &entity.entity_type)
                .await?
                .ok_or_else(|| RecError::internal(format!("entity {} was not stored", entity.id)))?;
            let parent_node = node_id(&mut tx, &parent.id, &parent.entity_type)
                .await?
                .ok_or_else(|| {
                    RecError::not_found(format!(
                        "parent entity {} ({}) does not exist",
                        parent.id, parent.entity_type
                    ))
                })?;

            sqlx::query("INSERT INTO relation (parent, child) VALUES (?1, ?2) ON CONFLICT DO NOTHING")
                .bind(parent_node)
                .bind(child)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_entity(&self, entity_id: &str, entity_type: &str) -> Result<Entity> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, EntityTuple>(
            "SELECT node_id, entity_id, entity_type, entity_context FROM entity WHERE entity_id = ?1 AND entity_type = ?2",
        )
        .bind(entity_id)
        .bind(entity_type)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RecError::not_found(format!("{entity_type} {entity_id}")))?;

        entity_from_row(&mut conn, row).await
    }

    async fn get_entities(&self, entity_type: &str, page: Page) -> Result<(u64, Vec<Entity>)> {
        let mut conn = self.pool.acquire().await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entity WHERE entity_type = ?1")
            .bind(entity_type)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query_as::<_, EntityTuple>(
            r#"
            SELECT node_id, entity_id, entity_type, entity_context
            FROM entity
            WHERE entity_type = ?1
            ORDER BY entity_id ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(entity_type)
        .bind(sql_bound(page.size))
        .bind(sql_bound(page.offset()))
        .fetch_all(&mut *conn)
        .await?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            entities.push(entity_from_row(&mut conn, row).await?);
        }

        Ok((total as u64, entities))
    }

    async fn get_child_entities(&self, root: &Entity, entity_type: &str) -> Result<Vec<Entity>> {
        let mut conn = self.pool.acquire().await?;

        // UNION (not UNION ALL) stops the descent on relation cycles
        let rows = sqlx::query_as::<_, EntityTuple>(
            r#"
            WITH RECURSIVE traverse(node_id, entity_id, entity_type, entity_context) AS (
                SELECT node_id, entity_id, entity_type, entity_context
                FROM entity
                WHERE entity.entity_id = ?1 AND entity.entity_type = ?2
                UNION
                SELECT entity.node_id, entity.entity_id, entity.entity_type, entity.entity_context
                FROM traverse
                JOIN relation ON traverse.node_id = relation.parent
                JOIN entity ON relation.child = entity.node_id
            )
            SELECT node_id, entity_id, entity_type, entity_context
            FROM traverse
            WHERE traverse.entity_type = ?3
            ORDER BY traverse.entity_id ASC
            "#,
        )
        .bind(&root.id)
        .bind(&root.entity_type)
        .bind(entity_type)
        .fetch_all(&mut *conn)
        .await?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            entities.push(entity_from_row(&mut conn, row).await?);
        }

        Ok(entities)
    }

    async fn add_observation(&self, batch: &SensorObservation) -> Result<AppendSummary> {
        // the window read and the insert share one write lock, so a
        // concurrent batch for the same series sees this one's rows.
        // dropping `tx` before commit rolls the whole batch back
        let mut tx = self.begin_write().await?;
        let mut summary = AppendSummary::default();

        for o in &batch.observations {
            let last = find_last_in_window(&mut tx, &batch.device_id, o).await?;

            if !should_persist(o, last.as_ref()) {
                debug!(
                    "suppressing unchanged {} for {}/{}",
                    o.quantity_kind, batch.device_id, o.sensor_id
                );
                summary.suppressed += 1;
                continue;
            }

            insert_observation(&mut tx, &batch.device_id, o).await?;
            summary.inserted += 1;
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn get_observations(&self, query: &ObservationQuery) -> Result<(u64, Vec<Observation>)> {
        let mut conn = self.pool.acquire().await?;
        let starting = to_micros(query.starting);
        let ending = to_micros(query.ending);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM observations WHERE sensor_id = ?1 AND observation_time BETWEEN ?2 AND ?3",
        )
        .bind(&query.sensor_id)
        .bind(starting)
        .bind(ending)
        .fetch_one(&mut *conn)
        .await?;

        let rows = sqlx::query_as::<_, ObservationTuple>(
            r#"
            SELECT observation_time, value, value_string, value_boolean, quantity_kind, sensor_id
            FROM observations
            WHERE sensor_id = ?1
              AND observation_time BETWEEN ?2 AND ?3
            ORDER BY observation_time ASC, observation_id ASC
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(&query.sensor_id)
        .bind(starting)
        .bind(ending)
        .bind(sql_bound(query.page.size))
        .bind(sql_bound(query.page.offset()))
        .fetch_all(&mut *conn)
        .await?;

        let observations = rows
            .into_iter()
            .map(
                |(time, value, value_string, value_boolean, quantity_kind, sensor_id)| {
                    Ok(Observation {
                        observation_time: from_micros(time)?,
                        value,
                        value_string,
                        value_boolean,
                        quantity_kind,
                        sensor_id,
                    })
                },
            )
            .collect::<Result<Vec<_>>>()?;

        Ok((total as u64, observations))
    }
}
