//! Storage layer for the entity hierarchy and observations
//!
//! Available implementations:
//! - SQLite through sqlx (default, `sqlite://...` URLs)
//! - In-memory storage (`memory://`), mainly for tests
//!
//! Both apply the deduplication gate from [`crate::observations::dedup`]
//! inside one atomic unit per inbound batch.

pub mod entities;
pub mod memory_storage;
pub mod seed;
pub mod sqlite_storage;

pub use entities::{Entity, Property};
pub use memory_storage::MemoryDatabase;
pub use sqlite_storage::SqliteDatabase;

use crate::error::Result;
use crate::observations::{Observation, SensorObservation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// URL selecting the in-memory store
pub const MEMORY_URL: &str = "memory://";

/// Zero-based page of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub size: usize,
}

impl Page {
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

/// Observation range query
#[derive(Debug, Clone)]
pub struct ObservationQuery {
    pub sensor_id: String,
    /// Inclusive lower bound
    pub starting: DateTime<Utc>,
    /// Inclusive upper bound
    pub ending: DateTime<Utc>,
    pub page: Page,
}

/// Outcome of appending one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendSummary {
    pub inserted: usize,
    /// Candidates dropped by the deduplication gate
    pub suppressed: usize,
}

/// Persistent store for entities and observations
#[async_trait]
pub trait Database: Send + Sync {
    /// Create tables and indexes if they do not exist
    async fn init(&self) -> Result<()>;

    /// Add an entity and, if it has one, its link to the parent.
    ///
    /// Adding an existing entity or link is a no-op. A parent that does not
    /// exist is a `NotFound` error.
    async fn add_entity(&self, entity: &Entity) -> Result<()>;

    async fn get_entity(&self, entity_id: &str, entity_type: &str) -> Result<Entity>;

    /// Entities of one type ordered by id, with the total count
    async fn get_entities(&self, entity_type: &str, page: Page) -> Result<(u64, Vec<Entity>)>;

    /// All transitive descendants of `root` having `entity_type`, ordered by id
    async fn get_child_entities(&self, root: &Entity, entity_type: &str) -> Result<Vec<Entity>>;

    /// Append a batch through the deduplication gate.
    ///
    /// Either every accepted observation of the batch is stored or none is.
    async fn add_observation(&self, batch: &SensorObservation) -> Result<AppendSummary>;

    /// Observations of a sensor in a time range, ascending by time, with the
    /// total count
    async fn get_observations(&self, query: &ObservationQuery) -> Result<(u64, Vec<Observation>)>;
}

/// Open the store selected by `database_url` and create its schema.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Arc<dyn Database>> {
    let db: Arc<dyn Database> = if database_url == MEMORY_URL {
        info!("Using in-memory storage");
        Arc::new(MemoryDatabase::new())
    } else {
        Arc::new(SqliteDatabase::connect(database_url, max_connections).await?)
    };

    db.init().await?;
    Ok(db)
}
