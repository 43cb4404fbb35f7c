//! Application service
//!
//! Thin layer between the HTTP handlers and the store. Event handling picks
//! the decoder by event type and pushes the decoded batch through the
//! deduplicating append.

use crate::envelopes::Envelope;
use crate::error::{RecError, Result};
use crate::observations::{Observation, SensorObservation};
use crate::storage::{AppendSummary, Database, Entity, ObservationQuery, Page};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct RecService {
    db: Arc<dyn Database>,
}

impl std::fmt::Debug for RecService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecService").finish_non_exhaustive()
    }
}

impl RecService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub async fn add_entity(&self, entity: &Entity) -> Result<()> {
        self.db.add_entity(entity).await
    }

    pub async fn get_entity(&self, entity_id: &str, entity_type: &str) -> Result<Entity> {
        self.db.get_entity(entity_id, entity_type).await
    }

    pub async fn get_entities(&self, entity_type: &str, page: Page) -> Result<(u64, Vec<Entity>)> {
        self.db.get_entities(entity_type, page).await
    }

    pub async fn get_child_entities(&self, root: &Entity, entity_type: &str) -> Result<Vec<Entity>> {
        self.db.get_child_entities(root, entity_type).await
    }

    pub async fn add_observation(&self, batch: &SensorObservation) -> Result<AppendSummary> {
        let summary = self.db.add_observation(batch).await?;
        debug!(
            "stored {} and suppressed {} observations for {}",
            summary.inserted, summary.suppressed, batch.device_id
        );
        Ok(summary)
    }

    pub async fn get_observations(
        &self,
        query: &ObservationQuery,
    ) -> Result<(u64, Vec<Observation>)> {
        self.db.get_observations(query).await
    }

    /// Decode an inbound event and store the resulting batch.
    ///
    /// Returns `InvalidInput` for unparseable data and `Rejected` for unknown
    /// event types or envelopes that decode to nothing.
    pub async fn handle_event(&self, event_type: &str, data: &[u8]) -> Result<AppendSummary> {
        let envelope = Envelope::parse(event_type, data).map_err(|e| {
            warn!("failed to parse {} event: {}", event_type, e);
            e
        })?;

        let Some(batch) = envelope.map_to_observation() else {
            return Err(RecError::rejected(format!(
                "{} event did not map to any observation",
                envelope.event_type()
            )));
        };

        let summary = self.add_observation(&batch).await?;
        info!(
            event_type = envelope.event_type(),
            device_id = %batch.device_id,
            inserted = summary.inserted,
            suppressed = summary.suppressed,
            "event handled"
        );
        Ok(summary)
    }
}
