//! In-memory storage
//!
//! Keeps entities, relations and observations behind one mutex. Holding the
//! lock for a whole batch gives the same all-or-nothing behavior as a
//! database transaction.

use super::{AppendSummary, Database, Entity, ObservationQuery, Page, Property};
use crate::error::{RecError, Result};
use crate::observations::{
    dedup::{should_persist, window_start},
    Observation, ObservedValue, SensorObservation,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct EntityRow {
    node_id: u64,
    entity: Entity,
}

#[derive(Debug, Clone)]
struct ObservationRow {
    device_id: String,
    observation: Observation,
}

impl ObservationRow {
    fn same_series(&self, device_id: &str, o: &Observation) -> bool {
        self.device_id == device_id
            && self.observation.sensor_id == o.sensor_id
            && self.observation.quantity_kind == o.quantity_kind
    }

    /// Full-tuple equality, mirroring the unique index of the SQL store
    fn duplicates(&self, device_id: &str, o: &Observation) -> bool {
        self.same_series(device_id, o) && self.observation == *o
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_node_id: u64,
    entities: Vec<EntityRow>,
    /// (parent, child)
    relations: BTreeSet<(u64, u64)>,
    observations: Vec<ObservationRow>,
}

impl MemoryState {
    fn node_id(&self, entity_id: &str, entity_type: &str) -> Option<u64> {
        self.entities
            .iter()
            .find(|row| row.entity.id == entity_id && row.entity.entity_type == entity_type)
            .map(|row| row.node_id)
    }

    fn row(&self, node_id: u64) -> Option<&EntityRow> {
        self.entities.iter().find(|row| row.node_id == node_id)
    }

    fn parent_of(&self, node_id: u64) -> Option<Property> {
        self.relations
            .iter()
            .find(|(_, child)| *child == node_id)
            .and_then(|(parent, _)| self.row(*parent))
            .map(|row| row.entity.as_property())
    }

    fn with_parent(&self, row: &EntityRow) -> Entity {
        let mut entity = row.entity.clone();
        entity.is_part_of = self.parent_of(row.node_id);
        entity
    }

    fn last_in_window<'a>(
        rows: impl Iterator<Item = &'a ObservationRow>,
        device_id: &str,
        candidate: &Observation,
    ) -> Option<ObservedValue> {
        let lower = window_start(candidate.observation_time);
        rows.filter(|row| {
            row.same_series(device_id, candidate) && row.observation.observation_time > lower
        })
        // later rows win ties, like the highest observation id in SQL
        .fold(None::<&ObservationRow>, |latest, row| match latest {
            Some(l) if l.observation.observation_time > row.observation.observation_time => {
                Some(l)
            }
            _ => Some(row),
        })
        .map(|row| row.observation.observed_value())
    }
}

/// Mutex-guarded in-process store
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn add_entity(&self, entity: &Entity) -> Result<()> {
        let mut state = self.state.lock().await;

        let parent_node = match &entity.is_part_of {
            Some(parent) => Some(state.node_id(&parent.id, &parent.entity_type).ok_or_else(
                || {
                    RecError::not_found(format!(
                        "parent entity {} ({}) does not exist",
                        parent.id, parent.entity_type
                    ))
                },
            )?),
            None => None,
        };

        let node_id = match state.node_id(&entity.id, &entity.entity_type) {
            Some(node_id) => node_id,
            None => {
                state.next_node_id += 1;
                let node_id = state.next_node_id;
                let mut stored = entity.clone();
                stored.is_part_of = None;
                state.entities.push(EntityRow {
                    node_id,
                    entity: stored,
                });
                node_id
            }
        };

        if let Some(parent_node) = parent_node {
            state.relations.insert((parent_node, node_id));
        }

        Ok(())
    }

    async fn get_entity(&self, entity_id: &str, entity_type: &str) -> Result<Entity> {
        let state = self.state.lock().await;
        let node_id = state
            .node_id(entity_id, entity_type)
            .ok_or_else(|| RecError::not_found(format!("{entity_type} {entity_id}")))?;
        let row = state
            .row(node_id)
            .ok_or_else(|| RecError::internal(format!("node {node_id} vanished")))?;
        Ok(state.with_parent(row))
    }

    async fn get_entities(&self, entity_type: &str, page: Page) -> Result<(u64, Vec<Entity>)> {
        let state = self.state.lock().await;
        let mut rows: Vec<&EntityRow> = state
            .entities
            .iter()
            .filter(|row| row.entity.entity_type == entity_type)
            .collect();
        rows.sort_by(|a, b| a.entity.id.cmp(&b.entity.id));

        let total = rows.len() as u64;
        let entities = rows
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .map(|row| state.with_parent(row))
            .collect();
        Ok((total, entities))
    }

    async fn get_child_entities(&self, root: &Entity, entity_type: &str) -> Result<Vec<Entity>> {
        let state = self.state.lock().await;
        let Some(root_node) = state.node_id(&root.id, &root.entity_type) else {
            return Ok(Vec::new());
        };

        let mut visited = BTreeSet::from([root_node]);
        let mut queue = VecDeque::from([root_node]);
        while let Some(node) = queue.pop_front() {
            for (_, child) in state.relations.iter().filter(|(parent, _)| *parent == node) {
                if visited.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }

        let mut matches: Vec<&EntityRow> = visited
            .iter()
            .filter_map(|node| state.row(*node))
            .filter(|row| row.entity.entity_type == entity_type)
            .collect();
        matches.sort_by(|a, b| a.entity.id.cmp(&b.entity.id));
        matches.dedup_by(|a, b| a.entity.id == b.entity.id);

        Ok(matches.into_iter().map(|row| state.with_parent(row)).collect())
    }

    async fn add_observation(&self, batch: &SensorObservation) -> Result<AppendSummary> {
        let mut state = self.state.lock().await;
        let mut staged: Vec<ObservationRow> = Vec::new();
        let mut summary = AppendSummary::default();

        for o in &batch.observations {
            let last = MemoryState::last_in_window(
                state.observations.iter().chain(staged.iter()),
                &batch.device_id,
                o,
            );

            if !should_persist(o, last.as_ref()) {
                debug!(
                    "suppressing unchanged {} for {}/{}",
                    o.quantity_kind, batch.device_id, o.sensor_id
                );
                summary.suppressed += 1;
                continue;
            }

            let duplicate = state
                .observations
                .iter()
                .chain(staged.iter())
                .any(|row| row.duplicates(&batch.device_id, o));
            if duplicate {
                // nothing from this batch is kept
                return Err(RecError::database(format!(
                    "observation {} {} at {} already exists",
                    o.sensor_id, o.quantity_kind, o.observation_time
                )));
            }

            staged.push(ObservationRow {
                device_id: batch.device_id.clone(),
                observation: o.clone(),
            });
            summary.inserted += 1;
        }

        state.observations.extend(staged);
        Ok(summary)
    }

    async fn get_observations(&self, query: &ObservationQuery) -> Result<(u64, Vec<Observation>)> {
        let state = self.state.lock().await;
        let mut matches: Vec<&Observation> = state
            .observations
            .iter()
            .map(|row| &row.observation)
            .filter(|o| {
                o.sensor_id == query.sensor_id
                    && o.observation_time >= query.starting
                    && o.observation_time <= query.ending
            })
            .collect();
        matches.sort_by_key(|o| o.observation_time);

        let total = matches.len() as u64;
        let observations = matches
            .into_iter()
            .skip(query.page.offset())
            .take(query.page.size)
            .cloned()
            .collect();
        Ok((total, observations))
    }
}
