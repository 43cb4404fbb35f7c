//! Route handlers
//!
//! Successful bodies are JSON-LD. Failures are rendered by the
//! `IntoResponse` impl of [`RecError`].

use super::cloudevents::CloudEvent;
use super::hydra::{page_from_query, parse_query, Collection, PartialCollectionView, QueryParams};
use super::AppState;
use crate::error::{RecError, Result};
use crate::observations::SensorObservation;
use crate::storage::{entities::type_from_type_name, Entity, ObservationQuery};
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const LD_JSON: &str = "application/ld+json";

fn ld_json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| RecError::internal(format!("failed to serialize response: {e}")))?;
    Ok((status, [(header::CONTENT_TYPE, LD_JSON)], bytes).into_response())
}

fn request_uri(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub async fn create_entity(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let entity: Entity = serde_json::from_slice(&body)
        .map_err(|e| RecError::invalid_input(format!("unable to parse entity: {e}")))?;

    if let Err(e) = state.service.add_entity(&entity).await {
        warn!("unable to add entity {} [{}]: {}", entity.id, entity.entity_type, e);
        return Err(RecError::invalid_input(e.to_string()));
    }

    let stored = state
        .service
        .get_entity(&entity.id, &entity.entity_type)
        .await
        .map_err(|e| {
            error!("unable to fetch entity {} [{}]: {}", entity.id, entity.entity_type, e);
            RecError::internal(e.to_string())
        })?;

    ld_json(StatusCode::CREATED, &stored)
}

/// Resolve `root[id]` and `root[type]` to a stored entity
async fn root_entity(state: &AppState, params: &QueryParams) -> Option<Entity> {
    let id = params.get("root[id]").filter(|id| !id.is_empty())?;
    let type_name = params.get("root[type]").filter(|t| !t.is_empty())?;
    let Some(entity_type) = type_from_type_name(type_name) else {
        debug!("unknown root type '{}'", type_name);
        return None;
    };

    state.service.get_entity(id, entity_type).await.ok()
}

pub async fn list_entities(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    RawQuery(raw): RawQuery,
    entity_type: &'static str,
) -> Result<Response> {
    let params = parse_query(raw.as_deref());

    if let Some(root) = root_entity(&state, &params).await {
        let children = state
            .service
            .get_child_entities(&root, entity_type)
            .await
            .map_err(|e| RecError::invalid_input(format!("could not load entities from root: {e}")))?;
        return ld_json(StatusCode::OK, &Collection::new(uri.path(), children));
    }

    let page = page_from_query(&params);
    let (total, entities) = state.service.get_entities(entity_type, page).await?;
    let view = PartialCollectionView::new(
        &request_uri(&uri),
        state.link_base(&uri),
        &params,
        page,
        total,
    );

    ld_json(StatusCode::OK, &Collection::paged(uri.path(), entities, total, view))
}

fn parse_time(params: &QueryParams, key: &str, default: DateTime<Utc>) -> Result<DateTime<Utc>> {
    match params.get(key).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| RecError::invalid_input(format!("{key} is not RFC3339: {e}"))),
    }
}

pub async fn list_observations(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    RawQuery(raw): RawQuery,
) -> Result<Response> {
    let params = parse_query(raw.as_deref());

    let sensor_id = params
        .get("sensor_id")
        .filter(|id| !id.is_empty())
        .cloned()
        .ok_or_else(|| RecError::invalid_input("no sensor_id in query string"))?;

    let page = page_from_query(&params);
    let query = ObservationQuery {
        sensor_id,
        starting: parse_time(&params, "hasObservationTime[starting]", DateTime::<Utc>::UNIX_EPOCH)?,
        ending: parse_time(&params, "hasObservationTime[ending]", Utc::now())?,
        page,
    };

    let (total, observations) = state.service.get_observations(&query).await?;
    let view = PartialCollectionView::new(
        &request_uri(&uri),
        state.link_base(&uri),
        &params,
        page,
        total,
    );

    ld_json(StatusCode::OK, &Collection::paged(uri.path(), observations, total, view))
}

pub async fn create_observation(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode> {
    let batch: SensorObservation = serde_json::from_slice(&body)
        .map_err(|e| RecError::invalid_input(format!("unable to parse observation: {e}")))?;

    state.service.add_observation(&batch).await?;
    Ok(StatusCode::CREATED)
}

pub async fn handle_cloudevent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let event = CloudEvent::from_request(&headers, &body)?;
    debug!(
        "received {} event {} from {}",
        event.event_type, event.id, event.source
    );

    state.service.handle_event(&event.event_type, &event.data).await?;
    Ok(StatusCode::CREATED)
}
