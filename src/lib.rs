//! RealEstateCore (REC) observation API
//!
//! Ingests sensor telemetry delivered as CloudEvents or posted directly,
//! normalizes it into observation records and stores them together with a
//! space → building → sensor hierarchy.
//!
//! # Pipeline
//!
//! - [`envelopes`] decode `message.accepted` and `function.updated` events
//! - [`observations::quantity`] maps vendor codes to quantity kinds
//! - [`observations::normalize`] rounds numeric values
//! - [`observations::dedup`] decides whether a candidate is persisted
//! - [`storage`] appends accepted observations, one transaction per batch
//!
//! The REST surface in [`http_transport`] exposes entities and observations
//! as Hydra collections.

pub mod config;
pub mod envelopes;
pub mod error;
pub mod http_transport;
pub mod logging;
pub mod observations;
pub mod services;
pub mod storage;

pub use crate::config::ServiceConfig;
pub use crate::error::{RecError, Result};
pub use crate::services::RecService;
