//! # LoRa Sensor ETL
//!
//! Ingests uplinks from battery-powered LoRaWAN field sensors: decodes the
//! compact tag-unit payload format, resolves each reading's location from
//! the payload, the device registry or network metadata, reconstructs
//! timestamps of batched samples, and stores one time-series point per
//! measurement.

pub mod auth;
pub mod codec;
pub mod config;
pub mod database;
pub mod envelope;
pub mod error;
pub mod ingest;
pub mod location;
pub mod models;
pub mod points;
pub mod registry;
pub mod service;
pub mod utils;
