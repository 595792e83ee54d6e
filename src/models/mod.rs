// src/models/mod.rs

//! Domain models for schedule acquisition.
//!
//! Reference entities come from the list protocol, schedule records from the
//! HTML protocol. Configuration lives here as well.

mod config;
mod entity;
mod schedule;

// Re-export all public types
pub use config::{CacheBackend, CacheConfig, Config, LoggingConfig, TtlPolicy, UpstreamConfig};
pub use entity::{Course, Department, Faculty, Group, ListEntity, Teacher};
pub use schedule::{Schedule, ScheduleRecord, parse_date_key};
