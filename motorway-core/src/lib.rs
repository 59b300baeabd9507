//! Motorway Core - shared types for the read layer
//!
//! Entities, error classification, the `CachedResult` outcome type and the
//! configuration structs. No I/O and no async here; everything else in the
//! workspace depends on this crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod entities;
pub mod error;
pub mod result;

/// Entity identifier.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new timestamp-sortable entity id.
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

pub use config::{
    env_flag, env_or, CacheConfig, CacheTier, CacheTiers, MonitorConfig, RetryConfig,
    DEFAULT_MAX_KEYED_ENTRIES,
};
pub use entities::{Auction, AuctionStatus, Car, CatalogEntity, EntityKind, Service};
pub use error::{
    codes, ConfigError, ErrorClass, MotorwayError, MotorwayResult, StorageError, StorageResult,
};
pub use result::CachedResult;
