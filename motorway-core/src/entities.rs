//! Marketplace entities served through the read caches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::EntityId;

/// Entity kind discriminator, one per cached entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Service,
    Car,
    Auction,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Service, EntityKind::Car, EntityKind::Auction];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Service => "service",
            EntityKind::Car => "car",
            EntityKind::Auction => "auction",
        }
    }

    /// Plural form used in operation names and stats output.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Service => "services",
            EntityKind::Car => "cars",
            EntityKind::Auction => "auctions",
        }
    }

    /// Name of the grouping attribute used by grouped reads.
    pub fn group_attribute(&self) -> &'static str {
        match self {
            EntityKind::Service | EntityKind::Car => "category",
            EntityKind::Auction => "status",
        }
    }

    /// Stable position in [`EntityKind::ALL`].
    pub fn index(&self) -> usize {
        match self {
            EntityKind::Service => 0,
            EntityKind::Car => 1,
            EntityKind::Auction => 2,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity that can sit behind the read caches.
///
/// Every cached family has exactly one grouping attribute (a category or a
/// status); grouped reads and targeted invalidation key on it.
pub trait CatalogEntity: Clone + Send + Sync + 'static {
    fn kind() -> EntityKind;

    fn id(&self) -> EntityId;

    /// Value of the grouping attribute.
    fn group(&self) -> &str;
}

/// A bookable workshop service (servicing, detailing, inspection...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: EntityId,
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub duration_minutes: i32,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// A car listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: EntityId,
    pub make: String,
    pub model: String,
    pub year: i32,
    /// Body type (suv, sedan, hatchback...).
    pub category: String,
    pub price_cents: i64,
    pub mileage_km: i64,
    pub listed_at: DateTime<Utc>,
}

/// Lifecycle of an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Scheduled,
    Live,
    Closed,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Scheduled => "scheduled",
            AuctionStatus::Live => "live",
            AuctionStatus::Closed => "closed",
        }
    }
}

/// An auction for a listed car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: EntityId,
    pub car_id: EntityId,
    pub status: AuctionStatus,
    pub reserve_cents: i64,
    pub current_bid_cents: Option<i64>,
    pub ends_at: DateTime<Utc>,
}

impl CatalogEntity for Service {
    fn kind() -> EntityKind {
        EntityKind::Service
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn group(&self) -> &str {
        &self.category
    }
}

impl CatalogEntity for Car {
    fn kind() -> EntityKind {
        EntityKind::Car
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn group(&self) -> &str {
        &self.category
    }
}

impl CatalogEntity for Auction {
    fn kind() -> EntityKind {
        EntityKind::Auction
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn group(&self) -> &str {
        self.status.as_str()
    }
}
