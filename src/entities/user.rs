//! User entity - donors, recipients, transporters, and admins.
//!
//! The matching engine reads `recipient_type` for urgency-aware score
//! bonuses; the assignment engine reads the transporter flags and last-known
//! coordinates. `(0.0, 0.0)` coordinates are the "never reported" sentinel
//! and exclude a transporter from nearest-neighbor search.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::UserRole;

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Contact email, used for fire-and-forget dispatch
    pub email: String,
    /// Platform role
    pub role: UserRole,
    /// Organisation type for recipients (e.g. "relief", "social_welfare");
    /// None for individuals and transporters
    pub recipient_type: Option<String>,
    /// Readable address, copied onto deliveries
    pub address: Option<String>,
    /// Account enabled
    pub is_active: bool,
    /// Blocked by an admin
    pub is_blocked: bool,
    /// Transporter only: free to take a new delivery
    pub is_available: bool,
    /// Last-known longitude (transporters), 0.0 when unknown
    pub longitude: f64,
    /// Last-known latitude (transporters), 0.0 when unknown
    pub latitude: f64,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Donations offered by this user
    #[sea_orm(has_many = "super::donation::Entity")]
    Donations,
    /// Requests filed by this user
    #[sea_orm(has_many = "super::request_need::Entity")]
    Requests,
}

impl Related<super::donation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Donations.def()
    }
}

impl Related<super::request_need::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Recipient organisation type granted the near-expiry priority bonus.
pub const RECIPIENT_TYPE_RELIEF: &str = "relief";
/// Recipient organisation type granted the flat social-welfare bonus.
pub const RECIPIENT_TYPE_SOCIAL_WELFARE: &str = "social_welfare";
