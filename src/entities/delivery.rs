//! Delivery entity - the physical movement of an approved allocation.
//!
//! Spawned in `pending` when a transaction is approved. `transporter_id`
//! stays null until the assignment engine (or a manual dispatcher) claims a
//! carrier; an unassigned pending delivery remains poolable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::DeliveryStatus;

/// Delivery database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    /// Unique identifier for the delivery
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Approved transaction this delivery fulfils
    pub transaction_id: i64,
    /// Assigned transporter, null until claimed
    pub transporter_id: Option<i64>,
    /// Readable pickup address (donor side)
    pub pickup_address: String,
    /// Readable drop-off address (recipient side)
    pub delivery_address: String,
    /// Pickup longitude
    pub pickup_longitude: f64,
    /// Pickup latitude
    pub pickup_latitude: f64,
    /// Drop-off longitude
    pub delivery_longitude: f64,
    /// Drop-off latitude
    pub delivery_latitude: f64,
    /// Delivery lifecycle
    pub status: DeliveryStatus,
    /// When the delivery was created
    pub created_at: DateTimeUtc,
    /// When the delivery was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Delivery and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Fulfilled transaction
    #[sea_orm(
        belongs_to = "super::donation_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::donation_transaction::Column::Id"
    )]
    Transaction,
    /// Assigned transporter
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TransporterId",
        to = "super::user::Column::Id"
    )]
    Transporter,
}

impl Related<super::donation_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transporter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
