//! Transaction entity - the record binding one donation to one request with
//! a specific allocation and lifecycle state.
//!
//! The committed quantities live in [`super::allocation_line`] rows owned by
//! the transaction. A transaction references but never owns its donation and
//! request. The pending → approved / pending → rejected transitions each
//! fire at most once, enforced by a compare-and-swap on `status`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::TransactionStatus;

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "donation_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Donation side of the pairing
    pub donation_id: i64,
    /// Request side of the pairing
    pub request_id: i64,
    /// Donor, denormalized for notification routing
    pub donor_id: i64,
    /// Recipient, denormalized for notification routing
    pub recipient_id: i64,
    /// Lifecycle state
    pub status: TransactionStatus,
    /// Stamped when the transaction leaves `pending`
    pub response_date: Option<DateTimeUtc>,
    /// Reason supplied on rejection
    pub rejection_reason: Option<String>,
    /// When the transaction was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between DonationTransaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Referenced donation
    #[sea_orm(
        belongs_to = "super::donation::Entity",
        from = "Column::DonationId",
        to = "super::donation::Column::Id"
    )]
    Donation,
    /// Referenced request
    #[sea_orm(
        belongs_to = "super::request_need::Entity",
        from = "Column::RequestId",
        to = "super::request_need::Column::Id"
    )]
    Request,
    /// Owned allocation lines
    #[sea_orm(has_many = "super::allocation_line::Entity")]
    AllocationLines,
    /// Delivery spawned on approval
    #[sea_orm(has_many = "super::delivery::Entity")]
    Deliveries,
}

impl Related<super::donation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Donation.def()
    }
}

impl Related<super::request_need::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Request.def()
    }
}

impl Related<super::allocation_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AllocationLines.def()
    }
}

impl Related<super::delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deliveries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
