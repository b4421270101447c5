//! Product line entity - a packaged-product line owned by a donation or a
//! request.
//!
//! One row is both the product description and the quantity ledger for its
//! owner: `total_quantity` is the amount at creation, `remaining_quantity`
//! the live amount. On donation lines "remaining" means still available; on
//! request lines it means still wanted. A row whose remaining quantity hits
//! zero is kept as the record of the exhausted line.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning donation, if this is a donation line
    pub donation_id: Option<i64>,
    /// Owning request, if this is a request line
    pub request_id: Option<i64>,
    /// Product name (e.g. "Canned beans")
    pub name: String,
    /// Type used for cross-donation matching (e.g. "Canned_Goods");
    /// matching compares types, not row identity
    pub product_type: String,
    /// Free-form description
    pub product_description: String,
    /// Weight of a single unit
    pub weight_per_unit: f64,
    /// Unit of weight (kg, g, lb, oz, ml, l)
    pub weight_unit: String,
    /// Units at creation time
    pub total_quantity: i32,
    /// Units not yet allocated (donation) or not yet fulfilled (request)
    pub remaining_quantity: i32,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning donation
    #[sea_orm(
        belongs_to = "super::donation::Entity",
        from = "Column::DonationId",
        to = "super::donation::Column::Id"
    )]
    Donation,
    /// Owning request
    #[sea_orm(
        belongs_to = "super::request_need::Entity",
        from = "Column::RequestId",
        to = "super::request_need::Column::Id"
    )]
    Request,
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

impl ActiveModelBehavior for ActiveModel {}
