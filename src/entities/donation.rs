//! Donation entity - an offer of surplus food from a donor.
//!
//! A donation owns its product or meal lines (see [`super::product`] and
//! [`super::meal`]); deleting a donation cascades to them. Remaining
//! quantities live on the owned lines; `remaining_meals` additionally tracks
//! the meal-category total so fulfillment can be derived without summing
//! lines. Quantities only decrease through the allocation engine, except for
//! the explicit restock path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::{AdminApproval, Category, DonationStatus};

/// Donation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    /// Unique identifier for the donation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User offering the donation
    pub donor_id: i64,
    /// Human-readable title
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Food category; decides whether product or meal lines apply
    pub category: Category,
    /// Fulfillment lifecycle, derived from remaining quantities
    pub status: DonationStatus,
    /// Admin moderation verdict, independent of fulfillment
    pub admin_approval: AdminApproval,
    /// Set by the anomaly detector when the donation is flagged
    pub is_anomaly: bool,
    /// Must be in the future at creation time
    pub expiration_date: DateTimeUtc,
    /// Meal category only: total meals offered at creation
    pub number_of_meals: Option<i32>,
    /// Meal category only: meals not yet allocated
    pub remaining_meals: Option<i32>,
    /// Readable pickup address
    pub address: String,
    /// Pickup longitude
    pub longitude: f64,
    /// Pickup latitude
    pub latitude: f64,
    /// When the donation was created
    pub created_at: DateTimeUtc,
    /// When the donation was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Donation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning donor
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DonorId",
        to = "super::user::Column::Id"
    )]
    Donor,
    /// Owned product lines (cascade on delete)
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    /// Owned meal lines (cascade on delete)
    #[sea_orm(has_many = "super::meal::Entity")]
    Meals,
    /// Transactions targeting this donation
    #[sea_orm(has_many = "super::donation_transaction::Entity")]
    Transactions,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Donor.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::meal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meals.def()
    }
}

impl Related<super::donation_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
