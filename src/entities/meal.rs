//! Meal line entity - a prepared-meal line owned by a donation or a request.
//!
//! Same ledger shape as [`super::product`]: `total_quantity` at creation,
//! `remaining_quantity` live.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Meal database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meals")]
pub struct Model {
    /// Unique identifier for the meal line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning donation, if this is a donation line
    pub donation_id: Option<i64>,
    /// Owning request, if this is a request line
    pub request_id: Option<i64>,
    /// Meal name (e.g. "Vegetable couscous")
    pub meal_name: String,
    /// Free-form description
    pub meal_description: String,
    /// Breakfast, Lunch, Dinner, Snack, Dessert, or Other
    pub meal_type: String,
    /// Portions at creation time
    pub total_quantity: i32,
    /// Portions not yet allocated (donation) or not yet fulfilled (request)
    pub remaining_quantity: i32,
}

/// Defines relationships between Meal and other entities
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
