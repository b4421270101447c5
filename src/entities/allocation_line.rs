//! Allocation line entity - one committed product or meal quantity on a
//! transaction.
//!
//! Exactly one of `product_id` / `meal_id` is set, matching the donation's
//! category. Lines written at proposal time are the recipient's ask; the
//! allocation engine rewrites them with the finalized quantities when the
//! transaction is approved.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Allocation line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocation_lines")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning transaction
    pub transaction_id: i64,
    /// Donation product line this allocation draws from
    pub product_id: Option<i64>,
    /// Donation meal line this allocation draws from
    pub meal_id: Option<i64>,
    /// Committed quantity
    pub quantity: i32,
}

/// Defines relationships between AllocationLine and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning transaction
    #[sea_orm(
        belongs_to = "super::donation_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::donation_transaction::Column::Id"
    )]
    Transaction,
    /// Referenced product line
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    /// Referenced meal line
    #[sea_orm(
        belongs_to = "super::meal::Entity",
        from = "Column::MealId",
        to = "super::meal::Column::Id"
    )]
    Meal,
}

impl Related<super::donation_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::meal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
