//! Request entity - a recipient's stated need for food.
//!
//! Owns its requested product/meal lines the same way a donation owns its
//! offered lines. `number_of_meals` is the still-wanted meal total for the
//! prepared-meals category, decremented by fulfilled allocations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::{Category, RequestStatus};

/// Request database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "request_needs")]
pub struct Model {
    /// Unique identifier for the request
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Recipient filing the need
    pub recipient_id: i64,
    /// Human-readable title
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Food category; must match the donation it is allocated from
    pub category: Category,
    /// Fulfillment lifecycle
    pub status: RequestStatus,
    /// Request is only matchable while this is in the future
    pub expiration_date: DateTimeUtc,
    /// Meal category only: meals still wanted
    pub number_of_meals: Option<i32>,
    /// Readable delivery address
    pub address: String,
    /// Delivery longitude
    pub longitude: f64,
    /// Delivery latitude
    pub latitude: f64,
    /// When the request was created
    pub created_at: DateTimeUtc,
    /// When the request was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between RequestNeed and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning recipient
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id"
    )]
    Recipient,
    /// Owned requested product lines
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    /// Owned requested meal lines
    #[sea_orm(has_many = "super::meal::Entity")]
    Meals,
    /// Transactions targeting this request
    #[sea_orm(has_many = "super::donation_transaction::Entity")]
    Transactions,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipient.def()
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
