//! Database configuration module.
//!
//! Handles `SQLite` connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions via `Schema::create_table_from_entity`
//! so the database schema always matches the Rust struct definitions without
//! manual SQL.

use crate::entities::{
    AllocationLine, Delivery, Donation, DonationTransaction, Meal, Notification, Product,
    RequestNeed, User,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from the `DATABASE_URL` environment variable or
/// returns the default local `SQLite` path.
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/foodbridge.sqlite".to_string())
}

/// Establishes a connection to the database.
///
/// # Errors
/// Returns an error if the connection cannot be established.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions. Idempotent, so the
/// maintenance daemon can run it against an existing database.
///
/// # Errors
/// Returns an error if any table creation statement fails.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Referenced tables first so foreign keys resolve
    let statements = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Donation),
        schema.create_table_from_entity(RequestNeed),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(Meal),
        schema.create_table_from_entity(DonationTransaction),
        schema.create_table_from_entity(AllocationLine),
        schema.create_table_from_entity(Delivery),
        schema.create_table_from_entity(Notification),
    ];
    for mut statement in statements {
        db.execute(builder.build(statement.if_not_exists())).await?;
    }

    Ok(())
}
