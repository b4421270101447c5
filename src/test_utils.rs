//! Shared test utilities.
//!
//! Common helpers for setting up in-memory test databases and creating test
//! entities with sensible defaults.

use crate::{
    config::tuning::Tuning,
    core::{
        allocation::{self, ProductAllocation},
        donation::{self, DonationDetails, NewDonation, NewMealLine, NewProductLine},
        request::{self, NewRequest, RequestDetails},
    },
    entities::{
        Category, DeliveryStatus, Donation, RequestNeed, TransactionStatus, UserRole, delivery,
        donation_transaction, user,
    },
    errors::Result,
    notify::NullNotifier,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Default tuning with seeded models so statistical paths are reproducible.
pub fn test_tuning() -> Tuning {
    let mut tuning = Tuning::default();
    tuning.anomaly.seed = Some(42);
    tuning.recommender.seed = Some(7);
    tuning
}

async fn create_test_user(
    db: &DatabaseConnection,
    name: &str,
    role: UserRole,
    recipient_type: Option<&str>,
    latitude: f64,
    longitude: f64,
) -> Result<user::Model> {
    let model = user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("{}@example.test", name.to_lowercase().replace(' ', "."))),
        role: Set(role),
        recipient_type: Set(recipient_type.map(ToString::to_string)),
        address: Set(Some("1 Test Street".to_string())),
        is_active: Set(true),
        is_blocked: Set(false),
        is_available: Set(true),
        longitude: Set(longitude),
        latitude: Set(latitude),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Creates a donor (supermarket role).
pub async fn create_test_donor(db: &DatabaseConnection, name: &str) -> Result<user::Model> {
    create_test_user(db, name, UserRole::Supermarket, None, 0.0, 0.0).await
}

/// Creates a recipient organisation with an optional type
/// ("relief", "social_welfare", ...).
pub async fn create_test_recipient(
    db: &DatabaseConnection,
    name: &str,
    recipient_type: Option<&str>,
) -> Result<user::Model> {
    create_test_user(db, name, UserRole::Ong, recipient_type, 0.0, 0.0).await
}

/// Creates an available transporter at the given coordinates.
pub async fn create_test_transporter(
    db: &DatabaseConnection,
    name: &str,
    latitude: f64,
    longitude: f64,
) -> Result<user::Model> {
    create_test_user(db, name, UserRole::Transporter, None, latitude, longitude).await
}

fn product_lines(lines: &[(&str, i32)]) -> Vec<NewProductLine> {
    lines
        .iter()
        .map(|(product_type, quantity)| NewProductLine {
            name: format!("{product_type} item"),
            product_type: (*product_type).to_string(),
            product_description: "Test product".to_string(),
            weight_per_unit: 0.5,
            weight_unit: "kg".to_string(),
            total_quantity: *quantity,
        })
        .collect()
}

/// Builds a packaged-products donation payload expiring in `days` days.
pub fn product_donation_input(
    donor_id: i64,
    title: &str,
    lines: &[(&str, i32)],
    days: i64,
) -> NewDonation {
    NewDonation {
        donor_id,
        title: title.to_string(),
        description: Some("Test donation".to_string()),
        category: Category::PackagedProducts,
        expiration_date: chrono::Utc::now() + chrono::Duration::days(days),
        address: "12 Pickup Road".to_string(),
        longitude: 0.0,
        latitude: 0.0,
        products: product_lines(lines),
        meals: Vec::new(),
        number_of_meals: None,
    }
}

/// Builds a prepared-meals donation payload with one meal line.
pub fn meal_donation_input(donor_id: i64, title: &str, meals: i32, days: i64) -> NewDonation {
    NewDonation {
        donor_id,
        title: title.to_string(),
        description: Some("Test donation".to_string()),
        category: Category::PreparedMeals,
        expiration_date: chrono::Utc::now() + chrono::Duration::days(days),
        address: "12 Pickup Road".to_string(),
        longitude: 0.0,
        latitude: 0.0,
        products: Vec::new(),
        meals: vec![NewMealLine {
            meal_name: "Test meal".to_string(),
            meal_description: "Warm and filling".to_string(),
            meal_type: "Dinner".to_string(),
            quantity: meals,
        }],
        number_of_meals: None,
    }
}

/// Creates a packaged-products donation with the given (type, quantity)
/// lines.
pub async fn create_test_product_donation(
    db: &DatabaseConnection,
    donor_id: i64,
    title: &str,
    lines: &[(&str, i32)],
    days: i64,
) -> Result<DonationDetails> {
    donation::create_donation(
        db,
        &NullNotifier,
        &test_tuning(),
        product_donation_input(donor_id, title, lines, days),
    )
    .await
}

/// Creates a prepared-meals donation with a single line of `meals` portions.
pub async fn create_test_meal_donation(
    db: &DatabaseConnection,
    donor_id: i64,
    title: &str,
    meals: i32,
    days: i64,
) -> Result<DonationDetails> {
    donation::create_donation(
        db,
        &NullNotifier,
        &test_tuning(),
        meal_donation_input(donor_id, title, meals, days),
    )
    .await
}

/// Builds a packaged-products request payload.
pub fn product_request_input(
    recipient_id: i64,
    title: &str,
    lines: &[(&str, i32)],
    days: i64,
) -> NewRequest {
    NewRequest {
        recipient_id,
        title: title.to_string(),
        description: Some("Test request".to_string()),
        category: Category::PackagedProducts,
        expiration_date: chrono::Utc::now() + chrono::Duration::days(days),
        address: "99 Delivery Lane".to_string(),
        longitude: 0.0,
        latitude: 0.0,
        products: product_lines(lines),
        meals: Vec::new(),
        number_of_meals: None,
    }
}

/// Builds a prepared-meals request payload.
pub fn meal_request_input(recipient_id: i64, title: &str, meals: i32, days: i64) -> NewRequest {
    NewRequest {
        recipient_id,
        title: title.to_string(),
        description: Some("Test request".to_string()),
        category: Category::PreparedMeals,
        expiration_date: chrono::Utc::now() + chrono::Duration::days(days),
        address: "99 Delivery Lane".to_string(),
        longitude: 0.0,
        latitude: 0.0,
        products: Vec::new(),
        meals: Vec::new(),
        number_of_meals: Some(meals),
    }
}

/// Creates a packaged-products request with the given lines.
pub async fn create_test_product_request(
    db: &DatabaseConnection,
    recipient_id: i64,
    title: &str,
    lines: &[(&str, i32)],
    days: i64,
) -> Result<RequestDetails> {
    request::create_request_need(db, product_request_input(recipient_id, title, lines, days)).await
}

/// Creates a prepared-meals request wanting `meals` portions.
pub async fn create_test_meal_request(
    db: &DatabaseConnection,
    recipient_id: i64,
    title: &str,
    meals: i32,
    days: i64,
) -> Result<RequestDetails> {
    request::create_request_need(db, meal_request_input(recipient_id, title, meals, days)).await
}

/// Inserts a completed transaction binding an existing donation to an
/// existing request, for recommender training histories.
pub async fn mark_completed_transaction(
    db: &DatabaseConnection,
    donation_id: i64,
    request_id: i64,
) -> Result<donation_transaction::Model> {
    let donation = Donation::find_by_id(donation_id)
        .one(db)
        .await?
        .expect("donation must exist");
    let request = RequestNeed::find_by_id(request_id)
        .one(db)
        .await?
        .expect("request must exist");

    let now = chrono::Utc::now();
    donation_transaction::ActiveModel {
        donation_id: Set(donation_id),
        request_id: Set(request_id),
        donor_id: Set(donation.donor_id),
        recipient_id: Set(request.recipient_id),
        status: Set(TransactionStatus::Completed),
        response_date: Set(Some(now)),
        rejection_reason: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a pending delivery at the given pickup point, backed by a full
/// donor/recipient/donation/request/transaction chain.
pub async fn create_test_delivery(
    db: &DatabaseConnection,
    pickup_lat: f64,
    pickup_lon: f64,
) -> Result<delivery::Model> {
    let donor = create_test_donor(db, "Delivery donor").await?;
    let recipient = create_test_recipient(db, "Delivery recipient", None).await?;
    let donation = create_test_product_donation(
        db,
        donor.id,
        "Delivery stock",
        &[("Canned_Goods", 10)],
        10,
    )
    .await?;
    let request = create_test_product_request(
        db,
        recipient.id,
        "Delivery need",
        &[("Canned_Goods", 10)],
        10,
    )
    .await?;
    let transaction = allocation::propose_transaction(
        db,
        donation.donation.id,
        request.request.id,
        vec![ProductAllocation {
            product_id: donation.products[0].id,
            quantity: 10,
        }],
        vec![],
    )
    .await?;

    let now = chrono::Utc::now();
    delivery::ActiveModel {
        transaction_id: Set(transaction.id),
        transporter_id: Set(None),
        pickup_address: Set("12 Pickup Road".to_string()),
        delivery_address: Set("99 Delivery Lane".to_string()),
        pickup_longitude: Set(pickup_lon),
        pickup_latitude: Set(pickup_lat),
        delivery_longitude: Set(0.0),
        delivery_latitude: Set(0.0),
        status: Set(DeliveryStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
