//! Donation business logic - the inventory side of the ledger.
//!
//! Creating a donation validates the category-specific line shape, writes
//! the donation and its owned lines in one database transaction, then
//! synchronously rescores the whole population so the new donation carries
//! its anomaly verdict from the start. Quantities on the owned lines only
//! ever decrease through the allocation engine; the restock functions here
//! are the single sanctioned increase path.

use crate::{
    config::tuning::Tuning,
    core::anomaly,
    entities::{
        AdminApproval, Category, Donation, DonationStatus, Meal, Product, User, donation, meal,
        product,
    },
    errors::{Error, Result},
    notify::{Notifier, email_best_effort, notify_best_effort},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// Meal types accepted on a meal line.
pub const VALID_MEAL_TYPES: &[&str] = &["Breakfast", "Lunch", "Dinner", "Snack", "Dessert", "Other"];

/// Weight units accepted on a product line.
pub const VALID_WEIGHT_UNITS: &[&str] = &["kg", "g", "lb", "oz", "ml", "l"];

/// A product line in a creation payload.
#[derive(Debug, Clone)]
pub struct NewProductLine {
    pub name: String,
    pub product_type: String,
    pub product_description: String,
    pub weight_per_unit: f64,
    pub weight_unit: String,
    pub total_quantity: i32,
}

/// A meal line in a creation payload.
#[derive(Debug, Clone)]
pub struct NewMealLine {
    pub meal_name: String,
    pub meal_description: String,
    pub meal_type: String,
    pub quantity: i32,
}

/// Creation payload for a donation.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donor_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub expiration_date: DateTimeUtc,
    pub address: String,
    pub longitude: f64,
    pub latitude: f64,
    pub products: Vec<NewProductLine>,
    pub meals: Vec<NewMealLine>,
    pub number_of_meals: Option<i32>,
}

/// A donation together with its owned lines.
#[derive(Debug, Clone)]
pub struct DonationDetails {
    pub donation: donation::Model,
    pub products: Vec<product::Model>,
    pub meals: Vec<meal::Model>,
}

pub(crate) fn validate_product_line(line: &NewProductLine, index: usize) -> Result<()> {
    if line.name.trim().is_empty() {
        return Err(Error::validation(format!(
            "Product at index {index} is missing a valid name"
        )));
    }
    if line.product_type.trim().is_empty() {
        return Err(Error::validation(format!(
            "Product at index {index} is missing a valid product type"
        )));
    }
    if line.product_description.trim().is_empty() {
        return Err(Error::validation(format!(
            "Product at index {index} is missing a valid description"
        )));
    }
    if !line.weight_per_unit.is_finite() || line.weight_per_unit <= 0.0 {
        return Err(Error::validation(format!(
            "Product at index {index} has an invalid weight per unit: {}",
            line.weight_per_unit
        )));
    }
    if !line.weight_unit.is_empty() && !VALID_WEIGHT_UNITS.contains(&line.weight_unit.as_str()) {
        return Err(Error::validation(format!(
            "Product at index {index} has an invalid weight unit: {}",
            line.weight_unit
        )));
    }
    if line.total_quantity <= 0 {
        return Err(Error::validation(format!(
            "Product at index {index} has an invalid total quantity: {}",
            line.total_quantity
        )));
    }
    Ok(())
}

pub(crate) fn validate_meal_line(line: &NewMealLine, index: usize) -> Result<()> {
    if line.meal_name.trim().is_empty() {
        return Err(Error::validation(format!(
            "Meal at index {index} is missing a valid name"
        )));
    }
    if line.meal_description.trim().is_empty() {
        return Err(Error::validation(format!(
            "Meal at index {index} is missing a valid description"
        )));
    }
    if !VALID_MEAL_TYPES.contains(&line.meal_type.as_str()) {
        return Err(Error::validation(format!(
            "Meal at index {index} has an invalid meal type: {}",
            line.meal_type
        )));
    }
    if line.quantity <= 0 {
        return Err(Error::validation(format!(
            "Meal at index {index} has an invalid quantity: {}",
            line.quantity
        )));
    }
    Ok(())
}

fn validate_new_donation(input: &NewDonation) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(Error::validation("Missing or invalid required field: title"));
    }
    if input.address.trim().is_empty() {
        return Err(Error::validation(
            "Missing or invalid required field: address",
        ));
    }
    if input.expiration_date <= chrono::Utc::now() {
        return Err(Error::validation("Expiration date must be in the future"));
    }

    match input.category {
        Category::PackagedProducts => {
            if input.products.is_empty() {
                return Err(Error::validation(
                    "At least one valid product is required for packaged_products category",
                ));
            }
            if !input.meals.is_empty() {
                return Err(Error::validation(
                    "Meal lines are not allowed on a packaged_products donation",
                ));
            }
            for (index, line) in input.products.iter().enumerate() {
                validate_product_line(line, index)?;
            }
        }
        Category::PreparedMeals => {
            if input.meals.is_empty() {
                return Err(Error::validation(
                    "At least one valid meal is required for prepared_meals category",
                ));
            }
            if !input.products.is_empty() {
                return Err(Error::validation(
                    "Product lines are not allowed on a prepared_meals donation",
                ));
            }
            for (index, line) in input.meals.iter().enumerate() {
                validate_meal_line(line, index)?;
            }
            let calculated: i32 = input.meals.iter().map(|m| m.quantity).sum();
            if let Some(provided) = input.number_of_meals {
                if provided != calculated {
                    return Err(Error::validation(format!(
                        "Provided numberOfMeals ({provided}) does not match the calculated total ({calculated})"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Creates a donation with its owned lines, then synchronously rescores the
/// donation population and stamps the new donation's anomaly verdict.
///
/// # Errors
/// Returns a validation error before any write if the payload is malformed,
/// `NotFound` if the donor does not exist, or a database error.
pub async fn create_donation(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    tuning: &Tuning,
    input: NewDonation,
) -> Result<DonationDetails> {
    validate_new_donation(&input)?;

    User::find_by_id(input.donor_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: input.donor_id,
        })?;

    let total_meals: i32 = input.meals.iter().map(|m| m.quantity).sum();
    let number_of_meals = match input.category {
        Category::PreparedMeals => Some(input.number_of_meals.unwrap_or(total_meals)),
        Category::PackagedProducts => None,
    };

    let now = chrono::Utc::now();
    let txn = db.begin().await?;

    let created = donation::ActiveModel {
        donor_id: Set(input.donor_id),
        title: Set(input.title.trim().to_string()),
        description: Set(input.description.clone()),
        category: Set(input.category),
        status: Set(DonationStatus::Pending),
        admin_approval: Set(AdminApproval::Pending),
        is_anomaly: Set(false),
        expiration_date: Set(input.expiration_date),
        number_of_meals: Set(number_of_meals),
        remaining_meals: Set(number_of_meals),
        address: Set(input.address.trim().to_string()),
        longitude: Set(input.longitude),
        latitude: Set(input.latitude),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for line in &input.products {
        product::ActiveModel {
            donation_id: Set(Some(created.id)),
            request_id: Set(None),
            name: Set(line.name.trim().to_string()),
            product_type: Set(line.product_type.clone()),
            product_description: Set(line.product_description.clone()),
            weight_per_unit: Set(line.weight_per_unit),
            weight_unit: Set(if line.weight_unit.is_empty() {
                "kg".to_string()
            } else {
                line.weight_unit.clone()
            }),
            total_quantity: Set(line.total_quantity),
            remaining_quantity: Set(line.total_quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    for line in &input.meals {
        meal::ActiveModel {
            donation_id: Set(Some(created.id)),
            request_id: Set(None),
            meal_name: Set(line.meal_name.trim().to_string()),
            meal_description: Set(line.meal_description.clone()),
            meal_type: Set(line.meal_type.clone()),
            total_quantity: Set(line.quantity),
            remaining_quantity: Set(line.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    info!("Created donation {} ({:?})", created.id, created.category);

    // The whole population is rescored so the verdict reflects the new
    // donation's effect on the distribution
    anomaly::rescore_donation(db, notifier, &tuning.anomaly, created.id).await?;

    get_donation_with_lines(db, created.id)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: created.id,
        })
}

/// Loads a donation together with its product and meal lines.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_donation_with_lines(
    db: &DatabaseConnection,
    donation_id: i64,
) -> Result<Option<DonationDetails>> {
    let Some(donation) = Donation::find_by_id(donation_id).one(db).await? else {
        return Ok(None);
    };
    let products = Product::find()
        .filter(product::Column::DonationId.eq(donation_id))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?;
    let meals = Meal::find()
        .filter(meal::Column::DonationId.eq(donation_id))
        .order_by_asc(meal::Column::Id)
        .all(db)
        .await?;
    Ok(Some(DonationDetails {
        donation,
        products,
        meals,
    }))
}

/// All donations with a given fulfillment status, ordered by id.
pub async fn get_donations_by_status(
    db: &DatabaseConnection,
    status: DonationStatus,
) -> Result<Vec<donation::Model>> {
    Donation::find()
        .filter(donation::Column::Status.eq(status))
        .order_by_asc(donation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All donations in a category, ordered by id.
pub async fn get_donations_by_category(
    db: &DatabaseConnection,
    category: Category,
) -> Result<Vec<donation::Model>> {
    Donation::find()
        .filter(donation::Column::Category.eq(category))
        .order_by_asc(donation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All donations offered by one donor, newest first.
pub async fn get_donations_by_donor(
    db: &DatabaseConnection,
    donor_id: i64,
) -> Result<Vec<donation::Model>> {
    Donation::find()
        .filter(donation::Column::DonorId.eq(donor_id))
        .order_by_desc(donation::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Soft-deletes a donation by moving it to `cancelled`.
///
/// # Errors
/// `StateConflict` if the donation is already fulfilled or cancelled.
pub async fn cancel_donation(db: &DatabaseConnection, donation_id: i64) -> Result<donation::Model> {
    let donation = Donation::find_by_id(donation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation_id,
        })?;

    if matches!(
        donation.status,
        DonationStatus::Fulfilled | DonationStatus::Cancelled
    ) {
        return Err(Error::StateConflict {
            entity: "donation",
            id: donation_id,
            state: format!("{:?}", donation.status),
        });
    }

    let mut active: donation::ActiveModel = donation.into();
    active.status = Set(DonationStatus::Cancelled);
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Hard-deletes a donation, cascading to its owned product and meal lines.
/// Administrative path only.
pub async fn delete_donation(db: &DatabaseConnection, donation_id: i64) -> Result<()> {
    Donation::find_by_id(donation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation_id,
        })?;

    let txn = db.begin().await?;
    Product::delete_many()
        .filter(product::Column::DonationId.eq(donation_id))
        .exec(&txn)
        .await?;
    Meal::delete_many()
        .filter(meal::Column::DonationId.eq(donation_id))
        .exec(&txn)
        .await?;
    Donation::delete_by_id(donation_id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

/// Records the admin moderation verdict. A rejection notifies the donor
/// with the supplied reason (fire-and-forget).
pub async fn set_admin_approval(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    donation_id: i64,
    verdict: AdminApproval,
    reason: Option<&str>,
) -> Result<donation::Model> {
    let donation = Donation::find_by_id(donation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation_id,
        })?;

    let donor_id = donation.donor_id;
    let title = donation.title.clone();

    let mut active: donation::ActiveModel = donation.into();
    active.admin_approval = Set(verdict);
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(db).await?;

    if verdict == AdminApproval::Rejected {
        let reason = reason.unwrap_or("No reason provided");
        notify_best_effort(
            notifier,
            donor_id,
            donor_id,
            &format!("Your donation \"{title}\" was rejected: {reason}"),
        )
        .await;
        if let Some(donor) = User::find_by_id(donor_id).one(db).await? {
            email_best_effort(
                notifier,
                &donor.email,
                &format!("Your donation \"{title}\" has been rejected"),
                &format!("Reason: {reason}"),
                None,
            )
            .await;
        }
    }

    Ok(updated)
}

/// Adds stock to a product line, the explicit exception to the
/// monotonically-decreasing quantity invariant. Both the total and the
/// remaining quantity grow by the same amount.
pub async fn restock_product(
    db: &DatabaseConnection,
    donation_id: i64,
    product_id: i64,
    additional: i32,
) -> Result<product::Model> {
    if additional <= 0 {
        return Err(Error::validation(format!(
            "Restock quantity must be positive, got {additional}"
        )));
    }

    let line = Product::find_by_id(product_id)
        .one(db)
        .await?
        .filter(|p| p.donation_id == Some(donation_id))
        .ok_or(Error::NotFound {
            entity: "product",
            id: product_id,
        })?;

    let txn = db.begin().await?;
    Product::update_many()
        .col_expr(
            product::Column::RemainingQuantity,
            Expr::col(product::Column::RemainingQuantity).add(additional),
        )
        .col_expr(
            product::Column::TotalQuantity,
            Expr::col(product::Column::TotalQuantity).add(additional),
        )
        .filter(product::Column::Id.eq(line.id))
        .exec(&txn)
        .await?;
    refresh_donation_status(&txn, donation_id).await?;
    txn.commit().await?;

    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "product",
            id: product_id,
        })
}

/// Adds portions to a meal line, keeping the donation's meal counters in
/// step.
pub async fn restock_meals(
    db: &DatabaseConnection,
    donation_id: i64,
    meal_id: i64,
    additional: i32,
) -> Result<meal::Model> {
    if additional <= 0 {
        return Err(Error::validation(format!(
            "Restock quantity must be positive, got {additional}"
        )));
    }

    let line = Meal::find_by_id(meal_id)
        .one(db)
        .await?
        .filter(|m| m.donation_id == Some(donation_id))
        .ok_or(Error::NotFound {
            entity: "meal",
            id: meal_id,
        })?;

    let txn = db.begin().await?;
    Meal::update_many()
        .col_expr(
            meal::Column::RemainingQuantity,
            Expr::col(meal::Column::RemainingQuantity).add(additional),
        )
        .col_expr(
            meal::Column::TotalQuantity,
            Expr::col(meal::Column::TotalQuantity).add(additional),
        )
        .filter(meal::Column::Id.eq(line.id))
        .exec(&txn)
        .await?;
    Donation::update_many()
        .col_expr(
            donation::Column::RemainingMeals,
            Expr::col(donation::Column::RemainingMeals).add(additional),
        )
        .col_expr(
            donation::Column::NumberOfMeals,
            Expr::col(donation::Column::NumberOfMeals).add(additional),
        )
        .filter(donation::Column::Id.eq(donation_id))
        .exec(&txn)
        .await?;
    refresh_donation_status(&txn, donation_id).await?;
    txn.commit().await?;

    Meal::find_by_id(meal_id).one(db).await?.ok_or(Error::NotFound {
        entity: "meal",
        id: meal_id,
    })
}

/// Remaining and original quantity totals for a donation, whichever category
/// it is.
pub(crate) async fn quantity_totals<C: ConnectionTrait>(
    conn: &C,
    donation: &donation::Model,
) -> Result<(i64, i64)> {
    match donation.category {
        Category::PreparedMeals => Ok((
            i64::from(donation.remaining_meals.unwrap_or(0)),
            i64::from(donation.number_of_meals.unwrap_or(0)),
        )),
        Category::PackagedProducts => {
            let lines = Product::find()
                .filter(product::Column::DonationId.eq(donation.id))
                .all(conn)
                .await?;
            let remaining = lines.iter().map(|p| i64::from(p.remaining_quantity)).sum();
            let original = lines.iter().map(|p| i64::from(p.total_quantity)).sum();
            Ok((remaining, original))
        }
    }
}

/// Re-derives a donation's fulfillment status from its live quantities:
/// exhausted → fulfilled, partially drawn → partially fulfilled, untouched →
/// pending. Used after restocks and rejections; never resurrects stock.
pub(crate) async fn refresh_donation_status<C: ConnectionTrait>(
    conn: &C,
    donation_id: i64,
) -> Result<DonationStatus> {
    let donation = Donation::find_by_id(donation_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation_id,
        })?;

    // Cancelled and admin-rejected donations keep their terminal state
    if donation.status == DonationStatus::Cancelled {
        return Ok(DonationStatus::Cancelled);
    }

    let (remaining, original) = quantity_totals(conn, &donation).await?;
    let status = if remaining == 0 && original > 0 {
        DonationStatus::Fulfilled
    } else if remaining < original {
        DonationStatus::PartiallyFulfilled
    } else {
        DonationStatus::Pending
    };

    if status != donation.status {
        let mut active: donation::ActiveModel = donation.into();
        active.status = Set(status);
        active.updated_at = Set(chrono::Utc::now());
        active.update(conn).await?;
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::notify::NullNotifier;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_donation_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let tuning = test_tuning();

        // Empty title fails before any query
        let mut input = product_donation_input(1, "", &[("Canned_Goods", 10)], 5);
        let result = create_donation(&db, &NullNotifier, &tuning, input).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        // Past expiration date
        input = product_donation_input(1, "Rice", &[("Dry_Goods", 10)], 5);
        input.expiration_date = chrono::Utc::now() - chrono::Duration::days(1);
        let result = create_donation(&db, &NullNotifier, &tuning, input).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        // Product category without product lines
        input = product_donation_input(1, "Rice", &[], 5);
        let result = create_donation(&db, &NullNotifier, &tuning, input).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        // Zero quantity line
        input = product_donation_input(1, "Rice", &[("Dry_Goods", 0)], 5);
        let result = create_donation(&db, &NullNotifier, &tuning, input).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_meal_donation_count_mismatch() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let tuning = test_tuning();

        let mut input = meal_donation_input(1, "Couscous", 10, 5);
        input.number_of_meals = Some(12); // lines sum to 10
        let result = create_donation(&db, &NullNotifier, &tuning, input).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_donation_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Corner Market").await?;

        let details = create_test_product_donation(
            &db,
            donor.id,
            "Pantry surplus",
            &[("Canned_Goods", 100), ("Dry_Goods", 40)],
            5,
        )
        .await?;

        assert_eq!(details.donation.status, DonationStatus::Pending);
        assert_eq!(details.donation.admin_approval, AdminApproval::Pending);
        assert!(!details.donation.is_anomaly);
        assert_eq!(details.products.len(), 2);
        assert_eq!(details.products[0].remaining_quantity, 100);
        assert_eq!(details.products[0].total_quantity, 100);
        assert!(details.meals.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_meal_donation_sets_counters() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Soup Kitchen").await?;

        let details = create_test_meal_donation(&db, donor.id, "Evening meals", 30, 5).await?;
        assert_eq!(details.donation.number_of_meals, Some(30));
        assert_eq!(details.donation.remaining_meals, Some(30));
        assert_eq!(details.meals.len(), 1);
        assert_eq!(details.meals[0].remaining_quantity, 30);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_flags_anomalous_donation() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Warehouse").await?;

        // A lone huge donation two days from expiry trips the rule path
        let details =
            create_test_product_donation(&db, donor.id, "Pallet dump", &[("Canned_Goods", 5000)], 2)
                .await?;
        assert!(details.donation.is_anomaly);

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_donation_guards_terminal_states() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Donor").await?;
        let details =
            create_test_product_donation(&db, donor.id, "Rice", &[("Dry_Goods", 10)], 5).await?;

        let cancelled = cancel_donation(&db, details.donation.id).await?;
        assert_eq!(cancelled.status, DonationStatus::Cancelled);

        let second = cancel_donation(&db, details.donation.id).await;
        assert!(matches!(second.unwrap_err(), Error::StateConflict { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_donation_cascades_lines() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Donor").await?;
        let details =
            create_test_product_donation(&db, donor.id, "Rice", &[("Dry_Goods", 10)], 5).await?;

        delete_donation(&db, details.donation.id).await?;

        assert!(Donation::find_by_id(details.donation.id).one(&db).await?.is_none());
        let orphans = Product::find()
            .filter(product::Column::DonationId.eq(details.donation.id))
            .all(&db)
            .await?;
        assert!(orphans.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_restock_product_grows_both_counters() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Donor").await?;
        let details =
            create_test_product_donation(&db, donor.id, "Rice", &[("Dry_Goods", 10)], 5).await?;

        let line = restock_product(&db, details.donation.id, details.products[0].id, 15).await?;
        assert_eq!(line.remaining_quantity, 25);
        assert_eq!(line.total_quantity, 25);

        let zero = restock_product(&db, details.donation.id, details.products[0].id, 0).await;
        assert!(matches!(zero.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_admin_rejection_notifies_donor() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Donor").await?;
        let details =
            create_test_product_donation(&db, donor.id, "Rice", &[("Dry_Goods", 10)], 5).await?;

        let notifier = crate::notify::DbNotifier::new(db.clone());
        let updated = set_admin_approval(
            &db,
            &notifier,
            details.donation.id,
            AdminApproval::Rejected,
            Some("Incomplete labeling"),
        )
        .await?;
        assert_eq!(updated.admin_approval, AdminApproval::Rejected);

        let rows = crate::entities::Notification::find().all(&db).await?;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].message.contains("Incomplete labeling"));

        Ok(())
    }
}
