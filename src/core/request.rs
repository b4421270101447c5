//! Request business logic - the need side of the ledger.
//!
//! Mirrors the donation module: a request owns its requested product/meal
//! lines, validated with the same rules. Requested quantities are
//! decremented by the allocation engine as donations fulfil them.

use crate::{
    core::donation::{NewMealLine, NewProductLine, validate_meal_line, validate_product_line},
    entities::{Category, Meal, Product, RequestNeed, RequestStatus, User, meal, product,
        request_need},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Creation payload for a request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub recipient_id: i64,
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

/// A request together with its owned lines.
#[derive(Debug, Clone)]
pub struct RequestDetails {
    pub request: request_need::Model,
    pub products: Vec<product::Model>,
    pub meals: Vec<meal::Model>,
}

fn validate_new_request(input: &NewRequest) -> Result<()> {
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
                    "At least one requested product is required for packaged_products category",
                ));
            }
            for (index, line) in input.products.iter().enumerate() {
                validate_product_line(line, index)?;
            }
        }
        Category::PreparedMeals => {
            let from_lines: i32 = input.meals.iter().map(|m| m.quantity).sum();
            let wanted = input.number_of_meals.unwrap_or(from_lines);
            if wanted <= 0 {
                return Err(Error::validation(
                    "Number of meals is required for prepared_meals category",
                ));
            }
            for (index, line) in input.meals.iter().enumerate() {
                validate_meal_line(line, index)?;
            }
        }
    }
    Ok(())
}

/// Creates a request with its owned lines.
///
/// # Errors
/// Returns a validation error before any write if the payload is malformed,
/// `NotFound` if the recipient does not exist, or a database error.
pub async fn create_request_need(
    db: &DatabaseConnection,
    input: NewRequest,
) -> Result<RequestDetails> {
    validate_new_request(&input)?;

    User::find_by_id(input.recipient_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: input.recipient_id,
        })?;

    let from_lines: i32 = input.meals.iter().map(|m| m.quantity).sum();
    let number_of_meals = match input.category {
        Category::PreparedMeals => Some(input.number_of_meals.unwrap_or(from_lines)),
        Category::PackagedProducts => None,
    };

    let now = chrono::Utc::now();
    let txn = db.begin().await?;

    let created = request_need::ActiveModel {
        recipient_id: Set(input.recipient_id),
        title: Set(input.title.trim().to_string()),
        description: Set(input.description.clone()),
        category: Set(input.category),
        status: Set(RequestStatus::Pending),
        expiration_date: Set(input.expiration_date),
        number_of_meals: Set(number_of_meals),
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
            donation_id: Set(None),
            request_id: Set(Some(created.id)),
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
            donation_id: Set(None),
            request_id: Set(Some(created.id)),
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
    info!("Created request {} ({:?})", created.id, created.category);

    get_request_with_lines(db, created.id)
        .await?
        .ok_or(Error::NotFound {
            entity: "request",
            id: created.id,
        })
}

/// Loads a request together with its requested lines.
pub async fn get_request_with_lines(
    db: &DatabaseConnection,
    request_id: i64,
) -> Result<Option<RequestDetails>> {
    let Some(request) = RequestNeed::find_by_id(request_id).one(db).await? else {
        return Ok(None);
    };
    let products = Product::find()
        .filter(product::Column::RequestId.eq(request_id))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?;
    let meals = Meal::find()
        .filter(meal::Column::RequestId.eq(request_id))
        .order_by_asc(meal::Column::Id)
        .all(db)
        .await?;
    Ok(Some(RequestDetails {
        request,
        products,
        meals,
    }))
}

/// All requests filed by one recipient, newest first.
pub async fn get_requests_by_recipient(
    db: &DatabaseConnection,
    recipient_id: i64,
) -> Result<Vec<request_need::Model>> {
    RequestNeed::find()
        .filter(request_need::Column::RecipientId.eq(recipient_id))
        .order_by_desc(request_need::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All requests with a given status, ordered by id.
pub async fn get_requests_by_status(
    db: &DatabaseConnection,
    status: RequestStatus,
) -> Result<Vec<request_need::Model>> {
    RequestNeed::find()
        .filter(request_need::Column::Status.eq(status))
        .order_by_asc(request_need::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Hard-deletes a request, cascading to its owned lines.
pub async fn delete_request_need(db: &DatabaseConnection, request_id: i64) -> Result<()> {
    RequestNeed::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "request",
            id: request_id,
        })?;

    let txn = db.begin().await?;
    Product::delete_many()
        .filter(product::Column::RequestId.eq(request_id))
        .exec(&txn)
        .await?;
    Meal::delete_many()
        .filter(meal::Column::RequestId.eq(request_id))
        .exec(&txn)
        .await?;
    RequestNeed::delete_by_id(request_id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_request_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        // Packaged category with no product lines
        let input = product_request_input(1, "Need staples", &[], 5);
        let result = create_request_need(&db, input).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        // Meal category with no meal count at all
        let mut input = meal_request_input(1, "Need meals", 10, 5);
        input.number_of_meals = None;
        input.meals.clear();
        let result = create_request_need(&db, input).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_request_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let recipient = create_test_recipient(&db, "Shelter", Some("relief")).await?;

        let details = create_test_product_request(
            &db,
            recipient.id,
            "Need canned goods",
            &[("Canned_Goods", 30)],
            5,
        )
        .await?;

        assert_eq!(details.request.status, RequestStatus::Pending);
        assert_eq!(details.products.len(), 1);
        assert_eq!(details.products[0].remaining_quantity, 30);
        assert_eq!(details.products[0].request_id, Some(details.request.id));
        assert!(details.request.number_of_meals.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_meal_request_defaults_count_from_lines() -> Result<()> {
        let db = setup_test_db().await?;
        let recipient = create_test_recipient(&db, "Shelter", None).await?;

        let mut input = meal_request_input(recipient.id, "Dinner service", 25, 5);
        input.number_of_meals = None;
        let details = create_request_need(&db, input).await?;
        assert_eq!(details.request.number_of_meals, Some(25));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_request_cascades_lines() -> Result<()> {
        let db = setup_test_db().await?;
        let recipient = create_test_recipient(&db, "Shelter", None).await?;
        let details = create_test_product_request(
            &db,
            recipient.id,
            "Need rice",
            &[("Dry_Goods", 10)],
            5,
        )
        .await?;

        delete_request_need(&db, details.request.id).await?;

        assert!(RequestNeed::find_by_id(details.request.id).one(&db).await?.is_none());
        let orphans = Product::find()
            .filter(product::Column::RequestId.eq(details.request.id))
            .all(&db)
            .await?;
        assert!(orphans.is_empty());

        Ok(())
    }
}
