//! Allocation engine - commits a donation's quantities to a request.
//!
//! The whole accept path runs inside one database transaction: the
//! single-fire pending → approved compare-and-swap, the guarded quantity
//! decrements, the derived status updates, the delivery row, and the
//! transporter claim. Any validation, capacity, or state failure rolls the
//! lot back; there is no partial allocation. Rejection is the mirror image:
//! a single-fire pending → rejected transition that re-derives both sides'
//! statuses without ever resurrecting stock already committed elsewhere.

use std::collections::HashMap;

use crate::{
    config::tuning::Tuning,
    core::{donation::refresh_donation_status, transporter},
    entities::{
        AllocationLine, Category, DeliveryStatus, Donation, DonationStatus, DonationTransaction,
        Meal, Product, RequestNeed, RequestStatus, TransactionStatus, User, allocation_line,
        delivery, donation, donation_transaction, meal, product, request_need, user,
    },
    errors::{Error, Result},
    notify::{Notifier, email_best_effort, notify_best_effort},
};
use sea_orm::{ConnectionTrait, PaginatorTrait, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// One committed product quantity, referencing a donation product line.
#[derive(Debug, Clone, Copy)]
pub struct ProductAllocation {
    pub product_id: i64,
    pub quantity: i32,
}

/// One committed meal quantity, referencing a donation meal line.
#[derive(Debug, Clone, Copy)]
pub struct MealAllocation {
    pub meal_id: i64,
    pub quantity: i32,
}

/// Everything an approved allocation produced.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub donation: donation::Model,
    pub request: request_need::Model,
    pub transaction: donation_transaction::Model,
    pub delivery: delivery::Model,
    pub transporter: Option<user::Model>,
}

/// Creates the pending transaction that targets a donation with a request,
/// carrying the proposed allocation lines.
///
/// # Errors
/// `CategoryMismatch` if the two sides disagree, `MixedCategoryAllocation`
/// if the line kinds do not fit the category, `NotFound` for unknown
/// entities or lines, and a validation error when a pending transaction for
/// the pair already exists.
pub async fn propose_transaction(
    db: &DatabaseConnection,
    donation_id: i64,
    request_id: i64,
    products: Vec<ProductAllocation>,
    meals: Vec<MealAllocation>,
) -> Result<donation_transaction::Model> {
    let donation = Donation::find_by_id(donation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation_id,
        })?;
    let request = RequestNeed::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "request",
            id: request_id,
        })?;

    if donation.category != request.category {
        return Err(Error::CategoryMismatch {
            donation: donation.category.as_str().to_string(),
            request: request.category.as_str().to_string(),
        });
    }
    check_line_kinds(donation.category, &products, &meals)?;
    if products.is_empty() && meals.is_empty() {
        return Err(Error::validation(
            "At least one allocated product or meal is required",
        ));
    }

    let existing = DonationTransaction::find()
        .filter(donation_transaction::Column::DonationId.eq(donation_id))
        .filter(donation_transaction::Column::RequestId.eq(request_id))
        .filter(donation_transaction::Column::Status.eq(TransactionStatus::Pending))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(
            "A pending transaction already exists for this donation and request",
        ));
    }

    // Proposed lines must reference lines the donation actually owns
    for alloc in &products {
        let owned = Product::find_by_id(alloc.product_id)
            .one(db)
            .await?
            .filter(|p| p.donation_id == Some(donation_id));
        if owned.is_none() {
            return Err(Error::NotFound {
                entity: "product",
                id: alloc.product_id,
            });
        }
        if alloc.quantity <= 0 {
            return Err(Error::validation(format!(
                "Allocated quantity must be positive for product {}",
                alloc.product_id
            )));
        }
    }
    for alloc in &meals {
        let owned = Meal::find_by_id(alloc.meal_id)
            .one(db)
            .await?
            .filter(|m| m.donation_id == Some(donation_id));
        if owned.is_none() {
            return Err(Error::NotFound {
                entity: "meal",
                id: alloc.meal_id,
            });
        }
        if alloc.quantity <= 0 {
            return Err(Error::validation(format!(
                "Allocated quantity must be positive for meal {}",
                alloc.meal_id
            )));
        }
    }

    let txn = db.begin().await?;
    let transaction = donation_transaction::ActiveModel {
        donation_id: Set(donation_id),
        request_id: Set(request_id),
        donor_id: Set(donation.donor_id),
        recipient_id: Set(request.recipient_id),
        status: Set(TransactionStatus::Pending),
        response_date: Set(None),
        rejection_reason: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for alloc in &products {
        allocation_line::ActiveModel {
            transaction_id: Set(transaction.id),
            product_id: Set(Some(alloc.product_id)),
            meal_id: Set(None),
            quantity: Set(alloc.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    for alloc in &meals {
        allocation_line::ActiveModel {
            transaction_id: Set(transaction.id),
            product_id: Set(None),
            meal_id: Set(Some(alloc.meal_id)),
            quantity: Set(alloc.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    info!(
        "Proposed transaction {} (donation {donation_id} -> request {request_id})",
        transaction.id
    );
    Ok(transaction)
}

/// Looks up the pending transaction binding a donation to a request and
/// accepts it with the given allocation. Empty allocation lists fall back to
/// the quantities proposed when the transaction was created.
pub async fn allocate(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    tuning: &Tuning,
    donation_id: i64,
    request_id: i64,
    allocated_products: Vec<ProductAllocation>,
    allocated_meals: Vec<MealAllocation>,
) -> Result<AllocationOutcome> {
    let transaction = DonationTransaction::find()
        .filter(donation_transaction::Column::DonationId.eq(donation_id))
        .filter(donation_transaction::Column::RequestId.eq(request_id))
        .filter(donation_transaction::Column::Status.eq(TransactionStatus::Pending))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "pending transaction for donation",
            id: donation_id,
        })?;

    accept_transaction(
        db,
        notifier,
        tuning,
        transaction.id,
        allocated_products,
        allocated_meals,
    )
    .await
}

/// Accepts a pending transaction: validates the allocation, decrements both
/// ledgers atomically, derives fulfillment statuses, spawns the delivery,
/// and claims the nearest transporter. Single-fire: a transaction that is
/// not pending fails with `StateConflict` reporting its current state.
pub async fn accept_transaction(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    tuning: &Tuning,
    transaction_id: i64,
    allocated_products: Vec<ProductAllocation>,
    allocated_meals: Vec<MealAllocation>,
) -> Result<AllocationOutcome> {
    let transaction = DonationTransaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;
    let donation = Donation::find_by_id(transaction.donation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: transaction.donation_id,
        })?;
    let request = RequestNeed::find_by_id(transaction.request_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "request",
            id: transaction.request_id,
        })?;

    if donation.category != request.category {
        return Err(Error::CategoryMismatch {
            donation: donation.category.as_str().to_string(),
            request: request.category.as_str().to_string(),
        });
    }
    check_line_kinds(donation.category, &allocated_products, &allocated_meals)?;

    // Explicit lists win; otherwise fall back to the proposal
    let (final_products, final_meals) = if allocated_products.is_empty() && allocated_meals.is_empty()
    {
        proposal_lines(db, transaction_id).await?
    } else {
        (allocated_products, allocated_meals)
    };
    match donation.category {
        Category::PackagedProducts if final_products.is_empty() => {
            return Err(Error::validation("No products allocated for this request"));
        }
        Category::PreparedMeals if final_meals.is_empty() => {
            return Err(Error::validation("No meals allocated for this request"));
        }
        _ => {}
    }

    let now = chrono::Utc::now();
    let txn = db.begin().await?;

    // Single-fire transition; losing the race here means someone else
    // already resolved the transaction
    let cas = DonationTransaction::update_many()
        .col_expr(
            donation_transaction::Column::Status,
            Expr::value(TransactionStatus::Approved),
        )
        .col_expr(donation_transaction::Column::ResponseDate, Expr::value(now))
        .filter(donation_transaction::Column::Id.eq(transaction_id))
        .filter(donation_transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(&txn)
        .await?;
    if cas.rows_affected == 0 {
        txn.rollback().await?;
        let current = DonationTransaction::find_by_id(transaction_id)
            .one(db)
            .await?
            .ok_or(Error::NotFound {
                entity: "transaction",
                id: transaction_id,
            })?;
        return Err(Error::StateConflict {
            entity: "transaction",
            id: transaction_id,
            state: current.status.as_str().to_string(),
        });
    }

    match donation.category {
        Category::PackagedProducts => {
            apply_product_allocation(&txn, &donation, &request, &final_products).await?;
        }
        Category::PreparedMeals => {
            apply_meal_allocation(&txn, &donation, &request, &final_meals).await?;
        }
    }

    // Persist the finalized allocation on the transaction
    AllocationLine::delete_many()
        .filter(allocation_line::Column::TransactionId.eq(transaction_id))
        .exec(&txn)
        .await?;
    for alloc in &final_products {
        allocation_line::ActiveModel {
            transaction_id: Set(transaction_id),
            product_id: Set(Some(alloc.product_id)),
            meal_id: Set(None),
            quantity: Set(alloc.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    for alloc in &final_meals {
        allocation_line::ActiveModel {
            transaction_id: Set(transaction_id),
            product_id: Set(None),
            meal_id: Set(Some(alloc.meal_id)),
            quantity: Set(alloc.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    // Claim a carrier inside the same logical operation as the delivery so
    // concurrent approvals can never share a transporter
    let transporter = transporter::pick_nearest_available(
        &txn,
        &tuning.transporter,
        donation.latitude,
        donation.longitude,
    )
    .await?;

    let delivery = delivery::ActiveModel {
        transaction_id: Set(transaction_id),
        transporter_id: Set(transporter.as_ref().map(|t| t.id)),
        pickup_address: Set(donation.address.clone()),
        delivery_address: Set(request.address.clone()),
        pickup_longitude: Set(donation.longitude),
        pickup_latitude: Set(donation.latitude),
        delivery_longitude: Set(request.longitude),
        delivery_latitude: Set(request.latitude),
        status: Set(DeliveryStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        "Approved transaction {transaction_id} (delivery {}, transporter {:?})",
        delivery.id,
        transporter.as_ref().map(|t| t.id)
    );

    let donation = Donation::find_by_id(donation.id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation.id,
        })?;
    let request = RequestNeed::find_by_id(request.id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "request",
            id: request.id,
        })?;
    let transaction = DonationTransaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;

    send_approval_messages(db, notifier, &donation, &request, &transaction, &transporter).await;

    Ok(AllocationOutcome {
        donation,
        request,
        transaction,
        delivery,
        transporter,
    })
}

/// Rejects a pending transaction with a reason. Single-fire like the accept
/// path; both sides' statuses are re-derived afterwards, which unlinks the
/// pair without touching quantities committed by other transactions.
pub async fn reject_transaction(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    transaction_id: i64,
    reason: &str,
) -> Result<donation_transaction::Model> {
    if reason.trim().is_empty() {
        return Err(Error::validation("Rejection reason is required"));
    }

    let transaction = DonationTransaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;

    let txn = db.begin().await?;
    let cas = DonationTransaction::update_many()
        .col_expr(
            donation_transaction::Column::Status,
            Expr::value(TransactionStatus::Rejected),
        )
        .col_expr(
            donation_transaction::Column::ResponseDate,
            Expr::value(chrono::Utc::now()),
        )
        .col_expr(
            donation_transaction::Column::RejectionReason,
            Expr::value(reason.trim().to_string()),
        )
        .filter(donation_transaction::Column::Id.eq(transaction_id))
        .filter(donation_transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(&txn)
        .await?;
    if cas.rows_affected == 0 {
        txn.rollback().await?;
        let current = DonationTransaction::find_by_id(transaction_id)
            .one(db)
            .await?
            .ok_or(Error::NotFound {
                entity: "transaction",
                id: transaction_id,
            })?;
        return Err(Error::StateConflict {
            entity: "transaction",
            id: transaction_id,
            state: current.status.as_str().to_string(),
        });
    }

    refresh_donation_status(&txn, transaction.donation_id).await?;
    refresh_request_status(&txn, transaction.request_id).await?;
    txn.commit().await?;

    let updated = DonationTransaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;

    send_rejection_messages(db, notifier, &updated, reason).await;
    info!("Rejected transaction {transaction_id}");
    Ok(updated)
}

/// Re-derives a request's status from its live quantities and the
/// transactions that reference it. Exposed for consistency repair after
/// out-of-band changes.
pub async fn check_request_fulfillment(
    db: &DatabaseConnection,
    request_id: i64,
) -> Result<RequestStatus> {
    refresh_request_status(db, request_id).await
}

fn check_line_kinds(
    category: Category,
    products: &[ProductAllocation],
    meals: &[MealAllocation],
) -> Result<()> {
    let mixed = match category {
        Category::PackagedProducts => !meals.is_empty(),
        Category::PreparedMeals => !products.is_empty(),
    };
    if mixed {
        return Err(Error::MixedCategoryAllocation {
            category: category.as_str().to_string(),
        });
    }
    Ok(())
}

async fn proposal_lines(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<(Vec<ProductAllocation>, Vec<MealAllocation>)> {
    let lines = AllocationLine::find()
        .filter(allocation_line::Column::TransactionId.eq(transaction_id))
        .all(db)
        .await?;

    let mut products = Vec::new();
    let mut meals = Vec::new();
    for line in lines {
        if let Some(product_id) = line.product_id {
            products.push(ProductAllocation {
                product_id,
                quantity: line.quantity,
            });
        } else if let Some(meal_id) = line.meal_id {
            meals.push(MealAllocation {
                meal_id,
                quantity: line.quantity,
            });
        }
    }
    Ok((products, meals))
}

async fn apply_product_allocation<C: ConnectionTrait>(
    conn: &C,
    donation: &donation::Model,
    request: &request_need::Model,
    allocations: &[ProductAllocation],
) -> Result<()> {
    let donation_lines = Product::find()
        .filter(product::Column::DonationId.eq(donation.id))
        .all(conn)
        .await?;
    let by_id: HashMap<i64, &product::Model> =
        donation_lines.iter().map(|p| (p.id, p)).collect();

    let request_lines = Product::find()
        .filter(product::Column::RequestId.eq(request.id))
        .all(conn)
        .await?;
    // Local view of the request lines' remaining quantities so repeated
    // allocations of one type drain successive lines
    let mut request_remaining: Vec<(i64, String, i32)> = request_lines
        .iter()
        .map(|p| (p.id, p.product_type.clone(), p.remaining_quantity))
        .collect();

    for alloc in allocations {
        if alloc.quantity <= 0 {
            return Err(Error::validation(format!(
                "Allocated quantity must be positive for product {}",
                alloc.product_id
            )));
        }
        let line = by_id.get(&alloc.product_id).ok_or(Error::NotFound {
            entity: "product",
            id: alloc.product_id,
        })?;
        if alloc.quantity > line.remaining_quantity {
            return Err(Error::Capacity {
                item: "product",
                item_id: alloc.product_id,
                requested: alloc.quantity,
                available: line.remaining_quantity,
            });
        }

        // Guarded decrement; zero rows means a concurrent allocation won
        let decremented = Product::update_many()
            .col_expr(
                product::Column::RemainingQuantity,
                Expr::col(product::Column::RemainingQuantity).sub(alloc.quantity),
            )
            .filter(product::Column::Id.eq(alloc.product_id))
            .filter(product::Column::RemainingQuantity.gte(alloc.quantity))
            .exec(conn)
            .await?;
        if decremented.rows_affected == 0 {
            let fresh = Product::find_by_id(alloc.product_id)
                .one(conn)
                .await?
                .map_or(0, |p| p.remaining_quantity);
            return Err(Error::Capacity {
                item: "product",
                item_id: alloc.product_id,
                requested: alloc.quantity,
                available: fresh,
            });
        }

        // Mirror onto the request's lines by product type; lines the
        // request never asked for are tolerated as extra fulfillment
        let mut to_mirror = alloc.quantity;
        for entry in request_remaining.iter_mut() {
            if to_mirror == 0 {
                break;
            }
            if entry.1 != line.product_type || entry.2 <= 0 {
                continue;
            }
            let dec = entry.2.min(to_mirror);
            let mirrored = Product::update_many()
                .col_expr(
                    product::Column::RemainingQuantity,
                    Expr::col(product::Column::RemainingQuantity).sub(dec),
                )
                .filter(product::Column::Id.eq(entry.0))
                .filter(product::Column::RemainingQuantity.gte(dec))
                .exec(conn)
                .await?;
            if mirrored.rows_affected > 0 {
                entry.2 -= dec;
                to_mirror -= dec;
            }
        }
    }

    // Derived statuses from the post-decrement totals
    let donation_remaining: i64 = Product::find()
        .filter(product::Column::DonationId.eq(donation.id))
        .all(conn)
        .await?
        .iter()
        .map(|p| i64::from(p.remaining_quantity))
        .sum();
    set_donation_status(conn, donation.id, donation_remaining == 0).await?;

    let request_remaining_total: i64 = Product::find()
        .filter(product::Column::RequestId.eq(request.id))
        .all(conn)
        .await?
        .iter()
        .map(|p| i64::from(p.remaining_quantity))
        .sum();
    set_request_status(conn, request.id, request_remaining_total == 0).await?;

    Ok(())
}

async fn apply_meal_allocation<C: ConnectionTrait>(
    conn: &C,
    donation: &donation::Model,
    request: &request_need::Model,
    allocations: &[MealAllocation],
) -> Result<()> {
    let donation_lines = Meal::find()
        .filter(meal::Column::DonationId.eq(donation.id))
        .all(conn)
        .await?;
    let by_id: HashMap<i64, &meal::Model> = donation_lines.iter().map(|m| (m.id, m)).collect();

    let mut total_allocated: i32 = 0;
    for alloc in allocations {
        if alloc.quantity <= 0 {
            return Err(Error::validation(format!(
                "Allocated quantity must be positive for meal {}",
                alloc.meal_id
            )));
        }
        let line = by_id.get(&alloc.meal_id).ok_or(Error::NotFound {
            entity: "meal",
            id: alloc.meal_id,
        })?;
        if alloc.quantity > line.remaining_quantity {
            return Err(Error::Capacity {
                item: "meal",
                item_id: alloc.meal_id,
                requested: alloc.quantity,
                available: line.remaining_quantity,
            });
        }

        let decremented = Meal::update_many()
            .col_expr(
                meal::Column::RemainingQuantity,
                Expr::col(meal::Column::RemainingQuantity).sub(alloc.quantity),
            )
            .filter(meal::Column::Id.eq(alloc.meal_id))
            .filter(meal::Column::RemainingQuantity.gte(alloc.quantity))
            .exec(conn)
            .await?;
        if decremented.rows_affected == 0 {
            let fresh = Meal::find_by_id(alloc.meal_id)
                .one(conn)
                .await?
                .map_or(0, |m| m.remaining_quantity);
            return Err(Error::Capacity {
                item: "meal",
                item_id: alloc.meal_id,
                requested: alloc.quantity,
                available: fresh,
            });
        }
        total_allocated += alloc.quantity;
    }

    // The meal-category total mirrors the line decrements
    let counter = Donation::update_many()
        .col_expr(
            donation::Column::RemainingMeals,
            Expr::col(donation::Column::RemainingMeals).sub(total_allocated),
        )
        .filter(donation::Column::Id.eq(donation.id))
        .filter(donation::Column::RemainingMeals.gte(total_allocated))
        .exec(conn)
        .await?;
    if counter.rows_affected == 0 {
        return Err(Error::Capacity {
            item: "meal",
            item_id: donation.id,
            requested: total_allocated,
            available: donation.remaining_meals.unwrap_or(0),
        });
    }

    let remaining = Donation::find_by_id(donation.id)
        .one(conn)
        .await?
        .and_then(|d| d.remaining_meals)
        .unwrap_or(0);
    set_donation_status(conn, donation.id, remaining == 0).await?;

    // Request side wants a total, not specific lines
    let wanted = request.number_of_meals.unwrap_or(0);
    let dec = wanted.min(total_allocated);
    if dec > 0 {
        RequestNeed::update_many()
            .col_expr(
                request_need::Column::NumberOfMeals,
                Expr::col(request_need::Column::NumberOfMeals).sub(dec),
            )
            .filter(request_need::Column::Id.eq(request.id))
            .filter(request_need::Column::NumberOfMeals.gte(dec))
            .exec(conn)
            .await?;
    }
    let still_wanted = RequestNeed::find_by_id(request.id)
        .one(conn)
        .await?
        .and_then(|r| r.number_of_meals)
        .unwrap_or(0);
    set_request_status(conn, request.id, still_wanted == 0).await?;

    Ok(())
}

async fn set_donation_status<C: ConnectionTrait>(
    conn: &C,
    donation_id: i64,
    fulfilled: bool,
) -> Result<()> {
    let status = if fulfilled {
        DonationStatus::Fulfilled
    } else {
        DonationStatus::PartiallyFulfilled
    };
    Donation::update_many()
        .col_expr(donation::Column::Status, Expr::value(status))
        .col_expr(donation::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(donation::Column::Id.eq(donation_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn set_request_status<C: ConnectionTrait>(
    conn: &C,
    request_id: i64,
    fulfilled: bool,
) -> Result<()> {
    let status = if fulfilled {
        RequestStatus::Fulfilled
    } else {
        RequestStatus::PartiallyFulfilled
    };
    RequestNeed::update_many()
        .col_expr(request_need::Column::Status, Expr::value(status))
        .col_expr(
            request_need::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(request_need::Column::Id.eq(request_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Status from live state: exhausted → fulfilled; touched by an approved
/// transaction → partially fulfilled; otherwise back to pending.
pub(crate) async fn refresh_request_status<C: ConnectionTrait>(
    conn: &C,
    request_id: i64,
) -> Result<RequestStatus> {
    let request = RequestNeed::find_by_id(request_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound {
            entity: "request",
            id: request_id,
        })?;

    let remaining: i64 = match request.category {
        Category::PreparedMeals => i64::from(request.number_of_meals.unwrap_or(0)),
        Category::PackagedProducts => Product::find()
            .filter(product::Column::RequestId.eq(request_id))
            .all(conn)
            .await?
            .iter()
            .map(|p| i64::from(p.remaining_quantity))
            .sum(),
    };

    let approved = DonationTransaction::find()
        .filter(donation_transaction::Column::RequestId.eq(request_id))
        .filter(donation_transaction::Column::Status.eq(TransactionStatus::Approved))
        .count(conn)
        .await?;

    let status = if remaining == 0 {
        RequestStatus::Fulfilled
    } else if approved > 0 {
        RequestStatus::PartiallyFulfilled
    } else {
        RequestStatus::Pending
    };

    if status != request.status {
        let mut active: request_need::ActiveModel = request.into();
        active.status = Set(status);
        active.updated_at = Set(chrono::Utc::now());
        active.update(conn).await?;
    }
    Ok(status)
}

async fn send_approval_messages(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    donation: &donation::Model,
    request: &request_need::Model,
    transaction: &donation_transaction::Model,
    transporter: &Option<user::Model>,
) {
    notify_best_effort(
        notifier,
        transaction.donor_id,
        transaction.recipient_id,
        &format!(
            "A delivery has been created for your request \"{}\". Status: Pending.",
            request.title
        ),
    )
    .await;
    notify_best_effort(
        notifier,
        transaction.recipient_id,
        transaction.donor_id,
        &format!(
            "A delivery has been created for your donation \"{}\". Status: Pending.",
            donation.title
        ),
    )
    .await;
    if let Some(t) = transporter {
        notify_best_effort(
            notifier,
            transaction.donor_id,
            t.id,
            &format!(
                "You have been assigned to a delivery for the donation \"{}\". Pickup address: {}.",
                donation.title, donation.address
            ),
        )
        .await;
        email_best_effort(
            notifier,
            &t.email,
            &format!("New delivery assigned: {}", donation.title),
            &format!(
                "Pickup address: {}\nDelivery address: {}",
                donation.address, request.address
            ),
            None,
        )
        .await;
    }

    if let Ok(Some(donor)) = User::find_by_id(transaction.donor_id).one(db).await {
        email_best_effort(
            notifier,
            &donor.email,
            &format!("Your donation \"{}\" has been accepted", donation.title),
            &format!(
                "Your donation \"{}\" was allocated to the request \"{}\".",
                donation.title, request.title
            ),
            None,
        )
        .await;
    }
    if let Ok(Some(recipient)) = User::find_by_id(transaction.recipient_id).one(db).await {
        email_best_effort(
            notifier,
            &recipient.email,
            &format!("Your request \"{}\" has been accepted", request.title),
            &format!(
                "A delivery for the donation \"{}\" is being scheduled.",
                donation.title
            ),
            None,
        )
        .await;
    }
}

async fn send_rejection_messages(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    transaction: &donation_transaction::Model,
    reason: &str,
) {
    notify_best_effort(
        notifier,
        transaction.donor_id,
        transaction.recipient_id,
        &format!("A transaction for your request was rejected: {reason}"),
    )
    .await;
    notify_best_effort(
        notifier,
        transaction.recipient_id,
        transaction.donor_id,
        &format!("A transaction for your donation was rejected: {reason}"),
    )
    .await;

    for user_id in [transaction.donor_id, transaction.recipient_id] {
        if let Ok(Some(user)) = User::find_by_id(user_id).one(db).await {
            email_best_effort(
                notifier,
                &user.email,
                "A transaction was rejected",
                &format!("Reason: {reason}"),
                None,
            )
            .await;
        }
    }
}
