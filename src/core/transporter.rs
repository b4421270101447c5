//! Transporter assignment - nearest-carrier search with availability
//! locking.
//!
//! Candidates are the available, active, unblocked transporters with real
//! last-known coordinates; distance is the haversine great-circle distance
//! to the pickup point. The winner's `is_available` flag is flipped through
//! a guarded update, so two deliveries racing for one carrier cannot both
//! win; the loser just moves on to the next-nearest candidate.

use crate::{
    config::tuning::TransporterTuning,
    entities::{Delivery, DeliveryStatus, DonationTransaction, User, UserRole, delivery, user},
    errors::{Error, Result},
    notify::{Notifier, notify_best_effort},
};
use sea_orm::{ConnectionTrait, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, warn};

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in meters.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Picks the nearest available transporter to a pickup point and claims it
/// by flipping `is_available` with a guarded update. Candidates whose claim
/// fails (someone else got there first) are skipped in distance order.
/// Returns None when nobody qualifies.
pub(crate) async fn pick_nearest_available<C: ConnectionTrait>(
    conn: &C,
    cfg: &TransporterTuning,
    pickup_lat: f64,
    pickup_lon: f64,
) -> Result<Option<user::Model>> {
    let candidates = User::find()
        .filter(user::Column::Role.eq(UserRole::Transporter))
        .filter(user::Column::IsAvailable.eq(true))
        .filter(user::Column::IsActive.eq(true))
        .filter(user::Column::IsBlocked.eq(false))
        .order_by_asc(user::Column::Id)
        .all(conn)
        .await?;

    // A (0, 0) pickup means the donation carries no coordinates; fall back
    // to plain candidate order instead of ranking distances from nowhere
    let located = pickup_lat != 0.0 || pickup_lon != 0.0;
    let mut ranked: Vec<(f64, user::Model)> = candidates
        .into_iter()
        .filter(|t| t.latitude != 0.0 || t.longitude != 0.0)
        .map(|t| {
            let distance = if located {
                haversine_distance_m(pickup_lat, pickup_lon, t.latitude, t.longitude)
            } else {
                0.0
            };
            (distance, t)
        })
        .filter(|(distance, _)| {
            !located || cfg.max_distance_m.is_none_or(|max| *distance <= max)
        })
        .collect();
    // Stable: equal distances keep candidate order, first seen wins
    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    for (distance, candidate) in ranked {
        let claimed = User::update_many()
            .col_expr(user::Column::IsAvailable, Expr::value(false))
            .filter(user::Column::Id.eq(candidate.id))
            .filter(user::Column::IsAvailable.eq(true))
            .exec(conn)
            .await?;
        if claimed.rows_affected == 1 {
            info!(
                "Claimed transporter {} at {:.0}m from pickup",
                candidate.id, distance
            );
            return Ok(Some(user::Model {
                is_available: false,
                ..candidate
            }));
        }
        warn!("Transporter {} was claimed concurrently, trying next", candidate.id);
    }

    Ok(None)
}

/// Assigns the nearest available transporter to a pending, unassigned
/// delivery. Returns None (leaving the delivery poolable) when no candidate
/// qualifies.
///
/// # Errors
/// `NotFound` for an unknown delivery, `StateConflict` when the delivery is
/// not pending or already has a transporter, and a validation error when
/// the pickup coordinates are missing.
pub async fn assign_nearest(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    cfg: &TransporterTuning,
    delivery_id: i64,
) -> Result<Option<user::Model>> {
    let delivery = Delivery::find_by_id(delivery_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "delivery",
            id: delivery_id,
        })?;

    if delivery.status != DeliveryStatus::Pending {
        return Err(Error::StateConflict {
            entity: "delivery",
            id: delivery_id,
            state: format!("{:?}", delivery.status),
        });
    }
    if delivery.transporter_id.is_some() {
        return Err(Error::StateConflict {
            entity: "delivery",
            id: delivery_id,
            state: "already assigned".to_string(),
        });
    }
    if delivery.pickup_latitude == 0.0 && delivery.pickup_longitude == 0.0 {
        return Err(Error::validation("Pickup location is missing"));
    }

    let txn = db.begin().await?;
    let chosen = pick_nearest_available(
        &txn,
        cfg,
        delivery.pickup_latitude,
        delivery.pickup_longitude,
    )
    .await?;

    let Some(transporter) = chosen else {
        txn.rollback().await?;
        info!("No transporter available for delivery {delivery_id}, leaving it poolable");
        return Ok(None);
    };

    Delivery::update_many()
        .col_expr(
            delivery::Column::TransporterId,
            Expr::value(Some(transporter.id)),
        )
        .col_expr(delivery::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(delivery::Column::Id.eq(delivery_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    // Route the news to all three parties, never failing the assignment
    if let Some(transaction) = DonationTransaction::find_by_id(delivery.transaction_id)
        .one(db)
        .await?
    {
        notify_best_effort(
            notifier,
            transaction.recipient_id,
            transporter.id,
            &format!(
                "You have been assigned to a delivery. Pick up at {} and deliver to {}.",
                delivery.pickup_address, delivery.delivery_address
            ),
        )
        .await;
        notify_best_effort(
            notifier,
            transporter.id,
            transaction.donor_id,
            "A transporter has been assigned to your donation.",
        )
        .await;
        notify_best_effort(
            notifier,
            transporter.id,
            transaction.recipient_id,
            "A transporter has been assigned to your request.",
        )
        .await;
    }

    Ok(Some(transporter))
}
