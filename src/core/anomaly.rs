//! Anomaly detection - flags donations whose size and expiry pattern looks
//! suspicious.
//!
//! A hybrid of a statistical outlier model and hard threshold rules, and the
//! two deliberately stay separate paths:
//!
//! - Fewer than two donations cannot support variance estimates, so a single
//!   donation is judged by the rule alone.
//! - With two or more, an isolation forest scores a normalized feature
//!   matrix, and its verdict is OR-ed with the extreme-case override, then
//!   gated by the hard rules (large quantity, near expiry, not a single
//!   unit).
//!
//! The whole population is rescanned every time, including synchronously on
//! donation creation, so a new donation's verdict reflects its effect on the
//! distribution.

use std::collections::HashMap;

use crate::{
    config::tuning::AnomalyTuning,
    entities::{
        Category, Donation, DonationTransaction, Product, TransactionStatus, User, donation,
        donation_transaction, product,
    },
    errors::{Error, Result},
    ml::isolation_forest::IsolationForest,
    notify::{Notifier, email_best_effort, notify_best_effort},
};
use rand::{SeedableRng, rngs::StdRng};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Score reported for rule-only verdicts, where no model ran.
const RULE_ONLY_SCORE: f64 = 0.9;

/// One flagged donation, computed on demand and never persisted as its own
/// record.
#[derive(Debug, Clone)]
pub struct AnomalyRecord {
    pub donation_id: i64,
    pub donor_id: i64,
    pub title: String,
    pub quantity: i64,
    pub days_to_expiry: i64,
    pub linked_requests: i64,
    pub anomaly_score: f64,
    pub reason: String,
}

struct DonationFeatures {
    donation_id: i64,
    donor_id: i64,
    title: String,
    quantity: i64,
    days_to_expiry: i64,
    linked_requests: i64,
}

/// Days until an expiration date, clamped at zero. Rounded up so "expires
/// tomorrow morning" counts as one day, not zero.
fn days_to_expiry(expiration: DateTimeUtc, now: DateTimeUtc) -> i64 {
    let seconds = (expiration - now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds as f64 / 86_400.0).ceil() as i64
    }
}

/// Per-column z-score normalization. A zero-variance column normalizes to
/// all zeros rather than dividing by zero.
fn normalize_columns(features: &[Vec<f64>]) -> Vec<Vec<f64>> {
    if features.is_empty() {
        return Vec::new();
    }
    let rows = features.len() as f64;
    let cols = features[0].len();
    let mut normalized = vec![vec![0.0; cols]; features.len()];

    for col in 0..cols {
        let mean: f64 = features.iter().map(|row| row[col]).sum::<f64>() / rows;
        let variance: f64 = features
            .iter()
            .map(|row| (row[col] - mean).powi(2))
            .sum::<f64>()
            / rows;
        let std = variance.sqrt();
        if std > 0.0 {
            for (i, row) in features.iter().enumerate() {
                normalized[i][col] = (row[col] - mean) / std;
            }
        }
    }
    normalized
}

async fn collect_features(
    db: &DatabaseConnection,
    now: DateTimeUtc,
) -> Result<Vec<DonationFeatures>> {
    let donations = Donation::find()
        .order_by_asc(donation::Column::Id)
        .all(db)
        .await?;
    if donations.is_empty() {
        return Ok(Vec::new());
    }

    // Remaining product quantities per donation, one query for the lot
    let mut product_totals: HashMap<i64, i64> = HashMap::new();
    for line in Product::find()
        .filter(product::Column::DonationId.is_not_null())
        .all(db)
        .await?
    {
        if let Some(donation_id) = line.donation_id {
            *product_totals.entry(donation_id).or_insert(0) += i64::from(line.remaining_quantity);
        }
    }

    // Live transaction links per donation
    let mut linked: HashMap<i64, i64> = HashMap::new();
    for txn in DonationTransaction::find()
        .filter(
            donation_transaction::Column::Status
                .is_in([TransactionStatus::Pending, TransactionStatus::Approved]),
        )
        .all(db)
        .await?
    {
        *linked.entry(txn.donation_id).or_insert(0) += 1;
    }

    let mut donor_frequency: HashMap<i64, i64> = HashMap::new();
    for d in &donations {
        *donor_frequency.entry(d.donor_id).or_insert(0) += 1;
    }

    Ok(donations
        .iter()
        .map(|d| {
            let quantity = match d.category {
                Category::PreparedMeals => {
                    i64::from(d.remaining_meals.or(d.number_of_meals).unwrap_or(0))
                }
                Category::PackagedProducts => product_totals.get(&d.id).copied().unwrap_or(0),
            };
            DonationFeatures {
                donation_id: d.id,
                donor_id: d.donor_id,
                title: d.title.clone(),
                quantity,
                days_to_expiry: days_to_expiry(d.expiration_date, now),
                linked_requests: linked.get(&d.id).copied().unwrap_or(0),
            }
        })
        .collect())
}

fn reason_for(features: &DonationFeatures) -> String {
    format!(
        "Large quantity ({}) near expiry ({} days)",
        features.quantity, features.days_to_expiry
    )
}

/// Scans the whole donation population and returns the flagged records.
///
/// # Errors
/// Returns an error only when a database query fails.
pub async fn detect_anomalies(
    db: &DatabaseConnection,
    cfg: &AnomalyTuning,
) -> Result<Vec<AnomalyRecord>> {
    let now = chrono::Utc::now();
    let features = collect_features(db, now).await?;

    if features.is_empty() {
        return Ok(Vec::new());
    }

    // A single observation cannot feed the statistical model, so the rule
    // decides alone. A quantity of one is never suspicious, and absurdly
    // large single observations are left to the admin queue rather than
    // auto-flagged without population context.
    if features.len() == 1 {
        let f = &features[0];
        let flagged = f.quantity >= cfg.min_quantity
            && f.quantity <= cfg.single_sample_max_quantity
            && f.days_to_expiry <= cfg.near_expiry_days
            && f.quantity != 1;
        if flagged {
            return Ok(vec![AnomalyRecord {
                donation_id: f.donation_id,
                donor_id: f.donor_id,
                title: f.title.clone(),
                quantity: f.quantity,
                days_to_expiry: f.days_to_expiry,
                linked_requests: f.linked_requests,
                anomaly_score: RULE_ONLY_SCORE,
                reason: reason_for(f),
            }]);
        }
        return Ok(Vec::new());
    }

    // log1p compresses the heavy right tail of quantities so one enormous
    // donation does not dominate the z-scores of the whole population
    let mut donor_counts: HashMap<i64, f64> = HashMap::new();
    for f in &features {
        *donor_counts.entry(f.donor_id).or_insert(0.0) += 1.0;
    }
    let matrix: Vec<Vec<f64>> = features
        .iter()
        .map(|f| {
            vec![
                (f.quantity as f64).ln_1p(),
                donor_counts[&f.donor_id],
                f.days_to_expiry as f64,
                f.linked_requests as f64,
            ]
        })
        .collect();

    let normalized = normalize_columns(&matrix);
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let forest = IsolationForest::fit(&normalized, cfg.trees, cfg.max_samples, &mut rng);
    let scores = forest.score_all(&normalized);

    let records = features
        .iter()
        .zip(&scores)
        .filter_map(|(f, &score)| {
            let is_large = f.quantity >= cfg.min_quantity;
            let is_near_expiry = f.days_to_expiry <= cfg.near_expiry_days;
            let is_single_unit = f.quantity == 1;
            let is_extreme = f.quantity >= cfg.extreme_quantity
                && f.days_to_expiry <= cfg.extreme_expiry_days;

            let flagged = (score >= cfg.score_threshold || is_extreme)
                && is_large
                && is_near_expiry
                && !is_single_unit;
            flagged.then(|| AnomalyRecord {
                donation_id: f.donation_id,
                donor_id: f.donor_id,
                title: f.title.clone(),
                quantity: f.quantity,
                days_to_expiry: f.days_to_expiry,
                linked_requests: f.linked_requests,
                anomaly_score: score,
                reason: reason_for(f),
            })
        })
        .collect();
    Ok(records)
}

/// Rescans the population, synchronizes every donation's `is_anomaly` flag,
/// and notifies donors whose donations were newly flagged. Returns the
/// flagged records.
pub async fn sweep_and_flag(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    cfg: &AnomalyTuning,
) -> Result<Vec<AnomalyRecord>> {
    let records = detect_anomalies(db, cfg).await?;
    let flagged_ids: Vec<i64> = records.iter().map(|r| r.donation_id).collect();

    let donations = Donation::find().all(db).await?;
    for d in donations {
        let should_flag = flagged_ids.contains(&d.id);
        if d.is_anomaly == should_flag {
            continue;
        }
        let id = d.id;
        let donor_id = d.donor_id;
        let title = d.title.clone();
        let mut active: donation::ActiveModel = d.into();
        active.is_anomaly = Set(should_flag);
        active.updated_at = Set(chrono::Utc::now());
        active.update(db).await?;

        if should_flag {
            let Some(record) = records.iter().find(|r| r.donation_id == id) else {
                continue;
            };
            info!("Donation {id} flagged as anomaly: {}", record.reason);
            notify_best_effort(
                notifier,
                donor_id,
                donor_id,
                &format!(
                    "Your donation \"{title}\" has been flagged for review. Reason: {}",
                    record.reason
                ),
            )
            .await;
            if let Some(donor) = User::find_by_id(donor_id).one(db).await? {
                email_best_effort(
                    notifier,
                    &donor.email,
                    "Anomaly detected in your donation",
                    &format!(
                        "Your donation \"{title}\" has been flagged.\nReason: {}.\n\
                         Please review your donation details or contact support.",
                        record.reason
                    ),
                    None,
                )
                .await;
            }
        }
    }

    Ok(records)
}

/// Creation-time hook: rescans the population and reports whether the given
/// donation ended up flagged.
pub async fn rescore_donation(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    cfg: &AnomalyTuning,
    donation_id: i64,
) -> Result<bool> {
    Donation::find_by_id(donation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation_id,
        })?;

    let records = sweep_and_flag(db, notifier, cfg).await?;
    Ok(records.iter().any(|r| r.donation_id == donation_id))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::notify::NullNotifier;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_empty_population() -> Result<()> {
        let db = setup_test_db().await?;
        let records = detect_anomalies(&db, &test_tuning().anomaly).await?;
        assert!(records.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_single_large_near_expiry_donation_flagged_by_rule() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Warehouse").await?;
        let donation =
            create_test_product_donation(&db, donor.id, "Pallet", &[("Canned_Goods", 5000)], 2)
                .await?;

        let records = detect_anomalies(&db, &test_tuning().anomaly).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].donation_id, donation.donation.id);
        assert_eq!(records[0].quantity, 5000);
        assert_eq!(records[0].anomaly_score, 0.9);
        assert!(records[0].reason.contains("5000"));

        Ok(())
    }

    #[tokio::test]
    async fn test_single_unit_donation_never_flagged() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Neighbor").await?;
        create_test_product_donation(&db, donor.id, "One can", &[("Canned_Goods", 1)], 1).await?;

        let records = detect_anomalies(&db, &test_tuning().anomaly).await?;
        assert!(records.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_small_far_expiry_population_unflagged() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        for i in 0..5 {
            create_test_product_donation(
                &db,
                donor.id,
                &format!("Normal {i}"),
                &[("Dry_Goods", 10 + i)],
                30,
            )
            .await?;
        }

        // Small quantities far from expiry fail the hard gates regardless
        // of model scores
        let records = detect_anomalies(&db, &test_tuning().anomaly).await?;
        assert!(records.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_extreme_case_override_forces_flag() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        for i in 0..6 {
            create_test_product_donation(
                &db,
                donor.id,
                &format!("Normal {i}"),
                &[("Dry_Goods", 10)],
                30,
            )
            .await?;
        }
        let huge = create_test_product_donation(
            &db,
            donor.id,
            "Dump truck",
            &[("Canned_Goods", 12_000)],
            3,
        )
        .await?;

        // 12000 units at 3 days out trips the extreme override whatever the
        // ensemble thinks
        let records = detect_anomalies(&db, &test_tuning().anomaly).await?;
        assert!(records.iter().any(|r| r.donation_id == huge.donation.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_creation_hook_sets_flag_and_notifies() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Warehouse").await?;
        let notifier = crate::notify::DbNotifier::new(db.clone());

        let input = product_donation_input(donor.id, "Pallet", &[("Canned_Goods", 5000)], 2);
        let details =
            crate::core::donation::create_donation(&db, &notifier, &test_tuning(), input).await?;

        assert!(details.donation.is_anomaly);
        let rows = crate::entities::Notification::find().all(&db).await?;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].message.contains("flagged"));

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_clears_stale_flags() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        let details =
            create_test_product_donation(&db, donor.id, "Rice", &[("Dry_Goods", 10)], 30).await?;

        // Force a stale flag, then sweep
        let mut active: donation::ActiveModel = details.donation.into();
        active.is_anomaly = Set(true);
        active.update(&db).await?;

        sweep_and_flag(&db, &NullNotifier, &test_tuning().anomaly).await?;
        let fresh = Donation::find_by_id(details.products[0].donation_id.unwrap())
            .one(&db)
            .await?
            .unwrap();
        assert!(!fresh.is_anomaly);

        Ok(())
    }

    #[test]
    fn test_normalize_handles_zero_variance() {
        let features = vec![vec![5.0, 1.0], vec![5.0, 3.0], vec![5.0, 5.0]];
        let normalized = normalize_columns(&features);
        // Constant column collapses to zeros
        for row in &normalized {
            assert_eq!(row[0], 0.0);
        }
        // Varying column is centered
        let sum: f64 = normalized.iter().map(|r| r[1]).sum();
        assert!(sum.abs() < 1e-9);
    }

    #[test]
    fn test_days_to_expiry_clamps_and_rounds_up() {
        let now = chrono::Utc::now();
        assert_eq!(days_to_expiry(now - chrono::Duration::days(3), now), 0);
        assert_eq!(days_to_expiry(now + chrono::Duration::hours(5), now), 1);
        assert_eq!(days_to_expiry(now + chrono::Duration::days(2), now), 2);
    }
}
