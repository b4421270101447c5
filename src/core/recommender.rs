//! Recommender training and serving - the advisory layer over completed
//! transactions.
//!
//! Training reads the completed-transaction history, factorizes it, and
//! publishes the snapshot through a [`RecommenderHandle`]. Serving ranks a
//! donation against the requests the model knows, annotated with what the
//! donation could actually fulfil today. None of this is authoritative: the
//! allocation engine never consults it, and an empty history simply yields
//! no recommendations.

use std::collections::HashMap;

use crate::{
    config::tuning::{MatchingTuning, RecommenderTuning},
    core::{
        donation::get_donation_with_lines,
        matching::{FulfilledItem, score_candidate},
    },
    entities::{
        DonationTransaction, Product, RequestNeed, TransactionStatus, donation_transaction,
        product, request_need,
    },
    errors::Result,
    ml::recommender::{Interaction, RecommenderHandle, RecommenderModel},
};
use sea_orm::prelude::*;
use tracing::info;

/// A recommended request with the affinity score and what the donation
/// could fulfil.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub request: request_need::Model,
    pub fulfilled_items: Vec<FulfilledItem>,
    pub match_score: f64,
}

/// Trains a fresh snapshot from the completed-transaction history.
///
/// # Errors
/// Returns an error only when the history query fails; an empty history
/// trains an empty model.
pub async fn train_snapshot(
    db: &DatabaseConnection,
    cfg: &RecommenderTuning,
) -> Result<RecommenderModel> {
    let completed = DonationTransaction::find()
        .filter(donation_transaction::Column::Status.eq(TransactionStatus::Completed))
        .all(db)
        .await?;

    let mut counts: HashMap<(i64, i64), f64> = HashMap::new();
    for txn in &completed {
        *counts.entry((txn.donation_id, txn.request_id)).or_insert(0.0) += 1.0;
    }
    let interactions: Vec<Interaction> = counts
        .into_iter()
        .map(|((donation_id, request_id), count)| Interaction {
            donation_id,
            request_id,
            count,
        })
        .collect();

    info!(
        "Training recommender on {} interactions from {} completed transactions",
        interactions.len(),
        completed.len()
    );
    Ok(RecommenderModel::train(&interactions, cfg))
}

/// Retrains and atomically publishes the new snapshot.
pub async fn retrain(
    db: &DatabaseConnection,
    cfg: &RecommenderTuning,
    handle: &RecommenderHandle,
) -> Result<()> {
    let model = train_snapshot(db, cfg).await?;
    handle.publish(model);
    Ok(())
}

/// Ranks the model's known requests against a donation, best first. Each
/// hit is annotated with the items the donation could fulfil right now;
/// requests it cannot serve at all are skipped.
pub async fn recommend(
    db: &DatabaseConnection,
    model: &RecommenderModel,
    matching_cfg: &MatchingTuning,
    donation_id: i64,
    top_n: usize,
) -> Result<Vec<Recommendation>> {
    let Some(details) = get_donation_with_lines(db, donation_id).await? else {
        return Ok(Vec::new());
    };

    let now = chrono::Utc::now();
    let mut recommendations = Vec::new();
    for (request_id, score) in model.scores_for_donation(donation_id) {
        if recommendations.len() >= top_n {
            break;
        }
        let Some(request) = RequestNeed::find_by_id(request_id).one(db).await? else {
            continue;
        };
        let request_products = Product::find()
            .filter(product::Column::RequestId.eq(request_id))
            .all(db)
            .await?;
        if let Some((fulfilled_items, _)) =
            score_candidate(&details, &request, &request_products, None, now, matching_cfg)
        {
            recommendations.push(Recommendation {
                request,
                fulfilled_items,
                match_score: score,
            });
        }
    }
    Ok(recommendations)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_empty_history_trains_empty_model() -> Result<()> {
        let db = setup_test_db().await?;
        let model = train_snapshot(&db, &test_tuning().recommender).await?;
        assert!(model.is_empty());

        let recs = recommend(&db, &model, &test_tuning().matching, 1, 5).await?;
        assert!(recs.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_completed_history_surfaces_serviceable_request() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        let recipient = create_test_recipient(&db, "Shelter", None).await?;

        let donation = create_test_product_donation(
            &db,
            donor.id,
            "Cans",
            &[("Canned_Goods", 50)],
            10,
        )
        .await?;
        let request = create_test_product_request(
            &db,
            recipient.id,
            "Need cans",
            &[("Canned_Goods", 20)],
            10,
        )
        .await?;

        // Seed a completed transaction directly; history is the training set
        mark_completed_transaction(&db, donation.donation.id, request.request.id).await?;

        let handle = crate::ml::recommender::RecommenderHandle::new();
        retrain(&db, &test_tuning().recommender, &handle).await?;
        let model = handle.latest();
        assert!(!model.is_empty());

        let recs = recommend(&db, &model, &test_tuning().matching, donation.donation.id, 5)
            .await?;
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].request.id, request.request.id);
        assert_eq!(recs[0].fulfilled_items[0].quantity, 20);

        Ok(())
    }
}
