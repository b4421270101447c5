//! Matching engine - ranks pending requests against a donation.
//!
//! Pure read-and-compute: nothing here writes. Candidates are the pending,
//! unexpired requests in the donation's category, scored by how much of
//! their ask the donation can cover, with urgency bonuses that push
//! near-expiry donations toward relief-oriented recipients. Product matching
//! is by `product_type`, not line identity, so any donation line of the
//! right type can serve a request.

use std::collections::HashMap;

use crate::{
    config::tuning::MatchingTuning,
    core::donation::{DonationDetails, get_donation_with_lines},
    entities::{
        Category, Product, RequestNeed, RequestStatus, User,
        product, request_need,
        user::{RECIPIENT_TYPE_RELIEF, RECIPIENT_TYPE_SOCIAL_WELFARE},
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, prelude::*};

/// One fulfillable line of a match. `product_id` points at the request's
/// product line; meal matches carry only a quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfilledItem {
    pub product_id: Option<i64>,
    pub quantity: i32,
}

/// A candidate request with what the donation can cover and the resulting
/// score.
#[derive(Debug, Clone)]
pub struct RankedMatch {
    pub request: request_need::Model,
    pub fulfilled_items: Vec<FulfilledItem>,
    pub match_score: i64,
}

/// Scores one candidate request against a donation. Returns None when the
/// donation covers nothing the request asks for.
pub fn score_candidate(
    details: &DonationDetails,
    request: &request_need::Model,
    request_products: &[product::Model],
    recipient_type: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
    cfg: &MatchingTuning,
) -> Option<(Vec<FulfilledItem>, i64)> {
    let mut fulfilled_items = Vec::new();
    let mut score: i64 = 0;

    match details.donation.category {
        Category::PackagedProducts => {
            for requested in request_products {
                if requested.remaining_quantity <= 0 {
                    continue;
                }
                // First donation line of the same type with stock left
                let available = details
                    .products
                    .iter()
                    .find(|p| p.product_type == requested.product_type && p.remaining_quantity > 0);
                if let Some(line) = available {
                    let quantity = line.remaining_quantity.min(requested.remaining_quantity);
                    fulfilled_items.push(FulfilledItem {
                        product_id: Some(requested.id),
                        quantity,
                    });
                    score += i64::from(quantity) * cfg.quantity_weight;
                }
            }
        }
        Category::PreparedMeals => {
            let donated = details
                .donation
                .remaining_meals
                .or(details.donation.number_of_meals)
                .unwrap_or(0);
            let wanted = request.number_of_meals.unwrap_or(0);
            if donated > 0 && wanted > 0 {
                let quantity = donated.min(wanted);
                fulfilled_items.push(FulfilledItem {
                    product_id: None,
                    quantity,
                });
                score += i64::from(quantity) * cfg.quantity_weight;
            }
        }
    }

    if fulfilled_items.is_empty() {
        return None;
    }

    // Urgency bonuses are per request, not per item
    let days_until_expiration =
        (details.donation.expiration_date - now).num_seconds() as f64 / 86_400.0;
    if days_until_expiration < cfg.urgent_expiry_days as f64 {
        score += cfg.urgent_bonus;
    } else if days_until_expiration < cfg.soon_expiry_days as f64 {
        score += cfg.soon_bonus;
    }

    match recipient_type {
        Some(RECIPIENT_TYPE_RELIEF) if days_until_expiration < cfg.soon_expiry_days as f64 => {
            score += cfg.relief_bonus;
        }
        Some(RECIPIENT_TYPE_SOCIAL_WELFARE) => {
            score += cfg.social_welfare_bonus;
        }
        _ => {}
    }

    Some((fulfilled_items, score))
}

/// Finds the compatible pending requests for a donation, ranked by
/// descending match score. Ties keep candidate order (ascending request id),
/// and repeated calls over unchanged data return the same ordering.
///
/// # Errors
/// `NotFound` if the donation does not exist; otherwise only database
/// errors.
pub async fn match_donation_to_requests(
    db: &DatabaseConnection,
    cfg: &MatchingTuning,
    donation_id: i64,
) -> Result<Vec<RankedMatch>> {
    let details = get_donation_with_lines(db, donation_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "donation",
            id: donation_id,
        })?;

    let now = chrono::Utc::now();
    let candidates = RequestNeed::find()
        .filter(request_need::Column::Category.eq(details.donation.category))
        .filter(request_need::Column::Status.eq(RequestStatus::Pending))
        .filter(request_need::Column::ExpirationDate.gte(now))
        .order_by_asc(request_need::Column::Id)
        .all(db)
        .await?;

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let candidate_ids: Vec<i64> = candidates.iter().map(|r| r.id).collect();
    let mut lines_by_request: HashMap<i64, Vec<product::Model>> = HashMap::new();
    for line in Product::find()
        .filter(product::Column::RequestId.is_in(candidate_ids.clone()))
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?
    {
        if let Some(request_id) = line.request_id {
            lines_by_request.entry(request_id).or_default().push(line);
        }
    }

    let recipient_ids: Vec<i64> = candidates.iter().map(|r| r.recipient_id).collect();
    let recipient_types: HashMap<i64, Option<String>> = User::find()
        .filter(crate::entities::user::Column::Id.is_in(recipient_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.recipient_type))
        .collect();

    let mut matches: Vec<RankedMatch> = Vec::new();
    for request in candidates {
        let request_products = lines_by_request.remove(&request.id).unwrap_or_default();
        let recipient_type = recipient_types
            .get(&request.recipient_id)
            .and_then(|t| t.as_deref());
        if let Some((fulfilled_items, match_score)) = score_candidate(
            &details,
            &request,
            &request_products,
            recipient_type,
            now,
            cfg,
        ) {
            matches.push(RankedMatch {
                request,
                fulfilled_items,
                match_score,
            });
        }
    }

    // Stable sort keeps candidate order within equal scores
    matches.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    Ok(matches)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_scenario_canned_goods_match() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        let recipient = create_test_recipient(&db, "Shelter", None).await?;

        // Donation D: 100 units of Canned_Goods, expiring well out
        let donation = create_test_product_donation(
            &db,
            donor.id,
            "Canned stock",
            &[("Canned_Goods", 100)],
            10,
        )
        .await?;
        // Request R: 30 units of the same type
        let request = create_test_product_request(
            &db,
            recipient.id,
            "Need cans",
            &[("Canned_Goods", 30)],
            10,
        )
        .await?;

        let matches =
            match_donation_to_requests(&db, &test_tuning().matching, donation.donation.id).await?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].request.id, request.request.id);
        assert_eq!(
            matches[0].fulfilled_items,
            vec![FulfilledItem {
                product_id: Some(request.products[0].id),
                quantity: 30
            }]
        );
        assert!(matches[0].match_score >= 300);

        Ok(())
    }

    #[tokio::test]
    async fn test_no_type_overlap_is_excluded() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        let recipient = create_test_recipient(&db, "Shelter", None).await?;

        let donation =
            create_test_product_donation(&db, donor.id, "Cans", &[("Canned_Goods", 100)], 10)
                .await?;
        create_test_product_request(&db, recipient.id, "Need dairy", &[("Dairy", 10)], 10).await?;

        let matches =
            match_donation_to_requests(&db, &test_tuning().matching, donation.donation.id).await?;
        assert!(matches.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_expiry_and_recipient_bonuses() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        let relief = create_test_recipient(&db, "Relief Org", Some("relief")).await?;
        let welfare = create_test_recipient(&db, "Welfare Org", Some("social_welfare")).await?;
        let plain = create_test_recipient(&db, "Plain Org", None).await?;

        // Expires in 2 days: urgent (+50) and inside the relief window
        let donation =
            create_test_meal_donation(&db, donor.id, "Hot meals", 20, 2).await?;

        for recipient in [&relief, &welfare, &plain] {
            create_test_meal_request(&db, recipient.id, "Meals please", 20, 10).await?;
        }

        let matches =
            match_donation_to_requests(&db, &test_tuning().matching, donation.donation.id).await?;
        assert_eq!(matches.len(), 3);

        // Base 20 * 10 + 50 urgency = 250; relief +30, welfare +10, plain +0
        let score_for = |recipient_id: i64| {
            matches
                .iter()
                .find(|m| m.request.recipient_id == recipient_id)
                .unwrap()
                .match_score
        };
        assert_eq!(score_for(relief.id), 280);
        assert_eq!(score_for(welfare.id), 260);
        assert_eq!(score_for(plain.id), 250);
        assert_eq!(matches[0].request.recipient_id, relief.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_ordering_is_deterministic_and_ties_keep_candidate_order() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        let first = create_test_recipient(&db, "First", None).await?;
        let second = create_test_recipient(&db, "Second", None).await?;

        let donation =
            create_test_meal_donation(&db, donor.id, "Meals", 50, 10).await?;
        let request_a = create_test_meal_request(&db, first.id, "A", 30, 10).await?;
        let request_b = create_test_meal_request(&db, second.id, "B", 30, 10).await?;

        let run = match_donation_to_requests(&db, &test_tuning().matching, donation.donation.id)
            .await?;
        // Equal scores: candidate (insertion) order wins
        assert_eq!(run[0].request.id, request_a.request.id);
        assert_eq!(run[1].request.id, request_b.request.id);

        for _ in 0..3 {
            let again =
                match_donation_to_requests(&db, &test_tuning().matching, donation.donation.id)
                    .await?;
            let ids: Vec<i64> = again.iter().map(|m| m.request.id).collect();
            assert_eq!(ids, vec![request_a.request.id, request_b.request.id]);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_expired_and_nonpending_requests_excluded() -> Result<()> {
        let db = setup_test_db().await?;
        let donor = create_test_donor(&db, "Market").await?;
        let recipient = create_test_recipient(&db, "Shelter", None).await?;

        let donation =
            create_test_meal_donation(&db, donor.id, "Meals", 50, 10).await?;
        let fulfilled = create_test_meal_request(&db, recipient.id, "Old", 10, 10).await?;

        // Mark the request fulfilled; it must drop out of the candidate set
        let mut active: request_need::ActiveModel = fulfilled.request.into();
        active.status = sea_orm::Set(RequestStatus::Fulfilled);
        active.update(&db).await?;

        let matches =
            match_donation_to_requests(&db, &test_tuning().matching, donation.donation.id).await?;
        assert!(matches.is_empty());

        Ok(())
    }
}
