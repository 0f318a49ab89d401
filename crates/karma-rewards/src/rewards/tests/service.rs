use super::common::*;
use std::sync::Arc;

use crate::rewards::domain::DecisionStatus;
use crate::rewards::service::{RewardRequest, RewardService, RewardServiceError};
use crate::rewards::store::StoreError;
use crate::rewards::validation::ValidationError;

#[tokio::test]
async fn check_persists_granted_reward() {
    let store = Arc::new(MemoryStore::default());
    let service = build_service(store.clone(), 0.95);

    let decision = service.check(&streak_request(), today()).await.expect("decision");

    assert!(decision.granted);
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, USER);
    assert_eq!(records[0].date, decision_date());
    assert_eq!(records[0].box_type, "streak_engager");
    assert_eq!(Some(records[0].rarity), decision.rarity);
    assert_eq!(records[0].karma, decision.karma);
}

#[tokio::test]
async fn second_request_for_same_day_is_already_rewarded() {
    let store = Arc::new(MemoryStore::default());
    let service = build_service(store.clone(), 0.95);

    let first = service.check(&streak_request(), today()).await.expect("first");
    let second = service.check(&streak_request(), today()).await.expect("second");

    assert!(first.granted);
    assert!(!second.granted);
    assert_eq!(second.status, DecisionStatus::AlreadyReceived);
    assert_eq!(second.reason, "already rewarded");
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn dedup_check_skips_the_scorer() {
    let store = Arc::new(MemoryStore::default());
    let scorer = Arc::new(FixedScorer::new(0.95));
    let service = RewardService::new(Arc::new(engine_with_scorer(scorer.clone())), store);

    service.check(&streak_request(), today()).await.expect("first");
    service.check(&streak_request(), today()).await.expect("second");

    assert_eq!(scorer.calls(), 1);
}

#[tokio::test]
async fn denied_decisions_are_not_persisted() {
    let store = Arc::new(MemoryStore::default());
    let service = build_service(store.clone(), 0.2);

    let decision = service.check(&streak_request(), today()).await.expect("decision");

    assert_eq!(decision.status, DecisionStatus::Missed);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn future_date_is_rejected_before_the_engine_runs() {
    let store = Arc::new(MemoryStore::default());
    let scorer = Arc::new(FixedScorer::new(0.95));
    let service = RewardService::new(Arc::new(engine_with_scorer(scorer.clone())), store.clone());
    let request = RewardRequest {
        date: "2025-06-13".to_string(),
        ..streak_request()
    };

    match service.check(&request, today()).await {
        Err(RewardServiceError::Validation(ValidationError::FutureDate { .. })) => {}
        other => panic!("expected future date rejection, got {other:?}"),
    }
    assert_eq!(scorer.calls(), 0);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn malformed_date_is_a_validation_error() {
    let service = build_service(Arc::new(MemoryStore::default()), 0.95);
    let request = RewardRequest {
        date: "11/06/2025".to_string(),
        ..streak_request()
    };

    let err = service.check(&request, today()).await.expect_err("bad date");
    assert!(matches!(
        err,
        RewardServiceError::Validation(ValidationError::InvalidDate(_))
    ));
}

#[tokio::test]
async fn blank_user_id_is_a_validation_error() {
    let service = build_service(Arc::new(MemoryStore::default()), 0.95);
    let request = RewardRequest {
        user_id: "   ".to_string(),
        ..streak_request()
    };

    let err = service.check(&request, today()).await.expect_err("blank user");
    assert!(matches!(
        err,
        RewardServiceError::Validation(ValidationError::EmptyUserId)
    ));
}

#[tokio::test]
async fn lost_uniqueness_race_reports_already_rewarded() {
    let service = build_service(Arc::new(ConflictStore), 0.95);

    let decision = service.check(&streak_request(), today()).await.expect("decision");

    assert!(!decision.granted);
    assert_eq!(decision.status, DecisionStatus::AlreadyReceived);
    assert_eq!(decision.karma, 0);
}

#[tokio::test]
async fn store_outage_propagates() {
    let service = build_service(Arc::new(UnavailableStore), 0.95);

    let err = service.check(&streak_request(), today()).await.expect_err("store down");
    assert!(matches!(
        err,
        RewardServiceError::Store(StoreError::Unavailable(_))
    ));
}

#[tokio::test]
async fn rewarded_users_lists_grants_for_the_day() {
    let store = Arc::new(MemoryStore::default());
    let service = build_service(store, 0.95);
    for user in ["user_b", "user_a"] {
        let request = RewardRequest {
            user_id: user.to_string(),
            ..streak_request()
        };
        service.check(&request, today()).await.expect("decision");
    }

    let users = service
        .rewarded_users(&decision_date().to_string())
        .await
        .expect("listing");
    assert_eq!(users, vec!["user_a".to_string(), "user_b".to_string()]);
    assert!(service
        .rewarded_users("2025-06-10")
        .await
        .expect("listing")
        .is_empty());
}

#[tokio::test]
async fn prune_expired_drops_grants_outside_retention() {
    let store = Arc::new(MemoryStore::default());
    let service = build_service(store.clone(), 0.95);
    service.check(&streak_request(), today()).await.expect("grant");

    let kept = service.prune_expired(today(), 1).await.expect("prune");
    assert_eq!(kept, 0);
    assert_eq!(store.records().len(), 1);

    let removed = service.prune_expired(today(), 0).await.expect("prune");
    assert_eq!(removed, 1);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn prune_surfaces_store_outage() {
    let service = build_service(Arc::new(UnavailableStore), 0.95);

    let err = service
        .prune_expired(today(), 30)
        .await
        .expect_err("store down");
    assert!(matches!(
        err,
        RewardServiceError::Store(StoreError::Unavailable(_))
    ));
}
