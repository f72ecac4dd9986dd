//! Dispatch claim and finish queries against a real Postgres schema.

use chrono::Utc;
use reviewdesk::models::{review_request::CreateReviewRequestData, ReviewRequest, ReviewStatus};
use sqlx::PgPool;
use uuid::Uuid;

async fn create_request(pool: &PgPool) -> ReviewRequest {
    let owner_id = sqlx::query_scalar::<_, Uuid>(
        r#"INSERT INTO users (email, business_name) VALUES ($1, 'Joe''s Diner') RETURNING id"#,
    )
    .bind(format!("{}@example.com", Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .expect("failed to create owner");

    ReviewRequest::create(
        pool,
        CreateReviewRequestData {
            owner_id,
            customer_name: "Ana".to_string(),
            customer_email: Some("ana@example.com".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("failed to create request")
}

async fn backdate_claim(pool: &PgPool, id: Uuid, minutes: i32) {
    sqlx::query(
        r#"
        UPDATE review_requests
        SET dispatch_claimed_at = NOW() - make_interval(mins => $2)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(minutes)
    .execute(pool)
    .await
    .expect("failed to backdate claim");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_second_claim_is_refused(pool: PgPool) {
    let request = create_request(&pool).await;
    assert_eq!(request.status, ReviewStatus::Pending);

    let claimed = ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .expect("pending request should be claimable");
    assert!(claimed.dispatch_claimed_at.is_some());

    assert!(ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_sent_request_cannot_be_claimed(pool: PgPool) {
    let request = create_request(&pool).await;
    ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .unwrap();

    let finished =
        ReviewRequest::finish_dispatch(&pool, request.id, ReviewStatus::Sent, Some(Utc::now()))
            .await
            .unwrap();
    assert_eq!(finished.status, ReviewStatus::Sent);
    assert!(finished.sent_at.is_some());
    assert!(finished.dispatch_claimed_at.is_none());

    assert!(ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .is_none());

    // Not even once a stale claim would otherwise be taken over
    backdate_claim(&pool, request.id, 60).await;
    assert!(ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_request_is_claimable_again(pool: PgPool) {
    let request = create_request(&pool).await;
    ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .unwrap();

    let finished = ReviewRequest::finish_dispatch(&pool, request.id, ReviewStatus::Failed, None)
        .await
        .unwrap();
    assert_eq!(finished.status, ReviewStatus::Failed);
    assert!(finished.sent_at.is_none());
    assert!(finished.dispatch_claimed_at.is_none());

    assert!(ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_abandoned_claim_is_taken_over(pool: PgPool) {
    let request = create_request(&pool).await;
    ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .unwrap();

    // Still within the TTL
    backdate_claim(&pool, request.id, 5).await;
    assert!(ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .is_none());

    backdate_claim(&pool, request.id, 11).await;
    let retaken = ReviewRequest::claim_for_dispatch(&pool, request.id)
        .await
        .unwrap()
        .expect("claim past the TTL should be retaken");

    let age = Utc::now() - retaken.dispatch_claimed_at.unwrap();
    assert!(age.num_minutes() < 1);
}
