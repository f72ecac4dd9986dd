//! Default-template invariant against a real Postgres schema.

use reviewdesk::error::AppError;
use reviewdesk::models::{
    review_template::{CreateTemplateData, UpdateTemplateData},
    Channel, ReviewTemplate,
};
use sqlx::PgPool;
use uuid::Uuid;

async fn create_owner(pool: &PgPool) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        r#"INSERT INTO users (email, business_name) VALUES ($1, 'Joe''s Diner') RETURNING id"#,
    )
    .bind(format!("{}@example.com", Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .expect("failed to create owner")
}

fn template(owner_id: Uuid, kind: Channel, name: &str, is_default: bool) -> CreateTemplateData {
    CreateTemplateData {
        owner_id,
        name: name.to_string(),
        kind,
        subject: None,
        content: "Hi {{customerName}}, review us: {{reviewLink}}".to_string(),
        is_default,
    }
}

async fn default_ids(pool: &PgPool, owner_id: Uuid, kind: Channel) -> Vec<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"SELECT id FROM review_templates WHERE owner_id = $1 AND type = $2 AND is_default"#,
    )
    .bind(owner_id)
    .bind(kind)
    .fetch_all(pool)
    .await
    .expect("failed to read defaults")
}

#[sqlx::test(migrations = "./migrations")]
async fn test_creating_second_default_replaces_first(pool: PgPool) {
    let owner = create_owner(&pool).await;

    let first = ReviewTemplate::create(&pool, template(owner, Channel::Email, "First", true))
        .await
        .unwrap();
    let second = ReviewTemplate::create(&pool, template(owner, Channel::Email, "Second", true))
        .await
        .unwrap();

    assert_eq!(default_ids(&pool, owner, Channel::Email).await, vec![second.id]);

    let first = ReviewTemplate::find_by_id(&pool, first.id).await.unwrap().unwrap();
    assert!(!first.is_default);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_promoting_on_update_replaces_default(pool: PgPool) {
    let owner = create_owner(&pool).await;

    let first = ReviewTemplate::create(&pool, template(owner, Channel::Sms, "First", true))
        .await
        .unwrap();
    let second = ReviewTemplate::create(&pool, template(owner, Channel::Sms, "Second", false))
        .await
        .unwrap();
    assert_eq!(default_ids(&pool, owner, Channel::Sms).await, vec![first.id]);

    let updated = ReviewTemplate::update(
        &pool,
        second.id,
        UpdateTemplateData {
            is_default: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert!(updated.is_default);
    assert_eq!(default_ids(&pool, owner, Channel::Sms).await, vec![second.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_defaults_are_scoped_by_owner_and_type(pool: PgPool) {
    let owner = create_owner(&pool).await;
    let other = create_owner(&pool).await;

    let email = ReviewTemplate::create(&pool, template(owner, Channel::Email, "Email", true))
        .await
        .unwrap();
    let sms = ReviewTemplate::create(&pool, template(owner, Channel::Sms, "Sms", true))
        .await
        .unwrap();
    let foreign = ReviewTemplate::create(&pool, template(other, Channel::Email, "Other", true))
        .await
        .unwrap();

    assert_eq!(default_ids(&pool, owner, Channel::Email).await, vec![email.id]);
    assert_eq!(default_ids(&pool, owner, Channel::Sms).await, vec![sms.id]);
    assert_eq!(default_ids(&pool, other, Channel::Email).await, vec![foreign.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_second_default_bypassing_transaction_is_a_conflict(pool: PgPool) {
    let owner = create_owner(&pool).await;
    ReviewTemplate::create(&pool, template(owner, Channel::Email, "First", true))
        .await
        .unwrap();

    // What a racing create would hit after both passed the clear step
    let err = sqlx::query(
        r#"
        INSERT INTO review_templates (owner_id, name, type, content, is_default)
        VALUES ($1, 'Racer', 'email', 'Hi', TRUE)
        "#,
    )
    .bind(owner)
    .execute(&pool)
    .await
    .unwrap_err();

    assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    assert_eq!(default_ids(&pool, owner, Channel::Email).await.len(), 1);
}
