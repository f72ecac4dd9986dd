use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    crm_integration::CrmIntegration,
    review_request::CreateReviewRequestData,
    Channel, Location, ReviewRequest, ReviewStatus, ReviewTemplate, User,
};
use crate::services::contact_resolver::{self, ResolveError, ResolvedContact};
use crate::services::delivery::{DeliveryAdapters, DeliveryError, DeliveryReceipt, OutboundMessage};
use crate::services::message_renderer::{self, TemplateVars};

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Review request is {} and cannot be sent again", .0.as_str())]
    AlreadyDispatched(ReviewStatus),

    #[error(transparent)]
    Contact(#[from] ResolveError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Persistence the dispatch pipeline depends on
#[async_trait]
pub trait DispatchStore: Send + Sync {
    async fn find_request(&self, id: Uuid) -> Result<Option<ReviewRequest>, sqlx::Error>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn find_location(&self, id: Uuid) -> Result<Option<Location>, sqlx::Error>;

    async fn find_template(&self, id: Uuid) -> Result<Option<ReviewTemplate>, sqlx::Error>;

    async fn find_default_template(
        &self,
        owner_id: Uuid,
        kind: Channel,
    ) -> Result<Option<ReviewTemplate>, sqlx::Error>;

    async fn create_request(
        &self,
        data: CreateReviewRequestData,
    ) -> Result<ReviewRequest, sqlx::Error>;

    /// Conditional `pending|failed -> claimed`; `None` when the request cannot be claimed
    async fn claim_request(&self, id: Uuid) -> Result<Option<ReviewRequest>, sqlx::Error>;

    async fn finish_request(
        &self,
        id: Uuid,
        status: ReviewStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<ReviewRequest, sqlx::Error>;

    async fn record_integration_send(&self, integration_id: Uuid) -> Result<(), sqlx::Error>;
}

/// Postgres-backed store built on the model queries
#[derive(Clone)]
pub struct PgDispatchStore {
    pool: PgPool,
}

impl PgDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn find_request(&self, id: Uuid) -> Result<Option<ReviewRequest>, sqlx::Error> {
        ReviewRequest::find_by_id(&self.pool, id).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        User::find_by_id(&self.pool, id).await
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<Location>, sqlx::Error> {
        Location::find_by_id(&self.pool, id).await
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<ReviewTemplate>, sqlx::Error> {
        ReviewTemplate::find_by_id(&self.pool, id).await
    }

    async fn find_default_template(
        &self,
        owner_id: Uuid,
        kind: Channel,
    ) -> Result<Option<ReviewTemplate>, sqlx::Error> {
        ReviewTemplate::find_default(&self.pool, owner_id, kind).await
    }

    async fn create_request(
        &self,
        data: CreateReviewRequestData,
    ) -> Result<ReviewRequest, sqlx::Error> {
        ReviewRequest::create(&self.pool, data).await
    }

    async fn claim_request(&self, id: Uuid) -> Result<Option<ReviewRequest>, sqlx::Error> {
        ReviewRequest::claim_for_dispatch(&self.pool, id).await
    }

    async fn finish_request(
        &self,
        id: Uuid,
        status: ReviewStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<ReviewRequest, sqlx::Error> {
        ReviewRequest::finish_dispatch(&self.pool, id, status, sent_at).await
    }

    async fn record_integration_send(&self, integration_id: Uuid) -> Result<(), sqlx::Error> {
        CrmIntegration::record_send(&self.pool, integration_id).await
    }
}

/// Result of one dispatch attempt that reached the delivery stage.
///
/// `result` is `Err` when the attempt failed; the request is then `failed`.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub request: ReviewRequest,
    pub result: Result<DeliveryReceipt, DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Resolves, renders and delivers review requests
pub struct Dispatcher {
    store: Arc<dyn DispatchStore>,
    adapters: DeliveryAdapters,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn DispatchStore>, adapters: DeliveryAdapters) -> Self {
        Self { store, adapters }
    }

    pub fn store(&self) -> &Arc<dyn DispatchStore> {
        &self.store
    }

    /// Sends one review request.
    ///
    /// `Err` means nothing was attempted and the request is unchanged (missing
    /// request or owner, or the request is not claimable). Otherwise exactly one
    /// delivery attempt was made and the status was written once: `sent` with
    /// `sent_at` on success, `failed` on any error.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&self, request_id: Uuid) -> Result<DispatchOutcome, DispatchError> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(DispatchError::NotFound("Review request"))?;

        let owner = self
            .store
            .find_user(request.owner_id)
            .await?
            .ok_or(DispatchError::NotFound("Owner"))?;

        let Some(claimed) = self.store.claim_request(request_id).await? else {
            tracing::warn!(status = request.status.as_str(), "Review request is not claimable");
            return Err(DispatchError::AlreadyDispatched(request.status));
        };

        let result = self.deliver(&claimed, &owner).await;

        let (status, sent_at) = match &result {
            Ok(_) => (ReviewStatus::Sent, Some(Utc::now())),
            Err(_) => (ReviewStatus::Failed, None),
        };
        let request = self.store.finish_request(request_id, status, sent_at).await?;

        match &result {
            Ok(receipt) => tracing::info!(
                provider = receipt.provider,
                channel = %receipt.channel,
                "Review request sent"
            ),
            Err(e) => tracing::warn!(error = %e, "Review request failed"),
        }

        Ok(DispatchOutcome { request, result })
    }

    async fn deliver(
        &self,
        request: &ReviewRequest,
        owner: &User,
    ) -> Result<DeliveryReceipt, DispatchError> {
        let location = match request.location_id {
            Some(id) => self
                .store
                .find_location(id)
                .await?
                .filter(|l| l.owner_id == request.owner_id),
            None => None,
        };

        let business_name = owner.display_business_name();
        let contact = contact_resolver::resolve(request, business_name, location.as_ref())?;
        let template = self.select_template(request, contact.channel).await?;
        let message = compose(
            template.as_ref(),
            &contact,
            business_name,
            location.as_ref(),
        );

        Ok(self.adapters.deliver(&message).await?)
    }

    /// Explicit template if it belongs to the owner and matches the channel,
    /// then the owner's default for the channel. `None` selects the built-in text.
    async fn select_template(
        &self,
        request: &ReviewRequest,
        channel: Channel,
    ) -> Result<Option<ReviewTemplate>, sqlx::Error> {
        if let Some(template_id) = request.template_id {
            match self.store.find_template(template_id).await? {
                Some(t) if t.owner_id == request.owner_id && t.kind == channel => {
                    return Ok(Some(t))
                }
                Some(t) => tracing::warn!(
                    template_id = %t.id,
                    template_type = %t.kind,
                    channel = %channel,
                    "Template does not fit this request, using default"
                ),
                None => tracing::warn!(%template_id, "Template not found, using default"),
            }
        }

        self.store
            .find_default_template(request.owner_id, channel)
            .await
    }
}

/// Renders the message for a resolved contact
pub fn compose(
    template: Option<&ReviewTemplate>,
    contact: &ResolvedContact,
    business_name: &str,
    location: Option<&Location>,
) -> OutboundMessage {
    let (fallback_subject, fallback_content) = message_renderer::fallback_template(contact.channel);
    let (subject, content) = match template {
        Some(t) => (t.subject.as_deref().or(fallback_subject), t.content.as_str()),
        None => (fallback_subject, fallback_content),
    };

    let vars = message_renderer::standard_vars(
        &contact.recipient_label,
        business_name,
        &contact.review_link,
        location.map(|l| l.name.as_str()),
    );
    warn_unresolved(content, &vars);

    let body = message_renderer::render(content, &vars);

    match contact.channel {
        Channel::Email => {
            let subject = subject.unwrap_or(message_renderer::DEFAULT_EMAIL_SUBJECT);
            warn_unresolved(subject, &vars);

            OutboundMessage {
                channel: Channel::Email,
                to: contact.destination.clone(),
                recipient_name: Some(contact.recipient_label.clone()),
                subject: Some(message_renderer::render(subject, &vars)),
                text_body: Some(message_renderer::strip_tags(&body)),
                body,
            }
        }
        Channel::Sms => OutboundMessage {
            channel: Channel::Sms,
            to: contact.destination.clone(),
            recipient_name: Some(contact.recipient_label.clone()),
            subject: None,
            body,
            text_body: None,
        },
    }
}

fn warn_unresolved(template: &str, vars: &TemplateVars) {
    let unresolved = message_renderer::unresolved_placeholders(template, vars);
    if !unresolved.is_empty() {
        tracing::warn!(placeholders = ?unresolved, "Template has unresolved placeholders");
    }
}
