use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    crm_integration::CrmIntegration, review_request::CreateReviewRequestData, ReviewRequest,
};
use crate::services::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};

#[derive(thiserror::Error, Debug)]
pub enum CrmTriggerError {
    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Event pushed by a CRM (or by the "test" button) for one customer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmEvent {
    #[serde(default)]
    pub event: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum SkipReason {
    Inactive,
    EventMismatch { expected: String, received: String },
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// Rule did not apply; nothing was created
    Skipped(SkipReason),
    /// Request created and left pending because the rule asks for a delay
    Queued(ReviewRequest),
    /// Request created and dispatched right away
    Dispatched(DispatchOutcome),
}

/// Applies an integration rule to an incoming CRM event
#[tracing::instrument(skip(dispatcher, integration, event), fields(integration_id = %integration.id))]
pub async fn trigger(
    dispatcher: &Dispatcher,
    integration: &CrmIntegration,
    event: CrmEvent,
) -> Result<TriggerOutcome, CrmTriggerError> {
    if !integration.active {
        tracing::debug!("Integration inactive, skipping event");
        return Ok(TriggerOutcome::Skipped(SkipReason::Inactive));
    }

    if !event
        .event
        .trim()
        .eq_ignore_ascii_case(integration.trigger_event.trim())
    {
        tracing::debug!(
            expected = %integration.trigger_event,
            received = %event.event,
            "Event does not match trigger"
        );
        return Ok(TriggerOutcome::Skipped(SkipReason::EventMismatch {
            expected: integration.trigger_event.clone(),
            received: event.event,
        }));
    }

    let request = create_request(dispatcher, integration, event).await?;

    if integration.delay_hours > 0 {
        tracing::info!(
            request_id = %request.id,
            delay_hours = integration.delay_hours,
            "Review request queued for manual send"
        );
        return Ok(TriggerOutcome::Queued(request));
    }

    let outcome = dispatcher.dispatch(request.id).await?;
    if outcome.is_success() {
        dispatcher
            .store()
            .record_integration_send(integration.id)
            .await?;
    }

    Ok(TriggerOutcome::Dispatched(outcome))
}

/// Runs the pipeline once for a test event, ignoring the rule's state, event and delay
pub async fn test_trigger(
    dispatcher: &Dispatcher,
    integration: &CrmIntegration,
    event: CrmEvent,
) -> Result<DispatchOutcome, CrmTriggerError> {
    let request = create_request(dispatcher, integration, event).await?;

    tracing::info!(
        integration_id = %integration.id,
        request_id = %request.id,
        "Dispatching CRM test request"
    );

    Ok(dispatcher.dispatch(request.id).await?)
}

async fn create_request(
    dispatcher: &Dispatcher,
    integration: &CrmIntegration,
    event: CrmEvent,
) -> Result<ReviewRequest, CrmTriggerError> {
    let customer_name = event.customer_name.trim().to_string();
    if customer_name.is_empty() {
        return Err(CrmTriggerError::Validation(
            "customerName is required".to_string(),
        ));
    }

    let store = dispatcher.store();

    if let Some(location_id) = event.location_id {
        let owned = store
            .find_location(location_id)
            .await?
            .is_some_and(|l| l.owner_id == integration.owner_id);
        if !owned {
            return Err(CrmTriggerError::Validation(format!(
                "Unknown location {}",
                location_id
            )));
        }
    }

    let request = store
        .create_request(CreateReviewRequestData {
            owner_id: integration.owner_id,
            location_id: event.location_id,
            customer_name,
            customer_email: event.customer_email,
            customer_phone: event.customer_phone,
            template_id: integration.template_id,
        })
        .await?;

    Ok(request)
}
