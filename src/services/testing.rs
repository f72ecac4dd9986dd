//! In-memory doubles for the dispatch pipeline, used by service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{
    review_request::{CreateReviewRequestData, CLAIM_TTL_MINUTES},
    Channel, Location, ReviewRequest, ReviewStatus, ReviewTemplate, User,
};
use crate::services::delivery::{DeliveryAdapter, DeliveryError, DeliveryReceipt, OutboundMessage};
use crate::services::dispatcher::DispatchStore;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    locations: HashMap<Uuid, Location>,
    templates: HashMap<Uuid, ReviewTemplate>,
    requests: HashMap<Uuid, ReviewRequest>,
    finish_calls: HashMap<Uuid, usize>,
    integration_sends: HashMap<Uuid, usize>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, business_name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: "owner@example.com".to_string(),
            business_name: Some(business_name.to_string()),
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().users.insert(user.id, user.clone());
        user
    }

    pub fn add_location(&self, owner_id: Uuid, google_place_id: Option<&str>) -> Location {
        let location = Location {
            id: Uuid::new_v4(),
            owner_id,
            name: "Joe's Diner Downtown".to_string(),
            address: None,
            google_place_id: google_place_id.map(str::to_string),
            yelp_business_id: None,
            facebook_page_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .locations
            .insert(location.id, location.clone());
        location
    }

    pub fn add_template(
        &self,
        owner_id: Uuid,
        kind: Channel,
        content: &str,
        is_default: bool,
    ) -> ReviewTemplate {
        let template = ReviewTemplate {
            id: Uuid::new_v4(),
            owner_id,
            name: "Test template".to_string(),
            kind,
            subject: None,
            content: content.to_string(),
            is_default,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .templates
            .insert(template.id, template.clone());
        template
    }

    pub fn request_data(
        &self,
        owner_id: Uuid,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> CreateReviewRequestData {
        CreateReviewRequestData {
            owner_id,
            customer_name: "Ana".to_string(),
            customer_email: email.map(str::to_string),
            customer_phone: phone.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn add_request(
        &self,
        owner_id: Uuid,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> ReviewRequest {
        let request = new_request(self.request_data(owner_id, email, phone));
        self.state
            .lock()
            .unwrap()
            .requests
            .insert(request.id, request.clone());
        request
    }

    pub fn request(&self, id: Uuid) -> ReviewRequest {
        self.state.lock().unwrap().requests[&id].clone()
    }

    pub fn requests(&self) -> Vec<ReviewRequest> {
        self.state.lock().unwrap().requests.values().cloned().collect()
    }

    pub fn finish_calls(&self, id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .finish_calls
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn integration_sends(&self, id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .integration_sends
            .get(&id)
            .copied()
            .unwrap_or(0)
    }
}

fn new_request(data: CreateReviewRequestData) -> ReviewRequest {
    ReviewRequest {
        id: Uuid::new_v4(),
        owner_id: data.owner_id,
        location_id: data.location_id,
        customer_name: data.customer_name,
        customer_email: data.customer_email,
        customer_phone: data.customer_phone,
        template_id: data.template_id,
        status: ReviewStatus::Pending,
        dispatch_claimed_at: None,
        created_at: Utc::now(),
        sent_at: None,
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn find_request(&self, id: Uuid) -> Result<Option<ReviewRequest>, sqlx::Error> {
        Ok(self.state.lock().unwrap().requests.get(&id).cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<Location>, sqlx::Error> {
        Ok(self.state.lock().unwrap().locations.get(&id).cloned())
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<ReviewTemplate>, sqlx::Error> {
        Ok(self.state.lock().unwrap().templates.get(&id).cloned())
    }

    async fn find_default_template(
        &self,
        owner_id: Uuid,
        kind: Channel,
    ) -> Result<Option<ReviewTemplate>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .templates
            .values()
            .find(|t| t.owner_id == owner_id && t.kind == kind && t.is_default)
            .cloned())
    }

    async fn create_request(
        &self,
        data: CreateReviewRequestData,
    ) -> Result<ReviewRequest, sqlx::Error> {
        let request = new_request(data);
        self.state
            .lock()
            .unwrap()
            .requests
            .insert(request.id, request.clone());
        Ok(request)
    }

    async fn claim_request(&self, id: Uuid) -> Result<Option<ReviewRequest>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(request) = state.requests.get_mut(&id) else {
            return Ok(None);
        };
        let abandoned_before = Utc::now() - Duration::minutes(i64::from(CLAIM_TTL_MINUTES));
        let held = request
            .dispatch_claimed_at
            .is_some_and(|claimed_at| claimed_at >= abandoned_before);
        if !request.status.is_dispatchable() || held {
            return Ok(None);
        }
        request.dispatch_claimed_at = Some(Utc::now());
        Ok(Some(request.clone()))
    }

    async fn finish_request(
        &self,
        id: Uuid,
        status: ReviewStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<ReviewRequest, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        *state.finish_calls.entry(id).or_default() += 1;

        let request = state.requests.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
        request.status = status;
        if sent_at.is_some() {
            request.sent_at = sent_at;
        }
        request.dispatch_claimed_at = None;
        Ok(request.clone())
    }

    async fn record_integration_send(&self, integration_id: Uuid) -> Result<(), sqlx::Error> {
        *self
            .state
            .lock()
            .unwrap()
            .integration_sends
            .entry(integration_id)
            .or_default() += 1;
        Ok(())
    }
}

/// Adapter that records every message and answers with a fixed outcome
pub struct MockAdapter {
    channel: Channel,
    succeed: bool,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MockAdapter {
    pub fn succeeding(channel: Channel) -> Self {
        Self {
            channel,
            succeed: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(channel: Channel) -> Self {
        Self {
            succeed: false,
            ..Self::succeeding(channel)
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryAdapter for MockAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        self.sent.lock().unwrap().push(message.clone());

        if self.succeed {
            Ok(DeliveryReceipt {
                provider: "mock",
                channel: self.channel,
                provider_message_id: Some("mock-1".to_string()),
                status_code: 202,
                response: None,
            })
        } else {
            Err(DeliveryError::Provider {
                provider: "mock",
                status: 503,
                body: "provider unavailable".to_string(),
            })
        }
    }
}
