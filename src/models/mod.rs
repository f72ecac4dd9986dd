// Models module - Database entity representations

pub mod crm_integration;
pub mod location;
pub mod review_request;
pub mod review_template;
pub mod user;
pub mod webhook_event;

pub use crm_integration::CrmIntegration;
pub use location::Location;
pub use review_request::{ReviewRequest, ReviewStatus};
pub use review_template::{Channel, ReviewTemplate};
pub use user::User;
pub use webhook_event::WebhookEvent;
