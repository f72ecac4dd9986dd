// API module - HTTP endpoints

pub mod crm_integrations;
pub mod health;
pub mod locations;
pub mod middleware;
pub mod review_requests;
pub mod review_templates;
pub mod webhooks;
