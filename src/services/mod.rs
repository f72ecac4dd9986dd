// Services module - Business logic

pub mod contact_resolver;
pub mod crm_automation;
pub mod delivery;
pub mod dispatcher;
pub mod message_renderer;
pub mod webhook_verifier;

#[cfg(test)]
pub(crate) mod testing;
