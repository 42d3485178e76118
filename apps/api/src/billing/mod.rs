pub mod checkout;
pub mod handlers;
pub mod metering;
pub mod plans;
pub mod reconciler;
pub mod stripe_client;
pub mod webhook;
