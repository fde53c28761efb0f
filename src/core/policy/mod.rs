// Core policy module - per-guild moderation configuration.
// Models hold the pure domain types; the service owns the cache and the
// durable store port.

pub mod policy_models;
pub mod policy_service;

pub use policy_models::*;
pub use policy_service::*;
