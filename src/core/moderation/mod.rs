// Core moderation module - attachment inspection pipeline.
// Following the same pattern as the policy module.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
