// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "policy/mod.rs"]
pub mod policy;

#[path = "moderation/mod.rs"]
pub mod moderation;
