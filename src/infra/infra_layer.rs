// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "policy/sqlite_policy_store.rs"]
pub mod policy;

#[path = "moderation/mod.rs"]
pub mod moderation;
