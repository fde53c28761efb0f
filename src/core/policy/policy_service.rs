// Policy service - cached, durable per-guild policy access.
//
// The in-memory cache is the source of truth for the process lifetime; the
// store holds the durable copy. Reads and read-modify-writes for one guild
// are serialized behind a per-guild lock so racing commands cannot lose an
// update. Distinct guilds never block each other.
//
// NO Discord dependencies here - just pure domain logic over the store port.

use super::policy_models::{decode_policy, encode_policy, GuildPolicy, PolicyDataError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PolicyStoreError {
    /// The durable store could not be reached. Not retried at this layer.
    #[error("Policy store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Policy store error: {0}")]
    Store(#[from] PolicyStoreError),

    /// The stored document for this guild cannot be decoded. Fatal for this
    /// guild's access, not process-wide.
    #[error("Corrupt policy for guild {guild_id}: {source}")]
    Corrupt {
        guild_id: u64,
        #[source]
        source: PolicyDataError,
    },
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Durable key-value document store, one string document per guild.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Load the stored document for a guild, if any.
    async fn load(&self, guild_id: u64) -> Result<Option<String>, PolicyStoreError>;

    /// Write the full document for a guild (replace, not merge).
    async fn save(&self, guild_id: u64, document: &str) -> Result<(), PolicyStoreError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct PolicyService<S: PolicyStore> {
    store: S,
    cache: DashMap<u64, GuildPolicy>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl<S: PolicyStore> PolicyService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn guild_lock(&self, guild_id: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Get the policy for a guild.
    ///
    /// Cache hit returns the cached value. On a miss the stored document is
    /// decoded and cached; if no document exists a default policy is
    /// persisted durably first, then cached and returned.
    pub async fn get(&self, guild_id: u64) -> Result<GuildPolicy, PolicyError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;
        self.get_locked(guild_id).await
    }

    /// Replace the policy for a guild, both cached and durable.
    ///
    /// Full replace, not a field-level merge. Callers that change a single
    /// field should use [`update`](Self::update) instead.
    pub async fn set(&self, guild_id: u64, policy: GuildPolicy) -> Result<(), PolicyError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;
        self.persist_locked(guild_id, &policy).await?;
        self.cache.insert(guild_id, policy);
        Ok(())
    }

    /// Read-modify-write under the guild's lock, so two racing commands
    /// cannot overwrite each other's change. Returns the updated policy.
    pub async fn update<F>(&self, guild_id: u64, mutate: F) -> Result<GuildPolicy, PolicyError>
    where
        F: FnOnce(&mut GuildPolicy),
    {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let mut policy = self.get_locked(guild_id).await?;
        mutate(&mut policy);
        self.persist_locked(guild_id, &policy).await?;
        self.cache.insert(guild_id, policy.clone());
        Ok(policy)
    }

    /// Must be called with the guild's lock held.
    async fn get_locked(&self, guild_id: u64) -> Result<GuildPolicy, PolicyError> {
        if let Some(policy) = self.cache.get(&guild_id) {
            return Ok(policy.clone());
        }

        let policy = match self.store.load(guild_id).await? {
            Some(document) => decode_policy(&document)
                .map_err(|source| PolicyError::Corrupt { guild_id, source })?,
            None => {
                let policy = GuildPolicy::default();
                // Persist before returning so a first read leaves a record.
                self.persist_locked(guild_id, &policy).await?;
                policy
            }
        };

        self.cache.insert(guild_id, policy.clone());
        Ok(policy)
    }

    async fn persist_locked(&self, guild_id: u64, policy: &GuildPolicy) -> Result<(), PolicyError> {
        let document =
            encode_policy(policy).map_err(|source| PolicyError::Corrupt { guild_id, source })?;
        self.store.save(guild_id, &document).await?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
