//! Anonymous visitor identity.

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::store::{KeyValueStore, keys};

/// Hands out the visitor's session key, creating it on first use.
#[derive(Clone)]
pub struct SessionKeyStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionKeyStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The persisted key, generated and saved the first time.
    pub fn get_or_create(&self) -> Result<String> {
        if let Some(key) = keys::SESSION_KEY
            .load(self.store.as_ref())
            .filter(|k| !k.trim().is_empty())
        {
            return Ok(key);
        }

        let key = uuid::Uuid::new_v4().to_string();
        keys::SESSION_KEY.save(self.store.as_ref(), &Some(key.clone()))?;
        info!(session_key = %key, "Created new session key");
        Ok(key)
    }

    /// The persisted key, without creating one.
    pub fn current(&self) -> Option<String> {
        keys::SESSION_KEY.load(self.store.as_ref())
    }
}
