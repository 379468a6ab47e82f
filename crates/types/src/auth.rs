// crates/types/src/auth.rs
//! Shared bearer-credential store.
//!
//! Token issuance is out of scope; this is only the cell both the HTTP
//! client and the live channel read from. A 401 anywhere clears it, which
//! is how the rest of the app learns re-authentication is needed.

use std::sync::{Arc, RwLock};

/// Cloneable handle to the process-wide bearer credential.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(token.into()),
            Err(e) => tracing::error!("token store lock poisoned on set: {e}"),
        }
    }

    /// Drop the stored credential. Called on any 401 response.
    pub fn clear(&self) {
        match self.inner.write() {
            Ok(mut guard) => *guard = None,
            Err(e) => tracing::error!("token store lock poisoned on clear: {e}"),
        }
    }

    pub fn get(&self) -> Option<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                tracing::error!("token store lock poisoned on read: {e}");
                None
            }
        }
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let store = TokenStore::default();
        let other = store.clone();

        store.set("abc");
        assert_eq!(other.get().as_deref(), Some("abc"));

        other.clear();
        assert!(!store.is_present());
    }
}
