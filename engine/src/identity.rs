//! Identity collaborator
//!
//! The engine only needs a stable user id string, or none while signed
//! out. Identity changes are observable so the tracker can tear down and
//! reopen remote subscriptions.

use tokio::sync::watch;
use tracing::info;

/// Holds the current identity and notifies watchers on change.
#[derive(Debug)]
pub struct IdentityProvider {
    tx: watch::Sender<Option<String>>,
}

impl IdentityProvider {
    pub fn new(initial: Option<String>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current user id, or `None` while unauthenticated.
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!(user = %user_id, "identity signed in");
        self.tx.send_replace(Some(user_id));
    }

    pub fn sign_out(&self) {
        info!("identity signed out");
        self.tx.send_replace(None);
    }

    /// Watch for identity changes.
    pub fn watch(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity_changes_are_observable() {
        let identity = IdentityProvider::new(None);
        assert_eq!(identity.current(), None);

        let mut rx = identity.watch();
        identity.sign_in("user-1");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_deref(), Some("user-1"));
        assert_eq!(identity.current(), Some("user-1".to_string()));

        identity.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), None);
    }
}
