//! Authentication state broadcast
//!
//! Independently-owned parts of the client (composer, comment thread, CLI)
//! learn about sign-in transitions by subscribing here. Every subscription
//! returns a [`Subscription`] guard; dropping it unsubscribes.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

/// An authentication state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Credentials were stored and verified
    SignedIn {
        /// Username the credentials belong to
        username: String,
    },
    /// Credentials were removed
    SignedOut,
    /// The server rejected the stored credentials
    SessionExpired,
}

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Publish-subscribe hub for [`AuthEvent`]s
#[derive(Clone, Default)]
pub struct AuthEvents {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for AuthEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEvents")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthEvents {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide hub
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<AuthEvents> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Register a listener; it stays registered while the guard lives
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl Fn(&AuthEvent) + Send + Sync + 'static) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every current listener
    ///
    /// Listeners run outside the registry lock, so a listener may subscribe
    /// or drop subscriptions while handling an event.
    pub fn emit(&self, event: &AuthEvent) {
        let listeners: Vec<Listener> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        tracing::debug!("Auth event {:?} to {} listener(s)", event, listeners.len());
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Handle for one listener registration
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribe now (same as dropping the guard)
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
