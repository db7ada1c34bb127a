use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};

use crate::models::Identity;

/// Session
///
/// Who is signed in, as far as the identity backend has told us. A session
/// starts out resolving and settles on the first notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
    resolving: bool,
}

impl Session {
    pub fn resolving() -> Self {
        Self {
            identity: None,
            resolving: true,
        }
    }

    pub fn resolved(identity: Option<Identity>) -> Self {
        Self {
            identity,
            resolving: false,
        }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self::resolved(Some(identity))
    }

    pub fn anonymous() -> Self {
        Self::resolved(None)
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}

// --- Identity Backend Contract ---

/// Receives every session change: `Some` when signed in, `None` when signed out.
pub type IdentityListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Subscription
///
/// Handle to a live listener registration. The listener is released exactly
/// once, on `unsubscribe` or when the handle is dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// IdentityBackend
///
/// The identity provider's session-change feed. Implementations call the
/// listener once the current state is known and again on every change.
pub trait IdentityBackend: Send + Sync {
    fn subscribe(&self, listener: IdentityListener) -> Subscription;
}

/// BroadcastIdentityBackend
///
/// In-process identity feed. Whatever is `publish`ed fans out to every live
/// listener; a listener that subscribes after a publish is replayed the latest
/// state straight away, the way hosted auth SDKs report the restored session.
///
/// Every notification is numbered and a listener never sees an older one after
/// a newer one, even when a replay races a publish. A listener must not
/// publish from inside its own callback.
#[derive(Clone, Default)]
pub struct BroadcastIdentityBackend {
    inner: Arc<BroadcastInner>,
}

#[derive(Default)]
struct BroadcastInner {
    next_id: AtomicU64,
    feed: Mutex<Feed>,
}

#[derive(Default)]
struct Feed {
    seq: u64,
    latest: Option<Option<Identity>>,
    listeners: HashMap<u64, Arc<Delivery>>,
}

/// One registered listener and the newest notification it has been given.
struct Delivery {
    listener: IdentityListener,
    delivered: Mutex<u64>,
}

impl Delivery {
    fn new(listener: IdentityListener) -> Self {
        Self {
            listener,
            delivered: Mutex::new(0),
        }
    }

    fn deliver(&self, seq: u64, identity: Option<Identity>) {
        let mut delivered = lock(&self.delivered);
        if seq > *delivered {
            *delivered = seq;
            (self.listener)(identity);
        }
    }
}

impl BroadcastIdentityBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, identity: Option<Identity>) {
        let (seq, deliveries) = {
            let mut feed = lock(&self.inner.feed);
            feed.seq += 1;
            feed.latest = Some(identity.clone());
            let deliveries: Vec<Arc<Delivery>> = feed.listeners.values().cloned().collect();
            (feed.seq, deliveries)
        };

        // Call outside the feed lock so a listener may subscribe or unsubscribe.
        for delivery in deliveries {
            delivery.deliver(seq, identity.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.feed).listeners.len()
    }
}

impl IdentityBackend for BroadcastIdentityBackend {
    fn subscribe(&self, listener: IdentityListener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let delivery = Arc::new(Delivery::new(listener));

        let replay = {
            let mut feed = lock(&self.inner.feed);
            feed.listeners.insert(id, Arc::clone(&delivery));
            let seq = feed.seq;
            feed.latest.clone().map(|identity| (seq, identity))
        };
        if let Some((seq, identity)) = replay {
            delivery.deliver(seq, identity);
        }

        let inner: Weak<BroadcastInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                lock(&inner.feed).listeners.remove(&id);
            }
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// --- Session Provider ---

/// SessionProvider
///
/// Owns the current `Session`. Holds exactly one backend subscription from
/// `start` until `stop` (or drop). Readers take a snapshot with `session` or
/// follow changes through `watch`.
pub struct SessionProvider {
    state: Arc<watch::Sender<Session>>,
    subscription: Option<Subscription>,
    resolve_timer: Option<JoinHandle<()>>,
}

impl SessionProvider {
    pub fn start(backend: &dyn IdentityBackend) -> Self {
        Self::start_with_timeout(backend, None)
    }

    /// Like `start`, but gives up waiting for the first notification after
    /// `resolve_timeout` and settles the session as signed out. A later
    /// notification still updates it. With a timeout this must run inside a
    /// tokio runtime.
    pub fn start_with_timeout(backend: &dyn IdentityBackend, resolve_timeout: Option<Duration>) -> Self {
        let (sender, _) = watch::channel(Session::resolving());
        let state = Arc::new(sender);

        let listener_state = Arc::clone(&state);
        let listener: IdentityListener = Arc::new(move |identity: Option<Identity>| {
            listener_state.send_modify(|session| {
                if session.resolving {
                    tracing::info!(authenticated = identity.is_some(), "session resolved");
                } else {
                    tracing::debug!(authenticated = identity.is_some(), "session changed");
                }
                *session = Session::resolved(identity);
            });
        });
        let subscription = backend.subscribe(listener);

        let resolve_timer = resolve_timeout.map(|timeout| {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let expired = state.send_if_modified(|session| {
                    if session.resolving {
                        *session = Session::anonymous();
                        true
                    } else {
                        false
                    }
                });
                if expired {
                    tracing::warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "identity backend did not report a session in time; treating visitor as signed out"
                    );
                }
            })
        });

        Self {
            state,
            subscription: Some(subscription),
            resolve_timer,
        }
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Waits until the session has settled and returns it.
    pub async fn resolved(&self) -> Session {
        let mut receiver = self.state.subscribe();
        match receiver.wait_for(|session| !session.is_resolving()).await {
            Ok(session) => session.clone(),
            // The sender lives as long as `self`, so this only happens mid-teardown.
            Err(_) => self.session(),
        }
    }

    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(timer) = self.resolve_timer.take() {
            timer.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            tracing::debug!("session provider released its identity subscription");
        }
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.release();
    }
}
