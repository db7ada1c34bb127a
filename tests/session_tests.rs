use smartmadrassa_gate::{
    models::Identity,
    roles::Role,
    session::{BroadcastIdentityBackend, IdentityBackend, IdentityListener, Session, SessionProvider, Subscription},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

// --- Helpers ---

fn parent() -> Identity {
    Identity {
        id: Uuid::from_u128(7),
        name: "Khadija".to_string(),
        email: "parent@school.test".to_string(),
        role: Role::Parent,
        avatar: None,
        must_change_password: false,
    }
}

/// A backend that never reports anything and counts registrations.
#[derive(Default)]
struct SilentBackend {
    subscribed: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl IdentityBackend for SilentBackend {
    fn subscribe(&self, _listener: IdentityListener) -> Subscription {
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        let released = Arc::clone(&self.released);
        Subscription::new(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

const WAIT: Duration = Duration::from_secs(2);

// --- Tests ---

#[tokio::test]
async fn test_session_resolving_until_first_notification() {
    let backend = BroadcastIdentityBackend::new();
    let provider = SessionProvider::start(&backend);

    assert!(provider.session().is_resolving());
    assert_eq!(provider.session().identity(), None);

    backend.publish(Some(parent()));

    let session = provider.session();
    assert!(!session.is_resolving());
    assert_eq!(session.identity(), Some(&parent()));
}

#[tokio::test]
async fn test_restored_session_replayed_on_subscribe() {
    let backend = BroadcastIdentityBackend::new();
    backend.publish(Some(parent()));

    let provider = SessionProvider::start(&backend);

    assert_eq!(provider.session(), Session::authenticated(parent()));
}

#[tokio::test]
async fn test_sign_out_settles_anonymous() {
    let backend = BroadcastIdentityBackend::new();
    let provider = SessionProvider::start(&backend);

    backend.publish(Some(parent()));
    backend.publish(None);

    assert_eq!(provider.session(), Session::anonymous());
}

#[tokio::test]
async fn test_exactly_one_subscription_per_provider() {
    let backend = SilentBackend::default();

    let provider = SessionProvider::start(&backend);
    assert_eq!(backend.subscribed.load(Ordering::SeqCst), 1);
    assert_eq!(backend.released.load(Ordering::SeqCst), 0);

    provider.stop();
    assert_eq!(backend.subscribed.load(Ordering::SeqCst), 1);
    assert_eq!(backend.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_unsubscribes() {
    let backend = BroadcastIdentityBackend::new();
    let provider = SessionProvider::start(&backend);
    assert_eq!(backend.subscriber_count(), 1);

    provider.stop();
    assert_eq!(backend.subscriber_count(), 0);

    // Nobody left to notify.
    backend.publish(Some(parent()));
}

#[tokio::test]
async fn test_drop_unsubscribes_once() {
    let backend = SilentBackend::default();
    {
        let _provider = SessionProvider::start(&backend);
    }
    assert_eq!(backend.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_subscription_released_exactly_once() {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&released);
    let subscription = Subscription::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    subscription.unsubscribe();
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_watchers_see_resolution() {
    let backend = BroadcastIdentityBackend::new();
    let provider = SessionProvider::start(&backend);
    let mut receiver = provider.watch();

    backend.publish(Some(parent()));

    tokio::time::timeout(WAIT, receiver.changed())
        .await
        .expect("change observed")
        .unwrap();
    assert_eq!(receiver.borrow().identity(), Some(&parent()));
}

#[tokio::test]
async fn test_resolved_waits_for_notification() {
    let backend = BroadcastIdentityBackend::new();
    let provider = SessionProvider::start(&backend);

    let publisher = backend.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish(Some(parent()));
    });

    let session = tokio::time::timeout(WAIT, provider.resolved())
        .await
        .expect("session resolves");
    assert_eq!(session, Session::authenticated(parent()));
}

#[tokio::test]
async fn test_resolve_timeout_settles_anonymous() {
    let backend = SilentBackend::default();
    let provider = SessionProvider::start_with_timeout(&backend, Some(Duration::from_millis(20)));

    assert!(provider.session().is_resolving());

    let session = tokio::time::timeout(WAIT, provider.resolved())
        .await
        .expect("timeout settles the session");
    assert_eq!(session, Session::anonymous());
}

#[tokio::test]
async fn test_late_notification_after_timeout_still_applies() {
    let backend = BroadcastIdentityBackend::new();
    let provider = SessionProvider::start_with_timeout(&backend, Some(Duration::from_millis(10)));

    tokio::time::timeout(WAIT, provider.resolved()).await.unwrap();
    assert_eq!(provider.session(), Session::anonymous());

    backend.publish(Some(parent()));
    assert_eq!(provider.session(), Session::authenticated(parent()));
}

#[tokio::test]
async fn test_timeout_never_overrides_a_resolved_session() {
    let backend = BroadcastIdentityBackend::new();
    let provider = SessionProvider::start_with_timeout(&backend, Some(Duration::from_millis(10)));

    backend.publish(Some(parent()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(provider.session(), Session::authenticated(parent()));
}

#[test]
fn test_providers_end_on_latest_identity_under_concurrent_publishes() {
    let backend = BroadcastIdentityBackend::new();
    let last = Identity {
        id: Uuid::from_u128(500),
        ..parent()
    };

    let publisher = {
        let backend = backend.clone();
        let last = last.clone();
        std::thread::spawn(move || {
            for n in 0..500u128 {
                backend.publish(Some(Identity {
                    id: Uuid::from_u128(n),
                    ..parent()
                }));
            }
            backend.publish(Some(last));
        })
    };

    let providers: Vec<SessionProvider> = (0..200).map(|_| SessionProvider::start(&backend)).collect();
    publisher.join().unwrap();

    for provider in &providers {
        assert_eq!(provider.session(), Session::authenticated(last.clone()));
    }
}
