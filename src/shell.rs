use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::{
    content::{ContentError, ContentLoader, PageContent},
    guard::{self, Decision, Redirect},
    history::{NavigateOptions, Navigator},
    roles::RoleSet,
    route_table::{PageId, RouteEntry, RouteTable},
    session::Session,
};

/// Redirect hops `visit` follows before giving up.
pub const MAX_REDIRECTS: usize = 4;

/// NavState
///
/// Where the current navigation stands. `Redirecting` and `Rendered` end a
/// navigation; `Idle` is the state before the first one and after a failed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Evaluating { location: String },
    Pending { location: String },
    Redirecting(Redirect),
    Loading { location: String, page: PageId },
    Rendered { location: String, page: PageId },
}

/// The published shell state, tagged with the navigation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavSnapshot {
    pub generation: u64,
    pub state: NavState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub location: String,
    pub content: PageContent,
    /// The identity still has to replace the password it was provisioned with.
    pub password_change_required: bool,
}

/// Outcome of one navigation.
#[derive(Debug)]
pub enum Navigation {
    /// The session is still resolving; nothing was loaded.
    Pending,
    Redirected(Redirect),
    Rendered(RenderedPage),
    /// A newer navigation started while this one was loading; its content was dropped.
    Abandoned,
    Failed(ContentError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("more than {MAX_REDIRECTS} redirects while navigating from '{0}'")]
    RedirectLoop(String),
}

enum Resolution<'a> {
    Mount(&'a RouteEntry),
    Decided(Decision),
}

fn resolve<'a>(routes: &'a RouteTable, location: &str, session: &Session) -> Resolution<'a> {
    match routes.find(location) {
        Some(entry) => match entry.access.required_roles() {
            // Public routes bypass the guard entirely.
            None => Resolution::Mount(entry),
            Some(required) => match guard::evaluate(session, required, location) {
                Decision::Allow => Resolution::Mount(entry),
                decision => Resolution::Decided(decision),
            },
        },
        // Unknown paths live inside the signed-in area: guard first, then send home.
        None => match guard::evaluate(session, RoleSet::EMPTY, location) {
            Decision::Allow => {
                tracing::debug!(location, "no route matches; redirecting home");
                Resolution::Decided(Decision::Redirect(Redirect::to_home()))
            }
            decision => Resolution::Decided(decision),
        },
    }
}

/// decide
///
/// The access decision for a location without loading anything. `Allow` means
/// the shell would mount the page.
pub fn decide(routes: &RouteTable, location: &str, session: &Session) -> Decision {
    match resolve(routes, location, session) {
        Resolution::Mount(_) => Decision::Allow,
        Resolution::Decided(decision) => decision,
    }
}

/// Shell
///
/// Matches locations against the route table, guards them and mounts their
/// content. Only the latest navigation may commit its result.
pub struct Shell {
    routes: Arc<RouteTable>,
    content: Arc<dyn ContentLoader>,
    state: watch::Sender<NavSnapshot>,
}

impl Shell {
    pub fn new(routes: Arc<RouteTable>, content: Arc<dyn ContentLoader>) -> Self {
        let (state, _) = watch::channel(NavSnapshot {
            generation: 0,
            state: NavState::Idle,
        });
        Self {
            routes,
            content,
            state,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn state(&self) -> NavSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<NavSnapshot> {
        self.state.subscribe()
    }

    pub fn decide(&self, location: &str, session: &Session) -> Decision {
        decide(&self.routes, location, session)
    }

    /// navigate
    ///
    /// Runs one navigation: evaluate, then either stop (pending / redirect) or
    /// load the page's content behind the placeholder state. Content is only
    /// loaded for allowed routes.
    pub async fn navigate(&self, location: &str, session: &Session) -> Navigation {
        let generation = self.begin(location);

        let entry = match resolve(&self.routes, location, session) {
            Resolution::Mount(entry) => *entry,
            Resolution::Decided(Decision::Redirect(redirect)) => {
                self.publish(generation, NavState::Redirecting(redirect.clone()));
                return Navigation::Redirected(redirect);
            }
            Resolution::Decided(_) => {
                self.publish(
                    generation,
                    NavState::Pending {
                        location: location.to_string(),
                    },
                );
                return Navigation::Pending;
            }
        };

        let loading = NavState::Loading {
            location: location.to_string(),
            page: entry.page,
        };
        if !self.publish(generation, loading) {
            return Navigation::Abandoned;
        }

        let loaded = self.content.load(entry.page).await;

        match loaded {
            Ok(content) => {
                let rendered = NavState::Rendered {
                    location: location.to_string(),
                    page: entry.page,
                };
                if !self.publish(generation, rendered) {
                    tracing::debug!(location, "navigation superseded while loading; dropping content");
                    return Navigation::Abandoned;
                }
                Navigation::Rendered(RenderedPage {
                    location: location.to_string(),
                    content,
                    password_change_required: session
                        .identity()
                        .is_some_and(|identity| identity.must_change_password),
                })
            }
            Err(error) => {
                if !self.publish(generation, NavState::Idle) {
                    return Navigation::Abandoned;
                }
                tracing::error!(%error, page = entry.page.slug(), "page content failed to load");
                Navigation::Failed(error)
            }
        }
    }

    /// visit
    ///
    /// Navigates to the navigator's current location and follows redirects
    /// through it, replacing history entries and carrying the from-path as
    /// entry state.
    pub async fn visit<N>(&self, navigator: &N, session: &Session) -> Result<Navigation, NavigationError>
    where
        N: Navigator + ?Sized,
    {
        let start = navigator.current();
        for _ in 0..=MAX_REDIRECTS {
            let location = navigator.current();
            match self.navigate(&location, session).await {
                Navigation::Redirected(redirect) => {
                    navigator.navigate_to(
                        &redirect.to,
                        NavigateOptions {
                            replace: redirect.replace,
                            state: redirect.from,
                        },
                    );
                }
                outcome => return Ok(outcome),
            }
        }
        tracing::warn!(location = %start, "navigation kept redirecting; giving up");
        Err(NavigationError::RedirectLoop(start))
    }

    fn begin(&self, location: &str) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.state = NavState::Evaluating {
                location: location.to_string(),
            };
            generation = snapshot.generation;
        });
        generation
    }

    /// Commits a state for `generation`; false once a newer navigation has begun.
    fn publish(&self, generation: u64, state: NavState) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.generation == generation {
                snapshot.state = state;
                true
            } else {
                false
            }
        })
    }
}
